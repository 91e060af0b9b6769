//! Primitive leaf types and dynamically typed cell values.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TreeError};

/// Leaf data type (maps to ROOT TLeaf classes and their type letters).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LeafType {
    /// `F` — 32-bit float.
    F32,
    /// `D` — 64-bit float.
    F64,
    /// `I` — 32-bit signed integer.
    I32,
    /// `L` — 64-bit signed integer.
    I64,
    /// `i` — 32-bit unsigned integer.
    U32,
    /// `l` — 64-bit unsigned integer.
    U64,
    /// `S` — 16-bit signed integer.
    I16,
    /// `B` — 8-bit signed integer.
    I8,
    /// `O` — boolean (1 byte).
    Bool,
}

impl LeafType {
    /// Size in bytes of one element.
    pub fn byte_size(self) -> usize {
        match self {
            LeafType::F32 | LeafType::I32 | LeafType::U32 => 4,
            LeafType::F64 | LeafType::I64 | LeafType::U64 => 8,
            LeafType::I16 => 2,
            LeafType::I8 | LeafType::Bool => 1,
        }
    }

    /// The single-letter type tag used in branch descriptors.
    pub fn type_letter(self) -> char {
        match self {
            LeafType::F32 => 'F',
            LeafType::F64 => 'D',
            LeafType::I32 => 'I',
            LeafType::I64 => 'L',
            LeafType::U32 => 'i',
            LeafType::U64 => 'l',
            LeafType::I16 => 'S',
            LeafType::I8 => 'B',
            LeafType::Bool => 'O',
        }
    }

    /// Parse a type letter back into a leaf type.
    pub fn from_letter(letter: char) -> Result<Self> {
        Ok(match letter {
            'F' => LeafType::F32,
            'D' => LeafType::F64,
            'I' => LeafType::I32,
            'L' => LeafType::I64,
            'i' => LeafType::U32,
            'l' => LeafType::U64,
            'S' => LeafType::I16,
            'B' => LeafType::I8,
            'O' => LeafType::Bool,
            _ => {
                return Err(TreeError::Schema(format!("unknown type letter '{letter}'")));
            }
        })
    }

    /// Whether this type can bound an array length.
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            LeafType::I8
                | LeafType::I16
                | LeafType::I32
                | LeafType::I64
                | LeafType::U32
                | LeafType::U64
        )
    }

    /// The zero value of this type.
    pub fn zero(self) -> CellValue {
        match self {
            LeafType::F32 => CellValue::F32(0.0),
            LeafType::F64 => CellValue::F64(0.0),
            LeafType::I32 => CellValue::I32(0),
            LeafType::I64 => CellValue::I64(0),
            LeafType::U32 => CellValue::U32(0),
            LeafType::U64 => CellValue::U64(0),
            LeafType::I16 => CellValue::I16(0),
            LeafType::I8 => CellValue::I8(0),
            LeafType::Bool => CellValue::Bool(false),
        }
    }
}

/// One dynamically typed cell: the current-row value of a single slot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    /// 32-bit float.
    F32(f32),
    /// 64-bit float.
    F64(f64),
    /// 32-bit signed integer.
    I32(i32),
    /// 64-bit signed integer.
    I64(i64),
    /// 32-bit unsigned integer.
    U32(u32),
    /// 64-bit unsigned integer.
    U64(u64),
    /// 16-bit signed integer.
    I16(i16),
    /// 8-bit signed integer.
    I8(i8),
    /// Boolean.
    Bool(bool),
}

impl CellValue {
    /// The leaf type this value belongs to.
    pub fn leaf_type(self) -> LeafType {
        match self {
            CellValue::F32(_) => LeafType::F32,
            CellValue::F64(_) => LeafType::F64,
            CellValue::I32(_) => LeafType::I32,
            CellValue::I64(_) => LeafType::I64,
            CellValue::U32(_) => LeafType::U32,
            CellValue::U64(_) => LeafType::U64,
            CellValue::I16(_) => LeafType::I16,
            CellValue::I8(_) => LeafType::I8,
            CellValue::Bool(_) => LeafType::Bool,
        }
    }

    /// Lossy conversion to `f64`, for read-back and inspection.
    pub fn as_f64(self) -> f64 {
        match self {
            CellValue::F32(v) => v as f64,
            CellValue::F64(v) => v,
            CellValue::I32(v) => v as f64,
            CellValue::I64(v) => v as f64,
            CellValue::U32(v) => v as f64,
            CellValue::U64(v) => v as f64,
            CellValue::I16(v) => v as f64,
            CellValue::I8(v) => v as f64,
            CellValue::Bool(v) => v as u8 as f64,
        }
    }

    /// Interpret an integer cell as an array length.
    ///
    /// Returns `None` for floats, booleans, and negative values.
    pub fn as_index(self) -> Option<usize> {
        match self {
            CellValue::I32(v) => usize::try_from(v).ok(),
            CellValue::I64(v) => usize::try_from(v).ok(),
            CellValue::U32(v) => Some(v as usize),
            CellValue::U64(v) => usize::try_from(v).ok(),
            CellValue::I16(v) => usize::try_from(v).ok(),
            CellValue::I8(v) => usize::try_from(v).ok(),
            CellValue::F32(_) | CellValue::F64(_) | CellValue::Bool(_) => None,
        }
    }
}
