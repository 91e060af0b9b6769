//! Compiled record layout: the slot table one event record is filled into.
//!
//! Compilation runs once per declaration list and is the expensive half of
//! the maker; attaching the result to a sink is the cheap half and lives in
//! [`crate::binder`]. Field order is deterministic: declared scalars first,
//! then synthesized counters, then vector component arrays.

use std::collections::HashMap;

use ntup_core::{CellValue, LeafType, Result, TreeError};

use crate::schema::VarDecl;

/// Role a field plays in the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    /// Plain per-row scalar.
    Scalar,
    /// Scalar bounding the valid length of sibling array fields.
    Counter,
    /// Bounded array backing one vector component.
    Array {
        /// Index of the bounding counter field.
        counter: usize,
        /// Capacity bound.
        max_len: usize,
    },
}

/// One field of a compiled layout.
#[derive(Debug, Clone)]
pub struct Field {
    /// Field name, unique across the layout including implicit counters.
    pub name: String,
    /// Element type.
    pub leaf: LeafType,
    /// Scalar, counter, or array.
    pub role: FieldRole,
}

#[derive(Debug, Clone)]
enum Slot {
    Scalar(CellValue),
    Array(Vec<CellValue>),
}

/// Compiled record layout: one stable slot per field.
///
/// Owns the current-row values. `reset` returns every scalar and counter
/// slot to its type's zero; array contents are left in place since the
/// counter bounds what is valid.
#[derive(Debug, Clone)]
pub struct RecordLayout {
    fields: Vec<Field>,
    slots: Vec<Slot>,
    index: HashMap<String, usize>,
}

impl RecordLayout {
    /// Compile an ordered declaration list into a layout.
    ///
    /// Synthesizes one `U32` counter per vector unless the declarations
    /// already supply a scalar under the vector's counter name; an explicit
    /// counter must have an integer type. Name collisions are rejected.
    pub fn compile(decls: &[VarDecl]) -> Result<Self> {
        let mut layout =
            RecordLayout { fields: Vec::new(), slots: Vec::new(), index: HashMap::new() };

        for decl in decls {
            if let VarDecl::Scalar(s) = decl {
                layout.add_field(Field {
                    name: s.name.clone(),
                    leaf: s.leaf,
                    role: FieldRole::Scalar,
                })?;
            }
        }

        // Resolve counters before any array field so that explicitly
        // declared counters keep their declaration-order position.
        let mut counters = Vec::new();
        for decl in decls {
            if let VarDecl::Vector(v) = decl {
                counters.push(layout.resolve_counter(&v.counter)?);
            }
        }

        let mut vector_idx = 0usize;
        for decl in decls {
            if let VarDecl::Vector(v) = decl {
                let counter = counters[vector_idx];
                vector_idx += 1;
                for component in &v.components {
                    layout.add_field(Field {
                        name: v.field_name(component),
                        leaf: component.leaf,
                        role: FieldRole::Array { counter, max_len: v.max_len },
                    })?;
                }
            }
        }

        layout.reset();
        Ok(layout)
    }

    fn add_field(&mut self, field: Field) -> Result<usize> {
        if self.index.contains_key(&field.name) {
            return Err(TreeError::Schema(format!("duplicate field name: '{}'", field.name)));
        }
        let slot = match field.role {
            FieldRole::Array { max_len, .. } => Slot::Array(vec![field.leaf.zero(); max_len]),
            _ => Slot::Scalar(field.leaf.zero()),
        };
        let idx = self.fields.len();
        self.index.insert(field.name.clone(), idx);
        self.fields.push(field);
        self.slots.push(slot);
        Ok(idx)
    }

    /// Reuse an already-declared scalar as counter, or synthesize one.
    fn resolve_counter(&mut self, name: &str) -> Result<usize> {
        match self.index.get(name).copied() {
            Some(idx) => {
                let field = &mut self.fields[idx];
                match field.role {
                    FieldRole::Scalar | FieldRole::Counter => {
                        if !field.leaf.is_integer() {
                            return Err(TreeError::Schema(format!(
                                "counter '{}' must have an integer type, got '{}'",
                                name,
                                field.leaf.type_letter()
                            )));
                        }
                        field.role = FieldRole::Counter;
                        Ok(idx)
                    }
                    FieldRole::Array { .. } => Err(TreeError::Schema(format!(
                        "counter '{name}' collides with an array field"
                    ))),
                }
            }
            None => self.add_field(Field {
                name: name.to_string(),
                leaf: LeafType::U32,
                role: FieldRole::Counter,
            }),
        }
    }

    /// Number of fields (slots), implicit counters included.
    pub fn n_fields(&self) -> usize {
        self.fields.len()
    }

    /// All fields in layout order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Field at `idx`.
    pub fn field(&self, idx: usize) -> &Field {
        &self.fields[idx]
    }

    /// Index of a field by name.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Zero every scalar and counter slot for the next row.
    pub fn reset(&mut self) {
        for (field, slot) in self.fields.iter().zip(&mut self.slots) {
            if let Slot::Scalar(value) = slot {
                *value = field.leaf.zero();
            }
        }
    }

    /// Read a scalar or counter slot.
    pub fn get(&self, name: &str) -> Result<CellValue> {
        let idx = self.lookup(name)?;
        match &self.slots[idx] {
            Slot::Scalar(value) => Ok(*value),
            Slot::Array(_) => {
                Err(TreeError::Fill(format!("'{name}' is an array field, index it instead")))
            }
        }
    }

    /// Write a scalar or counter slot; the value type must match the field.
    pub fn set(&mut self, name: &str, value: CellValue) -> Result<()> {
        let idx = self.lookup(name)?;
        check_type(&self.fields[idx], value)?;
        match &mut self.slots[idx] {
            Slot::Scalar(slot) => {
                *slot = value;
                Ok(())
            }
            Slot::Array(_) => {
                Err(TreeError::Fill(format!("'{name}' is an array field, index it instead")))
            }
        }
    }

    /// Read one element of an array slot.
    pub fn get_elem(&self, name: &str, idx: usize) -> Result<CellValue> {
        let field_idx = self.lookup(name)?;
        match &self.slots[field_idx] {
            Slot::Array(values) => values.get(idx).copied().ok_or_else(|| {
                TreeError::Fill(format!(
                    "index {idx} out of range for '{name}' (capacity {})",
                    values.len()
                ))
            }),
            Slot::Scalar(_) => {
                Err(TreeError::Fill(format!("'{name}' is a scalar field, not an array")))
            }
        }
    }

    /// Write one element of an array slot; bounds-checked against capacity.
    pub fn set_elem(&mut self, name: &str, idx: usize, value: CellValue) -> Result<()> {
        let field_idx = self.lookup(name)?;
        check_type(&self.fields[field_idx], value)?;
        match &mut self.slots[field_idx] {
            Slot::Array(values) => match values.get_mut(idx) {
                Some(slot) => {
                    *slot = value;
                    Ok(())
                }
                None => Err(TreeError::Fill(format!(
                    "index {idx} out of range for '{name}' (capacity {})",
                    values.len()
                ))),
            },
            Slot::Scalar(_) => {
                Err(TreeError::Fill(format!("'{name}' is a scalar field, not an array")))
            }
        }
    }

    fn lookup(&self, name: &str) -> Result<usize> {
        self.field_index(name)
            .ok_or_else(|| TreeError::Fill(format!("unknown field: '{name}'")))
    }

    pub(crate) fn scalar_at(&self, idx: usize) -> Result<CellValue> {
        match &self.slots[idx] {
            Slot::Scalar(value) => Ok(*value),
            Slot::Array(_) => Err(TreeError::Fill(format!(
                "field '{}' is not a scalar slot",
                self.fields[idx].name
            ))),
        }
    }

    pub(crate) fn array_prefix(&self, idx: usize, len: usize) -> Result<&[CellValue]> {
        match &self.slots[idx] {
            Slot::Array(values) if len <= values.len() => Ok(&values[..len]),
            Slot::Array(values) => Err(TreeError::Fill(format!(
                "length {len} exceeds capacity {} of '{}'",
                values.len(),
                self.fields[idx].name
            ))),
            Slot::Scalar(_) => Err(TreeError::Fill(format!(
                "field '{}' is not an array slot",
                self.fields[idx].name
            ))),
        }
    }
}

fn check_type(field: &Field, value: CellValue) -> Result<()> {
    if value.leaf_type() == field.leaf {
        Ok(())
    } else {
        Err(TreeError::Fill(format!(
            "type mismatch on '{}': slot is '{}', value is '{}'",
            field.name,
            field.leaf.type_letter(),
            value.leaf_type().type_letter()
        )))
    }
}

/// Mutable view of the current row, handed to the filler callback.
///
/// The callback populates fields before returning and must not retain the
/// borrow past return; the borrow checker enforces the latter.
pub struct Record<'a> {
    layout: &'a mut RecordLayout,
}

impl<'a> Record<'a> {
    pub(crate) fn new(layout: &'a mut RecordLayout) -> Self {
        Self { layout }
    }

    /// Read a scalar or counter field.
    pub fn get(&self, name: &str) -> Result<CellValue> {
        self.layout.get(name)
    }

    /// Write a scalar or counter field.
    pub fn set(&mut self, name: &str, value: CellValue) -> Result<()> {
        self.layout.set(name, value)
    }

    /// Read one array element.
    pub fn get_elem(&self, name: &str, idx: usize) -> Result<CellValue> {
        self.layout.get_elem(name, idx)
    }

    /// Write one array element.
    pub fn set_elem(&mut self, name: &str, idx: usize, value: CellValue) -> Result<()> {
        self.layout.set_elem(name, idx, value)
    }

    /// Write an `I` (32-bit signed) field.
    pub fn set_i32(&mut self, name: &str, v: i32) -> Result<()> {
        self.set(name, CellValue::I32(v))
    }

    /// Write an `i` (32-bit unsigned) field, the synthesized counter type.
    pub fn set_u32(&mut self, name: &str, v: u32) -> Result<()> {
        self.set(name, CellValue::U32(v))
    }

    /// Write an `F` (32-bit float) field.
    pub fn set_f32(&mut self, name: &str, v: f32) -> Result<()> {
        self.set(name, CellValue::F32(v))
    }

    /// Write a `D` (64-bit float) field.
    pub fn set_f64(&mut self, name: &str, v: f64) -> Result<()> {
        self.set(name, CellValue::F64(v))
    }

    /// Write one element of an `F` array field.
    pub fn set_elem_f32(&mut self, name: &str, idx: usize, v: f32) -> Result<()> {
        self.set_elem(name, idx, CellValue::F32(v))
    }

    /// Write one element of a `D` array field.
    pub fn set_elem_f64(&mut self, name: &str, idx: usize, v: f64) -> Result<()> {
        self.set_elem(name, idx, CellValue::F64(v))
    }

    /// Write one element of an `I` array field.
    pub fn set_elem_i32(&mut self, name: &str, idx: usize, v: i32) -> Result<()> {
        self.set_elem(name, idx, CellValue::I32(v))
    }
}
