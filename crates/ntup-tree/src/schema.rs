//! Variable declarations and their string grammar.
//!
//! A declaration is either a scalar (`"met_pt/F"`) or a vector of named
//! components sharing one length counter (`"Jet[pt/F,eta/F]"`). The type
//! letters follow ROOT leaf conventions, see
//! [`LeafType::type_letter`](ntup_core::LeafType::type_letter).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use ntup_core::{LeafType, Result, TreeError};

/// Default capacity bound for vector declarations.
pub const DEFAULT_MAX_LEN: usize = 100;

/// A scalar variable: one value per row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalarVar {
    /// Field name.
    pub name: String,
    /// Value type.
    pub leaf: LeafType,
}

impl ScalarVar {
    /// Declare a scalar variable. The name must be a plain identifier.
    pub fn new(name: impl Into<String>, leaf: LeafType) -> Result<Self> {
        let name = name.into();
        check_ident(&name)?;
        Ok(Self { name, leaf })
    }
}

/// A vector variable: a group of bounded arrays sharing one length counter.
///
/// Each component becomes its own array field named `<name>_<component>`;
/// the counter is a sibling scalar holding how many elements are populated
/// in the current row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorVar {
    /// Vector name; prefixes every component field.
    pub name: String,
    /// Ordered components, at least one.
    pub components: Vec<ScalarVar>,
    /// Name of the bounding counter field.
    pub counter: String,
    /// Capacity bound for every component array.
    pub max_len: usize,
}

impl VectorVar {
    /// Declare a vector variable with the conventional counter name
    /// `n<name>` and the default capacity.
    pub fn new(name: impl Into<String>, components: Vec<ScalarVar>) -> Result<Self> {
        let name = name.into();
        check_ident(&name)?;
        if components.is_empty() {
            return Err(TreeError::Schema(format!("vector '{name}' has no components")));
        }
        let counter = format!("n{name}");
        Ok(Self { name, components, counter, max_len: DEFAULT_MAX_LEN })
    }

    /// Override the counter field name.
    pub fn with_counter(mut self, counter: impl Into<String>) -> Result<Self> {
        self.counter = counter.into();
        check_ident(&self.counter)?;
        Ok(self)
    }

    /// Override the capacity bound.
    pub fn with_max_len(mut self, max_len: usize) -> Result<Self> {
        if max_len == 0 {
            return Err(TreeError::Schema(format!("vector '{}' has zero capacity", self.name)));
        }
        self.max_len = max_len;
        Ok(self)
    }

    /// Field name of one component: `<name>_<component>`.
    pub fn field_name(&self, component: &ScalarVar) -> String {
        format!("{}_{}", self.name, component.name)
    }
}

/// One variable declaration, scalar or vector.
///
/// Anything that is not a valid declaration is rejected when constructed,
/// not at first use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VarDecl {
    /// A scalar variable.
    Scalar(ScalarVar),
    /// A vector variable.
    Vector(VectorVar),
}

impl VarDecl {
    /// Declaration name (the vector name for vectors).
    pub fn name(&self) -> &str {
        match self {
            VarDecl::Scalar(s) => &s.name,
            VarDecl::Vector(v) => &v.name,
        }
    }
}

impl fmt::Display for VarDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VarDecl::Scalar(s) => write!(f, "{}/{}", s.name, s.leaf.type_letter()),
            VarDecl::Vector(v) => {
                write!(f, "{}[", v.name)?;
                for (i, c) in v.components.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}/{}", c.name, c.leaf.type_letter())?;
                }
                write!(f, "]")
            }
        }
    }
}

impl FromStr for VarDecl {
    type Err = TreeError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some(open) = s.find('[') {
            let Some(inner) = s[open + 1..].strip_suffix(']') else {
                return Err(not_a_variable(s));
            };
            let name = &s[..open];
            let components = inner
                .split(',')
                .map(|part| parse_scalar(part.trim()))
                .collect::<Result<Vec<_>>>()?;
            if name.is_empty() || components.is_empty() {
                return Err(not_a_variable(s));
            }
            Ok(VarDecl::Vector(VectorVar::new(name, components)?))
        } else {
            Ok(VarDecl::Scalar(parse_scalar(s)?))
        }
    }
}

/// Parse a whole declaration list, rejecting the first invalid entry.
pub fn parse_decls<I, T>(specs: I) -> Result<Vec<VarDecl>>
where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
{
    specs.into_iter().map(|s| s.as_ref().parse()).collect()
}

fn parse_scalar(part: &str) -> Result<ScalarVar> {
    let Some((name, letter)) = part.split_once('/') else {
        return Err(not_a_variable(part));
    };
    let mut chars = letter.chars();
    let (Some(letter), None) = (chars.next(), chars.next()) else {
        return Err(not_a_variable(part));
    };
    ScalarVar::new(name, LeafType::from_letter(letter)?)
}

fn not_a_variable(s: &str) -> TreeError {
    TreeError::Schema(format!("not a proper variable declaration: '{s}'"))
}

fn check_ident(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) => {
            (c.is_ascii_alphabetic() || c == '_') && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(TreeError::Schema(format!("invalid field name: '{name}'")))
    }
}
