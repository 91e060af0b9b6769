//! # ntup-core
//!
//! Shared building blocks for the ntup workspace: the error taxonomy,
//! primitive leaf types and dynamically typed cell values, and the
//! [`StorageSink`] trait that decouples the schema-binding layer from any
//! concrete tree-storage engine.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod traits;
pub mod types;

pub use error::{Result, TreeError};
pub use traits::{ChannelId, StorageSink};
pub use types::{CellValue, LeafType};
