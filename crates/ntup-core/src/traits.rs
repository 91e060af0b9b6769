//! Storage-sink traits for ntup
//!
//! This module defines the seam that enables dependency inversion: the
//! schema-binding layer (ntup-tree) registers channels and commits row
//! values through [`StorageSink`] without depending on a concrete
//! tree-storage engine.

use crate::Result;
use crate::types::{CellValue, LeafType};

/// Handle to one registered output channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(pub usize);

/// Append-only columnar storage engine a row is committed to.
///
/// One named channel per field. Scalar channels take exactly one value per
/// row; array channels take the valid prefix of a bounded array, whose
/// length for the current row is carried by a sibling scalar channel named
/// at registration time.
///
/// Sink handles are not garbage collected by the engine contract: callers
/// destroy a sink explicitly before replacing it. Registering or committing
/// against a destroyed sink fails with [`TreeError::Resource`].
///
/// [`TreeError::Resource`]: crate::TreeError::Resource
pub trait StorageSink {
    /// Create a fresh, empty sink under the given tree name.
    fn create(name: &str) -> Self
    where
        Self: Sized;

    /// Tree name this sink was created under.
    fn name(&self) -> &str;

    /// Register a fixed-size channel: field name plus primitive type tag.
    fn register_scalar(&mut self, name: &str, leaf: LeafType) -> Result<ChannelId>;

    /// Register a bounded-array channel: field name, the name of the scalar
    /// channel bounding it, and the element type tag. The sink must not
    /// read past the bound for any row.
    fn register_array(&mut self, name: &str, counter: &str, leaf: LeafType) -> Result<ChannelId>;

    /// Commit one row's value to a scalar channel (per-channel mode).
    fn append_scalar(&mut self, id: ChannelId, value: CellValue) -> Result<()>;

    /// Commit one row's valid prefix to an array channel (per-channel mode).
    fn append_array(&mut self, id: ChannelId, values: &[CellValue]) -> Result<()>;

    /// Seal the current row atomically (owned-sink mode).
    ///
    /// Externally shared sinks skip this and let whoever owns them advance
    /// the row count, so two producers never double-advance it.
    fn commit_row(&mut self) -> Result<()>;

    /// Rows sealed so far via [`commit_row`](StorageSink::commit_row).
    fn n_rows(&self) -> u64;

    /// Destroy the sink and release its channel storage.
    fn destroy(&mut self);

    /// Whether [`destroy`](StorageSink::destroy) has been called.
    fn is_destroyed(&self) -> bool;
}
