//! In-memory reference sink with columnar read-back.
//!
//! `MemoryTree` implements the [`StorageSink`] contract over plain typed
//! columns: scalar channels as value vectors, array channels as jagged
//! columns (flat values plus per-row offsets). It backs the test suite and
//! gives downstream consumers a tree they can inspect without any file
//! format involved.

use std::collections::HashMap;

use ntup_core::{CellValue, ChannelId, LeafType, Result, StorageSink, TreeError};

use crate::binder::{array_descriptor, scalar_descriptor};

/// A jagged (variable-length) column: flat values + per-row offsets.
///
/// `offsets` has length `n_rows + 1`. Row `i` has values
/// `flat[offsets[i]..offsets[i+1]]`.
#[derive(Debug, Clone)]
pub struct JaggedColumn {
    /// Flat array of all values across all rows.
    pub flat: Vec<f64>,
    /// Row boundaries: `offsets.len() == n_rows + 1`.
    pub offsets: Vec<usize>,
}

impl JaggedColumn {
    /// Get element `index` of row `row`. Returns `oor` for out-of-range.
    pub fn get(&self, row: usize, index: usize, oor: f64) -> f64 {
        let start = self.offsets[row];
        let end = self.offsets[row + 1];
        if index >= end - start { oor } else { self.flat[start + index] }
    }

    /// All values of one row.
    pub fn row(&self, row: usize) -> &[f64] {
        &self.flat[self.offsets[row]..self.offsets[row + 1]]
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }
}

#[derive(Debug, Clone)]
enum ChannelData {
    Scalar(Vec<CellValue>),
    Array { flat: Vec<CellValue>, offsets: Vec<usize> },
}

#[derive(Debug, Clone)]
struct Channel {
    name: String,
    descriptor: String,
    leaf: LeafType,
    data: ChannelData,
}

impl Channel {
    fn rows(&self) -> u64 {
        match &self.data {
            ChannelData::Scalar(values) => values.len() as u64,
            ChannelData::Array { offsets, .. } => (offsets.len() - 1) as u64,
        }
    }
}

/// In-memory append-only columnar tree.
#[derive(Debug, Clone)]
pub struct MemoryTree {
    name: String,
    channels: Vec<Channel>,
    index: HashMap<String, usize>,
    rows: u64,
    destroyed: bool,
}

impl MemoryTree {
    fn ensure_live(&self) -> Result<()> {
        if self.destroyed {
            Err(TreeError::Resource(format!("sink '{}' has been destroyed", self.name)))
        } else {
            Ok(())
        }
    }

    fn register(&mut self, channel: Channel) -> Result<ChannelId> {
        self.ensure_live()?;
        if self.index.contains_key(&channel.name) {
            return Err(TreeError::Schema(format!("duplicate channel: '{}'", channel.name)));
        }
        let id = ChannelId(self.channels.len());
        self.index.insert(channel.name.clone(), id.0);
        self.channels.push(channel);
        Ok(id)
    }

    fn channel(&self, name: &str) -> Result<&Channel> {
        self.index
            .get(name)
            .map(|&i| &self.channels[i])
            .ok_or_else(|| TreeError::Fill(format!("no channel named '{name}'")))
    }

    fn channel_mut(&mut self, id: ChannelId) -> Result<&mut Channel> {
        let n = self.channels.len();
        self.channels
            .get_mut(id.0)
            .ok_or_else(|| TreeError::Fill(format!("channel id {} out of range ({n})", id.0)))
    }

    /// Channel names in registration order.
    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name.as_str()).collect()
    }

    /// Branch descriptor a channel was registered with.
    pub fn descriptor(&self, name: &str) -> Option<&str> {
        self.channel(name).ok().map(|c| c.descriptor.as_str())
    }

    /// Rows committed to one channel. In external (per-channel) mode this
    /// is the only row count the sink tracks.
    pub fn channel_rows(&self, name: &str) -> Result<u64> {
        Ok(self.channel(name)?.rows())
    }

    /// Check that every channel holds the same number of rows and return it.
    pub fn check_consistent(&self) -> Result<u64> {
        let mut rows: Option<u64> = None;
        for channel in &self.channels {
            let n = channel.rows();
            match rows {
                None => rows = Some(n),
                Some(expected) if expected != n => {
                    return Err(TreeError::Fill(format!(
                        "channel '{}' holds {n} rows, expected {expected}",
                        channel.name
                    )));
                }
                Some(_) => {}
            }
        }
        Ok(rows.unwrap_or(0))
    }

    /// Read a scalar channel back, converting to `f64`.
    pub fn scalar_as_f64(&self, name: &str) -> Result<Vec<f64>> {
        match &self.channel(name)?.data {
            ChannelData::Scalar(values) => Ok(values.iter().map(|v| v.as_f64()).collect()),
            ChannelData::Array { .. } => {
                Err(TreeError::Fill(format!("'{name}' is an array channel")))
            }
        }
    }

    /// Read a scalar channel back as raw cells.
    pub fn scalar_cells(&self, name: &str) -> Result<&[CellValue]> {
        match &self.channel(name)?.data {
            ChannelData::Scalar(values) => Ok(values),
            ChannelData::Array { .. } => {
                Err(TreeError::Fill(format!("'{name}' is an array channel")))
            }
        }
    }

    /// Read an array channel back as a jagged `f64` column.
    pub fn array_as_f64(&self, name: &str) -> Result<JaggedColumn> {
        match &self.channel(name)?.data {
            ChannelData::Array { flat, offsets } => Ok(JaggedColumn {
                flat: flat.iter().map(|v| v.as_f64()).collect(),
                offsets: offsets.clone(),
            }),
            ChannelData::Scalar(_) => {
                Err(TreeError::Fill(format!("'{name}' is a scalar channel")))
            }
        }
    }
}

impl StorageSink for MemoryTree {
    fn create(name: &str) -> Self {
        Self {
            name: name.to_string(),
            channels: Vec::new(),
            index: HashMap::new(),
            rows: 0,
            destroyed: false,
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn register_scalar(&mut self, name: &str, leaf: LeafType) -> Result<ChannelId> {
        self.register(Channel {
            name: name.to_string(),
            descriptor: scalar_descriptor(name, leaf),
            leaf,
            data: ChannelData::Scalar(Vec::new()),
        })
    }

    fn register_array(&mut self, name: &str, counter: &str, leaf: LeafType) -> Result<ChannelId> {
        self.register(Channel {
            name: name.to_string(),
            descriptor: array_descriptor(name, counter, leaf),
            leaf,
            data: ChannelData::Array { flat: Vec::new(), offsets: vec![0] },
        })
    }

    fn append_scalar(&mut self, id: ChannelId, value: CellValue) -> Result<()> {
        self.ensure_live()?;
        let channel = self.channel_mut(id)?;
        if value.leaf_type() != channel.leaf {
            return Err(TreeError::Fill(format!(
                "type mismatch on channel '{}': expected '{}', got '{}'",
                channel.name,
                channel.leaf.type_letter(),
                value.leaf_type().type_letter()
            )));
        }
        match &mut channel.data {
            ChannelData::Scalar(values) => {
                values.push(value);
                Ok(())
            }
            ChannelData::Array { .. } => {
                Err(TreeError::Fill(format!("'{}' is an array channel", channel.name)))
            }
        }
    }

    fn append_array(&mut self, id: ChannelId, values: &[CellValue]) -> Result<()> {
        self.ensure_live()?;
        let channel = self.channel_mut(id)?;
        if let Some(bad) = values.iter().find(|v| v.leaf_type() != channel.leaf) {
            return Err(TreeError::Fill(format!(
                "type mismatch on channel '{}': expected '{}', got '{}'",
                channel.name,
                channel.leaf.type_letter(),
                bad.leaf_type().type_letter()
            )));
        }
        match &mut channel.data {
            ChannelData::Array { flat, offsets } => {
                flat.extend_from_slice(values);
                offsets.push(flat.len());
                Ok(())
            }
            ChannelData::Scalar(_) => {
                Err(TreeError::Fill(format!("'{}' is a scalar channel", channel.name)))
            }
        }
    }

    fn commit_row(&mut self) -> Result<()> {
        self.ensure_live()?;
        self.rows += 1;
        Ok(())
    }

    fn n_rows(&self) -> u64 {
        self.rows
    }

    fn destroy(&mut self) {
        self.channels.clear();
        self.index.clear();
        self.destroyed = true;
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}
