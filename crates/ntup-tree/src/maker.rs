//! Row lifecycle controller: compile once, bind per sink, fill per row.
//!
//! A [`TreeMaker`] compiles its declaration list into a [`RecordLayout`] at
//! construction, binds every field to a channel of a storage sink, and then
//! produces one row per [`produce_one_row`](TreeMaker::produce_one_row)
//! call: the filler callback populates the slots, the current record is
//! committed, the slots are reset for the next row.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use ntup_core::{Result, StorageSink, TreeError};

use crate::binder::{self, BindingKind, BranchBinding};
use crate::layout::{FieldRole, Record, RecordLayout};
use crate::memory::MemoryTree;
use crate::schema::{VarDecl, parse_decls};

/// Shared handle to an externally owned sink.
pub type SharedSink<S> = Rc<RefCell<S>>;

/// Per-row fill callback.
///
/// Populates fields of the current row before returning; may read arbitrary
/// external state but writes only into the record, and must not retain the
/// borrow past return. An error propagates out of
/// [`TreeMaker::produce_one_row`] as [`TreeError::Callback`] with the row
/// uncommitted.
pub type FillerFn =
    dyn FnMut(&mut Record<'_>) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Tree maker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MakerConfig {
    /// Name of the output tree (default `"Events"`).
    pub tree_name: String,
    /// Emit a progress log line every this many rows; `0` disables
    /// (default `10_000`).
    pub progress_interval: u64,
}

impl Default for MakerConfig {
    fn default() -> Self {
        Self { tree_name: "Events".to_string(), progress_interval: 10_000 }
    }
}

enum SinkHandle<S: StorageSink> {
    Owned(S),
    External(SharedSink<S>),
}

/// Schema-driven maker of new columnar trees.
///
/// Exactly one maker may hold a live binding set against a given sink at a
/// time; bind a second one only after [`clear`](TreeMaker::clear) on the
/// first.
pub struct TreeMaker<S: StorageSink = MemoryTree> {
    decls: Vec<VarDecl>,
    layout: RecordLayout,
    bindings: Vec<BranchBinding>,
    sink: SinkHandle<S>,
    filler: Option<Rc<RefCell<Box<FillerFn>>>>,
    config: MakerConfig,
    position: u64,
}

impl<S: StorageSink + std::fmt::Debug> std::fmt::Debug for TreeMaker<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sink: &dyn std::fmt::Debug = match &self.sink {
            SinkHandle::Owned(s) => s,
            SinkHandle::External(s) => s,
        };
        f.debug_struct("TreeMaker")
            .field("decls", &self.decls)
            .field("layout", &self.layout)
            .field("bindings", &self.bindings)
            .field("sink", sink)
            .field("filler", &self.filler.as_ref().map(|_| "<fn>"))
            .field("config", &self.config)
            .field("position", &self.position)
            .finish()
    }
}

impl<S: StorageSink> TreeMaker<S> {
    /// Compile `decls`, create an owned sink under the configured tree
    /// name, and bind every field.
    ///
    /// Declarations are validated before the sink is created; an invalid
    /// one fails with [`TreeError::Schema`] and no sink ever exists.
    pub fn new(decls: Vec<VarDecl>, config: MakerConfig) -> Result<Self> {
        let layout = RecordLayout::compile(&decls)?;
        let mut sink = S::create(&config.tree_name);
        let bindings = binder::bind(&layout, &mut sink)?;
        Ok(Self {
            decls,
            layout,
            bindings,
            sink: SinkHandle::Owned(sink),
            filler: None,
            config,
            position: 0,
        })
    }

    /// Parse declaration strings (`"met_pt/F"`, `"Jet[pt/F,eta/F]"`) and
    /// construct as [`new`](TreeMaker::new).
    pub fn from_strings(specs: &[&str], config: MakerConfig) -> Result<Self> {
        Self::new(parse_decls(specs)?, config)
    }

    /// Install the per-row filler callback.
    ///
    /// Clones made by [`clone_for_reuse`](TreeMaker::clone_for_reuse) share
    /// the installed callback rather than duplicating it.
    pub fn set_filler<F>(&mut self, filler: F)
    where
        F: FnMut(&mut Record<'_>) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>
            + 'static,
    {
        self.filler = Some(Rc::new(RefCell::new(Box::new(filler))));
    }

    /// Builder-style [`set_filler`](TreeMaker::set_filler).
    pub fn with_filler<F>(mut self, filler: F) -> Self
    where
        F: FnMut(&mut Record<'_>) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>
            + 'static,
    {
        self.set_filler(filler);
        self
    }

    /// Reset the row cursor and the record slots. Call once before the
    /// first [`produce_one_row`](TreeMaker::produce_one_row).
    pub fn initialize(&mut self) {
        self.position = 0;
        self.layout.reset();
    }

    /// Produce one row: progress log, filler, commit, reset.
    ///
    /// Returns the number of rows produced (always 1 on success). On any
    /// error the row is not committed and the cursor is not advanced; there
    /// is no partial-row recovery.
    pub fn produce_one_row(&mut self) -> Result<u64> {
        if at_checkpoint(self.position, self.config.progress_interval) {
            tracing::info!(row = self.position, tree = %self.config.tree_name, "tree maker progress");
        }

        if let Some(filler) = &self.filler {
            let mut record = Record::new(&mut self.layout);
            let mut cb = filler.borrow_mut();
            (*cb)(&mut record).map_err(TreeError::Callback)?;
        }

        self.commit_current()?;
        self.layout.reset();
        self.position += 1;
        Ok(1)
    }

    /// Commit the current record: per-channel for an external sink, sealed
    /// as one row for an owned sink.
    fn commit_current(&mut self) -> Result<()> {
        // Validate every counter before touching the sink; a bad length
        // must not leave a partially committed row behind.
        for binding in &self.bindings {
            if let FieldRole::Array { counter, max_len } = self.layout.field(binding.field).role {
                let len = counter_len(&self.layout, counter)?;
                if len > max_len {
                    return Err(TreeError::Fill(format!(
                        "counter '{}' = {len} exceeds capacity {max_len} of '{}'",
                        self.layout.field(counter).name,
                        self.layout.field(binding.field).name
                    )));
                }
            }
        }

        let Self { layout, bindings, sink, .. } = self;
        match sink {
            SinkHandle::Owned(s) => commit_bindings(layout, bindings, s, true),
            SinkHandle::External(s) => {
                commit_bindings(layout, bindings, &mut *s.borrow_mut(), false)
            }
        }
    }

    /// Deep-copy the compiled shape onto a new sink without recompiling.
    ///
    /// The clone shares declarations, layout shape, and the filler callback
    /// with the original but holds fresh slots, fresh bindings, and a row
    /// cursor at zero. With `external` set, the supplied sink's name must
    /// match this maker's tree name; a mismatch fails with
    /// [`TreeError::Configuration`] before anything is mutated. Without it,
    /// a fresh owned sink is created under the same name.
    pub fn clone_for_reuse(&self, external: Option<SharedSink<S>>) -> Result<Self> {
        let sink = match external {
            Some(shared) => {
                let name = shared.borrow().name().to_string();
                if name != self.config.tree_name {
                    return Err(TreeError::Configuration(format!(
                        "tree name inconsistency (instance: '{}', external sink: '{name}')",
                        self.config.tree_name
                    )));
                }
                SinkHandle::External(shared)
            }
            None => SinkHandle::Owned(S::create(&self.config.tree_name)),
        };

        let mut layout = self.layout.clone();
        layout.reset();
        let bindings = match &sink {
            SinkHandle::Owned(_) => Vec::new(), // bound below, after the move
            SinkHandle::External(s) => binder::bind(&layout, &mut *s.borrow_mut())?,
        };

        let mut clone = Self {
            decls: self.decls.clone(),
            layout,
            bindings,
            sink,
            filler: self.filler.clone(),
            config: self.config.clone(),
            position: 0,
        };
        if let SinkHandle::Owned(s) = &mut clone.sink {
            clone.bindings = binder::bind(&clone.layout, s)?;
        }
        Ok(clone)
    }

    /// Drop the live bindings and destroy an owned sink.
    ///
    /// An external sink is left to its owner; only the binding set is
    /// released, so another maker may bind it afterwards.
    pub fn clear(&mut self) {
        self.bindings.clear();
        if let SinkHandle::Owned(sink) = &mut self.sink {
            sink.destroy();
        }
    }

    /// Current row cursor.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Configured tree name.
    pub fn tree_name(&self) -> &str {
        &self.config.tree_name
    }

    /// Whether the sink is externally owned (per-channel commit mode).
    pub fn is_external_sink(&self) -> bool {
        matches!(self.sink, SinkHandle::External(_))
    }

    /// The compiled layout.
    pub fn layout(&self) -> &RecordLayout {
        &self.layout
    }

    /// Inspect the sink, owned or external.
    pub fn with_sink<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        match &self.sink {
            SinkHandle::Owned(s) => f(s),
            SinkHandle::External(s) => f(&*s.borrow()),
        }
    }

    /// Consume the maker and return its owned sink, or `None` for an
    /// external one.
    pub fn into_sink(self) -> Option<S> {
        match self.sink {
            SinkHandle::Owned(s) => Some(s),
            SinkHandle::External(_) => None,
        }
    }
}

fn commit_bindings<S: StorageSink>(
    layout: &RecordLayout,
    bindings: &[BranchBinding],
    sink: &mut S,
    seal: bool,
) -> Result<()> {
    for binding in bindings {
        match binding.kind {
            BindingKind::Scalar => {
                sink.append_scalar(binding.channel, layout.scalar_at(binding.field)?)?;
            }
            BindingKind::Array => {
                let FieldRole::Array { counter, .. } = layout.field(binding.field).role else {
                    return Err(TreeError::Fill(format!(
                        "binding for '{}' is not an array field",
                        layout.field(binding.field).name
                    )));
                };
                let len = counter_len(layout, counter)?;
                sink.append_array(binding.channel, layout.array_prefix(binding.field, len)?)?;
            }
        }
    }
    if seal {
        sink.commit_row()?;
    }
    Ok(())
}

fn counter_len(layout: &RecordLayout, counter: usize) -> Result<usize> {
    let value = layout.scalar_at(counter)?;
    value.as_index().ok_or_else(|| {
        TreeError::Fill(format!(
            "counter '{}' does not hold a valid length ({value:?})",
            layout.field(counter).name
        ))
    })
}

fn at_checkpoint(position: u64, interval: u64) -> bool {
    interval != 0 && position.is_multiple_of(interval)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ntup_core::CellValue;

    fn maker() -> TreeMaker {
        TreeMaker::<MemoryTree>::from_strings(
            &["nJet/I", "Jet[pt/F,eta/F]", "met_pt/F"],
            MakerConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn produce_rows_with_filler() {
        let mut m = maker().with_filler(|rec| {
            rec.set_i32("nJet", 1)?;
            rec.set_elem_f32("Jet_pt", 0, 42.0)?;
            rec.set_f32("met_pt", 7.5)?;
            Ok(())
        });
        m.initialize();
        assert_eq!(m.produce_one_row().unwrap(), 1);
        assert_eq!(m.produce_one_row().unwrap(), 1);
        assert_eq!(m.position(), 2);
        m.with_sink(|sink| {
            assert_eq!(sink.n_rows(), 2);
            assert_eq!(sink.scalar_as_f64("met_pt").unwrap(), vec![7.5, 7.5]);
            assert_eq!(sink.array_as_f64("Jet_pt").unwrap().row(1), &[42.0]);
        });
    }

    #[test]
    fn no_filler_commits_zeros() {
        let mut m = maker();
        m.initialize();
        m.produce_one_row().unwrap();
        m.with_sink(|sink| {
            assert_eq!(sink.scalar_cells("nJet").unwrap(), &[CellValue::I32(0)]);
            assert_eq!(sink.array_as_f64("Jet_pt").unwrap().row(0), &[] as &[f64]);
        });
    }

    #[test]
    fn failed_callback_commits_nothing() {
        let mut m = maker().with_filler(|_| Err("upstream exhausted".into()));
        m.initialize();
        let err = m.produce_one_row().unwrap_err();
        assert!(matches!(err, TreeError::Callback(_)));
        assert_eq!(m.position(), 0);
        m.with_sink(|sink| assert_eq!(sink.n_rows(), 0));
    }

    #[test]
    fn oversized_counter_commits_nothing() {
        let mut m = TreeMaker::<MemoryTree>::new(
            parse_decls(["Jet[pt/F]"]).unwrap(),
            MakerConfig::default(),
        )
        .unwrap()
        .with_filler(|rec| {
            rec.set_u32("nJet", 101)?; // capacity is 100
            Ok(())
        });
        m.initialize();
        let err = m.produce_one_row().unwrap_err();
        assert!(matches!(err, TreeError::Fill(_)));
        assert_eq!(m.position(), 0);
        m.with_sink(|sink| assert_eq!(sink.check_consistent().unwrap(), 0));
    }

    #[test]
    fn clear_destroys_owned_sink() {
        let mut m = maker();
        m.clear();
        m.with_sink(|sink| assert!(sink.is_destroyed()));
        assert!(matches!(m.produce_one_row(), Err(TreeError::Resource(_))));
    }

    #[test]
    fn checkpoint_boundaries() {
        assert!(at_checkpoint(0, 10_000));
        assert!(at_checkpoint(10_000, 10_000));
        assert!(!at_checkpoint(10_001, 10_000));
        assert!(!at_checkpoint(9_999, 10_000));
        assert!(at_checkpoint(20_000, 10_000));
        // Interval 0 disables progress logging entirely.
        assert!(!at_checkpoint(0, 0));
    }

    #[test]
    fn checkpoint_hit_once_in_10001_rows_after_zero() {
        let hits = (0u64..=10_000).filter(|&p| at_checkpoint(p, 10_000)).count();
        assert_eq!(hits, 2); // row 0 and row 10000
        assert!(!at_checkpoint(10_001, 10_000));
    }

    #[test]
    fn config_defaults_and_serde() {
        let config = MakerConfig::default();
        assert_eq!(config.tree_name, "Events");
        assert_eq!(config.progress_interval, 10_000);

        let parsed: MakerConfig = serde_json::from_str(r#"{"tree_name": "Skim"}"#).unwrap();
        assert_eq!(parsed.tree_name, "Skim");
        assert_eq!(parsed.progress_interval, 10_000);
    }
}
