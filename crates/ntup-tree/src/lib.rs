//! # ntup-tree
//!
//! Schema-driven branch binding and row filling for columnar event trees.
//!
//! A declaration list (scalars and counter-bounded vectors) is compiled
//! once into a [`RecordLayout`]; a [`TreeMaker`] binds the layout's slots
//! to named channels of a [`StorageSink`](ntup_core::StorageSink) and
//! produces one row per call: a user filler populates the slots, the record
//! is committed, the slots are reset. Compilation is the expensive stage
//! and is reusable across sinks; binding is cheap and re-run per sink.
//!
//! ## Example
//!
//! ```
//! use ntup_tree::{MakerConfig, TreeMaker};
//!
//! let mut maker: TreeMaker = TreeMaker::from_strings(
//!     &["nJet/I", "Jet[pt/F,eta/F]"],
//!     MakerConfig::default(),
//! )
//! .unwrap()
//! .with_filler(|rec| {
//!     rec.set_i32("nJet", 2)?;
//!     rec.set_elem_f32("Jet_pt", 0, 10.0)?;
//!     rec.set_elem_f32("Jet_pt", 1, 20.0)?;
//!     rec.set_elem_f32("Jet_eta", 0, 0.1)?;
//!     rec.set_elem_f32("Jet_eta", 1, -0.2)?;
//!     Ok(())
//! });
//!
//! maker.initialize();
//! maker.produce_one_row().unwrap();
//!
//! maker.with_sink(|sink| {
//!     assert_eq!(sink.scalar_as_f64("nJet").unwrap(), vec![2.0]);
//!     assert_eq!(sink.array_as_f64("Jet_pt").unwrap().row(0), &[10.0, 20.0]);
//! });
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod binder;
pub mod layout;
pub mod maker;
pub mod memory;
pub mod schema;

pub use binder::{BindingKind, BranchBinding, array_descriptor, bind, scalar_descriptor};
pub use layout::{Field, FieldRole, Record, RecordLayout};
pub use maker::{FillerFn, MakerConfig, SharedSink, TreeMaker};
pub use memory::{JaggedColumn, MemoryTree};
pub use schema::{DEFAULT_MAX_LEN, ScalarVar, VarDecl, VectorVar, parse_decls};
