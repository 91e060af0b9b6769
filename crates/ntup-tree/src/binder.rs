//! Branch binder: registers compiled layout fields as named sink channels.
//!
//! Binding is the cheap half of the maker and can be re-run against a new
//! sink without recompiling the layout. Scalar fields use the two-part
//! descriptor `name/T`; array fields use the three-part `name[counter]/T`,
//! which tells the sink which scalar channel bounds the array for each row.

use ntup_core::{ChannelId, LeafType, Result, StorageSink};

use crate::layout::{FieldRole, RecordLayout};

/// How a binding commits its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    /// One value per row.
    Scalar,
    /// Counter-bounded prefix per row.
    Array,
}

/// One live association between a layout field and a sink channel.
///
/// Bindings reference the slot by field index and the channel by handle;
/// when the sink is swapped they are recreated, never mutated.
#[derive(Debug, Clone)]
pub struct BranchBinding {
    /// Index of the bound field in the layout.
    pub field: usize,
    /// Channel handle in the sink.
    pub channel: ChannelId,
    /// Scalar or array commit path.
    pub kind: BindingKind,
}

/// Two-part branch descriptor for a scalar channel: `name/T`.
pub fn scalar_descriptor(name: &str, leaf: LeafType) -> String {
    format!("{}/{}", name, leaf.type_letter())
}

/// Three-part branch descriptor for a bounded-array channel: `name[counter]/T`.
pub fn array_descriptor(name: &str, counter: &str, leaf: LeafType) -> String {
    format!("{}[{}]/{}", name, counter, leaf.type_letter())
}

/// Register every layout field against `sink` and return the binding set.
///
/// Layout order already places scalars and counters before arrays, so the
/// sink sees every counter channel before the arrays it bounds.
pub fn bind<S: StorageSink>(layout: &RecordLayout, sink: &mut S) -> Result<Vec<BranchBinding>> {
    let mut bindings = Vec::with_capacity(layout.n_fields());
    let mut scalars = 0usize;
    let mut vectors = 0usize;

    for (idx, field) in layout.fields().iter().enumerate() {
        let binding = match field.role {
            FieldRole::Scalar | FieldRole::Counter => {
                scalars += 1;
                BranchBinding {
                    field: idx,
                    channel: sink.register_scalar(&field.name, field.leaf)?,
                    kind: BindingKind::Scalar,
                }
            }
            FieldRole::Array { counter, .. } => {
                vectors += 1;
                let counter_name = &layout.field(counter).name;
                BranchBinding {
                    field: idx,
                    channel: sink.register_array(&field.name, counter_name, field.leaf)?,
                    kind: BindingKind::Array,
                }
            }
        };
        bindings.push(binding);
    }

    tracing::debug!(scalars, vectors, tree = sink.name(), "registered branches");
    Ok(bindings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::RecordLayout;
    use crate::memory::MemoryTree;
    use crate::schema::parse_decls;

    #[test]
    fn descriptors() {
        assert_eq!(scalar_descriptor("met_pt", LeafType::F32), "met_pt/F");
        assert_eq!(scalar_descriptor("nJet", LeafType::I32), "nJet/I");
        assert_eq!(array_descriptor("Jet_pt", "nJet", LeafType::F32), "Jet_pt[nJet]/F");
    }

    #[test]
    fn bind_covers_every_field() {
        let decls = parse_decls(["nJet/I", "Jet[pt/F,eta/F]", "met_pt/F"]).unwrap();
        let layout = RecordLayout::compile(&decls).unwrap();
        let mut sink = MemoryTree::create("Events");

        let bindings = bind(&layout, &mut sink).unwrap();
        assert_eq!(bindings.len(), layout.n_fields());
        assert_eq!(
            sink.channel_names(),
            vec!["nJet", "met_pt", "Jet_pt", "Jet_eta"]
        );
        assert_eq!(sink.descriptor("Jet_eta"), Some("Jet_eta[nJet]/F"));
        assert_eq!(sink.descriptor("met_pt"), Some("met_pt/F"));
        assert_eq!(bindings[2].kind, BindingKind::Array);
    }

    #[test]
    fn rebind_against_second_sink_matches() {
        let decls = parse_decls(["MyJet[pt2/F]", "myMetOver2/F"]).unwrap();
        let layout = RecordLayout::compile(&decls).unwrap();

        let mut first = MemoryTree::create("Events");
        let mut second = MemoryTree::create("Events");
        bind(&layout, &mut first).unwrap();
        bind(&layout, &mut second).unwrap();
        assert_eq!(first.channel_names(), second.channel_names());
    }
}
