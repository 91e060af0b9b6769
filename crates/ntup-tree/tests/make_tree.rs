//! Integration tests: produce new trees from declaration lists end to end.

use std::cell::RefCell;
use std::rc::Rc;

use ntup_core::{StorageSink, TreeError};
use ntup_tree::{MakerConfig, MemoryTree, SharedSink, TreeMaker};

fn jet_maker() -> TreeMaker {
    TreeMaker::from_strings(&["nJet/I", "Jet[pt/F,eta/F]"], MakerConfig::default())
        .unwrap()
        .with_filler(|rec| {
            rec.set_i32("nJet", 2)?;
            rec.set_elem_f32("Jet_pt", 0, 10.0)?;
            rec.set_elem_f32("Jet_pt", 1, 20.0)?;
            rec.set_elem_f32("Jet_eta", 0, 0.1)?;
            rec.set_elem_f32("Jet_eta", 1, -0.2)?;
            Ok(())
        })
}

fn channel_names(maker: &TreeMaker) -> Vec<String> {
    maker.with_sink(|sink| sink.channel_names().iter().map(|s| s.to_string()).collect())
}

#[test]
fn fill_one_row_and_read_back() {
    let mut maker = jet_maker();
    maker.initialize();
    assert_eq!(maker.produce_one_row().unwrap(), 1);

    maker.with_sink(|sink| {
        assert_eq!(sink.n_rows(), 1, "owned sink seals one row per produce call");
        assert_eq!(sink.scalar_as_f64("nJet").unwrap(), vec![2.0]);

        let pt = sink.array_as_f64("Jet_pt").unwrap();
        assert_eq!(pt.row(0), &[10.0, 20.0]);
        let eta = sink.array_as_f64("Jet_eta").unwrap();
        assert_eq!(eta.row(0), &[0.1f32 as f64, -0.2f32 as f64]);
        assert_eq!(sink.descriptor("Jet_pt"), Some("Jet_pt[nJet]/F"));
    });
}

#[test]
fn invalid_declaration_rejected_at_construction() {
    let err =
        TreeMaker::<MemoryTree>::from_strings(&["met_pt/F", "not a variable"], MakerConfig::default())
            .unwrap_err();
    assert!(matches!(err, TreeError::Schema(_)), "got {err}");
}

#[test]
fn derive_new_variables_from_upstream() {
    // Mirrors the typical use: loop an upstream reader, write squared jet
    // pts and half the met into a new tree.
    struct Upstream {
        met_pt: f64,
        jet_pt: Vec<f32>,
    }
    let events = Rc::new(vec![
        Upstream { met_pt: 80.0, jet_pt: vec![10.0, 20.0] },
        Upstream { met_pt: 55.0, jet_pt: vec![35.5] },
        Upstream { met_pt: 60.0, jet_pt: vec![] },
    ]);
    let cursor = Rc::new(RefCell::new(0usize));

    let mut maker = TreeMaker::<MemoryTree>::from_strings(
        &["MyJet[pt2/F]", "myMetOver2/D"],
        MakerConfig::default(),
    )
    .unwrap();
    {
        let events = events.clone();
        let cursor = cursor.clone();
        maker.set_filler(move |rec| {
            let event = &events[*cursor.borrow()];
            rec.set_u32("nMyJet", event.jet_pt.len() as u32)?;
            for (i, pt) in event.jet_pt.iter().enumerate() {
                rec.set_elem_f32("MyJet_pt2", i, pt * pt)?;
            }
            rec.set_f64("myMetOver2", event.met_pt / 2.0)?;
            Ok(())
        });
    }

    maker.initialize();
    for i in 0..events.len() {
        *cursor.borrow_mut() = i;
        maker.produce_one_row().unwrap();
    }

    let sink = maker.into_sink().expect("owned sink");
    assert_eq!(sink.n_rows(), 3);
    assert_eq!(sink.scalar_as_f64("myMetOver2").unwrap(), vec![40.0, 27.5, 30.0]);
    assert_eq!(sink.scalar_as_f64("nMyJet").unwrap(), vec![2.0, 1.0, 0.0]);

    let pt2 = sink.array_as_f64("MyJet_pt2").unwrap();
    assert_eq!(pt2.row(0), &[100.0, 400.0]);
    assert_eq!(pt2.row(1), &[(35.5f32 * 35.5f32) as f64]);
    assert_eq!(pt2.row(2), &[] as &[f64]);
}

#[test]
fn clone_for_reuse_preserves_channel_layout() {
    let maker = jet_maker();
    let clone = maker.clone_for_reuse(None).unwrap();
    assert_eq!(channel_names(&maker), channel_names(&clone));
    assert_eq!(clone.position(), 0);
    assert!(!clone.is_external_sink());

    // The clone is fully usable without touching the original.
    let mut clone = clone;
    clone.initialize();
    clone.produce_one_row().unwrap();
    clone.with_sink(|sink| assert_eq!(sink.n_rows(), 1));
    maker.with_sink(|sink| assert_eq!(sink.n_rows(), 0));
}

#[test]
fn clone_onto_external_sink_commits_per_channel() {
    let maker = jet_maker();
    let external: SharedSink<MemoryTree> = Rc::new(RefCell::new(MemoryTree::create("Events")));

    let mut clone = maker.clone_for_reuse(Some(external.clone())).unwrap();
    assert!(clone.is_external_sink());

    clone.initialize();
    clone.produce_one_row().unwrap();
    clone.produce_one_row().unwrap();

    let sink = external.borrow();
    // Per-channel commits: every channel advanced twice, while the sealed
    // row count stays with whoever owns the sink.
    assert_eq!(sink.check_consistent().unwrap(), 2);
    assert_eq!(sink.n_rows(), 0);
    assert_eq!(sink.scalar_as_f64("nJet").unwrap(), vec![2.0, 2.0]);
}

#[test]
fn clone_onto_mismatched_sink_is_a_configuration_error() {
    let mut maker = jet_maker();
    let wrong: SharedSink<MemoryTree> = Rc::new(RefCell::new(MemoryTree::create("Skim")));

    let err = maker.clone_for_reuse(Some(wrong.clone())).unwrap_err();
    assert!(matches!(err, TreeError::Configuration(_)), "got {err}");

    // Neither side was mutated: the rejected sink has no channels and the
    // original maker still produces rows.
    assert!(wrong.borrow().channel_names().is_empty());
    maker.initialize();
    assert_eq!(maker.produce_one_row().unwrap(), 1);
}

#[test]
fn cursor_advances_only_on_success() {
    let mut maker =
        TreeMaker::<MemoryTree>::from_strings(&["x/F"], MakerConfig::default()).unwrap();
    let tick = Rc::new(RefCell::new(0u32));
    {
        let tick = tick.clone();
        maker.set_filler(move |rec| {
            let mut n = tick.borrow_mut();
            *n += 1;
            if *n % 2 == 0 {
                return Err("even calls fail".into());
            }
            rec.set_f32("x", *n as f32)?;
            Ok(())
        });
    }

    maker.initialize();
    assert_eq!(maker.produce_one_row().unwrap(), 1);
    assert!(maker.produce_one_row().is_err());
    assert_eq!(maker.produce_one_row().unwrap(), 1);

    assert_eq!(maker.position(), 2);
    maker.with_sink(|sink| {
        assert_eq!(sink.n_rows(), 2);
        assert_eq!(sink.scalar_as_f64("x").unwrap(), vec![1.0, 3.0]);
    });
}

#[test]
fn committed_row_does_not_leak_into_the_next() {
    let rows = Rc::new(vec![(2u32, [10.0f32, 20.0]), (0u32, [0.0, 0.0])]);
    let cursor = Rc::new(RefCell::new(0usize));
    let mut maker =
        TreeMaker::<MemoryTree>::from_strings(&["V[x/F]"], MakerConfig::default()).unwrap();
    {
        let rows = rows.clone();
        let cursor = cursor.clone();
        maker.set_filler(move |rec| {
            let (n, values) = rows[*cursor.borrow()];
            rec.set_u32("nV", n)?;
            for i in 0..n as usize {
                rec.set_elem_f32("V_x", i, values[i])?;
            }
            Ok(())
        });
    }

    maker.initialize();
    maker.produce_one_row().unwrap();
    *cursor.borrow_mut() = 1;
    maker.produce_one_row().unwrap();

    maker.with_sink(|sink| {
        let col = sink.array_as_f64("V_x").unwrap();
        assert_eq!(col.row(0), &[10.0, 20.0]);
        // Second row set the counter to zero, so nothing from row one leaks.
        assert_eq!(col.row(1), &[] as &[f64]);
        assert_eq!(sink.scalar_as_f64("nV").unwrap(), vec![2.0, 0.0]);
    });
}
