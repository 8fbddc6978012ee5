//! Integration tests for the fact store

use ember_foundation::{ErrorKind, FactId, Value};
use ember_language::{ExprEvaluator, WorkingMemory};
use ember_storage::{FactStore, Template};
use proptest::prelude::*;

fn store() -> FactStore {
    let mut store = FactStore::new();
    store
        .define_template(Template::new("point").with_field("x").with_field("y"))
        .unwrap();
    store
        .define_template(Template::new("tag").with_field("name"))
        .unwrap();
    store
}

fn point(store: &mut FactStore, x: i64, y: i64) -> FactId {
    let slots = store
        .prepare(
            "point",
            vec![("x".into(), Value::Int(x)), ("y".into(), Value::Int(y))],
            &ExprEvaluator::new(),
        )
        .unwrap();
    store.insert("point", slots).id
}

// =============================================================================
// Templates
// =============================================================================

#[test]
fn duplicate_template_is_rejected() {
    let mut s = store();
    let err = s.define_template(Template::new("point")).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::DuplicateTemplate(_)));
}

#[test]
fn unknown_template_is_rejected() {
    let s = store();
    let err = s
        .prepare("ghost", Vec::new(), &ExprEvaluator::new())
        .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::UnknownTemplate(_)));
}

// =============================================================================
// Fact Lifecycle
// =============================================================================

#[test]
fn ids_start_at_one_and_are_never_reused() {
    let mut s = store();
    let a = point(&mut s, 0, 0);
    assert_eq!(a, FactId::new(1));
    s.remove(a);
    let b = point(&mut s, 0, 0);
    assert_eq!(b, FactId::new(2));
}

#[test]
fn facts_are_indexed_by_template() {
    let mut s = store();
    point(&mut s, 1, 1);
    let slots = s
        .prepare("tag", vec![("name".into(), "t".into())], &ExprEvaluator::new())
        .unwrap();
    s.insert("tag", slots);
    point(&mut s, 2, 2);
    assert_eq!(s.of_template("point").count(), 2);
    assert_eq!(s.of_template("tag").count(), 1);
    assert_eq!(s.of_template("ghost").count(), 0);
}

#[test]
fn find_equal_matches_contents() {
    let mut s = store();
    let id = point(&mut s, 3, 4);
    let wanted = s
        .prepare(
            "point",
            vec![("x".into(), Value::Int(3)), ("y".into(), Value::Int(4))],
            &ExprEvaluator::new(),
        )
        .unwrap();
    assert_eq!(s.find_equal("point", &wanted), Some(id));
    assert_eq!(s.find_equal("tag", &wanted), None);
}

#[test]
fn revision_keeps_unchanged_slots() {
    let mut s = store();
    let id = point(&mut s, 1, 2);
    let (template, slots) = s
        .prepare_revision(id, vec![("y".into(), Value::Int(9))])
        .unwrap();
    assert_eq!(template, "point");
    assert_eq!(slots["x"], Value::Int(1));
    assert_eq!(slots["y"], Value::Int(9));
    assert!(s.prepare_revision(FactId::new(42), Vec::new()).is_err());
}

#[test]
fn reinsert_keeps_id_with_newer_timetag() {
    let mut s = store();
    let id = point(&mut s, 1, 2);
    let old = s.remove(id).unwrap();
    let new = s.reinsert(id, "point", old.slots.clone());
    assert_eq!(new.id, id);
    assert!(new.timetag > old.timetag);
}

// =============================================================================
// Read-only View
// =============================================================================

#[test]
fn view_reads_but_never_writes() {
    let mut s = store();
    let id = point(&mut s, 5, 6);
    let mut view = s.view();
    assert_eq!(view.fact_slot(id, "x"), Some(Value::Int(5)));
    assert!(view.retract_fact(id).is_err());
    assert!(view.assert_fact("point", Vec::new()).is_err());
    assert!(view.halt().is_err());
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #[test]
    fn live_count_tracks_inserts_and_removes(
        ops in prop::collection::vec(any::<bool>(), 1..60)
    ) {
        let mut s = store();
        let mut live: Vec<FactId> = Vec::new();
        for (i, insert) in ops.into_iter().enumerate() {
            if insert || live.is_empty() {
                live.push(point(&mut s, i64::try_from(i).unwrap(), 0));
            } else {
                let id = live.remove(0);
                prop_assert!(s.remove(id).is_some());
                prop_assert!(s.remove(id).is_none());
            }
            prop_assert_eq!(s.len(), live.len());
            prop_assert_eq!(s.of_template("point").count(), live.len());
        }
    }

    #[test]
    fn timetags_strictly_increase(count in 1usize..40) {
        let mut s = store();
        let mut last = 0;
        for i in 0..count {
            let id = point(&mut s, i64::try_from(i).unwrap(), 0);
            let tag = s.get(id).unwrap().timetag;
            prop_assert!(tag > last);
            last = tag;
        }
    }
}
