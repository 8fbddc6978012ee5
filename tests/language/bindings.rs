//! Integration tests for variable bindings

use ember_foundation::Value;
use ember_language::Bindings;

#[test]
fn with_leaves_original_untouched() {
    let base: Bindings = [("x", Value::Int(1))].into_iter().collect();
    let extended = base.with("y", Value::Int(2));
    assert_eq!(base.len(), 1);
    assert_eq!(extended.len(), 2);
    assert_eq!(extended.get("x"), Some(&Value::Int(1)));
}

#[test]
fn key_values_require_every_variable() {
    let b: Bindings = [("x", Value::Int(1)), ("y", Value::Int(2))]
        .into_iter()
        .collect();
    assert_eq!(
        b.key_values(&["y".to_string(), "x".to_string()]),
        Some(vec![Value::Int(2), Value::Int(1)])
    );
    assert_eq!(b.key_values(&["z".to_string()]), None);
    assert_eq!(b.key_values(&[]), Some(vec![]));
}

#[test]
fn agreement_ignores_disjoint_variables() {
    let a: Bindings = [("x", Value::Int(1))].into_iter().collect();
    let b: Bindings = [("x", Value::Int(1)), ("y", Value::Int(5))]
        .into_iter()
        .collect();
    let c: Bindings = [("x", Value::Int(2))].into_iter().collect();
    assert!(a.agrees_with(&b));
    assert!(!a.agrees_with(&c));
}

#[test]
fn debug_shows_sigils() {
    let b: Bindings = [("x", Value::Int(1))].into_iter().collect();
    assert_eq!(format!("{b:?}"), "{\"?x\": 1}");
}
