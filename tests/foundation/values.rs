//! Integration tests for Value types
//!
//! Tests Value variants, equality, hashing, ordering, display, and conversions.

use ember_foundation::{FactId, TypeTag, Value};
use std::collections::HashSet;

// =============================================================================
// Truthiness
// =============================================================================

#[test]
fn void_and_false_are_falsy() {
    assert!(!Value::Void.is_truthy());
    assert!(!Value::Bool(false).is_truthy());
    assert!(!Value::symbol("FALSE").is_truthy());
}

#[test]
fn everything_else_is_truthy() {
    assert!(Value::Int(0).is_truthy());
    assert!(Value::Str(String::new()).is_truthy());
    assert!(Value::List(vec![]).is_truthy());
    assert!(Value::symbol("nil").is_truthy());
}

// =============================================================================
// Equality and Hashing
// =============================================================================

#[test]
fn int_and_float_are_distinct() {
    assert_ne!(Value::Int(1), Value::Float(1.0));
}

#[test]
fn string_and_symbol_are_distinct() {
    assert_ne!(Value::from("red"), Value::symbol("red"));
}

#[test]
fn lists_compare_structurally() {
    let a = Value::from(vec![1, 2, 3]);
    let b = Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
    assert_eq!(a, b);
    assert_ne!(a, Value::from(vec![3, 2, 1]));
}

#[test]
fn equal_values_hash_equal() {
    let set: HashSet<Value> = [
        Value::Float(0.5),
        Value::Float(0.5),
        Value::from(vec!["a", "b"]),
        Value::from(vec!["a", "b"]),
    ]
    .into_iter()
    .collect();
    assert_eq!(set.len(), 2);
}

// =============================================================================
// Ordering
// =============================================================================

#[test]
fn numbers_compare_across_int_and_float() {
    assert!(Value::Int(2) < Value::Float(2.5));
    assert!(Value::Float(3.5) > Value::Int(3));
}

#[test]
fn unrelated_types_are_unordered() {
    assert_eq!(Value::Int(1).partial_cmp(&Value::from("1")), None);
}

// =============================================================================
// Accessors and Display
// =============================================================================

#[test]
fn accessors_match_variants() {
    assert_eq!(Value::Int(4).as_int(), Some(4));
    assert_eq!(Value::Int(4).as_number(), Some(4.0));
    assert_eq!(Value::from("x").as_str(), Some("x"));
    assert_eq!(Value::from(FactId::new(3)).as_fact(), Some(FactId::new(3)));
    assert_eq!(Value::Float(1.5).as_int(), None);
}

#[test]
fn type_tags_follow_variants() {
    assert_eq!(Value::Void.type_tag(), TypeTag::Void);
    assert_eq!(Value::from(vec![1]).type_tag(), TypeTag::List);
    assert!(TypeTag::Float.is_numeric());
    assert_eq!(TypeTag::List.to_string(), "MULTIFIELD");
}

#[test]
fn display_uses_clips_notation() {
    assert_eq!(Value::Bool(true).to_string(), "TRUE");
    assert_eq!(Value::from("hi").to_string(), "\"hi\"");
    assert_eq!(Value::from(vec![1, 2]).to_string(), "(1 2)");
    assert_eq!(Value::from(FactId::new(7)).to_string(), "<Fact-7>");
}

#[test]
fn fact_ids_count_up() {
    let id = FactId::new(1);
    assert_eq!(id.next(), FactId::new(2));
    assert!(id < id.next());
    assert_eq!(id.to_string(), "f-1");
}
