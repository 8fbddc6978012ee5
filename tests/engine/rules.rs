//! Integration tests for rule compilation and lifecycle

use ember_engine::{ConditionElement, Pattern, Rule, SeqItem, SlotTest};
use ember_foundation::{ErrorKind, Value};
use ember_language::Expr;

use crate::engine;

fn is_invalid_pattern(err: &ember_foundation::Error) -> bool {
    matches!(err.kind, ErrorKind::InvalidPattern { .. })
}

// =============================================================================
// Validation
// =============================================================================

#[test]
fn unknown_template_is_rejected() {
    let mut e = engine();
    let err = e.add_rule(Rule::new("r").with_pattern(Pattern::new("ghost"))).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::UnknownTemplate(_)));
}

#[test]
fn unknown_slot_is_rejected() {
    let mut e = engine();
    let err = e
        .add_rule(Rule::new("r").with_pattern(Pattern::new("a").with_const("w", 1)))
        .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::UnknownSlot { .. }));
}

#[test]
fn sequence_on_single_slot_is_rejected() {
    let mut e = engine();
    let err = e
        .add_rule(Rule::new("r").with_pattern(
            Pattern::new("a").with("v", SlotTest::Sequence(vec![SeqItem::Multi(None)])),
        ))
        .unwrap_err();
    assert!(is_invalid_pattern(&err));
}

#[test]
fn test_on_unbound_variable_is_rejected() {
    let mut e = engine();
    let err = e
        .add_rule(
            Rule::new("r")
                .with_test(Expr::call(">", vec![Expr::var("x"), Expr::constant(0)]))
                .with_pattern(Pattern::new("a").with_var("v", "x")),
        )
        .unwrap_err();
    assert!(is_invalid_pattern(&err));
}

#[test]
fn variables_inside_not_stay_local() {
    let mut e = engine();
    let err = e
        .add_rule(
            Rule::new("r")
                .with_pattern(Pattern::new("a").with_var("v", "x").negated())
                .with_test(Expr::call(">", vec![Expr::var("x"), Expr::constant(0)])),
        )
        .unwrap_err();
    assert!(is_invalid_pattern(&err));
}

#[test]
fn not_and_exists_together_is_rejected() {
    let mut e = engine();
    let err = e
        .add_rule(Rule::new("r").with_pattern(Pattern::new("a").negated().exists()))
        .unwrap_err();
    assert!(is_invalid_pattern(&err));
}

#[test]
fn empty_or_is_rejected() {
    let mut e = engine();
    let err = e.add_rule(Rule::new("r").with_or(vec![])).unwrap_err();
    assert!(is_invalid_pattern(&err));
}

#[test]
fn rejected_rule_can_be_fixed_and_added() {
    let mut e = engine();
    assert!(e.add_rule(Rule::new("r").with_pattern(Pattern::new("ghost"))).is_err());
    e.add_rule(Rule::new("r").with_pattern(Pattern::new("a"))).unwrap();
    assert_eq!(e.rules().count(), 1);
}

// =============================================================================
// Priming and Removal
// =============================================================================

#[test]
fn new_rule_sees_existing_facts() {
    let mut e = engine();
    e.assert_fact("a", [("v", Value::Int(1))]).unwrap();
    e.assert_fact("b", [("v", Value::Int(1))]).unwrap();
    e.add_rule(
        Rule::new("join")
            .with_pattern(Pattern::new("a").with_var("v", "x"))
            .with_pattern(Pattern::new("b").with_var("v", "x")),
    )
    .unwrap();
    assert_eq!(e.agenda().len(), 1);
}

#[test]
fn removing_a_rule_clears_everything_it_owned() {
    let mut e = engine();
    e.add_rule(Rule::new("keep").with_pattern(Pattern::new("a"))).unwrap();
    e.add_rule(
        Rule::new("drop")
            .with_pattern(Pattern::new("a"))
            .with_pattern(Pattern::new("b").negated()),
    )
    .unwrap();
    e.assert_fact("a", [("v", Value::Int(1))]).unwrap();
    assert_eq!(e.agenda().len(), 2);
    assert_eq!(e.alpha_memory_count(), 2);

    assert!(e.remove_rule("drop"));
    assert!(!e.remove_rule("drop"));
    assert_eq!(e.agenda().len(), 1);
    assert_eq!(e.alpha_memory_count(), 1);
    assert_eq!(e.token_count(), 1);
    assert!(e.rule("drop").is_none());
    assert!(!e.network().has_rule("drop"));
}

#[test]
fn identical_patterns_share_an_alpha_memory() {
    let mut e = engine();
    e.add_rule(Rule::new("r1").with_pattern(Pattern::new("a").with_const("v", 1)))
        .unwrap();
    e.add_rule(Rule::new("r2").with_pattern(Pattern::new("a").with_const("v", 1)))
        .unwrap();
    e.add_rule(Rule::new("r3").with_pattern(Pattern::new("a").with_const("v", 2)))
        .unwrap();
    assert_eq!(e.alpha_memory_count(), 2);
}

#[test]
fn rule_with_no_conditions_fires_once() {
    let mut e = engine();
    e.add_rule(
        Rule::new("startup").with_action(Expr::assert("mark", vec![("tag", Expr::symbol("ready"))])),
    )
    .unwrap();
    assert_eq!(e.run(None), 1);
    assert_eq!(e.run(None), 0);
    assert_eq!(e.facts_of("mark").count(), 1);
}

// =============================================================================
// OR and Test Conditions
// =============================================================================

#[test]
fn or_alternatives_each_activate() {
    let mut e = engine();
    e.add_rule(Rule::new("either").with_or(vec![
        Pattern::new("a").with_var("v", "x").into(),
        Pattern::new("b").with_var("v", "x").into(),
    ]))
    .unwrap();
    e.assert_fact("a", [("v", Value::Int(1))]).unwrap();
    e.assert_fact("b", [("v", Value::Int(2))]).unwrap();
    assert_eq!(e.agenda().len(), 2);
}

#[test]
fn or_alternatives_matching_the_same_facts_activate_once() {
    let mut e = engine();
    e.add_rule(Rule::new("overlap").with_or(vec![
        Pattern::new("n").with_const("v", 1).into(),
        Pattern::new("n")
            .with("v", SlotTest::Predicate(Expr::call("<", vec![Expr::var("_"), Expr::constant(5)])))
            .into(),
    ]))
    .unwrap();
    let id = e.assert_fact("n", [("v", Value::Int(1))]).unwrap();
    assert_eq!(e.agenda().len(), 1);
    assert_eq!(e.network().production("overlap").unwrap().support(&[id]), 2);
    assert_eq!(e.run(None), 1);
}

#[test]
fn and_group_inside_or() {
    let mut e = engine();
    e.add_rule(Rule::new("both-or-n").with_or(vec![
        ConditionElement::And(vec![
            Pattern::new("a").with_var("v", "x").into(),
            Pattern::new("b").with_var("v", "x").into(),
        ]),
        Pattern::new("n").into(),
    ]))
    .unwrap();
    e.assert_fact("a", [("v", Value::Int(1))]).unwrap();
    assert!(e.agenda().is_empty());
    e.assert_fact("b", [("v", Value::Int(1))]).unwrap();
    assert_eq!(e.agenda().len(), 1);
    e.assert_fact("n", [("v", Value::Int(0))]).unwrap();
    assert_eq!(e.agenda().len(), 2);
}

#[test]
fn test_condition_filters_joined_tokens() {
    let mut e = engine();
    e.add_rule(
        Rule::new("greater")
            .with_pattern(Pattern::new("a").with_var("v", "x"))
            .with_pattern(Pattern::new("b").with_var("v", "y"))
            .with_test(Expr::call(">", vec![Expr::var("x"), Expr::var("y")])),
    )
    .unwrap();
    for v in [1, 5] {
        e.assert_fact("a", [("v", Value::Int(v))]).unwrap();
        e.assert_fact("b", [("v", Value::Int(v))]).unwrap();
    }
    assert_eq!(e.agenda().len(), 1);
    let b = &e.agenda().peek().unwrap().bindings;
    assert_eq!((b.get("x"), b.get("y")), (Some(&Value::Int(5)), Some(&Value::Int(1))));
}
