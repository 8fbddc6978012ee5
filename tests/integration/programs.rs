//! Whole rule programs driven through assert, run, and RHS actions

use ember_engine::{Engine, EngineConfig, Pattern, Rule, SlotTest};
use ember_foundation::{ErrorKind, Value};
use ember_language::{EvalError, Expr, ExprEvaluator};
use ember_storage::{SlotDef, Template};

fn var(name: &str) -> Expr {
    Expr::var(name)
}

fn call(name: &str, args: Vec<Expr>) -> Expr {
    Expr::call(name, args)
}

// =============================================================================
// Chaining
// =============================================================================

#[test]
fn counter_modifies_itself_to_a_bound() {
    let mut e = Engine::new();
    e.define_template(Template::new("counter").with_slot("n", SlotDef::single().with_default(0)))
        .unwrap();
    e.add_rule(
        Rule::new("increment")
            .with_pattern(Pattern::new("counter").bind_fact("c").with(
                "n",
                SlotTest::And(vec![
                    SlotTest::var("n"),
                    SlotTest::Predicate(call("<", vec![var("n"), Expr::constant(10)])),
                ]),
            ))
            .with_action(Expr::modify(
                "c",
                vec![("n", call("+", vec![var("n"), Expr::constant(1)]))],
            )),
    )
    .unwrap();
    let id = e.assert_fact("counter", Vec::<(String, Value)>::new()).unwrap();
    assert_eq!(e.run(None), 10);
    assert_eq!(e.fact(id).unwrap().slot("n"), Some(&Value::Int(10)));
    assert_eq!(e.fact_count(), 1);
}

#[test]
fn maximum_found_through_negation() {
    let mut e = Engine::new();
    e.define_template(Template::new("num").with_field("v")).unwrap();
    e.define_template(Template::new("max").with_field("v")).unwrap();
    e.add_rule(
        Rule::new("find-max")
            .with_pattern(Pattern::new("num").with_var("v", "m"))
            .with_pattern(
                Pattern::new("num")
                    .with("v", SlotTest::Predicate(call(">", vec![var("_"), var("m")])))
                    .negated(),
            )
            .with_action(Expr::assert("max", vec![("v", var("m"))])),
    )
    .unwrap();
    for v in [7, 3, 19, 4, 11] {
        e.assert_fact("num", [("v", Value::Int(v))]).unwrap();
    }
    assert_eq!(e.agenda().len(), 1);
    assert_eq!(e.run(None), 1);
    let max: Vec<_> = e.facts_of("max").filter_map(|f| f.slot("v").cloned()).collect();
    assert_eq!(max, vec![Value::Int(19)]);
}

#[test]
fn ancestors_close_transitively() {
    let mut e = Engine::new();
    e.define_template(Template::new("parent").with_field("of").with_field("is"))
        .unwrap();
    e.define_template(Template::new("ancestor").with_field("of").with_field("is"))
        .unwrap();
    let link = |from: &str, to: &str| {
        Pattern::new("ancestor").with_var("of", from).with_var("is", to)
    };
    e.add_rule(
        Rule::new("direct")
            .with_pattern(Pattern::new("parent").with_var("of", "x").with_var("is", "y"))
            .with_pattern(link("x", "y").negated())
            .with_action(Expr::assert("ancestor", vec![("of", var("x")), ("is", var("y"))])),
    )
    .unwrap();
    e.add_rule(
        Rule::new("indirect")
            .with_pattern(link("x", "y"))
            .with_pattern(Pattern::new("parent").with_var("of", "y").with_var("is", "z"))
            .with_pattern(link("x", "z").negated())
            .with_action(Expr::assert("ancestor", vec![("of", var("x")), ("is", var("z"))])),
    )
    .unwrap();
    for (child, parent) in [("d", "c"), ("c", "b"), ("b", "a")] {
        e.assert_fact("parent", [("of", child.into()), ("is", parent.into())])
            .unwrap();
    }
    e.run(None);
    assert_eq!(e.facts_of("ancestor").count(), 6);
    assert!(e.agenda().is_empty());
}

// =============================================================================
// Actions and Errors
// =============================================================================

#[test]
fn rhs_constraint_violation_leaves_no_fact() {
    let mut e = Engine::new();
    e.define_template(Template::new("in").with_field("v")).unwrap();
    e.define_template(
        Template::new("out").with_slot("v", SlotDef::single().with_range(0.0, 10.0)),
    )
    .unwrap();
    e.add_rule(
        Rule::new("copy")
            .with_pattern(Pattern::new("in").with_var("v", "x"))
            .with_action(Expr::assert("out", vec![("v", var("x"))])),
    )
    .unwrap();
    e.assert_fact("in", [("v", Value::Int(5))]).unwrap();
    e.assert_fact("in", [("v", Value::Int(50))]).unwrap();
    assert_eq!(e.run(None), 2);
    assert_eq!(e.facts_of("out").count(), 1);
    assert_eq!(e.last_errors().len(), 1);
    let err = &e.last_errors()[0];
    assert!(matches!(err.kind, ErrorKind::Eval(_)));
    assert_eq!(err.context.as_ref().and_then(|c| c.rule.as_deref()), Some("copy"));
    assert_eq!(e.stats().action_errors, 1);
}

#[test]
fn top_level_constraint_violation_changes_nothing() {
    let mut e = Engine::new();
    e.define_template(Template::new("t").with_slot("v", SlotDef::single().with_types([ember_foundation::TypeTag::Int])))
        .unwrap();
    e.add_rule(Rule::new("r").with_pattern(Pattern::new("t"))).unwrap();
    let next = e.assert_fact("t", [("v", Value::Int(1))]).unwrap();
    let err = e.assert_fact("t", [("v", "x".into())]).unwrap_err();
    assert!(err.is_constraint_violation());
    assert_eq!(e.fact_count(), 1);
    assert_eq!(e.agenda().len(), 1);
    let after = e.assert_fact("t", [("v", Value::Int(2))]).unwrap();
    assert_eq!(after, next.next());
}

#[test]
fn dedup_mode_collapses_rhs_asserts() {
    let mut e = Engine::with_config(EngineConfig::default().with_fact_duplication(false));
    e.define_template(Template::new("go").with_field("v")).unwrap();
    e.define_template(Template::new("done").with_field("v")).unwrap();
    for name in ["first", "second"] {
        e.add_rule(
            Rule::new(name)
                .with_pattern(Pattern::new("go"))
                .with_action(Expr::assert("done", vec![("v", Expr::constant(1))])),
        )
        .unwrap();
    }
    e.assert_fact("go", [("v", Value::Int(0))]).unwrap();
    assert_eq!(e.run(None), 2);
    assert_eq!(e.facts_of("done").count(), 1);
}

#[test]
fn duplicate_copies_with_changes() {
    let mut e = Engine::new();
    e.define_template(Template::new("item").with_field("name").with_field("copy"))
        .unwrap();
    e.add_rule(
        Rule::new("clone")
            .with_pattern(Pattern::new("item").bind_fact("f").with_const("copy", false))
            .with_action(Expr::duplicate("f", vec![("copy", Expr::constant(true))])),
    )
    .unwrap();
    e.assert_fact("item", [("name", "lamp".into()), ("copy", Value::Bool(false))])
        .unwrap();
    assert_eq!(e.run(None), 1);
    let copies: Vec<_> = e
        .facts_of("item")
        .map(|f| (f.slot("name").cloned(), f.slot("copy").cloned()))
        .collect();
    assert_eq!(
        copies,
        vec![
            (Some("lamp".into()), Some(Value::Bool(false))),
            (Some("lamp".into()), Some(Value::Bool(true))),
        ]
    );
}

#[test]
fn retracting_a_fact_cancels_pending_work() {
    let mut e = Engine::new();
    e.define_template(Template::new("job").with_field("id")).unwrap();
    e.define_template(Template::new("cancel").with_field("id")).unwrap();
    e.add_rule(
        Rule::new("do-job")
            .with_salience(-1)
            .with_pattern(Pattern::new("job").with_var("id", "j")),
    )
    .unwrap();
    e.add_rule(
        Rule::new("cancel-job")
            .with_pattern(Pattern::new("cancel").with_var("id", "j"))
            .with_pattern(Pattern::new("job").bind_fact("f").with_var("id", "j"))
            .with_action(Expr::retract("f")),
    )
    .unwrap();
    for id in 1..=3 {
        e.assert_fact("job", [("id", Value::Int(id))]).unwrap();
    }
    e.assert_fact("cancel", [("id", Value::Int(2))]).unwrap();
    assert_eq!(e.run(None), 3);
    assert_eq!(e.facts_of("job").count(), 2);
    assert_eq!(e.stats().fires, 3);
}

#[test]
fn halt_leaves_the_rest_for_the_next_run() {
    let mut e = Engine::new();
    e.define_template(Template::new("task").with_field("n")).unwrap();
    e.add_rule(
        Rule::new("work")
            .with_pattern(Pattern::new("task").with_var("n", "n"))
            .with_action(Expr::If {
                cond: Box::new(call("=", vec![var("n"), Expr::constant(2)])),
                then: vec![call("halt", vec![])],
                otherwise: vec![],
            }),
    )
    .unwrap();
    for n in 1..=3 {
        e.assert_fact("task", [("n", Value::Int(n))]).unwrap();
    }
    // Depth order fires 3, then 2 which halts.
    assert_eq!(e.run(None), 2);
    assert_eq!(e.agenda().len(), 1);
    assert_eq!(e.run(None), 1);
}

#[test]
fn reset_clears_facts_and_activations() {
    let mut e = Engine::new();
    e.define_template(Template::new("t").with_field("v")).unwrap();
    e.add_rule(Rule::new("r").with_pattern(Pattern::new("t"))).unwrap();
    e.assert_fact("t", [("v", Value::Int(1))]).unwrap();
    e.reset();
    assert!(e.agenda().is_empty());
    assert_eq!(e.token_count(), 0);
    e.assert_fact("t", [("v", Value::Int(1))]).unwrap();
    assert_eq!(e.run(None), 1);
}

// =============================================================================
// Host Functions
// =============================================================================

fn square(args: &[Value]) -> Result<Value, EvalError> {
    match args {
        [Value::Int(n)] => Ok(Value::Int(n * n)),
        _ => Err(EvalError::Host("square takes one integer".into())),
    }
}

#[test]
fn host_functions_work_in_predicates_and_actions() {
    let evaluator = ExprEvaluator::new().with_function("square", square);
    let mut e = Engine::with_evaluator(EngineConfig::default(), evaluator);
    e.define_template(Template::new("n").with_field("v")).unwrap();
    e.define_template(Template::new("sq").with_field("v")).unwrap();
    e.add_rule(
        Rule::new("small-squares")
            .with_pattern(Pattern::new("n").with(
                "v",
                SlotTest::And(vec![
                    SlotTest::var("x"),
                    SlotTest::Predicate(call(
                        "<",
                        vec![call("square", vec![var("x")]), Expr::constant(20)],
                    )),
                ]),
            ))
            .with_action(Expr::assert("sq", vec![("v", call("square", vec![var("x")]))])),
    )
    .unwrap();
    for v in 1..=5 {
        e.assert_fact("n", [("v", Value::Int(v))]).unwrap();
    }
    assert_eq!(e.run(None), 4);
    let mut squares: Vec<_> = e
        .facts_of("sq")
        .filter_map(|f| f.slot("v").and_then(Value::as_int))
        .collect();
    squares.sort_unstable();
    assert_eq!(squares, vec![1, 4, 9, 16]);
}
