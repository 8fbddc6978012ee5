//! Integration tests for the default expression interpreter

use ember_foundation::{FactId, Value};
use ember_language::{Bindings, EvalError, Evaluator, Expr, ExprEvaluator, NoWorkingMemory, WorkingMemory};

/// Working memory that records what actions asked for.
#[derive(Default)]
struct Recorder {
    asserted: Vec<(String, Vec<(String, Value)>)>,
    retracted: Vec<FactId>,
    modified: Vec<(FactId, Vec<(String, Value)>)>,
    halted: bool,
}

impl WorkingMemory for Recorder {
    fn assert_fact(&mut self, template: &str, slots: Vec<(String, Value)>) -> Result<FactId, EvalError> {
        self.asserted.push((template.to_string(), slots));
        Ok(FactId::new(100 + self.asserted.len() as u64))
    }

    fn retract_fact(&mut self, id: FactId) -> Result<bool, EvalError> {
        self.retracted.push(id);
        Ok(true)
    }

    fn modify_fact(&mut self, id: FactId, changes: Vec<(String, Value)>) -> Result<FactId, EvalError> {
        self.modified.push((id, changes));
        Ok(id)
    }

    fn duplicate_fact(&mut self, _: FactId, _: Vec<(String, Value)>) -> Result<FactId, EvalError> {
        Ok(FactId::new(999))
    }

    fn fact_slot(&self, id: FactId, slot: &str) -> Option<Value> {
        (id == FactId::new(1) && slot == "age").then_some(Value::Int(42))
    }

    fn halt(&mut self) -> Result<(), EvalError> {
        self.halted = true;
        Ok(())
    }
}

fn eval(expr: &Expr) -> Result<Value, EvalError> {
    ExprEvaluator::new().evaluate(expr, &Bindings::new(), &mut NoWorkingMemory)
}

fn call(name: &str, args: Vec<Value>) -> Result<Value, EvalError> {
    eval(&Expr::call(name, args.into_iter().map(Expr::Const).collect()))
}

// =============================================================================
// Built-ins
// =============================================================================

#[test]
fn arithmetic_keeps_integers_until_a_float_appears() {
    assert_eq!(call("+", vec![1.into(), 2.into()]), Ok(Value::Int(3)));
    assert_eq!(call("*", vec![2.into(), 1.5.into()]), Ok(Value::Float(3.0)));
    assert_eq!(call("-", vec![5.into()]), Ok(Value::Int(-5)));
}

#[test]
fn comparisons_chain() {
    assert_eq!(call("<", vec![1.into(), 2.into(), 3.into()]), Ok(Value::Bool(true)));
    assert_eq!(call("<", vec![1.into(), 3.into(), 2.into()]), Ok(Value::Bool(false)));
    assert_eq!(call(">=", vec![2.into(), 2.0.into()]), Ok(Value::Bool(true)));
}

#[test]
fn eq_is_structural_and_typed() {
    assert_eq!(call("eq", vec![1.into(), 1.into()]), Ok(Value::Bool(true)));
    assert_eq!(call("eq", vec![1.into(), 1.0.into()]), Ok(Value::Bool(false)));
    assert_eq!(call("neq", vec!["a".into(), "b".into()]), Ok(Value::Bool(true)));
}

#[test]
fn mod_rejects_zero() {
    assert_eq!(call("mod", vec![7.into(), 0.into()]), Err(EvalError::DivisionByZero));
    assert_eq!(call("mod", vec![7.into(), 3.into()]), Ok(Value::Int(1)));
}

#[test]
fn multifield_helpers() {
    let list = Value::from(vec!["a", "b", "c"]);
    assert_eq!(call("length$", vec![list.clone()]), Ok(Value::Int(3)));
    assert_eq!(call("nth$", vec![2.into(), list.clone()]), Ok(Value::from("b")));
    assert_eq!(call("member$", vec!["c".into(), list.clone()]), Ok(Value::Int(3)));
    assert_eq!(call("member$", vec!["z".into(), list]), Ok(Value::Bool(false)));
    assert_eq!(
        call("create$", vec![1.into(), Value::from(vec![2, 3])]),
        Ok(Value::from(vec![1, 2, 3]))
    );
}

#[test]
fn str_cat_drops_quotes() {
    assert_eq!(
        call("str-cat", vec!["a".into(), Value::symbol("b"), 3.into()]),
        Ok(Value::from("ab3"))
    );
}

#[test]
fn connectives_short_circuit() {
    let guarded = Expr::call("and", vec![Expr::constant(false), Expr::var("missing")]);
    assert_eq!(eval(&guarded), Ok(Value::Bool(false)));
    let guarded = Expr::call("or", vec![Expr::constant(true), Expr::var("missing")]);
    assert_eq!(eval(&guarded), Ok(Value::Bool(true)));
}

#[test]
fn errors_name_the_problem() {
    assert!(matches!(eval(&Expr::var("x")), Err(EvalError::UnboundVariable(_))));
    assert!(matches!(call("frobnicate", vec![]), Err(EvalError::UnknownFunction(_))));
    assert!(matches!(
        call("+", vec![1.into(), "x".into()]),
        Err(EvalError::TypeMismatch { .. })
    ));
}

#[test]
fn if_picks_a_branch() {
    let e = Expr::If {
        cond: Box::new(Expr::call(">", vec![Expr::var("x"), Expr::constant(0)])),
        then: vec![Expr::constant("pos")],
        otherwise: vec![Expr::constant("neg")],
    };
    let b: Bindings = [("x", Value::Int(-1))].into_iter().collect();
    let v = ExprEvaluator::new().evaluate(&e, &b, &mut NoWorkingMemory);
    assert_eq!(v, Ok(Value::from("neg")));
}

// =============================================================================
// Host Functions
// =============================================================================

fn double(args: &[Value]) -> Result<Value, EvalError> {
    match args {
        [Value::Int(n)] => Ok(Value::Int(n * 2)),
        _ => Err(EvalError::Host("double takes one integer".into())),
    }
}

#[test]
fn host_functions_are_callable() {
    let ev = ExprEvaluator::new().with_function("double", double);
    let v = ev.evaluate(
        &Expr::call("double", vec![Expr::constant(21)]),
        &Bindings::new(),
        &mut NoWorkingMemory,
    );
    assert_eq!(v, Ok(Value::Int(42)));
}

// =============================================================================
// Working Memory Actions
// =============================================================================

#[test]
fn actions_reach_working_memory() {
    let ev = ExprEvaluator::new();
    let mut wm = Recorder::default();
    let b: Bindings = [("f", Value::FactAddress(FactId::new(1))), ("n", Value::Int(7))]
        .into_iter()
        .collect();

    let id = ev
        .evaluate(&Expr::assert("seen", vec![("n", Expr::var("n"))]), &b, &mut wm)
        .unwrap();
    assert_eq!(id, Value::FactAddress(FactId::new(101)));
    assert_eq!(wm.asserted[0].1, vec![("n".to_string(), Value::Int(7))]);

    ev.evaluate(&Expr::modify("f", vec![("n", Expr::constant(0))]), &b, &mut wm)
        .unwrap();
    assert_eq!(wm.modified[0].0, FactId::new(1));

    ev.evaluate(&Expr::retract("f"), &b, &mut wm).unwrap();
    assert_eq!(wm.retracted, vec![FactId::new(1)]);

    ev.evaluate(&Expr::call("halt", vec![]), &b, &mut wm).unwrap();
    assert!(wm.halted);
}

#[test]
fn fact_slot_value_reads_through_memory() {
    let mut wm = Recorder::default();
    let e = Expr::call(
        "fact-slot-value",
        vec![Expr::constant(FactId::new(1)), Expr::symbol("age")],
    );
    assert_eq!(
        ExprEvaluator::new().evaluate(&e, &Bindings::new(), &mut wm),
        Ok(Value::Int(42))
    );
}

#[test]
fn retract_needs_a_fact_address() {
    let b: Bindings = [("f", Value::from("nope"))].into_iter().collect();
    let result = ExprEvaluator::new().evaluate(&Expr::retract("f"), &b, &mut Recorder::default());
    assert!(matches!(result, Err(EvalError::TypeMismatch { .. })));
}

#[test]
fn free_vars_walks_the_tree() {
    let e = Expr::call("+", vec![Expr::var("a"), Expr::call("*", vec![Expr::var("b"), Expr::var("a")])]);
    let vars: Vec<_> = e.free_vars().into_iter().collect();
    assert_eq!(vars, vec!["a", "b"]);
}
