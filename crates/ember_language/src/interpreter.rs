//! A small recursive-descent interpreter over [`Expr`].
//!
//! The function set is deliberately minimal: comparison, arithmetic, boolean
//! connectives, a few multifield helpers, and the working-memory actions.
//! Hosts extend it with [`ExprEvaluator::with_function`].

use std::collections::HashMap;

use ember_foundation::{FactId, Value};

use crate::bindings::Bindings;
use crate::eval::{EvalError, Evaluator, WorkingMemory};
use crate::expr::Expr;

/// Native function callable from expressions.
#[derive(Clone, Copy)]
pub struct NativeFn {
    /// Function name for debugging.
    pub name: &'static str,
    /// Function pointer.
    pub func: fn(&[Value]) -> Result<Value, EvalError>,
}

impl std::fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NativeFn({})", self.name)
    }
}

/// Default expression evaluator.
#[derive(Clone, Debug, Default)]
pub struct ExprEvaluator {
    functions: HashMap<String, NativeFn>,
}

impl ExprEvaluator {
    /// Creates an evaluator with only the built-in functions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a host function, shadowing any built-in of the same name.
    #[must_use]
    pub fn with_function(
        mut self,
        name: &'static str,
        func: fn(&[Value]) -> Result<Value, EvalError>,
    ) -> Self {
        self.functions
            .insert(name.to_string(), NativeFn { name, func });
        self
    }

    fn eval_slots(
        &self,
        slots: &[(String, Expr)],
        bindings: &Bindings,
        memory: &mut dyn WorkingMemory,
    ) -> Result<Vec<(String, Value)>, EvalError> {
        slots
            .iter()
            .map(|(name, e)| Ok((name.clone(), self.evaluate(e, bindings, memory)?)))
            .collect()
    }

    fn eval_fact(
        &self,
        expr: &Expr,
        bindings: &Bindings,
        memory: &mut dyn WorkingMemory,
        function: &str,
    ) -> Result<FactId, EvalError> {
        let value = self.evaluate(expr, bindings, memory)?;
        fact_arg(function, &value)
    }

    fn eval_body(
        &self,
        body: &[Expr],
        bindings: &Bindings,
        memory: &mut dyn WorkingMemory,
    ) -> Result<Value, EvalError> {
        let mut last = Value::Void;
        for e in body {
            last = self.evaluate(e, bindings, memory)?;
        }
        Ok(last)
    }

    fn call(
        &self,
        name: &str,
        args: &[Expr],
        bindings: &Bindings,
        memory: &mut dyn WorkingMemory,
    ) -> Result<Value, EvalError> {
        // Short-circuiting connectives see unevaluated arguments.
        match name {
            "and" => {
                for a in args {
                    if !self.evaluate(a, bindings, memory)?.is_truthy() {
                        return Ok(Value::Bool(false));
                    }
                }
                return Ok(Value::Bool(true));
            }
            "or" => {
                for a in args {
                    if self.evaluate(a, bindings, memory)?.is_truthy() {
                        return Ok(Value::Bool(true));
                    }
                }
                return Ok(Value::Bool(false));
            }
            _ => {}
        }

        let values = args
            .iter()
            .map(|a| self.evaluate(a, bindings, memory))
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(native) = self.functions.get(name) {
            return (native.func)(&values);
        }

        match name {
            "retract" => {
                let mut any = false;
                for v in &values {
                    any |= memory.retract_fact(fact_arg(name, v)?)?;
                }
                Ok(Value::Bool(any))
            }
            "halt" => {
                memory.halt()?;
                Ok(Value::Void)
            }
            "fact-slot-value" => {
                expect_arity(name, &values, 2, "exactly 2")?;
                let id = fact_arg(name, &values[0])?;
                let slot = values[1].as_str().ok_or_else(|| EvalError::TypeMismatch {
                    function: name.to_string(),
                    expected: "slot name",
                    actual: values[1].clone(),
                })?;
                memory
                    .fact_slot(id, slot)
                    .ok_or_else(|| EvalError::Host(format!("no slot {slot} on fact {id}")))
            }
            _ => builtin(name, &values),
        }
    }
}

impl Evaluator for ExprEvaluator {
    fn evaluate(
        &self,
        expr: &Expr,
        bindings: &Bindings,
        memory: &mut dyn WorkingMemory,
    ) -> Result<Value, EvalError> {
        match expr {
            Expr::Const(v) => Ok(v.clone()),
            Expr::Var(name) => bindings
                .get(name)
                .cloned()
                .ok_or_else(|| EvalError::UnboundVariable(name.clone())),
            Expr::Call { name, args } => self.call(name, args, bindings, memory),
            Expr::If {
                cond,
                then,
                otherwise,
            } => {
                if self.evaluate(cond, bindings, memory)?.is_truthy() {
                    self.eval_body(then, bindings, memory)
                } else {
                    self.eval_body(otherwise, bindings, memory)
                }
            }
            Expr::Assert { template, slots } => {
                let slots = self.eval_slots(slots, bindings, memory)?;
                memory.assert_fact(template, slots).map(Value::FactAddress)
            }
            Expr::Modify { fact, slots } => {
                let id = self.eval_fact(fact, bindings, memory, "modify")?;
                let slots = self.eval_slots(slots, bindings, memory)?;
                memory.modify_fact(id, slots).map(Value::FactAddress)
            }
            Expr::Duplicate { fact, slots } => {
                let id = self.eval_fact(fact, bindings, memory, "duplicate")?;
                let slots = self.eval_slots(slots, bindings, memory)?;
                memory.duplicate_fact(id, slots).map(Value::FactAddress)
            }
        }
    }
}

// =============================================================================
// Built-in Functions
// =============================================================================

fn builtin(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    match name {
        "eq" => {
            expect_min_arity(name, args, 2)?;
            Ok(Value::Bool(args[1..].iter().all(|v| *v == args[0])))
        }
        "neq" => {
            expect_min_arity(name, args, 2)?;
            Ok(Value::Bool(args[1..].iter().all(|v| *v != args[0])))
        }
        "=" | "!=" | "<" | "<=" | ">" | ">=" => compare(name, args),
        "+" | "*" => fold_numeric(name, args),
        "-" | "/" => {
            expect_min_arity(name, args, 1)?;
            fold_numeric(name, args)
        }
        "mod" => {
            expect_arity(name, args, 2, "exactly 2")?;
            match (&args[0], &args[1]) {
                (Value::Int(_), Value::Int(0)) => Err(EvalError::DivisionByZero),
                (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_rem_euclid(*b))),
                (a, _) if a.as_int().is_none() => Err(type_error(name, "integer", a)),
                (_, b) => Err(type_error(name, "integer", b)),
            }
        }
        "not" => {
            expect_arity(name, args, 1, "exactly 1")?;
            Ok(Value::Bool(!args[0].is_truthy()))
        }
        "create$" => Ok(Value::List(
            args.iter()
                .flat_map(|v| match v {
                    Value::List(items) => items.clone(),
                    other => vec![other.clone()],
                })
                .collect(),
        )),
        "length$" => {
            expect_arity(name, args, 1, "exactly 1")?;
            let items = list_arg(name, &args[0])?;
            Ok(Value::Int(i64::try_from(items.len()).unwrap_or(i64::MAX)))
        }
        "nth$" => {
            expect_arity(name, args, 2, "exactly 2")?;
            let index = args[0]
                .as_int()
                .ok_or_else(|| type_error(name, "integer", &args[0]))?;
            let items = list_arg(name, &args[1])?;
            Ok(index
                .checked_sub(1)
                .and_then(|i| usize::try_from(i).ok())
                .and_then(|i| items.get(i))
                .cloned()
                .unwrap_or(Value::Void))
        }
        "member$" => {
            expect_arity(name, args, 2, "exactly 2")?;
            let items = list_arg(name, &args[1])?;
            Ok(items
                .iter()
                .position(|v| *v == args[0])
                .map_or(Value::Bool(false), |i| {
                    Value::Int(i64::try_from(i + 1).unwrap_or(i64::MAX))
                }))
        }
        "str-cat" => Ok(Value::Str(
            args.iter()
                .map(|v| match v {
                    Value::Str(s) | Value::Symbol(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
        )),
        _ => Err(EvalError::UnknownFunction(name.to_string())),
    }
}

fn compare(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    expect_min_arity(name, args, 2)?;
    let nums = args
        .iter()
        .map(|v| v.as_number().ok_or_else(|| type_error(name, "number", v)))
        .collect::<Result<Vec<_>, _>>()?;
    let holds = |a: f64, b: f64| match name {
        "=" => (a - b).abs() < f64::EPSILON,
        "!=" => (a - b).abs() >= f64::EPSILON,
        "<" => a < b,
        "<=" => a <= b,
        ">" => a > b,
        _ => a >= b,
    };
    if name == "!=" {
        // `!=` is true when the first argument differs from every other.
        return Ok(Value::Bool(nums[1..].iter().all(|b| holds(nums[0], *b))));
    }
    Ok(Value::Bool(nums.windows(2).all(|w| holds(w[0], w[1]))))
}

#[allow(clippy::cast_precision_loss)]
fn fold_numeric(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    let identity: i64 = if name == "+" || name == "-" { 0 } else { 1 };
    if args.is_empty() {
        return Ok(Value::Int(identity));
    }
    let all_int = args.iter().all(|v| matches!(v, Value::Int(_)));
    if all_int && name != "/" {
        let ints: Vec<i64> = args.iter().filter_map(Value::as_int).collect();
        let (mut acc, rest) = if args.len() == 1 && name == "-" {
            (0, &ints[..])
        } else {
            (ints[0], &ints[1..])
        };
        for n in rest {
            acc = match name {
                "+" => acc.wrapping_add(*n),
                "-" => acc.wrapping_sub(*n),
                _ => acc.wrapping_mul(*n),
            };
        }
        return Ok(Value::Int(acc));
    }

    // Division always yields a float, as does any mixed-type operation.
    let nums = args
        .iter()
        .map(|v| v.as_number().ok_or_else(|| type_error(name, "number", v)))
        .collect::<Result<Vec<_>, _>>()?;
    let (mut acc, rest) = if nums.len() == 1 && (name == "-" || name == "/") {
        (identity as f64, &nums[..])
    } else {
        (nums[0], &nums[1..])
    };
    for n in rest {
        acc = match name {
            "+" => acc + n,
            "-" => acc - n,
            "*" => acc * n,
            _ => {
                if *n == 0.0 {
                    return Err(EvalError::DivisionByZero);
                }
                acc / n
            }
        };
    }
    Ok(Value::Float(acc))
}

fn list_arg<'a>(function: &str, value: &'a Value) -> Result<&'a [Value], EvalError> {
    value
        .as_list()
        .ok_or_else(|| type_error(function, "multifield", value))
}

fn fact_arg(function: &str, value: &Value) -> Result<FactId, EvalError> {
    match value {
        Value::FactAddress(id) => Ok(*id),
        Value::Int(n) if *n >= 0 => Ok(FactId::new(n.unsigned_abs())),
        other => Err(type_error(function, "fact address", other)),
    }
}

fn type_error(function: &str, expected: &'static str, actual: &Value) -> EvalError {
    EvalError::TypeMismatch {
        function: function.to_string(),
        expected,
        actual: actual.clone(),
    }
}

fn expect_arity(
    function: &str,
    args: &[Value],
    n: usize,
    expected: &'static str,
) -> Result<(), EvalError> {
    if args.len() == n {
        Ok(())
    } else {
        Err(EvalError::Arity {
            function: function.to_string(),
            expected,
            actual: args.len(),
        })
    }
}

fn expect_min_arity(function: &str, args: &[Value], n: usize) -> Result<(), EvalError> {
    if args.len() >= n {
        Ok(())
    } else {
        Err(EvalError::Arity {
            function: function.to_string(),
            expected: if n == 1 { "at least 1" } else { "at least 2" },
            actual: args.len(),
        })
    }
}
