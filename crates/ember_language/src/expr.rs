//! Expression tree for predicates, test conditions, and rule actions.

use std::collections::BTreeSet;

use ember_foundation::Value;

/// An expression node.
///
/// Expressions are owned recursive trees. They are structurally comparable
/// and hashable so that identical predicate tests can share an alpha memory.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Expr {
    /// Literal value.
    Const(Value),
    /// Variable reference (`?x` or `$?x`), stored without the sigil.
    Var(String),
    /// Function call like `(> ?age 30)`.
    Call {
        /// Function name.
        name: String,
        /// Argument expressions.
        args: Vec<Expr>,
    },
    /// Conditional like `(if ?c then ... else ...)`.
    If {
        /// Condition expression.
        cond: Box<Expr>,
        /// Actions evaluated when the condition is truthy.
        then: Vec<Expr>,
        /// Actions evaluated otherwise.
        otherwise: Vec<Expr>,
    },
    /// `(assert (template (slot expr)...))`.
    Assert {
        /// Template of the new fact.
        template: String,
        /// Slot values.
        slots: Vec<(String, Expr)>,
    },
    /// `(modify ?f (slot expr)...)`.
    Modify {
        /// Expression yielding the fact address.
        fact: Box<Expr>,
        /// Slot changes.
        slots: Vec<(String, Expr)>,
    },
    /// `(duplicate ?f (slot expr)...)`.
    Duplicate {
        /// Expression yielding the fact address.
        fact: Box<Expr>,
        /// Slot changes.
        slots: Vec<(String, Expr)>,
    },
}

impl Expr {
    /// Creates a literal expression.
    #[must_use]
    pub fn constant(value: impl Into<Value>) -> Self {
        Self::Const(value.into())
    }

    /// Creates a symbol literal.
    #[must_use]
    pub fn symbol(name: impl Into<String>) -> Self {
        Self::Const(Value::symbol(name))
    }

    /// Creates a variable reference.
    #[must_use]
    pub fn var(name: impl Into<String>) -> Self {
        Self::Var(name.into())
    }

    /// Creates a function call.
    #[must_use]
    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::Call {
            name: name.into(),
            args,
        }
    }

    /// Creates an assert action.
    #[must_use]
    pub fn assert<S: Into<String>>(template: impl Into<String>, slots: Vec<(S, Expr)>) -> Self {
        Self::Assert {
            template: template.into(),
            slots: slots.into_iter().map(|(s, e)| (s.into(), e)).collect(),
        }
    }

    /// Creates a retract action for the fact bound to `var`.
    #[must_use]
    pub fn retract(var: impl Into<String>) -> Self {
        Self::call("retract", vec![Self::var(var)])
    }

    /// Creates a modify action for the fact bound to `var`.
    #[must_use]
    pub fn modify<S: Into<String>>(var: impl Into<String>, slots: Vec<(S, Expr)>) -> Self {
        Self::Modify {
            fact: Box::new(Self::var(var)),
            slots: slots.into_iter().map(|(s, e)| (s.into(), e)).collect(),
        }
    }

    /// Creates a duplicate action for the fact bound to `var`.
    #[must_use]
    pub fn duplicate<S: Into<String>>(var: impl Into<String>, slots: Vec<(S, Expr)>) -> Self {
        Self::Duplicate {
            fact: Box::new(Self::var(var)),
            slots: slots.into_iter().map(|(s, e)| (s.into(), e)).collect(),
        }
    }

    /// Returns every variable name referenced anywhere in this expression.
    #[must_use]
    pub fn free_vars(&self) -> BTreeSet<&str> {
        let mut vars = BTreeSet::new();
        self.collect_vars(&mut vars);
        vars
    }

    fn collect_vars<'a>(&'a self, vars: &mut BTreeSet<&'a str>) {
        match self {
            Self::Const(_) => {}
            Self::Var(name) => {
                vars.insert(name.as_str());
            }
            Self::Call { args, .. } => {
                for arg in args {
                    arg.collect_vars(vars);
                }
            }
            Self::If {
                cond,
                then,
                otherwise,
            } => {
                cond.collect_vars(vars);
                for e in then.iter().chain(otherwise) {
                    e.collect_vars(vars);
                }
            }
            Self::Assert { slots, .. } => {
                for (_, e) in slots {
                    e.collect_vars(vars);
                }
            }
            Self::Modify { fact, slots } | Self::Duplicate { fact, slots } => {
                fact.collect_vars(vars);
                for (_, e) in slots {
                    e.collect_vars(vars);
                }
            }
        }
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Self::Const(value)
    }
}
