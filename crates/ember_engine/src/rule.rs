//! Rule definitions.
//!
//! A rule's left-hand side is a list of condition elements. `Or` and `And`
//! are expanded at compile time into disjunctive normal form: one flat chain
//! of patterns and tests per alternative, all sharing the rule's name.

use std::collections::BTreeSet;

use ember_foundation::{Error, Result};
use ember_language::Expr;
use ember_storage::FactStore;

use crate::pattern::{Pattern, SLOT_VALUE_VAR};

/// Lowest salience a rule may have.
pub const MIN_SALIENCE: i32 = -10_000;

/// Highest salience a rule may have.
pub const MAX_SALIENCE: i32 = 10_000;

// =============================================================================
// Condition Elements
// =============================================================================

/// A left-hand-side condition element.
#[derive(Clone, Debug, PartialEq)]
pub enum ConditionElement {
    /// Match facts against a pattern.
    Pattern(Pattern),
    /// The expression must be truthy for the bindings so far.
    Test(Expr),
    /// Any one alternative must hold.
    Or(Vec<ConditionElement>),
    /// Every element must hold.
    And(Vec<ConditionElement>),
}

/// A condition element after OR/AND expansion.
#[derive(Clone, Debug, PartialEq)]
pub enum Condition {
    /// A pattern condition.
    Pattern(Pattern),
    /// A test condition.
    Test(Expr),
}

impl Condition {
    /// Number of tests this condition performs, for the simplicity and
    /// complexity strategies.
    #[must_use]
    pub fn test_count(&self) -> usize {
        match self {
            Self::Pattern(p) => p.slot_tests.len(),
            Self::Test(_) => 1,
        }
    }
}

impl From<Pattern> for ConditionElement {
    fn from(pattern: Pattern) -> Self {
        Self::Pattern(pattern)
    }
}

// =============================================================================
// Salience
// =============================================================================

/// Rule priority.
#[derive(Clone, Debug, PartialEq)]
pub enum Salience {
    /// A constant priority.
    Fixed(i32),
    /// An expression, evaluated according to the engine's salience mode.
    Dynamic(Expr),
}

impl Default for Salience {
    fn default() -> Self {
        Self::Fixed(0)
    }
}

/// Clamps a salience value into the legal range.
#[must_use]
pub fn clamp_salience(value: i64) -> i32 {
    let clamped = value.clamp(i64::from(MIN_SALIENCE), i64::from(MAX_SALIENCE));
    i32::try_from(clamped).unwrap_or(0)
}

// =============================================================================
// Rule
// =============================================================================

/// A production rule.
#[derive(Clone, Debug, PartialEq)]
pub struct Rule {
    /// Unique rule name.
    pub name: String,
    /// Left-hand-side condition elements, in order.
    pub lhs: Vec<ConditionElement>,
    /// Right-hand-side actions, in order.
    pub rhs: Vec<Expr>,
    /// Priority.
    pub salience: Salience,
}

impl Rule {
    /// Creates a rule with an empty left- and right-hand side.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lhs: Vec::new(),
            rhs: Vec::new(),
            salience: Salience::default(),
        }
    }

    /// Appends a pattern condition.
    #[must_use]
    pub fn with_pattern(self, pattern: Pattern) -> Self {
        self.with_condition(ConditionElement::Pattern(pattern))
    }

    /// Appends a test condition.
    #[must_use]
    pub fn with_test(self, expr: Expr) -> Self {
        self.with_condition(ConditionElement::Test(expr))
    }

    /// Appends an OR of alternatives.
    #[must_use]
    pub fn with_or(self, alternatives: Vec<ConditionElement>) -> Self {
        self.with_condition(ConditionElement::Or(alternatives))
    }

    /// Appends any condition element.
    #[must_use]
    pub fn with_condition(mut self, ce: ConditionElement) -> Self {
        self.lhs.push(ce);
        self
    }

    /// Appends an action.
    #[must_use]
    pub fn with_action(mut self, action: Expr) -> Self {
        self.rhs.push(action);
        self
    }

    /// Sets a fixed salience.
    #[must_use]
    pub fn with_salience(mut self, salience: i32) -> Self {
        self.salience = Salience::Fixed(salience);
        self
    }

    /// Sets a dynamic salience expression.
    #[must_use]
    pub fn with_dynamic_salience(mut self, expr: Expr) -> Self {
        self.salience = Salience::Dynamic(expr);
        self
    }

    /// Expands OR/AND into flat alternatives.
    #[must_use]
    pub fn disjuncts(&self) -> Vec<Vec<Condition>> {
        expand(&self.lhs)
    }

    /// Validates the rule against the known templates and expands it.
    ///
    /// # Errors
    /// Returns `UnknownTemplate`, `UnknownSlot`, or `InvalidPattern`. Nothing
    /// is built when validation fails.
    pub fn compile(&self, store: &FactStore) -> Result<Vec<Vec<Condition>>> {
        let disjuncts = self.disjuncts();
        if disjuncts.is_empty() {
            return Err(Error::invalid_pattern(&self.name, "or with no alternatives"));
        }
        for disjunct in &disjuncts {
            self.check_disjunct(disjunct, store)?;
        }
        Ok(disjuncts)
    }

    fn check_disjunct(&self, conditions: &[Condition], store: &FactStore) -> Result<()> {
        let mut bound: BTreeSet<&str> = BTreeSet::new();
        for condition in conditions {
            match condition {
                Condition::Pattern(p) => {
                    let template = store
                        .template(&p.template)
                        .ok_or_else(|| Error::unknown_template(&p.template))?;
                    p.validate(&self.name, template)?;
                    let local = p.bound_vars();
                    for expr in p.predicates() {
                        self.check_bound(expr, |v| {
                            v == SLOT_VALUE_VAR || bound.contains(v) || local.contains(v)
                        })?;
                    }
                    if p.is_positive() {
                        bound.extend(local);
                    }
                }
                Condition::Test(expr) => self.check_bound(expr, |v| bound.contains(v))?,
            }
        }
        Ok(())
    }

    fn check_bound(&self, expr: &Expr, is_bound: impl Fn(&str) -> bool) -> Result<()> {
        match expr.free_vars().into_iter().find(|v| !is_bound(v)) {
            Some(var) => Err(Error::invalid_pattern(
                &self.name,
                format!("condition refers to unbound variable ?{var}"),
            )),
            None => Ok(()),
        }
    }
}

fn expand(ces: &[ConditionElement]) -> Vec<Vec<Condition>> {
    ces.iter().fold(vec![Vec::new()], |prefixes, ce| {
        let alternatives = alternatives(ce);
        prefixes
            .iter()
            .flat_map(|prefix| {
                alternatives.iter().map(move |alt| {
                    let mut chain = prefix.clone();
                    chain.extend(alt.iter().cloned());
                    chain
                })
            })
            .collect()
    })
}

fn alternatives(ce: &ConditionElement) -> Vec<Vec<Condition>> {
    match ce {
        ConditionElement::Pattern(p) => vec![vec![Condition::Pattern(p.clone())]],
        ConditionElement::Test(e) => vec![vec![Condition::Test(e.clone())]],
        ConditionElement::And(ces) => expand(ces),
        ConditionElement::Or(ces) => ces.iter().flat_map(alternatives).collect(),
    }
}
