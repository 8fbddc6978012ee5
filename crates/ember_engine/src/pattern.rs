//! Pattern conditions and slot unification.
//!
//! A [`Pattern`] tests the slots of one fact. Matching a pattern against a
//! fact under an existing environment yields every consistent extension of
//! that environment; multifield sequence tests may yield more than one.

use std::collections::{BTreeMap, BTreeSet};

use ember_foundation::{Error, Result, Value};
use ember_language::{Bindings, Evaluator, Expr};
use ember_storage::{Fact, FactStore, Template};

/// Reserved variable holding the slot value under test inside a predicate.
pub const SLOT_VALUE_VAR: &str = "_";

// =============================================================================
// Slot Tests
// =============================================================================

/// A test applied to one slot value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SlotTest {
    /// The slot equals this value.
    Constant(Value),
    /// Binds the slot value to a variable, or compares with its binding.
    Variable(String),
    /// Matches any value (`?`).
    Wildcard,
    /// The expression must be truthy; the slot value is bound to `_`.
    Predicate(Expr),
    /// Matches a multifield slot element by element.
    Sequence(Vec<SeqItem>),
    /// Every test must hold (`&` connective).
    And(Vec<SlotTest>),
}

/// One position in a [`SlotTest::Sequence`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SeqItem {
    /// Matches exactly one element.
    Single(SlotTest),
    /// Matches zero or more elements, optionally binding them as a list.
    Multi(Option<String>),
}

impl SlotTest {
    /// Shorthand for [`SlotTest::Constant`].
    #[must_use]
    pub fn constant(value: impl Into<Value>) -> Self {
        Self::Constant(value.into())
    }

    /// Shorthand for [`SlotTest::Variable`].
    #[must_use]
    pub fn var(name: impl Into<String>) -> Self {
        Self::Variable(name.into())
    }

    /// Whole-slot variables: those this test binds to the entire slot value.
    fn whole_slot_vars<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Variable(v) => out.push(v),
            Self::And(tests) => tests.iter().for_each(|t| t.whole_slot_vars(out)),
            _ => {}
        }
    }

    /// Every variable this test can bind.
    fn bound_vars<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            Self::Variable(v) => {
                out.insert(v);
            }
            Self::And(tests) => tests.iter().for_each(|t| t.bound_vars(out)),
            Self::Sequence(items) => {
                for item in items {
                    match item {
                        SeqItem::Single(t) => t.bound_vars(out),
                        SeqItem::Multi(Some(v)) => {
                            out.insert(v);
                        }
                        SeqItem::Multi(None) => {}
                    }
                }
            }
            Self::Constant(_) | Self::Wildcard | Self::Predicate(_) => {}
        }
    }

    fn predicates<'a>(&'a self, out: &mut Vec<&'a Expr>) {
        match self {
            Self::Predicate(e) => out.push(e),
            Self::And(tests) => tests.iter().for_each(|t| t.predicates(out)),
            Self::Sequence(items) => {
                for item in items {
                    if let SeqItem::Single(t) = item {
                        t.predicates(out);
                    }
                }
            }
            Self::Constant(_) | Self::Variable(_) | Self::Wildcard => {}
        }
    }

    fn has_sequence(&self) -> bool {
        match self {
            Self::Sequence(_) => true,
            Self::And(tests) => tests.iter().any(Self::has_sequence),
            _ => false,
        }
    }
}

// =============================================================================
// Pattern
// =============================================================================

/// A pattern condition element.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Pattern {
    /// Template the fact must belong to.
    pub template: String,
    /// Tests by slot name.
    pub slot_tests: BTreeMap<String, SlotTest>,
    /// `(not ...)`: matches when no fact satisfies the pattern.
    pub negated: bool,
    /// `(exists ...)`: matches once when at least one fact satisfies it.
    pub exists: bool,
    /// `?f <- (...)`: binds the matched fact's address.
    pub fact_var: Option<String>,
}

impl Pattern {
    /// Creates a positive pattern with no slot tests.
    #[must_use]
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            slot_tests: BTreeMap::new(),
            negated: false,
            exists: false,
            fact_var: None,
        }
    }

    /// Adds a slot test.
    #[must_use]
    pub fn with(mut self, slot: impl Into<String>, test: SlotTest) -> Self {
        self.slot_tests.insert(slot.into(), test);
        self
    }

    /// Tests a slot against a constant.
    #[must_use]
    pub fn with_const(self, slot: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(slot, SlotTest::constant(value))
    }

    /// Binds a slot to a variable.
    #[must_use]
    pub fn with_var(self, slot: impl Into<String>, var: impl Into<String>) -> Self {
        self.with(slot, SlotTest::var(var))
    }

    /// Marks the pattern as negated.
    #[must_use]
    pub fn negated(mut self) -> Self {
        self.negated = true;
        self
    }

    /// Marks the pattern as an existence test.
    #[must_use]
    pub fn exists(mut self) -> Self {
        self.exists = true;
        self
    }

    /// Binds the matched fact's address to `var`.
    #[must_use]
    pub fn bind_fact(mut self, var: impl Into<String>) -> Self {
        self.fact_var = Some(var.into());
        self
    }

    /// Returns true for patterns that contribute a fact to their tokens.
    #[must_use]
    pub fn is_positive(&self) -> bool {
        !self.negated && !self.exists
    }

    /// Variables bound to a whole slot value, paired with that slot.
    ///
    /// Each variable appears once, with the first slot that binds it.
    #[must_use]
    pub fn whole_slot_vars(&self) -> Vec<(&str, &str)> {
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        for (slot, test) in &self.slot_tests {
            let mut vars = Vec::new();
            test.whole_slot_vars(&mut vars);
            for var in vars {
                if seen.insert(var) {
                    out.push((var, slot.as_str()));
                }
            }
        }
        out
    }

    /// Every variable this pattern binds, including the fact variable.
    #[must_use]
    pub fn bound_vars(&self) -> BTreeSet<&str> {
        let mut vars = BTreeSet::new();
        for test in self.slot_tests.values() {
            test.bound_vars(&mut vars);
        }
        if let Some(v) = &self.fact_var {
            vars.insert(v.as_str());
        }
        vars
    }

    /// Every predicate expression in this pattern.
    #[must_use]
    pub fn predicates(&self) -> Vec<&Expr> {
        let mut out = Vec::new();
        for test in self.slot_tests.values() {
            test.predicates(&mut out);
        }
        out
    }

    /// The part of this pattern an alpha memory is keyed on.
    #[must_use]
    pub fn shape(&self) -> (String, BTreeMap<String, SlotTest>) {
        (self.template.clone(), self.slot_tests.clone())
    }

    /// Checks the pattern against its template.
    ///
    /// # Errors
    /// Returns `InvalidPattern` for flag misuse or a sequence test on a
    /// single-field slot, and `UnknownSlot` for undeclared slots.
    pub fn validate(&self, rule: &str, template: &Template) -> Result<()> {
        if self.negated && self.exists {
            return Err(Error::invalid_pattern(
                rule,
                format!("pattern on {} cannot be both not and exists", self.template),
            ));
        }
        if self.fact_var.is_some() && !self.is_positive() {
            return Err(Error::invalid_pattern(
                rule,
                format!("fact variable bound to a non-positive {} pattern", self.template),
            ));
        }
        for (slot, test) in &self.slot_tests {
            let def = template
                .slot(slot)
                .ok_or_else(|| Error::unknown_slot(&template.name, slot))?;
            if test.has_sequence() && !def.is_multi {
                return Err(Error::invalid_pattern(
                    rule,
                    format!("multifield sequence on single-field slot {}.{slot}", self.template),
                ));
            }
        }
        Ok(())
    }

    /// Matches a fact, extending `env`.
    ///
    /// Returns every consistent extension; empty means no match. The fact
    /// variable, if any, is bound to the fact's address.
    #[must_use]
    pub fn unify(&self, fact: &Fact, env: &Bindings, ctx: MatchContext<'_>) -> Vec<Bindings> {
        let mut env = env.clone();
        if let Some(var) = &self.fact_var {
            let address = Value::FactAddress(fact.id);
            match env.get(var) {
                Some(bound) if *bound != address => return Vec::new(),
                Some(_) => {}
                None => env.set(var.clone(), address),
            }
        }
        self.unify_slots(fact, env, ctx)
    }

    /// Applies only the tests that depend on nothing outside this pattern.
    ///
    /// Predicates whose free variables are all bound within the pattern are
    /// evaluated; the rest are left to the joins.
    #[must_use]
    pub fn alpha_accepts(&self, fact: &Fact, local: &BTreeSet<String>, ctx: MatchContext<'_>) -> bool {
        let ctx = MatchContext {
            local: Some(local),
            ..ctx
        };
        !self.unify_slots(fact, Bindings::new(), ctx).is_empty()
    }

    fn unify_slots(&self, fact: &Fact, env: Bindings, ctx: MatchContext<'_>) -> Vec<Bindings> {
        if fact.template != self.template {
            return Vec::new();
        }
        let mut states = vec![State {
            bindings: env,
            deferred: Vec::new(),
        }];
        for (slot, test) in &self.slot_tests {
            let value = fact.slot(slot).cloned().unwrap_or(Value::Void);
            states = states
                .into_iter()
                .flat_map(|s| match_test(test, &value, s))
                .collect();
            if states.is_empty() {
                return Vec::new();
            }
        }
        states
            .into_iter()
            .filter(|s| s.deferred.iter().all(|(e, v)| ctx.holds(e, v, &s.bindings)))
            .map(|s| s.bindings)
            .collect()
    }
}

// =============================================================================
// Matching
// =============================================================================

/// What predicate evaluation needs during matching.
#[derive(Clone, Copy)]
pub struct MatchContext<'a> {
    /// Evaluator for predicate expressions.
    pub evaluator: &'a dyn Evaluator,
    /// Facts visible to predicates.
    pub store: &'a FactStore,
    local: Option<&'a BTreeSet<String>>,
}

impl<'a> MatchContext<'a> {
    /// Creates a context that evaluates every predicate.
    #[must_use]
    pub fn new(evaluator: &'a dyn Evaluator, store: &'a FactStore) -> Self {
        Self {
            evaluator,
            store,
            local: None,
        }
    }

    fn holds(&self, expr: &Expr, value: &Value, bindings: &Bindings) -> bool {
        if let Some(local) = self.local {
            let evaluable = expr
                .free_vars()
                .iter()
                .all(|v| *v == SLOT_VALUE_VAR || local.contains(*v));
            if !evaluable {
                return true;
            }
        }
        let env = bindings.with(SLOT_VALUE_VAR, value.clone());
        let mut view = self.store.view();
        self.evaluator.test(expr, &env, &mut view)
    }
}

/// A partial match: bindings so far plus predicates awaiting evaluation.
///
/// Predicates run after every slot is unified, so they may refer to
/// variables bound by slots that sort after theirs.
#[derive(Clone)]
struct State<'p> {
    bindings: Bindings,
    deferred: Vec<(&'p Expr, Value)>,
}

fn match_test<'p>(test: &'p SlotTest, value: &Value, mut state: State<'p>) -> Vec<State<'p>> {
    match test {
        SlotTest::Constant(c) => {
            if c == value {
                vec![state]
            } else {
                Vec::new()
            }
        }
        SlotTest::Variable(name) => bind(name, value, state).into_iter().collect(),
        SlotTest::Wildcard => vec![state],
        SlotTest::Predicate(expr) => {
            state.deferred.push((expr, value.clone()));
            vec![state]
        }
        SlotTest::And(tests) => tests.iter().fold(vec![state], |states, t| {
            states
                .into_iter()
                .flat_map(|s| match_test(t, value, s))
                .collect()
        }),
        SlotTest::Sequence(items) => match value {
            Value::List(elements) => match_sequence(items, elements, state),
            _ => Vec::new(),
        },
    }
}

fn bind<'p>(name: &str, value: &Value, mut state: State<'p>) -> Option<State<'p>> {
    match state.bindings.get(name) {
        Some(bound) => (bound == value).then_some(state),
        None => {
            state.bindings.set(name, value.clone());
            Some(state)
        }
    }
}

fn match_sequence<'p>(items: &'p [SeqItem], elements: &[Value], state: State<'p>) -> Vec<State<'p>> {
    let Some((first, rest)) = items.split_first() else {
        return if elements.is_empty() {
            vec![state]
        } else {
            Vec::new()
        };
    };
    match first {
        SeqItem::Single(test) => {
            let Some((head, tail)) = elements.split_first() else {
                return Vec::new();
            };
            match_test(test, head, state)
                .into_iter()
                .flat_map(|s| match_sequence(rest, tail, s))
                .collect()
        }
        SeqItem::Multi(var) => {
            let fixed: usize = rest
                .iter()
                .filter(|i| matches!(i, SeqItem::Single(_)))
                .count();
            let max = elements.len().saturating_sub(fixed);
            let mut out = Vec::new();
            for take in 0..=max {
                let (segment, tail) = elements.split_at(take);
                let next = match var {
                    Some(name) => bind(name, &Value::List(segment.to_vec()), state.clone()),
                    None => Some(state.clone()),
                };
                if let Some(s) = next {
                    out.extend(match_sequence(rest, tail, s));
                }
            }
            out
        }
    }
}
