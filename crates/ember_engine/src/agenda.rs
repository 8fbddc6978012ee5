//! The agenda: pending activations in firing order.
//!
//! Salience always decides first. Among equal saliences the conflict
//! resolution [`Strategy`] breaks the tie.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use ember_foundation::FactId;
use ember_language::Bindings;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

// =============================================================================
// Activation
// =============================================================================

/// Identifies an activation. Ids are never reused within an agenda.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActivationId(u64);

impl fmt::Debug for ActivationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a{}", self.0)
    }
}

/// What makes two activations the same instantiation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ActivationKey {
    /// Rule name.
    pub rule: String,
    /// Contributing facts in condition order.
    pub fact_ids: Vec<FactId>,
}

/// A rule instantiation waiting to fire.
#[derive(Clone, Debug)]
pub struct Activation {
    /// Activation id.
    pub id: ActivationId,
    /// Rule name.
    pub rule: String,
    /// Current salience.
    pub salience: i32,
    /// Bindings the right-hand side runs with.
    pub bindings: Bindings,
    /// Contributing facts in condition order.
    pub fact_ids: Vec<FactId>,
    /// Creation order; later activations have larger timetags.
    pub timetag: u64,
    /// Timetag of the fact matching the first pattern, 0 if none.
    pub recency: u64,
    /// Number of tests in the matching disjunct.
    pub specificity: usize,
    rank: u64,
}

impl Activation {
    /// The instantiation key of this activation.
    #[must_use]
    pub fn key(&self) -> ActivationKey {
        ActivationKey {
            rule: self.rule.clone(),
            fact_ids: self.fact_ids.clone(),
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<6} {}:", self.salience, self.rule)?;
        for (i, id) in self.fact_ids.iter().enumerate() {
            write!(f, "{}{id}", if i == 0 { " " } else { "," })?;
        }
        Ok(())
    }
}

// =============================================================================
// Strategy
// =============================================================================

/// Tie-break among activations of equal salience.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Newest activation first.
    #[default]
    Depth,
    /// Oldest activation first.
    Breadth,
    /// Rule name ascending, then newest first.
    Lex,
    /// Fewest tests first, then newest first.
    Simplicity,
    /// Most tests first, then newest first.
    Complexity,
    /// Most recent first-pattern fact first, then newest first.
    Mea,
    /// A seeded pseudo-random order.
    Random,
}

impl Strategy {
    /// All strategies.
    pub const ALL: [Strategy; 7] = [
        Self::Depth,
        Self::Breadth,
        Self::Lex,
        Self::Simplicity,
        Self::Complexity,
        Self::Mea,
        Self::Random,
    ];

    /// Lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Depth => "depth",
            Self::Breadth => "breadth",
            Self::Lex => "lex",
            Self::Simplicity => "simplicity",
            Self::Complexity => "complexity",
            Self::Mea => "mea",
            Self::Random => "random",
        }
    }

    /// Orders `a` before `b` when `a` should fire first.
    fn compare(self, a: &Activation, b: &Activation) -> Ordering {
        let newest_first = b.timetag.cmp(&a.timetag);
        b.salience.cmp(&a.salience).then_with(|| match self {
            Self::Depth => newest_first,
            Self::Breadth => a.timetag.cmp(&b.timetag),
            Self::Lex => a.rule.cmp(&b.rule).then(newest_first),
            Self::Simplicity => a.specificity.cmp(&b.specificity).then(newest_first),
            Self::Complexity => b.specificity.cmp(&a.specificity).then(newest_first),
            Self::Mea => b.recency.cmp(&a.recency).then(newest_first),
            Self::Random => a.rank.cmp(&b.rank).then(newest_first),
        })
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// When dynamic salience expressions are evaluated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SalienceMode {
    /// Once, when the rule is added.
    #[default]
    WhenDefined,
    /// When each activation is created, with its bindings.
    WhenActivated,
    /// For every pending activation before each firing.
    EveryCycle,
}

// =============================================================================
// Agenda
// =============================================================================

/// Pending activations, kept sorted in firing order.
#[derive(Clone, Debug)]
pub struct Agenda {
    strategy: Strategy,
    queue: Vec<Activation>,
    index: HashMap<ActivationKey, ActivationId>,
    next_id: u64,
    rng: ChaCha8Rng,
}

impl Default for Agenda {
    fn default() -> Self {
        Self::new(Strategy::default(), 0)
    }
}

/// Fields of a new activation supplied by the caller.
#[derive(Clone, Debug)]
pub struct Pending {
    /// Rule name.
    pub rule: String,
    /// Salience.
    pub salience: i32,
    /// Bindings.
    pub bindings: Bindings,
    /// Contributing facts in condition order.
    pub fact_ids: Vec<FactId>,
    /// Timetag of the first pattern's fact.
    pub recency: u64,
    /// Number of tests in the matching disjunct.
    pub specificity: usize,
}

impl Agenda {
    /// Creates an empty agenda. `seed` drives the random strategy.
    #[must_use]
    pub fn new(strategy: Strategy, seed: u64) -> Self {
        Self {
            strategy,
            queue: Vec::new(),
            index: HashMap::new(),
            next_id: 1,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// The active strategy.
    #[must_use]
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Switches strategy and re-sorts pending activations.
    pub fn set_strategy(&mut self, strategy: Strategy) {
        self.strategy = strategy;
        self.resort();
    }

    /// Adds an activation unless the same instantiation is already pending.
    ///
    /// Returns `None` when nothing was queued.
    pub fn push(&mut self, pending: Pending) -> Option<ActivationId> {
        let key = ActivationKey {
            rule: pending.rule.clone(),
            fact_ids: pending.fact_ids.clone(),
        };
        if self.index.contains_key(&key) {
            return None;
        }
        let id = ActivationId(self.next_id);
        self.next_id += 1;
        let activation = Activation {
            id,
            rule: pending.rule,
            salience: pending.salience,
            bindings: pending.bindings,
            fact_ids: pending.fact_ids,
            timetag: id.0,
            recency: pending.recency,
            specificity: pending.specificity,
            rank: self.rng.r#gen(),
        };
        let strategy = self.strategy;
        let at = self
            .queue
            .partition_point(|a| strategy.compare(a, &activation) == Ordering::Less);
        self.queue.insert(at, activation);
        self.index.insert(key, id);
        Some(id)
    }

    /// Removes a pending instantiation.
    pub fn remove(&mut self, key: &ActivationKey) -> Option<Activation> {
        let id = self.index.remove(key)?;
        let at = self.queue.iter().position(|a| a.id == id)?;
        Some(self.queue.remove(at))
    }

    /// Removes every pending activation of a rule.
    pub fn remove_rule(&mut self, rule: &str) -> usize {
        let before = self.queue.len();
        self.queue.retain(|a| a.rule != rule);
        self.index.retain(|k, _| k.rule != rule);
        before - self.queue.len()
    }

    /// Removes and returns the activation that fires next.
    pub fn pop(&mut self) -> Option<Activation> {
        if self.queue.is_empty() {
            return None;
        }
        let activation = self.queue.remove(0);
        self.index.remove(&activation.key());
        Some(activation)
    }

    /// The activation that fires next.
    #[must_use]
    pub fn peek(&self) -> Option<&Activation> {
        self.queue.first()
    }

    /// Returns true if the instantiation is pending.
    #[must_use]
    pub fn contains(&self, key: &ActivationKey) -> bool {
        self.index.contains_key(key)
    }

    /// Recomputes saliences and re-sorts.
    ///
    /// `salience` returns the new value, or `None` to keep the current one.
    pub fn update_saliences(&mut self, mut salience: impl FnMut(&Activation) -> Option<i32>) {
        for activation in &mut self.queue {
            if let Some(s) = salience(activation) {
                activation.salience = s;
            }
        }
        self.resort();
    }

    /// Pending activations in firing order.
    pub fn iter(&self) -> impl Iterator<Item = &Activation> {
        self.queue.iter()
    }

    /// Number of pending activations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns true if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drops every pending activation.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.index.clear();
    }

    fn resort(&mut self) {
        let strategy = self.strategy;
        self.queue.sort_by(|a, b| strategy.compare(a, b));
    }
}
