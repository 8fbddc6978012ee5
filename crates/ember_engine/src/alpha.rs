//! The alpha network: per-pattern memories of facts passing intra-fact tests.
//!
//! Memories are shared between structurally identical patterns and
//! reference counted, so a memory lives exactly as long as some join reads it.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use ember_foundation::FactId;
use ember_storage::Fact;
use tracing::trace;

use crate::pattern::{MatchContext, Pattern, SlotTest};

/// Identifies an alpha memory.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AlphaId(usize);

impl fmt::Debug for AlphaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "alpha#{}", self.0)
    }
}

type AlphaKey = (String, BTreeMap<String, SlotTest>);

/// Facts of one template that satisfy a pattern's intra-fact tests.
#[derive(Clone, Debug)]
pub struct AlphaMemory {
    pattern: Pattern,
    local_vars: BTreeSet<String>,
    facts: BTreeSet<FactId>,
    refs: usize,
}

impl AlphaMemory {
    fn new(pattern: &Pattern) -> Self {
        let pattern = Pattern {
            negated: false,
            exists: false,
            fact_var: None,
            ..pattern.clone()
        };
        let local_vars = pattern.bound_vars().into_iter().map(String::from).collect();
        Self {
            pattern,
            local_vars,
            facts: BTreeSet::new(),
            refs: 0,
        }
    }

    /// Template this memory filters.
    #[must_use]
    pub fn template(&self) -> &str {
        &self.pattern.template
    }

    /// Facts currently in the memory, in id order.
    pub fn facts(&self) -> impl Iterator<Item = FactId> + '_ {
        self.facts.iter().copied()
    }

    /// Returns true if the fact is in the memory.
    #[must_use]
    pub fn contains(&self, id: FactId) -> bool {
        self.facts.contains(&id)
    }

    /// Number of facts in the memory.
    #[must_use]
    pub fn len(&self) -> usize {
        self.facts.len()
    }

    /// Returns true if the memory holds no facts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    fn accepts(&self, fact: &Fact, ctx: MatchContext<'_>) -> bool {
        self.pattern.alpha_accepts(fact, &self.local_vars, ctx)
    }
}

/// All alpha memories, indexed by pattern shape and by template.
#[derive(Clone, Debug, Default)]
pub struct AlphaNetwork {
    memories: Vec<Option<AlphaMemory>>,
    by_shape: HashMap<AlphaKey, AlphaId>,
    by_template: HashMap<String, Vec<AlphaId>>,
}

impl AlphaNetwork {
    /// Creates an empty alpha network.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the memory for a pattern's shape, creating and priming it
    /// from live facts if needed, and takes a reference on it.
    pub fn acquire(&mut self, pattern: &Pattern, ctx: MatchContext<'_>) -> AlphaId {
        let key = pattern.shape();
        let id = match self.by_shape.get(&key) {
            Some(&id) => id,
            None => {
                let id = AlphaId(self.memories.len());
                let mut memory = AlphaMemory::new(pattern);
                for fact in ctx.store.of_template(&pattern.template) {
                    if memory.accepts(fact, ctx) {
                        memory.facts.insert(fact.id);
                    }
                }
                trace!(?id, template = %pattern.template, facts = memory.len(), "alpha memory created");
                self.memories.push(Some(memory));
                self.by_shape.insert(key, id);
                self.by_template
                    .entry(pattern.template.clone())
                    .or_default()
                    .push(id);
                id
            }
        };
        if let Some(memory) = self.memories[id.0].as_mut() {
            memory.refs += 1;
        }
        id
    }

    /// Drops a reference, discarding the memory when nobody uses it.
    pub fn release(&mut self, id: AlphaId) {
        let Some(memory) = self.memories.get_mut(id.0).and_then(Option::as_mut) else {
            return;
        };
        memory.refs -= 1;
        if memory.refs > 0 {
            return;
        }
        if let Some(memory) = self.memories[id.0].take() {
            trace!(?id, "alpha memory dropped");
            self.by_shape.remove(&memory.pattern.shape());
            if let Some(ids) = self.by_template.get_mut(memory.template()) {
                ids.retain(|&i| i != id);
                if ids.is_empty() {
                    self.by_template.remove(memory.template());
                }
            }
        }
    }

    /// Adds a fact to every memory whose tests it passes.
    ///
    /// Returns the memories the fact entered.
    pub fn activate(&mut self, fact: &Fact, ctx: MatchContext<'_>) -> Vec<AlphaId> {
        let Some(ids) = self.by_template.get(&fact.template) else {
            return Vec::new();
        };
        let mut entered = Vec::new();
        for &id in ids {
            if let Some(memory) = self.memories[id.0].as_mut() {
                if memory.accepts(fact, ctx) {
                    memory.facts.insert(fact.id);
                    entered.push(id);
                }
            }
        }
        entered
    }

    /// Removes a fact from every memory holding it.
    ///
    /// Returns the memories the fact left.
    pub fn deactivate(&mut self, fact: &Fact) -> Vec<AlphaId> {
        let Some(ids) = self.by_template.get(&fact.template) else {
            return Vec::new();
        };
        let mut left = Vec::new();
        for &id in ids {
            if let Some(memory) = self.memories[id.0].as_mut() {
                if memory.facts.remove(&fact.id) {
                    left.push(id);
                }
            }
        }
        left
    }

    /// Returns a memory by id.
    #[must_use]
    pub fn get(&self, id: AlphaId) -> Option<&AlphaMemory> {
        self.memories.get(id.0).and_then(Option::as_ref)
    }

    /// Iterates live memories.
    pub fn iter(&self) -> impl Iterator<Item = (AlphaId, &AlphaMemory)> {
        self.memories
            .iter()
            .enumerate()
            .filter_map(|(i, m)| m.as_ref().map(|m| (AlphaId(i), m)))
    }

    /// Number of live memories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_shape.len()
    }

    /// Returns true if there are no live memories.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_shape.is_empty()
    }
}
