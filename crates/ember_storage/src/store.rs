//! The fact store: sole owner of live facts and their templates.
//!
//! Uses persistent maps so a store clones in O(1) and snapshots share
//! structure with the live working memory.

use std::collections::BTreeMap;
use std::sync::Arc;

use ember_foundation::{Error, ErrorKind, FactId, Result, Value};
use ember_language::{EvalError, Evaluator, WorkingMemory};

use crate::fact::Fact;
use crate::template::Template;

/// Storage for templates and live facts.
#[derive(Clone, Debug)]
pub struct FactStore {
    templates: im::OrdMap<String, Arc<Template>>,
    facts: im::OrdMap<FactId, Arc<Fact>>,
    by_template: im::OrdMap<String, im::OrdSet<FactId>>,
    next_id: u64,
    clock: u64,
}

impl Default for FactStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FactStore {
    /// Creates an empty store. The first fact gets id 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            templates: im::OrdMap::new(),
            facts: im::OrdMap::new(),
            by_template: im::OrdMap::new(),
            next_id: 1,
            clock: 0,
        }
    }

    // =========================================================================
    // Templates
    // =========================================================================

    /// Registers a template.
    ///
    /// # Errors
    /// Returns `DuplicateTemplate` if the name is taken.
    pub fn define_template(&mut self, template: Template) -> Result<()> {
        if self.templates.contains_key(&template.name) {
            return Err(Error::new(ErrorKind::DuplicateTemplate(template.name)));
        }
        self.templates
            .insert(template.name.clone(), Arc::new(template));
        Ok(())
    }

    /// Returns a template by name.
    #[must_use]
    pub fn template(&self, name: &str) -> Option<&Arc<Template>> {
        self.templates.get(name)
    }

    /// Iterates templates in name order.
    pub fn templates(&self) -> impl Iterator<Item = &Arc<Template>> {
        self.templates.values()
    }

    fn require_template(&self, name: &str) -> Result<&Arc<Template>> {
        self.template(name)
            .ok_or_else(|| Error::unknown_template(name))
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Validates and default-fills the slots of a prospective fact.
    ///
    /// Nothing is stored; a failure leaves the store untouched.
    ///
    /// # Errors
    /// Returns `UnknownTemplate`, `UnknownSlot`, `ConstraintViolation`, or an
    /// evaluation error from a dynamic default.
    pub fn prepare(
        &self,
        template: &str,
        slots: Vec<(String, Value)>,
        evaluator: &dyn Evaluator,
    ) -> Result<BTreeMap<String, Value>> {
        self.require_template(template)?
            .instantiate(slots, evaluator)
    }

    /// Validates positional slot values given in declaration order.
    ///
    /// # Errors
    /// As [`FactStore::prepare`], plus too many values.
    pub fn prepare_ordered(
        &self,
        template: &str,
        values: Vec<Value>,
        evaluator: &dyn Evaluator,
    ) -> Result<BTreeMap<String, Value>> {
        let t = self.require_template(template)?;
        let named = t.positional(values)?;
        t.instantiate(named, evaluator)
    }

    /// Validates changes to a live fact.
    ///
    /// # Errors
    /// Returns `UnknownFact`, `UnknownSlot`, or `ConstraintViolation`.
    pub fn prepare_revision(
        &self,
        id: FactId,
        changes: Vec<(String, Value)>,
    ) -> Result<(String, BTreeMap<String, Value>)> {
        let fact = self.get(id).ok_or_else(|| Error::unknown_fact(id))?;
        let revised = self
            .require_template(&fact.template)?
            .revise(&fact.slots, changes)?;
        Ok((fact.template.clone(), revised))
    }

    // =========================================================================
    // Fact Lifecycle
    // =========================================================================

    /// Stores a prepared fact under a fresh id.
    pub fn insert(&mut self, template: &str, slots: BTreeMap<String, Value>) -> Arc<Fact> {
        let id = FactId::new(self.next_id);
        self.next_id += 1;
        self.store(id, template, slots)
    }

    /// Stores a prepared fact under an id that was just removed.
    ///
    /// Used by modify, which keeps the fact's identity but gives it a new timetag.
    pub fn reinsert(
        &mut self,
        id: FactId,
        template: &str,
        slots: BTreeMap<String, Value>,
    ) -> Arc<Fact> {
        debug_assert!(!self.facts.contains_key(&id));
        debug_assert!(id.index() < self.next_id);
        self.store(id, template, slots)
    }

    fn store(&mut self, id: FactId, template: &str, slots: BTreeMap<String, Value>) -> Arc<Fact> {
        self.clock += 1;
        let fact = Arc::new(Fact {
            id,
            template: template.to_string(),
            slots,
            timetag: self.clock,
        });
        self.facts.insert(id, Arc::clone(&fact));
        let mut ids = self.by_template.get(template).cloned().unwrap_or_default();
        ids.insert(id);
        self.by_template.insert(template.to_string(), ids);
        fact
    }

    /// Removes a fact, returning it if it was live.
    pub fn remove(&mut self, id: FactId) -> Option<Arc<Fact>> {
        let fact = self.facts.remove(&id)?;
        if let Some(ids) = self.by_template.get_mut(&fact.template) {
            ids.remove(&id);
        }
        Some(fact)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Returns a live fact.
    #[must_use]
    pub fn get(&self, id: FactId) -> Option<&Arc<Fact>> {
        self.facts.get(&id)
    }

    /// Returns true if the fact is live.
    #[must_use]
    pub fn contains(&self, id: FactId) -> bool {
        self.facts.contains_key(&id)
    }

    /// Iterates live facts in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Fact>> {
        self.facts.values()
    }

    /// Iterates live facts of one template in id order.
    pub fn of_template<'a>(&'a self, template: &str) -> impl Iterator<Item = &'a Arc<Fact>> + 'a {
        self.by_template
            .get(template)
            .into_iter()
            .flat_map(|ids| ids.iter())
            .filter_map(|id| self.facts.get(id))
    }

    /// Finds a live fact with exactly these contents.
    #[must_use]
    pub fn find_equal(&self, template: &str, slots: &BTreeMap<String, Value>) -> Option<FactId> {
        self.of_template(template)
            .find(|f| f.same_contents(template, slots))
            .map(|f| f.id)
    }

    /// Number of live facts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.facts.len()
    }

    /// Returns true if no facts are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// The id the next asserted fact will receive.
    #[must_use]
    pub fn next_id(&self) -> FactId {
        FactId::new(self.next_id)
    }

    /// Returns a read-only working-memory view of this store.
    #[must_use]
    pub fn view(&self) -> FactView<'_> {
        FactView(self)
    }
}

/// Read-only working memory over a [`FactStore`].
///
/// Pattern predicates and `test` conditions evaluate against this view:
/// they may read slots of live facts but every mutation is rejected.
#[derive(Clone, Copy, Debug)]
pub struct FactView<'a>(&'a FactStore);

impl WorkingMemory for FactView<'_> {
    fn assert_fact(&mut self, _: &str, _: Vec<(String, Value)>) -> std::result::Result<FactId, EvalError> {
        Err(EvalError::SideEffectNotAllowed("assert"))
    }

    fn retract_fact(&mut self, _: FactId) -> std::result::Result<bool, EvalError> {
        Err(EvalError::SideEffectNotAllowed("retract"))
    }

    fn modify_fact(
        &mut self,
        _: FactId,
        _: Vec<(String, Value)>,
    ) -> std::result::Result<FactId, EvalError> {
        Err(EvalError::SideEffectNotAllowed("modify"))
    }

    fn duplicate_fact(
        &mut self,
        _: FactId,
        _: Vec<(String, Value)>,
    ) -> std::result::Result<FactId, EvalError> {
        Err(EvalError::SideEffectNotAllowed("duplicate"))
    }

    fn fact_slot(&self, id: FactId, slot: &str) -> Option<Value> {
        self.0.get(id).and_then(|f| f.slot(slot).cloned())
    }

    fn halt(&mut self) -> std::result::Result<(), EvalError> {
        Err(EvalError::SideEffectNotAllowed("halt"))
    }
}
