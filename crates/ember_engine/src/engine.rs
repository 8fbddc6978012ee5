//! The engine driver.
//!
//! [`Engine`] owns the fact store, the network, the agenda, and the rule
//! table. Asserts and retracts propagate synchronously; [`Engine::run`] pops
//! activations and runs their actions, which may assert and retract in turn.
//!
//! # Example
//!
//! ```
//! use ember_engine::{Engine, Pattern, Rule};
//! use ember_language::Expr;
//! use ember_storage::Template;
//!
//! let mut engine = Engine::new();
//! engine.define_template(Template::new("person").with_field("name")).unwrap();
//! engine.define_template(Template::new("greeted").with_field("name")).unwrap();
//! engine
//!     .add_rule(
//!         Rule::new("greet")
//!             .with_pattern(Pattern::new("person").with_var("name", "n"))
//!             .with_action(Expr::assert("greeted", vec![("name", Expr::var("n"))])),
//!     )
//!     .unwrap();
//!
//! engine.assert_fact("person", [("name", "Bob".into())]).unwrap();
//! assert_eq!(engine.run(None), 1);
//! assert_eq!(engine.facts_of("greeted").count(), 1);
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use ember_foundation::{Error, ErrorContext, ErrorKind, FactId, Result, Value};
use ember_language::{Bindings, EvalError, Evaluator, Expr, ExprEvaluator, WorkingMemory};
use ember_storage::{Fact, FactStore, Template};
use tracing::{debug, info, warn};

use crate::agenda::{Activation, ActivationKey, Agenda, Pending, SalienceMode, Strategy};
use crate::config::EngineConfig;
use crate::network::Network;
use crate::pattern::MatchContext;
use crate::production::ProductionEvent;
use crate::rule::{Rule, Salience, clamp_salience};

/// Counters maintained by the engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Facts asserted, including duplicates and modify re-asserts.
    pub asserts: u64,
    /// Facts retracted, including modify retracts.
    pub retracts: u64,
    /// Activations created.
    pub activations: u64,
    /// Activations fired.
    pub fires: u64,
    /// Actions that failed.
    pub action_errors: u64,
}

#[derive(Clone, Debug)]
struct RuleEntry {
    rule: Arc<Rule>,
    /// Salience fixed at definition time.
    salience: i32,
}

/// A forward-chaining rule engine.
pub struct Engine {
    config: EngineConfig,
    store: FactStore,
    network: Network,
    agenda: Agenda,
    rules: BTreeMap<String, RuleEntry>,
    evaluator: Arc<dyn Evaluator + Send + Sync>,
    halted: bool,
    last_errors: Vec<Error>,
    stats: EngineStats,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("facts", &self.store.len())
            .field("rules", &self.rules.len())
            .field("agenda", &self.agenda.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Creates an engine with the default configuration and interpreter.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Creates an engine with the default interpreter.
    #[must_use]
    pub fn with_config(config: EngineConfig) -> Self {
        Self::with_evaluator(config, ExprEvaluator::new())
    }

    /// Creates an engine with a custom evaluator.
    #[must_use]
    pub fn with_evaluator(
        config: EngineConfig,
        evaluator: impl Evaluator + Send + Sync + 'static,
    ) -> Self {
        Self {
            agenda: Agenda::new(config.strategy, config.seed),
            config,
            store: FactStore::new(),
            network: Network::new(),
            rules: BTreeMap::new(),
            evaluator: Arc::new(evaluator),
            halted: false,
            last_errors: Vec::new(),
            stats: EngineStats::default(),
        }
    }

    // =========================================================================
    // Templates
    // =========================================================================

    /// Defines a template.
    ///
    /// # Errors
    /// Returns `DuplicateTemplate` if the name is taken.
    pub fn define_template(&mut self, template: Template) -> Result<()> {
        debug!(template = %template.name, "template defined");
        self.store.define_template(template)
    }

    /// Returns a template by name.
    #[must_use]
    pub fn template(&self, name: &str) -> Option<&Template> {
        self.store.template(name).map(AsRef::as_ref)
    }

    /// Iterates templates in name order.
    pub fn templates(&self) -> impl Iterator<Item = &Template> {
        self.store.templates().map(AsRef::as_ref)
    }

    // =========================================================================
    // Rules
    // =========================================================================

    /// Adds a rule.
    ///
    /// Activations for instantiations that already hold are created
    /// immediately.
    ///
    /// # Errors
    /// Returns `DuplicateRule`, `UnknownTemplate`, `UnknownSlot`, or
    /// `InvalidPattern`; the network is unchanged on error.
    pub fn add_rule(&mut self, rule: Rule) -> Result<()> {
        if self.rules.contains_key(&rule.name) {
            return Err(Error::new(ErrorKind::DuplicateRule(rule.name)));
        }
        let disjuncts = rule.compile(&self.store)?;
        let salience = match &rule.salience {
            Salience::Fixed(s) => clamp_salience(i64::from(*s)),
            Salience::Dynamic(expr) => {
                evaluate_salience(&*self.evaluator, &self.store, &rule.name, expr, &Bindings::new())
            }
        };
        let name = rule.name.clone();
        self.rules.insert(
            name.clone(),
            RuleEntry {
                rule: Arc::new(rule),
                salience,
            },
        );
        let ctx = MatchContext::new(&*self.evaluator, &self.store);
        let events = self.network.add_rule(&name, &disjuncts, ctx);
        debug!(rule = %name, salience, "rule added");
        self.apply(events);
        Ok(())
    }

    /// Removes a rule, its network nodes, and its pending activations.
    ///
    /// Returns false if no such rule exists.
    pub fn remove_rule(&mut self, name: &str) -> bool {
        let Some(events) = self.network.remove_rule(name) else {
            return false;
        };
        self.apply(events);
        self.agenda.remove_rule(name);
        self.rules.remove(name);
        debug!(rule = name, "rule removed");
        true
    }

    /// Returns a rule by name.
    #[must_use]
    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.rules.get(name).map(|e| e.rule.as_ref())
    }

    /// Iterates rules in name order.
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.values().map(|e| e.rule.as_ref())
    }

    // =========================================================================
    // Facts
    // =========================================================================

    /// Asserts a fact from named slot values.
    ///
    /// Missing slots take their defaults. With fact duplication disabled, an
    /// assert equal to a live fact returns that fact's id and changes nothing.
    ///
    /// # Errors
    /// Returns `UnknownTemplate`, `UnknownSlot`, or `ConstraintViolation`;
    /// nothing is stored or propagated on error.
    pub fn assert_fact<I, S>(&mut self, template: &str, slots: I) -> Result<FactId>
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        let slots = slots.into_iter().map(|(s, v)| (s.into(), v)).collect();
        let prepared = self.store.prepare(template, slots, &*self.evaluator)?;
        Ok(self.insert(template, prepared))
    }

    /// Asserts a fact from values given in slot declaration order.
    ///
    /// # Errors
    /// As [`Engine::assert_fact`], plus more values than slots.
    pub fn assert_ordered(&mut self, template: &str, values: Vec<Value>) -> Result<FactId> {
        let prepared = self
            .store
            .prepare_ordered(template, values, &*self.evaluator)?;
        Ok(self.insert(template, prepared))
    }

    /// Retracts a fact. Returns false, changing nothing, for unknown ids.
    pub fn retract_fact(&mut self, id: FactId) -> bool {
        let Some(fact) = self.store.get(id).cloned() else {
            return false;
        };
        self.withdraw(&fact);
        true
    }

    /// Replaces slots of a live fact, keeping its id.
    ///
    /// The fact is retracted and re-asserted with a new timetag, so rules
    /// that matched it may match again. With fact duplication disabled, a
    /// revision equal to another live fact retracts this one and returns the
    /// other fact's id.
    ///
    /// # Errors
    /// Returns `UnknownFact`, `UnknownSlot`, or `ConstraintViolation`; the
    /// original fact is untouched on error.
    pub fn modify_fact<I, S>(&mut self, id: FactId, changes: I) -> Result<FactId>
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        let changes = changes.into_iter().map(|(s, v)| (s.into(), v)).collect();
        let (template, slots) = self.store.prepare_revision(id, changes)?;
        let old = self
            .store
            .get(id)
            .cloned()
            .ok_or_else(|| Error::unknown_fact(id))?;
        self.withdraw(&old);
        if !self.config.fact_duplication {
            if let Some(existing) = self.store.find_equal(&template, &slots) {
                debug!(fact = %existing, "modify merged into existing fact");
                return Ok(existing);
            }
        }
        let fact = self.store.reinsert(id, &template, slots);
        self.propagate(&fact);
        Ok(id)
    }

    /// Asserts a copy of a live fact with some slots replaced.
    ///
    /// # Errors
    /// Returns `UnknownFact`, `UnknownSlot`, or `ConstraintViolation`.
    pub fn duplicate_fact<I, S>(&mut self, id: FactId, changes: I) -> Result<FactId>
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        let changes = changes.into_iter().map(|(s, v)| (s.into(), v)).collect();
        let (template, slots) = self.store.prepare_revision(id, changes)?;
        Ok(self.insert(&template, slots))
    }

    /// Retracts every fact and empties the agenda. Fact ids keep counting
    /// from where they were.
    ///
    /// Pending activations of rules without patterns are dropped too, and
    /// such rules are not queued again.
    pub fn reset(&mut self) {
        let ids: Vec<FactId> = self.store.iter().map(|f| f.id).collect();
        for id in ids {
            self.retract_fact(id);
        }
        self.agenda.clear();
        self.halted = false;
        self.last_errors.clear();
        debug!(pending = self.agenda.len(), "reset");
    }

    fn insert(&mut self, template: &str, slots: BTreeMap<String, Value>) -> FactId {
        if !self.config.fact_duplication {
            if let Some(existing) = self.store.find_equal(template, &slots) {
                debug!(fact = %existing, "duplicate assert ignored");
                return existing;
            }
        }
        let fact = self.store.insert(template, slots);
        self.propagate(&fact);
        fact.id
    }

    fn propagate(&mut self, fact: &Fact) {
        debug!("==> {fact}");
        self.stats.asserts += 1;
        let ctx = MatchContext::new(&*self.evaluator, &self.store);
        let events = self.network.assert_fact(fact, ctx);
        self.apply(events);
    }

    fn withdraw(&mut self, fact: &Fact) {
        debug!("<== {fact}");
        self.stats.retracts += 1;
        let ctx = MatchContext::new(&*self.evaluator, &self.store);
        let events = self.network.retract_fact(fact, ctx);
        self.store.remove(fact.id);
        self.apply(events);
    }

    /// Returns a live fact.
    #[must_use]
    pub fn fact(&self, id: FactId) -> Option<&Fact> {
        self.store.get(id).map(AsRef::as_ref)
    }

    /// Iterates live facts in id order.
    pub fn facts(&self) -> impl Iterator<Item = &Fact> {
        self.store.iter().map(AsRef::as_ref)
    }

    /// Iterates live facts of one template in id order.
    pub fn facts_of<'a>(&'a self, template: &str) -> impl Iterator<Item = &'a Fact> + 'a {
        self.store.of_template(template).map(AsRef::as_ref)
    }

    /// Number of live facts.
    #[must_use]
    pub fn fact_count(&self) -> usize {
        self.store.len()
    }

    // =========================================================================
    // Agenda
    // =========================================================================

    fn apply(&mut self, events: Vec<ProductionEvent>) {
        for event in events {
            match event {
                ProductionEvent::Activated {
                    rule,
                    fact_ids,
                    bindings,
                    specificity,
                } => {
                    let salience = self.activation_salience(&rule, &bindings);
                    let recency = fact_ids
                        .first()
                        .and_then(|id| self.store.get(*id))
                        .map_or(0, |f| f.timetag);
                    let queued = self.agenda.push(Pending {
                        rule,
                        salience,
                        bindings,
                        fact_ids,
                        recency,
                        specificity,
                    });
                    if let Some(id) = queued {
                        self.stats.activations += 1;
                        debug!(activation = ?id, salience, "==> activation");
                    }
                }
                ProductionEvent::Deactivated { rule, fact_ids } => {
                    let key = ActivationKey { rule, fact_ids };
                    if let Some(activation) = self.agenda.remove(&key) {
                        debug!("<== activation {activation}");
                    }
                }
            }
        }
    }

    fn activation_salience(&self, rule: &str, bindings: &Bindings) -> i32 {
        let Some(entry) = self.rules.get(rule) else {
            return 0;
        };
        match (&entry.rule.salience, self.config.salience_mode) {
            (Salience::Dynamic(expr), SalienceMode::WhenActivated | SalienceMode::EveryCycle) => {
                evaluate_salience(&*self.evaluator, &self.store, rule, expr, bindings)
            }
            _ => entry.salience,
        }
    }

    fn refresh_saliences(&mut self) {
        let (rules, store, evaluator) = (&self.rules, &self.store, &*self.evaluator);
        self.agenda.update_saliences(|activation| {
            match &rules.get(&activation.rule)?.rule.salience {
                Salience::Dynamic(expr) => Some(evaluate_salience(
                    evaluator,
                    store,
                    &activation.rule,
                    expr,
                    &activation.bindings,
                )),
                Salience::Fixed(_) => None,
            }
        });
    }

    /// Pending activations in firing order.
    #[must_use]
    pub fn agenda(&self) -> &Agenda {
        &self.agenda
    }

    /// The active conflict resolution strategy.
    #[must_use]
    pub fn strategy(&self) -> Strategy {
        self.config.strategy
    }

    /// Switches strategy, re-sorting pending activations.
    pub fn set_strategy(&mut self, strategy: Strategy) {
        self.config.strategy = strategy;
        self.agenda.set_strategy(strategy);
    }

    /// The active salience evaluation mode.
    #[must_use]
    pub fn salience_mode(&self) -> SalienceMode {
        self.config.salience_mode
    }

    /// Switches salience evaluation mode. Pending activations keep their
    /// current salience until re-evaluated.
    pub fn set_salience_mode(&mut self, mode: SalienceMode) {
        self.config.salience_mode = mode;
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Fires activations until the agenda is empty, `limit` activations have
    /// fired, or an action halts.
    ///
    /// Returns the number of activations fired. Without a limit a rule set
    /// that keeps re-activating itself never returns.
    pub fn run(&mut self, limit: Option<u32>) -> u32 {
        let limit = match (limit, self.config.max_fires) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.halted = false;
        self.last_errors.clear();
        let mut fired = 0;
        while !self.halted && limit.is_none_or(|l| fired < l) {
            if self.config.salience_mode == SalienceMode::EveryCycle {
                self.refresh_saliences();
            }
            let Some(activation) = self.agenda.pop() else {
                break;
            };
            fired += 1;
            self.fire(activation, fired);
        }
        fired
    }

    /// Fires at most one activation.
    pub fn step(&mut self) -> u32 {
        self.run(Some(1))
    }

    /// Stops the current run after the activation being fired.
    pub fn halt(&mut self) {
        self.halted = true;
    }

    fn fire(&mut self, activation: Activation, n: u32) {
        let Some(entry) = self.rules.get(&activation.rule) else {
            return;
        };
        let rule = Arc::clone(&entry.rule);
        info!("FIRE {n} {activation}");
        self.stats.fires += 1;

        let evaluator = Arc::clone(&self.evaluator);
        for (position, action) in rule.rhs.iter().enumerate() {
            if let Err(err) = evaluator.evaluate(action, &activation.bindings, self) {
                let err = Error::from(err).with_context(
                    ErrorContext::new()
                        .with_rule(&rule.name)
                        .with_position(position),
                );
                warn!(rule = %rule.name, position, error = %err, "action failed, skipping the rest");
                self.stats.action_errors += 1;
                self.last_errors.push(err);
                break;
            }
        }
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// The configuration, reflecting strategy and mode changes.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Errors raised by actions during the last run.
    #[must_use]
    pub fn last_errors(&self) -> &[Error] {
        &self.last_errors
    }

    /// Counters.
    #[must_use]
    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    /// The network, for inspection.
    #[must_use]
    pub fn network(&self) -> &Network {
        &self.network
    }

    /// Number of live alpha memories.
    #[must_use]
    pub fn alpha_memory_count(&self) -> usize {
        self.network.alpha().len()
    }

    /// Number of partial-match tokens.
    #[must_use]
    pub fn token_count(&self) -> usize {
        self.network.token_count()
    }

    /// Returns true if any memory, token, or pending activation refers to
    /// the fact.
    #[must_use]
    pub fn references_fact(&self, id: FactId) -> bool {
        self.network.references_fact(id) || self.agenda.iter().any(|a| a.fact_ids.contains(&id))
    }
}

fn evaluate_salience(
    evaluator: &dyn Evaluator,
    store: &FactStore,
    rule: &str,
    expr: &Expr,
    bindings: &Bindings,
) -> i32 {
    let mut view = store.view();
    match evaluator.evaluate(expr, bindings, &mut view) {
        Ok(Value::Int(n)) => clamp_salience(n),
        #[allow(clippy::cast_possible_truncation)]
        Ok(Value::Float(x)) => clamp_salience(x as i64),
        Ok(other) => {
            warn!(rule, value = %other, "salience is not a number, using 0");
            0
        }
        Err(err) => {
            warn!(rule, error = %err, "salience evaluation failed, using 0");
            0
        }
    }
}

// =============================================================================
// Working Memory
// =============================================================================

impl WorkingMemory for Engine {
    fn assert_fact(
        &mut self,
        template: &str,
        slots: Vec<(String, Value)>,
    ) -> std::result::Result<FactId, EvalError> {
        Ok(Engine::assert_fact(self, template, slots)?)
    }

    fn retract_fact(&mut self, id: FactId) -> std::result::Result<bool, EvalError> {
        Ok(Engine::retract_fact(self, id))
    }

    fn modify_fact(
        &mut self,
        id: FactId,
        changes: Vec<(String, Value)>,
    ) -> std::result::Result<FactId, EvalError> {
        Ok(Engine::modify_fact(self, id, changes)?)
    }

    fn duplicate_fact(
        &mut self,
        id: FactId,
        changes: Vec<(String, Value)>,
    ) -> std::result::Result<FactId, EvalError> {
        Ok(Engine::duplicate_fact(self, id, changes)?)
    }

    fn fact_slot(&self, id: FactId, slot: &str) -> Option<Value> {
        self.store.get(id).and_then(|f| f.slot(slot).cloned())
    }

    fn halt(&mut self) -> std::result::Result<(), EvalError> {
        Engine::halt(self);
        Ok(())
    }
}
