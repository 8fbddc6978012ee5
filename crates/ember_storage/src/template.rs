//! Template definitions for facts.
//!
//! A template names a fact shape: its slots, their cardinality, defaults, and
//! constraints. Templates validate and default-fill slot values at assert time.

use std::collections::{BTreeMap, BTreeSet};

use ember_foundation::{Error, Result, TypeTag, Value};
use ember_language::{Bindings, Evaluator, Expr, NoWorkingMemory};

/// How an unspecified slot is filled.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum DefaultSpec {
    /// No default: `Void` for single slots, the empty list for multislots.
    #[default]
    None,
    /// A fixed value.
    Static(Value),
    /// An expression re-evaluated on every assert.
    Dynamic(Expr),
}

/// Type and range restrictions on slot values.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct SlotConstraints {
    /// Accepted type tags; `None` accepts every type.
    pub allowed_types: Option<BTreeSet<TypeTag>>,
    /// Inclusive numeric range applied to numeric values.
    pub numeric_range: Option<(f64, f64)>,
}

/// Definition of one slot.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct SlotDef {
    /// Whether the slot holds a multifield value.
    pub is_multi: bool,
    /// Default used when the slot is not supplied.
    pub default: DefaultSpec,
    /// Optional value constraints.
    pub constraints: Option<SlotConstraints>,
}

impl SlotDef {
    /// Creates a single-field slot.
    #[must_use]
    pub fn single() -> Self {
        Self::default()
    }

    /// Creates a multifield slot.
    #[must_use]
    pub fn multi() -> Self {
        Self {
            is_multi: true,
            ..Self::default()
        }
    }

    /// Sets a static default.
    #[must_use]
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = DefaultSpec::Static(value.into());
        self
    }

    /// Sets a dynamic default, evaluated on every assert.
    #[must_use]
    pub fn with_dynamic_default(mut self, expr: Expr) -> Self {
        self.default = DefaultSpec::Dynamic(expr);
        self
    }

    /// Restricts the slot to the given types.
    #[must_use]
    pub fn with_types(mut self, types: impl IntoIterator<Item = TypeTag>) -> Self {
        self.constraints
            .get_or_insert_with(SlotConstraints::default)
            .allowed_types = Some(types.into_iter().collect());
        self
    }

    /// Restricts numeric values to `[low, high]`.
    #[must_use]
    pub fn with_range(mut self, low: f64, high: f64) -> Self {
        self.constraints
            .get_or_insert_with(SlotConstraints::default)
            .numeric_range = Some((low, high));
        self
    }

    /// The value an unsupplied slot takes when there is no default.
    #[must_use]
    pub fn empty_value(&self) -> Value {
        if self.is_multi {
            Value::List(Vec::new())
        } else {
            Value::Void
        }
    }

    /// Checks a value against this slot's cardinality and constraints.
    ///
    /// `Void` in a single slot means "unset" and is exempt from type and
    /// range checks.
    ///
    /// # Errors
    /// Returns a constraint violation describing the first failure.
    pub fn check(&self, template: &str, slot: &str, value: &Value) -> Result<()> {
        let violation = |reason: String| Error::constraint_violation(template, slot, reason);

        match (self.is_multi, value) {
            (true, Value::List(items)) => {
                for item in items {
                    if let Some(reason) = self.check_field(item) {
                        return Err(violation(reason));
                    }
                }
                Ok(())
            }
            (true, other) => Err(violation(format!(
                "multifield slot requires a list, got {}",
                other.type_tag()
            ))),
            (false, Value::List(_)) => Err(violation(
                "single-field slot cannot hold a multifield value".to_string(),
            )),
            (false, Value::Void) => Ok(()),
            (false, other) => self.check_field(other).map_or(Ok(()), |r| Err(violation(r))),
        }
    }

    fn check_field(&self, value: &Value) -> Option<String> {
        let constraints = self.constraints.as_ref()?;
        let tag = value.type_tag();
        if let Some(allowed) = &constraints.allowed_types {
            if !allowed.contains(&tag) {
                let names: Vec<_> = allowed.iter().map(|t| t.name()).collect();
                return Some(format!("expected {}, got {tag}", names.join(" or ")));
            }
        }
        if let (Some((low, high)), Some(n)) = (constraints.numeric_range, value.as_number()) {
            if n < low || n > high {
                return Some(format!("{value} is outside the range {low}..{high}"));
            }
        }
        None
    }
}

/// A fact template.
#[derive(Clone, Debug, PartialEq)]
pub struct Template {
    /// Template name.
    pub name: String,
    /// Slots in declaration order.
    pub slots: Vec<(String, SlotDef)>,
}

impl Template {
    /// Creates a template with no slots.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slots: Vec::new(),
        }
    }

    /// Adds a slot.
    #[must_use]
    pub fn with_slot(mut self, name: impl Into<String>, def: SlotDef) -> Self {
        self.slots.push((name.into(), def));
        self
    }

    /// Adds a single-field slot with no default or constraints.
    #[must_use]
    pub fn with_field(self, name: impl Into<String>) -> Self {
        self.with_slot(name, SlotDef::single())
    }

    /// Returns a slot definition by name.
    #[must_use]
    pub fn slot(&self, name: &str) -> Option<&SlotDef> {
        self.slots.iter().find(|(n, _)| n == name).map(|(_, d)| d)
    }

    /// Returns slot names in declaration order.
    pub fn slot_names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|(n, _)| n.as_str())
    }

    /// Builds the complete slot map of a new fact.
    ///
    /// Supplied values are validated; missing slots are default-filled, with
    /// dynamic defaults evaluated now.
    ///
    /// # Errors
    /// Returns `UnknownSlot` for undeclared slots, `ConstraintViolation` for
    /// invalid values, or an evaluation error from a dynamic default.
    pub fn instantiate(
        &self,
        supplied: Vec<(String, Value)>,
        evaluator: &dyn Evaluator,
    ) -> Result<BTreeMap<String, Value>> {
        let mut values = self.collect_supplied(supplied)?;
        for (name, def) in &self.slots {
            if values.contains_key(name) {
                continue;
            }
            let value = match &def.default {
                DefaultSpec::None => def.empty_value(),
                DefaultSpec::Static(v) => v.clone(),
                DefaultSpec::Dynamic(expr) => {
                    evaluator.evaluate(expr, &Bindings::new(), &mut NoWorkingMemory)?
                }
            };
            def.check(&self.name, name, &value)?;
            values.insert(name.clone(), value);
        }
        Ok(values)
    }

    /// Builds the slot map of `base` with `changes` applied.
    ///
    /// # Errors
    /// Returns `UnknownSlot` or `ConstraintViolation` for invalid changes.
    pub fn revise(
        &self,
        base: &BTreeMap<String, Value>,
        changes: Vec<(String, Value)>,
    ) -> Result<BTreeMap<String, Value>> {
        let changes = self.collect_supplied(changes)?;
        let mut values = base.clone();
        values.extend(changes);
        Ok(values)
    }

    /// Builds a slot map from values given in declaration order.
    ///
    /// # Errors
    /// Returns a constraint violation if more values than slots are given.
    pub fn positional(&self, values: Vec<Value>) -> Result<Vec<(String, Value)>> {
        if values.len() > self.slots.len() {
            return Err(Error::constraint_violation(
                &self.name,
                "*",
                format!(
                    "{} values given for {} slots",
                    values.len(),
                    self.slots.len()
                ),
            ));
        }
        Ok(self
            .slots
            .iter()
            .map(|(n, _)| n.clone())
            .zip(values)
            .collect())
    }

    fn collect_supplied(&self, supplied: Vec<(String, Value)>) -> Result<BTreeMap<String, Value>> {
        let mut values = BTreeMap::new();
        for (name, value) in supplied {
            let def = self
                .slot(&name)
                .ok_or_else(|| Error::unknown_slot(&self.name, &name))?;
            def.check(&self.name, &name, &value)?;
            if values.insert(name.clone(), value).is_some() {
                return Err(Error::constraint_violation(
                    &self.name,
                    name,
                    "slot given more than once",
                ));
            }
        }
        Ok(values)
    }
}
