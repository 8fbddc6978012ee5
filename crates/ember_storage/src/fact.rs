//! Working-memory elements.

use std::collections::BTreeMap;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use ember_foundation::{FactId, Value};

/// An immutable fact.
///
/// Facts never change while alive; a modify replaces the fact under the same
/// id with a fresh timetag.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Fact {
    /// Unique identifier.
    pub id: FactId,
    /// Name of the fact's template.
    pub template: String,
    /// Slot values, complete for every declared slot.
    pub slots: BTreeMap<String, Value>,
    /// Recency stamp; larger means more recently asserted or modified.
    pub timetag: u64,
}

impl Fact {
    /// Returns a slot value.
    #[must_use]
    pub fn slot(&self, name: &str) -> Option<&Value> {
        self.slots.get(name)
    }

    /// Returns true if `other` has the same template and slot values.
    #[must_use]
    pub fn same_contents(&self, template: &str, slots: &BTreeMap<String, Value>) -> bool {
        self.template == template && self.slots == *slots
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}", self.id, self.template)?;
        for (name, value) in &self.slots {
            write!(f, " ({name} {value})")?;
        }
        write!(f, ")")
    }
}
