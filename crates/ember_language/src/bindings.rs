//! Variable binding environments.

use std::fmt;

use ember_foundation::Value;

/// A set of variable bindings produced by pattern matching.
///
/// Backed by a persistent ordered map so that extending a token's bindings
/// at each join level shares structure with its parent instead of copying.
/// Iteration order is by variable name, which keeps hashing and display
/// deterministic.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Bindings {
    values: im::OrdMap<String, Value>,
}

impl Bindings {
    /// Create empty bindings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a binding by variable name.
    #[must_use]
    pub fn get(&self, var: &str) -> Option<&Value> {
        self.values.get(var)
    }

    /// Returns true if `var` is bound.
    #[must_use]
    pub fn contains(&self, var: &str) -> bool {
        self.values.contains_key(var)
    }

    /// Set a binding.
    pub fn set(&mut self, var: impl Into<String>, value: Value) {
        self.values.insert(var.into(), value);
    }

    /// Returns a copy with one more binding.
    #[must_use]
    pub fn with(&self, var: impl Into<String>, value: Value) -> Self {
        Self {
            values: self.values.update(var.into(), value),
        }
    }

    /// Number of bound variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate all bindings in variable-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// Returns the values bound to `vars`, in order, or `None` if any is unbound.
    #[must_use]
    pub fn key_values(&self, vars: &[String]) -> Option<Vec<Value>> {
        vars.iter().map(|v| self.get(v).cloned()).collect()
    }

    /// Returns true if every variable bound in both environments has the same value.
    #[must_use]
    pub fn agrees_with(&self, other: &Bindings) -> bool {
        self.values
            .iter()
            .all(|(k, v)| other.get(k).is_none_or(|o| o == v))
    }
}

impl fmt::Debug for Bindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.values.iter().map(|(k, v)| (format!("?{k}"), v)))
            .finish()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Bindings {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut bindings = Self::new();
        for (k, v) in iter {
            bindings.set(k, v);
        }
        bindings
    }
}
