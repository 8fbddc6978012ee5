//! Production nodes: where complete matches become activations.
//!
//! A rule's production node is shared by all of its disjuncts. It counts the
//! tokens supporting each distinct `(rule, fact_ids)` instantiation, so the
//! same facts matched through several OR alternatives, or through several
//! multifield segmentations, yield one activation. The instantiation stays
//! refracted for as long as any support remains.

use std::collections::HashMap;

use ember_foundation::FactId;
use ember_language::Bindings;

use crate::beta::TokenId;

/// A change in a rule's set of supported instantiations.
#[derive(Clone, Debug, PartialEq)]
pub enum ProductionEvent {
    /// An instantiation gained its first supporting token.
    Activated {
        /// Rule name.
        rule: String,
        /// Contributing facts in condition order.
        fact_ids: Vec<FactId>,
        /// Bindings of the first supporting token.
        bindings: Bindings,
        /// Test count of the disjunct that produced it.
        specificity: usize,
    },
    /// An instantiation lost its last supporting token.
    Deactivated {
        /// Rule name.
        rule: String,
        /// Contributing facts in condition order.
        fact_ids: Vec<FactId>,
    },
}

/// Support counts for one rule's instantiations.
#[derive(Clone, Debug)]
pub struct ProductionNode {
    rule: String,
    support: HashMap<Vec<FactId>, usize>,
    token_keys: HashMap<TokenId, Vec<FactId>>,
}

impl ProductionNode {
    /// Creates a production node for `rule`.
    #[must_use]
    pub fn new(rule: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            support: HashMap::new(),
            token_keys: HashMap::new(),
        }
    }

    /// Records a token reaching the end of a chain.
    pub fn insert(
        &mut self,
        token: TokenId,
        fact_ids: &[FactId],
        bindings: &Bindings,
        specificity: usize,
    ) -> Option<ProductionEvent> {
        self.token_keys.insert(token, fact_ids.to_vec());
        let count = self.support.entry(fact_ids.to_vec()).or_insert(0);
        *count += 1;
        (*count == 1).then(|| ProductionEvent::Activated {
            rule: self.rule.clone(),
            fact_ids: fact_ids.to_vec(),
            bindings: bindings.clone(),
            specificity,
        })
    }

    /// Records a supporting token being deleted.
    pub fn remove(&mut self, token: TokenId) -> Option<ProductionEvent> {
        let key = self.token_keys.remove(&token)?;
        let count = self.support.get_mut(&key)?;
        *count -= 1;
        if *count > 0 {
            return None;
        }
        self.support.remove(&key);
        Some(ProductionEvent::Deactivated {
            rule: self.rule.clone(),
            fact_ids: key,
        })
    }

    /// Number of tokens supporting an instantiation.
    #[must_use]
    pub fn support(&self, fact_ids: &[FactId]) -> usize {
        self.support.get(fact_ids).copied().unwrap_or(0)
    }

    /// Number of supported instantiations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.support.len()
    }

    /// Returns true if nothing is supported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.support.is_empty()
    }
}
