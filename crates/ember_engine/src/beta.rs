//! Tokens and beta memories.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use ember_foundation::{FactId, Value};
use ember_language::Bindings;

use crate::network::NodeId;

/// Identifies a token. Ids are never reused within a network.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenId(pub(crate) u64);

impl fmt::Debug for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// A partial match.
///
/// Tokens form a tree: each token extends its parent by one condition.
/// Deleting a token deletes its whole subtree.
#[derive(Clone, Debug)]
pub struct Token {
    /// Node whose memory holds this token.
    pub node: NodeId,
    /// Token this one extends.
    pub parent: Option<TokenId>,
    /// Fact matched at this node, for positive joins.
    pub fact: Option<FactId>,
    /// Variable bindings accumulated along the chain.
    pub bindings: Bindings,
    /// Contributing fact of each positive pattern, in condition order.
    pub fact_ids: Vec<FactId>,
    /// Tokens extending this one.
    pub children: Vec<TokenId>,
}

/// Tokens produced by one node, hash-indexed by the join key of the node
/// that consumes them.
#[derive(Clone, Debug, Default)]
pub struct BetaMemory {
    tokens: BTreeSet<TokenId>,
    key_vars: Vec<String>,
    key_index: HashMap<Vec<Value>, BTreeSet<TokenId>>,
}

impl BetaMemory {
    /// Creates a memory indexed on `key_vars`.
    #[must_use]
    pub fn new(key_vars: Vec<String>) -> Self {
        Self {
            tokens: BTreeSet::new(),
            key_vars,
            key_index: HashMap::new(),
        }
    }

    /// Variables the index is keyed on.
    #[must_use]
    pub fn key_vars(&self) -> &[String] {
        &self.key_vars
    }

    /// Adds a token.
    pub fn insert(&mut self, id: TokenId, bindings: &Bindings) {
        self.tokens.insert(id);
        let key = self.key_of(bindings);
        self.key_index.entry(key).or_default().insert(id);
    }

    /// Removes a token.
    pub fn remove(&mut self, id: TokenId, bindings: &Bindings) {
        if !self.tokens.remove(&id) {
            return;
        }
        let key = self.key_of(bindings);
        if let Some(ids) = self.key_index.get_mut(&key) {
            ids.remove(&id);
            if ids.is_empty() {
                self.key_index.remove(&key);
            }
        }
    }

    /// Tokens whose key values equal `key`, in id order.
    #[must_use]
    pub fn find_matching(&self, key: &[Value]) -> Vec<TokenId> {
        self.key_index
            .get(key)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Returns true if the token is held here.
    #[must_use]
    pub fn contains(&self, id: TokenId) -> bool {
        self.tokens.contains(&id)
    }

    /// Iterates tokens in id order.
    pub fn iter(&self) -> impl Iterator<Item = TokenId> + '_ {
        self.tokens.iter().copied()
    }

    /// Number of tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns true if the memory holds no tokens.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    fn key_of(&self, bindings: &Bindings) -> Vec<Value> {
        // Key variables are bound on every token reaching this memory.
        bindings.key_values(&self.key_vars).unwrap_or_default()
    }
}
