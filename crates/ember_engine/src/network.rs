//! The beta network: join chains over alpha memories.
//!
//! Each disjunct of a rule compiles to one chain of nodes. The chain starts
//! at a root node whose memory holds a single empty token, so the first
//! condition is an ordinary join. Every node owns the memory of the tokens
//! it produced; its successor is either the next node or the rule's
//! production node.
//!
//! Nodes are not shared between rules, so each memory has exactly one
//! consumer and can be hash-indexed on that consumer's join key.

use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

use ember_foundation::{FactId, Value};
use ember_language::{Bindings, Expr};
use ember_storage::Fact;
use tracing::{debug, trace};

use crate::alpha::{AlphaId, AlphaNetwork};
use crate::beta::{BetaMemory, Token, TokenId};
use crate::pattern::{MatchContext, Pattern};
use crate::production::{ProductionEvent, ProductionNode};
use crate::rule::Condition;

/// Identifies a node in the network.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

// =============================================================================
// Nodes
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum JoinKind {
    Positive,
    Negative,
    Exists,
}

/// A join against one alpha memory.
///
/// Negative and existence joins track, per left token, the exact set of
/// facts that match it, and the single output token they emitted for it.
#[derive(Clone, Debug)]
struct JoinNode {
    kind: JoinKind,
    alpha: AlphaId,
    pattern: Pattern,
    key_vars: Vec<String>,
    key_slots: Vec<String>,
    right_index: HashMap<Vec<Value>, BTreeSet<FactId>>,
    blockers: HashMap<TokenId, BTreeSet<FactId>>,
    blocked_by: HashMap<FactId, BTreeSet<TokenId>>,
    outputs: HashMap<TokenId, TokenId>,
}

impl JoinNode {
    fn right_key(&self, fact: &Fact) -> Vec<Value> {
        self.key_slots
            .iter()
            .map(|s| fact.slot(s).cloned().unwrap_or(Value::Void))
            .collect()
    }

    fn left_key(&self, bindings: &Bindings) -> Vec<Value> {
        bindings.key_values(&self.key_vars).unwrap_or_default()
    }

    fn index_insert(&mut self, fact: &Fact) {
        let key = self.right_key(fact);
        self.right_index.entry(key).or_default().insert(fact.id);
    }

    fn index_remove(&mut self, fact: &Fact) {
        let key = self.right_key(fact);
        if let Some(ids) = self.right_index.get_mut(&key) {
            ids.remove(&fact.id);
            if ids.is_empty() {
                self.right_index.remove(&key);
            }
        }
    }

    fn candidates(&self, bindings: &Bindings) -> Vec<FactId> {
        self.right_index
            .get(&self.left_key(bindings))
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Records that `fact` matches `token`. Returns true on the first match.
    fn block(&mut self, token: TokenId, fact: FactId) -> bool {
        self.blocked_by.entry(fact).or_default().insert(token);
        let set = self.blockers.entry(token).or_default();
        set.insert(fact) && set.len() == 1
    }

    /// Drops all bookkeeping for a deleted left token.
    fn forget_left(&mut self, token: TokenId) {
        if let Some(facts) = self.blockers.remove(&token) {
            for fact in facts {
                if let Some(tokens) = self.blocked_by.get_mut(&fact) {
                    tokens.remove(&token);
                    if tokens.is_empty() {
                        self.blocked_by.remove(&fact);
                    }
                }
            }
        }
        self.outputs.remove(&token);
    }

    fn references(&self, fact: FactId) -> bool {
        self.blocked_by.contains_key(&fact)
            || self.right_index.values().any(|ids| ids.contains(&fact))
    }
}

#[derive(Clone, Debug)]
enum NodeKind {
    Root,
    Join(Box<JoinNode>),
    Test(Expr),
}

#[derive(Clone, Copy, Debug)]
enum Successor {
    Node(NodeId),
    Production { specificity: usize },
}

#[derive(Clone, Debug)]
struct Node {
    kind: NodeKind,
    rule: String,
    rule_seq: u64,
    depth: usize,
    parent: Option<NodeId>,
    successor: Successor,
    memory: BetaMemory,
}

#[derive(Clone, Debug)]
struct Chain {
    nodes: Vec<NodeId>,
    root_token: TokenId,
}

// =============================================================================
// Network
// =============================================================================

/// The alpha and beta networks with all partial-match state.
#[derive(Clone, Debug, Default)]
pub struct Network {
    alpha: AlphaNetwork,
    nodes: Vec<Option<Node>>,
    tokens: HashMap<TokenId, Token>,
    next_token: u64,
    fact_tokens: HashMap<FactId, Vec<TokenId>>,
    right_inputs: HashMap<AlphaId, Vec<NodeId>>,
    chains: HashMap<String, Vec<Chain>>,
    productions: HashMap<String, ProductionNode>,
    next_rule_seq: u64,
}

impl Network {
    /// Creates an empty network.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // -------------------------------------------------------------------------
    // Rules
    // -------------------------------------------------------------------------

    /// Builds the chains of a validated rule and primes them from live facts.
    ///
    /// Returns the activations that are already true.
    pub fn add_rule(
        &mut self,
        name: &str,
        disjuncts: &[Vec<Condition>],
        ctx: MatchContext<'_>,
    ) -> Vec<ProductionEvent> {
        let seq = self.next_rule_seq;
        self.next_rule_seq += 1;
        self.productions
            .insert(name.to_string(), ProductionNode::new(name));

        let mut out = Vec::new();
        for conditions in disjuncts {
            let nodes = self.build_chain(name, seq, conditions, ctx);
            let root = nodes[0];
            let root_token = self.emit(root, None, None, Bindings::new(), Vec::new(), ctx, &mut out);
            self.chains
                .entry(name.to_string())
                .or_default()
                .push(Chain { nodes, root_token });
        }
        debug!(rule = name, disjuncts = disjuncts.len(), primed = out.len(), "rule compiled");
        out
    }

    /// Tears down every node a rule owns.
    ///
    /// Returns `None` if the rule is unknown, otherwise the deactivations of
    /// its remaining instantiations.
    pub fn remove_rule(&mut self, name: &str) -> Option<Vec<ProductionEvent>> {
        let chains = self.chains.remove(name)?;
        let mut out = Vec::new();
        for chain in chains {
            self.delete_token(chain.root_token, &mut out);
            for id in chain.nodes {
                let Some(node) = self.nodes.get_mut(id.0).and_then(Option::take) else {
                    continue;
                };
                if let NodeKind::Join(join) = node.kind {
                    self.alpha.release(join.alpha);
                    if let Some(inputs) = self.right_inputs.get_mut(&join.alpha) {
                        inputs.retain(|&n| n != id);
                        if inputs.is_empty() {
                            self.right_inputs.remove(&join.alpha);
                        }
                    }
                }
            }
        }
        self.productions.remove(name);
        debug!(rule = name, "rule removed from network");
        Some(out)
    }

    fn build_chain(
        &mut self,
        rule: &str,
        seq: u64,
        conditions: &[Condition],
        ctx: MatchContext<'_>,
    ) -> Vec<NodeId> {
        let specificity: usize = conditions.iter().map(Condition::test_count).sum();
        let new_node = |kind, depth, parent| Node {
            kind,
            rule: rule.to_string(),
            rule_seq: seq,
            depth,
            parent,
            successor: Successor::Production { specificity },
            memory: BetaMemory::default(),
        };

        let mut ids = vec![self.push_node(new_node(NodeKind::Root, 0, None))];
        let mut bound: BTreeSet<String> = BTreeSet::new();
        for (depth, condition) in conditions.iter().enumerate() {
            let (kind, key_vars, alpha) = match condition {
                Condition::Test(expr) => (NodeKind::Test(expr.clone()), Vec::new(), None),
                Condition::Pattern(pattern) => {
                    let join = self.build_join(pattern, &bound, ctx);
                    if pattern.is_positive() {
                        bound.extend(pattern.bound_vars().into_iter().map(String::from));
                    }
                    let key_vars = join.key_vars.clone();
                    let alpha = join.alpha;
                    (NodeKind::Join(Box::new(join)), key_vars, Some(alpha))
                }
            };
            let parent = ids[ids.len() - 1];
            let id = self.push_node(new_node(kind, depth + 1, Some(parent)));
            if let Some(node) = self.nodes[parent.0].as_mut() {
                node.successor = Successor::Node(id);
                node.memory = BetaMemory::new(key_vars);
            }
            if let Some(alpha) = alpha {
                self.right_inputs.entry(alpha).or_default().push(id);
            }
            ids.push(id);
        }
        ids
    }

    fn build_join(
        &mut self,
        pattern: &Pattern,
        bound: &BTreeSet<String>,
        ctx: MatchContext<'_>,
    ) -> JoinNode {
        let alpha = self.alpha.acquire(pattern, ctx);
        let (key_vars, key_slots) = pattern
            .whole_slot_vars()
            .into_iter()
            .filter(|(var, _)| bound.contains(*var))
            .map(|(var, slot)| (var.to_string(), slot.to_string()))
            .unzip();
        let kind = if pattern.negated {
            JoinKind::Negative
        } else if pattern.exists {
            JoinKind::Exists
        } else {
            JoinKind::Positive
        };
        let mut join = JoinNode {
            kind,
            alpha,
            pattern: pattern.clone(),
            key_vars,
            key_slots,
            right_index: HashMap::new(),
            blockers: HashMap::new(),
            blocked_by: HashMap::new(),
            outputs: HashMap::new(),
        };
        if let Some(memory) = self.alpha.get(alpha) {
            for fact in memory.facts().filter_map(|id| ctx.store.get(id)) {
                join.index_insert(fact);
            }
        }
        join
    }

    fn push_node(&mut self, node: Node) -> NodeId {
        self.nodes.push(Some(node));
        NodeId(self.nodes.len() - 1)
    }

    // -------------------------------------------------------------------------
    // Facts
    // -------------------------------------------------------------------------

    /// Propagates a newly stored fact.
    ///
    /// Joins are right-activated deepest first within each chain, so a fact
    /// matching several conditions of one rule pairs with each left token
    /// exactly once.
    pub fn assert_fact(&mut self, fact: &Fact, ctx: MatchContext<'_>) -> Vec<ProductionEvent> {
        let mut out = Vec::new();
        let entered = self.alpha.activate(fact, ctx);
        let joins = self.joins_for(&entered);
        for &id in &joins {
            if let Some(join) = self.join_mut(id) {
                join.index_insert(fact);
            }
        }
        for id in joins {
            self.right_activate(id, fact, ctx, &mut out);
        }
        out
    }

    /// Removes a fact from every memory, token, and blocker set.
    ///
    /// The caller erases the fact from the store afterwards.
    pub fn retract_fact(&mut self, fact: &Fact, ctx: MatchContext<'_>) -> Vec<ProductionEvent> {
        let mut out = Vec::new();
        let left = self.alpha.deactivate(fact);
        let joins = self.joins_for(&left);
        for &id in &joins {
            if let Some(join) = self.join_mut(id) {
                join.index_remove(fact);
            }
        }
        if let Some(tokens) = self.fact_tokens.remove(&fact.id) {
            for token in tokens {
                self.delete_token(token, &mut out);
            }
        }
        for id in joins {
            self.unblock(id, fact.id, ctx, &mut out);
        }
        out
    }

    fn joins_for(&self, alphas: &[AlphaId]) -> Vec<NodeId> {
        let mut joins: Vec<NodeId> = alphas
            .iter()
            .filter_map(|a| self.right_inputs.get(a))
            .flatten()
            .copied()
            .collect();
        joins.sort_by_key(|id| {
            self.nodes[id.0]
                .as_ref()
                .map(|n| (n.rule_seq, Reverse(n.depth)))
        });
        joins
    }

    // -------------------------------------------------------------------------
    // Propagation
    // -------------------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    fn emit(
        &mut self,
        node: NodeId,
        parent: Option<TokenId>,
        fact: Option<FactId>,
        bindings: Bindings,
        fact_ids: Vec<FactId>,
        ctx: MatchContext<'_>,
        out: &mut Vec<ProductionEvent>,
    ) -> TokenId {
        let id = TokenId(self.next_token);
        self.next_token += 1;
        if let Some(n) = self.nodes[node.0].as_mut() {
            n.memory.insert(id, &bindings);
        }
        if let Some(p) = parent.and_then(|p| self.tokens.get_mut(&p)) {
            p.children.push(id);
        }
        if let Some(f) = fact {
            self.fact_tokens.entry(f).or_default().push(id);
        }
        self.tokens.insert(
            id,
            Token {
                node,
                parent,
                fact,
                bindings,
                fact_ids,
                children: Vec::new(),
            },
        );
        self.left_activate(node, id, ctx, out);
        id
    }

    /// Passes a token just stored at `node_id` to that node's successor.
    fn left_activate(
        &mut self,
        node_id: NodeId,
        token_id: TokenId,
        ctx: MatchContext<'_>,
        out: &mut Vec<ProductionEvent>,
    ) {
        let Some(node) = self.nodes[node_id.0].as_ref() else {
            return;
        };
        let Some(token) = self.tokens.get(&token_id) else {
            return;
        };
        let next = match node.successor {
            Successor::Production { specificity } => {
                if let Some(production) = self.productions.get_mut(&node.rule) {
                    out.extend(production.insert(
                        token_id,
                        &token.fact_ids,
                        &token.bindings,
                        specificity,
                    ));
                }
                return;
            }
            Successor::Node(next) => next,
        };
        let Some(child) = self.nodes[next.0].as_ref() else {
            return;
        };
        let bindings = token.bindings.clone();
        let fact_ids = token.fact_ids.clone();

        match &child.kind {
            NodeKind::Root => {}
            NodeKind::Test(expr) => {
                let mut view = ctx.store.view();
                if ctx.evaluator.test(expr, &bindings, &mut view) {
                    self.emit(next, Some(token_id), None, bindings, fact_ids, ctx, out);
                }
            }
            NodeKind::Join(join) if join.kind == JoinKind::Positive => {
                let candidates = join.candidates(&bindings);
                trace!(node = ?next, token = ?token_id, candidates = candidates.len(), "left activation");
                let matches: Vec<(FactId, Bindings)> = candidates
                    .iter()
                    .filter_map(|&id| ctx.store.get(id))
                    .flat_map(|fact| {
                        join.pattern
                            .unify(fact, &bindings, ctx)
                            .into_iter()
                            .map(move |b| (fact.id, b))
                    })
                    .collect();
                for (fact, extended) in matches {
                    let mut ids = fact_ids.clone();
                    ids.push(fact);
                    self.emit(next, Some(token_id), Some(fact), extended, ids, ctx, out);
                }
            }
            NodeKind::Join(join) => {
                let kind = join.kind;
                let blockers: Vec<FactId> = join
                    .candidates(&bindings)
                    .into_iter()
                    .filter(|&id| {
                        ctx.store
                            .get(id)
                            .is_some_and(|fact| !join.pattern.unify(fact, &bindings, ctx).is_empty())
                    })
                    .collect();
                let satisfied = (kind == JoinKind::Exists) != blockers.is_empty();
                if let Some(join) = self.join_mut(next) {
                    for &fact in &blockers {
                        join.block(token_id, fact);
                    }
                }
                if satisfied {
                    let output = self.emit(next, Some(token_id), None, bindings, fact_ids, ctx, out);
                    self.set_output(next, token_id, output);
                }
            }
        }
    }

    /// Joins a fact that just entered `join_id`'s alpha memory with the
    /// matching left tokens.
    fn right_activate(
        &mut self,
        join_id: NodeId,
        fact: &Fact,
        ctx: MatchContext<'_>,
        out: &mut Vec<ProductionEvent>,
    ) {
        let Some(node) = self.nodes[join_id.0].as_ref() else {
            return;
        };
        let (NodeKind::Join(join), Some(parent)) = (&node.kind, node.parent) else {
            return;
        };
        let Some(parent_node) = self.nodes[parent.0].as_ref() else {
            return;
        };
        let lefts = parent_node.memory.find_matching(&join.right_key(fact));
        trace!(node = ?join_id, fact = %fact.id, candidates = lefts.len(), "right activation");

        let kind = join.kind;
        let mut matched = Vec::new();
        for left in lefts {
            let Some(token) = self.tokens.get(&left) else {
                continue;
            };
            for extended in join.pattern.unify(fact, &token.bindings, ctx) {
                matched.push((left, extended));
                if kind != JoinKind::Positive {
                    break;
                }
            }
        }

        for (left, extended) in matched {
            match kind {
                JoinKind::Positive => {
                    let Some(token) = self.tokens.get(&left) else {
                        continue;
                    };
                    let mut ids = token.fact_ids.clone();
                    ids.push(fact.id);
                    self.emit(join_id, Some(left), Some(fact.id), extended, ids, ctx, out);
                }
                JoinKind::Negative | JoinKind::Exists => {
                    let first = self
                        .join_mut(join_id)
                        .is_some_and(|j| j.block(left, fact.id));
                    if !first {
                        continue;
                    }
                    if kind == JoinKind::Negative {
                        let output = self.join_mut(join_id).and_then(|j| j.outputs.remove(&left));
                        if let Some(output) = output {
                            self.delete_token(output, out);
                        }
                    } else if let Some(token) = self.tokens.get(&left) {
                        let (bindings, ids) = (token.bindings.clone(), token.fact_ids.clone());
                        let output = self.emit(join_id, Some(left), None, bindings, ids, ctx, out);
                        self.set_output(join_id, left, output);
                    }
                }
            }
        }
    }

    /// Removes a retracted fact from a negative or existence join's blocker
    /// sets, reviving or withdrawing output tokens whose set became empty.
    fn unblock(
        &mut self,
        join_id: NodeId,
        fact: FactId,
        ctx: MatchContext<'_>,
        out: &mut Vec<ProductionEvent>,
    ) {
        let Some(join) = self.join_mut(join_id) else {
            return;
        };
        let Some(blocked) = join.blocked_by.remove(&fact) else {
            return;
        };
        let kind = join.kind;
        let mut freed = Vec::new();
        for token in blocked {
            if let Some(set) = join.blockers.get_mut(&token) {
                set.remove(&fact);
                if set.is_empty() {
                    join.blockers.remove(&token);
                    freed.push(token);
                }
            }
        }

        for left in freed {
            match kind {
                JoinKind::Negative => {
                    let Some(token) = self.tokens.get(&left) else {
                        continue;
                    };
                    let (bindings, ids) = (token.bindings.clone(), token.fact_ids.clone());
                    let output = self.emit(join_id, Some(left), None, bindings, ids, ctx, out);
                    self.set_output(join_id, left, output);
                }
                JoinKind::Exists => {
                    let output = self.join_mut(join_id).and_then(|j| j.outputs.remove(&left));
                    if let Some(output) = output {
                        self.delete_token(output, out);
                    }
                }
                JoinKind::Positive => {}
            }
        }
    }

    /// Deletes a token and its whole subtree, children first.
    fn delete_token(&mut self, id: TokenId, out: &mut Vec<ProductionEvent>) {
        let Some(token) = self.tokens.remove(&id) else {
            return;
        };
        for &child in &token.children {
            self.delete_token(child, out);
        }
        if let Some(fact) = token.fact {
            if let Some(list) = self.fact_tokens.get_mut(&fact) {
                list.retain(|&t| t != id);
                if list.is_empty() {
                    self.fact_tokens.remove(&fact);
                }
            }
        }
        if let Some(parent) = token.parent.and_then(|p| self.tokens.get_mut(&p)) {
            parent.children.retain(|&c| c != id);
        }

        let Some(node) = self.nodes[token.node.0].as_mut() else {
            return;
        };
        node.memory.remove(id, &token.bindings);
        if let (NodeKind::Join(join), Some(parent)) = (&mut node.kind, token.parent) {
            if join.outputs.get(&parent) == Some(&id) {
                join.outputs.remove(&parent);
            }
        }
        let successor = node.successor;
        match successor {
            Successor::Production { .. } => {
                if let Some(production) = self.productions.get_mut(&node.rule) {
                    out.extend(production.remove(id));
                }
            }
            Successor::Node(next) => {
                if let Some(join) = self.join_mut(next) {
                    join.forget_left(id);
                }
            }
        }
    }

    fn join_mut(&mut self, id: NodeId) -> Option<&mut JoinNode> {
        match self.nodes.get_mut(id.0).and_then(Option::as_mut) {
            Some(Node {
                kind: NodeKind::Join(join),
                ..
            }) => Some(join),
            _ => None,
        }
    }

    fn set_output(&mut self, join_id: NodeId, left: TokenId, output: TokenId) {
        if let Some(join) = self.join_mut(join_id) {
            join.outputs.insert(left, output);
        }
    }

    // -------------------------------------------------------------------------
    // Inspection
    // -------------------------------------------------------------------------

    /// The alpha network.
    #[must_use]
    pub fn alpha(&self) -> &AlphaNetwork {
        &self.alpha
    }

    /// Returns a token by id.
    #[must_use]
    pub fn token(&self, id: TokenId) -> Option<&Token> {
        self.tokens.get(&id)
    }

    /// Iterates every token except the per-chain root tokens.
    pub fn tokens(&self) -> impl Iterator<Item = (TokenId, &Token)> {
        self.tokens
            .iter()
            .filter(|(_, t)| t.parent.is_some())
            .map(|(id, t)| (*id, t))
    }

    /// Number of tokens, not counting the per-chain root tokens.
    #[must_use]
    pub fn token_count(&self) -> usize {
        self.tokens().count()
    }

    /// Number of live nodes, including chain roots.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.iter().flatten().count()
    }

    /// Returns true if the rule has chains in the network.
    #[must_use]
    pub fn has_rule(&self, name: &str) -> bool {
        self.chains.contains_key(name)
    }

    /// The production node of a rule.
    #[must_use]
    pub fn production(&self, rule: &str) -> Option<&ProductionNode> {
        self.productions.get(rule)
    }

    /// Returns true if any memory, token, index, or blocker set still
    /// refers to the fact.
    #[must_use]
    pub fn references_fact(&self, fact: FactId) -> bool {
        self.fact_tokens.contains_key(&fact)
            || self.tokens.values().any(|t| t.fact_ids.contains(&fact))
            || self.alpha.iter().any(|(_, m)| m.contains(fact))
            || self.nodes.iter().flatten().any(|n| match &n.kind {
                NodeKind::Join(join) => join.references(fact),
                _ => false,
            })
    }
}
