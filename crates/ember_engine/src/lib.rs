//! RETE network, agenda, and rule engine driver for Ember.
//!
//! This crate provides:
//! - [`Pattern`] / [`SlotTest`] - Pattern conditions and slot unification
//! - [`Rule`] - Rule definitions with OR/AND condition elements
//! - [`AlphaNetwork`] - Shared per-pattern fact memories
//! - [`Network`] - Join, negation, and existence nodes over beta memories
//! - [`Agenda`] - Conflict resolution by salience and strategy
//! - [`Engine`] - The driver owning facts, rules, network, and agenda

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod agenda;
pub mod alpha;
pub mod beta;
pub mod config;
pub mod engine;
pub mod network;
pub mod pattern;
pub mod production;
pub mod rule;

pub use agenda::{Activation, ActivationId, ActivationKey, Agenda, Pending, SalienceMode, Strategy};
pub use alpha::{AlphaId, AlphaMemory, AlphaNetwork};
pub use beta::{BetaMemory, Token, TokenId};
pub use config::EngineConfig;
pub use engine::{Engine, EngineStats};
pub use network::{Network, NodeId};
pub use pattern::{Pattern, SeqItem, SlotTest};
pub use production::{ProductionEvent, ProductionNode};
pub use rule::{ConditionElement, Rule, Salience};
