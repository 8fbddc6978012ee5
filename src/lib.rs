//! Ember - Forward-chaining production rule engine
//!
//! This crate re-exports all layers of the Ember system for convenient access.
//! For detailed documentation, see the individual layer crates.
//!
//! # Architecture
//!
//! ```text
//! Layer 3: ember_engine     - RETE network, agenda, engine driver
//! Layer 2: ember_storage    - Templates, slot validation, fact store
//! Layer 1: ember_language   - Expressions, bindings, evaluator capability
//! Layer 0: ember_foundation - Core types (Value, FactId, Error)
//! ```

pub use ember_engine as engine;
pub use ember_foundation as foundation;
pub use ember_language as language;
pub use ember_storage as storage;
