//! Templates, slot validation, and the fact store for Ember.
//!
//! This crate provides:
//! - [`Template`] / [`SlotDef`] - Fact shapes with defaults and constraints
//! - [`Fact`] - An immutable working-memory element
//! - [`FactStore`] - Sole owner of live facts, indexed by id and template

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod fact;
pub mod store;
pub mod template;

pub use fact::Fact;
pub use store::{FactStore, FactView};
pub use template::{DefaultSpec, SlotConstraints, SlotDef, Template};
