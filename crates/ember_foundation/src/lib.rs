//! Core values, fact identifiers, type tags, and errors for Ember.
//!
//! This crate provides:
//! - [`Value`] - The tagged value type carried by facts and bindings
//! - [`FactId`] - Monotonic fact identifiers
//! - [`TypeTag`] - Type tags used by slot constraints
//! - [`Error`] - Rich error types with context

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod fact_id;
pub mod types;
pub mod value;

pub use error::{Error, ErrorContext, ErrorKind, Result};
pub use fact_id::FactId;
pub use types::TypeTag;
pub use value::Value;
