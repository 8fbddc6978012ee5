//! Integration tests for Layer 0: Foundation
//!
//! Tests for core types: Value, FactId, TypeTag, and Error.

mod errors;
mod values;
