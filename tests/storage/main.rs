//! Integration tests for Layer 2: Storage
//!
//! Tests for templates, slot validation, and the fact store.

mod store;
