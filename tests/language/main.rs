//! Integration tests for Layer 1: Language
//!
//! Tests for expressions, bindings, and the default interpreter.

mod bindings;
mod interpreter;
