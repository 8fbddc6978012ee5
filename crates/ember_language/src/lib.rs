//! Expression AST, variable bindings, and the evaluator capability for Ember.
//!
//! The rule engine never interprets expressions itself. It hands an [`Expr`]
//! and a [`Bindings`] environment to an [`Evaluator`], which may reach back
//! into working memory through the narrow [`WorkingMemory`] surface.
//!
//! This crate provides:
//! - [`Expr`] - Recursive expression tree used by predicates, tests, and actions
//! - [`Bindings`] - Persistent variable environment shared between tokens
//! - [`Evaluator`] / [`WorkingMemory`] - The evaluation capability and its host
//! - [`ExprEvaluator`] - A small recursive-descent interpreter over [`Expr`]

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod bindings;
pub mod eval;
pub mod expr;
pub mod interpreter;

pub use bindings::Bindings;
pub use eval::{EvalError, Evaluator, NoWorkingMemory, WorkingMemory};
pub use expr::Expr;
pub use interpreter::{ExprEvaluator, NativeFn};
