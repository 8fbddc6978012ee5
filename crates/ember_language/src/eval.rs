//! The evaluation capability consumed by the rule engine.

use thiserror::Error;

use ember_foundation::{Error, FactId, Value};

use crate::bindings::Bindings;
use crate::expr::Expr;

/// Errors raised while evaluating an expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// A variable was referenced but not bound.
    #[error("unbound variable: ?{0}")]
    UnboundVariable(String),

    /// No function with this name exists.
    #[error("unknown function: {0}")]
    UnknownFunction(String),

    /// An argument had the wrong type.
    #[error("{function}: expected {expected}, got {actual:?}")]
    TypeMismatch {
        /// Function being applied.
        function: String,
        /// Description of the expected argument.
        expected: &'static str,
        /// The offending value.
        actual: Value,
    },

    /// Wrong number of arguments.
    #[error("{function}: expected {expected} arguments, got {actual}")]
    Arity {
        /// Function being applied.
        function: String,
        /// Description of the expected arity.
        expected: &'static str,
        /// Actual number of arguments.
        actual: usize,
    },

    /// Integer division by zero.
    #[error("division by zero")]
    DivisionByZero,

    /// A side effect was requested where only reads are allowed.
    #[error("{0} is not allowed in a pattern or test condition")]
    SideEffectNotAllowed(&'static str),

    /// Working memory rejected the request.
    #[error("{0}")]
    Host(String),
}

impl From<Error> for EvalError {
    fn from(err: Error) -> Self {
        Self::Host(err.to_string())
    }
}

impl From<EvalError> for Error {
    fn from(err: EvalError) -> Self {
        Error::eval(err.to_string())
    }
}

/// The side-effect surface an expression may use.
///
/// Rule actions receive the engine itself; pattern predicates and `test`
/// conditions receive a read-only view that rejects every mutation.
pub trait WorkingMemory {
    /// Asserts a new fact from named slot values.
    ///
    /// # Errors
    /// Returns an error if the template is unknown or a slot is invalid.
    fn assert_fact(
        &mut self,
        template: &str,
        slots: Vec<(String, Value)>,
    ) -> Result<FactId, EvalError>;

    /// Retracts a fact. Returns false if it was not live.
    ///
    /// # Errors
    /// Returns an error if mutation is not permitted here.
    fn retract_fact(&mut self, id: FactId) -> Result<bool, EvalError>;

    /// Replaces slots of a live fact, keeping its id.
    ///
    /// # Errors
    /// Returns an error if the fact is unknown or a slot is invalid.
    fn modify_fact(
        &mut self,
        id: FactId,
        changes: Vec<(String, Value)>,
    ) -> Result<FactId, EvalError>;

    /// Asserts a copy of a live fact with some slots replaced.
    ///
    /// # Errors
    /// Returns an error if the fact is unknown or a slot is invalid.
    fn duplicate_fact(
        &mut self,
        id: FactId,
        changes: Vec<(String, Value)>,
    ) -> Result<FactId, EvalError>;

    /// Reads one slot of a live fact.
    fn fact_slot(&self, id: FactId, slot: &str) -> Option<Value>;

    /// Requests that the fire loop stop after the current activation.
    ///
    /// # Errors
    /// Returns an error if halting is not permitted here.
    fn halt(&mut self) -> Result<(), EvalError>;
}

/// A working memory that permits nothing.
///
/// Used where an evaluation has no facts to consult, such as salience
/// expressions evaluated at definition time.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoWorkingMemory;

impl WorkingMemory for NoWorkingMemory {
    fn assert_fact(&mut self, _: &str, _: Vec<(String, Value)>) -> Result<FactId, EvalError> {
        Err(EvalError::SideEffectNotAllowed("assert"))
    }

    fn retract_fact(&mut self, _: FactId) -> Result<bool, EvalError> {
        Err(EvalError::SideEffectNotAllowed("retract"))
    }

    fn modify_fact(&mut self, _: FactId, _: Vec<(String, Value)>) -> Result<FactId, EvalError> {
        Err(EvalError::SideEffectNotAllowed("modify"))
    }

    fn duplicate_fact(&mut self, _: FactId, _: Vec<(String, Value)>) -> Result<FactId, EvalError> {
        Err(EvalError::SideEffectNotAllowed("duplicate"))
    }

    fn fact_slot(&self, _: FactId, _: &str) -> Option<Value> {
        None
    }

    fn halt(&mut self) -> Result<(), EvalError> {
        Err(EvalError::SideEffectNotAllowed("halt"))
    }
}

/// Evaluates expressions against a binding environment.
///
/// This is the only capability the rule engine requires from the expression
/// language. Implementations must be deterministic for pattern predicates:
/// the network assumes a predicate gives the same answer for the same
/// bindings every time it is asked.
pub trait Evaluator {
    /// Evaluates `expr` with `bindings` in scope.
    ///
    /// # Errors
    /// Returns an error for unbound variables, unknown functions, type
    /// mismatches, or rejected side effects.
    fn evaluate(
        &self,
        expr: &Expr,
        bindings: &Bindings,
        memory: &mut dyn WorkingMemory,
    ) -> Result<Value, EvalError>;

    /// Evaluates `expr` as a condition.
    ///
    /// Evaluation failure counts as "false": a predicate that cannot be
    /// evaluated does not match.
    fn test(&self, expr: &Expr, bindings: &Bindings, memory: &mut dyn WorkingMemory) -> bool {
        self.evaluate(expr, bindings, memory)
            .is_ok_and(|v| v.is_truthy())
    }
}
