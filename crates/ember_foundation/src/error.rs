//! Error types for the Ember system.
//!
//! Uses `thiserror` for ergonomic error definition with rich context.

use std::fmt;

use thiserror::Error;

use crate::fact_id::FactId;

/// Result alias used throughout Ember.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for Ember operations.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional context about where the error occurred.
    pub context: Option<ErrorContext>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Adds context to this error.
    #[must_use]
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Creates a slot constraint violation error.
    #[must_use]
    pub fn constraint_violation(
        template: impl Into<String>,
        slot: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::new(ErrorKind::ConstraintViolation {
            template: template.into(),
            slot: slot.into(),
            reason: reason.into(),
        })
    }

    /// Creates an unknown template error.
    #[must_use]
    pub fn unknown_template(name: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownTemplate(name.into()))
    }

    /// Creates an unknown slot error.
    #[must_use]
    pub fn unknown_slot(template: impl Into<String>, slot: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownSlot {
            template: template.into(),
            slot: slot.into(),
        })
    }

    /// Creates an unknown fact error.
    #[must_use]
    pub fn unknown_fact(id: FactId) -> Self {
        Self::new(ErrorKind::UnknownFact(id))
    }

    /// Creates an invalid pattern error.
    #[must_use]
    pub fn invalid_pattern(rule: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidPattern {
            rule: rule.into(),
            reason: reason.into(),
        })
    }

    /// Creates an evaluation error.
    #[must_use]
    pub fn eval(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Eval(message.into()))
    }

    /// Returns true if this is a constraint violation.
    #[must_use]
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self.kind, ErrorKind::ConstraintViolation { .. })
    }
}

/// Categorized error kinds.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// A slot value failed its template's type, range, or cardinality check.
    #[error("constraint violation in {template}.{slot}: {reason}")]
    ConstraintViolation {
        /// The template being asserted.
        template: String,
        /// The offending slot.
        slot: String,
        /// What was wrong with the value.
        reason: String,
    },

    /// A fact or pattern named a template that does not exist.
    #[error("unknown template: {0}")]
    UnknownTemplate(String),

    /// A fact or pattern named a slot its template does not declare.
    #[error("unknown slot {slot} in template {template}")]
    UnknownSlot {
        /// The template that was consulted.
        template: String,
        /// The slot name that was not found.
        slot: String,
    },

    /// A fact id does not refer to a live fact.
    #[error("unknown fact: {0}")]
    UnknownFact(FactId),

    /// A template with this name is already defined.
    #[error("template already defined: {0}")]
    DuplicateTemplate(String),

    /// A rule with this name is already defined.
    #[error("rule already defined: {0}")]
    DuplicateRule(String),

    /// A rule's left-hand side cannot be compiled.
    #[error("invalid pattern in rule {rule}: {reason}")]
    InvalidPattern {
        /// The rule being compiled.
        rule: String,
        /// Why the pattern was rejected.
        reason: String,
    },

    /// An expression failed to evaluate.
    #[error("evaluation error: {0}")]
    Eval(String),

    /// Internal error (should not happen).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Context about where an error occurred.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// Rule being compiled or fired, if any.
    pub rule: Option<String>,
    /// Index of the action or condition element involved.
    pub position: Option<usize>,
    /// Chain of enclosing operations, innermost last.
    pub stack: Vec<String>,
}

impl ErrorContext {
    /// Creates a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the rule name.
    #[must_use]
    pub fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.rule = Some(rule.into());
        self
    }

    /// Sets the action or condition index.
    #[must_use]
    pub fn with_position(mut self, position: usize) -> Self {
        self.position = Some(position);
        self
    }

    /// Adds a stack frame.
    #[must_use]
    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        self.stack.push(frame.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(rule) = &self.rule {
            write!(f, "in rule {rule}")?;
            if let Some(pos) = self.position {
                write!(f, " at #{pos}")?;
            }
        }
        if !self.stack.is_empty() {
            writeln!(f)?;
            for frame in &self.stack {
                writeln!(f, "  in {frame}")?;
            }
        }
        Ok(())
    }
}
