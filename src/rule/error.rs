//! Rule error types
//!
//! Compile-time errors are surfaced to the subscribing client in the close
//! reason, so their `Display` text is part of the subscription protocol.
//! Evaluation errors are per (rule, line) outcomes and stay internal.

use thiserror::Error;

/// Error type for rule compilation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    /// The expression is structurally malformed (missing `!`, `@`, `=`,
    /// empty field key, or empty highlight clause)
    #[error("invalid rule: {0}")]
    InvalidRule(String),

    /// The `!` marker appears after the `@` marker
    #[error("exclamation mark must precede the at sign")]
    ExclamationMustPrecedeAt,

    /// One of the regex fragments failed to compile
    #[error("invalid regex in rule part: {0}")]
    InvalidRegexPart(String),
}

/// Error type for evaluating a compiled rule against one log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EvalError {
    /// The line is not valid JSON or has no top-level field with the
    /// rule's field key
    #[error("field not found")]
    FieldNotFound,

    /// The field exists but its value is not a JSON string
    #[error("unsupported field type")]
    UnsupportedFieldType,

    /// The field value or the raw line does not match the rule
    #[error("not matched")]
    NoMatch,
}
