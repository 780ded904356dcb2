//! Rule expression compiler
//!
//! Parses the `!key=pattern@pattern` form into a [`CompiledRule`]. Parsing
//! is a lexical split on the first `!`, `@`, and `=` markers followed by
//! regex compilation of both pattern fragments.

use regex::Regex;

use super::error::RuleError;

/// A validated, ready-to-evaluate rule
///
/// Immutable after construction and safe to share read-only across
/// concurrent evaluations.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub(super) field_key: String,
    pub(super) field_pattern: Regex,
    pub(super) highlight_pattern: Regex,
}

impl CompiledRule {
    /// Compile a rule expression string
    ///
    /// Returns [`RuleError::InvalidRule`] when the expression is missing a
    /// marker, the condition clause has no `=`, the field key is empty, or
    /// the highlight clause is empty; [`RuleError::ExclamationMustPrecedeAt`]
    /// when the markers are out of order; [`RuleError::InvalidRegexPart`]
    /// naming the offending fragment when a regex fails to compile.
    pub fn compile(expr: &str) -> Result<Self, RuleError> {
        let exc_idx = expr
            .find('!')
            .ok_or_else(|| RuleError::InvalidRule(expr.to_string()))?;
        let at_idx = expr
            .find('@')
            .ok_or_else(|| RuleError::InvalidRule(expr.to_string()))?;

        if exc_idx > at_idx {
            return Err(RuleError::ExclamationMustPrecedeAt);
        }

        let condition = &expr[exc_idx + 1..at_idx];
        let (field_key, field_pattern_text) = condition
            .split_once('=')
            .ok_or_else(|| RuleError::InvalidRule(expr.to_string()))?;

        if field_key.is_empty() {
            return Err(RuleError::InvalidRule(expr.to_string()));
        }

        let highlight_pattern_text = &expr[at_idx + 1..];

        // An empty highlight regex would match everywhere; reject it at
        // compile time so the evaluator never has to special-case it.
        if highlight_pattern_text.is_empty() {
            return Err(RuleError::InvalidRule(expr.to_string()));
        }

        Ok(Self {
            field_key: field_key.to_string(),
            field_pattern: compile_part(field_pattern_text)?,
            highlight_pattern: compile_part(highlight_pattern_text)?,
        })
    }

    /// The top-level JSON field name the condition clause applies to
    pub fn field_key(&self) -> &str {
        &self.field_key
    }
}

fn compile_part(part: &str) -> Result<Regex, RuleError> {
    Regex::new(part).map_err(|_| RuleError::InvalidRegexPart(part.to_string()))
}
