//! Rule evaluation
//!
//! Decides whether one raw log line matches a [`CompiledRule`] and, on a
//! match, returns the line with every highlight occurrence wrapped in a
//! `<span class="highlighted">` marker. Evaluation never mutates the rule
//! or any shared state.

use serde_json::Value;

use super::compile::CompiledRule;
use super::error::EvalError;

/// Opening tag wrapped around each highlight match
pub const HIGHLIGHT_OPEN: &str = "<span class=\"highlighted\">";
/// Closing tag wrapped around each highlight match
pub const HIGHLIGHT_CLOSE: &str = "</span>";

impl CompiledRule {
    /// Evaluate this rule against one raw log line
    ///
    /// The line is decoded as a JSON object and the rule's field key looked
    /// up at the top level; the field value must be a string matching the
    /// field pattern (substring semantics), and the highlight pattern must
    /// occur somewhere in the raw line. On success the returned string is
    /// the input with every highlight occurrence wrapped; all bytes outside
    /// matches are unchanged.
    ///
    /// Meant to run once per (rule, line) pair: re-applying it to its own
    /// output may wrap the markers themselves.
    pub fn evaluate(&self, line: &str) -> Result<String, EvalError> {
        let value: Value = serde_json::from_str(line).map_err(|_| EvalError::FieldNotFound)?;

        let field = value.get(&self.field_key).ok_or(EvalError::FieldNotFound)?;
        let field = field.as_str().ok_or(EvalError::UnsupportedFieldType)?;

        if !self.field_pattern.is_match(field) {
            return Err(EvalError::NoMatch);
        }

        if !self.highlight_pattern.is_match(line) {
            return Err(EvalError::NoMatch);
        }

        let transformed = self.highlight_pattern.replace_all(line, |caps: &regex::Captures| {
            format!("{}{}{}", HIGHLIGHT_OPEN, &caps[0], HIGHLIGHT_CLOSE)
        });

        Ok(transformed.into_owned())
    }
}
