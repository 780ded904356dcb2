//! Rule expression compiler and evaluator
//!
//! Subscribers filter the log firehose with a tiny rule language:
//!
//! ```text
//! !<fieldKey>=<fieldPattern>@<highlightPattern>
//! ```
//!
//! The part between `!` and `@` is the *condition clause*: a top-level JSON
//! field name and a regex its string value must match. The part after `@` is
//! a regex whose occurrences in the raw line get wrapped in a highlight span.
//!
//! # Example
//!
//! ```text
//! rule:  !level=error@connection
//! line:  {"level":"error","message":"connection lost"}
//! out:   {"level":"error","message":"<span class="highlighted">connection</span> lost"}
//! ```
//!
//! Compilation is a two-stage pipeline (lexical split, then regex compile)
//! that returns typed errors rather than panicking; a [`CompiledRule`] only
//! ever exists in a fully valid state. Both compilation and evaluation are
//! pure and safe to run concurrently.

pub mod compile;
pub mod error;
pub mod eval;

pub use compile::CompiledRule;
pub use error::{EvalError, RuleError};
