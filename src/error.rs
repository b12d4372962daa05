//! Error types of the rewriting engine.
//!
//! [`EngineError`] is what callers of the engine see. The local signals
//! ([`NoMatch`] and [`TypeError`](crate::language::types::TypeError)) never
//! leave the rule that produced them.

use thiserror::Error;

use crate::language::types::TypeError;

/// Fatal errors, propagated to whoever drives the rewriting.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A repeating strategy kept producing results past its budget.
    #[error("exceeded maximum repetitions ({max}) of `{strategy}` on {expression}")]
    RepeatExceeded {
        max: usize,
        strategy: String,
        expression: String,
    },
    #[error("graph invariant violated: {0}")]
    GraphInvariantViolation(String),
    #[error("ill-formed rule `{rule}`: {reason}")]
    IllFormedRule { rule: String, reason: String },
    #[error("type variable `{var}` escapes its scope in {context}")]
    UnresolvedTypeVariable { var: String, context: String },
    /// Positional or keyword arguments do not fit the constructor signature.
    #[error("wrong arguments for `{constructor}`: {reason}")]
    Arity { constructor: String, reason: String },
    #[error("ill-typed call to `{constructor}`: {source}")]
    IllTyped {
        constructor: String,
        #[source]
        source: TypeError,
    },
}

impl EngineError {
    pub(crate) fn ill_formed(rule: &str, reason: impl Into<String>) -> Self {
        Self::IllFormedRule {
            rule: rule.to_owned(),
            reason: reason.into(),
        }
    }
}

/// Raised by a rule or a replacement thunk that declines to fire.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("no match: {reason}")]
pub struct NoMatch {
    reason: String,
}

impl NoMatch {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl Default for NoMatch {
    fn default() -> Self {
        Self::new("declined")
    }
}

impl From<TypeError> for NoMatch {
    fn from(error: TypeError) -> Self {
        Self::new(error.to_string())
    }
}
