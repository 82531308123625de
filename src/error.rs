//! Error types for mcdc-gate

use crate::run::RunId;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// mcdc-gate errors
#[derive(Error, Debug)]
pub enum Error {
    /// Decision has more conditions than the configured maximum.
    /// Raised before any truth table is built.
    #[error("Decision '{decision}' has {conditions} conditions (max {max}); simplify the expression or raise max_conditions_per_decision")]
    TooManyConditions {
        decision: String,
        conditions: usize,
        max: usize,
    },

    #[error("Malformed decision '{decision}': {reason}")]
    MalformedDecision { decision: String, reason: String },

    #[error("Decision '{decision}' expects {expected} condition values, got {got}")]
    InvalidAssignment {
        decision: String,
        expected: usize,
        got: usize,
    },

    #[error("Unknown run: {0}")]
    UnknownRun(RunId),

    #[error("Run already exists: {0}")]
    DuplicateRun(RunId),

    #[error("Run {0} has been stopped; no further tests can be recorded")]
    RunStopped(RunId),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("CEL parse error: {0}")]
    CelParse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_norway::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub(crate) fn malformed(decision: &str, reason: impl Into<String>) -> Self {
        Error::MalformedDecision {
            decision: decision.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the caller can keep going with the remaining decisions
    /// after this error (it only concerns a single decision).
    pub fn is_decision_local(&self) -> bool {
        matches!(
            self,
            Error::TooManyConditions { .. } | Error::MalformedDecision { .. } | Error::CelParse(_)
        )
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}
