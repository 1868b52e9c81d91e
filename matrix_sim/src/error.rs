//! Errors surfaced by the runner and the CLI.

use matrix_core::SimError;
use thiserror::Error;

/// Errors raised while configuring, running or exporting a scenario.
#[derive(Debug, Error)]
pub enum RunError {
    /// The simulation itself failed
    #[error(transparent)]
    Sim(#[from] SimError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown scenario: {0}")]
    UnknownScenario(String),

    /// Dates are accepted as `YYYY-MM-DD` or RFC 3339
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// Flags that only make sense for a single scenario
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
}

impl RunError {
    /// True when the run was rejected before any simulation began.
    pub fn is_configuration(&self) -> bool {
        match self {
            RunError::Sim(e) => e.is_configuration(),
            RunError::UnknownScenario(_) | RunError::InvalidDate(_) | RunError::InvalidArguments(_) => true,
            RunError::Io(_) | RunError::Json(_) => false,
        }
    }
}
