//! Error types for the environment layer.

use thiserror::Error;

/// Errors raised by the random source and the content providers.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EnvError {
    /// Distribution parameters outside their mathematical domain
    #[error("Invalid distribution parameters: {0}")]
    InvalidDistribution(String),

    /// Weighted choice over an empty set, all-zero or negative weights
    #[error("Invalid weighted choice: {0}")]
    InvalidWeights(String),

    /// Empty collection passed where at least one item is required
    #[error("Cannot choose from an empty collection")]
    EmptyChoice,

    /// Country code with no known timezone
    #[error("Unknown country code: {0}")]
    UnknownCountry(String),
}

impl EnvError {
    /// Creates a distribution error.
    pub fn distribution(msg: impl Into<String>) -> Self {
        Self::InvalidDistribution(msg.into())
    }

    /// Creates a weights error.
    pub fn weights(msg: impl std::fmt::Display) -> Self {
        Self::InvalidWeights(msg.to_string())
    }
}
