//! Error taxonomy of the simulation engine.
//!
//! Nothing here is retried: the simulation is a deterministic computation,
//! so any of these errors points at a logic defect or a bad configuration.

use chrono::{DateTime, Utc};
use matrix_env::{EnvError, PersonId};
use thiserror::Error;

/// Errors raised while building or running a Matrix.
#[derive(Debug, Error)]
pub enum SimError {
    // Lifecycle violations
    /// `run()` called on a person whose loop is in progress
    #[error("Person {0} is already being simulated")]
    AlreadyRunning(String),

    /// `run()` called on a person that already finished
    #[error("Person {0} has already been simulated")]
    AlreadyFinished(String),

    /// `simulate()` called twice on the same Matrix
    #[error("Matrix has already been simulated")]
    MatrixAlreadySimulated,

    /// `unregister()` of a super property that was never registered
    #[error("Super property not registered: {0}")]
    UnknownSuperProperty(String),

    // Invariant violations (policy-layer defects)
    /// Effect or policy touched a scalar the person doesn't define
    #[error("Unknown attribute: {0}")]
    UnknownAttribute(String),

    /// Effect addressed to a person that doesn't exist in this Matrix
    #[error("Unknown person: {0}")]
    UnknownPerson(PersonId),

    /// Policy returned a next session instant that doesn't move the clock
    #[error("Clock stalled for person {person}: next session at {next} is not after {current}")]
    StalledClock {
        person: String,
        next: DateTime<Utc>,
        current: DateTime<Utc>,
    },

    /// Session intent reached a dispatch point that doesn't handle it
    #[error("Unhandled session intent: {0}")]
    UnhandledIntent(String),

    /// Any other defect reported by a behavior policy
    #[error("Policy error: {0}")]
    Policy(String),

    // Configuration errors
    /// `start <= now <= end` doesn't hold
    #[error("Invalid time window: {0}")]
    InvalidTimeWindow(String),

    /// Cluster configured to hold nobody
    #[error("Cluster population must be at least 1")]
    EmptyPopulation,

    /// Population lower bound above upper bound
    #[error("Invalid population bounds: min {min} > max {max}")]
    InvalidPopulationBounds { min: usize, max: usize },

    /// Matrix configured with zero clusters
    #[error("Matrix needs at least one cluster")]
    NoClusters,

    /// Random source or content provider failure
    #[error(transparent)]
    Env(#[from] EnvError),
}

impl SimError {
    /// Creates a policy error.
    pub fn policy(msg: impl Into<String>) -> Self {
        Self::Policy(msg.into())
    }

    /// Creates an unhandled intent error from any debuggable intent.
    pub fn unhandled_intent(intent: impl std::fmt::Debug) -> Self {
        Self::UnhandledIntent(format!("{:?}", intent))
    }

    /// True for errors rejected before any simulation begins.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SimError::InvalidTimeWindow(_)
                | SimError::EmptyPopulation
                | SimError::InvalidPopulationBounds { .. }
                | SimError::NoClusters
        )
    }
}
