//! Demo Matrix Core - synthetic analytics event simulation engine
//!
//! A Matrix is a population of simulated persons arranged in small spatial
//! clusters. Each person runs a multi-session simulation over a fixed time
//! window and captures analytics events through a simulated browser client:
//! 1. **Capture protocol**: session ids, super properties, page context,
//!    `$set`/`$set_once` merging and GeoIP/feature-flag decoration
//! 2. **Simulation loop**: a per-person clock, a FIFO of deferred effects and
//!    a past/future split around the Matrix's `now`
//! 3. **Neighbor influence**: effects one person addresses to its cluster
//!    neighbors, landing only on persons that have not run yet
//!
//! Product behavior is supplied by a [`Behavior`] policy.

pub mod behavior;
pub mod bounded;
pub mod client;
pub mod cluster;
pub mod config;
pub mod effect;
pub mod error;
pub mod event;
pub mod groups;
pub mod matrix;
pub mod person;

#[cfg(test)]
pub(crate) mod testing;

// Re-export key types for convenience
pub use behavior::{Behavior, SimContext};
pub use bounded::Bounded;
pub use client::{split_url, BrowserClient};
pub use cluster::{Cluster, ClusterProfile};
pub use config::{MatrixConfig, TimeWindow};
pub use effect::{Effect, EffectOp, EffectTarget};
pub use error::SimError;
pub use event::SimEvent;
pub use groups::GroupStore;
pub use matrix::{Matrix, MatrixSummary};
pub use person::{NowSnapshot, Person, PersonState};

pub use matrix_env::{PersonId, Properties};
