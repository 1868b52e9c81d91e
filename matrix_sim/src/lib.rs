//! Demo Matrix scenarios
//!
//! Behavior policies that drive the `matrix_core` engine, a runner that
//! configures and executes them, and a JSON exporter for the resulting
//! dataset.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    ScenarioRunner                        │
//! │   ScenarioId ──► Behavior policy ──► Matrix::simulate()  │
//! │                  (weekly, hedgebox)        │             │
//! │                                            ▼             │
//! │                 ScenarioMetrics ◄──── finished Matrix    │
//! │                 MatrixExport   ◄──────────┘              │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use matrix_sim::{ScenarioId, ScenarioRunner};
//!
//! let runner = ScenarioRunner::new(42).with_clusters(20);
//! let result = runner.run(ScenarioId::Hedgebox)?;
//! println!("{} signups", result.metrics.signups);
//! ```

mod error;
pub mod exporter;
pub mod policies;
pub mod runner;
pub mod scenarios;

pub use error::RunError;
pub use exporter::{MatrixExport, PersonExport};
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use scenarios::ScenarioId;
