//! Behavior policies shipped with the simulator.

pub mod hedgebox;
pub mod weekly;

pub use hedgebox::{HedgeboxBehavior, HedgeboxIntent, HedgeboxPlan};
pub use weekly::WeeklyPageviews;
