//! Demo Matrix Environment Layer
//!
//! This crate holds everything the simulation engine treats as an opaque
//! collaborator: the seeded random source, the content providers that make
//! up names, companies, devices and geography, and the small shared types
//! (ids, timezones, property maps) that cross crate boundaries.
//!
//! # Core Concept: One Seed, Many Streams
//!
//! All entropy in a Matrix run is derived from a single 64-bit seed:
//! - The Matrix forks one stream per cluster
//! - Each cluster forks one stream per person
//! - Nothing in the engine ever touches OS entropy
//!
//! Because every stream is forked rather than shared, adding a person to a
//! cluster never shifts the random sequence seen by its siblings, and any
//! generated dataset is reproducible from its seed.
//!
//! # Example
//!
//! ```ignore
//! use matrix_env::{BuiltinProvider, ContentProvider, SimRandom};
//!
//! let mut random = SimRandom::new(42);
//! let provider = BuiltinProvider::default();
//! let name = provider.full_name(&mut random);
//! let timezone = provider.timezones_for("US")?[0];
//! ```

mod error;
mod providers;
mod random;
mod types;

pub use error::EnvError;
pub use providers::{BuiltinProvider, ContentProvider, DeviceProfile};
pub use random::SimRandom;
pub use types::{PersonId, Properties, Timezone};
