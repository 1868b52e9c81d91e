//! Common types shared by the environment layer and the engine.

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Free-form property payload, as carried by analytics events.
///
/// Backed by `serde_json::Map`, which keeps keys sorted, so serialized
/// payloads are byte-stable across runs.
pub type Properties = serde_json::Map<String, serde_json::Value>;

/// Stable internal identifier of a simulated person.
///
/// Never leaves the simulation as a distinct id; it only names the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PersonId(pub Uuid);

impl PersonId {
    /// Creates a PersonId from a UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Creates a deterministic PersonId from a seed.
    pub fn from_seed(seed: u64) -> Self {
        let mut bytes = [0u8; 16];
        bytes[0..8].copy_from_slice(&seed.to_le_bytes());
        bytes[8..16].copy_from_slice(&seed.wrapping_mul(0x517cc1b727220a95).to_le_bytes());
        Self(Uuid::from_bytes(bytes))
    }

    /// Returns the inner UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for PersonId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Show first 8 chars for readability
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// A named timezone with its standard UTC offset.
///
/// Offsets are fixed (no DST transitions), which is accurate enough for
/// picking plausible local hours of activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Timezone {
    /// IANA name, e.g. `America/New_York`
    pub name: &'static str,

    /// Offset east of UTC in seconds
    pub utc_offset_secs: i32,
}

impl Timezone {
    pub const UTC: Timezone = Timezone { name: "UTC", utc_offset_secs: 0 };

    /// Returns the offset as a chrono `FixedOffset`.
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_secs).unwrap_or_else(|| Utc.fix())
    }
}

impl std::fmt::Display for Timezone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_person_id_from_seed_is_stable() {
        assert_eq!(PersonId::from_seed(7), PersonId::from_seed(7));
        assert_ne!(PersonId::from_seed(7), PersonId::from_seed(8));
        assert_eq!(PersonId::from_seed(7).to_string().len(), 8);
    }

    #[test]
    fn test_timezone_offset() {
        let tokyo = Timezone { name: "Asia/Tokyo", utc_offset_secs: 9 * 3600 };
        assert_eq!(tokyo.offset().local_minus_utc(), 9 * 3600);
        assert_eq!(Timezone::UTC.offset().local_minus_utc(), 0);
    }
}
