//! Simulated analytics events and the event taxonomy shared by all policies.

use chrono::{DateTime, Utc};
use matrix_env::Properties;
use serde::{Deserialize, Serialize};

// Event names emitted by the client protocol
pub const EVENT_PAGEVIEW: &str = "$pageview";
pub const EVENT_PAGELEAVE: &str = "$pageleave";
pub const EVENT_IDENTIFY: &str = "$identify";
pub const EVENT_GROUP_IDENTIFY: &str = "$groupidentify";

pub const PROPERTY_GEOIP_COUNTRY_CODE: &str = "$geoip_country_code";

/// Keys whose first `$set` value is also kept as `$initial_<key>`.
///
/// Mirrors what the ingestion pipeline does for real client events.
pub const IMPLICIT_INITIAL_PROPERTIES: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_content",
    "utm_term",
    "gclid",
    "fbclid",
    "$browser",
    "$browser_version",
    "$device_type",
    "$current_url",
    "$pathname",
    "$os",
    "$referring_domain",
    "$referrer",
];

/// Returns the `$initial_` key tracking `key`, e.g. `$browser` -> `$initial_browser`.
pub fn initial_key(key: &str) -> String {
    format!("$initial_{}", key.replace('$', ""))
}

/// Whether `key` gets implicit initial value tracking.
pub fn tracks_initial_value(key: &str) -> bool {
    IMPLICIT_INITIAL_PROPERTIES.contains(&key)
}

/// A simulated event.
///
/// Created only by the capture protocol; persons hand out shared references
/// to their logs, so an event is never mutated once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimEvent {
    /// Event name, e.g. `$pageview` or `signed_up`
    pub event: String,

    /// Distinct id active on the client at capture time
    pub distinct_id: String,

    /// Fully composed property payload
    pub properties: Properties,

    /// Simulated instant of capture
    pub timestamp: DateTime<Utc>,
}

impl SimEvent {
    /// Returns `$current_url` if the event was captured on a page.
    pub fn current_url(&self) -> Option<&str> {
        self.properties.get("$current_url").and_then(|value| value.as_str())
    }

    /// Returns a top-level string property.
    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(|value| value.as_str())
    }
}

impl std::fmt::Display for SimEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} # {}", self.timestamp.to_rfc3339(), self.event, self.distinct_id)?;
        if let Some(url) = self.current_url() {
            write!(f, " @ {}", url)?;
        }
        Ok(())
    }
}
