//! Matrix configuration and the simulated time window.

use crate::error::SimError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Simulated time bounds, `start <= now <= end`.
///
/// Events after `now` are "future" events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub now: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, now: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, SimError> {
        if start > now || now > end {
            return Err(SimError::InvalidTimeWindow(format!(
                "expected start <= now <= end, got {} / {} / {}",
                start, now, end
            )));
        }
        Ok(Self { start, now, end })
    }

    /// True if `t` is strictly after `now`.
    pub fn is_future(&self, t: DateTime<Utc>) -> bool {
        t > self.now
    }
}

/// Configuration for a Matrix run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixConfig {
    /// Master seed for determinism
    pub seed: u64,

    /// Start of the simulated period
    pub start: DateTime<Utc>,

    /// Boundary between past and future events
    pub now: DateTime<Utc>,

    /// End of the simulated period
    pub end: DateTime<Utc>,

    /// Number of clusters to build
    pub cluster_count: usize,

    /// Smallest cluster population
    pub population_min: usize,

    /// Largest cluster population
    pub population_max: usize,

    /// Chebyshev distance within which two persons are neighbors
    pub neighbor_radius: u32,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        // 2023-06-01T00:00:00Z
        let now = DateTime::<Utc>::default() + Duration::seconds(1_685_577_600);
        Self {
            seed: 42,
            start: now - Duration::days(120),
            now,
            end: now + Duration::days(30),
            cluster_count: 10,
            population_min: 1,
            population_max: 8,
            neighbor_radius: 1,
        }
    }
}

impl MatrixConfig {
    /// Validates the configuration and returns its time window.
    pub fn validate(&self) -> Result<TimeWindow, SimError> {
        let window = TimeWindow::new(self.start, self.now, self.end)?;
        if self.cluster_count == 0 {
            return Err(SimError::NoClusters);
        }
        if self.population_min == 0 {
            return Err(SimError::EmptyPopulation);
        }
        if self.population_min > self.population_max {
            return Err(SimError::InvalidPopulationBounds {
                min: self.population_min,
                max: self.population_max,
            });
        }
        Ok(window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_default_is_valid() {
        let config = MatrixConfig::default();
        let window = config.validate().unwrap();
        assert_eq!(window.now, Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap());
        assert!(window.start < window.now && window.now < window.end);
    }

    #[test]
    fn test_degenerate_window_rejected() {
        let config = MatrixConfig {
            end: MatrixConfig::default().start - Duration::days(1),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(SimError::InvalidTimeWindow(_))));
    }

    #[test]
    fn test_population_rules() {
        let empty = MatrixConfig { population_min: 0, ..Default::default() };
        assert!(matches!(empty.validate(), Err(SimError::EmptyPopulation)));

        let reversed = MatrixConfig { population_min: 5, population_max: 2, ..Default::default() };
        assert!(matches!(
            reversed.validate(),
            Err(SimError::InvalidPopulationBounds { min: 5, max: 2 })
        ));

        let none = MatrixConfig { cluster_count: 0, ..Default::default() };
        assert!(matches!(none.validate(), Err(SimError::NoClusters)));
    }

    #[test]
    fn test_is_future_is_strict() {
        let window = MatrixConfig::default().validate().unwrap();
        assert!(!window.is_future(window.now));
        assert!(window.is_future(window.now + Duration::seconds(1)));
    }
}
