//! Reference policy: one session a week, one pageview per session.

use chrono::{DateTime, Duration, Utc};
use matrix_core::{Behavior, Person, SimContext, SimError};

/// Visits a single page once a week, every week.
#[derive(Debug, Clone)]
pub struct WeeklyPageviews {
    url: String,
}

impl WeeklyPageviews {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Default for WeeklyPageviews {
    fn default() -> Self {
        Self::new("https://example.com/")
    }
}

impl Behavior for WeeklyPageviews {
    type Intent = ();

    fn next_session_time(&self, person: &mut Person, _ctx: &SimContext<'_>) -> Result<DateTime<Utc>, SimError> {
        Ok(person.simulation_time() + Duration::weeks(1))
    }

    fn session_intent(&self, _person: &mut Person, _ctx: &SimContext<'_>) -> Result<Option<()>, SimError> {
        Ok(Some(()))
    }

    fn run_session(&self, _intent: (), person: &mut Person, _ctx: &mut SimContext<'_>) -> Result<(), SimError> {
        person.capture_pageview(&self.url, None, None);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use matrix_core::{Matrix, MatrixConfig};

    #[test]
    fn test_one_pageview_per_week() {
        let config = MatrixConfig {
            start: Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap(),
            now: Utc.with_ymd_and_hms(2023, 1, 29, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2023, 2, 26, 0, 0, 0).unwrap(),
            cluster_count: 1,
            population_min: 1,
            population_max: 1,
            ..Default::default()
        };
        let mut matrix = Matrix::new(config, WeeklyPageviews::default()).unwrap();
        matrix.simulate().unwrap();

        let person = matrix.people().next().unwrap();
        // Sessions on Jan 8, 15, 22 before now; Jan 29 is a hair after now,
        // and the Feb 26 session starts a hair after end
        assert_eq!(person.all_time_pageview_count("https://example.com/"), 8);
        assert_eq!(person.past_events().len(), 6);
        assert_eq!(person.future_events().len(), 10);
    }
}
