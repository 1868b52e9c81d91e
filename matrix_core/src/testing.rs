//! Shared fixtures for unit tests.

use crate::behavior::{Behavior, SimContext};
use crate::cluster::ClusterProfile;
use crate::config::{MatrixConfig, TimeWindow};
use crate::error::SimError;
use crate::groups::GroupStore;
use crate::person::Person;
use chrono::{DateTime, Duration, TimeZone, Utc};
use matrix_env::{BuiltinProvider, PersonId, SimRandom};

pub(crate) fn utc(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
}

pub(crate) fn test_window() -> TimeWindow {
    TimeWindow::new(utc(2023, 1, 1), utc(2023, 6, 1), utc(2023, 7, 1)).unwrap()
}

/// One cluster of three, 2023-01-01 .. 2023-07-01, now 2023-06-01.
pub(crate) fn test_config() -> MatrixConfig {
    let window = test_window();
    MatrixConfig {
        seed: 42,
        start: window.start,
        now: window.now,
        end: window.end,
        cluster_count: 1,
        population_min: 3,
        population_max: 3,
        neighbor_radius: 1,
    }
}

pub(crate) fn test_person(seed: u64) -> Person {
    Person::new(
        PersonId::from_seed(seed),
        SimRandom::new(seed),
        "US".to_string(),
        test_window(),
        &BuiltinProvider::new(),
    )
    .unwrap()
}

/// Owns what a `SimContext` borrows.
pub(crate) struct Fixture {
    pub(crate) window: TimeWindow,
    pub(crate) profile: ClusterProfile,
    pub(crate) providers: BuiltinProvider,
    pub(crate) groups: GroupStore,
}

impl Fixture {
    pub(crate) fn new() -> Self {
        Self {
            window: test_window(),
            profile: ClusterProfile::default(),
            providers: BuiltinProvider::new(),
            groups: GroupStore::new(),
        }
    }

    pub(crate) fn context(&mut self) -> SimContext<'_> {
        SimContext::new(self.window, &self.profile, &self.providers, &mut self.groups)
    }
}

/// One session a week, one pageview per session.
pub(crate) struct WeeklyBehavior;

impl Behavior for WeeklyBehavior {
    type Intent = ();

    fn next_session_time(&self, person: &mut Person, _ctx: &SimContext<'_>) -> Result<DateTime<Utc>, SimError> {
        Ok(person.simulation_time() + Duration::weeks(1))
    }

    fn session_intent(&self, _person: &mut Person, _ctx: &SimContext<'_>) -> Result<Option<()>, SimError> {
        Ok(Some(()))
    }

    fn run_session(&self, _intent: (), person: &mut Person, _ctx: &mut SimContext<'_>) -> Result<(), SimError> {
        person.capture_pageview("https://example.com/", None, None);
        Ok(())
    }
}
