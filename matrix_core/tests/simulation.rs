//! End-to-end properties of a full Matrix run.

use chrono::{DateTime, Duration, TimeZone, Utc};
use matrix_core::{Behavior, Bounded, ClusterProfile, Effect, Matrix, MatrixConfig, Person, SimContext, SimError};
use serde_json::json;

fn utc(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
}

fn config(seed: u64, population: usize) -> MatrixConfig {
    MatrixConfig {
        seed,
        start: utc(2023, 1, 1),
        now: utc(2023, 6, 1),
        end: utc(2023, 7, 1),
        cluster_count: 1,
        population_min: population,
        population_max: population,
        neighbor_radius: 1,
    }
}

/// One session a week with a single pageview.
struct Weekly;

impl Behavior for Weekly {
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

/// Weekly visits; on the first visit a person warms up its neighbors and joins a team.
struct Friendly;

impl Behavior for Friendly {
    type Intent = ();

    fn init_person(&self, person: &mut Person, _cluster: &ClusterProfile) -> Result<(), SimError> {
        person.declare_attribute("warmth", Bounded::unit(0.0));
        Ok(())
    }

    fn next_session_time(&self, person: &mut Person, _ctx: &SimContext<'_>) -> Result<DateTime<Utc>, SimError> {
        Ok(person.simulation_time() + Duration::weeks(1))
    }

    fn session_intent(&self, _person: &mut Person, _ctx: &SimContext<'_>) -> Result<Option<()>, SimError> {
        Ok(Some(()))
    }

    fn run_session(&self, _intent: (), person: &mut Person, ctx: &mut SimContext<'_>) -> Result<(), SimError> {
        person.capture_pageview("https://example.com/", None, Some("https://www.google.com/"));
        if person.memory("greeted").is_none() {
            person.remember("greeted", true);
            person.affect_neighbors(Effect::shift("warmth", 0.1));
            let team = format!("team-{}", ctx.cluster.index);
            let size = person.x().abs() + person.y().abs();
            person.group(ctx, "team", &team, Some(json!({ "last_size": size }).as_object().cloned().unwrap_or_default()));
        }
        Ok(())
    }
}

fn event_log(matrix: &Matrix<impl Behavior>) -> Vec<String> {
    matrix
        .people()
        .map(|p| serde_json::to_string(&(p.past_events(), p.future_events())).unwrap())
        .collect()
}

#[test]
fn test_end_to_end_weekly() {
    let mut matrix = Matrix::new(config(7, 3), Weekly).unwrap();
    let summary = matrix.simulate().unwrap();
    assert_eq!(summary.persons, 3);

    for person in matrix.people() {
        assert!(person.is_finished());
        assert!(!person.past_events().is_empty());
        assert!(!person.future_events().is_empty());

        let now = matrix.window().now;
        assert!(person.past_events().iter().all(|e| e.timestamp <= now));
        assert!(person.future_events().iter().all(|e| e.timestamp > now));

        let at_now = person.distinct_ids_at_now().unwrap();
        for event in person.all_events() {
            let distinct_id = event.property_str("$distinct_id").unwrap();
            assert!(at_now.contains(distinct_id) || person.distinct_ids().contains(distinct_id));
        }
    }
}

#[test]
fn test_same_seed_same_events() {
    let mut a = Matrix::new(config(1234, 4), Friendly).unwrap();
    let mut b = Matrix::new(config(1234, 4), Friendly).unwrap();
    assert_eq!(a.simulate().unwrap(), b.simulate().unwrap());
    assert_eq!(event_log(&a), event_log(&b));
    assert_eq!(a.groups(), b.groups());
}

#[test]
fn test_different_seed_different_events() {
    let mut a = Matrix::new(config(1, 3), Weekly).unwrap();
    let mut b = Matrix::new(config(2, 3), Weekly).unwrap();
    a.simulate().unwrap();
    b.simulate().unwrap();
    assert_ne!(event_log(&a), event_log(&b));
}

#[test]
fn test_effects_only_reach_unfinished_neighbors() {
    let mut matrix = Matrix::new(config(5, 3), Friendly).unwrap();
    let summary = matrix.simulate().unwrap();

    // Everyone neighbors everyone in a cluster of three
    assert_eq!(summary.effects_delivered, 3);
    assert_eq!(summary.effects_dropped, 3);

    let warmth: Vec<f64> = matrix.people().map(|p| p.attribute("warmth").unwrap()).collect();
    assert!(warmth[0].abs() < 1e-9);
    assert!((warmth[1] - 0.1).abs() < 1e-9);
    assert!((warmth[2] - 0.2).abs() < 1e-9);
}

#[test]
fn test_group_state_is_shared() {
    let mut matrix = Matrix::new(config(5, 3), Friendly).unwrap();
    let summary = matrix.simulate().unwrap();
    assert_eq!(summary.groups, 1);

    let team = matrix.groups().get("team", "team-0").unwrap();
    assert!(team.contains_key("last_size"));

    for person in matrix.people() {
        assert_eq!(person.groups().get("team").map(String::as_str), Some("team-0"));
        let identify = person.all_events().find(|e| e.event == "$groupidentify").unwrap();
        assert_eq!(identify.properties["$group_key"], json!("team-0"));
    }
}

#[test]
fn test_referrer_becomes_initial_property() {
    let mut matrix = Matrix::new(config(3, 1), Friendly).unwrap();
    matrix.simulate().unwrap();
    let person = matrix.people().next().unwrap();

    assert_eq!(person.properties()["$referring_domain"], json!("www.google.com"));
    assert_eq!(person.properties()["$initial_referring_domain"], json!("www.google.com"));
    assert_eq!(person.properties()["$geoip_country_code"], json!(person.country_code()));
}

#[test]
fn test_snapshot_frozen_at_now() {
    let mut matrix = Matrix::new(config(11, 2), Weekly).unwrap();
    matrix.simulate().unwrap();

    for person in matrix.people() {
        let snapshot = person.snapshot().unwrap();
        assert!(snapshot.distinct_ids.contains(person.client().device_id()));
        assert!(snapshot.distinct_ids.is_subset(person.distinct_ids()));
    }
}

#[test]
fn test_every_session_is_closed() {
    let mut matrix = Matrix::new(config(8, 2), Weekly).unwrap();
    matrix.simulate().unwrap();

    for person in matrix.people() {
        let pageviews = person.all_events().filter(|e| e.event == "$pageview").count();
        let pageleaves = person.all_events().filter(|e| e.event == "$pageleave").count();
        assert_eq!(pageviews, pageleaves);
        assert!(person.client().active_session_id().is_none());
    }
}
