//! End-to-end runs of the Hedgebox scenario.

use matrix_core::{Matrix, MatrixConfig};
use matrix_sim::exporter::MatrixExport;
use matrix_sim::policies::hedgebox::{
    HedgeboxPlan, EVENT_SIGNED_UP, EVENT_UPLOADED_FILE, GROUP_TYPE_ACCOUNT, PROPERTY_NEW_SIGNUP_PAGE_FLAG,
};
use matrix_sim::policies::HedgeboxBehavior;
use matrix_sim::{ScenarioId, ScenarioRunner};
use proptest::prelude::*;
use serde_json::Value;

fn simulate(seed: u64) -> Matrix<HedgeboxBehavior> {
    let config = MatrixConfig {
        seed,
        ..Default::default()
    };
    let behavior = HedgeboxBehavior::new(config.validate().unwrap());
    let mut matrix = Matrix::new(config, behavior).unwrap();
    matrix.simulate().unwrap();
    matrix
}

#[test]
fn test_default_population_produces_a_funnel() {
    let result = ScenarioRunner::new(42).run(ScenarioId::Hedgebox).unwrap();

    assert!(result.summary.persons >= 10);
    assert!(result.metrics.pageviews > 0);
    assert!(result.metrics.signups > 0);
    assert!(result.metrics.identified_persons >= result.metrics.accounts);
    assert!(result.metrics.signups >= result.metrics.accounts);
}

#[test]
fn test_same_seed_same_dataset() {
    let first = MatrixExport::from_matrix("hedgebox", &simulate(2024));
    let second = MatrixExport::from_matrix("hedgebox", &simulate(2024));
    assert_eq!(first, second);
}

#[test]
fn test_signed_up_persons_are_identified_afterwards() {
    let matrix = simulate(42);
    for person in matrix.people() {
        let Some(signup) = person.all_events().position(|e| e.event == EVENT_SIGNED_UP) else {
            continue;
        };
        let events: Vec<_> = person.all_events().collect();
        let identify = events[signup..]
            .iter()
            .find(|e| e.event == "$identify")
            .expect("signup is followed by identify");
        assert!(identify.properties.contains_key("$user_id"));
        assert!(person.distinct_ids().len() >= 2);
    }
}

#[test]
fn test_uploads_belong_to_accounts() {
    let matrix = simulate(42);
    // Uploaders may have been removed from their team since, so go by the event
    for event in matrix.all_events().filter(|e| e.event == EVENT_UPLOADED_FILE) {
        let account = event.properties["$groups"][GROUP_TYPE_ACCOUNT]
            .as_str()
            .expect("upload is tied to an account");
        let props = matrix.groups().get(GROUP_TYPE_ACCOUNT, account).unwrap();
        let plan = props["plan"].as_str().and_then(HedgeboxPlan::parse).unwrap();
        let used_mb = props["used_mb"].as_f64().unwrap();
        assert!(used_mb <= plan.allowed_mb() as f64);
    }
}

#[test]
fn test_experiment_variants() {
    let matrix = simulate(42);
    for event in matrix.all_events() {
        if let Some(variant) = event.properties.get(PROPERTY_NEW_SIGNUP_PAGE_FLAG) {
            assert!(matches!(variant, Value::String(v) if v == "test" || v == "control"));
        }
    }
}

#[test]
fn test_export_round_trip_through_file() {
    let (_, export) = ScenarioRunner::new(9)
        .with_clusters(3)
        .run_export(ScenarioId::Hedgebox)
        .unwrap();

    let path = std::env::temp_dir().join(format!("matrix-sim-export-{}.json", std::process::id()));
    let path = path.to_str().unwrap();
    export.write_to_file(path).unwrap();
    let json = std::fs::read_to_string(path).unwrap();
    std::fs::remove_file(path).unwrap();

    assert_eq!(MatrixExport::from_json(&json).unwrap(), export);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn prop_events_partition_around_now(seed in 0u64..1_000) {
        let matrix = simulate(seed);
        let window = matrix.window();
        for person in matrix.people() {
            prop_assert!(person.past_events().iter().all(|e| e.timestamp <= window.now));
            prop_assert!(person.future_events().iter().all(|e| e.timestamp > window.now));
            // Once the clock passes `end` no further session opens
            let late_sessions: std::collections::BTreeSet<_> = person
                .all_events()
                .filter(|e| e.timestamp > window.end)
                .filter_map(|e| e.property_str("$session_id"))
                .collect();
            prop_assert!(late_sessions.len() <= 1);
        }
    }
}
