//! JSON export of a finished simulation.
//!
//! This is the hand-off format for whatever persists the dataset: every
//! person's event logs and now-snapshot, plus the shared group map.

use matrix_core::{Behavior, GroupStore, Matrix, MatrixSummary, Person, Properties, SimEvent, TimeWindow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::Write;

/// One person's share of the dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonExport {
    pub id: String,
    pub name: String,
    pub email: String,

    /// Index of the cluster the person lives in
    pub cluster: usize,
    pub kernel: bool,
    pub country_code: String,

    /// IANA timezone name
    pub timezone: String,

    /// Every distinct id the person ever used
    pub distinct_ids: BTreeSet<String>,

    /// Distinct ids as of `now`; absent if the person never reached `now`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distinct_ids_at_now: Option<BTreeSet<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties_at_now: Option<Properties>,

    pub past_events: Vec<SimEvent>,
    pub future_events: Vec<SimEvent>,
}

impl PersonExport {
    pub fn from_person(person: &Person) -> Self {
        Self {
            id: person.id().to_string(),
            name: person.name().to_string(),
            email: person.email().to_string(),
            cluster: person.cluster_index(),
            kernel: person.is_kernel(),
            country_code: person.country_code().to_string(),
            timezone: person.timezone().name.to_string(),
            distinct_ids: person.distinct_ids().clone(),
            distinct_ids_at_now: person.distinct_ids_at_now().cloned(),
            properties_at_now: person.properties_at_now().cloned(),
            past_events: person.past_events().to_vec(),
            future_events: person.future_events().to_vec(),
        }
    }
}

/// Complete simulation export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    pub window: TimeWindow,
    pub summary: MatrixSummary,
    pub persons: Vec<PersonExport>,

    /// Group type -> group key -> properties
    pub groups: GroupStore,
}

impl MatrixExport {
    /// Collects the dataset of a simulated matrix.
    pub fn from_matrix<B: Behavior>(scenario: &str, matrix: &Matrix<B>) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed: matrix.config().seed,
            window: matrix.window(),
            summary: matrix.summary(),
            persons: matrix.people().map(PersonExport::from_person).collect(),
            groups: matrix.groups().clone(),
        }
    }

    /// Total number of exported events.
    pub fn event_count(&self) -> usize {
        self.persons
            .iter()
            .map(|p| p.past_events.len() + p.future_events.len())
            .sum()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::WeeklyPageviews;
    use matrix_core::MatrixConfig;

    fn simulated() -> Matrix<WeeklyPageviews> {
        let config = MatrixConfig {
            cluster_count: 2,
            population_min: 2,
            population_max: 3,
            ..Default::default()
        };
        let mut matrix = Matrix::new(config, WeeklyPageviews::default()).unwrap();
        matrix.simulate().unwrap();
        matrix
    }

    #[test]
    fn test_export_covers_every_person() {
        let matrix = simulated();
        let export = MatrixExport::from_matrix("weekly", &matrix);

        assert_eq!(export.persons.len(), export.summary.persons);
        assert_eq!(
            export.event_count(),
            export.summary.past_events + export.summary.future_events
        );
        assert_eq!(export.persons.iter().filter(|p| p.kernel).count(), 2);
        for person in &export.persons {
            assert!(person.distinct_ids_at_now.is_some());
            assert!(person.future_events.iter().all(|e| export.window.is_future(e.timestamp)));
        }
    }

    #[test]
    fn test_json_round_trip() {
        let export = MatrixExport::from_matrix("weekly", &simulated());
        let json = export.to_json().unwrap();
        let parsed = MatrixExport::from_json(&json).unwrap();
        assert_eq!(parsed, export);
    }
}
