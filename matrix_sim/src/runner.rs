//! Scenario runner - configures a Matrix, runs a scenario, collects metrics.

use crate::error::RunError;
use crate::exporter::MatrixExport;
use crate::policies::hedgebox::{EVENT_SIGNED_UP, GROUP_TYPE_ACCOUNT};
use crate::policies::{HedgeboxBehavior, WeeklyPageviews};
use crate::scenarios::ScenarioId;

use chrono::{DateTime, Utc};
use matrix_core::{Behavior, Matrix, MatrixConfig, MatrixSummary};
use tracing::{debug, info};

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Engine totals
    pub summary: MatrixSummary,

    /// Metrics collected from the generated events
    pub metrics: ScenarioMetrics,
}

/// Metrics collected from a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScenarioMetrics {
    /// `$pageview` events, past and future
    pub pageviews: u64,

    /// `signed_up` events
    pub signups: u64,

    /// Persons who identified at least once
    pub identified_persons: u64,

    /// Persons with at least one event
    pub active_persons: u64,

    /// Groups of the `account` type
    pub accounts: u64,
}

impl ScenarioMetrics {
    fn collect<B: Behavior>(matrix: &Matrix<B>) -> Self {
        let mut metrics = ScenarioMetrics::default();
        for person in matrix.people() {
            let mut identified = false;
            let mut active = false;
            for event in person.all_events() {
                active = true;
                match event.event.as_str() {
                    "$pageview" => metrics.pageviews += 1,
                    "$identify" => identified = true,
                    EVENT_SIGNED_UP => metrics.signups += 1,
                    _ => {}
                }
            }
            metrics.identified_persons += identified as u64;
            metrics.active_persons += active as u64;
        }
        metrics.accounts = matrix
            .groups()
            .iter()
            .filter(|(group_type, _, _)| *group_type == GROUP_TYPE_ACCOUNT)
            .count() as u64;
        metrics
    }
}

/// Runs scenarios against a configured population and time window.
pub struct ScenarioRunner {
    config: MatrixConfig,
}

impl ScenarioRunner {
    /// Creates a new scenario runner with the default population and window.
    pub fn new(seed: u64) -> Self {
        Self {
            config: MatrixConfig {
                seed,
                ..Default::default()
            },
        }
    }

    /// Sets the number of clusters.
    pub fn with_clusters(mut self, count: usize) -> Self {
        self.config.cluster_count = count;
        self
    }

    /// Sets the per-cluster population bounds.
    pub fn with_population(mut self, min: usize, max: usize) -> Self {
        self.config.population_min = min;
        self.config.population_max = max;
        self
    }

    /// Sets the Chebyshev radius of the neighborhood.
    pub fn with_neighbor_radius(mut self, radius: u32) -> Self {
        self.config.neighbor_radius = radius;
        self
    }

    /// Sets the simulated time window.
    pub fn with_window(mut self, start: DateTime<Utc>, now: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.config.start = start;
        self.config.now = now;
        self.config.end = end;
        self
    }

    pub fn config(&self) -> &MatrixConfig {
        &self.config
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> Result<ScenarioResult, RunError> {
        let window = self.config.validate()?;
        let (result, ()) = match scenario {
            ScenarioId::Weekly => self.execute(scenario, WeeklyPageviews::default(), |_| ())?,
            ScenarioId::Hedgebox => self.execute(scenario, HedgeboxBehavior::new(window), |_| ())?,
        };
        Ok(result)
    }

    /// Runs a scenario and collects its full dataset for export.
    pub fn run_export(&self, scenario: ScenarioId) -> Result<(ScenarioResult, MatrixExport), RunError> {
        let window = self.config.validate()?;
        let name = scenario.name();
        match scenario {
            ScenarioId::Weekly => self.execute(scenario, WeeklyPageviews::default(), |matrix| {
                MatrixExport::from_matrix(name, matrix)
            }),
            ScenarioId::Hedgebox => self.execute(scenario, HedgeboxBehavior::new(window), |matrix| {
                MatrixExport::from_matrix(name, matrix)
            }),
        }
    }

    fn execute<B, T, F>(&self, scenario: ScenarioId, behavior: B, finish: F) -> Result<(ScenarioResult, T), RunError>
    where
        B: Behavior,
        F: FnOnce(&Matrix<B>) -> T,
    {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.config.seed);

        let mut matrix = Matrix::new(self.config.clone(), behavior)?;
        let summary = matrix.simulate()?;
        let metrics = ScenarioMetrics::collect(&matrix);
        debug!(?metrics, "Collected metrics");

        info!(
            "Finished scenario: {} | persons={} | past={} | future={} | groups={}",
            scenario.name(),
            summary.persons,
            summary.past_events,
            summary.future_events,
            summary.groups
        );

        let output = finish(&matrix);
        let result = ScenarioResult {
            scenario,
            seed: self.config.seed,
            summary,
            metrics,
        };
        Ok((result, output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matrix_core::SimError;

    fn small(seed: u64) -> ScenarioRunner {
        ScenarioRunner::new(seed).with_clusters(4).with_population(2, 5)
    }

    #[test]
    fn test_runner_is_deterministic() {
        let first = small(7).run(ScenarioId::Hedgebox).unwrap();
        let second = small(7).run(ScenarioId::Hedgebox).unwrap();
        assert_eq!(first.summary, second.summary);
        assert_eq!(first.metrics, second.metrics);
    }

    #[test]
    fn test_weekly_metrics() {
        let result = small(1).run(ScenarioId::Weekly).unwrap();
        assert_eq!(result.scenario, ScenarioId::Weekly);
        assert_eq!(result.metrics.signups, 0);
        assert_eq!(result.metrics.identified_persons, 0);
        assert_eq!(result.metrics.accounts, 0);
        assert_eq!(result.metrics.active_persons as usize, result.summary.persons);
        assert!(result.metrics.pageviews > 0);
    }

    #[test]
    fn test_invalid_configuration_is_rejected() {
        let err = ScenarioRunner::new(1)
            .with_population(5, 2)
            .run(ScenarioId::Weekly)
            .unwrap_err();
        assert!(matches!(
            err,
            RunError::Sim(SimError::InvalidPopulationBounds { min: 5, max: 2 })
        ));
    }

    #[test]
    fn test_export_matches_result() {
        let (result, export) = small(3).run_export(ScenarioId::Hedgebox).unwrap();
        assert_eq!(export.scenario, "hedgebox");
        assert_eq!(export.seed, 3);
        assert_eq!(export.summary, result.summary);
        assert_eq!(export.groups.len() as u64, result.metrics.accounts);
    }
}
