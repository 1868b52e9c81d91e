//! Matrix - the top-level orchestrator.
//!
//! Builds every cluster up front, then runs persons strictly one at a time,
//! cluster by cluster, in index order. Effects a person addresses to others
//! are delivered right after its turn, so they only ever land on persons
//! that have not run yet.

use crate::behavior::{Behavior, SimContext};
use crate::cluster::Cluster;
use crate::config::{MatrixConfig, TimeWindow};
use crate::effect::{EffectTarget, OutgoingEffect};
use crate::error::SimError;
use crate::event::SimEvent;
use crate::groups::GroupStore;
use crate::person::Person;
use matrix_env::{BuiltinProvider, ContentProvider, PersonId, SimRandom};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Totals of a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixSummary {
    pub clusters: usize,
    pub persons: usize,
    pub past_events: usize,
    pub future_events: usize,
    pub groups: usize,
    pub effects_delivered: usize,
    pub effects_dropped: usize,
}

/// A simulated population driven by one behavior policy.
pub struct Matrix<B: Behavior> {
    config: MatrixConfig,
    window: TimeWindow,
    behavior: B,
    providers: Box<dyn ContentProvider>,
    clusters: Vec<Cluster>,
    groups: GroupStore,
    simulated: bool,
    effects_delivered: usize,
    effects_dropped: usize,
}

impl<B: Behavior> Matrix<B> {
    /// Validates `config` and builds all clusters with the built-in providers.
    pub fn new(config: MatrixConfig, behavior: B) -> Result<Self, SimError> {
        Self::with_provider(config, behavior, Box::new(BuiltinProvider::new()))
    }

    pub fn with_provider(
        config: MatrixConfig,
        behavior: B,
        providers: Box<dyn ContentProvider>,
    ) -> Result<Self, SimError> {
        let window = config.validate()?;
        let random = SimRandom::new(config.seed);

        let clusters = (0..config.cluster_count)
            .map(|index| Cluster::build(index, &config, window, &behavior, &random, &*providers))
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            seed = config.seed,
            clusters = clusters.len(),
            persons = clusters.iter().map(|c| c.people().len()).sum::<usize>(),
            "Matrix built"
        );

        Ok(Self {
            config,
            window,
            behavior,
            providers,
            clusters,
            groups: GroupStore::new(),
            simulated: false,
            effects_delivered: 0,
            effects_dropped: 0,
        })
    }

    /// Runs every person to completion. Fails fast on the first error.
    pub fn simulate(&mut self) -> Result<MatrixSummary, SimError> {
        if self.simulated {
            return Err(SimError::MatrixAlreadySimulated);
        }
        self.simulated = true;

        let Self {
            window,
            behavior,
            providers,
            clusters,
            groups,
            effects_delivered,
            effects_dropped,
            ..
        } = self;

        for c in 0..clusters.len() {
            for p in 0..clusters[c].people.len() {
                {
                    let cluster = &mut clusters[c];
                    let mut ctx = SimContext::new(*window, &cluster.profile, &**providers, groups);
                    cluster.people[p].run(&*behavior, &mut ctx)?;
                }

                for outgoing in clusters[c].people[p].take_outbox() {
                    let (delivered, dropped) = deliver(clusters, c, p, outgoing)?;
                    *effects_delivered += delivered;
                    *effects_dropped += dropped;
                }
            }
            debug!(cluster = c, "Cluster simulated");
        }

        let summary = self.summary();
        info!(
            persons = summary.persons,
            past_events = summary.past_events,
            future_events = summary.future_events,
            groups = summary.groups,
            effects_delivered = summary.effects_delivered,
            effects_dropped = summary.effects_dropped,
            "Matrix simulated"
        );
        Ok(summary)
    }

    pub fn summary(&self) -> MatrixSummary {
        MatrixSummary {
            clusters: self.clusters.len(),
            persons: self.people().count(),
            past_events: self.people().map(|p| p.past_events().len()).sum(),
            future_events: self.people().map(|p| p.future_events().len()).sum(),
            groups: self.groups.len(),
            effects_delivered: self.effects_delivered,
            effects_dropped: self.effects_dropped,
        }
    }

    pub fn config(&self) -> &MatrixConfig {
        &self.config
    }

    pub fn window(&self) -> TimeWindow {
        self.window
    }

    pub fn behavior(&self) -> &B {
        &self.behavior
    }

    pub fn is_simulated(&self) -> bool {
        self.simulated
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    /// All persons in execution order.
    pub fn people(&self) -> impl Iterator<Item = &Person> {
        self.clusters.iter().flat_map(|c| c.people().iter())
    }

    pub fn person(&self, id: PersonId) -> Option<&Person> {
        self.people().find(|p| p.id() == id)
    }

    pub fn groups(&self) -> &GroupStore {
        &self.groups
    }

    /// Every event of every person, per person in execution order.
    pub fn all_events(&self) -> impl Iterator<Item = &SimEvent> {
        self.people().flat_map(Person::all_events)
    }
}

/// Delivers one outgoing effect of person `source` in cluster `cluster`.
fn deliver(
    clusters: &mut [Cluster],
    cluster: usize,
    source: usize,
    outgoing: OutgoingEffect,
) -> Result<(usize, usize), SimError> {
    match outgoing.target {
        EffectTarget::Neighbors => Ok(clusters[cluster].deliver_to_neighbors(source, outgoing.at, &outgoing.effect)),
        EffectTarget::Person(id) => {
            for c in clusters.iter_mut() {
                if let Some(i) = c.position_of(id) {
                    let accepted = c.people[i].schedule_effect(outgoing.at, outgoing.effect);
                    return Ok(if accepted { (1, 0) } else { (0, 1) });
                }
            }
            Err(SimError::UnknownPerson(id))
        }
    }
}
