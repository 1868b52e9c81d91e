//! Behavior policies: the product-specific half of a simulated person.
//!
//! The engine owns time, sessions, capture and effects. A [`Behavior`]
//! decides when sessions happen and what a person does inside them.

use crate::cluster::ClusterProfile;
use crate::config::TimeWindow;
use crate::error::SimError;
use crate::groups::GroupStore;
use crate::person::Person;
use chrono::{DateTime, Utc};
use matrix_env::{ContentProvider, Properties, SimRandom};
use std::fmt::Debug;

/// Everything outside the person a policy may read or touch during a turn.
///
/// The group store is lent to exactly one running person at a time.
pub struct SimContext<'a> {
    /// Global time window
    pub window: TimeWindow,

    /// Profile of the cluster the person belongs to
    pub cluster: &'a ClusterProfile,

    /// Value generators for names, files and the like
    pub providers: &'a dyn ContentProvider,

    groups: &'a mut GroupStore,
}

impl<'a> SimContext<'a> {
    pub fn new(
        window: TimeWindow,
        cluster: &'a ClusterProfile,
        providers: &'a dyn ContentProvider,
        groups: &'a mut GroupStore,
    ) -> Self {
        Self {
            window,
            cluster,
            providers,
            groups,
        }
    }

    pub fn groups(&self) -> &GroupStore {
        self.groups
    }

    /// Non-destructive merge into the shared group store.
    pub fn update_group(&mut self, group_type: &str, group_key: &str, properties: &Properties) {
        self.groups.update(group_type, group_key, properties);
    }
}

/// A pluggable behavior policy.
///
/// Intents are policy-defined; a dispatch that meets an intent it does not
/// handle should return [`SimError::UnhandledIntent`].
pub trait Behavior {
    /// What a person sets out to do in a session.
    type Intent: Copy + Debug;

    /// Cluster-wide traits, drawn once per cluster from its own stream.
    fn cluster_traits(
        &self,
        _random: &mut SimRandom,
        _providers: &dyn ContentProvider,
    ) -> Result<Properties, SimError> {
        Ok(Properties::new())
    }

    /// Country of a new person.
    fn country_code(&self, random: &mut SimRandom, providers: &dyn ContentProvider) -> Result<String, SimError> {
        Ok(providers.country_code(random)?)
    }

    /// Assigns constant traits and declares bounded attributes.
    fn init_person(&self, _person: &mut Person, _cluster: &ClusterProfile) -> Result<(), SimError> {
        Ok(())
    }

    /// Start of the next session. Must be strictly after the person's current time.
    fn next_session_time(&self, person: &mut Person, ctx: &SimContext<'_>) -> Result<DateTime<Utc>, SimError>;

    /// Intent of the session about to start; `None` skips it.
    fn session_intent(&self, person: &mut Person, ctx: &SimContext<'_>) -> Result<Option<Self::Intent>, SimError>;

    /// Plays out one session inside an open client session.
    fn run_session(&self, intent: Self::Intent, person: &mut Person, ctx: &mut SimContext<'_>) -> Result<(), SimError>;
}
