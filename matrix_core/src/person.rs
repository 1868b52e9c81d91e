//! Person - the unit of simulation.
//!
//! A person owns its identity, clock, browser client, property store, effect
//! queue and event logs, and runs its own simulation loop against a
//! [`Behavior`] policy. Persons never touch each other directly: effects for
//! other persons go to the outbox and are delivered by the Matrix.

use crate::behavior::{Behavior, SimContext};
use crate::bounded::Bounded;
use crate::client::{BrowserClient, CaptureContext};
use crate::config::TimeWindow;
use crate::effect::{Effect, EffectTarget, OutgoingEffect, ScheduledEffect};
use crate::error::SimError;
use crate::event::{initial_key, tracks_initial_value, SimEvent, EVENT_GROUP_IDENTIFY, EVENT_IDENTIFY, EVENT_PAGELEAVE, EVENT_PAGEVIEW};
use chrono::{DateTime, Duration, FixedOffset, Utc};
use matrix_env::{ContentProvider, PersonId, Properties, SimRandom, Timezone};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use tracing::debug;

/// Lifecycle of a person. Transitions only go forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PersonState {
    NotStarted,
    Running,
    Finished,
}

/// State frozen the first time the clock reaches `now`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NowSnapshot {
    pub distinct_ids: BTreeSet<String>,
    pub properties: Properties,
}

/// A simulated person.
pub struct Person {
    id: PersonId,
    name: String,
    email: String,
    country_code: String,
    timezone: Timezone,

    /// Cluster placement
    cluster_index: usize,
    x: i32,
    y: i32,

    random: SimRandom,
    client: BrowserClient,
    window: TimeWindow,
    state: PersonState,

    /// Current simulated instant, only written through `set_simulation_time`
    simulation_time: DateTime<Utc>,

    distinct_ids: BTreeSet<String>,
    properties: Properties,
    snapshot: Option<NowSnapshot>,

    /// Policy-declared bounded scalars
    attributes: BTreeMap<String, Bounded>,

    /// Free-form policy state
    memory: Properties,

    groups: BTreeMap<String, String>,
    feature_flags: Properties,
    all_time_pageview_counts: BTreeMap<String, u32>,
    session_pageview_counts: BTreeMap<String, u32>,

    past_events: Vec<SimEvent>,
    future_events: Vec<SimEvent>,

    /// FIFO of effects addressed to this person
    pending_effects: VecDeque<ScheduledEffect>,

    /// Effects this person addressed to others during its turn
    outbox: Vec<OutgoingEffect>,
}

impl Person {
    /// Creates a person with a generated profile, clock at the window start.
    pub fn new(
        id: PersonId,
        mut random: SimRandom,
        country_code: String,
        window: TimeWindow,
        providers: &dyn ContentProvider,
    ) -> Result<Self, SimError> {
        let name = providers.full_name(&mut random)?;
        let email = providers.email(&mut random, &name)?;
        let timezone = *random.choice(providers.timezones_for(&country_code)?)?;
        let device = providers.device_os_browser(&mut random)?;
        let client = BrowserClient::new(random.uuid(), device);

        let mut person = Self {
            id,
            name,
            email,
            country_code,
            timezone,
            cluster_index: 0,
            x: 0,
            y: 0,
            random,
            client,
            window,
            state: PersonState::NotStarted,
            simulation_time: window.start,
            distinct_ids: BTreeSet::new(),
            properties: Properties::new(),
            snapshot: None,
            attributes: BTreeMap::new(),
            memory: Properties::new(),
            groups: BTreeMap::new(),
            feature_flags: Properties::new(),
            all_time_pageview_counts: BTreeMap::new(),
            session_pageview_counts: BTreeMap::new(),
            past_events: Vec::new(),
            future_events: Vec::new(),
            pending_effects: VecDeque::new(),
            outbox: Vec::new(),
        };
        // The device id must be known before the latch can fire at `start == now`
        person.distinct_ids.insert(person.client.device_id().to_string());
        person.set_simulation_time(window.start);
        Ok(person)
    }

    pub(crate) fn place(&mut self, cluster_index: usize, x: i32, y: i32) {
        self.cluster_index = cluster_index;
        self.x = x;
        self.y = y;
    }

    // Identity and traits

    pub fn id(&self) -> PersonId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn country_code(&self) -> &str {
        &self.country_code
    }

    pub fn timezone(&self) -> Timezone {
        self.timezone
    }

    pub fn cluster_index(&self) -> usize {
        self.cluster_index
    }

    pub fn x(&self) -> i32 {
        self.x
    }

    pub fn y(&self) -> i32 {
        self.y
    }

    /// The kernel sits at the cluster origin.
    pub fn is_kernel(&self) -> bool {
        self.x == 0 && self.y == 0
    }

    pub fn random(&mut self) -> &mut SimRandom {
        &mut self.random
    }

    pub fn client(&self) -> &BrowserClient {
        &self.client
    }

    pub fn window(&self) -> TimeWindow {
        self.window
    }

    pub fn state(&self) -> PersonState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        self.state == PersonState::Finished
    }

    // Time

    pub fn simulation_time(&self) -> DateTime<Utc> {
        self.simulation_time
    }

    /// Current simulated instant in the person's own offset.
    pub fn local_time(&self) -> DateTime<FixedOffset> {
        self.simulation_time.with_timezone(&self.timezone.offset())
    }

    /// Moves the clock, freezing the now-snapshot on the first crossing of `now`.
    pub fn set_simulation_time(&mut self, t: DateTime<Utc>) {
        self.simulation_time = t;
        if self.snapshot.is_none() && t >= self.window.now {
            self.snapshot = Some(NowSnapshot {
                distinct_ids: self.distinct_ids.clone(),
                properties: self.properties.clone(),
            });
        }
    }

    /// Advances the clock by `seconds`. Negative values and overflowing ones are ignored.
    pub fn advance_timer(&mut self, seconds: f64) {
        if seconds <= 0.0 || !seconds.is_finite() {
            return;
        }
        let micros = (seconds * 1_000_000.0).round();
        if micros >= i64::MAX as f64 {
            return;
        }
        // Past the representable range the clock stays put
        if let Some(t) = self
            .simulation_time
            .checked_add_signed(Duration::microseconds(micros as i64))
        {
            self.set_simulation_time(t);
        }
    }

    // State

    pub fn distinct_ids(&self) -> &BTreeSet<String> {
        &self.distinct_ids
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn distinct_ids_at_now(&self) -> Option<&BTreeSet<String>> {
        self.snapshot.as_ref().map(|s| &s.distinct_ids)
    }

    pub fn properties_at_now(&self) -> Option<&Properties> {
        self.snapshot.as_ref().map(|s| &s.properties)
    }

    pub fn snapshot(&self) -> Option<&NowSnapshot> {
        self.snapshot.as_ref()
    }

    /// Declares (or replaces) a bounded attribute.
    pub fn declare_attribute(&mut self, name: impl Into<String>, value: Bounded) {
        self.attributes.insert(name.into(), value);
    }

    pub fn attribute(&self, name: &str) -> Option<f64> {
        self.attributes.get(name).map(Bounded::get)
    }

    pub(crate) fn attribute_mut(&mut self, name: &str) -> Option<&mut Bounded> {
        self.attributes.get_mut(name)
    }

    pub fn set_attribute(&mut self, name: &str, value: f64) -> Result<(), SimError> {
        Effect::set(name, value).apply(self)
    }

    pub fn move_attribute(&mut self, name: &str, delta: f64) -> Result<(), SimError> {
        Effect::shift(name, delta).apply(self)
    }

    pub fn remember(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.memory.insert(key.into(), value.into());
    }

    pub fn memory(&self, key: &str) -> Option<&Value> {
        self.memory.get(key)
    }

    pub fn memory_str(&self, key: &str) -> Option<&str> {
        self.memory.get(key).and_then(Value::as_str)
    }

    pub fn forget(&mut self, key: &str) -> Option<Value> {
        self.memory.remove(key)
    }

    pub fn groups(&self) -> &BTreeMap<String, String> {
        &self.groups
    }

    /// Drops the association with a group type; later events no longer carry it.
    pub fn leave_group(&mut self, group_type: &str) -> Option<String> {
        self.groups.remove(group_type)
    }

    /// Decorates subsequent events with `$feature/<key>`.
    pub fn set_feature_flag(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.feature_flags.insert(key.into(), value.into());
    }

    pub fn clear_feature_flag(&mut self, key: &str) {
        self.feature_flags.remove(key);
    }

    pub fn feature_flags(&self) -> &Properties {
        &self.feature_flags
    }

    pub fn all_time_pageview_count(&self, url: &str) -> u32 {
        self.all_time_pageview_counts.get(url).copied().unwrap_or(0)
    }

    pub fn session_pageview_count(&self, url: &str) -> u32 {
        self.session_pageview_counts.get(url).copied().unwrap_or(0)
    }

    // Events

    pub fn past_events(&self) -> &[SimEvent] {
        &self.past_events
    }

    pub fn future_events(&self) -> &[SimEvent] {
        &self.future_events
    }

    pub fn all_events(&self) -> impl Iterator<Item = &SimEvent> {
        self.past_events.iter().chain(self.future_events.iter())
    }

    pub fn first_event(&self) -> Option<&SimEvent> {
        self.past_events.first().or_else(|| self.future_events.first())
    }

    pub fn last_event(&self) -> Option<&SimEvent> {
        self.future_events.last().or_else(|| self.past_events.last())
    }

    /// Captures an event through the browser client.
    pub fn capture(&mut self, event: &str, properties: Option<Properties>) {
        let context = CaptureContext {
            time: self.simulation_time.with_timezone(&self.timezone.offset()),
            groups: &self.groups,
            country_code: &self.country_code,
            feature_flags: &self.feature_flags,
        };
        let combined = self.client.compose(&context, properties);
        let distinct_id = self.client.active_distinct_id().to_string();
        self.record_event(event, distinct_id, combined);
    }

    /// Captures a `$pageview`, leaving the previous page first.
    pub fn capture_pageview(&mut self, url: &str, properties: Option<Properties>, referrer: Option<&str>) {
        if self.client.current_url().is_some() {
            self.capture(EVENT_PAGELEAVE, None);
        }
        let load_time = self.random.uniform(0.02, 0.1);
        self.advance_timer(load_time);
        self.client.set_current_url(Some(url.to_string()));
        let mut properties = properties.unwrap_or_default();
        if let Some(referrer) = referrer {
            properties.insert("$referrer".to_string(), json!(referrer));
        }
        self.capture(EVENT_PAGEVIEW, Some(properties));
    }

    /// Identifies the person; `None` only sets properties.
    pub fn identify(&mut self, distinct_id: Option<&str>, set_properties: Properties) {
        let properties = self.client.identify(distinct_id, set_properties);
        self.capture(EVENT_IDENTIFY, Some(properties));
    }

    /// Logs the client out.
    pub fn reset(&mut self) {
        self.client.reset();
    }

    pub fn register(&mut self, super_properties: Properties) {
        self.client.register(super_properties);
    }

    pub fn unregister(&mut self, keys: &[&str]) -> Result<(), SimError> {
        self.client.unregister(keys)
    }

    /// Associates the person with a group and updates the shared group store.
    pub fn group(
        &mut self,
        ctx: &mut SimContext<'_>,
        group_type: &str,
        group_key: &str,
        set_properties: Option<Properties>,
    ) {
        let set_properties = set_properties.unwrap_or_default();
        self.groups.insert(group_type.to_string(), group_key.to_string());
        ctx.update_group(group_type, group_key, &set_properties);

        let mut properties = Properties::new();
        properties.insert("$group_type".to_string(), json!(group_type));
        properties.insert("$group_key".to_string(), json!(group_key));
        properties.insert("$group_set".to_string(), Value::Object(set_properties));
        self.capture(EVENT_GROUP_IDENTIFY, Some(properties));
    }

    /// Appends an event at the current instant and applies its `$set`/`$set_once`.
    pub fn record_event(&mut self, event: &str, distinct_id: String, properties: Properties) {
        self.distinct_ids.insert(distinct_id.clone());

        if event == EVENT_PAGEVIEW {
            if let Some(url) = properties.get("$current_url").and_then(Value::as_str) {
                *self.all_time_pageview_counts.entry(url.to_string()).or_insert(0) += 1;
                *self.session_pageview_counts.entry(url.to_string()).or_insert(0) += 1;
            }
        }

        let set = match properties.get("$set") {
            Some(Value::Object(set)) => Some(set),
            _ => None,
        };
        let mut set_once = match properties.get("$set_once") {
            Some(Value::Object(set_once)) => set_once.clone(),
            _ => Properties::new(),
        };
        for (key, value) in set.into_iter().flatten() {
            if tracks_initial_value(key) {
                set_once.entry(initial_key(key)).or_insert_with(|| value.clone());
            }
        }
        for (key, value) in set_once {
            self.properties.entry(key).or_insert(value);
        }
        if let Some(set) = set {
            self.properties.extend(set.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        let sim_event = SimEvent {
            event: event.to_string(),
            distinct_id,
            properties,
            timestamp: self.simulation_time,
        };
        if self.window.is_future(sim_event.timestamp) {
            self.future_events.push(sim_event);
        } else {
            self.past_events.push(sim_event);
        }
    }

    // Effects

    /// Queues an effect. Finished persons ignore it and report `false`.
    pub fn schedule_effect(&mut self, at: DateTime<Utc>, effect: Effect) -> bool {
        if self.is_finished() {
            debug!(person = %self.id, ?effect, "Dropping effect for finished person");
            return false;
        }
        self.pending_effects.push_back(ScheduledEffect { at, effect });
        true
    }

    pub fn pending_effect_count(&self) -> usize {
        self.pending_effects.len()
    }

    /// Addresses an effect to every amenable neighbor, as of now.
    pub fn affect_neighbors(&mut self, effect: Effect) {
        self.outbox.push(OutgoingEffect {
            target: EffectTarget::Neighbors,
            at: self.simulation_time,
            effect,
        });
    }

    /// Addresses an effect to a single person, as of now.
    ///
    /// An effect addressed to oneself is queued right away.
    pub fn affect_person(&mut self, target: PersonId, effect: Effect) {
        if target == self.id {
            self.pending_effects.push_back(ScheduledEffect {
                at: self.simulation_time,
                effect,
            });
            return;
        }
        self.outbox.push(OutgoingEffect {
            target: EffectTarget::Person(target),
            at: self.simulation_time,
            effect,
        });
    }

    pub(crate) fn take_outbox(&mut self) -> Vec<OutgoingEffect> {
        std::mem::take(&mut self.outbox)
    }

    /// Applies queued effects due by `target` in FIFO order, then moves the clock to `target`.
    ///
    /// Draining stops at the first effect due after `target`, even if later
    /// entries are due earlier.
    pub fn fast_forward(&mut self, target: DateTime<Utc>) -> Result<(), SimError> {
        while self.pending_effects.front().map_or(false, |head| head.at <= target) {
            let Some(scheduled) = self.pending_effects.pop_front() else {
                break;
            };
            if self.simulation_time < scheduled.at {
                self.set_simulation_time(scheduled.at);
            }
            scheduled.effect.apply(self)?;
        }
        if self.simulation_time < target {
            self.set_simulation_time(target);
        }
        Ok(())
    }

    // Simulation loop

    /// Simulates the person over the whole window.
    pub fn run<B: Behavior>(&mut self, behavior: &B, ctx: &mut SimContext<'_>) -> Result<(), SimError> {
        match self.state {
            PersonState::Running => return Err(SimError::AlreadyRunning(self.to_string())),
            PersonState::Finished => return Err(SimError::AlreadyFinished(self.to_string())),
            PersonState::NotStarted => {}
        }
        self.state = PersonState::Running;

        let mut sessions = 0u32;
        while self.simulation_time <= ctx.window.end {
            let next = behavior.next_session_time(self, ctx)?;
            if next <= self.simulation_time {
                return Err(SimError::StalledClock {
                    person: self.to_string(),
                    next,
                    current: self.simulation_time,
                });
            }
            self.fast_forward(next)?;

            let Some(intent) = behavior.session_intent(self, ctx)? else {
                continue;
            };
            self.session_pageview_counts.clear();
            self.open_session();
            behavior.run_session(intent, self, ctx)?;
            self.close_session();
            sessions += 1;
        }

        self.state = PersonState::Finished;
        debug!(
            person = %self.id,
            sessions,
            past = self.past_events.len(),
            future = self.future_events.len(),
            "Person finished"
        );
        Ok(())
    }

    fn open_session(&mut self) {
        let session_id = self.random.uuidt(self.simulation_time.timestamp_millis());
        self.client.start_session(session_id.to_string());
    }

    fn close_session(&mut self) {
        if self.client.current_url().is_some() {
            self.capture(EVENT_PAGELEAVE, None);
        }
        self.client.end_session();
    }
}

impl fmt::Display for Person {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

impl fmt::Debug for Person {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Person")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("cluster_index", &self.cluster_index)
            .field("x", &self.x)
            .field("y", &self.y)
            .field("state", &self.state)
            .field("simulation_time", &self.simulation_time)
            .finish_non_exhaustive()
    }
}
