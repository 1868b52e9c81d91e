//! Cluster - a small 2-D neighborhood of persons.
//!
//! Persons are placed on integer coordinates in Chebyshev rings around the
//! kernel at `(0, 0)`. Two persons are neighbors when their Chebyshev
//! distance is within the configured radius.

use crate::behavior::Behavior;
use crate::config::{MatrixConfig, TimeWindow};
use crate::effect::Effect;
use crate::error::SimError;
use crate::person::Person;
use chrono::{DateTime, Utc};
use matrix_env::{ContentProvider, PersonId, Properties, SimRandom};
use serde::Serialize;
use tracing::debug;

/// Cluster-level facts visible to policies.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClusterProfile {
    /// Position in the Matrix's cluster order
    pub index: usize,

    /// Number of persons
    pub population: usize,

    /// Outermost ring in use
    pub radius: u32,

    /// Policy-defined cluster traits
    pub traits: Properties,
}

impl ClusterProfile {
    pub fn trait_str(&self, key: &str) -> Option<&str> {
        self.traits.get(key).and_then(serde_json::Value::as_str)
    }
}

/// A cluster of persons with precomputed adjacency.
pub struct Cluster {
    pub(crate) profile: ClusterProfile,
    pub(crate) people: Vec<Person>,
    adjacency: Vec<Vec<usize>>,
}

impl Cluster {
    /// Builds cluster `index`, drawing everything from its own forked stream.
    pub fn build<B: Behavior>(
        index: usize,
        config: &MatrixConfig,
        window: TimeWindow,
        behavior: &B,
        matrix_random: &SimRandom,
        providers: &dyn ContentProvider,
    ) -> Result<Self, SimError> {
        let mut random = matrix_random.fork(index as u64 + 1);
        let population = random.int_range(config.population_min as i64, config.population_max as i64) as usize;
        let traits = behavior.cluster_traits(&mut random, providers)?;

        let coordinates = ring_coordinates(population);
        let radius = coordinates.last().map_or(0, |&(x, y)| chebyshev((0, 0), (x, y)));
        let profile = ClusterProfile {
            index,
            population,
            radius,
            traits,
        };

        let mut people = Vec::with_capacity(population);
        for (i, &(x, y)) in coordinates.iter().enumerate() {
            let mut person_random = random.fork(i as u64 + 1);
            let id = PersonId::from_uuid(person_random.uuid());
            let country_code = behavior.country_code(&mut person_random, providers)?;
            let mut person = Person::new(id, person_random, country_code, window, providers)?;
            person.place(index, x, y);
            behavior.init_person(&mut person, &profile)?;
            people.push(person);
        }

        let adjacency = build_adjacency(&coordinates, config.neighbor_radius);
        debug!(cluster = index, population, radius, "Cluster built");

        Ok(Self {
            profile,
            people,
            adjacency,
        })
    }

    pub fn profile(&self) -> &ClusterProfile {
        &self.profile
    }

    pub fn people(&self) -> &[Person] {
        &self.people
    }

    pub fn kernel(&self) -> Option<&Person> {
        self.people.first()
    }

    pub fn position_of(&self, id: PersonId) -> Option<usize> {
        self.people.iter().position(|p| p.id() == id)
    }

    /// Neighbor indices of person `index`, finished or not.
    pub fn neighbors(&self, index: usize) -> &[usize] {
        self.adjacency.get(index).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Neighbors of person `index` that have not finished yet.
    pub fn amenable_neighbors(&self, index: usize) -> Vec<usize> {
        self.neighbors(index)
            .iter()
            .copied()
            .filter(|&n| !self.people[n].is_finished())
            .collect()
    }

    /// Schedules `effect` on every amenable neighbor of `source`.
    ///
    /// Returns `(delivered, dropped)`; finished neighbors count as dropped.
    pub fn deliver_to_neighbors(&mut self, source: usize, at: DateTime<Utc>, effect: &Effect) -> (usize, usize) {
        let mut delivered = 0;
        let mut dropped = 0;
        for n in self.neighbors(source).to_vec() {
            if self.people[n].schedule_effect(at, effect.clone()) {
                delivered += 1;
            } else {
                dropped += 1;
            }
        }
        (delivered, dropped)
    }
}

/// Chebyshev distance between two grid cells.
pub fn chebyshev(a: (i32, i32), b: (i32, i32)) -> u32 {
    (a.0 - b.0).unsigned_abs().max((a.1 - b.1).unsigned_abs())
}

/// First `n` cells: the origin, then rings `1, 2, ...` in row-major order.
pub fn ring_coordinates(n: usize) -> Vec<(i32, i32)> {
    let mut cells = Vec::with_capacity(n);
    if n == 0 {
        return cells;
    }
    cells.push((0, 0));
    let mut ring = 1i32;
    while cells.len() < n {
        for y in -ring..=ring {
            for x in -ring..=ring {
                if x.abs().max(y.abs()) != ring {
                    continue;
                }
                if cells.len() == n {
                    return cells;
                }
                cells.push((x, y));
            }
        }
        ring += 1;
    }
    cells
}

fn build_adjacency(coordinates: &[(i32, i32)], neighbor_radius: u32) -> Vec<Vec<usize>> {
    coordinates
        .iter()
        .enumerate()
        .map(|(i, &a)| {
            coordinates
                .iter()
                .enumerate()
                .filter(|&(j, &b)| j != i && (1..=neighbor_radius).contains(&chebyshev(a, b)))
                .map(|(j, _)| j)
                .collect()
        })
        .collect()
}
