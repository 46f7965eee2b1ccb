//! Deterministic world simulator
//!
//! Participants wander inside a cube and stream each other and a set of
//! entities in and out. Every run with the same seed produces the same
//! sequence of snapshots.

use std::collections::BTreeMap;

use earshot_core::{EntityId, ParticipantId, Position3D};
use earshot_membership::{ParticipantRecord, ParticipantSnapshot};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// World generation parameters
#[derive(Clone, Debug)]
pub struct WorldConfig {
    /// Participants connected at start
    pub participants: u16,
    /// Vehicles and objects placed at start
    pub entities: u16,
    /// Half-width of the world cube
    pub extent: f32,
    /// Largest per-axis move in one step
    pub step: f32,
    /// Probability a participant can receive proximity audio
    pub capable_prob: f64,
    /// Probability a participant has a given referent streamed in
    pub visible_prob: f64,
    /// Probability a participant disconnects during a step
    pub churn_prob: f64,
    /// Random seed
    pub seed: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        WorldConfig {
            participants: 64,
            entities: 16,
            extent: 50.0,
            step: 2.0,
            capable_prob: 0.9,
            visible_prob: 0.8,
            churn_prob: 0.01,
            seed: 42,
        }
    }
}

impl WorldConfig {
    /// Small world for quick tests
    pub fn light() -> Self {
        WorldConfig {
            participants: 12,
            entities: 4,
            extent: 20.0,
            ..Default::default()
        }
    }

    /// Crowded world for benches and soak runs
    pub fn crowded() -> Self {
        WorldConfig {
            participants: 1000,
            entities: 200,
            extent: 200.0,
            step: 4.0,
            churn_prob: 0.002,
            ..Default::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Mutable simulated world
pub struct SimWorld {
    config: WorldConfig,
    rng: StdRng,
    participants: BTreeMap<ParticipantId, ParticipantRecord>,
    entities: BTreeMap<EntityId, Position3D>,
    next_participant: u16,
    steps: u64,
}

impl SimWorld {
    pub fn new(config: WorldConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        let mut world = SimWorld {
            config,
            rng,
            participants: BTreeMap::new(),
            entities: BTreeMap::new(),
            next_participant: 0,
            steps: 0,
        };

        for slot in 0..world.config.entities {
            let id = if slot % 2 == 0 {
                EntityId::vehicle(slot)
            } else {
                EntityId::object(slot)
            };
            let position = world.random_position();
            world.entities.insert(id, position);
        }
        for _ in 0..world.config.participants {
            world.connect();
        }
        world.refresh_visibility();
        world
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    fn random_position(&mut self) -> Position3D {
        let extent = self.config.extent;
        Position3D::new(
            self.rng.gen_range(-extent..=extent),
            self.rng.gen_range(-extent..=extent),
            self.rng.gen_range(-extent..=extent),
        )
    }

    /// Connect a new participant at a random position
    pub fn connect(&mut self) -> ParticipantId {
        let id = ParticipantId::new(self.next_participant);
        self.next_participant = self.next_participant.wrapping_add(1);
        let position = self.random_position();
        let capable = self.rng.gen_bool(self.config.capable_prob);
        self.participants
            .insert(id, ParticipantRecord::new(position, capable));
        id
    }

    /// Remove a participant. Returns false if it was not connected.
    pub fn disconnect(&mut self, id: ParticipantId) -> bool {
        let removed = self.participants.remove(&id).is_some();
        if removed {
            for record in self.participants.values_mut() {
                record.streamed_participants.remove(&id);
            }
        }
        removed
    }

    /// Place a participant explicitly
    pub fn place(&mut self, id: ParticipantId, position: Position3D) {
        if let Some(record) = self.participants.get_mut(&id) {
            record.position = position;
        }
    }

    /// Connected participant ids, ascending
    pub fn participant_ids(&self) -> Vec<ParticipantId> {
        self.participants.keys().copied().collect()
    }

    /// Entity ids, ascending by kind then slot
    pub fn entity_ids(&self) -> Vec<EntityId> {
        self.entities.keys().copied().collect()
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    /// Advance one step: move everyone, churn, re-roll visibility
    pub fn step(&mut self) {
        self.steps += 1;
        let step = self.config.step;
        let extent = self.config.extent;

        let ids = self.participant_ids();
        for id in ids {
            let dx = self.rng.gen_range(-step..=step);
            let dy = self.rng.gen_range(-step..=step);
            let dz = self.rng.gen_range(-step..=step);
            if let Some(record) = self.participants.get_mut(&id) {
                let p = record.position;
                record.position = Position3D::new(
                    (p.x + dx).clamp(-extent, extent),
                    (p.y + dy).clamp(-extent, extent),
                    (p.z + dz).clamp(-extent, extent),
                );
            }
        }

        let entity_ids = self.entity_ids();
        for id in entity_ids {
            let dx = self.rng.gen_range(-step..=step);
            let dy = self.rng.gen_range(-step..=step);
            if let Some(position) = self.entities.get_mut(&id) {
                *position = Position3D::new(
                    (position.x + dx).clamp(-extent, extent),
                    (position.y + dy).clamp(-extent, extent),
                    position.z,
                );
            }
        }

        if self.config.churn_prob > 0.0 {
            let ids = self.participant_ids();
            for id in ids {
                if self.rng.gen_bool(self.config.churn_prob) {
                    self.disconnect(id);
                    self.connect();
                }
            }
        }

        self.refresh_visibility();
    }

    fn refresh_visibility(&mut self) {
        let participant_ids = self.participant_ids();
        let entity_ids = self.entity_ids();
        let prob = self.config.visible_prob;

        for viewer in &participant_ids {
            let seen_participants: Vec<_> = participant_ids
                .iter()
                .copied()
                .filter(|other| other != viewer && self.rng.gen_bool(prob))
                .collect();
            let seen_entities: Vec<_> = entity_ids
                .iter()
                .copied()
                .filter(|_| self.rng.gen_bool(prob))
                .collect();

            if let Some(record) = self.participants.get_mut(viewer) {
                record.streamed_participants = seen_participants.into_iter().collect();
                record.streamed_entities = seen_entities.into_iter().collect();
            }
        }
    }

    /// Immutable copy of the current world
    pub fn snapshot(&self) -> ParticipantSnapshot {
        let mut snapshot = ParticipantSnapshot::new();
        for (id, record) in &self.participants {
            snapshot.insert_participant(*id, record.clone());
        }
        for (id, position) in &self.entities {
            snapshot.insert_entity(*id, *position);
        }
        snapshot
    }
}
