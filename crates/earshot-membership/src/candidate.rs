//! Candidate enumeration - who could listen right now
//!
//! The game server owns participants; the engine only reads them. Every
//! reconciliation cycle reads one `CandidateSource`, which should be a coherent
//! view of the world for that tick. `ParticipantSnapshot` is the standard one:
//! an immutable copy of positions, capability flags and streaming state.

use std::collections::{BTreeMap, HashMap, HashSet};

use earshot_core::{Anchor, EntityId, ParticipantId, Position3D};

/// One participant as seen from a stream's anchor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub participant: ParticipantId,
    pub position: Position3D,
    /// Companion client component is active
    pub capable: bool,
    /// Anchor referent is streamed in for this participant
    pub visible: bool,
}

/// Read-only world view consumed by the membership engine
pub trait CandidateSource: Send + Sync {
    /// Current position of an anchor, or `None` if its referent is gone
    fn resolve(&self, anchor: &Anchor) -> Option<Position3D>;

    /// Connected participants considered for a stream anchored at `origin`
    fn enumerate(&self, anchor: &Anchor, origin: Position3D) -> Vec<Candidate>;
}

/// Participant row in a snapshot
#[derive(Debug, Clone, Default)]
pub struct ParticipantRecord {
    pub position: Position3D,
    pub capable: bool,
    /// Participants currently streamed in for this one
    pub streamed_participants: HashSet<ParticipantId>,
    /// Vehicles and objects currently streamed in for this one
    pub streamed_entities: HashSet<EntityId>,
}

impl ParticipantRecord {
    pub fn new(position: Position3D, capable: bool) -> Self {
        Self {
            position,
            capable,
            ..Default::default()
        }
    }

    /// Whether this participant can see the given anchor
    pub fn sees(&self, anchor: &Anchor) -> bool {
        match anchor {
            Anchor::Fixed(_) => true,
            Anchor::Participant(id) => self.streamed_participants.contains(id),
            Anchor::Entity(entity) => self.streamed_entities.contains(entity),
        }
    }
}

/// Immutable per-tick copy of the world
#[derive(Debug, Clone, Default)]
pub struct ParticipantSnapshot {
    participants: BTreeMap<ParticipantId, ParticipantRecord>,
    entities: HashMap<EntityId, Position3D>,
}

impl ParticipantSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a participant
    pub fn insert_participant(&mut self, id: ParticipantId, record: ParticipantRecord) {
        self.participants.insert(id, record);
    }

    /// Builder form of `insert_participant`
    pub fn with_participant(mut self, id: ParticipantId, record: ParticipantRecord) -> Self {
        self.insert_participant(id, record);
        self
    }

    /// Add or move a vehicle/object
    pub fn insert_entity(&mut self, id: EntityId, position: Position3D) {
        self.entities.insert(id, position);
    }

    pub fn with_entity(mut self, id: EntityId, position: Position3D) -> Self {
        self.insert_entity(id, position);
        self
    }

    pub fn participant(&self, id: ParticipantId) -> Option<&ParticipantRecord> {
        self.participants.get(&id)
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    pub fn participant_ids(&self) -> impl Iterator<Item = ParticipantId> + '_ {
        self.participants.keys().copied()
    }
}

impl CandidateSource for ParticipantSnapshot {
    fn resolve(&self, anchor: &Anchor) -> Option<Position3D> {
        match anchor {
            Anchor::Fixed(position) => Some(*position),
            Anchor::Participant(id) => self.participants.get(id).map(|p| p.position),
            Anchor::Entity(entity) => self.entities.get(entity).copied(),
        }
    }

    fn enumerate(&self, anchor: &Anchor, _origin: Position3D) -> Vec<Candidate> {
        self.participants
            .iter()
            .map(|(id, record)| Candidate {
                participant: *id,
                position: record.position,
                capable: record.capable,
                visible: record.sees(anchor),
            })
            .collect()
    }
}
