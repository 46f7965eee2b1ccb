//! Membership policies - who is seated on a stream
//!
//! Static membership is decided once, at construction. Dynamic membership is
//! re-planned every reconciliation cycle:
//!
//! 1. listeners that no longer qualify are removed, whether or not anyone
//!    replaces them
//! 2. qualifying non-listeners are ranked by (distance, identity)
//! 3. the nearest are admitted until the ceiling is reached
//!
//! A seated listener that still qualifies is never displaced, however close a
//! newcomer is. Candidates left out are not remembered; the next cycle ranks
//! from scratch.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use earshot_core::{Anchor, Capacity, ParticipantId, Position3D};

use crate::{Candidate, LocalRelevance};

/// Membership policy of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipPolicy {
    /// Decided at construction, never re-evaluated
    Static { capacity: Capacity },
    /// Re-evaluated every cycle, never above `capacity` listeners
    Dynamic { capacity: usize },
}

impl MembershipPolicy {
    pub fn capacity(&self) -> Capacity {
        match self {
            MembershipPolicy::Static { capacity } => *capacity,
            MembershipPolicy::Dynamic { capacity } => Capacity::Limited(*capacity),
        }
    }

    #[inline]
    pub fn is_dynamic(&self) -> bool {
        matches!(self, MembershipPolicy::Dynamic { .. })
    }
}

/// Candidate that qualified for a stream, with its distance to the anchor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedCandidate {
    pub participant: ParticipantId,
    pub distance: f32,
}

impl RankedCandidate {
    /// Nearest first, lower identity first on equal distance
    pub fn rank_order(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.participant.cmp(&other.participant))
    }
}

/// Membership change produced by one cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListenerDelta {
    pub removed: Vec<ParticipantId>,
    pub added: Vec<ParticipantId>,
}

impl ListenerDelta {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }

    /// Number of transitions
    pub fn len(&self) -> usize {
        self.removed.len() + self.added.len()
    }
}

/// Qualifying candidates keyed by identity. The first row wins if the source
/// reports a participant twice.
fn qualified(
    candidates: &[Candidate],
    anchor: &Anchor,
    origin: &Position3D,
    relevance: &LocalRelevance,
) -> BTreeMap<ParticipantId, f32> {
    let mut eligible = BTreeMap::new();
    for candidate in candidates {
        if let Some(distance) = relevance.qualify(anchor, origin, candidate) {
            eligible.entry(candidate.participant).or_insert(distance);
        }
    }
    eligible
}

fn ranked(eligible: impl IntoIterator<Item = (ParticipantId, f32)>) -> Vec<RankedCandidate> {
    let mut ranked: Vec<_> = eligible
        .into_iter()
        .map(|(participant, distance)| RankedCandidate {
            participant,
            distance,
        })
        .collect();
    ranked.sort_by(RankedCandidate::rank_order);
    ranked
}

/// Qualifying candidates, nearest first
pub fn rank_candidates(
    candidates: &[Candidate],
    anchor: &Anchor,
    origin: &Position3D,
    relevance: &LocalRelevance,
) -> Vec<RankedCandidate> {
    ranked(qualified(candidates, anchor, origin, relevance))
}

/// Filter, rank and take the nearest `capacity` candidates
pub fn initial_members(
    candidates: &[Candidate],
    anchor: &Anchor,
    origin: &Position3D,
    relevance: &LocalRelevance,
    capacity: Capacity,
) -> Vec<ParticipantId> {
    let ranked = rank_candidates(candidates, anchor, origin, relevance);
    let take = capacity.limit().unwrap_or(usize::MAX);
    ranked.into_iter().take(take).map(|c| c.participant).collect()
}

/// Plan one dynamic reconciliation cycle against `listeners`
pub fn plan_cycle(
    listeners: &BTreeSet<ParticipantId>,
    candidates: &[Candidate],
    anchor: &Anchor,
    origin: &Position3D,
    relevance: &LocalRelevance,
    capacity: usize,
) -> ListenerDelta {
    let mut eligible = qualified(candidates, anchor, origin, relevance);

    // Listeners missing from the enumeration are gone and count as ineligible
    let removed: Vec<_> = listeners
        .iter()
        .copied()
        .filter(|id| !eligible.contains_key(id))
        .collect();

    eligible.retain(|id, _| !listeners.contains(id));

    let seated = listeners.len() - removed.len();
    let slots = capacity.saturating_sub(seated);

    let added = ranked(eligible)
        .into_iter()
        .take(slots)
        .map(|c| c.participant)
        .collect();

    ListenerDelta { removed, added }
}
