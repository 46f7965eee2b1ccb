//! Stream anchors and capacity
//!
//! An anchor is where a stream's relevance is measured from. Tracked anchors
//! hold only an identity; the live position is looked up every time it is
//! needed, so a vanished referent resolves to nothing instead of a stale point.

use crate::{EntityId, ParticipantId, Position3D};

/// Position source for a stream
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Anchor {
    /// Fixed world coordinate
    Fixed(Position3D),
    /// Live position of a participant
    Participant(ParticipantId),
    /// Live position of a vehicle or object
    Entity(EntityId),
}

impl Anchor {
    /// Whether the anchor follows a live referent
    pub fn is_tracked(&self) -> bool {
        !matches!(self, Anchor::Fixed(_))
    }

    /// Participant this anchor follows, if any
    pub fn tracked_participant(&self) -> Option<ParticipantId> {
        match self {
            Anchor::Participant(id) => Some(*id),
            _ => None,
        }
    }

    /// Coordinate of a fixed anchor
    pub fn fixed_position(&self) -> Option<Position3D> {
        match self {
            Anchor::Fixed(position) => Some(*position),
            _ => None,
        }
    }
}

/// Maximum concurrent listeners of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capacity {
    Unbounded,
    Limited(usize),
}

impl Capacity {
    /// Whether `count` listeners leave room for one more
    #[inline]
    pub fn has_room(self, count: usize) -> bool {
        match self {
            Capacity::Unbounded => true,
            Capacity::Limited(max) => count < max,
        }
    }

    /// Whether `count` listeners are within the ceiling
    #[inline]
    pub fn admits(self, count: usize) -> bool {
        match self {
            Capacity::Unbounded => true,
            Capacity::Limited(max) => count <= max,
        }
    }

    #[inline]
    pub fn limit(self) -> Option<usize> {
        match self {
            Capacity::Unbounded => None,
            Capacity::Limited(max) => Some(max),
        }
    }
}

impl Default for Capacity {
    fn default() -> Self {
        Capacity::Unbounded
    }
}
