//! Identity types for earshot
//!
//! Participants and entities use the game server's 16-bit pool slots.
//! Streams get a 64-bit handle that is never reused while the process lives.

use std::fmt;

/// Participant identity - the game server's player slot
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ParticipantId(pub u16);

impl ParticipantId {
    #[inline]
    pub fn new(id: u16) -> Self {
        ParticipantId(id)
    }

    #[inline]
    pub fn to_bytes(self) -> [u8; 2] {
        self.0.to_le_bytes()
    }

    #[inline]
    pub fn from_bytes(bytes: [u8; 2]) -> Self {
        ParticipantId(u16::from_le_bytes(bytes))
    }
}

impl fmt::Debug for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Participant({})", self.0)
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of a movable world entity that can carry a stream
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum EntityKind {
    Vehicle = 0,
    Object = 1,
}

/// Movable world entity identity (vehicle or object slot)
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId {
    pub kind: EntityKind,
    pub slot: u16,
}

impl EntityId {
    #[inline]
    pub fn vehicle(slot: u16) -> Self {
        EntityId {
            kind: EntityKind::Vehicle,
            slot,
        }
    }

    #[inline]
    pub fn object(slot: u16) -> Self {
        EntityId {
            kind: EntityKind::Object,
            slot,
        }
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            EntityKind::Vehicle => write!(f, "Vehicle({})", self.slot),
            EntityKind::Object => write!(f, "Object({})", self.slot),
        }
    }
}

/// Stream handle - opaque, stable for the stream's lifetime
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct StreamId(pub u64);

impl StreamId {
    pub const ZERO: StreamId = StreamId(0);

    #[inline]
    pub fn new(id: u64) -> Self {
        StreamId(id)
    }

    #[inline]
    pub fn to_bytes(self) -> [u8; 8] {
        self.0.to_le_bytes()
    }

    #[inline]
    pub fn from_bytes(bytes: [u8; 8]) -> Self {
        StreamId(u64::from_le_bytes(bytes))
    }
}

impl fmt::Debug for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Stream({:016x})", self.0)
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}
