//! Protocol events
//!
//! Events are what the membership engine tells clients. Payload shape only;
//! the byte layout lives in `earshot-wire`.

use crate::{Anchor, Capacity, EarshotError, EarshotResult, ParticipantId, Position3D, StreamId};

/// Longest display name a create event can carry
pub const MAX_NAME_LEN: usize = 64;

/// Event type classification
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventType {
    StreamCreate = 0x01,
    ThresholdUpdate = 0x02,
    PositionUpdate = 0x03,
    ListenerAttach = 0x04,
    ListenerDetach = 0x05,
    StreamDestroy = 0x06,
}

impl EventType {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(EventType::StreamCreate),
            0x02 => Some(EventType::ThresholdUpdate),
            0x03 => Some(EventType::PositionUpdate),
            0x04 => Some(EventType::ListenerAttach),
            0x05 => Some(EventType::ListenerDetach),
            0x06 => Some(EventType::StreamDestroy),
            _ => None,
        }
    }

    #[inline]
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Does this event change the listener set?
    pub fn is_membership(self) -> bool {
        matches!(self, EventType::ListenerAttach | EventType::ListenerDetach)
    }
}

/// Display metadata shown by clients
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StreamMetadata {
    /// Display name (UTF-8, at most `MAX_NAME_LEN` bytes)
    pub name: String,
    /// ARGB color
    pub color: u32,
}

impl StreamMetadata {
    pub fn new(name: impl Into<String>, color: u32) -> Self {
        Self {
            name: name.into(),
            color,
        }
    }
}

/// Payload announcing a new stream
#[derive(Clone, Debug, PartialEq)]
pub struct CreatePayload {
    pub stream: StreamId,
    pub anchor: Anchor,
    pub threshold: f32,
    pub capacity: Capacity,
    pub metadata: StreamMetadata,
}

impl CreatePayload {
    /// Build a create payload, rejecting values clients cannot represent
    pub fn build(
        stream: StreamId,
        anchor: Anchor,
        threshold: f32,
        capacity: Capacity,
        metadata: StreamMetadata,
    ) -> EarshotResult<Self> {
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(EarshotError::InvalidThreshold(threshold));
        }
        if metadata.name.len() > MAX_NAME_LEN {
            return Err(EarshotError::NameTooLong {
                max: MAX_NAME_LEN,
                actual: metadata.name.len(),
            });
        }
        if let Anchor::Fixed(position) = anchor {
            if !position.is_finite() {
                return Err(EarshotError::InvalidPosition);
            }
        }

        Ok(CreatePayload {
            stream,
            anchor,
            threshold,
            capacity,
            metadata,
        })
    }
}

/// Event emitted toward clients
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    Create(CreatePayload),
    ThresholdUpdate { stream: StreamId, threshold: f32 },
    PositionUpdate { stream: StreamId, position: Position3D },
    ListenerAttach { stream: StreamId, participant: ParticipantId },
    ListenerDetach { stream: StreamId, participant: ParticipantId },
    Destroy { stream: StreamId },
}

impl StreamEvent {
    pub fn event_type(&self) -> EventType {
        match self {
            StreamEvent::Create(_) => EventType::StreamCreate,
            StreamEvent::ThresholdUpdate { .. } => EventType::ThresholdUpdate,
            StreamEvent::PositionUpdate { .. } => EventType::PositionUpdate,
            StreamEvent::ListenerAttach { .. } => EventType::ListenerAttach,
            StreamEvent::ListenerDetach { .. } => EventType::ListenerDetach,
            StreamEvent::Destroy { .. } => EventType::StreamDestroy,
        }
    }

    /// Stream the event belongs to
    pub fn stream(&self) -> StreamId {
        match self {
            StreamEvent::Create(payload) => payload.stream,
            StreamEvent::ThresholdUpdate { stream, .. }
            | StreamEvent::PositionUpdate { stream, .. }
            | StreamEvent::ListenerAttach { stream, .. }
            | StreamEvent::ListenerDetach { stream, .. }
            | StreamEvent::Destroy { stream } => *stream,
        }
    }

    /// Participant addressed by a membership event
    pub fn participant(&self) -> Option<ParticipantId> {
        match self {
            StreamEvent::ListenerAttach { participant, .. }
            | StreamEvent::ListenerDetach { participant, .. } => Some(*participant),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anchor() -> Anchor {
        Anchor::Fixed(Position3D::origin())
    }

    #[test]
    fn test_event_type_bytes() {
        for b in 0x01..=0x06 {
            let ty = EventType::from_byte(b).unwrap();
            assert_eq!(ty.to_byte(), b);
        }
        assert!(EventType::from_byte(0x07).is_none());
        assert!(EventType::ListenerAttach.is_membership());
        assert!(!EventType::StreamDestroy.is_membership());
    }

    #[test]
    fn test_create_payload_rejects_long_name() {
        let metadata = StreamMetadata::new("x".repeat(MAX_NAME_LEN + 1), 0);
        let err = CreatePayload::build(StreamId::new(1), anchor(), 10.0, Capacity::Unbounded, metadata)
            .unwrap_err();
        assert!(matches!(err, EarshotError::NameTooLong { .. }));
    }

    #[test]
    fn test_create_payload_rejects_bad_threshold() {
        for threshold in [f32::NAN, f32::INFINITY, -1.0] {
            let result = CreatePayload::build(
                StreamId::new(1),
                anchor(),
                threshold,
                Capacity::Limited(4),
                StreamMetadata::default(),
            );
            assert!(result.is_err());
        }
    }

    #[test]
    fn test_event_accessors() {
        let event = StreamEvent::ListenerAttach {
            stream: StreamId::new(9),
            participant: ParticipantId::new(3),
        };
        assert_eq!(event.stream(), StreamId::new(9));
        assert_eq!(event.participant(), Some(ParticipantId::new(3)));
        assert_eq!(event.event_type(), EventType::ListenerAttach);

        let destroy = StreamEvent::Destroy {
            stream: StreamId::new(9),
        };
        assert_eq!(destroy.participant(), None);
    }
}
