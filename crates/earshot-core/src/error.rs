//! Error types for earshot

use thiserror::Error;

use crate::{ParticipantId, StreamId};

/// Core earshot errors
#[derive(Error, Debug)]
pub enum EarshotError {
    // Registry errors
    #[error("Stream not found: {0:?}")]
    StreamNotFound(StreamId),

    #[error("Stream {0:?} has been torn down")]
    StreamTornDown(StreamId),

    #[error("Stream {0:?} was never advertised")]
    StreamNotAdvertised(StreamId),

    // Policy errors
    #[error("Stream {0:?} uses dynamic membership; listeners are managed by reconciliation")]
    DynamicMembership(StreamId),

    #[error("Stream {0:?} is not anchored at a fixed point")]
    NotFixedAnchor(StreamId),

    #[error("Stream {stream:?} is full, cannot attach {participant:?}")]
    CapacityReached {
        stream: StreamId,
        participant: ParticipantId,
    },

    // Payload errors
    #[error("Invalid threshold: {0}")]
    InvalidThreshold(f32),

    #[error("Invalid position: coordinates must be finite")]
    InvalidPosition,

    #[error("Display name too long: max {max} bytes, got {actual}")]
    NameTooLong { max: usize, actual: usize },

    // Wire errors
    #[error("Invalid wire format: {0}")]
    InvalidWireFormat(String),

    #[error("Buffer too short: expected {expected}, got {actual}")]
    BufferTooShort { expected: usize, actual: usize },

    #[error("Unknown packet type: {0}")]
    UnknownPacketType(u8),

    #[error("Unknown anchor tag: {0}")]
    UnknownAnchorTag(u8),

    // Runtime errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for earshot operations
pub type EarshotResult<T> = Result<T, EarshotError>;
