//! Earshot Core - Fundamental types and primitives
//!
//! This crate defines the core types used throughout earshot:
//! - Identifiers (ParticipantId, EntityId, StreamId)
//! - World positions
//! - Stream anchors and capacity
//! - Protocol events emitted toward clients

pub mod anchor;
pub mod error;
pub mod event;
pub mod id;
pub mod position;

pub use anchor::*;
pub use error::*;
pub use event::*;
pub use id::*;
pub use position::*;
