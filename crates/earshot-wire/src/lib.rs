//! Earshot Wire Protocol - Control packet format
//!
//! Every protocol event travels as one control packet:
//! - Packet header (3 bytes: type + payload length)
//! - Type-specific payload, little-endian throughout

pub mod header;
pub mod packet;

pub use header::*;
pub use packet::*;
