//! Earshot Test Harness - Simulation and validation of proximity membership
//!
//! This crate provides:
//! - Deterministic world simulation
//! - A client-side mirror that replays the event stream and flags violations
//! - Soak runs over many streams and a moving, churning world
//! - Named end-to-end scenarios and membership property tests

pub mod mirror;
pub mod scenarios;
pub mod soak;
pub mod world;

#[cfg(test)]
mod properties;

pub use mirror::*;
pub use scenarios::*;
pub use soak::*;
pub use world::*;
