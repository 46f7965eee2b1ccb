//! Earshot Runtime - Stream ownership and the reconciliation loop
//!
//! This crate wires the membership engine into a game server:
//! - `StreamRegistry` owns every live stream behind its own lock
//! - `ReconciliationScheduler` runs one membership pass per tick, fanning out
//!   across blocking workers when there are many streams
//! - Emitters hand protocol events to the network layer
//! - Configuration and tracing setup

pub mod config;
pub mod emitter;
pub mod registry;
pub mod scheduler;
pub mod telemetry;

pub use config::*;
pub use emitter::*;
pub use registry::*;
pub use scheduler::*;
pub use telemetry::*;
