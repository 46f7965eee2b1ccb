//! Earshot Membership - Who hears which stream
//!
//! A stream is composed from independent pieces:
//! - Anchor: where relevance is measured from (fixed point or tracked referent)
//! - Relevance: the distance threshold a listener must be within
//! - Membership: static (decided once) or dynamic (re-evaluated every cycle
//!   under a capacity ceiling)
//!
//! The engine reads participants through a `CandidateSource` and reports every
//! membership change to a `ProtocolEmitter`. Dynamic streams evict listeners
//! that became ineligible, then admit the nearest eligible newcomers until the
//! ceiling is reached. Seated listeners are never displaced by nearer ones.

pub mod candidate;
pub mod emitter;
pub mod membership;
pub mod relevance;
pub mod stream;

pub use candidate::*;
pub use emitter::*;
pub use membership::*;
pub use relevance::*;
pub use stream::*;
