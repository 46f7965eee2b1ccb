//! Stream - one proximity broadcast group
//!
//! A stream holds one anchor, one relevance rule and one membership policy
//! side by side. Construction computes the first listener set synchronously,
//! so a stream is never observable with fewer listeners than it should have.

use std::collections::BTreeSet;

use earshot_core::{
    Anchor, Capacity, CreatePayload, EarshotError, EarshotResult, ParticipantId, Position3D,
    StreamEvent, StreamId, StreamMetadata,
};
use tracing::{debug, info, trace, warn};

use crate::{
    initial_members, plan_cycle, CandidateSource, ListenerDelta, LocalRelevance, MembershipPolicy,
    ProtocolEmitter,
};

/// Lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Being constructed
    Uninitialized,
    /// Advertised to clients; dynamic streams are reconciled
    Active,
    /// Create payload could not be built; never advertised or reconciled
    Unadvertised,
    /// Torn down
    TornDown,
}

/// Everything needed to open a stream
#[derive(Debug, Clone)]
pub struct StreamSpec {
    pub anchor: Anchor,
    pub threshold: f32,
    pub policy: MembershipPolicy,
    pub metadata: StreamMetadata,
}

impl StreamSpec {
    /// Static stream, decided once
    pub fn fixed_once(anchor: Anchor, threshold: f32, capacity: Capacity) -> Self {
        Self {
            anchor,
            threshold,
            policy: MembershipPolicy::Static { capacity },
            metadata: StreamMetadata::default(),
        }
    }

    /// Dynamic stream, re-evaluated every cycle
    pub fn dynamic(anchor: Anchor, threshold: f32, capacity: usize) -> Self {
        Self {
            anchor,
            threshold,
            policy: MembershipPolicy::Dynamic { capacity },
            metadata: StreamMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: StreamMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Why a cycle changed nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Static membership or not active
    NotScheduled,
    /// Tracked referent is gone
    AnchorUnresolved,
}

/// Result of one reconciliation cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Skipped(SkipReason),
    Reconciled(ListenerDelta),
}

/// A proximity stream and its listener set
#[derive(Debug)]
pub struct Stream {
    id: StreamId,
    anchor: Anchor,
    relevance: LocalRelevance,
    policy: MembershipPolicy,
    metadata: StreamMetadata,
    listeners: BTreeSet<ParticipantId>,
    state: StreamState,
}

impl Stream {
    /// Build a stream, advertise it and seat its first listeners.
    ///
    /// If the create payload cannot be built the stream stays `Unadvertised`
    /// with no listeners and nothing is emitted.
    pub fn open(
        id: StreamId,
        spec: StreamSpec,
        source: &dyn CandidateSource,
        emitter: &dyn ProtocolEmitter,
    ) -> Self {
        let mut stream = Stream {
            id,
            anchor: spec.anchor,
            relevance: LocalRelevance::new(spec.threshold),
            policy: spec.policy,
            metadata: spec.metadata,
            listeners: BTreeSet::new(),
            state: StreamState::Uninitialized,
        };

        let payload = match CreatePayload::build(
            id,
            stream.anchor,
            stream.relevance.threshold(),
            stream.policy.capacity(),
            stream.metadata.clone(),
        ) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(stream = %id, error = %e, "stream left unadvertised");
                stream.state = StreamState::Unadvertised;
                return stream;
            }
        };

        emitter.emit(StreamEvent::Create(payload));

        match source.resolve(&stream.anchor) {
            Some(origin) => {
                let candidates = source.enumerate(&stream.anchor, origin);
                let members = initial_members(
                    &candidates,
                    &stream.anchor,
                    &origin,
                    &stream.relevance,
                    stream.policy.capacity(),
                );
                for participant in members {
                    stream.attach(participant, emitter);
                }
            }
            None => {
                debug!(stream = %id, "anchor unresolved at construction, starting empty");
            }
        }

        stream.state = StreamState::Active;
        info!(
            stream = %id,
            dynamic = stream.policy.is_dynamic(),
            listeners = stream.listeners.len(),
            "stream opened"
        );
        stream
    }

    pub fn id(&self) -> StreamId {
        self.id
    }

    pub fn anchor(&self) -> &Anchor {
        &self.anchor
    }

    pub fn threshold(&self) -> f32 {
        self.relevance.threshold()
    }

    pub fn policy(&self) -> MembershipPolicy {
        self.policy
    }

    pub fn capacity(&self) -> Capacity {
        self.policy.capacity()
    }

    pub fn metadata(&self) -> &StreamMetadata {
        &self.metadata
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn listeners(&self) -> &BTreeSet<ParticipantId> {
        &self.listeners
    }

    pub fn has_listener(&self, participant: ParticipantId) -> bool {
        self.listeners.contains(&participant)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Whether the scheduler should run cycles for this stream
    pub fn is_schedulable(&self) -> bool {
        self.state == StreamState::Active && self.policy.is_dynamic()
    }

    fn attach(&mut self, participant: ParticipantId, emitter: &dyn ProtocolEmitter) {
        if self.listeners.insert(participant) {
            debug_assert!(self.capacity().admits(self.listeners.len()));
            emitter.emit(StreamEvent::ListenerAttach {
                stream: self.id,
                participant,
            });
        }
    }

    fn detach(&mut self, participant: ParticipantId, emitter: &dyn ProtocolEmitter) -> bool {
        let removed = self.listeners.remove(&participant);
        if removed {
            emitter.emit(StreamEvent::ListenerDetach {
                stream: self.id,
                participant,
            });
        }
        removed
    }

    fn ensure_live(&self) -> EarshotResult<()> {
        match self.state {
            StreamState::TornDown => Err(EarshotError::StreamTornDown(self.id)),
            StreamState::Unadvertised => Err(EarshotError::StreamNotAdvertised(self.id)),
            _ => Ok(()),
        }
    }

    /// Run one reconciliation cycle.
    ///
    /// Detaches are emitted before attaches so the client-side set never
    /// exceeds capacity between events.
    pub fn reconcile(
        &mut self,
        source: &dyn CandidateSource,
        emitter: &dyn ProtocolEmitter,
    ) -> CycleOutcome {
        let capacity = match (self.state, self.policy) {
            (StreamState::Active, MembershipPolicy::Dynamic { capacity }) => capacity,
            _ => return CycleOutcome::Skipped(SkipReason::NotScheduled),
        };

        let Some(origin) = source.resolve(&self.anchor) else {
            trace!(stream = %self.id, "anchor unresolved, skipping cycle");
            return CycleOutcome::Skipped(SkipReason::AnchorUnresolved);
        };

        let candidates = source.enumerate(&self.anchor, origin);
        let delta = plan_cycle(
            &self.listeners,
            &candidates,
            &self.anchor,
            &origin,
            &self.relevance,
            capacity,
        );

        for participant in &delta.removed {
            self.detach(*participant, emitter);
        }
        for participant in &delta.added {
            self.attach(*participant, emitter);
        }

        if !delta.is_empty() {
            debug!(
                stream = %self.id,
                removed = delta.removed.len(),
                added = delta.added.len(),
                listeners = self.listeners.len(),
                "membership reconciled"
            );
        }

        CycleOutcome::Reconciled(delta)
    }

    /// Record a new threshold; the next cycle applies it
    pub fn set_threshold(&mut self, threshold: f32, emitter: &dyn ProtocolEmitter) -> EarshotResult<()> {
        self.ensure_live()?;
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(EarshotError::InvalidThreshold(threshold));
        }

        self.relevance.set_threshold(threshold);
        emitter.emit(StreamEvent::ThresholdUpdate {
            stream: self.id,
            threshold,
        });
        Ok(())
    }

    /// Move a fixed-point anchor; the next cycle applies it
    pub fn set_position(&mut self, position: Position3D, emitter: &dyn ProtocolEmitter) -> EarshotResult<()> {
        self.ensure_live()?;
        if !matches!(self.anchor, Anchor::Fixed(_)) {
            return Err(EarshotError::NotFixedAnchor(self.id));
        }
        if !position.is_finite() {
            return Err(EarshotError::InvalidPosition);
        }

        self.anchor = Anchor::Fixed(position);
        emitter.emit(StreamEvent::PositionUpdate {
            stream: self.id,
            position,
        });
        Ok(())
    }

    /// Seat a listener on a static stream. `Ok(false)` if already seated.
    pub fn attach_listener(
        &mut self,
        participant: ParticipantId,
        emitter: &dyn ProtocolEmitter,
    ) -> EarshotResult<bool> {
        self.ensure_live()?;
        if self.policy.is_dynamic() {
            return Err(EarshotError::DynamicMembership(self.id));
        }
        if self.listeners.contains(&participant) {
            return Ok(false);
        }
        if !self.capacity().has_room(self.listeners.len()) {
            return Err(EarshotError::CapacityReached {
                stream: self.id,
                participant,
            });
        }

        self.attach(participant, emitter);
        Ok(true)
    }

    /// Unseat a listener from a static stream. `Ok(false)` if not seated.
    pub fn detach_listener(
        &mut self,
        participant: ParticipantId,
        emitter: &dyn ProtocolEmitter,
    ) -> EarshotResult<bool> {
        self.ensure_live()?;
        if self.policy.is_dynamic() {
            return Err(EarshotError::DynamicMembership(self.id));
        }
        Ok(self.detach(participant, emitter))
    }

    /// Drop a participant that left the server, whatever the policy
    pub fn forget(&mut self, participant: ParticipantId, emitter: &dyn ProtocolEmitter) -> bool {
        if self.state == StreamState::TornDown {
            return false;
        }
        self.detach(participant, emitter)
    }

    /// Detach everyone and announce the end of the stream. Idempotent.
    pub fn teardown(&mut self, emitter: &dyn ProtocolEmitter) -> bool {
        match self.state {
            StreamState::TornDown => return false,
            StreamState::Unadvertised => {
                self.state = StreamState::TornDown;
                return true;
            }
            _ => {}
        }

        let listeners = std::mem::take(&mut self.listeners);
        for participant in listeners {
            emitter.emit(StreamEvent::ListenerDetach {
                stream: self.id,
                participant,
            });
        }
        emitter.emit(StreamEvent::Destroy { stream: self.id });

        self.state = StreamState::TornDown;
        info!(stream = %self.id, "stream torn down");
        true
    }
}
