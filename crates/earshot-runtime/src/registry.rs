//! Stream registry - ownership of every live stream
//!
//! Each stream sits behind its own mutex, so a reconciliation cycle and an
//! administrative call on the same stream are serialized while different
//! streams never contend. Teardown raises a flag before taking the lock; the
//! scheduler checks it and never starts a new cycle on a flagged stream.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use earshot_core::{EarshotError, EarshotResult, ParticipantId, Position3D, StreamId};
use earshot_membership::{
    CandidateSource, CycleOutcome, ProtocolEmitter, Stream, StreamSpec, StreamState,
};
use parking_lot::{Mutex, MutexGuard, RwLock};
use tracing::debug;

/// Shared handle to one stream
#[derive(Debug)]
pub struct StreamHandle {
    id: StreamId,
    stream: Mutex<Stream>,
    torn_down: AtomicBool,
}

impl StreamHandle {
    fn new(stream: Stream) -> Self {
        StreamHandle {
            id: stream.id(),
            stream: Mutex::new(stream),
            torn_down: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> StreamId {
        self.id
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::Acquire)
    }

    /// Whether clients were ever told about this stream
    pub fn is_advertised(&self) -> bool {
        !matches!(self.stream.lock().state(), StreamState::Unadvertised)
    }

    /// Exclusive access to the stream
    pub fn lock(&self) -> MutexGuard<'_, Stream> {
        self.stream.lock()
    }

    pub fn listeners(&self) -> Vec<ParticipantId> {
        self.stream.lock().listeners().iter().copied().collect()
    }

    pub fn is_schedulable(&self) -> bool {
        !self.is_torn_down() && self.stream.lock().is_schedulable()
    }

    /// Run one cycle unless teardown was requested. `None` means skipped.
    pub fn reconcile(
        &self,
        source: &dyn CandidateSource,
        emitter: &dyn ProtocolEmitter,
    ) -> Option<CycleOutcome> {
        if self.is_torn_down() {
            return None;
        }
        let mut stream = self.stream.lock();
        // Teardown may have taken the lock first
        if self.is_torn_down() {
            return None;
        }
        Some(stream.reconcile(source, emitter))
    }
}

/// Owner of all live streams
pub struct StreamRegistry {
    streams: RwLock<HashMap<StreamId, Arc<StreamHandle>>>,
    next_id: AtomicU64,
    emitter: Arc<dyn ProtocolEmitter>,
}

impl StreamRegistry {
    pub fn new(emitter: Arc<dyn ProtocolEmitter>) -> Self {
        StreamRegistry {
            streams: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            emitter,
        }
    }

    pub fn emitter(&self) -> &Arc<dyn ProtocolEmitter> {
        &self.emitter
    }

    /// Open a stream and register it.
    ///
    /// The first membership computation finishes before the stream becomes
    /// visible to the scheduler.
    pub fn create(&self, spec: StreamSpec, source: &dyn CandidateSource) -> StreamId {
        let id = StreamId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let stream = Stream::open(id, spec, source, self.emitter.as_ref());
        self.streams
            .write()
            .insert(id, Arc::new(StreamHandle::new(stream)));
        id
    }

    pub fn handle(&self, id: StreamId) -> Option<Arc<StreamHandle>> {
        self.streams.read().get(&id).cloned()
    }

    fn require(&self, id: StreamId) -> EarshotResult<Arc<StreamHandle>> {
        self.handle(id).ok_or(EarshotError::StreamNotFound(id))
    }

    /// End a stream: detach every listener, announce destruction, forget it
    pub fn teardown(&self, id: StreamId) -> EarshotResult<()> {
        let handle = self
            .streams
            .write()
            .remove(&id)
            .ok_or(EarshotError::StreamNotFound(id))?;

        handle.torn_down.store(true, Ordering::Release);
        handle.stream.lock().teardown(self.emitter.as_ref());
        Ok(())
    }

    pub fn set_threshold(&self, id: StreamId, threshold: f32) -> EarshotResult<()> {
        let handle = self.require(id)?;
        let mut stream = handle.stream.lock();
        stream.set_threshold(threshold, self.emitter.as_ref())
    }

    pub fn set_position(&self, id: StreamId, position: Position3D) -> EarshotResult<()> {
        let handle = self.require(id)?;
        let mut stream = handle.stream.lock();
        stream.set_position(position, self.emitter.as_ref())
    }

    /// Seat a listener on a static stream. `Ok(false)` if already seated.
    pub fn attach_listener(&self, id: StreamId, participant: ParticipantId) -> EarshotResult<bool> {
        let handle = self.require(id)?;
        let mut stream = handle.stream.lock();
        stream.attach_listener(participant, self.emitter.as_ref())
    }

    /// Unseat a listener from a static stream. `Ok(false)` if not seated.
    pub fn detach_listener(&self, id: StreamId, participant: ParticipantId) -> EarshotResult<bool> {
        let handle = self.require(id)?;
        let mut stream = handle.stream.lock();
        stream.detach_listener(participant, self.emitter.as_ref())
    }

    /// Remove a disconnected participant from every stream.
    ///
    /// Returns the number of streams it was removed from.
    pub fn detach_everywhere(&self, participant: ParticipantId) -> usize {
        let removed = self
            .handles()
            .iter()
            .filter(|handle| handle.stream.lock().forget(participant, self.emitter.as_ref()))
            .count();
        if removed > 0 {
            debug!(participant = %participant, streams = removed, "participant detached everywhere");
        }
        removed
    }

    pub fn listeners(&self, id: StreamId) -> EarshotResult<Vec<ParticipantId>> {
        Ok(self.require(id)?.listeners())
    }

    /// Every registered stream, ordered by id
    pub fn handles(&self) -> Vec<Arc<StreamHandle>> {
        let mut handles: Vec<_> = self.streams.read().values().cloned().collect();
        handles.sort_by_key(|handle| handle.id());
        handles
    }

    /// Streams the scheduler should reconcile this tick
    pub fn scheduled(&self) -> Vec<Arc<StreamHandle>> {
        self.handles()
            .into_iter()
            .filter(|handle| handle.is_schedulable())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.streams.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use earshot_core::{Anchor, Capacity, EventType, StreamEvent, StreamMetadata};
    use earshot_membership::{ParticipantRecord, ParticipantSnapshot, RecordingEmitter};

    fn pid(id: u16) -> ParticipantId {
        ParticipantId::new(id)
    }

    fn world(rows: &[(u16, f32)]) -> ParticipantSnapshot {
        let mut snapshot = ParticipantSnapshot::new();
        for (id, x) in rows {
            snapshot.insert_participant(
                pid(*id),
                ParticipantRecord::new(Position3D::new(*x, 0.0, 0.0), true),
            );
        }
        snapshot
    }

    fn setup() -> (Arc<RecordingEmitter>, StreamRegistry) {
        let emitter = Arc::new(RecordingEmitter::new());
        let registry = StreamRegistry::new(emitter.clone());
        (emitter, registry)
    }

    fn origin() -> Anchor {
        Anchor::Fixed(Position3D::origin())
    }

    #[test]
    fn test_create_seats_before_registering() {
        let (emitter, registry) = setup();
        let id = registry.create(
            StreamSpec::dynamic(origin(), 10.0, 2),
            &world(&[(1, 3.0), (2, 5.0), (3, 8.0)]),
        );

        assert_eq!(registry.listeners(id).unwrap(), vec![pid(1), pid(2)]);
        assert_eq!(registry.scheduled().len(), 1);
        assert_eq!(emitter.of(id, EventType::ListenerAttach).len(), 2);
    }

    #[test]
    fn test_stream_ids_are_unique() {
        let (_, registry) = setup();
        let a = registry.create(StreamSpec::dynamic(origin(), 10.0, 2), &world(&[]));
        let b = registry.create(StreamSpec::dynamic(origin(), 10.0, 2), &world(&[]));
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_static_streams_are_not_scheduled() {
        let (_, registry) = setup();
        registry.create(
            StreamSpec::fixed_once(origin(), 10.0, Capacity::Unbounded),
            &world(&[(1, 3.0)]),
        );
        assert!(registry.scheduled().is_empty());
    }

    #[test]
    fn test_unadvertised_stream_is_registered_but_not_scheduled() {
        let (emitter, registry) = setup();
        let id = registry.create(
            StreamSpec::dynamic(origin(), f32::NAN, 2),
            &world(&[(1, 3.0)]),
        );

        let handle = registry.handle(id).unwrap();
        assert!(!handle.is_advertised());
        assert!(registry.listeners(id).unwrap().is_empty());
        assert!(registry.scheduled().is_empty());
        assert!(emitter.is_empty());
    }

    #[test]
    fn test_teardown_emits_detach_then_destroy() {
        let (emitter, registry) = setup();
        let id = registry.create(
            StreamSpec::dynamic(origin(), 10.0, 4).with_metadata(StreamMetadata::new("car", 1)),
            &world(&[(1, 3.0)]),
        );
        emitter.take();

        registry.teardown(id).unwrap();
        assert_eq!(
            emitter.take(),
            vec![
                StreamEvent::ListenerDetach {
                    stream: id,
                    participant: pid(1)
                },
                StreamEvent::Destroy { stream: id },
            ]
        );
        assert!(matches!(
            registry.teardown(id),
            Err(EarshotError::StreamNotFound(_))
        ));
    }

    #[test]
    fn test_torn_down_handle_refuses_new_cycles() {
        let (emitter, registry) = setup();
        let snapshot = world(&[(1, 3.0)]);
        let id = registry.create(StreamSpec::dynamic(origin(), 10.0, 4), &snapshot);
        let handle = registry.handle(id).unwrap();

        registry.teardown(id).unwrap();
        emitter.take();

        assert!(handle.reconcile(&snapshot, emitter.as_ref()).is_none());
        assert!(!handle.is_schedulable());
        assert!(emitter.is_empty());
    }

    #[test]
    fn test_detach_everywhere() {
        let (emitter, registry) = setup();
        let snapshot = world(&[(1, 3.0), (2, 4.0)]);
        let a = registry.create(StreamSpec::dynamic(origin(), 10.0, 4), &snapshot);
        let b = registry.create(
            StreamSpec::fixed_once(origin(), 10.0, Capacity::Unbounded),
            &snapshot,
        );
        emitter.take();

        assert_eq!(registry.detach_everywhere(pid(1)), 2);
        assert_eq!(registry.listeners(a).unwrap(), vec![pid(2)]);
        assert_eq!(registry.listeners(b).unwrap(), vec![pid(2)]);
        assert_eq!(emitter.len(), 2);

        assert_eq!(registry.detach_everywhere(pid(1)), 0);
        assert_eq!(emitter.len(), 2);
    }

    #[test]
    fn test_unknown_stream_errors() {
        let (_, registry) = setup();
        let missing = StreamId::new(999);
        assert!(matches!(
            registry.set_threshold(missing, 5.0),
            Err(EarshotError::StreamNotFound(_))
        ));
        assert!(matches!(
            registry.attach_listener(missing, pid(1)),
            Err(EarshotError::StreamNotFound(_))
        ));
    }
}
