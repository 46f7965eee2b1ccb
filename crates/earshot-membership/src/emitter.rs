//! Protocol emission contract
//!
//! Emission is a hand-off: the engine never waits for delivery and never
//! learns whether it succeeded.

use std::sync::Arc;

use earshot_core::{EventType, StreamEvent, StreamId};
use parking_lot::Mutex;

/// Receiver of protocol events
pub trait ProtocolEmitter: Send + Sync {
    fn emit(&self, event: StreamEvent);
}

impl<E: ProtocolEmitter + ?Sized> ProtocolEmitter for Arc<E> {
    fn emit(&self, event: StreamEvent) {
        (**self).emit(event)
    }
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEmitter;

impl ProtocolEmitter for NullEmitter {
    fn emit(&self, _event: StreamEvent) {}
}

/// Keeps every event in order, for tests and diagnostics
#[derive(Debug, Default)]
pub struct RecordingEmitter {
    events: Mutex<Vec<StreamEvent>>,
}

impl RecordingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return everything recorded so far
    pub fn take(&self) -> Vec<StreamEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Copy of everything recorded so far
    pub fn events(&self) -> Vec<StreamEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Recorded events of one type for one stream
    pub fn of(&self, stream: StreamId, event_type: EventType) -> Vec<StreamEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.stream() == stream && e.event_type() == event_type)
            .cloned()
            .collect()
    }
}

impl ProtocolEmitter for RecordingEmitter {
    fn emit(&self, event: StreamEvent) {
        self.events.lock().push(event);
    }
}
