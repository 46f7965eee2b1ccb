//! Scenario rig: registry, scheduler and client mirror wired together

use std::sync::Arc;

use earshot_core::{ParticipantId, Position3D, StreamEvent, StreamId};
use earshot_membership::{ParticipantRecord, ParticipantSnapshot, RecordingEmitter};
use earshot_runtime::{ReconciliationScheduler, RuntimeConfig, StreamRegistry};

use crate::ClientMirror;

/// Registry, scheduler and client mirror wired together
pub struct ScenarioRig {
    pub emitter: Arc<RecordingEmitter>,
    pub scheduler: ReconciliationScheduler,
    pub mirror: ClientMirror,
}

impl ScenarioRig {
    pub fn new() -> Self {
        let emitter = Arc::new(RecordingEmitter::new());
        let registry = Arc::new(StreamRegistry::new(emitter.clone()));
        ScenarioRig {
            emitter,
            scheduler: ReconciliationScheduler::new(registry, RuntimeConfig::default()),
            mirror: ClientMirror::new(),
        }
    }

    pub fn registry(&self) -> &Arc<StreamRegistry> {
        self.scheduler.registry()
    }

    /// Events emitted since the last call, also fed to the mirror
    pub fn drain(&mut self) -> Vec<StreamEvent> {
        let events = self.emitter.take();
        self.mirror.apply_all(&events);
        events
    }

    pub fn listeners(&self, stream: StreamId) -> Vec<ParticipantId> {
        self.registry().listeners(stream).unwrap_or_default()
    }
}

impl Default for ScenarioRig {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot with capable participants on the x axis
pub fn line(rows: &[(ParticipantId, f32)]) -> ParticipantSnapshot {
    let mut snapshot = ParticipantSnapshot::new();
    for (id, x) in rows {
        snapshot.insert_participant(*id, ParticipantRecord::new(Position3D::new(*x, 0.0, 0.0), true));
    }
    snapshot
}
