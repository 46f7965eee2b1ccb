//! Client-side mirror of the event stream
//!
//! Applies events the way a client would and records every protocol
//! violation it sees: membership events for unknown streams, duplicate
//! attaches, detaches of absent listeners, and listener counts above the
//! advertised capacity at any point between events.

use std::collections::{BTreeSet, HashMap};

use earshot_core::{Capacity, EarshotResult, ParticipantId, StreamEvent, StreamId};
use earshot_wire::decode_all;

#[derive(Debug, Default)]
struct MirroredStream {
    capacity: Capacity,
    listeners: BTreeSet<ParticipantId>,
}

/// Replays events into per-stream listener sets
#[derive(Debug, Default)]
pub struct ClientMirror {
    streams: HashMap<StreamId, MirroredStream>,
    destroyed: BTreeSet<StreamId>,
    violations: Vec<String>,
    applied: u64,
}

impl ClientMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event
    pub fn apply(&mut self, event: &StreamEvent) {
        self.applied += 1;
        match event {
            StreamEvent::Create(payload) => {
                if self.streams.contains_key(&payload.stream) {
                    self.violation(format!("{} created twice", payload.stream));
                }
                self.streams.insert(
                    payload.stream,
                    MirroredStream {
                        capacity: payload.capacity,
                        listeners: BTreeSet::new(),
                    },
                );
            }
            StreamEvent::ThresholdUpdate { stream, .. } | StreamEvent::PositionUpdate { stream, .. } => {
                if !self.streams.contains_key(stream) {
                    self.violation(format!("update for unknown {}", stream));
                }
            }
            StreamEvent::ListenerAttach { stream, participant } => {
                let Some(mirrored) = self.streams.get_mut(stream) else {
                    self.violation(format!("attach {} to unknown {}", participant, stream));
                    return;
                };
                if !mirrored.listeners.insert(*participant) {
                    let message = format!("{} attached twice to {}", participant, stream);
                    self.violation(message);
                    return;
                }
                if !mirrored.capacity.admits(mirrored.listeners.len()) {
                    let message = format!(
                        "{} holds {} listeners, capacity {:?}",
                        stream,
                        mirrored.listeners.len(),
                        mirrored.capacity
                    );
                    self.violation(message);
                }
            }
            StreamEvent::ListenerDetach { stream, participant } => {
                let Some(mirrored) = self.streams.get_mut(stream) else {
                    self.violation(format!("detach {} from unknown {}", participant, stream));
                    return;
                };
                if !mirrored.listeners.remove(participant) {
                    self.violation(format!("{} detached from {} but was not listening", participant, stream));
                }
            }
            StreamEvent::Destroy { stream } => match self.streams.remove(stream) {
                Some(mirrored) if !mirrored.listeners.is_empty() => {
                    let message = format!(
                        "{} destroyed with {} listeners still attached",
                        stream,
                        mirrored.listeners.len()
                    );
                    self.violation(message);
                    self.destroyed.insert(*stream);
                }
                Some(_) => {
                    self.destroyed.insert(*stream);
                }
                None => self.violation(format!("destroy of unknown {}", stream)),
            },
        }
    }

    pub fn apply_all<'a>(&mut self, events: impl IntoIterator<Item = &'a StreamEvent>) {
        for event in events {
            self.apply(event);
        }
    }

    /// Decode a buffer of concatenated control packets and apply them.
    ///
    /// Returns the number of events applied.
    pub fn apply_packets(&mut self, buf: &[u8]) -> EarshotResult<usize> {
        let events = decode_all(buf)?;
        self.apply_all(&events);
        Ok(events.len())
    }

    fn violation(&mut self, message: String) {
        self.violations.push(message);
    }

    /// Listener set a client believes a stream has
    pub fn listeners(&self, stream: StreamId) -> Vec<ParticipantId> {
        self.streams
            .get(&stream)
            .map(|mirrored| mirrored.listeners.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn knows(&self, stream: StreamId) -> bool {
        self.streams.contains_key(&stream)
    }

    pub fn was_destroyed(&self, stream: StreamId) -> bool {
        self.destroyed.contains(&stream)
    }

    pub fn violations(&self) -> &[String] {
        &self.violations
    }

    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn applied(&self) -> u64 {
        self.applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use earshot_core::{Anchor, CreatePayload, Position3D, StreamMetadata};

    fn create(stream: StreamId, capacity: Capacity) -> StreamEvent {
        StreamEvent::Create(
            CreatePayload::build(
                stream,
                Anchor::Fixed(Position3D::origin()),
                10.0,
                capacity,
                StreamMetadata::default(),
            )
            .unwrap(),
        )
    }

    fn attach(stream: StreamId, id: u16) -> StreamEvent {
        StreamEvent::ListenerAttach {
            stream,
            participant: ParticipantId::new(id),
        }
    }

    fn detach(stream: StreamId, id: u16) -> StreamEvent {
        StreamEvent::ListenerDetach {
            stream,
            participant: ParticipantId::new(id),
        }
    }

    #[test]
    fn test_clean_sequence() {
        let s = StreamId::new(1);
        let mut mirror = ClientMirror::new();
        mirror.apply_all(&[
            create(s, Capacity::Limited(1)),
            attach(s, 1),
            detach(s, 1),
            attach(s, 2),
        ]);

        assert!(mirror.is_clean(), "{:?}", mirror.violations());
        assert_eq!(mirror.listeners(s), vec![ParticipantId::new(2)]);
    }

    #[test]
    fn test_attach_before_detach_overflows() {
        let s = StreamId::new(1);
        let mut mirror = ClientMirror::new();
        mirror.apply_all(&[
            create(s, Capacity::Limited(1)),
            attach(s, 1),
            attach(s, 2),
            detach(s, 1),
        ]);
        assert_eq!(mirror.violations().len(), 1);
    }

    #[test]
    fn test_unknown_stream_is_flagged() {
        let mut mirror = ClientMirror::new();
        mirror.apply(&attach(StreamId::new(9), 1));
        assert!(!mirror.is_clean());
    }

    #[test]
    fn test_destroy_with_listeners_is_flagged() {
        let s = StreamId::new(1);
        let mut mirror = ClientMirror::new();
        mirror.apply_all(&[
            create(s, Capacity::Unbounded),
            attach(s, 1),
            StreamEvent::Destroy { stream: s },
        ]);
        assert!(!mirror.is_clean());
        assert!(mirror.was_destroyed(s));
        assert!(!mirror.knows(s));
    }
}
