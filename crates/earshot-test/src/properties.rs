//! Membership properties over random worlds

use std::collections::{BTreeMap, BTreeSet};

use earshot_core::{Anchor, EventType, ParticipantId, Position3D, StreamEvent, StreamId};
use earshot_membership::{
    CandidateSource, CycleOutcome, LocalRelevance, ParticipantRecord, ParticipantSnapshot,
    RecordingEmitter, Stream, StreamSpec,
};
use proptest::prelude::*;

const THRESHOLD: f32 = 10.0;

/// One participant row: id, x, y, capable
type Row = (u16, f32, f32, bool);

fn rows() -> impl Strategy<Value = Vec<Row>> {
    proptest::collection::vec((0u16..24, -20.0f32..20.0, -20.0f32..20.0, prop::bool::weighted(0.85)), 0..24)
}

fn snapshot(rows: &[Row]) -> ParticipantSnapshot {
    let mut snapshot = ParticipantSnapshot::new();
    for (id, x, y, capable) in rows {
        snapshot.insert_participant(
            ParticipantId::new(*id),
            ParticipantRecord::new(Position3D::new(*x, *y, 0.0), *capable),
        );
    }
    snapshot
}

fn origin() -> Anchor {
    Anchor::Fixed(Position3D::origin())
}

/// Qualifying participants and their distance
fn eligible(snapshot: &ParticipantSnapshot) -> BTreeMap<ParticipantId, f32> {
    let anchor = origin();
    let relevance = LocalRelevance::new(THRESHOLD);
    snapshot
        .enumerate(&anchor, Position3D::origin())
        .iter()
        .filter_map(|c| relevance.qualify(&anchor, &Position3D::origin(), c).map(|d| (c.participant, d)))
        .collect()
}

fn open(capacity: usize, first: &ParticipantSnapshot, emitter: &RecordingEmitter) -> Stream {
    Stream::open(
        StreamId::new(1),
        StreamSpec::dynamic(origin(), THRESHOLD, capacity),
        first,
        emitter,
    )
}

fn listeners(stream: &Stream) -> BTreeSet<ParticipantId> {
    stream.listeners().clone()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn test_capacity_never_exceeded(capacity in 0usize..6, worlds in proptest::collection::vec(rows(), 1..8)) {
        let emitter = RecordingEmitter::new();
        let mut stream = open(capacity, &snapshot(&worlds[0]), &emitter);
        prop_assert!(stream.listener_count() <= capacity);

        for world in &worlds[1..] {
            stream.reconcile(&snapshot(world), &emitter);
            prop_assert!(stream.listener_count() <= capacity);
        }
    }

    #[test]
    fn test_ineligible_listeners_always_evicted(capacity in 1usize..6, first in rows(), second in rows()) {
        let emitter = RecordingEmitter::new();
        let mut stream = open(capacity, &snapshot(&first), &emitter);
        let world = snapshot(&second);
        stream.reconcile(&world, &emitter);

        let eligible = eligible(&world);
        for listener in stream.listeners() {
            prop_assert!(eligible.contains_key(listener));
        }
    }

    #[test]
    fn test_still_eligible_listeners_are_kept(capacity in 1usize..6, first in rows(), second in rows()) {
        let emitter = RecordingEmitter::new();
        let mut stream = open(capacity, &snapshot(&first), &emitter);
        let before = listeners(&stream);
        let world = snapshot(&second);
        stream.reconcile(&world, &emitter);

        let eligible = eligible(&world);
        let after = listeners(&stream);
        for listener in before.iter().filter(|p| eligible.contains_key(*p)) {
            prop_assert!(after.contains(listener), "{:?} was displaced", listener);
        }
    }

    #[test]
    fn test_admission_prefers_nearest(capacity in 1usize..6, first in rows(), second in rows()) {
        let emitter = RecordingEmitter::new();
        let mut stream = open(capacity, &snapshot(&first), &emitter);
        let world = snapshot(&second);

        let CycleOutcome::Reconciled(delta) = stream.reconcile(&world, &emitter) else {
            return Err(TestCaseError::fail("fixed anchor always resolves"));
        };

        let eligible = eligible(&world);
        let after = listeners(&stream);
        let left_out: Vec<_> = eligible
            .iter()
            .filter(|(p, _)| !after.contains(*p))
            .collect();

        for admitted in &delta.added {
            let d = eligible[admitted];
            for (other, od) in &left_out {
                prop_assert!((d, *admitted) <= (**od, **other));
            }
        }
        // Anyone left out means the stream is full
        if !left_out.is_empty() {
            prop_assert_eq!(after.len(), capacity);
        }
    }

    #[test]
    fn test_second_cycle_on_same_world_is_empty(capacity in 0usize..6, first in rows(), second in rows()) {
        let emitter = RecordingEmitter::new();
        let mut stream = open(capacity, &snapshot(&first), &emitter);
        let world = snapshot(&second);
        stream.reconcile(&world, &emitter);
        emitter.take();

        let outcome = stream.reconcile(&world, &emitter);
        prop_assert_eq!(outcome, CycleOutcome::Reconciled(Default::default()));
        prop_assert!(emitter.is_empty());
    }

    #[test]
    fn test_same_inputs_same_events(capacity in 0usize..6, worlds in proptest::collection::vec(rows(), 1..6)) {
        let run = || {
            let emitter = RecordingEmitter::new();
            let mut stream = open(capacity, &snapshot(&worlds[0]), &emitter);
            for world in &worlds[1..] {
                stream.reconcile(&snapshot(world), &emitter);
            }
            emitter.take()
        };
        prop_assert_eq!(run(), run());
    }

    #[test]
    fn test_detaches_precede_attaches(capacity in 1usize..6, first in rows(), second in rows()) {
        let emitter = RecordingEmitter::new();
        let mut stream = open(capacity, &snapshot(&first), &emitter);
        emitter.take();
        stream.reconcile(&snapshot(&second), &emitter);

        let kinds: Vec<EventType> = emitter.take().iter().map(StreamEvent::event_type).collect();
        let first_attach = kinds.iter().position(|k| *k == EventType::ListenerAttach);
        let last_detach = kinds.iter().rposition(|k| *k == EventType::ListenerDetach);
        if let (Some(attach), Some(detach)) = (first_attach, last_detach) {
            prop_assert!(detach < attach);
        }
    }

    #[test]
    fn test_static_attach_detach_idempotent(ids in proptest::collection::vec(0u16..8, 0..20)) {
        let emitter = RecordingEmitter::new();
        let mut stream = Stream::open(
            StreamId::new(2),
            StreamSpec::fixed_once(origin(), THRESHOLD, Default::default()),
            &ParticipantSnapshot::new(),
            &emitter,
        );
        emitter.take();

        let mut expected = BTreeSet::new();
        for id in ids {
            let participant = ParticipantId::new(id);
            if id % 2 == 0 {
                let attached = stream.attach_listener(participant, &emitter).unwrap();
                prop_assert_eq!(attached, expected.insert(participant));
            } else {
                let detached = stream.detach_listener(ParticipantId::new(id - 1), &emitter).unwrap();
                prop_assert_eq!(detached, expected.remove(&ParticipantId::new(id - 1)));
            }
        }
        prop_assert_eq!(listeners(&stream), expected);
    }
}
