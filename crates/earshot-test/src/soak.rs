//! Soak harness - many streams over a moving world
//!
//! Runs the scheduler tick after tick against a simulated world and checks
//! after every tick:
//! - no dynamic stream holds more listeners than its capacity
//! - every listener of a dynamic stream with a resolvable anchor qualifies
//! - the client mirror agrees with the registry on every listener set
//! - the event stream never breaks protocol ordering

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use earshot_core::{Anchor, Capacity, ParticipantId, Position3D, StreamId, StreamMetadata};
use earshot_membership::{
    CandidateSource, LocalRelevance, MembershipPolicy, ParticipantSnapshot, RecordingEmitter,
    StreamSpec, StreamState,
};
use earshot_runtime::{ReconciliationScheduler, RuntimeConfig, StreamRegistry};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{ClientMirror, SimWorld, WorldConfig};

/// Soak run parameters
#[derive(Clone, Debug)]
pub struct SoakConfig {
    pub world: WorldConfig,
    pub dynamic_streams: usize,
    pub static_streams: usize,
    pub ticks: usize,
    pub threshold: f32,
    /// Dynamic capacities are drawn from `1..=max_capacity`
    pub max_capacity: usize,
    /// Probability per tick that one stream is torn down and replaced
    pub replace_prob: f64,
    pub seed: u64,
}

impl Default for SoakConfig {
    fn default() -> Self {
        SoakConfig {
            world: WorldConfig::default(),
            dynamic_streams: 32,
            static_streams: 4,
            ticks: 100,
            threshold: 15.0,
            max_capacity: 8,
            replace_prob: 0.05,
            seed: 7,
        }
    }
}

impl SoakConfig {
    /// Quick run for unit tests
    pub fn minimal() -> Self {
        SoakConfig {
            world: WorldConfig::light(),
            dynamic_streams: 6,
            static_streams: 2,
            ticks: 30,
            threshold: 12.0,
            max_capacity: 3,
            ..Default::default()
        }
    }

    /// Crowded world, long run
    pub fn stress() -> Self {
        SoakConfig {
            world: WorldConfig::crowded(),
            dynamic_streams: 256,
            static_streams: 16,
            ticks: 200,
            threshold: 25.0,
            max_capacity: 16,
            replace_prob: 0.2,
            seed: 99,
        }
    }
}

/// Outcome of a soak run
#[derive(Clone, Debug, Default)]
pub struct SoakResult {
    pub ticks: usize,
    pub streams_created: usize,
    pub events: u64,
    pub attached: u64,
    pub detached: u64,
    pub violations: Vec<String>,
}

impl SoakResult {
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Drives a registry and scheduler over a simulated world
pub struct SoakHarness {
    config: SoakConfig,
    rng: StdRng,
    world: SimWorld,
    emitter: Arc<RecordingEmitter>,
    scheduler: ReconciliationScheduler,
    mirror: ClientMirror,
    streams_created: usize,
}

impl SoakHarness {
    pub fn new(config: SoakConfig) -> Self {
        let emitter = Arc::new(RecordingEmitter::new());
        let registry = Arc::new(StreamRegistry::new(emitter.clone()));
        let scheduler = ReconciliationScheduler::new(registry, RuntimeConfig::default());

        SoakHarness {
            rng: StdRng::seed_from_u64(config.seed),
            world: SimWorld::new(config.world.clone()),
            config,
            emitter,
            scheduler,
            mirror: ClientMirror::new(),
            streams_created: 0,
        }
    }

    pub fn registry(&self) -> &Arc<StreamRegistry> {
        self.scheduler.registry()
    }

    pub fn mirror(&self) -> &ClientMirror {
        &self.mirror
    }

    fn random_anchor(&mut self) -> Anchor {
        let participants = self.world.participant_ids();
        let entities = self.world.entity_ids();
        let extent = self.world.config().extent;

        match self.rng.gen_range(0..3) {
            0 if !participants.is_empty() => {
                Anchor::Participant(participants[self.rng.gen_range(0..participants.len())])
            }
            1 if !entities.is_empty() => Anchor::Entity(entities[self.rng.gen_range(0..entities.len())]),
            _ => Anchor::Fixed(Position3D::new(
                self.rng.gen_range(-extent..=extent),
                self.rng.gen_range(-extent..=extent),
                0.0,
            )),
        }
    }

    fn open_stream(&mut self, dynamic: bool, snapshot: &ParticipantSnapshot) -> StreamId {
        let anchor = self.random_anchor();
        let spec = if dynamic {
            let capacity = self.rng.gen_range(1..=self.config.max_capacity.max(1));
            StreamSpec::dynamic(anchor, self.config.threshold, capacity)
        } else {
            StreamSpec::fixed_once(anchor, self.config.threshold, Capacity::Unbounded)
        };
        let spec = spec.with_metadata(StreamMetadata::new(format!("soak-{}", self.streams_created), 0));

        let id = self.registry().create(spec, snapshot);
        self.streams_created += 1;
        id
    }

    /// Run the configured number of ticks, then tear everything down
    pub fn run(&mut self) -> SoakResult {
        let mut result = SoakResult::default();

        let snapshot = self.world.snapshot();
        for i in 0..self.config.dynamic_streams + self.config.static_streams {
            self.open_stream(i < self.config.dynamic_streams, &snapshot);
        }
        self.drain(&mut result);

        for _ in 0..self.config.ticks {
            let before: BTreeSet<_> = self.world.participant_ids().into_iter().collect();
            self.world.step();
            let after: BTreeSet<_> = self.world.participant_ids().into_iter().collect();
            for gone in before.difference(&after) {
                self.registry().detach_everywhere(*gone);
            }

            let snapshot = self.world.snapshot();
            if self.rng.gen_bool(self.config.replace_prob) {
                self.replace_one(&snapshot);
            }

            let report = self.scheduler.tick(&snapshot);
            result.attached += report.attached;
            result.detached += report.detached;
            result.ticks += 1;

            self.drain(&mut result);
            self.check(&snapshot, &mut result);
        }

        for handle in self.registry().handles() {
            if let Err(e) = self.registry().teardown(handle.id()) {
                result.violations.push(format!("teardown of {} failed: {}", handle.id(), e));
            }
        }
        self.drain(&mut result);

        result.streams_created = self.streams_created;
        result.violations.extend(self.mirror.violations().iter().cloned());
        result
    }

    fn replace_one(&mut self, snapshot: &ParticipantSnapshot) {
        let handles = self.registry().handles();
        if handles.is_empty() {
            return;
        }
        let victim = &handles[self.rng.gen_range(0..handles.len())];
        let dynamic = victim.lock().policy().is_dynamic();
        let victim = victim.id();

        if self.registry().teardown(victim).is_ok() {
            self.open_stream(dynamic, snapshot);
        }
    }

    fn drain(&mut self, result: &mut SoakResult) {
        let events = self.emitter.take();
        result.events += events.len() as u64;
        self.mirror.apply_all(&events);
    }

    fn check(&self, snapshot: &ParticipantSnapshot, result: &mut SoakResult) {
        for handle in self.registry().handles() {
            let stream = handle.lock();
            let id = stream.id();
            let listeners: Vec<ParticipantId> = stream.listeners().iter().copied().collect();

            if stream.state() != StreamState::Unadvertised && self.mirror.listeners(id) != listeners {
                result
                    .violations
                    .push(format!("{} mirror disagrees with registry", id));
            }

            let MembershipPolicy::Dynamic { capacity } = stream.policy() else {
                continue;
            };
            if listeners.len() > capacity {
                result.violations.push(format!(
                    "{} holds {} listeners, capacity {}",
                    id,
                    listeners.len(),
                    capacity
                ));
            }

            let Some(origin) = snapshot.resolve(stream.anchor()) else {
                continue;
            };
            let relevance = LocalRelevance::new(stream.threshold());
            let candidates: HashMap<_, _> = snapshot
                .enumerate(stream.anchor(), origin)
                .into_iter()
                .map(|candidate| (candidate.participant, candidate))
                .collect();
            for listener in &listeners {
                let qualifies = candidates
                    .get(listener)
                    .and_then(|candidate| relevance.qualify(stream.anchor(), &origin, candidate))
                    .is_some();
                if !qualifies {
                    result
                        .violations
                        .push(format!("{} keeps ineligible listener {}", id, listener));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_soak_passes() {
        let result = SoakHarness::new(SoakConfig::minimal()).run();
        assert!(result.passed(), "{:?}", result.violations);
        assert_eq!(result.ticks, 30);
        assert!(result.events > 0);
    }

    #[test]
    fn test_soak_is_deterministic() {
        let a = SoakHarness::new(SoakConfig::minimal()).run();
        let b = SoakHarness::new(SoakConfig::minimal()).run();
        assert_eq!(a.events, b.events);
        assert_eq!(a.attached, b.attached);
        assert_eq!(a.detached, b.detached);
    }

    #[test]
    fn test_soak_with_replacement() {
        let result = SoakHarness::new(SoakConfig {
            replace_prob: 0.5,
            ..SoakConfig::minimal()
        })
        .run();
        assert!(result.passed(), "{:?}", result.violations);
        assert!(result.streams_created > 8);
    }

    #[test]
    fn test_harness_tears_everything_down() {
        let mut harness = SoakHarness::new(SoakConfig::minimal());
        let result = harness.run();
        assert!(result.passed(), "{:?}", result.violations);
        assert!(harness.registry().is_empty());
    }
}
