//! Reconciliation scheduler
//!
//! Once per tick every schedulable stream runs one cycle against the same
//! world snapshot. Large passes are split into chunks on the blocking pool;
//! each stream still sees at most one cycle at a time because cycles take
//! the stream's own lock.

use std::sync::Arc;
use std::time::{Duration, Instant};

use earshot_membership::{CandidateSource, CycleOutcome, ProtocolEmitter};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use crate::{RuntimeConfig, StreamHandle, StreamRegistry};

/// What one tick did
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Streams that ran a full cycle
    pub reconciled: u64,
    /// Streams whose cycle was a no-op (unresolved anchor, not scheduled)
    pub skipped: u64,
    pub attached: u64,
    pub detached: u64,
    pub duration: Duration,
}

impl TickReport {
    fn record(&mut self, outcome: &CycleOutcome) {
        match outcome {
            CycleOutcome::Skipped(_) => self.skipped += 1,
            CycleOutcome::Reconciled(delta) => {
                self.reconciled += 1;
                self.attached += delta.added.len() as u64;
                self.detached += delta.removed.len() as u64;
            }
        }
    }

    fn merge(&mut self, other: TickReport) {
        self.reconciled += other.reconciled;
        self.skipped += other.skipped;
        self.attached += other.attached;
        self.detached += other.detached;
    }

    /// Whether any membership changed
    pub fn changed(&self) -> bool {
        self.attached > 0 || self.detached > 0
    }
}

/// Totals since the scheduler started
#[derive(Clone, Debug, Default)]
pub struct RuntimeStats {
    pub ticks: u64,
    pub cycles_reconciled: u64,
    pub cycles_skipped: u64,
    pub listeners_attached: u64,
    pub listeners_detached: u64,
    pub worker_failures: u64,
    pub last_tick_duration: Duration,
}

/// Supplies the world snapshot for each tick
pub trait SnapshotProvider: Send + Sync {
    fn snapshot(&self) -> Arc<dyn CandidateSource>;
}

impl<F> SnapshotProvider for F
where
    F: Fn() -> Arc<dyn CandidateSource> + Send + Sync,
{
    fn snapshot(&self) -> Arc<dyn CandidateSource> {
        self()
    }
}

/// Drives periodic reconciliation of every dynamic stream
pub struct ReconciliationScheduler {
    registry: Arc<StreamRegistry>,
    config: RuntimeConfig,
    stats: Mutex<RuntimeStats>,
}

impl ReconciliationScheduler {
    pub fn new(registry: Arc<StreamRegistry>, config: RuntimeConfig) -> Self {
        ReconciliationScheduler {
            registry,
            config,
            stats: Mutex::new(RuntimeStats::default()),
        }
    }

    pub fn registry(&self) -> &Arc<StreamRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn stats(&self) -> RuntimeStats {
        self.stats.lock().clone()
    }

    /// Run one tick on the calling thread
    pub fn tick(&self, source: &dyn CandidateSource) -> TickReport {
        self.tick_handles(&self.registry.scheduled(), source)
    }

    fn tick_handles(&self, handles: &[Arc<StreamHandle>], source: &dyn CandidateSource) -> TickReport {
        let start = Instant::now();
        let mut report = run_chunk(handles, source, self.registry.emitter().as_ref());
        report.duration = start.elapsed();
        self.finish(&report, 0);
        report
    }

    /// Run one tick, splitting large passes across blocking workers
    pub async fn tick_parallel(&self, source: Arc<dyn CandidateSource>) -> TickReport {
        let handles = self.registry.scheduled();
        let workers = self.config.workers.max(1);
        if workers == 1 || handles.is_empty() || handles.len() < self.config.parallel_threshold {
            return self.tick_handles(&handles, source.as_ref());
        }

        let start = Instant::now();
        let chunk_size = handles.len().div_ceil(workers);
        let tasks: Vec<JoinHandle<TickReport>> = handles
            .chunks(chunk_size)
            .map(|chunk| {
                let chunk = chunk.to_vec();
                let source = Arc::clone(&source);
                let emitter = Arc::clone(self.registry.emitter());
                tokio::task::spawn_blocking(move || {
                    run_chunk(&chunk, source.as_ref(), emitter.as_ref())
                })
            })
            .collect();

        let mut report = TickReport::default();
        let mut failures = 0;
        for task in tasks {
            match task.await {
                Ok(partial) => report.merge(partial),
                Err(e) => {
                    failures += 1;
                    warn!(error = %e, "reconciliation worker failed");
                }
            }
        }

        report.duration = start.elapsed();
        self.finish(&report, failures);
        report
    }

    /// Tick at `tick_interval` until `shutdown` flips to true or its sender drops
    pub async fn run<P: SnapshotProvider>(&self, provider: P, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.config.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval = ?self.config.tick_interval, workers = self.config.workers, "reconciliation started");

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    let stop = changed.is_err() || *shutdown.borrow();
                    if stop {
                        break;
                    }
                }
                _ = interval.tick() => {
                    let report = self.tick_parallel(provider.snapshot()).await;
                    if report.duration > self.config.tick_interval {
                        debug!(duration = ?report.duration, streams = report.reconciled, "tick overran interval");
                    }
                }
            }
        }

        info!(ticks = self.stats.lock().ticks, "reconciliation stopped");
    }

    /// Spawn [`run`](Self::run) on the current runtime
    pub fn spawn<P>(self: Arc<Self>, provider: P, shutdown: watch::Receiver<bool>) -> JoinHandle<()>
    where
        P: SnapshotProvider + 'static,
    {
        tokio::spawn(async move { self.run(provider, shutdown).await })
    }

    fn finish(&self, report: &TickReport, failures: u64) {
        let mut stats = self.stats.lock();
        stats.ticks += 1;
        stats.cycles_reconciled += report.reconciled;
        stats.cycles_skipped += report.skipped;
        stats.listeners_attached += report.attached;
        stats.listeners_detached += report.detached;
        stats.worker_failures += failures;
        stats.last_tick_duration = report.duration;

        trace!(
            tick = stats.ticks,
            reconciled = report.reconciled,
            attached = report.attached,
            detached = report.detached,
            "tick complete"
        );
    }
}

fn run_chunk(
    handles: &[Arc<StreamHandle>],
    source: &dyn CandidateSource,
    emitter: &dyn ProtocolEmitter,
) -> TickReport {
    let mut report = TickReport::default();
    for handle in handles {
        if let Some(outcome) = handle.reconcile(source, emitter) {
            report.record(&outcome);
        }
    }
    report
}
