use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use tracing::{debug, trace};

use super::stage::Stage;
use super::state::JobState;

/// Execution events emitted by the job driver and stage schedulers.
#[derive(Debug, Clone)]
pub enum JobEvent {
    StateChanged { from: JobState, to: JobState },
    RecordsRead { records: usize },
    ThrottleWaited { stage: Stage, duration: Duration },
    ChunkStarted { stage: Stage, start: usize, len: usize },
    ChunkFinished { stage: Stage, emitted: usize },
    StageFinished { stage: Stage, elapsed: Duration },
    GroupsFormed { groups: usize, values: u64 },
    JobFinished {
        elapsed: Duration,
        metrics: JobMetricsSnapshot,
    },
    JobFailed { state: JobState, error: String },
}

/// Observer hook for job events.
///
/// Called from worker threads; implementations must be cheap and thread-safe.
pub trait JobObserver: Send + Sync {
    fn on_event(&self, event: &JobEvent);
}

/// Forwards stage-level job events to `tracing`.
///
/// Chunk-level events go out at `trace`, stage-level events at `debug`. State changes and job
/// outcomes are already logged by the driver, so they are skipped here.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl JobObserver for TracingObserver {
    fn on_event(&self, event: &JobEvent) {
        match event {
            JobEvent::RecordsRead { records } => debug!(records, "input read"),
            JobEvent::ThrottleWaited { stage, duration } => {
                trace!(%stage, ?duration, "waited for in-flight chunk permit")
            }
            JobEvent::ChunkStarted { stage, start, len } => {
                trace!(%stage, start, len, "chunk started")
            }
            JobEvent::ChunkFinished { stage, emitted } => {
                trace!(%stage, emitted, "chunk finished")
            }
            JobEvent::StageFinished { stage, elapsed } => {
                debug!(%stage, ?elapsed, "stage finished")
            }
            JobEvent::GroupsFormed { groups, values } => debug!(groups, values, "groups formed"),
            JobEvent::StateChanged { .. }
            | JobEvent::JobFinished { .. }
            | JobEvent::JobFailed { .. } => {}
        }
    }
}

/// Real-time counters for a job run.
///
/// The engine updates these during execution; callers can snapshot them at any time.
#[derive(Debug, Default)]
pub struct JobMetrics {
    records_read: AtomicU64,
    map_invocations: AtomicU64,
    intermediate_emitted: AtomicU64,
    intermediate_stored: AtomicU64,
    groups: AtomicU64,
    reduce_invocations: AtomicU64,
    outputs_emitted: AtomicU64,

    chunks_started: AtomicU64,
    chunks_finished: AtomicU64,
    throttle_wait_ns: AtomicU64,
    active_chunks: AtomicUsize,
    max_active_chunks: AtomicUsize,

    elapsed_ns: AtomicU64,
}

impl JobMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_records_read(&self, n: usize) {
        self.records_read.store(n as u64, Ordering::SeqCst);
    }

    pub fn on_invocation(&self, stage: Stage, emitted: usize) {
        match stage {
            Stage::Map => {
                let _ = self.map_invocations.fetch_add(1, Ordering::SeqCst);
                let _ = self
                    .intermediate_emitted
                    .fetch_add(emitted as u64, Ordering::SeqCst);
            }
            Stage::Reduce => {
                let _ = self.reduce_invocations.fetch_add(1, Ordering::SeqCst);
                let _ = self
                    .outputs_emitted
                    .fetch_add(emitted as u64, Ordering::SeqCst);
            }
        }
    }

    /// `stored` is the number of grouped values; it is below the emitted count when a
    /// combiner ran.
    pub fn on_groups_formed(&self, groups: usize, stored: u64) {
        self.groups.store(groups as u64, Ordering::SeqCst);
        self.intermediate_stored.store(stored, Ordering::SeqCst);
    }

    pub fn on_chunk_start(&self) {
        let _ = self.chunks_started.fetch_add(1, Ordering::SeqCst);
        let now = self.active_chunks.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = self.max_active_chunks.fetch_max(now, Ordering::SeqCst);
    }

    pub fn on_chunk_end(&self) {
        let _ = self.chunks_finished.fetch_add(1, Ordering::SeqCst);
        let _ = self.active_chunks.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn on_throttle_wait(&self, d: Duration) {
        let add = d.as_nanos().min(u64::MAX as u128) as u64;
        let _ = self.throttle_wait_ns.fetch_add(add, Ordering::SeqCst);
    }

    pub fn end_run(&self, elapsed: Duration) {
        self.elapsed_ns
            .store(elapsed.as_nanos().min(u64::MAX as u128) as u64, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> JobMetricsSnapshot {
        let elapsed_ns = self.elapsed_ns.load(Ordering::SeqCst);
        JobMetricsSnapshot {
            records_read: self.records_read.load(Ordering::SeqCst),
            map_invocations: self.map_invocations.load(Ordering::SeqCst),
            intermediate_emitted: self.intermediate_emitted.load(Ordering::SeqCst),
            intermediate_stored: self.intermediate_stored.load(Ordering::SeqCst),
            groups: self.groups.load(Ordering::SeqCst),
            reduce_invocations: self.reduce_invocations.load(Ordering::SeqCst),
            outputs_emitted: self.outputs_emitted.load(Ordering::SeqCst),
            chunks_started: self.chunks_started.load(Ordering::SeqCst),
            chunks_finished: self.chunks_finished.load(Ordering::SeqCst),
            throttle_wait: Duration::from_nanos(self.throttle_wait_ns.load(Ordering::SeqCst)),
            max_active_chunks: self.max_active_chunks.load(Ordering::SeqCst),
            elapsed: (elapsed_ns > 0).then(|| Duration::from_nanos(elapsed_ns)),
        }
    }
}

/// Immutable snapshot of [`JobMetrics`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobMetricsSnapshot {
    pub records_read: u64,
    pub map_invocations: u64,
    pub intermediate_emitted: u64,
    pub intermediate_stored: u64,
    pub groups: u64,
    pub reduce_invocations: u64,
    pub outputs_emitted: u64,
    pub chunks_started: u64,
    pub chunks_finished: u64,
    pub throttle_wait: Duration,
    pub max_active_chunks: usize,
    pub elapsed: Option<Duration>,
}

impl fmt::Display for JobMetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "records={}, map_calls={}, emitted={}, stored={}, groups={}, reduce_calls={}, \
             outputs={}, chunks={}/{}, max_active_chunks={}, throttle_wait={:?}, elapsed={:?}",
            self.records_read,
            self.map_invocations,
            self.intermediate_emitted,
            self.intermediate_stored,
            self.groups,
            self.reduce_invocations,
            self.outputs_emitted,
            self.chunks_finished,
            self.chunks_started,
            self.max_active_chunks,
            self.throttle_wait,
            self.elapsed
        )
    }
}
