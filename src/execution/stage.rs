//! Per-stage worker pool and chunk scheduler.
//!
//! A [`StageContext`] owns the rayon pool for one stage (map or reduce). Its chunk runner
//! splits the work into fixed-size chunks, throttles how many run at once, and stops handing
//! out invocations as soon as one of them fails. It returns only after every worker has
//! joined, which is the stage barrier.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{InvocationError, JobError, JobResult, PluginError, PluginResult};

use super::observer::{JobEvent, JobMetrics, JobObserver};
use super::options::{default_parallelism, JobOptions};
use super::semaphore::Semaphore;

/// Pipeline stage that runs user code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Map,
    Reduce,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Map => f.write_str("map"),
            Stage::Reduce => f.write_str("reduce"),
        }
    }
}

/// Worker pool, throttle, and hooks for one stage.
pub struct StageContext {
    stage: Stage,
    pool: ThreadPool,
    workers: usize,
    chunk_size: usize,
    max_in_flight_chunks: usize,
    invocation_timeout: Option<Duration>,
    observer: Option<Arc<dyn JobObserver>>,
    metrics: Arc<JobMetrics>,
}

impl fmt::Debug for StageContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageContext")
            .field("stage", &self.stage)
            .field("workers", &self.workers)
            .field("chunk_size", &self.chunk_size)
            .field("max_in_flight_chunks", &self.max_in_flight_chunks)
            .field("invocation_timeout", &self.invocation_timeout)
            .field("observer_set", &self.observer.is_some())
            .finish()
    }
}

impl StageContext {
    /// Build the pool for `stage` from `options`.
    pub fn new(stage: Stage, options: &JobOptions) -> JobResult<Self> {
        options.validate()?;
        let configured = match stage {
            Stage::Map => options.map_workers,
            Stage::Reduce => options.reduce_workers,
        };
        let workers = configured.unwrap_or_else(default_parallelism).max(1);

        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(move |i| format!("{stage}-worker-{i}"))
            .build()?;

        Ok(Self {
            stage,
            pool,
            workers,
            chunk_size: options.chunk_size,
            max_in_flight_chunks: options.max_in_flight_chunks.unwrap_or(workers),
            invocation_timeout: options.invocation_timeout(),
            observer: None,
            metrics: Arc::new(JobMetrics::new()),
        })
    }

    /// Attach an observer for stage events.
    pub fn with_observer(mut self, observer: Option<Arc<dyn JobObserver>>) -> Self {
        self.observer = observer;
        self
    }

    /// Report into an existing metrics handle instead of a private one.
    pub fn with_metrics(mut self, metrics: Arc<JobMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Number of worker threads in the pool.
    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn metrics(&self) -> &JobMetrics {
        &self.metrics
    }

    pub(crate) fn emit(&self, event: JobEvent) {
        if let Some(obs) = &self.observer {
            obs.on_event(&event);
        }
    }

    /// Run `invoke(index, item)` once per item on the stage pool.
    ///
    /// `invoke` returns how many values the invocation emitted. The first failure cancels
    /// the stage: no new invocations start, in-flight ones finish, and that failure is
    /// returned once all workers have joined.
    pub(crate) fn run_chunks<T, F>(&self, items: Vec<T>, invoke: F) -> JobResult<()>
    where
        T: Send,
        F: Fn(usize, T) -> JobResult<usize> + Sync,
    {
        self.run_chunks_with(items, || (), |_, idx, item| invoke(idx, item), |_| Ok(()))
    }

    /// Like [`StageContext::run_chunks`], with per-chunk state.
    ///
    /// Each chunk starts from `init()`, threads that state through its invocations, and hands
    /// it to `finish` once every invocation in the chunk succeeded. A chunk cut short by a
    /// failure or cancellation is never finished.
    pub(crate) fn run_chunks_with<T, S, I, F, D>(
        &self,
        items: Vec<T>,
        init: I,
        invoke: F,
        finish: D,
    ) -> JobResult<()>
    where
        T: Send,
        I: Fn() -> S + Sync,
        F: Fn(&mut S, usize, T) -> JobResult<usize> + Sync,
        D: Fn(S) -> JobResult<()> + Sync,
    {
        let start = Instant::now();
        let cancelled = AtomicBool::new(false);
        let failure: Mutex<Option<JobError>> = Mutex::new(None);
        let sem = Semaphore::new(self.max_in_flight_chunks);
        let chunks = into_chunks(items, self.chunk_size);

        let record_failure = |e: JobError| {
            cancelled.store(true, Ordering::Release);
            let mut slot = failure.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.is_none() {
                *slot = Some(e);
            }
        };

        self.pool.install(|| {
            chunks.into_par_iter().for_each(|chunk| {
                if cancelled.load(Ordering::Acquire) {
                    return;
                }
                let (_permit, waited) = sem.acquire();
                if waited > Duration::ZERO {
                    self.metrics.on_throttle_wait(waited);
                    self.emit(JobEvent::ThrottleWaited {
                        stage: self.stage,
                        duration: waited,
                    });
                }

                self.metrics.on_chunk_start();
                self.emit(JobEvent::ChunkStarted {
                    stage: self.stage,
                    start: chunk.first().map(|(i, _)| *i).unwrap_or(0),
                    len: chunk.len(),
                });

                let mut state = init();
                let mut emitted = 0usize;
                let mut complete = true;
                for (idx, item) in chunk {
                    if cancelled.load(Ordering::Acquire) {
                        complete = false;
                        break;
                    }
                    match invoke(&mut state, idx, item) {
                        Ok(n) => {
                            self.metrics.on_invocation(self.stage, n);
                            emitted += n;
                        }
                        Err(e) => {
                            record_failure(e);
                            complete = false;
                            break;
                        }
                    }
                }
                if complete {
                    if let Err(e) = finish(state) {
                        record_failure(e);
                    }
                }

                self.emit(JobEvent::ChunkFinished {
                    stage: self.stage,
                    emitted,
                });
                self.metrics.on_chunk_end();
            })
        });

        self.emit(JobEvent::StageFinished {
            stage: self.stage,
            elapsed: start.elapsed(),
        });

        match failure.into_inner().unwrap_or_else(PoisonError::into_inner) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Call a plug-in, converting panics and timeout overruns into errors.
    pub(crate) fn guarded<F>(&self, call: F) -> PluginResult
    where
        F: FnOnce() -> PluginResult,
    {
        let start = Instant::now();
        match panic::catch_unwind(AssertUnwindSafe(call)) {
            Ok(result) => result?,
            Err(payload) => {
                return Err(Box::new(InvocationError::Panicked {
                    message: panic_message(payload.as_ref()),
                }) as PluginError);
            }
        }
        if let Some(limit) = self.invocation_timeout {
            let elapsed = start.elapsed();
            if elapsed > limit {
                return Err(Box::new(InvocationError::TimedOut { elapsed, limit }));
            }
        }
        Ok(())
    }
}

fn into_chunks<T>(items: Vec<T>, chunk_size: usize) -> Vec<Vec<(usize, T)>> {
    let chunk_size = chunk_size.max(1);
    let mut out = Vec::with_capacity(items.len().div_ceil(chunk_size));
    let mut current = Vec::with_capacity(chunk_size.min(items.len()));
    for item in items.into_iter().enumerate() {
        current.push(item);
        if current.len() == chunk_size {
            out.push(std::mem::replace(&mut current, Vec::with_capacity(chunk_size)));
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::{into_chunks, Stage, StageContext};
    use crate::error::{InvocationError, JobError};
    use crate::execution::{JobEvent, JobObserver, JobOptions};

    fn options(workers: usize, chunk_size: usize, in_flight: Option<usize>) -> JobOptions {
        JobOptions {
            chunk_size,
            max_in_flight_chunks: in_flight,
            ..JobOptions::with_workers(workers)
        }
    }

    #[test]
    fn into_chunks_keeps_global_indices() {
        let chunks = into_chunks(vec!['a', 'b', 'c', 'd', 'e'], 2);
        assert_eq!(
            chunks,
            vec![
                vec![(0, 'a'), (1, 'b')],
                vec![(2, 'c'), (3, 'd')],
                vec![(4, 'e')],
            ]
        );
        assert!(into_chunks(Vec::<u8>::new(), 3).is_empty());
    }

    #[test]
    fn runs_every_item_exactly_once() {
        let ctx = StageContext::new(Stage::Map, &options(4, 3, None)).unwrap();
        let seen: Vec<AtomicUsize> = (0..100).map(|_| AtomicUsize::new(0)).collect();

        ctx.run_chunks((0..100).collect(), |idx, item: usize| {
            assert_eq!(idx, item);
            seen[item].fetch_add(1, Ordering::SeqCst);
            Ok(1)
        })
        .unwrap();

        assert!(seen.iter().all(|c| c.load(Ordering::SeqCst) == 1));
        let snap = ctx.metrics().snapshot();
        assert_eq!(snap.map_invocations, 100);
        assert_eq!(snap.intermediate_emitted, 100);
        assert_eq!(snap.chunks_started, 34);
        assert_eq!(snap.chunks_finished, 34);
    }

    #[test]
    fn runs_with_concurrency() {
        let ctx = StageContext::new(Stage::Map, &options(4, 1, None)).unwrap();
        let active = AtomicUsize::new(0);
        let max_active = AtomicUsize::new(0);

        ctx.run_chunks((0..200).collect(), |_, _: i32| {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            max_active.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(2));
            active.fetch_sub(1, Ordering::SeqCst);
            Ok(0)
        })
        .unwrap();

        assert!(max_active.load(Ordering::SeqCst) > 1);
    }

    struct ConcurrencyObserver {
        active_chunks: AtomicUsize,
        max_active_chunks: AtomicUsize,
    }

    impl JobObserver for ConcurrencyObserver {
        fn on_event(&self, event: &JobEvent) {
            match event {
                JobEvent::ChunkStarted { .. } => {
                    let now = self.active_chunks.fetch_add(1, Ordering::SeqCst) + 1;
                    self.max_active_chunks.fetch_max(now, Ordering::SeqCst);
                }
                JobEvent::ChunkFinished { .. } => {
                    self.active_chunks.fetch_sub(1, Ordering::SeqCst);
                }
                _ => {}
            }
        }
    }

    #[test]
    fn max_in_flight_chunks_throttles_chunk_concurrency() {
        let observer = Arc::new(ConcurrencyObserver {
            active_chunks: AtomicUsize::new(0),
            max_active_chunks: AtomicUsize::new(0),
        });
        let obs: Arc<dyn JobObserver> = observer.clone();
        let ctx = StageContext::new(Stage::Reduce, &options(4, 1, Some(1)))
            .unwrap()
            .with_observer(Some(obs));

        ctx.run_chunks((0..50).collect(), |_, _: u8| {
            std::thread::sleep(Duration::from_millis(1));
            Ok(0)
        })
        .unwrap();

        assert_eq!(observer.max_active_chunks.load(Ordering::SeqCst), 1);
        let snap = ctx.metrics().snapshot();
        assert_eq!(snap.max_active_chunks, 1);
        assert!(snap.throttle_wait > Duration::ZERO);
    }

    #[test]
    fn failure_stops_scheduling_new_invocations() {
        let ctx = StageContext::new(Stage::Map, &options(1, 1, None)).unwrap();
        let calls = AtomicUsize::new(0);

        let err = ctx
            .run_chunks((0..1_000).collect(), |idx, _: u32| {
                calls.fetch_add(1, Ordering::SeqCst);
                if idx == 10 {
                    return Err(JobError::Reducer {
                        key: "k".to_string(),
                        source: "boom".into(),
                    });
                }
                Ok(0)
            })
            .unwrap_err();

        assert!(matches!(err, JobError::Reducer { .. }));
        // Single worker: everything after the failing item is skipped.
        assert_eq!(calls.load(Ordering::SeqCst), 11);
    }

    #[test]
    fn guarded_converts_panics() {
        let ctx = StageContext::new(Stage::Map, &options(1, 1, None)).unwrap();
        let err = ctx.guarded(|| panic!("bad record")).unwrap_err();
        let inner = err.downcast_ref::<InvocationError>().unwrap();
        assert!(matches!(inner, InvocationError::Panicked { message } if message == "bad record"));
    }

    #[test]
    fn guarded_enforces_timeout_after_return() {
        let opts = JobOptions {
            invocation_timeout_ms: Some(1),
            ..options(1, 1, None)
        };
        let ctx = StageContext::new(Stage::Reduce, &opts).unwrap();
        let err = ctx
            .guarded(|| {
                std::thread::sleep(Duration::from_millis(20));
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<InvocationError>(),
            Some(InvocationError::TimedOut { .. })
        ));
        assert!(ctx.guarded(|| Ok(())).is_ok());
    }

    #[test]
    fn chunk_state_is_finished_once_per_complete_chunk() {
        let ctx = StageContext::new(Stage::Map, &options(3, 4, None)).unwrap();
        let sums = std::sync::Mutex::new(Vec::new());

        ctx.run_chunks_with(
            (1..=10).collect(),
            || 0usize,
            |acc, _, item: usize| {
                *acc += item;
                Ok(1)
            },
            |acc| {
                sums.lock().unwrap().push(acc);
                Ok(())
            },
        )
        .unwrap();

        let mut sums = sums.into_inner().unwrap();
        sums.sort();
        assert_eq!(sums, vec![10, 19, 26]);
    }

    #[test]
    fn failing_chunk_is_not_finished() {
        let ctx = StageContext::new(Stage::Map, &options(1, 10, None)).unwrap();
        let finished = AtomicUsize::new(0);

        let err = ctx
            .run_chunks_with(
                (0..5).collect(),
                || (),
                |_, idx, _: usize| {
                    if idx == 2 {
                        Err(JobError::Usage {
                            message: "stop".to_string(),
                        })
                    } else {
                        Ok(0)
                    }
                },
                |_| {
                    finished.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                },
            )
            .unwrap_err();

        assert!(matches!(err, JobError::Usage { .. }));
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn invalid_options_are_rejected() {
        let opts = JobOptions {
            chunk_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            StageContext::new(Stage::Map, &opts).unwrap_err(),
            JobError::InvalidOptions { .. }
        ));
    }
}
