use std::fmt;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::error::{JobError, JobResult, PluginResult};
use crate::ingestion;
use crate::processing::{
    group, run_map, run_map_combined, run_reduce, Combiner, MapEmitter, ReduceEmitter, ResultSink,
};
use crate::types::Record;

use super::observer::{JobEvent, JobMetrics, JobObserver};
use super::options::JobOptions;
use super::stage::{Stage, StageContext};
use super::state::JobState;

/// One MapReduce execution: a mapper, a reducer, and the state of a single run.
///
/// The driver is the only component that changes [`JobState`]. It runs the stages strictly
/// in sequence: the map stage (including its barrier) completes before grouping starts, and
/// grouping completes before any reducer runs. A job runs once; calling [`Job::run`] again
/// returns [`JobError::InvalidTransition`].
///
/// ```rust
/// use rust_map_reduce::execution::{Job, JobOptions};
/// use rust_map_reduce::processing::{MapEmitter, ReduceEmitter};
/// use rust_map_reduce::types::Record;
///
/// # fn main() -> Result<(), rust_map_reduce::JobError> {
/// let mut job = Job::new(
///     |r: &Record, e: &mut MapEmitter<'_, u32>| {
///         e.emit(r.text.len().to_string(), 1);
///         Ok(())
///     },
///     |k: &str, v: Vec<u32>, e: &mut ReduceEmitter<'_, String>| {
///         e.emit(format!("{k} chars: {} lines", v.len()));
///         Ok(())
///     },
/// )
/// .with_options(JobOptions::with_workers(2));
///
/// let out = job.run_records(Record::from_lines(["ab", "cd", "e"]))?;
/// assert_eq!(out.into_values(), vec!["1 chars: 1 lines", "2 chars: 2 lines"]);
/// # Ok(())
/// # }
/// ```
pub struct Job<M, R, V, O> {
    mapper: M,
    reducer: R,
    combiner: Option<Arc<Combiner<V>>>,
    options: JobOptions,
    observer: Option<Arc<dyn JobObserver>>,
    metrics: Arc<JobMetrics>,
    state: JobState,
    _values: PhantomData<fn() -> (V, O)>,
}

impl<M, R, V, O> fmt::Debug for Job<M, R, V, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("state", &self.state)
            .field("options", &self.options)
            .field("combiner_set", &self.combiner.is_some())
            .field("observer_set", &self.observer.is_some())
            .finish()
    }
}

impl<M, R, V, O> Job<M, R, V, O>
where
    V: Send,
    O: Send,
    M: Fn(&Record, &mut MapEmitter<'_, V>) -> PluginResult + Send + Sync,
    R: Fn(&str, Vec<V>, &mut ReduceEmitter<'_, O>) -> PluginResult + Send + Sync,
{
    /// Create a job with default options.
    pub fn new(mapper: M, reducer: R) -> Self {
        Self {
            mapper,
            reducer,
            combiner: None,
            options: JobOptions::default(),
            observer: None,
            metrics: Arc::new(JobMetrics::new()),
            state: JobState::Created,
            _values: PhantomData,
        }
    }

    /// Replace the job options.
    pub fn with_options(mut self, options: JobOptions) -> Self {
        self.options = options;
        self
    }

    /// Merge each map chunk's values per key before they are stored.
    ///
    /// The combiner sees the values one chunk emitted for a key, in emission order, and its
    /// output replaces them at the position of the chunk's first emission for that key. The
    /// reducer then receives combined values in chunk order, so a job whose reducer folds its
    /// values (sums, counts, maxima) produces the same output with or without the combiner.
    /// Which values get merged together depends on `chunk_size`, not on the pool size.
    pub fn with_combiner<C>(mut self, combiner: C) -> Self
    where
        C: Fn(&str, Vec<V>) -> Vec<V> + Send + Sync + 'static,
    {
        self.combiner = Some(Arc::new(combiner));
        self
    }

    /// Attach an observer for execution events.
    pub fn with_observer(mut self, observer: Arc<dyn JobObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn options(&self) -> &JobOptions {
        &self.options
    }

    /// Current lifecycle state.
    pub fn state(&self) -> JobState {
        self.state
    }

    /// Handle to real-time execution metrics.
    pub fn metrics(&self) -> Arc<JobMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Read `source` (file, directory, or glob pattern) and run the pipeline over it.
    pub fn run(&mut self, source: impl AsRef<Path>) -> JobResult<ResultSink<O>> {
        let source = source.as_ref();
        self.drive(|| ingestion::read(source))
    }

    /// Run the pipeline over records already in memory.
    pub fn run_records(&mut self, records: Vec<Record>) -> JobResult<ResultSink<O>> {
        self.drive(move || Ok(records))
    }

    fn drive<F>(&mut self, read: F) -> JobResult<ResultSink<O>>
    where
        F: FnOnce() -> JobResult<Vec<Record>>,
    {
        if self.state != JobState::Created {
            return Err(JobError::InvalidTransition {
                from: self.state,
                to: JobState::Reading,
            });
        }
        let result = self.pipeline(read);
        if let Err(e) = &result {
            self.fail(e);
        }
        result
    }

    fn pipeline<F>(&mut self, read: F) -> JobResult<ResultSink<O>>
    where
        F: FnOnce() -> JobResult<Vec<Record>>,
    {
        let start = Instant::now();
        self.options.validate()?;
        debug!(options = ?self.options, "starting job");

        self.advance(JobState::Reading)?;
        let records = read()?;
        self.metrics.on_records_read(records.len());
        self.emit(JobEvent::RecordsRead {
            records: records.len(),
        });

        self.advance(JobState::Mapping)?;
        let map_stage = self.stage(Stage::Map)?;
        let store = match &self.combiner {
            Some(combiner) => run_map_combined(&records, &self.mapper, &**combiner, &map_stage)?,
            None => run_map(&records, &self.mapper, &map_stage)?,
        };
        drop(map_stage);
        drop(records);

        self.advance(JobState::Grouping)?;
        let emitted = store.total_emissions();
        let groups = group(store);
        debug_assert_eq!(
            groups.iter().map(|g| g.len() as u64).sum::<u64>(),
            emitted,
            "grouping lost or duplicated values"
        );
        self.metrics.on_groups_formed(groups.len(), emitted);
        self.emit(JobEvent::GroupsFormed {
            groups: groups.len(),
            values: emitted,
        });

        self.advance(JobState::Reducing)?;
        let reduce_stage = self.stage(Stage::Reduce)?;
        let sink = run_reduce(groups, &self.reducer, &reduce_stage, self.options.output_order)?;

        self.advance(JobState::Done)?;
        let elapsed = start.elapsed();
        self.metrics.end_run(elapsed);
        let metrics = self.metrics.snapshot();
        info!(?elapsed, %metrics, "job finished");
        self.emit(JobEvent::JobFinished { elapsed, metrics });

        Ok(sink)
    }

    fn stage(&self, stage: Stage) -> JobResult<StageContext> {
        Ok(StageContext::new(stage, &self.options)?
            .with_observer(self.observer.clone())
            .with_metrics(Arc::clone(&self.metrics)))
    }

    fn advance(&mut self, next: JobState) -> JobResult<()> {
        let from = self.state;
        if !from.can_transition_to(next) {
            return Err(JobError::InvalidTransition { from, to: next });
        }
        self.state = next;
        debug!(%from, to = %next, "job state changed");
        self.emit(JobEvent::StateChanged { from, to: next });
        Ok(())
    }

    fn fail(&mut self, error: &JobError) {
        let from = self.state;
        if !from.can_transition_to(JobState::Failed) {
            return;
        }
        self.state = JobState::Failed;
        warn!(state = %from, stage = error.stage(), %error, "job failed");
        self.emit(JobEvent::StateChanged {
            from,
            to: JobState::Failed,
        });
        self.emit(JobEvent::JobFailed {
            state: from,
            error: error.to_string(),
        });
    }

    fn emit(&self, event: JobEvent) {
        if let Some(obs) = &self.observer {
            obs.on_event(&event);
        }
    }
}
