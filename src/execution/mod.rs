//! Job driver and parallel stage execution.
//!
//! This module sits "above" [`crate::processing`] and provides:
//!
//! - The [`Job`] driver and its [`JobState`] lifecycle
//! - Per-stage rayon pools with chunked scheduling ([`StageContext`])
//! - Resource limits / throttling (in-flight chunks, per-invocation timeout)
//! - Real-time metrics + observer hooks for monitoring

mod job;
mod observer;
mod options;
mod semaphore;
mod stage;
mod state;

use std::path::Path;

use crate::error::{JobResult, PluginResult};
use crate::processing::{MapEmitter, ReduceEmitter};
use crate::types::Record;

pub use job::Job;
pub use observer::{JobEvent, JobMetrics, JobMetricsSnapshot, JobObserver, TracingObserver};
pub use options::{default_parallelism, JobOptions};
pub use stage::{Stage, StageContext};
pub use state::JobState;

/// Run a complete job over `source` with default options and return the final outputs.
///
/// `source` may name a file, a directory, or a glob pattern. Outputs are ordered by the key of
/// the group that produced them.
pub fn execute<M, R, V, O>(source: impl AsRef<Path>, mapper: M, reducer: R) -> JobResult<Vec<O>>
where
    V: Send,
    O: Send,
    M: Fn(&Record, &mut MapEmitter<'_, V>) -> PluginResult + Send + Sync,
    R: Fn(&str, Vec<V>, &mut ReduceEmitter<'_, O>) -> PluginResult + Send + Sync,
{
    execute_with_options(source, mapper, reducer, JobOptions::default())
}

/// Like [`execute`], with explicit [`JobOptions`].
pub fn execute_with_options<M, R, V, O>(
    source: impl AsRef<Path>,
    mapper: M,
    reducer: R,
    options: JobOptions,
) -> JobResult<Vec<O>>
where
    V: Send,
    O: Send,
    M: Fn(&Record, &mut MapEmitter<'_, V>) -> PluginResult + Send + Sync,
    R: Fn(&str, Vec<V>, &mut ReduceEmitter<'_, O>) -> PluginResult + Send + Sync,
{
    let sink = Job::new(mapper, reducer).with_options(options).run(source)?;
    Ok(sink.into_values())
}
