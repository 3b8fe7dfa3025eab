use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{JobError, JobResult};
use crate::processing::OutputOrder;

/// Configuration for a [`super::Job`].
///
/// Every field has a default, so a JSON config file only needs the fields it changes:
///
/// ```json
/// { "map_workers": 8, "chunk_size": 128, "output_order": "completion" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JobOptions {
    /// Worker threads for the map stage.
    ///
    /// If `None`, uses the platform's available parallelism.
    pub map_workers: Option<usize>,
    /// Worker threads for the reduce stage.
    ///
    /// If `None`, uses the platform's available parallelism.
    pub reduce_workers: Option<usize>,
    /// Records (map) or groups (reduce) handed to a worker at a time.
    pub chunk_size: usize,
    /// Upper bound on concurrently executing chunks per stage.
    ///
    /// If `None`, equals the stage's worker count.
    pub max_in_flight_chunks: Option<usize>,
    /// Order of the final outputs.
    pub output_order: OutputOrder,
    /// Fail any single mapper/reducer invocation that runs longer than this.
    ///
    /// Checked when the invocation returns; invocations are not preempted.
    pub invocation_timeout_ms: Option<u64>,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            map_workers: None,
            reduce_workers: None,
            chunk_size: 256,
            max_in_flight_chunks: None,
            output_order: OutputOrder::ByKey,
            invocation_timeout_ms: None,
        }
    }
}

impl JobOptions {
    /// Options with both stages set to `workers` threads.
    pub fn with_workers(workers: usize) -> Self {
        Self {
            map_workers: Some(workers),
            reduce_workers: Some(workers),
            ..Self::default()
        }
    }

    /// Load options from a JSON file.
    pub fn from_json_path(path: impl AsRef<Path>) -> JobResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| JobError::Usage {
            message: format!("cannot read config file '{}': {e}", path.display()),
        })?;
        let options: JobOptions =
            serde_json::from_str(&contents).map_err(|source| JobError::Config {
                path: path.to_path_buf(),
                source,
            })?;
        options.validate()?;
        Ok(options)
    }

    /// Reject zero-sized pools, chunks, and throttles.
    pub fn validate(&self) -> JobResult<()> {
        let invalid = |message: &str| -> JobResult<()> {
            Err(JobError::InvalidOptions {
                message: message.to_string(),
            })
        };
        if self.chunk_size == 0 {
            return invalid("chunk_size must be > 0");
        }
        if self.map_workers == Some(0) {
            return invalid("map_workers must be > 0 when set");
        }
        if self.reduce_workers == Some(0) {
            return invalid("reduce_workers must be > 0 when set");
        }
        if self.max_in_flight_chunks == Some(0) {
            return invalid("max_in_flight_chunks must be > 0 when set");
        }
        if self.invocation_timeout_ms == Some(0) {
            return invalid("invocation_timeout_ms must be > 0 when set");
        }
        Ok(())
    }

    pub(crate) fn invocation_timeout(&self) -> Option<Duration> {
        self.invocation_timeout_ms.map(Duration::from_millis)
    }
}

/// Worker count used when a stage does not configure one.
pub fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
