use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::execution::JobState;
use crate::types::Record;

/// Convenience result type for job operations.
pub type JobResult<T> = Result<T, JobError>;

/// Error type user mappers and reducers return to the engine.
pub type PluginError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Return type of a single mapper or reducer invocation.
pub type PluginResult = Result<(), PluginError>;

/// Error type returned by the engine.
///
/// Every variant aborts the whole job: the engine never returns partial output and never
/// retries. Use [`JobError::exit_code`] to map an error class to a process exit code.
#[derive(Debug, Error)]
pub enum JobError {
    /// Malformed invocation (e.g. wrong argument count).
    #[error("usage error: {message}")]
    Usage { message: String },

    /// [`crate::execution::JobOptions`] failed validation.
    #[error("invalid options: {message}")]
    InvalidOptions { message: String },

    /// A JSON options file could not be parsed.
    #[error("invalid config file '{}': {source}", path.display())]
    Config {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// The input identifier looked like a glob pattern but could not be parsed as one.
    #[error("invalid input pattern '{pattern}': {message}")]
    InvalidSource { pattern: String, message: String },

    /// The job driver was asked to make a transition its state machine does not allow.
    #[error("invalid job state transition {from} -> {to}")]
    InvalidTransition { from: JobState, to: JobState },

    /// The input source does not exist (or a pattern matched no files).
    #[error("input not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// The input source exists but could not be opened or read.
    #[error("io error reading '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Writing final output failed.
    #[error("output stage failed writing results: {0}")]
    OutputIo(#[source] std::io::Error),

    /// Writing CSV output failed.
    #[error("csv output error: {0}")]
    Output(#[from] csv::Error),

    /// Writing JSON output failed.
    #[error("json output error: {0}")]
    OutputJson(#[source] serde_json::Error),

    /// A stage worker pool could not be created.
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// A mapper invocation failed; carries the offending record.
    #[error("map stage failed on record {record}: {source}")]
    Mapper { record: Record, source: PluginError },

    /// A combiner invocation failed; carries the key it was combining.
    #[error("map stage failed combining key '{key}': {source}")]
    Combiner { key: String, source: PluginError },

    /// A reducer invocation failed; carries the offending key.
    #[error("reduce stage failed on key '{key}': {source}")]
    Reducer { key: String, source: PluginError },
}

impl JobError {
    /// Process exit code for this error class.
    ///
    /// - `1`: usage / configuration errors
    /// - `2`: input not found
    /// - `3`: I/O errors (input, output, OS resources)
    /// - `4`: mapper errors
    /// - `5`: reducer errors
    pub fn exit_code(&self) -> i32 {
        match self {
            JobError::Usage { .. }
            | JobError::InvalidOptions { .. }
            | JobError::Config { .. }
            | JobError::InvalidSource { .. }
            | JobError::InvalidTransition { .. } => 1,
            JobError::NotFound { .. } => 2,
            JobError::Io { .. }
            | JobError::OutputIo(_)
            | JobError::Output(_)
            | JobError::OutputJson(_)
            | JobError::ThreadPool(_) => 3,
            JobError::Mapper { .. } | JobError::Combiner { .. } => 4,
            JobError::Reducer { .. } => 5,
        }
    }

    /// Name of the pipeline stage the error originated in.
    pub fn stage(&self) -> &'static str {
        match self {
            JobError::Usage { .. }
            | JobError::InvalidOptions { .. }
            | JobError::Config { .. }
            | JobError::InvalidTransition { .. }
            | JobError::ThreadPool(_) => "setup",
            JobError::InvalidSource { .. }
            | JobError::NotFound { .. }
            | JobError::Io { .. } => "read",
            JobError::Mapper { .. } | JobError::Combiner { .. } => "map",
            JobError::Reducer { .. } => "reduce",
            JobError::OutputIo(_) | JobError::Output(_) | JobError::OutputJson(_) => "output",
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            JobError::NotFound { path }
        } else {
            JobError::Io { path, source }
        }
    }
}

/// Failure raised by the engine itself around a plug-in invocation.
///
/// Reported as the `source` of [`JobError::Mapper`] / [`JobError::Reducer`].
#[derive(Debug, Error)]
pub enum InvocationError {
    /// The plug-in panicked.
    #[error("invocation panicked: {message}")]
    Panicked { message: String },

    /// The plug-in returned, but took longer than the configured invocation timeout.
    #[error("invocation took {elapsed:?}, exceeding the {limit:?} timeout")]
    TimedOut { elapsed: Duration, limit: Duration },
}
