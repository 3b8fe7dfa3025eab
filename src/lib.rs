//! `rust-map-reduce` is a single-node MapReduce engine.
//!
//! A job reads line records from a file, a directory, or a glob pattern, invokes a user mapper
//! once per record, groups the emitted intermediate pairs by key, and invokes a user reducer
//! once per group. Map and reduce invocations run in parallel on per-stage rayon pools, but the
//! result never depends on scheduling: groups are ordered by key, values inside a group are in
//! sequential emission order, and outputs are returned in key order.
//!
//! The primary entrypoints are [`execute`] for one-shot runs and [`Job`] when you need options,
//! an observer, or metrics.
//!
//! ## Quick example: word count
//!
//! ```rust
//! use rust_map_reduce::{Job, JobOptions};
//! use rust_map_reduce::processing::{MapEmitter, ReduceEmitter};
//! use rust_map_reduce::types::Record;
//!
//! # fn main() -> Result<(), rust_map_reduce::JobError> {
//! let mut job = Job::new(
//!     |record: &Record, emit: &mut MapEmitter<'_, u64>| {
//!         for word in record.text.split_whitespace() {
//!             emit.emit(word, 1);
//!         }
//!         Ok(())
//!     },
//!     |word: &str, counts: Vec<u64>, emit: &mut ReduceEmitter<'_, String>| {
//!         emit.emit(format!("{word} {}", counts.iter().sum::<u64>()));
//!         Ok(())
//!     },
//! )
//! .with_options(JobOptions::with_workers(4));
//!
//! let out = job.run_records(Record::from_lines(["the cat", "the dog"]))?;
//! assert_eq!(out.into_values(), vec!["cat 1", "dog 1", "the 2"]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Running over files
//!
//! ```no_run
//! use rust_map_reduce::execute;
//! use rust_map_reduce::jobs::item_pairs;
//!
//! # fn main() -> Result<(), rust_map_reduce::JobError> {
//! let reducer = item_pairs::reducer(item_pairs::DEFAULT_THRESHOLD);
//! let pairs = execute("baskets/*.txt", item_pairs::mapper, reducer)?;
//! for pair in pairs {
//!     println!("{pair}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`ingestion`]: input sources and line records
//! - [`processing`]: map, shuffle, and reduce stages plus the emitters and result sink
//! - [`execution`]: the job driver, options, stage pools, metrics, and observer hooks
//! - [`jobs`]: bundled plug-ins

pub mod error;
pub mod execution;
pub mod ingestion;
pub mod jobs;
pub mod processing;
pub mod types;

pub use error::{InvocationError, JobError, JobResult, PluginError, PluginResult};
pub use execution::{execute, execute_with_options, Job, JobOptions};
