//! Pipeline stages.
//!
//! Each stage is a plain function; the [`crate::execution::Job`] driver sequences them and
//! supplies the per-stage [`crate::execution::StageContext`].
//!
//! - [`run_map()`]: invoke the mapper once per record, filling an [`IntermediateStore`];
//!   [`run_map_combined()`] also merges each chunk's values per key first
//! - [`group()`]: consolidate the store into key-sorted [`crate::types::Group`]s
//! - [`run_reduce()`]: invoke the reducer once per group, filling a [`ResultSink`]
//!
//! ## Example: word count, stage by stage
//!
//! ```rust
//! use rust_map_reduce::execution::{JobOptions, Stage, StageContext};
//! use rust_map_reduce::processing::{
//!     group, run_map, run_reduce, MapEmitter, OutputOrder, ReduceEmitter,
//! };
//! use rust_map_reduce::types::Record;
//!
//! # fn main() -> Result<(), rust_map_reduce::JobError> {
//! let records = Record::from_lines(["a b", "b"]);
//! let opts = JobOptions::with_workers(2);
//!
//! let map_stage = StageContext::new(Stage::Map, &opts)?;
//! let store = run_map(&records, &|r: &Record, e: &mut MapEmitter<'_, u32>| {
//!     for w in r.text.split_whitespace() {
//!         e.emit(w, 1);
//!     }
//!     Ok(())
//! }, &map_stage)?;
//!
//! let groups = group(store);
//!
//! let reduce_stage = StageContext::new(Stage::Reduce, &opts)?;
//! let sink = run_reduce(groups, &|k: &str, v: Vec<u32>, e: &mut ReduceEmitter<'_, String>| {
//!     e.emit(format!("{k}:{}", v.iter().sum::<u32>()));
//!     Ok(())
//! }, &reduce_stage, OutputOrder::ByKey)?;
//!
//! assert_eq!(sink.into_values(), vec!["a:1", "b:2"]);
//! # Ok(())
//! # }
//! ```

pub mod emit;
pub mod map;
pub mod reduce;
pub mod shuffle;
pub mod sink;
pub mod store;

pub use emit::{MapEmitter, ReduceEmitter};
pub use map::{run_map, run_map_combined, Combiner};
pub use reduce::run_reduce;
pub use shuffle::group;
pub use sink::{OutputOrder, ResultSink, SinkEntry};
pub use store::IntermediateStore;
