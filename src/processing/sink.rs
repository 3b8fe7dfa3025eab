//! Result sink: collects reducer outputs and exposes them in a documented order.

use std::cmp::Ordering;
use std::fmt::Display;
use std::io::Write;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::error::{JobError, JobResult};

/// Order in which a [`ResultSink`] exposes final outputs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputOrder {
    /// Sorted by group key, then by emission order within the reducer invocation.
    ///
    /// Deterministic across runs and pool sizes.
    #[default]
    ByKey,
    /// In the order reducer invocations completed (emission order within an invocation).
    Completion,
}

/// One final output and the key of the group that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkEntry<O> {
    /// Key of the reduced group.
    pub key: String,
    /// Output value.
    pub value: O,
    group: usize,
    seq: usize,
}

/// Thread-safe accumulator used by the reduce stage.
#[derive(Debug)]
pub(crate) struct SinkCollector<O> {
    entries: Mutex<Vec<SinkEntry<O>>>,
}

impl<O> SinkCollector<O> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn push(&self, group: usize, key: &str, values: Vec<O>) {
        if values.is_empty() {
            return;
        }
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.extend(values.into_iter().enumerate().map(|(seq, value)| SinkEntry {
            key: key.to_owned(),
            value,
            group,
            seq,
        }));
    }

    pub(crate) fn finish(self, order: OutputOrder) -> ResultSink<O> {
        let mut entries = self
            .entries
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        if order == OutputOrder::ByKey {
            entries.sort_by_key(|e| (e.group, e.seq));
        }
        ResultSink { entries, order }
    }
}

/// Final outputs of a job.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSink<O> {
    entries: Vec<SinkEntry<O>>,
    order: OutputOrder,
}

impl<O> ResultSink<O> {
    /// Number of final outputs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no reducer emitted anything.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Order the outputs were arranged in when the sink was produced.
    pub fn order(&self) -> OutputOrder {
        self.order
    }

    /// Iterate output values.
    pub fn iter(&self) -> impl Iterator<Item = &O> {
        self.entries.iter().map(|e| &e.value)
    }

    /// Outputs together with their group keys.
    pub fn entries(&self) -> &[SinkEntry<O>] {
        &self.entries
    }

    /// Consume the sink, returning output values in order.
    pub fn into_values(self) -> Vec<O> {
        self.entries.into_iter().map(|e| e.value).collect()
    }

    /// Re-order outputs with a caller-supplied comparator (stable).
    ///
    /// Useful for reports such as "highest count first, ties by key".
    pub fn sort_by<F>(&mut self, mut compare: F)
    where
        F: FnMut(&SinkEntry<O>, &SinkEntry<O>) -> Ordering,
    {
        self.entries.sort_by(|a, b| compare(a, b));
    }

    /// Write one output per line using `Display`.
    pub fn write_lines<W: Write>(&self, mut out: W) -> JobResult<()>
    where
        O: Display,
    {
        for e in &self.entries {
            writeln!(out, "{}", e.value).map_err(output_io)?;
        }
        out.flush().map_err(output_io)
    }

    /// Write one JSON document per line.
    pub fn write_json_lines<W: Write>(&self, mut out: W) -> JobResult<()>
    where
        O: Serialize,
    {
        for e in &self.entries {
            serde_json::to_writer(&mut out, &e.value).map_err(json_error)?;
            out.write_all(b"\n").map_err(output_io)?;
        }
        out.flush().map_err(output_io)
    }

    /// Write outputs as CSV records (no header).
    pub fn write_csv<W: Write>(&self, out: W) -> JobResult<()>
    where
        O: Serialize,
    {
        let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(out);
        for e in &self.entries {
            wtr.serialize(&e.value)?;
        }
        wtr.flush().map_err(output_io)
    }
}

impl<O> IntoIterator for ResultSink<O> {
    type Item = O;
    type IntoIter = std::vec::IntoIter<O>;

    fn into_iter(self) -> Self::IntoIter {
        self.into_values().into_iter()
    }
}

fn output_io(source: std::io::Error) -> JobError {
    JobError::OutputIo(source)
}

fn json_error(source: serde_json::Error) -> JobError {
    if source.is_io() {
        output_io(source.into())
    } else {
        JobError::OutputJson(source)
    }
}
