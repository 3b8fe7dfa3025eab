//! Emit primitives handed to user plug-ins.
//!
//! A mapper receives a [`MapEmitter`] and a reducer a [`ReduceEmitter`]. These are the only
//! engine state user code can touch. Emissions are buffered for the duration of one
//! invocation and handed to the engine only when the invocation succeeds.

use crate::processing::sink::SinkCollector;
use crate::processing::store::IntermediateStore;
use crate::types::EmissionId;

/// Collects the intermediate pairs emitted by one mapper invocation.
pub struct MapEmitter<'a, V> {
    store: &'a IntermediateStore<V>,
    record: usize,
    pending: Vec<(String, V)>,
}

impl<'a, V> MapEmitter<'a, V> {
    pub(crate) fn new(store: &'a IntermediateStore<V>, record: usize) -> Self {
        Self {
            store,
            record,
            pending: Vec::new(),
        }
    }

    /// Emit an intermediate `(key, value)` pair.
    #[doc(alias = "emit_intermediate")]
    pub fn emit(&mut self, key: impl Into<String>, value: V) {
        self.pending.push((key.into(), value));
    }

    /// Number of pairs emitted so far by this invocation.
    pub fn emitted(&self) -> usize {
        self.pending.len()
    }

    /// Hand the buffered pairs to the store. Returns how many were committed.
    pub(crate) fn commit(self) -> usize {
        let n = self.pending.len();
        self.store.extend(self.record, self.pending);
        n
    }

    /// Take the buffered pairs, tagged in emission order, without committing them.
    pub(crate) fn into_tagged(self) -> impl Iterator<Item = (EmissionId, String, V)> {
        let record = self.record;
        self.pending
            .into_iter()
            .enumerate()
            .map(move |(seq, (key, value))| (EmissionId { record, seq }, key, value))
    }
}

/// Collects the final outputs emitted by one reducer invocation.
pub struct ReduceEmitter<'a, O> {
    sink: &'a SinkCollector<O>,
    group: usize,
    key: &'a str,
    pending: Vec<O>,
}

impl<'a, O> ReduceEmitter<'a, O> {
    pub(crate) fn new(sink: &'a SinkCollector<O>, group: usize, key: &'a str) -> Self {
        Self {
            sink,
            group,
            key,
            pending: Vec::new(),
        }
    }

    /// Emit a final output value.
    pub fn emit(&mut self, value: O) {
        self.pending.push(value);
    }

    /// Number of outputs emitted so far by this invocation.
    pub fn emitted(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn commit(self) -> usize {
        let n = self.pending.len();
        self.sink.push(self.group, self.key, self.pending);
        n
    }
}
