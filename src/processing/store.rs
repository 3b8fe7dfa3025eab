//! Sharded, thread-safe intermediate store.
//!
//! Mappers running on different workers append into the store concurrently. Keys hash to one
//! of N shards, each guarded by its own mutex, so emissions for unrelated keys rarely contend.
//! Every value is tagged with its [`EmissionId`]; the shuffle stage uses the tags to restore
//! sequential emission order.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::types::EmissionId;

/// A value together with its position in sequential emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tagged<V> {
    pub id: EmissionId,
    pub value: V,
}

type Shard<V> = HashMap<String, Vec<Tagged<V>>>;

/// Accumulates `key -> values` emitted by concurrently running mappers.
#[derive(Debug)]
pub struct IntermediateStore<V> {
    shards: Vec<Mutex<Shard<V>>>,
    emitted: AtomicU64,
}

impl<V> IntermediateStore<V> {
    /// Create a store with `shards` independently locked shards (at least one).
    pub fn new(shards: usize) -> Self {
        let shards = (0..shards.max(1)).map(|_| Mutex::new(HashMap::new())).collect();
        Self {
            shards,
            emitted: AtomicU64::new(0),
        }
    }

    /// Append a single emission.
    pub(crate) fn emit(&self, id: EmissionId, key: String, value: V) {
        let idx = self.shard_of(&key);
        let mut shard = self.shards[idx].lock().unwrap_or_else(PoisonError::into_inner);
        shard.entry(key).or_default().push(Tagged { id, value });
        drop(shard);
        let _ = self.emitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Append every emission of one mapper invocation.
    ///
    /// `pairs` must be in emission order; the n-th pair is tagged
    /// `EmissionId { record, seq: n }`. Each shard is locked at most once.
    pub(crate) fn extend(&self, record: usize, pairs: Vec<(String, V)>) {
        if pairs.is_empty() {
            return;
        }
        let n = pairs.len() as u64;

        let mut buckets: Vec<Vec<(String, Tagged<V>)>> =
            (0..self.shards.len()).map(|_| Vec::new()).collect();
        for (seq, (key, value)) in pairs.into_iter().enumerate() {
            let idx = self.shard_of(&key);
            buckets[idx].push((
                key,
                Tagged {
                    id: EmissionId { record, seq },
                    value,
                },
            ));
        }

        for (idx, bucket) in buckets.into_iter().enumerate() {
            if bucket.is_empty() {
                continue;
            }
            let mut shard = self.shards[idx].lock().unwrap_or_else(PoisonError::into_inner);
            for (key, tagged) in bucket {
                shard.entry(key).or_default().push(tagged);
            }
        }
        let _ = self.emitted.fetch_add(n, Ordering::Relaxed);
    }

    /// Total number of emissions appended so far.
    pub fn total_emissions(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }

    /// Number of distinct keys.
    pub fn key_count(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.lock().unwrap_or_else(PoisonError::into_inner).len())
            .sum()
    }

    /// Number of shards.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Consume the store, yielding each shard's contents.
    pub fn into_shards(self) -> impl Iterator<Item = HashMap<String, Vec<Tagged<V>>>> {
        self.shards
            .into_iter()
            .map(|m| m.into_inner().unwrap_or_else(PoisonError::into_inner))
    }

    fn shard_of(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.shards.len() as u64) as usize
    }
}
