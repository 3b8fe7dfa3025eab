//! Map stage scheduler.
//!
//! With a combiner, each map chunk buffers its emissions and hands them to the combiner once
//! per key before anything reaches the store. The combined values for a key take the place of
//! that chunk's first emission for the key, so a group's values stay in sequential chunk
//! order. Chunk boundaries depend only on `chunk_size`, never on the pool size.

use std::collections::HashMap;

use crate::error::{JobError, JobResult, PluginResult};
use crate::execution::StageContext;
use crate::processing::emit::MapEmitter;
use crate::processing::store::IntermediateStore;
use crate::types::{EmissionId, Record};

/// Map-side merge of one chunk's values for a key, e.g. summing counts.
pub type Combiner<V> = dyn Fn(&str, Vec<V>) -> Vec<V> + Send + Sync;

/// Shards per map worker in the intermediate store.
const SHARDS_PER_WORKER: usize = 4;

/// Invoke `mapper` exactly once per record on the stage pool, collecting emissions.
///
/// Returns only after every worker has joined, so all emissions are visible in the returned
/// store. A mapper that returns `Err` or panics aborts the stage with [`JobError::Mapper`]
/// carrying the offending record; emissions of a failed invocation are discarded.
pub fn run_map<V, M>(
    records: &[Record],
    mapper: &M,
    stage: &StageContext,
) -> JobResult<IntermediateStore<V>>
where
    V: Send,
    M: Fn(&Record, &mut MapEmitter<'_, V>) -> PluginResult + Sync,
{
    let store = IntermediateStore::new(stage.workers() * SHARDS_PER_WORKER);

    stage.run_chunks(records.iter().collect(), |idx, record: &Record| {
        let mut emitter = MapEmitter::new(&store, idx);
        match stage.guarded(|| mapper(record, &mut emitter)) {
            Ok(()) => Ok(emitter.commit()),
            Err(source) => Err(JobError::Mapper {
                record: record.clone(),
                source,
            }),
        }
    })?;

    Ok(store)
}

/// [`run_map`] with a combiner applied to every map chunk before its values are stored.
///
/// A combiner that panics or overruns the invocation timeout aborts the stage with
/// [`JobError::Combiner`].
pub fn run_map_combined<V, M, C>(
    records: &[Record],
    mapper: &M,
    combiner: &C,
    stage: &StageContext,
) -> JobResult<IntermediateStore<V>>
where
    V: Send,
    M: Fn(&Record, &mut MapEmitter<'_, V>) -> PluginResult + Sync,
    C: Fn(&str, Vec<V>) -> Vec<V> + Sync + ?Sized,
{
    let store = IntermediateStore::new(stage.workers() * SHARDS_PER_WORKER);

    stage.run_chunks_with(
        records.iter().collect(),
        Vec::new,
        |buffer: &mut Vec<(EmissionId, String, V)>, idx, record: &Record| {
            let mut emitter = MapEmitter::new(&store, idx);
            match stage.guarded(|| mapper(record, &mut emitter)) {
                Ok(()) => {
                    let n = emitter.emitted();
                    buffer.extend(emitter.into_tagged());
                    Ok(n)
                }
                Err(source) => Err(JobError::Mapper {
                    record: record.clone(),
                    source,
                }),
            }
        },
        |buffer| combine_chunk(buffer, combiner, &store, stage),
    )?;

    Ok(store)
}

fn combine_chunk<V, C>(
    buffer: Vec<(EmissionId, String, V)>,
    combiner: &C,
    store: &IntermediateStore<V>,
    stage: &StageContext,
) -> JobResult<()>
where
    C: Fn(&str, Vec<V>) -> Vec<V> + ?Sized,
{
    let mut by_key: HashMap<String, (EmissionId, Vec<V>)> = HashMap::new();
    for (id, key, value) in buffer {
        by_key.entry(key).or_insert_with(|| (id, Vec::new())).1.push(value);
    }

    for (key, (first, values)) in by_key {
        let mut combined = Vec::new();
        stage
            .guarded(|| {
                combined = combiner(&key, values);
                Ok(())
            })
            .map_err(|source| JobError::Combiner {
                key: key.clone(),
                source,
            })?;
        for (offset, value) in combined.into_iter().enumerate() {
            let id = EmissionId {
                record: first.record,
                seq: first.seq + offset,
            };
            store.emit(id, key.clone(), value);
        }
    }
    Ok(())
}
