//! Reduce stage scheduler.

use crate::error::{JobError, JobResult, PluginResult};
use crate::execution::StageContext;
use crate::processing::emit::ReduceEmitter;
use crate::processing::sink::{OutputOrder, ResultSink, SinkCollector};
use crate::types::Group;

/// Invoke `reducer` exactly once per group on the stage pool.
///
/// Each invocation takes ownership of its group's values. Outputs are collected into a
/// [`ResultSink`] arranged according to `order`. A reducer that returns `Err` or panics
/// aborts the stage with [`JobError::Reducer`] carrying the offending key.
pub fn run_reduce<V, O, R>(
    groups: Vec<Group<V>>,
    reducer: &R,
    stage: &StageContext,
    order: OutputOrder,
) -> JobResult<ResultSink<O>>
where
    V: Send,
    O: Send,
    R: Fn(&str, Vec<V>, &mut ReduceEmitter<'_, O>) -> PluginResult + Sync,
{
    let sink = SinkCollector::new();

    stage.run_chunks(groups, |idx, group: Group<V>| {
        let (key, values) = group.into_parts();
        let mut emitter = ReduceEmitter::new(&sink, idx, &key);
        match stage.guarded(|| reducer(&key, values, &mut emitter)) {
            Ok(()) => Ok(emitter.commit()),
            Err(source) => Err(JobError::Reducer {
                key: key.clone(),
                source,
            }),
        }
    })?;

    Ok(sink.finish(order))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::run_reduce;
    use crate::error::JobError;
    use crate::execution::{JobOptions, Stage, StageContext};
    use crate::processing::emit::ReduceEmitter;
    use crate::processing::OutputOrder;
    use crate::types::Group;

    fn ctx(workers: usize) -> StageContext {
        let opts = JobOptions {
            chunk_size: 1,
            ..JobOptions::with_workers(workers)
        };
        StageContext::new(Stage::Reduce, &opts).unwrap()
    }

    fn groups() -> Vec<Group<u32>> {
        vec![
            Group::new("a", vec![1, 1, 1]),
            Group::new("b", vec![1]),
            Group::new("c", vec![1, 1]),
        ]
    }

    fn count(
        key: &str,
        values: Vec<u32>,
        emit: &mut ReduceEmitter<'_, String>,
    ) -> crate::PluginResult {
        emit.emit(format!("{key}={}", values.len()));
        Ok(())
    }

    #[test]
    fn invokes_reducer_once_per_group_in_key_order() {
        let calls = AtomicUsize::new(0);
        let sink = run_reduce(
            groups(),
            &|k: &str, v: Vec<u32>, e: &mut ReduceEmitter<'_, String>| {
                calls.fetch_add(1, Ordering::SeqCst);
                count(k, v, e)
            },
            &ctx(3),
            OutputOrder::ByKey,
        )
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(sink.into_values(), vec!["a=3", "b=1", "c=2"]);
    }

    #[test]
    fn reducer_may_emit_zero_or_many() {
        let sink = run_reduce(
            groups(),
            &|k: &str, v: Vec<u32>, e: &mut ReduceEmitter<'_, String>| {
                for _ in 1..v.len() {
                    e.emit(k.to_string());
                }
                Ok(())
            },
            &ctx(2),
            OutputOrder::ByKey,
        )
        .unwrap();
        assert_eq!(sink.into_values(), vec!["a", "a", "c"]);
    }

    #[test]
    fn completion_order_contains_same_outputs() {
        let sink = run_reduce(groups(), &count, &ctx(4), OutputOrder::Completion).unwrap();
        let mut values = sink.into_values();
        values.sort();
        assert_eq!(values, vec!["a=3", "b=1", "c=2"]);
    }

    #[test]
    fn reducer_error_carries_key() {
        let err = run_reduce(
            groups(),
            &|k: &str, _: Vec<u32>, _: &mut ReduceEmitter<'_, String>| {
                if k == "b" {
                    Err("bad group".into())
                } else {
                    Ok(())
                }
            },
            &ctx(1),
            OutputOrder::ByKey,
        )
        .unwrap_err();

        match err {
            JobError::Reducer { key, source } => {
                assert_eq!(key, "b");
                assert_eq!(source.to_string(), "bad group");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
