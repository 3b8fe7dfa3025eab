//! Shuffle/group stage.
//!
//! Consolidates the intermediate store into [`Group`]s:
//!
//! - groups are sorted by key (byte-wise `String` order)
//! - values within a group are in sequential emission order (record index, then emission
//!   order inside the mapper invocation), independent of how the map stage was scheduled
//!
//! Runs in O(n log n): per-key sort by emission id plus one sort over keys.

use crate::processing::store::IntermediateStore;
use crate::types::Group;

/// Consume the store and produce key-sorted groups.
pub fn group<V>(store: IntermediateStore<V>) -> Vec<Group<V>> {
    let mut groups: Vec<Group<V>> = Vec::with_capacity(store.key_count());
    for shard in store.into_shards() {
        for (key, mut tagged) in shard {
            tagged.sort_unstable_by_key(|t| t.id);
            groups.push(Group {
                key,
                values: tagged.into_iter().map(|t| t.value).collect(),
            });
        }
    }
    groups.sort_unstable_by(|a, b| a.key.cmp(&b.key));
    groups
}
