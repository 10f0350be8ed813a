//! Shard selection for normalized identifiers

/// Pick the shard for `normalized_id`: leading byte modulo shard count.
///
/// The mapping is only stable for a fixed shard list; changing the number of
/// shards re-partitions every key. Callers guarantee a non-empty id and a
/// non-empty shard list.
pub fn route<'a, T>(normalized_id: &str, shards: &'a [T]) -> &'a T {
    debug_assert!(!shards.is_empty(), "route called without shards");
    &shards[shard_index(normalized_id, shards.len())]
}

pub fn shard_index(normalized_id: &str, shard_count: usize) -> usize {
    let lead = normalized_id.as_bytes().first().copied().unwrap_or_default();
    usize::from(lead) % shard_count
}
