//! Log2 latency histogram over millisecond gaps.
//!
//! Fourteen ascending cutoffs split `[0, ∞)` into fifteen contiguous buckets:
//! `[0, 500)`, `[500, 1000)`, ..., `[2048000, 3600000)`, `[3600000, ∞)`.

pub const BOUNDS_MS: [i64; 14] = [
    500, 1_000, 2_000, 4_000, 8_000, 16_000, 32_000, 64_000, 128_000, 256_000, 512_000,
    1_024_000, 2_048_000, 3_600_000,
];

pub const BUCKET_COUNT: usize = BOUNDS_MS.len() + 1;

pub const HIST_LABELS: [&str; BUCKET_COUNT] = [
    "<0.5s", "0.5-1s", "1-2s", "2-4s", "4-8s", "8-16s", "16-32s", "32s-1m", "1-2m", "2-4m",
    "4-8m", "8-17m", "17-34m", "34-60m", ">=1h",
];

/// Half-open range `[lower, upper)` of bucket `index`; `None` on a side means unbounded.
/// Returns `None` for an index past the last bucket.
pub fn bucket_range(index: usize) -> Option<(Option<i64>, Option<i64>)> {
    if index >= BUCKET_COUNT {
        return None;
    }
    let lower = index.checked_sub(1).map(|i| BOUNDS_MS[i]);
    let upper = BOUNDS_MS.get(index).copied();
    Some((lower, upper))
}

/// Bucket for a single gap. Negative values fall into bucket 0, as `value < 500` does in SQL.
pub fn bucket_index(value_ms: i64) -> usize {
    BOUNDS_MS.partition_point(|bound| *bound <= value_ms)
}

/// One `countIf` per bucket, aliased `{prefix}_{index}`. Each count also requires `condition`,
/// so the bucket counts of a group sum to `countIf(condition)` for that group.
pub fn hist_columns(value_expr: &str, condition: &str, prefix: &str) -> Vec<String> {
    (0..BUCKET_COUNT)
        .filter_map(|index| bucket_range(index).map(|range| (index, range)))
        .map(|(index, range)| {
            let range = match range {
                (None, Some(upper)) => format!("{value_expr} < {upper}"),
                (Some(lower), Some(upper)) => {
                    format!("{value_expr} >= {lower} AND {value_expr} < {upper}")
                }
                (Some(lower), None) => format!("{value_expr} >= {lower}"),
                (None, None) => "true".to_string(),
            };
            format!("countIf({range} AND ({condition})) AS {prefix}_{index}")
        })
        .collect()
}

pub fn hist_column_names(prefix: &str) -> Vec<String> {
    (0..BUCKET_COUNT)
        .map(|index| format!("{prefix}_{index}"))
        .collect()
}
