//! Pure helpers for retry pacing and chunk arithmetic.

use std::collections::BTreeSet;
use std::ops::Range;
use std::time::Duration;

use rand::Rng;

/// Delay before the retry following failed attempt `attempt` (0-based).
///
/// Grows as `base * 2^attempt`, capped by `max` when given. With `jitter`
/// the result is scaled by a random factor in `[0.5, 1.0)` to avoid
/// thundering herd.
pub fn backoff_delay(attempt: u32, base: Duration, max: Option<Duration>, jitter: bool) -> Duration {
    let exp = attempt.min(20);
    let mut delay = base.saturating_mul(1u32 << exp);
    if let Some(cap) = max {
        delay = delay.min(cap);
    }
    if jitter {
        let factor = rand::thread_rng().gen_range(0.5..1.0);
        delay = delay.mul_f64(factor);
    }
    delay
}

/// Chunk indices in `0..chunk_count` not yet present in `uploaded`,
/// in ascending order.
pub fn pending_indices(chunk_count: u32, uploaded: &BTreeSet<u32>) -> Vec<u32> {
    (0..chunk_count).filter(|i| !uploaded.contains(i)).collect()
}

/// Byte range covered by chunk `index`.
///
/// The final chunk is truncated to the file size. Indices past the end of
/// the file yield an empty range, as does chunk 0 of an empty file.
pub fn chunk_span(index: u32, chunk_size: u64, file_size: u64) -> Range<u64> {
    let start = (u64::from(index) * chunk_size).min(file_size);
    let end = (u64::from(index) + 1)
        .saturating_mul(chunk_size)
        .min(file_size);
    start..end
}
