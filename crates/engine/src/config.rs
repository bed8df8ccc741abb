//! Upload task configuration.

use std::time::Duration;

use chunklift_manifest::DEFAULT_PREFIX;

/// Default chunk size in bytes (5 MiB).
pub const DEFAULT_CHUNK_SIZE: u64 = 5 * 1024 * 1024;

/// Default number of chunk uploads in flight.
pub const DEFAULT_CONCURRENCY: u32 = 4;

/// Concurrency bounds enforced by [`UploaderConfig::effective_concurrency`].
pub const MIN_CONCURRENCY: u32 = 1;
pub const MAX_CONCURRENCY: u32 = 16;

/// Retry behavior for individual chunk uploads.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total tries per chunk, including the first. Values below 1 act as 1.
    pub attempts: u32,
    /// Delay before the first retry; doubles on each subsequent one.
    pub base_delay: Duration,
    /// Backoff cap. `None` leaves the delay uncapped.
    pub max_delay: Option<Duration>,
    /// Scale each delay by a random factor in `[0.5, 1.0)`.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(600),
            max_delay: None,
            jitter: true,
        }
    }
}

/// Configuration for an [`UploadTask`](crate::UploadTask).
#[derive(Debug, Clone)]
pub struct UploaderConfig {
    /// Chunk size in bytes. 0 falls back to [`DEFAULT_CHUNK_SIZE`].
    pub chunk_size: u64,
    /// Requested worker count, clamped to `[MIN_CONCURRENCY, MAX_CONCURRENCY]`.
    pub concurrency: u32,
    pub retry: RetryPolicy,
    /// Namespace prefix for manifest storage keys. Hosts pass this to the
    /// manifest store they construct, e.g.
    /// [`FsManifestStore::with_prefix`](chunklift_manifest::FsManifestStore::with_prefix).
    pub persist_prefix: String,
    /// How often a paused task re-checks the pause flag.
    pub pause_poll: Duration,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            retry: RetryPolicy::default(),
            persist_prefix: DEFAULT_PREFIX.to_string(),
            pause_poll: Duration::from_millis(200),
        }
    }
}

impl UploaderConfig {
    /// Worker count actually used by the pool.
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.clamp(MIN_CONCURRENCY, MAX_CONCURRENCY) as usize
    }

    /// Chunk size actually used, with 0 mapped to the default.
    pub fn effective_chunk_size(&self) -> u64 {
        if self.chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            self.chunk_size
        }
    }
}
