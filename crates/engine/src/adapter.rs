//! Upload adapter trait and session negotiation types.
//!
//! `UploadAdapter` is implemented per backend protocol (HTTP multipart,
//! presigned URLs, ...). Using a trait keeps the orchestrator decoupled
//! from any wire format and testable with mocks.

use std::collections::HashMap;
use std::future::Future;
use std::ops::Range;
use std::pin::Pin;

use chunklift_identity::FileIdentity;
use tokio_util::sync::CancellationToken;

use crate::error::AdapterError;

/// Everything an adapter needs to negotiate an upload session.
#[derive(Debug)]
pub struct PrepareContext<'a> {
    /// Display name of the payload, e.g. a file name.
    pub name: &'a str,
    /// Total payload size in bytes.
    pub size: u64,
    pub identity: &'a FileIdentity,
    pub chunk_size: u64,
    pub chunk_count: u32,
    /// Opaque host metadata forwarded to the backend.
    pub meta: Option<&'a serde_json::Value>,
}

/// Result of session negotiation.
#[derive(Debug, Clone)]
pub struct PrepareOutcome {
    pub session_id: String,
    /// Chunk indices the backend already holds from an earlier session.
    pub already_uploaded: Vec<u32>,
    /// Pre-authorized destination per chunk index, when the backend
    /// hands out one URL per chunk.
    pub upload_targets: HashMap<u32, String>,
}

/// One chunk upload attempt.
#[derive(Debug)]
pub struct ChunkContext<'a> {
    pub session_id: &'a str,
    pub index: u32,
    /// Absolute byte range this chunk covers.
    pub range: Range<u64>,
    pub body: &'a [u8],
    pub upload_target: Option<&'a str>,
    /// Set when the transfer is canceled; long-running sends should
    /// race against it.
    pub cancel: CancellationToken,
}

/// Outcome of one chunk upload attempt.
///
/// `ok: false` is a soft failure: the attempt is retried like a thrown
/// error, without an error value to report.
#[derive(Debug, Clone, Default)]
pub struct ChunkOutcome {
    pub ok: bool,
    /// Receipt for the chunk (e.g. an ETag), replayed to `finalize`.
    pub tag: Option<String>,
}

impl ChunkOutcome {
    pub fn accepted(tag: Option<String>) -> Self {
        Self { ok: true, tag }
    }

    pub fn rejected() -> Self {
        Self {
            ok: false,
            tag: None,
        }
    }
}

/// Chunk receipt replayed to `finalize`, numbered from 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartTag {
    pub part_number: u32,
    pub tag: String,
}

/// Everything an adapter needs to assemble the final object.
#[derive(Debug)]
pub struct FinalizeContext<'a> {
    pub session_id: &'a str,
    pub name: &'a str,
    pub size: u64,
    pub identity: &'a FileIdentity,
    pub chunk_count: u32,
    /// Receipts recorded during upload, ordered by chunk index. Empty
    /// when the backend never issued any.
    pub parts: &'a [PartTag],
}

/// Result of assembling the final object.
#[derive(Debug, Clone)]
pub struct FinalizeOutcome {
    pub ok: bool,
    /// Location of the assembled object, when the backend reports one.
    pub url: Option<String>,
}

/// Abstract upload backend.
///
/// Hosts implement this per protocol; the orchestrator drives it through
/// prepare, per-chunk uploads and finalize. All methods are invoked on a
/// shared reference, so implementations must be internally synchronized.
pub trait UploadAdapter: Send + Sync {
    /// Stable adapter name, namespaces persisted manifests.
    fn name(&self) -> &str;

    /// Negotiates an upload session for the described payload.
    fn prepare<'a>(
        &'a self,
        ctx: PrepareContext<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<PrepareOutcome, AdapterError>> + Send + 'a>>;

    /// Uploads one chunk. Called concurrently up to the configured
    /// worker count.
    fn upload_chunk<'a>(
        &'a self,
        ctx: ChunkContext<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<ChunkOutcome, AdapterError>> + Send + 'a>>;

    /// Assembles the uploaded chunks into the final object.
    fn finalize<'a>(
        &'a self,
        ctx: FinalizeContext<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<FinalizeOutcome, AdapterError>> + Send + 'a>>;

    /// Best-effort session teardown after cancellation. Failures are
    /// swallowed; the default does nothing.
    fn abort<'a>(
        &'a self,
        session_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        let _ = session_id;
        Box::pin(async {})
    }
}
