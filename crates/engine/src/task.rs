//! Resumable upload task.
//!
//! Drives one payload through hashing, session negotiation, a bounded
//! pool of concurrent chunk uploads, and finalize. Progress is recorded
//! in a manifest store after every chunk, so an interrupted transfer
//! resumes from the last acknowledged chunk. Pause and cancellation are
//! cooperative.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chunklift_identity::{FileIdentity, IdentityHasher, chunk_count};
use chunklift_manifest::{ManifestStore, NewManifest, TransferManifest};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::adapter::{
    ChunkContext, FinalizeContext, FinalizeOutcome, PartTag, PrepareContext, UploadAdapter,
};
use crate::backoff::{backoff_delay, chunk_span, pending_indices};
use crate::config::{RetryPolicy, UploaderConfig};
use crate::error::{AdapterError, TransferError};
use crate::events::{TransferEvent, TransferPhase};
use crate::source::ChunkSource;

/// Orchestrates one resumable transfer.
///
/// A task is bound to an adapter and a manifest store at construction and
/// can then run any number of payloads through [`start`](Self::start),
/// though hosts typically create one task per payload so that pause and
/// cancel stay scoped.
pub struct UploadTask {
    adapter: Arc<dyn UploadAdapter>,
    store: Arc<dyn ManifestStore>,
    config: UploaderConfig,
    events_tx: mpsc::Sender<TransferEvent>,
    events_rx: Option<mpsc::Receiver<TransferEvent>>,
    paused: AtomicBool,
    cancel: CancellationToken,
}

impl UploadTask {
    pub fn new(
        adapter: Arc<dyn UploadAdapter>,
        store: Arc<dyn ManifestStore>,
        config: UploaderConfig,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(256);
        Self {
            adapter,
            store,
            config,
            events_tx,
            events_rx: Some(events_rx),
            paused: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        }
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<TransferEvent>> {
        self.events_rx.take()
    }

    /// Returns a cancellation token for this transfer.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Requests cancellation. Idempotent. In-flight chunk uploads observe
    /// the token and settle; the next [`start`](Self::start) on a fresh
    /// task picks up from the manifest.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Holds back new chunk dispatches. In-flight uploads keep running.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    /// Resumes dispatching after [`pause`](Self::pause).
    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Runs the transfer to completion.
    ///
    /// Chunks already acknowledged in the manifest store, or reported by
    /// the backend during negotiation, are never re-uploaded. `meta` is
    /// forwarded opaque to the adapter's prepare call.
    pub async fn start(
        &self,
        source: Arc<dyn ChunkSource>,
        meta: Option<serde_json::Value>,
    ) -> Result<FinalizeOutcome, TransferError> {
        match self.run(source, meta).await {
            Ok(outcome) => {
                self.emit_state(TransferPhase::Done).await;
                Ok(outcome)
            }
            Err(TransferError::Canceled) => {
                self.emit_state(TransferPhase::Canceled).await;
                Err(TransferError::Canceled)
            }
            Err(err) => {
                warn!(error = %err, "transfer failed");
                self.emit_state(TransferPhase::Error).await;
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        source: Arc<dyn ChunkSource>,
        meta: Option<serde_json::Value>,
    ) -> Result<FinalizeOutcome, TransferError> {
        let chunk_size = self.config.effective_chunk_size();

        self.emit_state(TransferPhase::Hashing).await;
        let identity = self.hash_source(source.as_ref(), chunk_size).await?;
        let total_chunks = identity.chunk_count();
        debug!(file_id = %identity.file_id, chunks = total_chunks, "payload hashed");

        self.emit_state(TransferPhase::Preparing).await;
        self.check_canceled()?;
        let mut manifest = self
            .store
            .put(
                self.adapter.name(),
                &identity.file_id,
                NewManifest {
                    name: source.name().to_string(),
                    size: source.size(),
                    chunk_size,
                    chunk_count: total_chunks,
                },
            )
            .await?;

        let prep = self
            .adapter
            .prepare(PrepareContext {
                name: source.name(),
                size: source.size(),
                identity: &identity,
                chunk_size,
                chunk_count: total_chunks,
                meta: meta.as_ref(),
            })
            .await
            .map_err(negotiation_err)?;

        // The backend may already hold chunks from an earlier session.
        manifest.merge_uploaded(prep.already_uploaded.iter().copied());
        manifest.session_id = Some(prep.session_id.clone());
        self.store.save(&mut manifest).await?;

        let session_id = prep.session_id;
        let outstanding = pending_indices(total_chunks, &manifest.uploaded);
        let manifest = Arc::new(Mutex::new(manifest));

        if !outstanding.is_empty() {
            self.emit_state(TransferPhase::Uploading).await;
            let worker = ChunkWorker {
                adapter: Arc::clone(&self.adapter),
                store: Arc::clone(&self.store),
                source: Arc::clone(&source),
                manifest: Arc::clone(&manifest),
                events_tx: self.events_tx.clone(),
                cancel: self.cancel.clone(),
                session_id: session_id.clone(),
                upload_targets: Arc::new(prep.upload_targets),
                retry: self.config.retry.clone(),
                chunk_size,
                file_size: source.size(),
                total_chunks,
            };
            if let Err(err) = self.upload_outstanding(outstanding, worker).await {
                if matches!(err, TransferError::Canceled) {
                    // Best-effort; the manifest keeps the session resumable
                    // even if the backend drops it.
                    self.adapter.abort(&session_id).await;
                }
                return Err(err);
            }
        }

        // Cancellation between phases still wins over finalize.
        if self.cancel.is_cancelled() {
            self.adapter.abort(&session_id).await;
            return Err(TransferError::Canceled);
        }

        self.emit_state(TransferPhase::Finalizing).await;
        let parts: Vec<PartTag> = {
            let m = manifest.lock().await;
            m.chunk_tags
                .iter()
                .map(|(&index, tag)| PartTag {
                    part_number: index + 1,
                    tag: tag.clone(),
                })
                .collect()
        };
        let outcome = self
            .adapter
            .finalize(FinalizeContext {
                session_id: &session_id,
                name: source.name(),
                size: source.size(),
                identity: &identity,
                chunk_count: total_chunks,
                parts: &parts,
            })
            .await
            .map_err(negotiation_err)?;
        if !outcome.ok {
            return Err(TransferError::Negotiation(AdapterError::Negotiation(
                "backend declined to finalize the transfer".into(),
            )));
        }

        {
            let mut m = manifest.lock().await;
            m.set_completed(outcome.url.clone());
            self.store.save(&mut m).await?;
        }
        debug!(session = %session_id, "transfer finalized");
        Ok(outcome)
    }

    /// Hashes the payload one chunk window at a time, so memory stays at
    /// a single chunk regardless of payload size.
    async fn hash_source(
        &self,
        source: &dyn ChunkSource,
        chunk_size: u64,
    ) -> Result<FileIdentity, TransferError> {
        let mut hasher = IdentityHasher::new();
        for index in 0..chunk_count(source.size(), chunk_size) {
            self.check_canceled()?;
            let body = source
                .read_range(chunk_span(index, chunk_size, source.size()))
                .await?;
            hasher.update_chunk(&body);
        }
        Ok(hasher.finish())
    }

    /// Dispatches outstanding chunks through a bounded worker pool.
    ///
    /// Dispatch stops on pause (in-flight uploads keep running), on
    /// cancellation, and on the first worker failure. In-flight workers
    /// are always drained before returning, and cancellation wins over
    /// any failure they report while draining.
    async fn upload_outstanding(
        &self,
        outstanding: Vec<u32>,
        worker: ChunkWorker,
    ) -> Result<(), TransferError> {
        let concurrency = self.config.effective_concurrency();
        let mut pool: JoinSet<Result<(), TransferError>> = JoinSet::new();
        let mut failure: Option<TransferError> = None;
        let mut pause_emitted = false;

        'dispatch: for index in outstanding {
            while self.is_paused() {
                if !pause_emitted {
                    pause_emitted = true;
                    self.emit_state(TransferPhase::Paused).await;
                }
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => break 'dispatch,
                    _ = tokio::time::sleep(self.config.pause_poll) => {}
                }
            }
            if pause_emitted {
                pause_emitted = false;
                self.emit_state(TransferPhase::Uploading).await;
            }
            if self.cancel.is_cancelled() {
                break 'dispatch;
            }

            pool.spawn(worker.clone().run(index));

            // At capacity: settle one worker before dispatching the next.
            if pool.len() >= concurrency {
                if let Some(err) = settle_one(&mut pool).await {
                    failure = Some(err);
                    break 'dispatch;
                }
            }
        }

        while let Some(joined) = pool.join_next().await {
            if let Err(err) = flatten_join(joined) {
                failure.get_or_insert(err);
            }
        }

        if self.cancel.is_cancelled() {
            return Err(TransferError::Canceled);
        }
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn emit_state(&self, phase: TransferPhase) {
        debug!(?phase, "phase transition");
        // The receiver still parked here means nobody is listening.
        if self.events_rx.is_some() {
            return;
        }
        let _ = self.events_tx.send(TransferEvent::State(phase)).await;
    }

    fn check_canceled(&self) -> Result<(), TransferError> {
        if self.cancel.is_cancelled() {
            return Err(TransferError::Canceled);
        }
        Ok(())
    }
}

/// Owned world of one spawned chunk upload.
#[derive(Clone)]
struct ChunkWorker {
    adapter: Arc<dyn UploadAdapter>,
    store: Arc<dyn ManifestStore>,
    source: Arc<dyn ChunkSource>,
    manifest: Arc<Mutex<TransferManifest>>,
    events_tx: mpsc::Sender<TransferEvent>,
    cancel: CancellationToken,
    session_id: String,
    upload_targets: Arc<HashMap<u32, String>>,
    retry: RetryPolicy,
    chunk_size: u64,
    file_size: u64,
    total_chunks: u32,
}

impl ChunkWorker {
    /// Uploads one chunk, retrying with exponential backoff until the
    /// attempt budget is spent. Success is recorded in the manifest
    /// before the worker settles.
    async fn run(self, index: u32) -> Result<(), TransferError> {
        let span = chunk_span(index, self.chunk_size, self.file_size);
        let body = self.source.read_range(span.clone()).await?;

        let total_tries = self.retry.attempts.max(1);
        let mut attempt = 0u32;
        loop {
            if self.cancel.is_cancelled() {
                return Err(TransferError::Canceled);
            }

            let result = self
                .adapter
                .upload_chunk(ChunkContext {
                    session_id: &self.session_id,
                    index,
                    range: span.clone(),
                    body: &body,
                    upload_target: self.upload_targets.get(&index).map(String::as_str),
                    cancel: self.cancel.clone(),
                })
                .await;

            let error = match result {
                Ok(outcome) if outcome.ok => {
                    self.emit(TransferEvent::Chunk {
                        index,
                        ok: true,
                        attempt,
                    });
                    return self.record_success(index, outcome.tag).await;
                }
                Ok(_) => AdapterError::Chunk(format!("backend rejected chunk {index}")),
                Err(AdapterError::Canceled) => return Err(TransferError::Canceled),
                Err(err) => {
                    if self.cancel.is_cancelled() {
                        return Err(TransferError::Canceled);
                    }
                    err
                }
            };

            self.emit(TransferEvent::Chunk {
                index,
                ok: false,
                attempt,
            });
            attempt += 1;
            if attempt >= total_tries {
                warn!(index, attempts = attempt, error = %error, "chunk upload giving up");
                return Err(TransferError::ChunkTransfer {
                    index,
                    attempts: attempt,
                    source: error,
                });
            }
            debug!(index, attempt, error = %error, "chunk upload retrying");

            let delay = backoff_delay(
                attempt - 1,
                self.retry.base_delay,
                self.retry.max_delay,
                self.retry.jitter,
            );
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(TransferError::Canceled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Records the chunk under the manifest lock, so concurrent workers
    /// serialize their saves. Progress is emitted while still holding the
    /// lock, keeping the reported counts monotonic.
    async fn record_success(&self, index: u32, tag: Option<String>) -> Result<(), TransferError> {
        let mut m = self.manifest.lock().await;
        m.record_uploaded(index, tag);
        self.store.save(&mut m).await?;
        let uploaded = m.uploaded_count();
        self.emit(TransferEvent::Progress {
            total_chunks: self.total_chunks,
            uploaded_chunks: uploaded,
            percent: (u64::from(uploaded) * 100 / u64::from(self.total_chunks)) as u8,
        });
        Ok(())
    }

    fn emit(&self, event: TransferEvent) {
        // Non-blocking: a slow listener loses ticks, never stalls workers.
        let _ = self.events_tx.try_send(event);
    }
}

fn negotiation_err(err: AdapterError) -> TransferError {
    match err {
        AdapterError::Canceled => TransferError::Canceled,
        other => TransferError::Negotiation(other),
    }
}

async fn settle_one(pool: &mut JoinSet<Result<(), TransferError>>) -> Option<TransferError> {
    match pool.join_next().await {
        Some(joined) => flatten_join(joined).err(),
        None => None,
    }
}

fn flatten_join(
    joined: Result<Result<(), TransferError>, tokio::task::JoinError>,
) -> Result<(), TransferError> {
    match joined {
        Ok(result) => result,
        Err(e) => Err(TransferError::Io(std::io::Error::other(format!(
            "task join error: {e}"
        )))),
    }
}
