//! Upload adapter for a chunk-aware HTTP backend.
//!
//! The backend exposes four endpoints under a common base URL:
//! `POST /upload/prepare`, `PUT /upload/{session}/{index}`,
//! `POST /upload/{session}/complete` and `POST /upload/{session}/abort`.
//! Prepare may return per-chunk `uploadUrls`; when present those take
//! precedence over the default chunk endpoint.

use std::future::Future;
use std::pin::Pin;

use chunklift_engine::{
    AdapterError, ChunkContext, ChunkOutcome, FinalizeContext, FinalizeOutcome, PrepareContext,
    PrepareOutcome, UploadAdapter,
};
use reqwest::header::{ETAG, HeaderMap};
use serde::Serialize;
use tracing::debug;

use crate::payload::{CompleteReply, SessionReply, normalize_base};

pub struct HttpMultipartAdapter {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PreparePayload<'a> {
    file_id: &'a str,
    name: &'a str,
    size: u64,
    chunk_size: u64,
    chunk_count: u32,
    chunk_hashes: &'a [String],
    meta: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompletePayload<'a> {
    file_id: &'a str,
    name: &'a str,
    size: u64,
    chunk_count: u32,
}

impl HttpMultipartAdapter {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Builds a client that sends the given headers on every request,
    /// e.g. an authorization token.
    pub fn with_headers(
        base_url: impl Into<String>,
        headers: HeaderMap,
    ) -> Result<Self, AdapterError> {
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| AdapterError::Protocol(e.to_string()))?;
        Ok(Self::with_client(http, base_url))
    }

    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: normalize_base(base_url),
        }
    }
}

impl UploadAdapter for HttpMultipartAdapter {
    fn name(&self) -> &str {
        "http-multipart"
    }

    fn prepare<'a>(
        &'a self,
        ctx: PrepareContext<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<PrepareOutcome, AdapterError>> + Send + 'a>> {
        Box::pin(async move {
            let payload = PreparePayload {
                file_id: &ctx.identity.file_id,
                name: ctx.name,
                size: ctx.size,
                chunk_size: ctx.chunk_size,
                chunk_count: ctx.chunk_count,
                chunk_hashes: &ctx.identity.chunk_hashes,
                meta: ctx.meta.cloned().unwrap_or_else(|| serde_json::json!({})),
            };

            let response = self
                .http
                .post(format!("{}/upload/prepare", self.base_url))
                .json(&payload)
                .send()
                .await
                .map_err(|e| AdapterError::Negotiation(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(AdapterError::Negotiation(format!("prepare failed: {status}")));
            }

            let reply: SessionReply = response
                .json()
                .await
                .map_err(|e| AdapterError::Protocol(e.to_string()))?;
            Ok(reply.into_outcome())
        })
    }

    fn upload_chunk<'a>(
        &'a self,
        ctx: ChunkContext<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<ChunkOutcome, AdapterError>> + Send + 'a>> {
        Box::pin(async move {
            let url = match ctx.upload_target {
                Some(target) => target.to_string(),
                None => format!("{}/upload/{}/{}", self.base_url, ctx.session_id, ctx.index),
            };

            let request = self.http.put(url).body(ctx.body.to_vec());
            let response = tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => return Err(AdapterError::Canceled),
                sent = request.send() => sent.map_err(|e| AdapterError::Chunk(e.to_string()))?,
            };

            if !response.status().is_success() {
                return Ok(ChunkOutcome::rejected());
            }
            Ok(ChunkOutcome::accepted(etag_of(&response)))
        })
    }

    fn finalize<'a>(
        &'a self,
        ctx: FinalizeContext<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<FinalizeOutcome, AdapterError>> + Send + 'a>> {
        Box::pin(async move {
            let payload = CompletePayload {
                file_id: &ctx.identity.file_id,
                name: ctx.name,
                size: ctx.size,
                chunk_count: ctx.chunk_count,
            };

            let response = self
                .http
                .post(format!("{}/upload/{}/complete", self.base_url, ctx.session_id))
                .json(&payload)
                .send()
                .await
                .map_err(|e| AdapterError::Protocol(e.to_string()))?;

            if !response.status().is_success() {
                return Ok(FinalizeOutcome { ok: false, url: None });
            }

            let reply: CompleteReply = response
                .json()
                .await
                .map_err(|e| AdapterError::Protocol(e.to_string()))?;
            Ok(FinalizeOutcome { ok: reply.ok, url: reply.url })
        })
    }

    fn abort<'a>(&'a self, session_id: &'a str) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            let result = self
                .http
                .post(format!("{}/upload/{session_id}/abort", self.base_url))
                .send()
                .await;
            if let Err(e) = result {
                debug!(session = %session_id, error = %e, "abort request failed");
            }
        })
    }
}

/// Raw ETag header value, quotes and all.
pub(crate) fn etag_of(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get(ETAG)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}
