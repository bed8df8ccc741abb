//! Upload adapter for S3-style multipart backends.
//!
//! The backend brokers the multipart session: `POST /s3/create` returns
//! a session id plus one presigned URL per chunk, chunks go straight to
//! those URLs, and `POST /s3/complete` stitches the parts together from
//! the recorded ETags.

use std::future::Future;
use std::pin::Pin;

use chunklift_engine::{
    AdapterError, ChunkContext, ChunkOutcome, FinalizeContext, FinalizeOutcome, PrepareContext,
    PrepareOutcome, UploadAdapter,
};
use reqwest::header::HeaderMap;
use serde::Serialize;

use crate::http_multipart::etag_of;
use crate::payload::{CompleteReply, PartPayload, SessionReply, normalize_base, parts_payload};

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";
pub const DEFAULT_ACL: &str = "private";

pub struct S3MultipartAdapter {
    http: reqwest::Client,
    /// Presigned PUTs must not carry the broker headers; the signed
    /// URL is the only authorization S3 accepts on those requests.
    chunk_http: reqwest::Client,
    base_url: String,
    content_type: String,
    acl: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatePayload<'a> {
    file_id: &'a str,
    name: &'a str,
    size: u64,
    chunk_count: u32,
    content_type: &'a str,
    acl: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompletePayload<'a> {
    session_id: &'a str,
    file_id: &'a str,
    parts: Vec<PartPayload<'a>>,
}

impl S3MultipartAdapter {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Builds a client that sends the given headers on every broker
    /// request. Presigned chunk PUTs carry no extra headers.
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
            chunk_http: reqwest::Client::new(),
            base_url: normalize_base(base_url),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            acl: DEFAULT_ACL.to_string(),
        }
    }

    /// Content type recorded on the assembled object.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Canned ACL for the assembled object, e.g. `public-read`.
    pub fn with_acl(mut self, acl: impl Into<String>) -> Self {
        self.acl = acl.into();
        self
    }
}

impl UploadAdapter for S3MultipartAdapter {
    fn name(&self) -> &str {
        "s3-multipart"
    }

    fn prepare<'a>(
        &'a self,
        ctx: PrepareContext<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<PrepareOutcome, AdapterError>> + Send + 'a>> {
        Box::pin(async move {
            let payload = CreatePayload {
                file_id: &ctx.identity.file_id,
                name: ctx.name,
                size: ctx.size,
                chunk_count: ctx.chunk_count,
                content_type: &self.content_type,
                acl: &self.acl,
            };

            let response = self
                .http
                .post(format!("{}/s3/create", self.base_url))
                .json(&payload)
                .send()
                .await
                .map_err(|e| AdapterError::Negotiation(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(AdapterError::Negotiation(format!("s3 create failed: {status}")));
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
            let Some(target) = ctx.upload_target else {
                return Err(AdapterError::Protocol(format!(
                    "missing presigned url for chunk {}",
                    ctx.index
                )));
            };

            let request = self.chunk_http.put(target).body(ctx.body.to_vec());
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
                session_id: ctx.session_id,
                file_id: &ctx.identity.file_id,
                parts: parts_payload(ctx.parts),
            };

            let response = self
                .http
                .post(format!("{}/s3/complete", self.base_url))
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
}
