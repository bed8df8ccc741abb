//! Wire payloads shared by the HTTP backends.

use std::collections::HashMap;

use chunklift_engine::{PartTag, PrepareOutcome};
use serde::{Deserialize, Serialize};

/// Session negotiation reply.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SessionReply {
    pub session_id: String,

    #[serde(default)]
    pub already_uploaded: Vec<u32>,

    #[serde(default)]
    pub upload_urls: HashMap<u32, String>,
}

impl SessionReply {
    pub(crate) fn into_outcome(self) -> PrepareOutcome {
        PrepareOutcome {
            session_id: self.session_id,
            already_uploaded: self.already_uploaded,
            upload_targets: self.upload_urls,
        }
    }
}

/// Finalize reply. A non-success HTTP status short-circuits to
/// not-ok; otherwise the body decides.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CompleteReply {
    #[serde(default)]
    pub ok: bool,

    #[serde(default)]
    pub url: Option<String>,
}

/// Chunk receipt forwarded to finalize endpoints.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PartPayload<'a> {
    pub part_number: u32,
    pub etag: &'a str,
}

pub(crate) fn parts_payload(parts: &[PartTag]) -> Vec<PartPayload<'_>> {
    parts
        .iter()
        .map(|part| PartPayload {
            part_number: part.part_number,
            etag: &part.tag,
        })
        .collect()
}

/// Strips trailing slashes so endpoint paths can be appended verbatim.
pub(crate) fn normalize_base(url: impl Into<String>) -> String {
    let mut url = url.into();
    while url.ends_with('/') {
        url.pop();
    }
    url
}
