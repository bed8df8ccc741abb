//! Observable events emitted by an upload task.

use serde::Serialize;

/// Lifecycle phase of a transfer.
///
/// `Paused` is re-entrant with `Uploading`; `Done`, `Error` and `Canceled`
/// are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferPhase {
    Hashing,
    Preparing,
    Uploading,
    Paused,
    Finalizing,
    Done,
    Error,
    Canceled,
}

/// Event emitted on the channel returned by
/// [`UploadTask::take_events`](crate::UploadTask::take_events).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TransferEvent {
    /// Phase transition. Emitted once per transition, never as a heartbeat.
    State(TransferPhase),
    /// Aggregate progress update, emitted after each chunk lands.
    #[serde(rename_all = "camelCase")]
    Progress {
        total_chunks: u32,
        uploaded_chunks: u32,
        /// Whole percent in `0..=100`, rounded down.
        percent: u8,
    },
    /// Outcome of a single upload attempt. `attempt` starts at 0.
    #[serde(rename_all = "camelCase")]
    Chunk { index: u32, ok: bool, attempt: u32 },
}
