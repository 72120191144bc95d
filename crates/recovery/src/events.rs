//! Notifications emitted while a search runs.

use crate::types::{duration_serde, ExtractStats, SearchOutcome};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

/// Type alias for event callback functions.
///
/// Called from the coordinating thread only, never from a worker.
pub type EventCallback = dyn Fn(&SearchEvent) + Send + Sync;

/// An observable step of a recovery run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum SearchEvent {
    /// The run started.
    #[serde(rename_all = "camelCase")]
    Started {
        archive_path: PathBuf,
        lower: u64,
        upper: u64,
        width: u32,
        workers: usize,
        chunks: usize,
    },

    /// A search attempt started over the remaining candidates.
    #[serde(rename_all = "camelCase")]
    AttemptStarted {
        attempt: u32,
        chunks: usize,
        candidates: u64,
    },

    /// Periodic progress while workers run.
    #[serde(rename_all = "camelCase")]
    Progress { tested: u64, total: u64 },

    /// A chunk was searched completely without an accepted candidate.
    #[serde(rename_all = "camelCase")]
    ChunkExhausted { chunk_id: usize },

    /// A chunk could not open the archive.
    #[serde(rename_all = "camelCase")]
    ChunkFailed { chunk_id: usize, error: String },

    /// A candidate passed the probe and is about to be confirmed.
    #[serde(rename_all = "camelCase")]
    CandidateAccepted {
        candidate: String,
        chunk_id: usize,
        #[serde(with = "duration_serde")]
        elapsed: Duration,
    },

    /// A candidate passed the probe but failed confirmation.
    #[serde(rename_all = "camelCase")]
    FalsePositive { candidate: String, error: String },

    /// A candidate was confirmed by a full extraction.
    #[serde(rename_all = "camelCase")]
    Confirmed {
        candidate: String,
        output_dir: PathBuf,
        stats: ExtractStats,
    },

    /// The run finished.
    #[serde(rename_all = "camelCase")]
    Finished {
        outcome: SearchOutcome,
        #[serde(with = "duration_serde")]
        elapsed: Duration,
        tested: u64,
    },
}
