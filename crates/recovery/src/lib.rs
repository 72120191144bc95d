//! # Recovery
//!
//! Parallel recovery of numeric passwords for encrypted archives.
//!
//! The candidate space (fixed-width, zero-padded decimal strings) is split into
//! one contiguous chunk per worker. Every worker probes its candidates in
//! ascending order with a cheap partial decrypt; the first candidate that
//! passes stops every worker and is confirmed by a full extraction. A
//! candidate that passes the probe but fails extraction is a false positive:
//! the search resumes where each worker stopped.
//!
//! ## Supported Formats
//!
//! - RAR (v4 and v5, via `unrar`)
//! - ZIP (ZipCrypto and AES, via `zip`)
//!
//! ## Example
//!
//! ```rust,no_run
//! use recovery::{recover, SearchConfig, SearchOutcome};
//! use std::path::Path;
//! use std::sync::Arc;
//! use std::sync::atomic::AtomicBool;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SearchConfig::default();
//! let cancel_flag = Arc::new(AtomicBool::new(false));
//! let on_event = |event: &recovery::SearchEvent| println!("{:?}", event);
//!
//! let report = recover(Path::new("secret.rar"), &config, &on_event, cancel_flag)?;
//!
//! if let SearchOutcome::Found(password) = &report.outcome {
//!     println!("Password: {} ({} candidates tested)", password, report.tested);
//! }
//! # Ok(())
//! # }
//! ```

pub mod candidate;
pub mod confirm;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod oracle;
pub mod partition;
pub mod safety;
pub mod types;
pub mod worker;

// Re-export main types
pub use coordinator::Coordinator;
pub use error::{ExtractionError, OracleOpenError, ProbeError, SearchError, SecurityError};
pub use events::{EventCallback, SearchEvent};
pub use oracle::{ArchiveOracle, OracleSession, SystemOracle};
pub use types::{
    ArchiveEntry, Chunk, ExtractStats, OverwriteMode, ProbePolicy, ProbeResult, ProbeTally,
    SearchConfig, SearchOutcome, SearchReport, SearchSpace,
};

use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Recover the password of a RAR or ZIP archive.
///
/// # Arguments
///
/// * `archive_path` - Path to the archive file
/// * `config` - Search space, worker count and extraction options
/// * `on_event` - Receives progress and lifecycle notifications
/// * `cancel_flag` - Atomic flag to signal cancellation
///
/// # Returns
///
/// Returns a `SearchReport` whose outcome is `Found`, `Exhausted` or
/// `Cancelled`.
///
/// # Errors
///
/// Returns an error if:
/// - The archive file doesn't exist
/// - The search space is invalid
/// - Some chunks could not open the archive and no password was found
/// - Extraction of a confirmed candidate fails for a non-password reason
pub fn recover(
    archive_path: &Path,
    config: &SearchConfig,
    on_event: &EventCallback,
    cancel_flag: Arc<AtomicBool>,
) -> Result<SearchReport, SearchError> {
    if !archive_path.exists() {
        return Err(SearchError::NotFound(archive_path.to_path_buf()));
    }

    let oracle = SystemOracle::new(config.size_limit_bytes);
    search_with(&oracle, archive_path, config, on_event, cancel_flag)
}

/// Run a search against any [`ArchiveOracle`].
pub fn search_with<O: ArchiveOracle>(
    oracle: &O,
    archive_path: &Path,
    config: &SearchConfig,
    on_event: &(dyn Fn(&SearchEvent) + Send + Sync + '_),
    cancel_flag: Arc<AtomicBool>,
) -> Result<SearchReport, SearchError> {
    Coordinator::new(oracle, archive_path, config, on_event, cancel_flag).run()
}
