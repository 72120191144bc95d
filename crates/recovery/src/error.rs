//! Error types for password recovery operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Run-level error type. Anything returned as `Err` halts the whole search.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Archive file not found at the specified path.
    #[error("Archive not found: {0}")]
    NotFound(PathBuf),

    /// The requested search space cannot be enumerated.
    #[error("Invalid search space: {0}")]
    InvalidSpace(String),

    /// One or more chunks could not open the archive, so the space was not
    /// fully searched.
    #[error("{failed} of {total} chunks could not open the archive: {source}")]
    ChunksFailed {
        /// Number of chunks that failed to open the archive
        failed: usize,
        /// Number of chunks in the search
        total: usize,
        /// The first open failure reported
        source: OracleOpenError,
    },

    /// Confirmation failed for a reason that is not a false positive.
    #[error("Extraction failed: {0}")]
    Extraction(ExtractionError),

    /// The worker pool could not be built.
    #[error("Failed to start workers: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    /// An I/O error occurred outside of the oracle.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// The archive could not be opened at all, independent of the password.
#[derive(Debug, Error)]
pub enum OracleOpenError {
    /// The file is not an archive format the oracle understands.
    #[error("Not an archive: {0}")]
    NotAnArchive(String),

    /// The archive file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Outcome of a failed probe. Always recoverable at the candidate level.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    /// The candidate does not decrypt the entry.
    #[error("Wrong password")]
    WrongPassword,

    /// The decoded data is corrupt or fails its integrity check.
    #[error("Corrupted data: {0}")]
    Corrupt(String),

    /// Any other oracle failure.
    #[error("Unexpected oracle error: {0}")]
    Other(String),
}

/// Errors raised by the confirmation stage.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The candidate does not decrypt the archive.
    #[error("Invalid password")]
    WrongPassword,

    /// Decryption produced data that failed its integrity check.
    #[error("Corrupted archive: {0}")]
    Corrupt(String),

    /// The archive could not be reopened for extraction.
    #[error("Cannot open archive: {0}")]
    Open(#[from] OracleOpenError),

    /// The extraction size limit was exceeded.
    #[error("Size limit exceeded: {current} bytes > {limit} bytes")]
    SizeLimitExceeded {
        /// Current extracted size in bytes
        current: u64,
        /// Configured size limit in bytes
        limit: u64,
    },

    /// An I/O error occurred while writing extracted files.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Any other oracle failure during extraction.
    #[error("Extraction error: {0}")]
    Other(String),
}

impl ExtractionError {
    /// Whether this failure must halt the run instead of resuming the search.
    ///
    /// A vanished archive, a full disk or an exceeded size limit will not get
    /// better by trying another candidate.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ExtractionError::Open(_)
                | ExtractionError::Io(_)
                | ExtractionError::SizeLimitExceeded { .. }
        )
    }
}

impl From<ProbeError> for ExtractionError {
    fn from(err: ProbeError) -> Self {
        match err {
            ProbeError::WrongPassword => ExtractionError::WrongPassword,
            ProbeError::Corrupt(msg) => ExtractionError::Corrupt(msg),
            ProbeError::Other(msg) => ExtractionError::Other(msg),
        }
    }
}

/// Security-related errors for archive entry paths.
#[derive(Debug, Error)]
pub enum SecurityError {
    /// Path traversal attempt detected (e.g., "../../../etc/passwd").
    #[error("Path traversal attempt: {0}")]
    PathTraversal(String),

    /// Absolute path not allowed in archive entries.
    #[error("Absolute path not allowed: {0}")]
    AbsolutePath(String),
}
