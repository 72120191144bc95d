//! Type definitions for password recovery.

use crate::error::SearchError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Widest candidate whose largest value still fits in a `u64`.
pub const MAX_WIDTH: u32 = 19;

/// Individual entry within an archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    /// Path of the entry within the archive
    pub path: String,

    /// Whether this entry is a directory
    pub is_directory: bool,

    /// Uncompressed size in bytes
    pub size: u64,
}

/// The bounded space of numeric candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSpace {
    lower: u64,
    upper: u64,
    width: u32,
}

impl SearchSpace {
    /// Build a space over `[lower, upper]` rendered with `width` digits.
    pub fn new(lower: u64, upper: u64, width: u32) -> Result<Self, SearchError> {
        let max = max_for_width(width)?;
        if lower > upper {
            return Err(SearchError::InvalidSpace(format!(
                "lower bound {} is above upper bound {}",
                lower, upper
            )));
        }
        if upper > max {
            return Err(SearchError::InvalidSpace(format!(
                "upper bound {} does not fit in {} digits",
                upper, width
            )));
        }
        Ok(Self {
            lower,
            upper,
            width,
        })
    }

    /// Every `width`-digit candidate, `0` through `10^width - 1`.
    pub fn full(width: u32) -> Result<Self, SearchError> {
        Self::new(0, max_for_width(width)?, width)
    }

    pub fn lower(&self) -> u64 {
        self.lower
    }

    pub fn upper(&self) -> u64 {
        self.upper
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    /// Number of candidates in the space.
    pub fn len(&self) -> u64 {
        self.upper - self.lower + 1
    }

    /// A validated space always holds at least one candidate.
    pub fn is_empty(&self) -> bool {
        false
    }
}

fn max_for_width(width: u32) -> Result<u64, SearchError> {
    if width == 0 || width > MAX_WIDTH {
        return Err(SearchError::InvalidSpace(format!(
            "width must be between 1 and {}, got {}",
            MAX_WIDTH, width
        )));
    }
    // 10^19 still fits in u64, so this cannot overflow for valid widths
    Ok(10u64.pow(width) - 1)
}

/// Contiguous, inclusive sub-range of the search space owned by one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Ordinal of the chunk in the initial partition
    pub id: usize,

    /// First candidate in the chunk
    pub start: u64,

    /// Last candidate in the chunk (inclusive)
    pub end: u64,
}

impl Chunk {
    /// Number of candidates in the chunk.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// The untested remainder of this chunk when the next candidate is
    /// `next`, or `None` when nothing is left.
    pub fn resume_from(&self, next: u64) -> Option<Chunk> {
        if next > self.end {
            return None;
        }
        Some(Chunk {
            id: self.id,
            start: next.max(self.start),
            end: self.end,
        })
    }
}

/// Outcome of probing a single candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeResult {
    /// The candidate unlocked a probe-sized read.
    Accepted(String),

    /// Inconclusive, e.g. the archive lists no files.
    Rejected,

    /// The oracle refused the candidate.
    OracleError(crate::error::ProbeError),
}

/// Result of a whole search run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "password", rename_all = "lowercase")]
pub enum SearchOutcome {
    /// A candidate passed confirmation.
    Found(String),

    /// Every chunk finished without a confirmed candidate.
    Exhausted,

    /// The run was interrupted before exhaustion.
    Cancelled,
}

/// How much of an entry the probe decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbePolicy {
    /// Entries smaller than this are read completely (default: 1 MiB)
    pub full_read_threshold: u64,

    /// Bytes read from larger entries (default: 1 KiB)
    pub prefix_bytes: u64,
}

impl Default for ProbePolicy {
    fn default() -> Self {
        Self {
            full_read_threshold: 1024 * 1024,
            prefix_bytes: 1024,
        }
    }
}

impl ProbePolicy {
    /// Read budget for an entry of `size` bytes. A budget of at least `size`
    /// means the whole entry is decoded, including its integrity check.
    pub fn read_budget(&self, size: u64) -> u64 {
        if size < self.full_read_threshold {
            size
        } else {
            self.prefix_bytes
        }
    }
}

/// Options for a recovery run.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Number of digits in every candidate (default: 8)
    pub width: u32,

    /// First candidate to test
    pub lower: u64,

    /// Last candidate to test, `None` for `10^width - 1`
    pub upper: Option<u64>,

    /// Number of workers, `None` for the available parallelism
    pub workers: Option<usize>,

    /// Probe read budget
    pub probe: ProbePolicy,

    /// Where the confirmed archive is extracted, `None` for
    /// `<archive parent>/extracted`
    pub output_dir: Option<PathBuf>,

    /// How to handle file conflicts in the output directory
    pub overwrite: OverwriteMode,

    /// Maximum total extracted size in bytes (default: 20 GB)
    pub size_limit_bytes: Option<u64>,

    /// How often progress events are emitted
    pub progress_interval: Duration,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            width: 8,
            lower: 0,
            upper: None,
            workers: None,
            probe: ProbePolicy::default(),
            output_dir: None,
            overwrite: OverwriteMode::Rename,
            size_limit_bytes: Some(20 * 1024 * 1024 * 1024), // 20 GB
            progress_interval: Duration::from_millis(250),
        }
    }
}

impl SearchConfig {
    /// Validated search space described by this configuration.
    pub fn space(&self) -> Result<SearchSpace, SearchError> {
        match self.upper {
            Some(upper) => SearchSpace::new(self.lower, upper, self.width),
            None => {
                let full = SearchSpace::full(self.width)?;
                SearchSpace::new(self.lower, full.upper(), self.width)
            }
        }
    }

    /// Requested worker count, never zero.
    pub fn worker_count(&self) -> usize {
        self.workers
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
            .max(1)
    }

    /// Extraction directory for `archive_path`.
    pub fn output_dir_for(&self, archive_path: &Path) -> PathBuf {
        match &self.output_dir {
            Some(dir) => dir.clone(),
            None => archive_path
                .parent()
                .unwrap_or(Path::new("."))
                .join("extracted"),
        }
    }
}

/// How to handle file conflicts during extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverwriteMode {
    /// Replace existing files
    Replace,

    /// Skip files that already exist
    Skip,

    /// Rename new files by appending (1), (2), etc.
    Rename,
}

/// Per-kind count of rejected candidates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeTally {
    /// Inconclusive probes (no files listed)
    pub rejected: u64,

    /// Probes refused with a wrong password
    pub wrong_password: u64,

    /// Probes that decoded corrupt data
    pub corrupt: u64,

    /// Unexpected oracle failures
    pub other: u64,
}

impl ProbeTally {
    pub fn record(&mut self, result: &ProbeResult) {
        use crate::error::ProbeError;

        match result {
            ProbeResult::Accepted(_) => {}
            ProbeResult::Rejected => self.rejected += 1,
            ProbeResult::OracleError(ProbeError::WrongPassword) => self.wrong_password += 1,
            ProbeResult::OracleError(ProbeError::Corrupt(_)) => self.corrupt += 1,
            ProbeResult::OracleError(ProbeError::Other(_)) => self.other += 1,
        }
    }

    pub fn merge(&mut self, other: &ProbeTally) {
        self.rejected += other.rejected;
        self.wrong_password += other.wrong_password;
        self.corrupt += other.corrupt;
        self.other += other.other;
    }
}

/// Statistics about a completed extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractStats {
    /// Number of files successfully extracted
    pub files_extracted: u64,

    /// Total bytes written to disk
    pub bytes_written: u64,
}

/// Summary of a finished recovery run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchReport {
    pub outcome: SearchOutcome,

    /// Wall time of the whole run (in seconds)
    #[serde(with = "duration_serde")]
    pub elapsed: Duration,

    /// Number of candidates probed
    pub tested: u64,

    /// Number of search attempts, one plus the number of resumes
    pub attempts: u32,

    /// Candidates that passed the probe but failed confirmation
    pub false_positives: Vec<String>,

    pub tally: ProbeTally,

    /// Where the confirmed archive was extracted
    pub output_dir: Option<PathBuf>,

    pub extraction: Option<ExtractStats>,
}

// Helper module for Duration serialization
pub(crate) mod duration_serde {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(duration.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_space_full() {
        let space = SearchSpace::full(8).unwrap();
        assert_eq!(space.lower(), 0);
        assert_eq!(space.upper(), 99_999_999);
        assert_eq!(space.len(), 100_000_000);
    }

    #[test]
    fn test_search_space_widest() {
        let space = SearchSpace::full(MAX_WIDTH).unwrap();
        assert_eq!(space.upper(), 9_999_999_999_999_999_999);
    }

    #[test]
    fn test_search_space_invalid() {
        assert!(SearchSpace::new(10, 5, 4).is_err());
        assert!(SearchSpace::new(0, 1000, 3).is_err());
        assert!(SearchSpace::full(0).is_err());
        assert!(SearchSpace::full(MAX_WIDTH + 1).is_err());
    }

    #[test]
    fn test_chunk_resume_from() {
        let chunk = Chunk { id: 2, start: 10, end: 19 };
        assert_eq!(chunk.resume_from(15), Some(Chunk { id: 2, start: 15, end: 19 }));
        assert_eq!(chunk.resume_from(19), Some(Chunk { id: 2, start: 19, end: 19 }));
        assert_eq!(chunk.resume_from(20), None);
        assert_eq!(chunk.resume_from(3), Some(chunk));
    }

    #[test]
    fn test_probe_policy_budget() {
        let policy = ProbePolicy::default();
        assert_eq!(policy.read_budget(500), 500);
        assert_eq!(policy.read_budget(1024 * 1024 - 1), 1024 * 1024 - 1);
        assert_eq!(policy.read_budget(1024 * 1024), 1024);
        assert_eq!(policy.read_budget(u64::MAX), 1024);
    }

    #[test]
    fn test_config_space_defaults() {
        let config = SearchConfig::default();
        let space = config.space().unwrap();
        assert_eq!(space.width(), 8);
        assert_eq!(space.upper(), 99_999_999);

        let config = SearchConfig {
            lower: 100,
            upper: Some(200),
            width: 4,
            ..SearchConfig::default()
        };
        let space = config.space().unwrap();
        assert_eq!((space.lower(), space.upper()), (100, 200));
    }

    #[test]
    fn test_output_dir_defaults_next_to_archive() {
        let config = SearchConfig::default();
        assert_eq!(
            config.output_dir_for(Path::new("/data/secret.rar")),
            PathBuf::from("/data/extracted")
        );

        let config = SearchConfig {
            output_dir: Some(PathBuf::from("/tmp/out")),
            ..SearchConfig::default()
        };
        assert_eq!(
            config.output_dir_for(Path::new("/data/secret.rar")),
            PathBuf::from("/tmp/out")
        );
    }

    #[test]
    fn test_worker_count_never_zero() {
        let config = SearchConfig {
            workers: Some(0),
            ..SearchConfig::default()
        };
        assert_eq!(config.worker_count(), 1);
        assert!(SearchConfig::default().worker_count() >= 1);
    }

    #[test]
    fn test_outcome_serialization() {
        let found = serde_json::to_value(SearchOutcome::Found("00042000".into())).unwrap();
        assert_eq!(found["status"], "found");
        assert_eq!(found["password"], "00042000");

        let exhausted = serde_json::to_value(SearchOutcome::Exhausted).unwrap();
        assert_eq!(exhausted["status"], "exhausted");
    }
}
