//! Per-chunk candidate enumeration.

use crate::candidate::render;
use crate::error::{OracleOpenError, ProbeError};
use crate::oracle::{ArchiveOracle, OracleSession};
use crate::types::{Chunk, ProbePolicy, ProbeResult, ProbeTally};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Stop flags every worker polls before each candidate.
#[derive(Debug)]
pub struct StopSignals {
    /// Set by the caller (interrupt, deadline)
    pub cancel: Arc<AtomicBool>,

    /// Lowest chunk id that accepted a candidate in this attempt
    lowest_accepted: AtomicUsize,
}

impl StopSignals {
    pub fn new(cancel: Arc<AtomicBool>) -> Self {
        Self {
            cancel,
            lowest_accepted: AtomicUsize::new(usize::MAX),
        }
    }

    /// Record an accept in `chunk_id`. Chunks above it stop; chunks below it
    /// keep going, since any candidate they hold is lower.
    pub fn accept(&self, chunk_id: usize) {
        self.lowest_accepted.fetch_min(chunk_id, Ordering::AcqRel);
    }

    pub fn should_stop(&self, chunk_id: usize) -> bool {
        self.cancel.load(Ordering::Relaxed)
            || chunk_id > self.lowest_accepted.load(Ordering::Acquire)
    }
}

/// How a chunk ended.
#[derive(Debug)]
pub enum ChunkStatus {
    /// A candidate passed the probe; the chunk continues at `number + 1`.
    Accepted { candidate: String, number: u64 },

    /// Every candidate was tested.
    Exhausted,

    /// A stop signal arrived before `next` was tested.
    Stopped { next: u64 },

    /// The archive could not be opened.
    Failed(OracleOpenError),
}

/// What a worker hands back to the coordinator.
#[derive(Debug)]
pub struct ChunkReport {
    pub chunk: Chunk,
    pub status: ChunkStatus,
    pub tested: u64,
    pub tally: ProbeTally,
}

impl ChunkReport {
    /// The untested remainder of the chunk, if it should be searched again.
    pub fn remaining(&self) -> Option<Chunk> {
        match &self.status {
            ChunkStatus::Accepted { number, .. } => number
                .checked_add(1)
                .and_then(|next| self.chunk.resume_from(next)),
            ChunkStatus::Stopped { next } => self.chunk.resume_from(*next),
            ChunkStatus::Exhausted | ChunkStatus::Failed(_) => None,
        }
    }
}

/// Test every candidate of `chunk` in ascending order.
///
/// Returns at the first accepted candidate, when the chunk is exhausted, when
/// the caller cancels or a lower chunk has accepted, or when the archive
/// cannot be opened. Per-candidate
/// oracle errors never end the chunk.
pub fn run_chunk<O: ArchiveOracle>(
    oracle: &O,
    archive_path: &Path,
    chunk: Chunk,
    width: u32,
    policy: &ProbePolicy,
    signals: &StopSignals,
    tested: &AtomicU64,
) -> ChunkReport {
    debug!(chunk = chunk.id, start = chunk.start, end = chunk.end, "chunk started");

    let mut report = ChunkReport {
        chunk,
        status: ChunkStatus::Exhausted,
        tested: 0,
        tally: ProbeTally::default(),
    };

    for number in chunk.start..=chunk.end {
        if signals.should_stop(chunk.id) {
            debug!(chunk = chunk.id, next = number, "chunk stopped");
            report.status = ChunkStatus::Stopped { next: number };
            return report;
        }

        let candidate = render(number, width);
        let result = probe_candidate(oracle, archive_path, &candidate, policy);
        report.tested += 1;
        tested.fetch_add(1, Ordering::Relaxed);

        match result {
            Ok(ProbeResult::Accepted(candidate)) => {
                debug!(chunk = chunk.id, %candidate, "candidate accepted by probe");
                signals.accept(chunk.id);
                report.status = ChunkStatus::Accepted { candidate, number };
                return report;
            }
            Ok(other) => {
                if let ProbeResult::OracleError(ProbeError::Other(msg)) = &other {
                    warn!(chunk = chunk.id, %candidate, error = %msg, "unexpected oracle error");
                } else {
                    trace!(chunk = chunk.id, %candidate, result = ?other, "candidate rejected");
                }
                report.tally.record(&other);
            }
            Err(e) => {
                warn!(chunk = chunk.id, error = %e, "cannot open archive");
                report.status = ChunkStatus::Failed(e);
                return report;
            }
        }
    }

    debug!(chunk = chunk.id, tested = report.tested, "chunk exhausted");
    report
}

/// Probe one candidate on a fresh session.
///
/// The first file entry is the probe target. Small entries are decoded
/// completely, large ones only up to the policy's prefix.
pub fn probe_candidate<O: ArchiveOracle>(
    oracle: &O,
    archive_path: &Path,
    candidate: &str,
    policy: &ProbePolicy,
) -> Result<ProbeResult, OracleOpenError> {
    let mut session = oracle.open(archive_path)?;
    session.set_password(candidate);

    let entries = match session.list_entries() {
        Ok(entries) => entries,
        Err(e) => return Ok(ProbeResult::OracleError(e)),
    };

    let Some(target) = entries.iter().find(|e| !e.is_directory) else {
        return Ok(ProbeResult::Rejected);
    };

    match session.probe_read(target, policy.read_budget(target.size)) {
        Ok(()) => Ok(ProbeResult::Accepted(candidate.to_string())),
        Err(e) => Ok(ProbeResult::OracleError(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExtractionError;
    use crate::types::{ArchiveEntry, ExtractStats};
    use std::collections::HashSet;

    /// Accepts a fixed set of passwords; "corrupt" and "weird" trigger the
    /// matching errors.
    struct SetOracle {
        accept: HashSet<String>,
        entries: Vec<ArchiveEntry>,
        broken: bool,
    }

    struct SetSession<'a> {
        oracle: &'a SetOracle,
        password: Option<String>,
    }

    impl SetOracle {
        fn new(accept: &[&str]) -> Self {
            Self {
                accept: accept.iter().map(|s| s.to_string()).collect(),
                entries: vec![
                    ArchiveEntry {
                        path: "dir".into(),
                        is_directory: true,
                        size: 0,
                    },
                    ArchiveEntry {
                        path: "dir/file.txt".into(),
                        is_directory: false,
                        size: 10,
                    },
                ],
                broken: false,
            }
        }
    }

    impl OracleSession for SetSession<'_> {
        fn set_password(&mut self, password: &str) {
            self.password = Some(password.to_string());
        }

        fn list_entries(&mut self) -> Result<Vec<ArchiveEntry>, ProbeError> {
            Ok(self.oracle.entries.clone())
        }

        fn probe_read(&mut self, entry: &ArchiveEntry, _max: u64) -> Result<(), ProbeError> {
            assert!(!entry.is_directory, "directories are never probed");
            match self.password.as_deref() {
                Some(p) if self.oracle.accept.contains(p) => Ok(()),
                Some("00000003") => Err(ProbeError::Corrupt("crc".into())),
                Some("00000004") => Err(ProbeError::Other("weird".into())),
                _ => Err(ProbeError::WrongPassword),
            }
        }

        fn extract_all(&mut self, _dest: &Path) -> Result<ExtractStats, ExtractionError> {
            Ok(ExtractStats::default())
        }
    }

    /// Sessions point back at the oracle, so the oracle is handed out by reference.
    struct Borrowed<'a>(&'a SetOracle);

    impl<'a> ArchiveOracle for Borrowed<'a> {
        type Session = SetSession<'a>;

        fn open(&self, _path: &Path) -> Result<Self::Session, OracleOpenError> {
            if self.0.broken {
                return Err(OracleOpenError::NotAnArchive("broken".into()));
            }
            Ok(SetSession {
                oracle: self.0,
                password: None,
            })
        }
    }

    fn run(oracle: &SetOracle, chunk: Chunk, signals: &StopSignals) -> ChunkReport {
        let tested = AtomicU64::new(0);
        let report = run_chunk(
            &Borrowed(oracle),
            Path::new("archive.rar"),
            chunk,
            8,
            &ProbePolicy::default(),
            signals,
            &tested,
        );
        assert_eq!(tested.load(Ordering::Relaxed), report.tested);
        report
    }

    fn signals() -> StopSignals {
        StopSignals::new(Arc::new(AtomicBool::new(false)))
    }

    #[test]
    fn test_run_chunk_accepts_first_match() {
        let oracle = SetOracle::new(&["00000012", "00000015"]);
        let report = run(&oracle, Chunk { id: 0, start: 10, end: 19 }, &signals());

        assert!(matches!(
            &report.status,
            ChunkStatus::Accepted { candidate, number: 12 } if candidate == "00000012"
        ));
        assert_eq!(report.tested, 3);
        assert_eq!(report.tally.wrong_password, 2);
        assert_eq!(report.remaining(), Some(Chunk { id: 0, start: 13, end: 19 }));
    }

    #[test]
    fn test_run_chunk_exhausts_and_tallies_errors() {
        let oracle = SetOracle::new(&[]);
        let report = run(&oracle, Chunk { id: 1, start: 0, end: 9 }, &signals());

        assert!(matches!(report.status, ChunkStatus::Exhausted));
        assert_eq!(report.tested, 10);
        assert_eq!(report.tally.corrupt, 1);
        assert_eq!(report.tally.other, 1);
        assert_eq!(report.tally.wrong_password, 8);
        assert_eq!(report.remaining(), None);
    }

    #[test]
    fn test_run_chunk_stops_before_first_candidate() {
        let oracle = SetOracle::new(&["00000001"]);
        let signals = signals();
        signals.accept(1);

        let report = run(&oracle, Chunk { id: 2, start: 0, end: 9 }, &signals);
        assert!(matches!(report.status, ChunkStatus::Stopped { next: 0 }));
        assert_eq!(report.tested, 0);
        assert_eq!(report.remaining(), Some(Chunk { id: 2, start: 0, end: 9 }));
    }

    #[test]
    fn test_lower_chunk_keeps_searching_after_higher_accept() {
        let oracle = SetOracle::new(&["00000008"]);
        let signals = signals();
        signals.accept(3);

        let report = run(&oracle, Chunk { id: 1, start: 5, end: 9 }, &signals);
        assert!(matches!(
            &report.status,
            ChunkStatus::Accepted { candidate, number: 8 } if candidate == "00000008"
        ));

        // The accept in chunk 1 now stops chunk 2, but not chunk 0
        assert!(signals.should_stop(2));
        assert!(!signals.should_stop(0));
        assert!(!signals.should_stop(1));
    }

    #[test]
    fn test_cancel_stops_every_chunk() {
        let signals = signals();
        signals.cancel.store(true, Ordering::Relaxed);
        assert!(signals.should_stop(0));
    }

    #[test]
    fn test_run_chunk_reports_open_failure() {
        let mut oracle = SetOracle::new(&["00000001"]);
        oracle.broken = true;

        let report = run(&oracle, Chunk { id: 3, start: 0, end: 9 }, &signals());
        assert!(matches!(report.status, ChunkStatus::Failed(_)));
        assert_eq!(report.remaining(), None);
    }

    #[test]
    fn test_probe_candidate_without_files_is_rejected() {
        let mut oracle = SetOracle::new(&["00000001"]);
        oracle.entries.retain(|e| e.is_directory);

        let result = probe_candidate(
            &Borrowed(&oracle),
            Path::new("archive.rar"),
            "00000001",
            &ProbePolicy::default(),
        );
        assert_eq!(result.unwrap(), ProbeResult::Rejected);
    }

    #[test]
    fn test_accepted_at_end_of_space_has_no_remainder() {
        let report = ChunkReport {
            chunk: Chunk { id: 0, start: 0, end: u64::MAX },
            status: ChunkStatus::Accepted {
                candidate: String::new(),
                number: u64::MAX,
            },
            tested: 1,
            tally: ProbeTally::default(),
        };
        assert_eq!(report.remaining(), None);
    }
}
