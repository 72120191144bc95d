//! Parallel search coordination.
//!
//! A run is a sequence of attempts. Each attempt builds a worker pool, hands
//! every pending chunk to its own worker and waits for all of them to report.
//! An accepted candidate stops every chunk above it at its next candidate;
//! chunks below it keep searching, so the lowest chunk holding an acceptable
//! candidate always reports it. Accepted candidates are then confirmed in
//! chunk order; when none survives confirmation, the next attempt searches
//! whatever the stopped chunks had not reached yet.

use crate::confirm::{confirm, Confirmation};
use crate::error::{OracleOpenError, SearchError};
use crate::events::SearchEvent;
use crate::oracle::ArchiveOracle;
use crate::partition::partition_space;
use crate::types::{Chunk, ProbeTally, SearchConfig, SearchOutcome, SearchReport};
use crate::worker::{run_chunk, ChunkReport, ChunkStatus, StopSignals};
use crossbeam_channel::RecvTimeoutError;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Drives one recovery run against one archive.
pub struct Coordinator<'a, O: ArchiveOracle> {
    oracle: &'a O,
    archive_path: &'a Path,
    config: &'a SearchConfig,
    on_event: &'a (dyn Fn(&SearchEvent) + Send + Sync + 'a),
    cancel_flag: Arc<AtomicBool>,
}

/// Bookkeeping carried across attempts.
#[derive(Default)]
struct RunState {
    attempts: u32,
    tally: ProbeTally,
    false_positives: Vec<String>,
    failed: Vec<OracleOpenError>,
}

impl<'a, O: ArchiveOracle> Coordinator<'a, O> {
    pub fn new(
        oracle: &'a O,
        archive_path: &'a Path,
        config: &'a SearchConfig,
        on_event: &'a (dyn Fn(&SearchEvent) + Send + Sync + 'a),
        cancel_flag: Arc<AtomicBool>,
    ) -> Self {
        Self {
            oracle,
            archive_path,
            config,
            on_event,
            cancel_flag,
        }
    }

    /// Search until a candidate is confirmed, the space is exhausted, or the
    /// cancel flag is raised.
    pub fn run(&self) -> Result<SearchReport, SearchError> {
        let start_time = Instant::now();
        let space = self.config.space()?;
        let workers = self.config.worker_count();
        let chunks = partition_space(&space, workers);
        let total_chunks = chunks.len();
        let output_dir = self.config.output_dir_for(self.archive_path);

        info!(
            archive = %self.archive_path.display(),
            lower = space.lower(),
            upper = space.upper(),
            workers,
            "starting password search"
        );
        self.emit(SearchEvent::Started {
            archive_path: self.archive_path.to_path_buf(),
            lower: space.lower(),
            upper: space.upper(),
            width: space.width(),
            workers,
            chunks: total_chunks,
        });

        let tested = AtomicU64::new(0);
        let mut state = RunState::default();
        let mut pending = chunks;

        let (outcome, confirmation) = loop {
            if pending.is_empty() {
                break (SearchOutcome::Exhausted, None);
            }
            if self.cancelled() {
                break (SearchOutcome::Cancelled, None);
            }

            state.attempts += 1;
            self.emit(SearchEvent::AttemptStarted {
                attempt: state.attempts,
                chunks: pending.len(),
                candidates: pending.iter().map(Chunk::len).sum(),
            });

            let reports = self.run_attempt(&pending, space.width(), &tested, space.len())?;
            let (accepted, next) = self.collect(reports, &mut state);

            if self.cancelled() {
                for (_, candidate) in &accepted {
                    warn!(%candidate, "search cancelled before confirming candidate");
                }
                break (SearchOutcome::Cancelled, None);
            }

            if let Some((password, confirmation)) =
                self.confirm_accepted(accepted, &output_dir, &mut state, start_time)?
            {
                break (SearchOutcome::Found(password), Some(confirmation));
            }

            pending = next;
        };

        if outcome == SearchOutcome::Exhausted && !state.failed.is_empty() {
            let failed = state.failed.len();
            return Err(SearchError::ChunksFailed {
                failed,
                total: total_chunks,
                source: state.failed.swap_remove(0),
            });
        }

        let elapsed = start_time.elapsed();
        let tested = tested.load(Ordering::Relaxed);
        info!(outcome = ?outcome, tested, elapsed = ?elapsed, "password search finished");
        self.emit(SearchEvent::Finished {
            outcome: outcome.clone(),
            elapsed,
            tested,
        });

        Ok(SearchReport {
            outcome,
            elapsed,
            tested,
            attempts: state.attempts,
            false_positives: state.false_positives,
            tally: state.tally,
            output_dir: confirmation.as_ref().map(|c| c.output_dir.clone()),
            extraction: confirmation.map(|c| c.stats),
        })
    }

    /// Run one attempt over `chunks` and return every chunk's report in
    /// chunk order.
    fn run_attempt(
        &self,
        chunks: &[Chunk],
        width: u32,
        tested: &AtomicU64,
        total: u64,
    ) -> Result<Vec<ChunkReport>, SearchError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(chunks.len())
            .thread_name(|i| format!("recovery-worker-{}", i))
            .build()?;
        let signals = StopSignals::new(self.cancel_flag.clone());
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut reports = Vec::with_capacity(chunks.len());

        // The scope returns only after every worker has returned, so no worker
        // outlives the attempt
        pool.in_place_scope(|scope| {
            for &chunk in chunks {
                let tx = tx.clone();
                let signals = &signals;
                scope.spawn(move |_| {
                    let report = run_chunk(
                        self.oracle,
                        self.archive_path,
                        chunk,
                        width,
                        &self.config.probe,
                        signals,
                        tested,
                    );
                    let _ = tx.send(report);
                });
            }
            drop(tx);

            while reports.len() < chunks.len() {
                match rx.recv_timeout(self.config.progress_interval) {
                    Ok(report) => reports.push(report),
                    Err(RecvTimeoutError::Timeout) => self.emit(SearchEvent::Progress {
                        tested: tested.load(Ordering::Relaxed),
                        total,
                    }),
                    // Only reachable when a worker panicked; the scope re-raises it
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        });

        reports.sort_by_key(|r| r.chunk.id);
        Ok(reports)
    }

    /// Split reports into accepted candidates and the chunks left to search.
    fn collect(
        &self,
        reports: Vec<ChunkReport>,
        state: &mut RunState,
    ) -> (Vec<(usize, String)>, Vec<Chunk>) {
        let mut accepted = Vec::new();
        let mut next = Vec::new();

        for report in reports {
            state.tally.merge(&report.tally);
            if let Some(rest) = report.remaining() {
                next.push(rest);
            }

            let chunk_id = report.chunk.id;
            match report.status {
                ChunkStatus::Accepted { candidate, .. } => accepted.push((chunk_id, candidate)),
                ChunkStatus::Exhausted => self.emit(SearchEvent::ChunkExhausted { chunk_id }),
                ChunkStatus::Stopped { next: resume_at } => {
                    debug!(chunk = chunk_id, resume_at, "chunk will resume");
                }
                ChunkStatus::Failed(e) => {
                    warn!(chunk = chunk_id, error = %e, "chunk failed");
                    self.emit(SearchEvent::ChunkFailed {
                        chunk_id,
                        error: e.to_string(),
                    });
                    state.failed.push(e);
                }
            }
        }

        (accepted, next)
    }

    /// Confirm accepted candidates in chunk order. The first one that
    /// extracts wins; the others are recorded as false positives.
    fn confirm_accepted(
        &self,
        accepted: Vec<(usize, String)>,
        output_dir: &Path,
        state: &mut RunState,
        start_time: Instant,
    ) -> Result<Option<(String, Confirmation)>, SearchError> {
        for (chunk_id, candidate) in accepted {
            info!(%candidate, chunk = chunk_id, "potential password found, verifying");
            self.emit(SearchEvent::CandidateAccepted {
                candidate: candidate.clone(),
                chunk_id,
                elapsed: start_time.elapsed(),
            });

            match confirm(
                self.oracle,
                self.archive_path,
                &candidate,
                output_dir,
                self.config.overwrite,
            ) {
                Ok(confirmation) => {
                    info!(%candidate, "password confirmed");
                    self.emit(SearchEvent::Confirmed {
                        candidate: candidate.clone(),
                        output_dir: confirmation.output_dir.clone(),
                        stats: confirmation.stats.clone(),
                    });
                    return Ok(Some((candidate, confirmation)));
                }
                Err(e) if e.is_fatal() => return Err(SearchError::Extraction(e)),
                Err(e) => {
                    warn!(%candidate, error = %e, "false positive, continuing search");
                    self.emit(SearchEvent::FalsePositive {
                        candidate: candidate.clone(),
                        error: e.to_string(),
                    });
                    state.false_positives.push(candidate);
                }
            }
        }

        Ok(None)
    }

    fn cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::Relaxed)
    }

    fn emit(&self, event: SearchEvent) {
        (self.on_event)(&event);
    }
}
