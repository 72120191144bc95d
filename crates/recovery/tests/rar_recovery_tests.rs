//! End to end recovery of encrypted RAR 4 and RAR 5 archives.
//!
//! Both fixtures hold `secret.txt` and `docs/notes.txt`, encrypted with the
//! password `00000042`.

use recovery::{recover, OracleOpenError, SearchConfig, SearchError, SearchEvent, SearchOutcome};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const FIXTURES: [&str; 2] = ["secret-rar4.rar", "secret-rar5.rar"];

/// Copy a checked-in fixture next to a fresh output directory.
fn fixture(temp_dir: &TempDir, name: &str) -> PathBuf {
    let source = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name);
    let path = temp_dir.path().join(name);
    fs::copy(source, &path).unwrap();
    path
}

fn config(upper: u64, workers: usize) -> SearchConfig {
    SearchConfig {
        upper: Some(upper),
        workers: Some(workers),
        progress_interval: Duration::from_millis(20),
        ..SearchConfig::default()
    }
}

fn no_cancel() -> Arc<AtomicBool> {
    Arc::new(AtomicBool::new(false))
}

#[test]
fn test_recovers_rar_password() {
    for name in FIXTURES {
        let temp_dir = TempDir::new().unwrap();
        let archive = fixture(&temp_dir, name);

        let report = recover(&archive, &config(49, 4), &|_: &SearchEvent| {}, no_cancel())
            .unwrap();

        assert_eq!(
            report.outcome,
            SearchOutcome::Found("00000042".to_string()),
            "{}",
            name
        );
        assert!(report.false_positives.is_empty(), "{}", name);

        let output = temp_dir.path().join("extracted");
        assert_eq!(report.output_dir.as_deref(), Some(output.as_path()));
        assert_eq!(report.extraction.as_ref().unwrap().files_extracted, 2);
        assert_eq!(
            fs::read_to_string(output.join("secret.txt")).unwrap(),
            "the treasure is buried under the old oak\n"
        );
        assert_eq!(
            fs::read_to_string(output.join("docs/notes.txt")).unwrap(),
            "remember to rotate the backups\n"
        );

        let leftovers: Vec<_> = fs::read_dir(&output)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".staging-"))
            .collect();
        assert!(leftovers.is_empty(), "{}", name);
    }
}

#[test]
fn test_password_outside_space_is_exhausted() {
    let temp_dir = TempDir::new().unwrap();

    let archive = fixture(&temp_dir, "secret-rar5.rar");
    let report = recover(&archive, &config(9, 2), &|_: &SearchEvent| {}, no_cancel()).unwrap();
    assert_eq!(report.outcome, SearchOutcome::Exhausted);
    assert_eq!(report.tested, 10);
    assert_eq!(report.tally.wrong_password, 10);

    // RAR 4 has no password check value, so wrong keys surface as bad data
    let archive = fixture(&temp_dir, "secret-rar4.rar");
    let report = recover(&archive, &config(9, 2), &|_: &SearchEvent| {}, no_cancel()).unwrap();
    assert_eq!(report.outcome, SearchOutcome::Exhausted);
    assert_eq!(report.tested, 10);
    assert_eq!(report.tally.corrupt, 10);

    assert!(!temp_dir.path().join("extracted").exists());
}

#[test]
fn test_damaged_rar_is_not_reported_as_exhausted() {
    let temp_dir = TempDir::new().unwrap();

    for (name, bytes) in [
        ("broken5.rar", &b"Rar!\x1a\x07\x01\x00garbage"[..]),
        ("broken4.rar", &b"Rar!\x1a\x07\x00garbage"[..]),
    ] {
        let archive = temp_dir.path().join(name);
        fs::write(&archive, bytes).unwrap();

        let result = recover(&archive, &config(99, 2), &|_: &SearchEvent| {}, no_cancel());

        assert!(
            matches!(
                result,
                Err(SearchError::ChunksFailed {
                    failed: 2,
                    total: 2,
                    source: OracleOpenError::NotAnArchive(_)
                })
            ),
            "{}: {:?}",
            name,
            result
        );
    }
}
