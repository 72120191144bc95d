//! Authoritative confirmation of an accepted candidate.
//!
//! The probe only decodes a single entry, so a candidate is not trusted until
//! the whole archive extracts with it. Extraction goes to a hidden staging
//! directory inside the output directory; files are moved into place only
//! after every entry decoded. A failed extraction leaves nothing behind, and
//! an interrupted one leaves only a `.staging-*` directory.
//!
//! Publishing is undone if a move fails part way: files already placed are
//! removed and replaced originals are put back.

use crate::error::ExtractionError;
use crate::oracle::{ArchiveOracle, OracleSession};
use crate::types::{ExtractStats, OverwriteMode};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Prefix of in-progress extraction directories.
pub const STAGING_PREFIX: &str = ".staging-";

/// A confirmed password and where its archive was extracted.
#[derive(Debug, Clone)]
pub struct Confirmation {
    pub output_dir: PathBuf,
    pub stats: ExtractStats,
}

/// Extract `archive_path` with `candidate` into `output_dir`.
///
/// `output_dir` is created if missing. On any error the staged output is
/// removed and the output directory is left as it was.
pub fn confirm<O: ArchiveOracle>(
    oracle: &O,
    archive_path: &Path,
    candidate: &str,
    output_dir: &Path,
    overwrite: OverwriteMode,
) -> Result<Confirmation, ExtractionError> {
    let start_time = Instant::now();

    fs::create_dir_all(output_dir)?;
    let staging = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempdir_in(output_dir)?;
    let extracted = staging.path().join("files");
    let displaced = staging.path().join("displaced");
    fs::create_dir(&extracted)?;
    fs::create_dir(&displaced)?;

    let mut session = oracle.open(archive_path)?;
    session.set_password(candidate);
    let stats = session.extract_all(&extracted)?;

    let mut published = Published::new(displaced);
    if let Err(e) = publish(&extracted, output_dir, overwrite, &mut published) {
        warn!(error = %e, output = %output_dir.display(), "publishing failed, rolling back");
        published.rollback();
        return Err(e.into());
    }
    staging.close()?;

    info!(
        files = stats.files_extracted,
        bytes = stats.bytes_written,
        elapsed = ?start_time.elapsed(),
        output = %output_dir.display(),
        "extraction confirmed"
    );

    Ok(Confirmation {
        output_dir: output_dir.to_path_buf(),
        stats,
    })
}

/// Moves made while publishing, in order.
struct Published {
    displaced_dir: PathBuf,
    placed: Vec<PathBuf>,
    displaced: Vec<(PathBuf, PathBuf)>,
}

impl Published {
    fn new(displaced_dir: PathBuf) -> Self {
        Self {
            displaced_dir,
            placed: Vec::new(),
            displaced: Vec::new(),
        }
    }

    /// Move an existing `path` aside so it can be restored later.
    fn displace(&mut self, path: &Path) -> io::Result<()> {
        let parking = self.displaced_dir.join(self.displaced.len().to_string());
        fs::rename(path, &parking)?;
        self.displaced.push((path.to_path_buf(), parking));
        Ok(())
    }

    /// Undo every recorded move, newest first.
    fn rollback(self) {
        for path in self.placed.iter().rev() {
            let removed = if path.is_dir() {
                fs::remove_dir_all(path)
            } else {
                fs::remove_file(path)
            };
            if let Err(e) = removed {
                warn!(path = %path.display(), error = %e, "cannot remove published entry");
            }
        }

        for (original, parking) in self.displaced.iter().rev() {
            if let Err(e) = fs::rename(parking, original) {
                warn!(path = %original.display(), error = %e, "cannot restore replaced entry");
            }
        }
    }
}

/// Move everything below `from` into `to`, merging directories.
fn publish(
    from: &Path,
    to: &Path,
    mode: OverwriteMode,
    published: &mut Published,
) -> io::Result<()> {
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let source = entry.path();
        let target = to.join(entry.file_name());

        if entry.file_type()?.is_dir() && target.is_dir() {
            publish(&source, &target, mode, published)?;
            continue;
        }

        let Some(destination) = handle_overwrite_mode(&target, mode)? else {
            debug!(path = %target.display(), "keeping existing file");
            continue;
        };

        if destination.exists() {
            published.displace(&destination)?;
        }
        fs::rename(&source, &destination)?;
        published.placed.push(destination);
    }

    Ok(())
}

/// Resolve where a new file lands when `path` may already exist.
///
/// Returns `None` when the file must be skipped.
fn handle_overwrite_mode(path: &Path, mode: OverwriteMode) -> io::Result<Option<PathBuf>> {
    if !path.exists() {
        return Ok(Some(path.to_path_buf()));
    }

    match mode {
        OverwriteMode::Replace => Ok(Some(path.to_path_buf())),
        OverwriteMode::Skip => Ok(None),
        OverwriteMode::Rename => {
            let parent = path.parent().unwrap_or(Path::new(""));
            let file_stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("file");
            let extension = path.extension().and_then(|s| s.to_str());

            for i in 1..1000 {
                let new_name = match extension {
                    Some(ext) => format!("{} ({}).{}", file_stem, i, ext),
                    None => format!("{} ({})", file_stem, i),
                };

                let new_path = parent.join(new_name);
                if !new_path.exists() {
                    return Ok(Some(new_path));
                }
            }

            Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "Could not find unique filename",
            ))
        }
    }
}
