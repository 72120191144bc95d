//! RAR sessions over the `unrar` crate.
//!
//! `unrar` archives are single-pass cursors, so every operation reopens the
//! archive with the session's current password.

use super::OracleSession;
use crate::error::{ExtractionError, OracleOpenError, ProbeError};
use crate::safety::{check_size_limits, validate_entry_path};
use crate::types::{ArchiveEntry, ExtractStats};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;
use unrar::error::{Code, UnrarError};
use unrar::Archive;

pub struct RarSession {
    path: PathBuf,
    password: Option<String>,
    size_limit_bytes: Option<u64>,
}

impl RarSession {
    /// Open a session after checking that the first header can be read.
    ///
    /// `unrar` accepts anything that starts with the RAR signature and only
    /// fails once headers are read, so a damaged archive would otherwise look
    /// like an empty one. Archives with encrypted headers pass: their header
    /// fails with a password error, which only a candidate can resolve.
    pub fn open(path: &Path, size_limit_bytes: Option<u64>) -> Result<Self, OracleOpenError> {
        let listing = Archive::new(path)
            .as_first_part()
            .open_for_listing()
            .map_err(open_error)?;

        match listing.read_header() {
            Ok(Some(_)) => {}
            Ok(None) => {
                return Err(OracleOpenError::NotAnArchive(format!(
                    "{} has no readable entries",
                    path.display()
                )))
            }
            Err(e) if is_password_error(&e) => {}
            Err(e) => return Err(open_error(e)),
        }

        Ok(Self {
            path: path.to_path_buf(),
            password: None,
            size_limit_bytes,
        })
    }

    fn archive(&self) -> Archive<'_> {
        let archive = match &self.password {
            Some(password) => Archive::with_password(&self.path, password.as_bytes()),
            None => Archive::new(&self.path),
        };
        // Multi-volume sets are always read from the first part
        archive.as_first_part()
    }
}

impl OracleSession for RarSession {
    fn set_password(&mut self, password: &str) {
        self.password = Some(password.to_string());
    }

    fn list_entries(&mut self) -> Result<Vec<ArchiveEntry>, ProbeError> {
        let archive = self.archive().open_for_listing().map_err(probe_error)?;
        let mut entries = Vec::new();
        let mut current = Some(archive);

        while let Some(arch) = current {
            match arch.read_header().map_err(probe_error)? {
                Some(header) => {
                    let entry = header.entry();
                    entries.push(ArchiveEntry {
                        path: entry.filename.to_string_lossy().to_string(),
                        is_directory: entry.is_directory(),
                        size: entry.unpacked_size,
                    });
                    current = Some(header.skip().map_err(probe_error)?);
                }
                None => current = None,
            }
        }

        // The archive had a readable header when the session opened
        if entries.is_empty() {
            return Err(ProbeError::Corrupt("no readable entry headers".to_string()));
        }

        Ok(entries)
    }

    /// Test-decode `entry`, running its CRC check.
    ///
    /// `unrar` cannot stop inside an entry, so the whole entry is decoded
    /// whatever `max_bytes` says. Nothing is buffered.
    fn probe_read(&mut self, entry: &ArchiveEntry, _max_bytes: u64) -> Result<(), ProbeError> {
        let archive = self.archive().open_for_processing().map_err(probe_error)?;
        let mut current = Some(archive);

        while let Some(arch) = current {
            let Some(header) = arch.read_header().map_err(probe_error)? else {
                break;
            };

            if header.entry().filename.to_string_lossy() != entry.path {
                current = Some(header.skip().map_err(probe_error)?);
                continue;
            }

            header.test().map_err(probe_error)?;
            return Ok(());
        }

        Err(ProbeError::Other(format!("entry not found: {}", entry.path)))
    }

    fn extract_all(&mut self, destination: &Path) -> Result<ExtractStats, ExtractionError> {
        let archive = self
            .archive()
            .open_for_processing()
            .map_err(extraction_error)?;
        let mut stats = ExtractStats::default();
        let mut current = Some(archive);

        while let Some(arch) = current {
            let Some(header) = arch.read_header().map_err(extraction_error)? else {
                break;
            };

            let entry = header.entry();
            let entry_name = entry.filename.to_string_lossy().to_string();
            let is_directory = entry.is_directory();
            let unpacked_size = entry.unpacked_size;

            let relative = match validate_entry_path(Path::new(&entry_name)) {
                Ok(p) => p,
                Err(e) => {
                    warn!(entry = %entry_name, error = %e, "skipping unsafe entry");
                    current = Some(header.skip().map_err(extraction_error)?);
                    continue;
                }
            };
            let output_path = destination.join(&relative);

            if is_directory {
                fs::create_dir_all(&output_path)?;
                current = Some(header.skip().map_err(extraction_error)?);
                continue;
            }

            check_size_limits(stats.bytes_written + unpacked_size, self.size_limit_bytes)?;

            if let Some(parent) = output_path.parent() {
                fs::create_dir_all(parent)?;
            }
            current = Some(header.extract_to(&output_path).map_err(extraction_error)?);

            stats.files_extracted += 1;
            stats.bytes_written += unpacked_size;
        }

        Ok(stats)
    }
}

fn is_password_error(err: &UnrarError) -> bool {
    matches!(err.code, Code::MissingPassword | Code::BadPassword)
}

fn open_error(err: UnrarError) -> OracleOpenError {
    match err.code {
        Code::EOpen | Code::ERead => {
            OracleOpenError::Io(io::Error::new(io::ErrorKind::NotFound, err.to_string()))
        }
        _ => OracleOpenError::NotAnArchive(err.to_string()),
    }
}

fn probe_error(err: UnrarError) -> ProbeError {
    match err.code {
        Code::MissingPassword | Code::BadPassword => ProbeError::WrongPassword,
        Code::BadData | Code::BadArchive | Code::UnknownFormat => {
            ProbeError::Corrupt(err.to_string())
        }
        _ => ProbeError::Other(err.to_string()),
    }
}

fn extraction_error(err: UnrarError) -> ExtractionError {
    match err.code {
        // The archive vanished or cannot be read any more
        Code::EOpen | Code::ERead => ExtractionError::Open(open_error(err)),
        Code::ECreate | Code::EWrite | Code::EClose => {
            ExtractionError::Io(io::Error::other(err.to_string()))
        }
        _ => probe_error(err).into(),
    }
}
