//! The archive oracle: everything that actually understands a container format.
//!
//! The search engine never decrypts anything itself. It opens a session per
//! candidate through [`ArchiveOracle`] and asks it questions through
//! [`OracleSession`]. [`SystemOracle`] answers them for RAR (via `unrar`) and
//! ZIP (via `zip`) archives; tests plug in scripted oracles.

pub mod rar;
pub mod zip;

use crate::error::{ExtractionError, OracleOpenError, ProbeError};
use crate::types::{ArchiveEntry, ExtractStats};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Signature shared by RAR 1.5-4.x (`Rar!\x1a\x07\x00`) and RAR 5 (`Rar!\x1a\x07\x01\x00`).
const RAR_MAGIC: &[u8] = b"Rar!\x1a\x07";
const ZIP_LOCAL_MAGIC: &[u8] = b"PK\x03\x04";
const ZIP_EMPTY_MAGIC: &[u8] = b"PK\x05\x06";

/// A source of isolated archive sessions.
///
/// Shared by every worker, so it must be `Sync`; sessions never leave the
/// thread that opened them.
pub trait ArchiveOracle: Sync {
    type Session: OracleSession;

    /// Open a fresh session on the archive at `path`.
    fn open(&self, path: &Path) -> Result<Self::Session, OracleOpenError>;
}

/// One isolated conversation with an archive.
pub trait OracleSession {
    /// Use `password` for every following operation, replacing any previous one.
    fn set_password(&mut self, password: &str);

    /// Entries in archive order. Archives with encrypted headers report
    /// [`ProbeError::WrongPassword`] here.
    fn list_entries(&mut self) -> Result<Vec<ArchiveEntry>, ProbeError>;

    /// Decode up to `max_bytes` of `entry`. A budget covering the whole entry
    /// also runs the container's integrity check.
    fn probe_read(&mut self, entry: &ArchiveEntry, max_bytes: u64) -> Result<(), ProbeError>;

    /// Extract every entry below `destination`.
    fn extract_all(&mut self, destination: &Path) -> Result<ExtractStats, ExtractionError>;
}

impl<S: OracleSession + ?Sized> OracleSession for Box<S> {
    fn set_password(&mut self, password: &str) {
        (**self).set_password(password)
    }

    fn list_entries(&mut self) -> Result<Vec<ArchiveEntry>, ProbeError> {
        (**self).list_entries()
    }

    fn probe_read(&mut self, entry: &ArchiveEntry, max_bytes: u64) -> Result<(), ProbeError> {
        (**self).probe_read(entry, max_bytes)
    }

    fn extract_all(&mut self, destination: &Path) -> Result<ExtractStats, ExtractionError> {
        (**self).extract_all(destination)
    }
}

/// Container formats the system oracle understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Rar,
    Zip,
}

/// Oracle backed by the `unrar` and `zip` crates.
#[derive(Debug, Clone, Default)]
pub struct SystemOracle {
    size_limit_bytes: Option<u64>,
}

impl SystemOracle {
    /// Oracle whose extractions stop once `size_limit_bytes` have been written.
    pub fn new(size_limit_bytes: Option<u64>) -> Self {
        Self { size_limit_bytes }
    }
}

impl ArchiveOracle for SystemOracle {
    type Session = Box<dyn OracleSession>;

    fn open(&self, path: &Path) -> Result<Self::Session, OracleOpenError> {
        match detect_format(path)? {
            ArchiveFormat::Rar => Ok(Box::new(rar::RarSession::open(
                path,
                self.size_limit_bytes,
            )?)),
            ArchiveFormat::Zip => Ok(Box::new(zip::ZipSession::open(
                path,
                self.size_limit_bytes,
            )?)),
        }
    }
}

/// Detect the archive format from its leading magic bytes.
pub fn detect_format(path: &Path) -> Result<ArchiveFormat, OracleOpenError> {
    let file = File::open(path)?;
    let mut magic = Vec::with_capacity(8);
    file.take(8).read_to_end(&mut magic)?;

    if magic.starts_with(RAR_MAGIC) {
        Ok(ArchiveFormat::Rar)
    } else if magic.starts_with(ZIP_LOCAL_MAGIC) || magic.starts_with(ZIP_EMPTY_MAGIC) {
        Ok(ArchiveFormat::Zip)
    } else {
        Err(OracleOpenError::NotAnArchive(format!(
            "{} is neither a RAR nor a ZIP archive",
            path.display()
        )))
    }
}

/// Classify an oracle failure by its message.
///
/// `zip` reports some wrong passwords, CRC failures and plain I/O problems
/// through the same error variants, so the message is the only signal left.
pub(crate) fn classify_message(message: &str) -> ProbeError {
    let lower = message.to_lowercase();

    if lower.contains("password") || lower.contains("encrypted") || lower.contains("decrypt") {
        ProbeError::WrongPassword
    } else if lower.contains("corrupt")
        || lower.contains("bad")
        || lower.contains("crc")
        || lower.contains("checksum")
        || lower.contains("authentication")
        || lower.contains("invalid")
    {
        ProbeError::Corrupt(message.to_string())
    } else {
        ProbeError::Other(message.to_string())
    }
}
