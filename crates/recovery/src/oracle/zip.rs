//! ZIP sessions over the `zip` crate, covering ZipCrypto and AES entries.
//!
//! The central directory is parsed once when the session opens. Passwords are
//! handed to the library per call, so nothing carries over between
//! candidates.

use super::{classify_message, OracleSession};
use crate::error::{ExtractionError, OracleOpenError, ProbeError};
use crate::safety::{check_size_limits, validate_entry_path};
use crate::types::{ArchiveEntry, ExtractStats};
use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::path::Path;
use tracing::warn;
use zip::read::ZipFile;
use zip::result::{ZipError, ZipResult};
use zip::ZipArchive;

pub struct ZipSession {
    archive: ZipArchive<BufReader<File>>,
    password: Option<String>,
    size_limit_bytes: Option<u64>,
}

impl ZipSession {
    pub fn open(path: &Path, size_limit_bytes: Option<u64>) -> Result<Self, OracleOpenError> {
        let file = File::open(path)?;
        let archive = ZipArchive::new(BufReader::new(file)).map_err(|e| match e {
            ZipError::Io(io_err) => OracleOpenError::Io(io_err),
            other => OracleOpenError::NotAnArchive(other.to_string()),
        })?;

        Ok(Self {
            archive,
            password: None,
            size_limit_bytes,
        })
    }

    fn by_name(&mut self, name: &str) -> ZipResult<ZipFile<'_, BufReader<File>>> {
        match &self.password {
            Some(password) => self.archive.by_name_decrypt(name, password.as_bytes()),
            None => self.archive.by_name(name),
        }
    }
}

impl OracleSession for ZipSession {
    fn set_password(&mut self, password: &str) {
        self.password = Some(password.to_string());
    }

    fn list_entries(&mut self) -> Result<Vec<ArchiveEntry>, ProbeError> {
        let mut entries = Vec::with_capacity(self.archive.len());

        for i in 0..self.archive.len() {
            // Raw access reads only the headers, which ZIP never encrypts
            let entry = self.archive.by_index_raw(i).map_err(probe_error)?;
            entries.push(ArchiveEntry {
                path: entry.name().to_string(),
                is_directory: entry.is_dir(),
                size: entry.size(),
            });
        }

        Ok(entries)
    }

    fn probe_read(&mut self, entry: &ArchiveEntry, max_bytes: u64) -> Result<(), ProbeError> {
        let mut file = self.by_name(&entry.path).map_err(probe_error)?;

        // Only reading to EOF runs the CRC / HMAC check
        let result = if max_bytes >= entry.size {
            io::copy(&mut file, &mut io::sink())
        } else {
            io::copy(&mut (&mut file).take(max_bytes), &mut io::sink())
        };

        result.map(|_| ()).map_err(read_error)
    }

    fn extract_all(&mut self, destination: &Path) -> Result<ExtractStats, ExtractionError> {
        let mut stats = ExtractStats::default();

        for i in 0..self.archive.len() {
            let mut file = match &self.password {
                Some(password) => self.archive.by_index_decrypt(i, password.as_bytes()),
                None => self.archive.by_index(i),
            }
            .map_err(|e| ExtractionError::from(probe_error(e)))?;

            let relative = match validate_entry_path(Path::new(file.name())) {
                Ok(p) => p,
                Err(e) => {
                    warn!(entry = %file.name(), error = %e, "skipping unsafe entry");
                    continue;
                }
            };
            let output_path = destination.join(&relative);

            if file.is_dir() {
                fs::create_dir_all(&output_path)?;
                continue;
            }

            check_size_limits(stats.bytes_written + file.size(), self.size_limit_bytes)?;

            if let Some(parent) = output_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut output = File::create(&output_path)?;
            let written = copy_entry(&mut file, &mut output)?;

            stats.files_extracted += 1;
            stats.bytes_written += written;
        }

        Ok(stats)
    }
}

/// Copy a decrypted entry, keeping decode failures apart from write failures.
fn copy_entry<R: Read, W: Write>(reader: &mut R, writer: &mut W) -> Result<u64, ExtractionError> {
    let mut buffer = [0u8; 64 * 1024];
    let mut written = 0u64;

    loop {
        let n = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(read_error(e).into()),
        };
        writer.write_all(&buffer[..n])?;
        written += n as u64;
    }

    writer.flush()?;
    Ok(written)
}

fn probe_error(err: ZipError) -> ProbeError {
    match err {
        ZipError::InvalidPassword => ProbeError::WrongPassword,
        ZipError::Io(io_err) => read_error(io_err),
        ZipError::InvalidArchive(msg) => ProbeError::Corrupt(msg.to_string()),
        other => classify_message(&other.to_string()),
    }
}

fn read_error(err: io::Error) -> ProbeError {
    match err.kind() {
        io::ErrorKind::InvalidData | io::ErrorKind::InvalidInput => {
            ProbeError::Corrupt(err.to_string())
        }
        _ => classify_message(&err.to_string()),
    }
}
