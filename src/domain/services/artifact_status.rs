//! Extraction of a one-line status string from a badge artifact archive.

use std::io::{Cursor, Read};
use thiserror::Error;
use zip::ZipArchive;
use zip::result::ZipError;

/// Upper bound on how much of an artifact download is read.
pub const MAX_ARCHIVE_BYTES: usize = 1024;

/// Upper bound on how much of the archived status file is read.
pub const MAX_STATUS_BYTES: u64 = 128;

/// Status reported when the archive holds no file or the file has no first line.
pub const NULL_STATUS: &str = "null";

#[derive(Debug, Error)]
pub enum ArtifactStatusError {
    #[error("zip: {0}")]
    Archive(#[from] ZipError),
    #[error("read: {0}")]
    Io(#[from] std::io::Error),
}

/// Reads the status out of an artifact archive.
///
/// The last non-directory entry in archive order is used. Only the first
/// [`MAX_STATUS_BYTES`] of it are read, and the status is the trimmed text
/// before the first newline. Absent files and blank lines both yield
/// [`NULL_STATUS`].
///
/// # Errors
///
/// Returns an error when `archive` is not a readable ZIP archive, which
/// includes archives cut short by the [`MAX_ARCHIVE_BYTES`] read limit.
pub fn extract_status(archive: &[u8]) -> Result<String, ArtifactStatusError> {
    let mut archive = ZipArchive::new(Cursor::new(archive))?;

    let mut status_file = None;
    for index in 0..archive.len() {
        if !archive.by_index_raw(index)?.is_dir() {
            status_file = Some(index);
        }
    }
    let Some(index) = status_file else {
        tracing::debug!("Archive contains no files");
        return Ok(NULL_STATUS.to_string());
    };

    let mut content = Vec::new();
    archive
        .by_index(index)?
        .take(MAX_STATUS_BYTES)
        .read_to_end(&mut content)?;

    // The read limit can split a multi-byte character; drop the partial tail.
    let partial_tail = std::str::from_utf8(&content)
        .err()
        .filter(|e| e.error_len().is_none())
        .map(|e| e.valid_up_to());
    if let Some(valid_len) = partial_tail {
        content.truncate(valid_len);
    }
    let content = String::from_utf8_lossy(&content);
    let first_line = content.split('\n').next().unwrap_or_default().trim();
    if first_line.is_empty() {
        return Ok(NULL_STATUS.to_string());
    }

    Ok(first_line.to_string())
}
