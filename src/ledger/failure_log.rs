//! Free-text log of paths that could not be audited
//!
//! Meant for people, not for this crate: entries are never read back.

use crate::error::{AuditError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use std::cell::RefCell;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Line written between entries
pub const DELIMITER: &str = "---";

/// Sink for per-path audit failures
pub trait FailureLog {
    fn record(&self, path: &Path, failure: &AuditError) -> Result<()>;
}

impl<L: FailureLog + ?Sized> FailureLog for &L {
    fn record(&self, path: &Path, failure: &AuditError) -> Result<()> {
        (**self).record(path, failure)
    }
}

/// Format one failure-log entry
pub fn format_entry(path: &Path, failure: &AuditError, at: DateTime<Utc>) -> String {
    format!(
        "[{}] Failed to audit {:?}:\n\n{}\n\n{}\n\n",
        at.to_rfc3339_opts(SecondsFormat::Secs, true),
        path,
        failure.detail(),
        DELIMITER
    )
}

/// Failure log appended to a text file
#[derive(Debug, Clone)]
pub struct FileFailureLog {
    path: PathBuf,
}

impl FileFailureLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FailureLog for FileFailureLog {
    fn record(&self, path: &Path, failure: &AuditError) -> Result<()> {
        let entry = format_entry(path, failure, Utc::now());
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(entry.as_bytes()))
            .map_err(|source| AuditError::LedgerIo {
                path: self.path.clone(),
                source,
            })
    }
}

/// Failure log kept in memory as `(path, detail)` pairs
#[derive(Debug, Default)]
pub struct MemoryFailureLog {
    entries: RefCell<Vec<(PathBuf, String)>>,
}

impl MemoryFailureLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(PathBuf, String)> {
        self.entries.borrow().clone()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.entries.borrow().iter().map(|(p, _)| p.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl FailureLog for MemoryFailureLog {
    fn record(&self, path: &Path, failure: &AuditError) -> Result<()> {
        self.entries
            .borrow_mut()
            .push((path.to_path_buf(), failure.detail()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs;
    use std::io;
    use tempfile::TempDir;

    fn unreadable(path: &str) -> AuditError {
        AuditError::StreamRead {
            path: PathBuf::from(path),
            entry: None,
            source: io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"),
        }
    }

    #[test]
    fn test_format_entry() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap();
        let text = format_entry(Path::new("/data/locked.bin"), &unreadable("/data/locked.bin"), at);
        assert_eq!(
            text,
            "[2024-03-01T08:30:00Z] Failed to audit \"/data/locked.bin\":\n\n\
             failed to read /data/locked.bin\n  caused by: permission denied\n\n---\n\n"
        );
    }

    #[test]
    fn test_file_failure_log_appends() {
        let temp_dir = TempDir::new().unwrap();
        let log = FileFailureLog::new(temp_dir.path().join("exceptions.log"));

        log.record(Path::new("/data/one"), &unreadable("/data/one")).unwrap();
        log.record(Path::new("/data/two"), &unreadable("/data/two")).unwrap();

        let text = fs::read_to_string(log.path()).unwrap();
        assert_eq!(text.matches("Failed to audit").count(), 2);
        assert!(text.find("/data/one").unwrap() < text.find("/data/two").unwrap());
        assert!(text.ends_with("---\n\n"));
    }
}
