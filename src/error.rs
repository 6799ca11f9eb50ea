//! Error kinds raised by the audit engine
//!
//! Fatal kinds stop a run before or during the walk. Every other kind is
//! confined to the candidate path that raised it and ends up in the failure log.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    /// The audit root is missing, not a directory, or was never configured
    #[error("invalid audit root {}: {reason}", .path.display())]
    Configuration { path: PathBuf, reason: String },

    /// A ledger or the failure log could not be opened, read, or written
    #[error("ledger I/O failed for {}", .path.display())]
    LedgerIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A ledger exists but its contents cannot be trusted
    #[error("ledger {} is malformed", .path.display())]
    LedgerFormat {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// Ledger header does not match the expected columns
    #[error("ledger {} has header {found:?}, expected {expected:?}", .path.display())]
    LedgerHeader {
        path: PathBuf,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("cannot open {} as a zip archive", .path.display())]
    ArchiveOpen {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("cannot open entry {entry:?} in archive {}", .path.display())]
    ArchiveEntry {
        path: PathBuf,
        entry: String,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("failed to read {}{}", .path.display(), entry_suffix(.entry))]
    StreamRead {
        path: PathBuf,
        entry: Option<String>,
        #[source]
        source: io::Error,
    },

    #[error("{} changed while being audited (stat size {expected}, read {actual} bytes)", .path.display())]
    ChangedDuringAudit {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    /// File name bytes that have no exact UTF-8 form for a ledger key
    #[error("{} is not valid UTF-8 and has no exact ledger key", .path.display())]
    UnrepresentablePath { path: PathBuf },

    #[error("failed to walk {}", walk_target(.path))]
    Walk {
        path: Option<PathBuf>,
        #[source]
        source: walkdir::Error,
    },
}

fn entry_suffix(entry: &Option<String>) -> String {
    match entry {
        Some(name) => format!(" (entry {:?})", name),
        None => String::new(),
    }
}

fn walk_target(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "<unknown>".to_string())
}

impl AuditError {
    /// Whether this error must abort the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AuditError::Configuration { .. }
                | AuditError::LedgerIo { .. }
                | AuditError::LedgerFormat { .. }
                | AuditError::LedgerHeader { .. }
        )
    }

    /// Path the error is about, when one is known
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            AuditError::Configuration { path, .. }
            | AuditError::LedgerIo { path, .. }
            | AuditError::LedgerFormat { path, .. }
            | AuditError::LedgerHeader { path, .. }
            | AuditError::ArchiveOpen { path, .. }
            | AuditError::ArchiveEntry { path, .. }
            | AuditError::StreamRead { path, .. }
            | AuditError::ChangedDuringAudit { path, .. }
            | AuditError::UnrepresentablePath { path } => Some(path),
            AuditError::Walk { path, .. } => path.as_deref(),
        }
    }

    /// Render the error followed by its whole `source()` chain
    pub fn detail(&self) -> String {
        let mut out = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            out.push_str("\n  caused by: ");
            out.push_str(&cause.to_string());
            source = cause.source();
        }
        out
    }
}

pub type Result<T> = std::result::Result<T, AuditError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        let fatal = AuditError::LedgerIo {
            path: PathBuf::from("audit.csv"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(fatal.is_fatal());

        let recoverable = AuditError::StreamRead {
            path: PathBuf::from("/data/a.bin"),
            entry: None,
            source: io::Error::new(io::ErrorKind::Other, "bad sector"),
        };
        assert!(!recoverable.is_fatal());

        let drift = AuditError::ChangedDuringAudit {
            path: PathBuf::from("/data/grow.log"),
            expected: 10,
            actual: 12,
        };
        assert!(!drift.is_fatal());
    }

    #[test]
    fn test_detail_includes_source_chain() {
        let err = AuditError::StreamRead {
            path: PathBuf::from("/data/b.zip"),
            entry: Some("x.txt".to_string()),
            source: io::Error::new(io::ErrorKind::Other, "bad sector"),
        };
        let detail = err.detail();
        assert!(detail.starts_with("failed to read /data/b.zip (entry \"x.txt\")"));
        assert!(detail.contains("caused by: bad sector"));
    }
}
