//! Per-entry auditing of zip archives

use crate::checksum;
use crate::error::{AuditError, Result};
use crate::ledger::{ArchiveEntryRecord, Ledger, LedgerSnapshot};
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use zip::ZipArchive;

/// Whether `path` has one of `extensions` (case-insensitive, no leading dot)
pub fn is_archive(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy();
            extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext))
        })
        .unwrap_or(false)
}

/// Counts from auditing one archive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveAudit {
    /// Entries appended to the ledger by this call
    pub recorded: usize,
    /// Entries already in the ledger, or repeated names
    pub skipped: usize,
    /// Uncompressed bytes hashed
    pub bytes: u64,
}

/// What to do with one entry name while walking an archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Record,
    AlreadyRecorded,
    /// The same name appeared earlier in this archive
    Repeated,
}

/// Tracks which entry names of one archive already have a row
struct EntryFilter {
    seen: LedgerSnapshot,
    recorded_now: HashSet<String>,
}

impl EntryFilter {
    fn new(seen: LedgerSnapshot) -> Self {
        Self {
            seen,
            recorded_now: HashSet::new(),
        }
    }

    fn admit(&self, name: &str) -> Admission {
        if self.seen.contains(name) {
            Admission::AlreadyRecorded
        } else if self.recorded_now.contains(name) {
            Admission::Repeated
        } else {
            Admission::Record
        }
    }

    fn mark_recorded(&mut self, name: String) {
        self.recorded_now.insert(name);
    }
}

/// Records every not-yet-audited entry of an archive
pub struct ArchiveAuditor<'a, E: ?Sized> {
    ledger: &'a E,
    extensions: &'a [String],
}

impl<'a, E> ArchiveAuditor<'a, E>
where
    E: Ledger<ArchiveEntryRecord> + ?Sized,
{
    pub fn new(ledger: &'a E, extensions: &'a [String]) -> Self {
        Self { ledger, extensions }
    }

    /// Audit the entries of the archive at `path`, keyed as `key`
    ///
    /// Entries appended before a failure stay in the ledger, so a retry picks
    /// up where this call stopped.
    pub fn audit(&self, path: &Path, key: &str) -> Result<ArchiveAudit> {
        debug_assert!(
            is_archive(path, self.extensions),
            "audit() called on non-archive {}",
            path.display()
        );

        let mut filter = EntryFilter::new(LedgerSnapshot::of_archive_entries(self.ledger, key)?);
        let mut audit = ArchiveAudit::default();

        let file = File::open(path).map_err(|source| AuditError::StreamRead {
            path: path.to_path_buf(),
            entry: None,
            source,
        })?;
        let mut archive =
            ZipArchive::new(BufReader::new(file)).map_err(|source| AuditError::ArchiveOpen {
                path: path.to_path_buf(),
                source,
            })?;

        for index in 0..archive.len() {
            let mut entry = archive
                .by_index(index)
                .map_err(|source| AuditError::ArchiveEntry {
                    path: path.to_path_buf(),
                    entry: format!("#{}", index),
                    source,
                })?;
            let name = entry.name().to_string();

            match filter.admit(&name) {
                Admission::Record => {}
                Admission::AlreadyRecorded => {
                    audit.skipped += 1;
                    continue;
                }
                Admission::Repeated => {
                    tracing::warn!(archive = %path.display(), entry = %name, "duplicate entry name in archive");
                    audit.skipped += 1;
                    continue;
                }
            }

            let sum = checksum::digest(&mut entry).map_err(|source| AuditError::StreamRead {
                path: path.to_path_buf(),
                entry: Some(name.clone()),
                source,
            })?;

            self.ledger.append(&ArchiveEntryRecord {
                path: key.to_string(),
                entry_filename: name.clone(),
                size: sum.size,
                sha256: sum.sha256,
            })?;
            tracing::debug!(archive = %path.display(), entry = %name, size = sum.size, "entry recorded");

            audit.recorded += 1;
            audit.bytes += sum.size;
            filter.mark_recorded(name);
        }

        Ok(audit)
    }
}
