//! Runs an audit over a whole tree
//!
//! Each candidate ends either recorded in the plain-file ledger or written to
//! the failure log. Only fatal errors (bad root, unusable ledgers) stop a run.

use crate::archive::{is_archive, ArchiveAudit, ArchiveAuditor};
use crate::checksum;
use crate::config::Config;
use crate::error::{AuditError, Result};
use crate::events::AuditEvent;
use crate::ledger::{
    ArchiveEntryRecord, AuditRecord, CsvLedger, FailureLog, FileFailureLog, Ledger,
    LedgerSnapshot,
};
use crate::walker::{Candidate, TreeWalker};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// What auditing one candidate produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathOutcome {
    pub record: AuditRecord,
    /// Present when the candidate was an archive
    pub archive: Option<ArchiveAudit>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureSummary {
    pub path: PathBuf,
    pub error: String,
}

/// Totals for one run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub root: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Paths already in the ledger when the run started
    pub already_audited: usize,
    pub files_recorded: usize,
    pub entries_recorded: usize,
    pub entries_skipped: usize,
    pub bytes_hashed: u64,
    pub failures: Vec<FailureSummary>,
}

impl RunSummary {
    fn new(root: PathBuf, already_audited: usize) -> Self {
        Self {
            root,
            started_at: Utc::now(),
            finished_at: None,
            already_audited,
            files_recorded: 0,
            entries_recorded: 0,
            entries_skipped: 0,
            bytes_hashed: 0,
            failures: Vec::new(),
        }
    }

    fn add(&mut self, outcome: &PathOutcome) {
        self.files_recorded += 1;
        self.bytes_hashed += outcome.record.size;
        if let Some(archive) = outcome.archive {
            self.entries_recorded += archive.recorded;
            self.entries_skipped += archive.skipped;
            self.bytes_hashed += archive.bytes;
        }
    }

    /// True when every candidate was recorded
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Hash one plain file into an [`AuditRecord`] keyed as `key`
///
/// Size and mtime come from the open handle's metadata. If the number of
/// bytes read disagrees with that size, the file was modified mid-read and no
/// record is produced.
pub fn audit_file(path: &Path, key: String) -> Result<AuditRecord> {
    let read_err = |source| AuditError::StreamRead {
        path: path.to_path_buf(),
        entry: None,
        source,
    };

    let mut file = File::open(path).map_err(read_err)?;
    let metadata = file.metadata().map_err(read_err)?;
    let modified = metadata.modified().map_err(read_err)?;
    record_stream(path, key, &mut file, metadata.len(), modified)
}

/// Hash `reader`, which must yield exactly `stat_size` bytes
fn record_stream<R: Read + ?Sized>(
    path: &Path,
    key: String,
    reader: &mut R,
    stat_size: u64,
    modified: SystemTime,
) -> Result<AuditRecord> {
    let sum = checksum::digest(reader).map_err(|source| AuditError::StreamRead {
        path: path.to_path_buf(),
        entry: None,
        source,
    })?;

    if sum.size != stat_size {
        return Err(AuditError::ChangedDuringAudit {
            path: path.to_path_buf(),
            expected: stat_size,
            actual: sum.size,
        });
    }

    Ok(AuditRecord::new(key, sum.size, modified, sum.sha256))
}

/// Audit driver over a plain-file ledger `P`, an archive-entry ledger `E`
/// and a failure log `F`
pub struct AuditDriver<P, E, F> {
    walker: TreeWalker,
    archive_extensions: Vec<String>,
    files: P,
    entries: E,
    failures: F,
}

/// Driver writing to the CSV ledgers named in a [`Config`]
pub type CsvAuditDriver =
    AuditDriver<CsvLedger<AuditRecord>, CsvLedger<ArchiveEntryRecord>, FileFailureLog>;

impl CsvAuditDriver {
    /// Build a driver from configuration, creating the ledger directory
    pub fn from_config(config: &Config) -> Result<Self> {
        let dir = &config.ledger.dir;
        fs::create_dir_all(dir).map_err(|source| AuditError::LedgerIo {
            path: dir.clone(),
            source,
        })?;
        let dir = fs::canonicalize(dir).map_err(|source| AuditError::LedgerIo {
            path: dir.clone(),
            source,
        })?;

        let audit_path = dir.join(&config.ledger.audit_file);
        let archive_path = dir.join(&config.ledger.archive_file);
        let failure_path = dir.join(&config.ledger.failure_log);

        let walker = TreeWalker::new(&config.walk)?.exclude([
            &audit_path,
            &archive_path,
            &failure_path,
        ]);

        Ok(AuditDriver::new(
            walker,
            config.archive.extensions.clone(),
            CsvLedger::new(audit_path).with_sync_writes(config.ledger.sync_writes),
            CsvLedger::new(archive_path).with_sync_writes(config.ledger.sync_writes),
            FileFailureLog::new(failure_path),
        ))
    }
}

impl<P, E, F> AuditDriver<P, E, F>
where
    P: Ledger<AuditRecord>,
    E: Ledger<ArchiveEntryRecord>,
    F: FailureLog,
{
    pub fn new(
        walker: TreeWalker,
        archive_extensions: Vec<String>,
        files: P,
        entries: E,
        failures: F,
    ) -> Self {
        Self {
            walker,
            archive_extensions,
            files,
            entries,
            failures,
        }
    }

    pub fn files(&self) -> &P {
        &self.files
    }

    pub fn entries(&self) -> &E {
        &self.entries
    }

    pub fn failures(&self) -> &F {
        &self.failures
    }

    pub fn run(&self, root: &Path) -> Result<RunSummary> {
        self.run_with(root, &mut |_| {})
    }

    /// Audit every candidate under `root`, reporting progress to `on_event`
    pub fn run_with(
        &self,
        root: &Path,
        on_event: &mut dyn FnMut(&AuditEvent),
    ) -> Result<RunSummary> {
        let root = TreeWalker::resolve_root(root)?;
        let snapshot = LedgerSnapshot::of_paths(&self.files)?;

        let mut summary = RunSummary::new(root.clone(), snapshot.len());
        tracing::info!(root = %root.display(), already_audited = snapshot.len(), "audit started");
        on_event(&AuditEvent::RunStarted {
            root: root.clone(),
            already_audited: snapshot.len(),
        });

        for item in self.walker.candidates(&root, &snapshot)? {
            let candidate = match item {
                Ok(candidate) => candidate,
                Err(e) => {
                    let path = e.path().unwrap_or(root.as_path()).to_path_buf();
                    self.fail(&path, e, &mut summary, on_event)?;
                    continue;
                }
            };

            on_event(&AuditEvent::PathStarted {
                path: candidate.path.clone(),
            });

            match self.audit_candidate(&candidate) {
                Ok(outcome) => {
                    tracing::debug!(path = %candidate.path.display(), size = outcome.record.size, "recorded");
                    summary.add(&outcome);
                    on_event(&AuditEvent::PathRecorded {
                        path: candidate.path,
                        size: outcome.record.size,
                        archive_entries: outcome.archive.map(|a| a.recorded).unwrap_or(0),
                    });
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => self.fail(&candidate.path, e, &mut summary, on_event)?,
            }
        }

        summary.finished_at = Some(Utc::now());
        tracing::info!(
            files_recorded = summary.files_recorded,
            entries_recorded = summary.entries_recorded,
            failures = summary.failures.len(),
            "audit finished"
        );
        on_event(&AuditEvent::RunFinished {
            files_recorded: summary.files_recorded,
            failures: summary.failures.len(),
        });

        Ok(summary)
    }

    /// Audit a single candidate: archive entries first, then the file itself
    pub fn audit_candidate(&self, candidate: &Candidate) -> Result<PathOutcome> {
        let archive = if is_archive(&candidate.path, &self.archive_extensions) {
            let auditor = ArchiveAuditor::new(&self.entries, &self.archive_extensions);
            Some(auditor.audit(&candidate.path, &candidate.key)?)
        } else {
            None
        };

        let record = audit_file(&candidate.path, candidate.key.clone())?;
        self.files.append(&record)?;

        Ok(PathOutcome { record, archive })
    }

    fn fail(
        &self,
        path: &Path,
        error: AuditError,
        summary: &mut RunSummary,
        on_event: &mut dyn FnMut(&AuditEvent),
    ) -> Result<()> {
        tracing::info!(path = %path.display(), error = %error, "audit failed");
        self.failures.record(path, &error)?;

        let message = error.to_string();
        summary.failures.push(FailureSummary {
            path: path.to_path_buf(),
            error: message.clone(),
        });
        on_event(&AuditEvent::PathFailed {
            path: path.to_path_buf(),
            error: message,
        });
        Ok(())
    }
}
