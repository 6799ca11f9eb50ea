//! Append-only audit ledgers
//!
//! Two ledgers are kept per audit: one row per plain file and one row per zip
//! entry. Both are only ever appended to. Which keys already exist is read
//! once into a [`LedgerSnapshot`] and consulted before appending; the ledgers
//! themselves do not enforce uniqueness.

pub mod csv_store;
pub mod failure_log;
pub mod memory;
pub mod record;
pub mod snapshot;

pub use csv_store::CsvLedger;
pub use failure_log::{FailureLog, FileFailureLog, MemoryFailureLog};
pub use memory::MemoryLedger;
pub use record::{ArchiveEntryRecord, AuditRecord, LedgerRecord};
pub use snapshot::LedgerSnapshot;

use crate::error::Result;
use serde::Serialize;
use std::collections::HashSet;

/// Durable, append-only store of `R` rows
pub trait Ledger<R: LedgerRecord> {
    /// Stream every stored row to `visit`
    ///
    /// A ledger that does not exist yet is created empty (header only).
    fn scan(&self, visit: &mut dyn FnMut(R)) -> Result<()>;

    /// Append a single row
    fn append(&self, record: &R) -> Result<()>;

    /// Stream stored rows without creating or repairing anything
    ///
    /// Used by read-only queries. A missing ledger has no rows.
    fn inspect(&self, visit: &mut dyn FnMut(R)) -> Result<()> {
        self.scan(visit)
    }
}

impl<R: LedgerRecord, L: Ledger<R> + ?Sized> Ledger<R> for &L {
    fn scan(&self, visit: &mut dyn FnMut(R)) -> Result<()> {
        (**self).scan(visit)
    }

    fn append(&self, record: &R) -> Result<()> {
        (**self).append(record)
    }

    fn inspect(&self, visit: &mut dyn FnMut(R)) -> Result<()> {
        (**self).inspect(visit)
    }
}

/// Totals over both ledgers, for the `status` command
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct LedgerStats {
    pub files: usize,
    pub file_bytes: u64,
    pub archives: usize,
    pub archive_entries: usize,
    pub archive_entry_bytes: u64,
}

impl LedgerStats {
    pub fn collect<F, E>(files: &F, entries: &E) -> Result<Self>
    where
        F: Ledger<AuditRecord> + ?Sized,
        E: Ledger<ArchiveEntryRecord> + ?Sized,
    {
        let mut stats = LedgerStats::default();

        files.inspect(&mut |record| {
            stats.files += 1;
            stats.file_bytes += record.size;
        })?;

        let mut archives = HashSet::new();
        entries.inspect(&mut |record| {
            stats.archive_entries += 1;
            stats.archive_entry_bytes += record.size;
            archives.insert(record.path);
        })?;
        stats.archives = archives.len();

        Ok(stats)
    }
}
