//! Point-in-time key sets read from a ledger

use crate::error::Result;
use crate::ledger::{ArchiveEntryRecord, AuditRecord, Ledger};
use std::collections::HashSet;

/// Keys that were already in a ledger when the snapshot was taken
///
/// Never refreshed: rows appended later in the same run are only seen by the
/// next snapshot.
#[derive(Debug, Clone, Default)]
pub struct LedgerSnapshot {
    keys: HashSet<String>,
}

impl LedgerSnapshot {
    /// Paths present in the plain-file ledger
    pub fn of_paths<L>(ledger: &L) -> Result<Self>
    where
        L: Ledger<AuditRecord> + ?Sized,
    {
        let mut keys = HashSet::new();
        ledger.scan(&mut |record| {
            keys.insert(record.path);
        })?;
        Ok(Self { keys })
    }

    /// Entry names already recorded for one archive
    pub fn of_archive_entries<L>(ledger: &L, archive_key: &str) -> Result<Self>
    where
        L: Ledger<ArchiveEntryRecord> + ?Sized,
    {
        let mut keys = HashSet::new();
        ledger.scan(&mut |record| {
            if record.path == archive_key {
                keys.insert(record.entry_filename);
            }
        })?;
        Ok(Self { keys })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl FromIterator<String> for LedgerSnapshot {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemoryLedger;
    use std::time::UNIX_EPOCH;

    fn entry(path: &str, name: &str) -> ArchiveEntryRecord {
        ArchiveEntryRecord {
            path: path.to_string(),
            entry_filename: name.to_string(),
            size: 1,
            sha256: "00".to_string(),
        }
    }

    #[test]
    fn test_archive_snapshot_is_scoped_to_one_archive() {
        let ledger = MemoryLedger::with_rows(vec![
            entry("/data/a.zip", "one.txt"),
            entry("/data/b.zip", "two.txt"),
            entry("/data/a.zip", "three.txt"),
        ]);

        let snapshot = LedgerSnapshot::of_archive_entries(&ledger, "/data/a.zip").unwrap();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.contains("one.txt"));
        assert!(snapshot.contains("three.txt"));
        assert!(!snapshot.contains("two.txt"));
    }

    #[test]
    fn test_snapshot_does_not_see_later_appends() {
        let ledger = MemoryLedger::new();
        ledger
            .append(&AuditRecord::new("/a".into(), 1, UNIX_EPOCH, "00".into()))
            .unwrap();

        let snapshot = LedgerSnapshot::of_paths(&ledger).unwrap();
        ledger
            .append(&AuditRecord::new("/b".into(), 1, UNIX_EPOCH, "00".into()))
            .unwrap();

        assert!(snapshot.contains("/a"));
        assert!(!snapshot.contains("/b"));
    }
}
