//! CSV file backend for the ledgers
//!
//! Every append is its own open/write/close, so a crash can only tear the row
//! being written. A torn row is detected on the next scan (the file no longer
//! ends with a newline) and cut off before any new row is appended.

use crate::error::{AuditError, Result};
use crate::ledger::{Ledger, LedgerRecord};
use csv::{ReaderBuilder, StringRecord, Terminator, WriterBuilder};
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// Append-only CSV ledger of `R` rows
#[derive(Debug)]
pub struct CsvLedger<R> {
    path: PathBuf,
    sync_writes: bool,
    _rows: PhantomData<fn() -> R>,
}

impl<R: LedgerRecord> CsvLedger<R> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sync_writes: true,
            _rows: PhantomData,
        }
    }

    /// Whether each append is followed by `sync_data` (default: true)
    pub fn with_sync_writes(mut self, sync_writes: bool) -> Self {
        self.sync_writes = sync_writes;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: io::Error) -> AuditError {
        AuditError::LedgerIo {
            path: self.path.clone(),
            source,
        }
    }

    fn csv_err(&self, source: csv::Error) -> AuditError {
        if source.is_io_error() {
            return match source.into_kind() {
                csv::ErrorKind::Io(io) => self.io_err(io),
                other => self.io_err(io::Error::other(format!("{:?}", other))),
            };
        }
        AuditError::LedgerFormat {
            path: self.path.clone(),
            source,
        }
    }

    fn open_for_append(&self) -> Result<File> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_err(e))
    }

    /// Render one row exactly as it will be stored, terminator included
    fn encode_row<I, T>(&self, fields: I) -> Result<Vec<u8>>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let mut writer = row_writer();
        writer.write_record(fields).map_err(|e| self.csv_err(e))?;
        writer
            .into_inner()
            .map_err(|e| self.io_err(e.into_error()))
    }

    fn write_bytes(&self, file: &mut File, bytes: &[u8]) -> Result<()> {
        file.write_all(bytes).map_err(|e| self.io_err(e))?;
        if self.sync_writes {
            file.sync_data().map_err(|e| self.io_err(e))?;
        }
        Ok(())
    }

    fn write_header(&self) -> Result<()> {
        let header = self.encode_row(R::HEADER)?;
        let mut file = self.open_for_append()?;
        self.write_bytes(&mut file, &header)
    }

    /// Cut the file back to `offset`, dropping an interrupted trailing row
    fn truncate_to(&self, offset: u64) -> Result<()> {
        let file = OpenOptions::new()
            .write(true)
            .open(&self.path)
            .map_err(|e| self.io_err(e))?;
        file.set_len(offset).map_err(|e| self.io_err(e))?;
        file.sync_all().map_err(|e| self.io_err(e))
    }

    fn check_header(&self, row: &StringRecord) -> Result<()> {
        if row.iter().eq(R::HEADER.iter().copied()) {
            return Ok(());
        }
        Err(AuditError::LedgerHeader {
            path: self.path.clone(),
            expected: R::HEADER.iter().map(|s| s.to_string()).collect(),
            found: row.iter().map(|s| s.to_string()).collect(),
        })
    }
}

fn row_writer() -> csv::Writer<Vec<u8>> {
    WriterBuilder::new()
        .has_headers(false)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new())
}

fn ends_with_newline(file: &mut File, len: u64) -> io::Result<bool> {
    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))?;
    file.read_exact(&mut last)?;
    file.seek(SeekFrom::Start(0))?;
    Ok(last[0] == b'\n')
}

impl<R: LedgerRecord> CsvLedger<R> {
    /// Read every complete row. With `repair`, a missing or empty file gets
    /// its header and a torn trailing row is cut off; without it the file is
    /// left untouched and the torn row is just not visited.
    fn read_rows(&self, repair: bool, visit: &mut dyn FnMut(R)) -> Result<()> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if !repair {
                    return Ok(());
                }
                tracing::debug!(path = %self.path.display(), "creating ledger");
                return self.write_header();
            }
            Err(e) => return Err(self.io_err(e)),
        };

        let len = file.metadata().map_err(|e| self.io_err(e))?.len();
        if len == 0 {
            return if repair { self.write_header() } else { Ok(()) };
        }
        let complete = ends_with_newline(&mut file, len).map_err(|e| self.io_err(e))?;

        let headers = StringRecord::from(R::HEADER.to_vec());
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(BufReader::new(file));

        // Rows are handed out one behind the reader so the final row can be
        // withheld when it turns out to be torn.
        let mut pending: Option<(u64, StringRecord)> = None;
        let mut index = 0usize;
        let mut row = StringRecord::new();
        loop {
            let start = reader.position().byte();
            if !reader.read_record(&mut row).map_err(|e| self.csv_err(e))? {
                break;
            }
            if let Some((_, previous)) = pending.replace((start, row.clone())) {
                self.emit(index, &previous, &headers, visit)?;
                index += 1;
            }
        }

        if let Some((start, last)) = pending {
            if complete {
                self.emit(index, &last, &headers, visit)?;
            } else if repair {
                tracing::warn!(
                    path = %self.path.display(),
                    offset = start,
                    "discarding torn trailing ledger row"
                );
                self.truncate_to(start)?;
                if start == 0 {
                    self.write_header()?;
                }
            }
        }

        Ok(())
    }
}

impl<R: LedgerRecord> Ledger<R> for CsvLedger<R> {
    fn scan(&self, visit: &mut dyn FnMut(R)) -> Result<()> {
        self.read_rows(true, visit)
    }

    fn inspect(&self, visit: &mut dyn FnMut(R)) -> Result<()> {
        self.read_rows(false, visit)
    }

    fn append(&self, record: &R) -> Result<()> {
        let mut file = self.open_for_append()?;
        if file.metadata().map_err(|e| self.io_err(e))?.len() == 0 {
            let header = self.encode_row(R::HEADER)?;
            self.write_bytes(&mut file, &header)?;
        }

        let mut writer = row_writer();
        writer.serialize(record).map_err(|e| self.csv_err(e))?;
        let row = writer
            .into_inner()
            .map_err(|e| self.io_err(e.into_error()))?;

        // One write call per row keeps O_APPEND writes whole
        self.write_bytes(&mut file, &row)
    }
}

impl<R: LedgerRecord> CsvLedger<R> {
    fn emit(
        &self,
        index: usize,
        row: &StringRecord,
        headers: &StringRecord,
        visit: &mut dyn FnMut(R),
    ) -> Result<()> {
        if index == 0 {
            return self.check_header(row);
        }
        let record: R = row
            .deserialize(Some(headers))
            .map_err(|e| self.csv_err(e))?;
        visit(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{ArchiveEntryRecord, AuditRecord};
    use std::fs;
    use std::time::{Duration, UNIX_EPOCH};
    use tempfile::TempDir;

    fn record(path: &str) -> AuditRecord {
        AuditRecord::new(
            path.to_string(),
            4,
            UNIX_EPOCH + Duration::from_secs(1_600_000_000),
            "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08".to_string(),
        )
    }

    fn collect<R: LedgerRecord>(ledger: &CsvLedger<R>) -> Vec<R> {
        let mut rows = Vec::new();
        ledger.scan(&mut |r| rows.push(r)).unwrap();
        rows
    }

    #[test]
    fn test_missing_ledger_created_with_header() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("audit.csv");
        let ledger: CsvLedger<AuditRecord> = CsvLedger::new(&path);

        assert!(collect(&ledger).is_empty());
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "path,size,last_modified_time,sha256\n"
        );
    }

    #[test]
    fn test_append_then_scan() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("audit.csv");
        let ledger: CsvLedger<AuditRecord> = CsvLedger::new(&path);
        collect(&ledger);

        ledger.append(&record("/data/a.txt")).unwrap();
        ledger.append(&record("/data/with,comma.txt")).unwrap();

        let rows = collect(&ledger);
        assert_eq!(rows, vec![record("/data/a.txt"), record("/data/with,comma.txt")]);

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains(
            "/data/a.txt,4,2020-09-13T12:26:40Z,9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08\n"
        ));
        assert!(text.contains("\"/data/with,comma.txt\""));
    }

    #[test]
    fn test_append_to_missing_file_writes_header() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("zipfiles.csv");
        let ledger: CsvLedger<ArchiveEntryRecord> = CsvLedger::new(&path).with_sync_writes(false);

        ledger
            .append(&ArchiveEntryRecord {
                path: "/data/b.zip".to_string(),
                entry_filename: "x.txt".to_string(),
                size: 1,
                sha256: "a1fce4363854ff888cff4b8e7875d600c2682390412a8cf79b37d0b11148b0fa"
                    .to_string(),
            })
            .unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("path,entry_filename,size,sha256\n/data/b.zip,x.txt,1,"));
        assert_eq!(collect(&ledger).len(), 1);
    }

    #[test]
    fn test_inspect_never_writes() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("audit.csv");
        let ledger: CsvLedger<AuditRecord> = CsvLedger::new(&path);

        let mut rows = Vec::new();
        ledger.inspect(&mut |r| rows.push(r)).unwrap();
        assert!(rows.is_empty());
        assert!(!path.exists());

        ledger.append(&record("/data/a.txt")).unwrap();
        let mut torn = fs::read_to_string(&path).unwrap();
        torn.push_str("/data/b.txt,4,2020-09");
        fs::write(&path, &torn).unwrap();

        ledger.inspect(&mut |r| rows.push(r)).unwrap();
        assert_eq!(rows, vec![record("/data/a.txt")]);
        assert_eq!(fs::read_to_string(&path).unwrap(), torn);
    }

    #[test]
    fn test_torn_trailing_row_is_discarded() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("audit.csv");
        let ledger: CsvLedger<AuditRecord> = CsvLedger::new(&path);
        collect(&ledger);
        ledger.append(&record("/data/a.txt")).unwrap();
        let intact = fs::read_to_string(&path).unwrap();

        // Simulate a crash halfway through the next append
        let mut torn = intact.clone();
        torn.push_str("/data/b.txt,4,2020-09");
        fs::write(&path, &torn).unwrap();

        let rows = collect(&ledger);
        assert_eq!(rows, vec![record("/data/a.txt")]);
        assert_eq!(fs::read_to_string(&path).unwrap(), intact);

        ledger.append(&record("/data/b.txt")).unwrap();
        assert_eq!(collect(&ledger).len(), 2);
    }

    #[test]
    fn test_torn_header_is_rewritten() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("audit.csv");
        fs::write(&path, "path,si").unwrap();

        let ledger: CsvLedger<AuditRecord> = CsvLedger::new(&path);
        assert!(collect(&ledger).is_empty());
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "path,size,last_modified_time,sha256\n"
        );
    }

    #[test]
    fn test_empty_file_gets_header() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("audit.csv");
        fs::write(&path, "").unwrap();

        let ledger: CsvLedger<AuditRecord> = CsvLedger::new(&path);
        assert!(collect(&ledger).is_empty());
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "path,size,last_modified_time,sha256\n"
        );
    }

    #[test]
    fn test_foreign_header_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("audit.csv");
        fs::write(&path, "name,bytes\nfoo,1\n").unwrap();

        let ledger: CsvLedger<AuditRecord> = CsvLedger::new(&path);
        let err = ledger.scan(&mut |_| {}).unwrap_err();
        assert!(matches!(err, AuditError::LedgerHeader { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_malformed_row_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("audit.csv");
        fs::write(
            &path,
            "path,size,last_modified_time,sha256\n/data/a.txt,not-a-number,2020-09-13T12:26:40Z,ab\n",
        )
        .unwrap();

        let ledger: CsvLedger<AuditRecord> = CsvLedger::new(&path);
        let err = ledger.scan(&mut |_| {}).unwrap_err();
        assert!(matches!(err, AuditError::LedgerFormat { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_unopenable_ledger_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        // A directory cannot be read as a ledger file
        let ledger: CsvLedger<AuditRecord> = CsvLedger::new(temp_dir.path());
        let err = ledger.scan(&mut |_| {}).unwrap_err();
        assert!(err.is_fatal());
    }
}
