//! Row types stored in the ledgers

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// A row type with a fixed column layout
pub trait LedgerRecord: Serialize + DeserializeOwned {
    /// Column names, in serialization order
    const HEADER: &'static [&'static str];
}

/// One audited file in the plain-file ledger
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    /// Ledger key of the file
    pub path: String,
    /// Size in bytes
    pub size: u64,
    /// Modification time of the file when it was audited
    #[serde(with = "iso8601")]
    pub last_modified_time: DateTime<Utc>,
    /// Lowercase hex SHA-256 of the file contents
    pub sha256: String,
}

impl AuditRecord {
    pub fn new(path: String, size: u64, modified: SystemTime, sha256: String) -> Self {
        Self {
            path,
            size,
            last_modified_time: DateTime::<Utc>::from(modified),
            sha256,
        }
    }
}

impl LedgerRecord for AuditRecord {
    const HEADER: &'static [&'static str] = &["path", "size", "last_modified_time", "sha256"];
}

/// One audited entry inside a zip archive
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntryRecord {
    /// Ledger key of the owning archive
    pub path: String,
    /// Entry name as stored in the archive
    pub entry_filename: String,
    pub size: u64,
    pub sha256: String,
}

impl LedgerRecord for ArchiveEntryRecord {
    const HEADER: &'static [&'static str] = &["path", "entry_filename", "size", "sha256"];
}

/// RFC 3339 in UTC with a `Z` suffix; sub-second digits only when non-zero
mod iso8601 {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(de::Error::custom)
    }
}
