//! Progress events emitted while an audit runs (used by the CLI spinner)

use std::path::PathBuf;

/// Real-time progress updates during an audit run.
#[derive(Debug, Clone)]
pub enum AuditEvent {
    /// The ledger snapshot is loaded and the walk is about to start.
    RunStarted {
        root: PathBuf,
        already_audited: usize,
    },

    /// A candidate file is about to be audited.
    PathStarted { path: PathBuf },

    /// A file (and, for archives, its entries) made it into the ledgers.
    PathRecorded {
        path: PathBuf,
        size: u64,
        archive_entries: usize,
    },

    /// A file could not be audited and was written to the failure log.
    PathFailed { path: PathBuf, error: String },

    /// Every candidate has been visited.
    RunFinished {
        files_recorded: usize,
        failures: usize,
    },
}
