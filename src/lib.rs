//! treeaudit library crate
//!
//! Incremental integrity audit of a file tree: every file not yet in the
//! ledger gets its size, mtime and SHA-256 appended, and zip archives get one
//! extra row per entry in a second ledger. The CLI binary is a thin layer over
//! [`driver::AuditDriver`].

pub mod archive;
pub mod checksum;
pub mod cli;
pub mod config;
pub mod driver;
pub mod error;
pub mod events;
pub mod ledger;
pub mod logging;
pub mod output;
pub mod progress;
pub mod walker;

pub use driver::{AuditDriver, CsvAuditDriver, RunSummary};
pub use error::AuditError;
