use crate::driver::RunSummary;
use crate::ledger::LedgerStats;
use anyhow::{Context, Result};
use colored::*;
use serde::Serialize;
use std::path::Path;

/// Output verbosity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Quiet,       // Only errors
    Normal,      // Standard output
    Verbose,     // More details
    VeryVerbose, // All details including file paths
}

impl OutputMode {
    pub fn from_flags(quiet: bool, verbose: u8) -> Self {
        if quiet {
            OutputMode::Quiet
        } else if verbose >= 2 {
            OutputMode::VeryVerbose
        } else if verbose == 1 {
            OutputMode::Verbose
        } else {
            OutputMode::Normal
        }
    }
}

fn human_bytes(bytes: u64) -> String {
    bytesize::to_string(bytes, true)
}

fn divider(width: usize) -> String {
    "─".repeat(width).dimmed().to_string()
}

/// Print any report as pretty JSON on stdout
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize report")?;
    println!("{}", json);
    Ok(())
}

pub fn print_summary(summary: &RunSummary, failure_log: &Path, mode: OutputMode) {
    if mode == OutputMode::Quiet {
        return;
    }

    println!();
    println!("{}", "Audit Summary".bold());
    println!("{}", divider(50));
    println!("{:<24} {}", "Root".bold(), summary.root.display());
    println!(
        "{:<24} {}",
        "Previously audited".bold(),
        summary.already_audited
    );
    println!(
        "{:<24} {}",
        "Files recorded".bold(),
        summary.files_recorded.to_string().green()
    );
    println!(
        "{:<24} {}",
        "Archive entries".bold(),
        format!(
            "{} recorded, {} skipped",
            summary.entries_recorded, summary.entries_skipped
        )
    );
    println!(
        "{:<24} {}",
        "Bytes hashed".bold(),
        human_bytes(summary.bytes_hashed).cyan()
    );
    if let Some(finished) = summary.finished_at {
        let elapsed = finished - summary.started_at;
        println!(
            "{:<24} {:.1}s",
            "Elapsed".bold(),
            elapsed.num_milliseconds() as f64 / 1000.0
        );
    }

    if summary.failures.is_empty() {
        println!("{:<24} {}", "Failures".bold(), "0".green());
    } else {
        println!(
            "{:<24} {} {}",
            "Failures".bold(),
            summary.failures.len().to_string().red(),
            format!("(details in {})", failure_log.display()).dimmed()
        );

        // In verbose mode, show which paths failed
        if matches!(mode, OutputMode::Verbose | OutputMode::VeryVerbose) {
            let show_count = if mode == OutputMode::VeryVerbose {
                summary.failures.len()
            } else {
                std::cmp::min(5, summary.failures.len())
            };
            for failure in summary.failures.iter().take(show_count) {
                println!("  {} {}", "✗".red(), failure.path.display());
                println!("    {}", failure.error.dimmed());
            }
            if summary.failures.len() > show_count {
                println!(
                    "  {}",
                    format!("... and {} more", summary.failures.len() - show_count).dimmed()
                );
            }
        }
    }
    println!();
}

#[derive(Serialize)]
pub struct StatusReport<'a> {
    pub audit_ledger: &'a Path,
    pub archive_ledger: &'a Path,
    #[serde(flatten)]
    pub stats: &'a LedgerStats,
}

pub fn print_status(report: &StatusReport<'_>, mode: OutputMode) {
    if mode == OutputMode::Quiet {
        return;
    }

    let stats = report.stats;
    println!();
    println!("{}", "Ledger Status".bold());
    println!("{}", divider(50));
    println!(
        "{:<18} {} files, {}",
        "Plain files".bold(),
        stats.files,
        human_bytes(stats.file_bytes).cyan()
    );
    println!(
        "{:<18} {} entries in {} archives, {}",
        "Archive entries".bold(),
        stats.archive_entries,
        stats.archives,
        human_bytes(stats.archive_entry_bytes).cyan()
    );
    if mode != OutputMode::Normal {
        println!("{:<18} {}", "File ledger".bold(), report.audit_ledger.display());
        println!(
            "{:<18} {}",
            "Archive ledger".bold(),
            report.archive_ledger.display()
        );
    }
    println!();
}
