use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use colored::*;
use std::path::PathBuf;

use crate::config::Config;
use crate::driver::CsvAuditDriver;
use crate::events::AuditEvent;
use crate::ledger::{ArchiveEntryRecord, AuditRecord, CsvLedger, LedgerStats};
use crate::logging;
use crate::output::{self, OutputMode, StatusReport};
use crate::progress;

#[derive(Parser)]
#[command(name = "treeaudit")]
#[command(version)]
#[command(about = "Incrementally checksum every file under a directory into an append-only ledger")]
#[command(long_about = "treeaudit walks a directory tree, records size, mtime and SHA-256 of every \
    file not yet in its ledger, and checksums each entry of zip archives into a second ledger. \
    Re-running only audits what is new; failures are logged and retried next time.\n\n\
    Examples:\n  \
    treeaudit audit --root /srv/archive        # Audit everything not yet recorded\n  \
    treeaudit audit --ledger-dir /var/audit    # Keep ledgers somewhere else\n  \
    treeaudit status                           # Show ledger totals")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase output verbosity (-v, -vv for more)
    #[arg(short = 'v', long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Audit every file under the root that is not in the ledger yet
    #[command(visible_alias = "a")]
    Audit {
        /// Directory to audit [default: `root` from the config file]
        #[arg(long, value_name = "PATH")]
        root: Option<PathBuf>,

        /// Directory holding the ledgers and failure log [default: current directory]
        #[arg(long, value_name = "DIR")]
        ledger_dir: Option<PathBuf>,

        /// Key ledger rows by path relative to the root
        #[arg(long)]
        relative_keys: bool,

        /// Output the run summary as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Show totals from the existing ledgers
    #[command(visible_alias = "s")]
    Status {
        /// Directory holding the ledgers [default: current directory]
        #[arg(long, value_name = "DIR")]
        ledger_dir: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// View or reset configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,

        /// Reset to defaults
        #[arg(long)]
        reset: bool,

        /// Print the config file location
        #[arg(long)]
        path: bool,
    },
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn run(self) -> Result<()> {
        let output_mode = OutputMode::from_flags(self.quiet, self.verbose);
        logging::init(output_mode);

        match self.command {
            Commands::Audit {
                root,
                ledger_dir,
                relative_keys,
                json,
            } => {
                let mut config = Config::load()?;
                config.apply_cli_overrides(root, ledger_dir, relative_keys);
                run_audit(&config, json, output_mode)
            }
            Commands::Status { ledger_dir, json } => {
                let mut config = Config::load()?;
                config.apply_cli_overrides(None, ledger_dir, false);

                let audit_path = config.ledger.audit_path();
                let archive_path = config.ledger.archive_path();
                let files: CsvLedger<AuditRecord> = CsvLedger::new(&audit_path);
                let entries: CsvLedger<ArchiveEntryRecord> = CsvLedger::new(&archive_path);
                let stats = LedgerStats::collect(&files, &entries)
                    .context("Failed to read ledgers")?;

                let report = StatusReport {
                    audit_ledger: &audit_path,
                    archive_ledger: &archive_path,
                    stats: &stats,
                };
                if json {
                    output::print_json(&report)
                } else {
                    output::print_status(&report, output_mode);
                    Ok(())
                }
            }
            Commands::Config { show, reset, path } => {
                if path {
                    println!("{}", Config::config_path()?.display());
                    return Ok(());
                }
                if reset {
                    Config::default().save()?;
                    if output_mode != OutputMode::Quiet {
                        println!("{} Configuration reset to defaults", "✓".green());
                    }
                    return Ok(());
                }
                if show || output_mode != OutputMode::Quiet {
                    let config = Config::load_or_create()?;
                    let text = toml::to_string_pretty(&config)
                        .context("Failed to serialize config")?;
                    println!("{}", text);
                }
                Ok(())
            }
        }
    }
}

fn run_audit(config: &Config, json: bool, mode: OutputMode) -> Result<()> {
    let root = config
        .root
        .clone()
        .context("No audit root given; pass --root or set `root` in the config file")?;
    let driver = CsvAuditDriver::from_config(config)?;

    let spinner = if mode != OutputMode::Quiet && !json {
        Some(progress::create_spinner("Loading ledger..."))
    } else {
        None
    };

    let mut audited = 0usize;
    let mut failed = 0usize;
    let result = driver.run_with(&root, &mut |event| {
        match event {
            AuditEvent::RunStarted { already_audited, .. } => {
                if let Some(ref sp) = spinner {
                    sp.set_message(format!("{} paths already audited, walking...", already_audited));
                }
            }
            AuditEvent::PathStarted { path } => {
                if let Some(ref sp) = spinner {
                    sp.set_message(format!(
                        "[{} ok, {} failed] {}",
                        audited,
                        failed,
                        progress::truncate_middle(&path.display().to_string(), 60)
                    ));
                }
            }
            AuditEvent::PathRecorded { .. } => audited += 1,
            AuditEvent::PathFailed { path, error } => {
                failed += 1;
                if let Some(ref sp) = spinner {
                    sp.suspend(|| {
                        eprintln!("{} {}: {}", "Warning:".yellow(), path.display(), error)
                    });
                }
            }
            AuditEvent::RunFinished { .. } => {}
        }
    });

    if let Some(ref sp) = spinner {
        progress::finish_and_clear(sp);
    }
    let summary = result.with_context(|| format!("Audit of {} aborted", root.display()))?;

    if json {
        output::print_json(&summary)?;
    } else {
        output::print_summary(&summary, &config.ledger.failure_log_path(), mode);
    }
    Ok(())
}
