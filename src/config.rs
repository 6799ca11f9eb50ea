//! Configuration file handling
//!
//! Location: the platform config dir from `directories`, e.g.
//! ~/.config/treeaudit/config.toml on Linux.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// How ledger keys are derived from walked paths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PathKeys {
    /// Full path under the canonicalized root
    #[default]
    Absolute,
    /// Path relative to the root, `/`-separated
    Relative,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Directory the audit walks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
    pub ledger: LedgerConfig,
    pub walk: WalkConfig,
    pub archive: ArchiveConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Directory holding the ledgers and the failure log
    pub dir: PathBuf,
    pub audit_file: String,
    pub archive_file: String,
    pub failure_log: String,
    /// fsync after every appended row
    pub sync_writes: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkConfig {
    /// Glob patterns matched against file names
    pub ignore: Vec<String>,
    pub follow_links: bool,
    pub path_keys: PathKeys,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Extensions (without the dot) audited entry by entry
    pub extensions: Vec<String>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            audit_file: "audit.csv".to_string(),
            archive_file: "audit_zipfiles.csv".to_string(),
            failure_log: "exceptions.log".to_string(),
            sync_writes: true,
        }
    }
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            ignore: vec![".DS_Store".to_string(), "Thumbs.db".to_string()],
            follow_links: false,
            path_keys: PathKeys::Absolute,
        }
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["zip".to_string()],
        }
    }
}

impl LedgerConfig {
    pub fn audit_path(&self) -> PathBuf {
        self.dir.join(&self.audit_file)
    }

    pub fn archive_path(&self) -> PathBuf {
        self.dir.join(&self.archive_file)
    }

    pub fn failure_log_path(&self) -> PathBuf {
        self.dir.join(&self.failure_log)
    }
}

impl Config {
    /// Path of the config file
    pub fn config_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("", "", "treeaudit")
            .context("Could not determine a config directory for this platform")?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Load the config file, falling back to defaults when it does not exist
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load the config file, writing the defaults first if it is missing
    pub fn load_or_create() -> Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            let config = Self::default();
            config.save_to(&path)?;
            return Ok(config);
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    /// Command-line values win over the file
    pub fn apply_cli_overrides(
        &mut self,
        root: Option<PathBuf>,
        ledger_dir: Option<PathBuf>,
        relative_keys: bool,
    ) {
        if let Some(root) = root {
            self.root = Some(root);
        }
        if let Some(dir) = ledger_dir {
            self.ledger.dir = dir;
        }
        if relative_keys {
            self.walk.path_keys = PathKeys::Relative;
        }
    }
}
