//! Lazy discovery of files that still need auditing

use crate::config::{PathKeys, WalkConfig};
use crate::error::{AuditError, Result};
use crate::ledger::LedgerSnapshot;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::HashSet;
use std::ffi::OsStr;
use std::fs;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// A file that is not in the plain-file ledger yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: PathBuf,
    /// Ledger key for `path`
    pub key: String,
}

/// Walks a root directory and yields unaudited files
#[derive(Debug)]
pub struct TreeWalker {
    ignore: GlobSet,
    follow_links: bool,
    path_keys: PathKeys,
    excluded: HashSet<PathBuf>,
}

impl TreeWalker {
    pub fn new(config: &WalkConfig) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &config.ignore {
            let glob = Glob::new(pattern).map_err(|e| AuditError::Configuration {
                path: PathBuf::from(pattern),
                reason: format!("invalid ignore pattern: {}", e),
            })?;
            builder.add(glob);
        }
        let ignore = builder.build().map_err(|e| AuditError::Configuration {
            path: PathBuf::new(),
            reason: format!("invalid ignore patterns: {}", e),
        })?;

        Ok(Self {
            ignore,
            follow_links: config.follow_links,
            path_keys: config.path_keys,
            excluded: HashSet::new(),
        })
    }

    /// Never yield these files (the ledgers and failure log themselves)
    pub fn exclude<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        for path in paths {
            let path = path.as_ref();
            let resolved = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
            self.excluded.insert(resolved);
        }
        self
    }

    /// Check that `root` is a directory and return its canonical form
    pub fn resolve_root(root: &Path) -> Result<PathBuf> {
        let metadata = fs::metadata(root).map_err(|e| AuditError::Configuration {
            path: root.to_path_buf(),
            reason: format!("cannot access root: {}", e),
        })?;
        if !metadata.is_dir() {
            return Err(AuditError::Configuration {
                path: root.to_path_buf(),
                reason: "not a directory".to_string(),
            });
        }
        fs::canonicalize(root).map_err(|e| AuditError::Configuration {
            path: root.to_path_buf(),
            reason: format!("cannot resolve root: {}", e),
        })
    }

    pub fn is_ignored(&self, file_name: &OsStr) -> bool {
        self.ignore.is_match(Path::new(file_name))
    }

    /// Ledger key for a path found under `root`
    ///
    /// Keys must map back to exactly one file, so a path that is not valid
    /// UTF-8 gets no key at all rather than a lossy one.
    pub fn ledger_key(&self, root: &Path, path: &Path) -> Result<String> {
        let unrepresentable = || AuditError::UnrepresentablePath {
            path: path.to_path_buf(),
        };
        match self.path_keys {
            PathKeys::Absolute => path.to_str().map(str::to_string).ok_or_else(unrepresentable),
            PathKeys::Relative => {
                let relative = path.strip_prefix(root).unwrap_or(path);
                let mut parts = Vec::new();
                for component in relative.components() {
                    if let Component::Normal(part) = component {
                        parts.push(part.to_str().ok_or_else(unrepresentable)?);
                    }
                }
                Ok(parts.join("/"))
            }
        }
    }

    /// Files under `root` that pass the ignore list and are not in `snapshot`
    ///
    /// Fails up front if `root` is not a directory; after that, traversal
    /// problems are yielded as recoverable `Walk` errors.
    pub fn candidates<'a>(
        &'a self,
        root: &Path,
        snapshot: &'a LedgerSnapshot,
    ) -> Result<Candidates<'a>> {
        let root = Self::resolve_root(root)?;
        let entries = WalkDir::new(&root)
            .follow_links(self.follow_links)
            .sort_by_file_name()
            .into_iter();

        Ok(Candidates {
            walker: self,
            root,
            snapshot,
            entries,
        })
    }
}

/// Iterator returned by [`TreeWalker::candidates`]
pub struct Candidates<'a> {
    walker: &'a TreeWalker,
    root: PathBuf,
    snapshot: &'a LedgerSnapshot,
    entries: walkdir::IntoIter,
}

impl Candidates<'_> {
    /// Canonical root being walked
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Iterator for Candidates<'_> {
    type Item = Result<Candidate>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.entries.next()? {
                Ok(entry) => entry,
                Err(source) => {
                    let path = source.path().map(Path::to_path_buf);
                    return Some(Err(AuditError::Walk { path, source }));
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }
            if self.walker.is_ignored(entry.file_name()) {
                tracing::trace!(path = %entry.path().display(), "ignored");
                continue;
            }
            if self.walker.excluded.contains(entry.path()) {
                continue;
            }

            let key = match self.walker.ledger_key(&self.root, entry.path()) {
                Ok(key) => key,
                Err(e) => return Some(Err(e)),
            };
            if self.snapshot.contains(&key) {
                continue;
            }

            return Some(Ok(Candidate {
                path: entry.into_path(),
                key,
            }));
        }
    }
}
