//! # Directory Scanner
//!
//! Walks a source tree and produces the full list of importable files before
//! any copying starts.
//!
//! - Entries are visited in sorted order so a fixed directory state always
//!   yields the same sequence.
//! - Hidden entries (leading `.`) are skipped.
//! - Extension matching is case-insensitive; an empty allow-list accepts
//!   every file.
//! - Per-entry I/O errors are logged and the entry is skipped.
//! - The cancellation token is checked before each directory is listed.

use bridge_traits::FileSystemAccess;
use core_runtime::settings::ImportSettings;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::error::{ImportError, Result};
use crate::media::{extension_of, FileRecord};

/// What to include in a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    pub recursive: bool,
    /// Lowercase, dot-less allow-list; empty accepts everything
    pub extensions: Vec<String>,
    /// Subdirectory levels below the root that will be entered
    pub max_depth: usize,
}

impl ScanOptions {
    pub fn from_settings(settings: &ImportSettings, max_depth: usize) -> Self {
        Self {
            recursive: settings.recursive,
            extensions: settings.normalized_file_types(),
            max_depth,
        }
    }

    fn accepts(&self, extension: &str) -> bool {
        self.extensions.is_empty() || self.extensions.iter().any(|e| e == extension)
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| name.starts_with('.'))
}

pub struct DirectoryScanner {
    fs: Arc<dyn FileSystemAccess>,
}

impl DirectoryScanner {
    pub fn new(fs: Arc<dyn FileSystemAccess>) -> Self {
        Self { fs }
    }

    /// Scan `root` eagerly.
    ///
    /// # Errors
    ///
    /// - `SourceInvalid` when `root` is missing or not a directory
    /// - `Cancelled` when the token fires at a checkpoint
    #[instrument(skip_all, fields(root = %root.display()))]
    pub async fn scan(
        &self,
        root: &Path,
        options: &ScanOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<FileRecord>> {
        self.check_root(root).await?;

        let mut records = Vec::new();
        let mut pending: Vec<(PathBuf, usize)> = vec![(root.to_path_buf(), 0)];

        while let Some((dir, depth)) = pending.pop() {
            if cancel.is_cancelled() {
                debug!(dir = %dir.display(), "Scan cancelled");
                return Err(ImportError::Cancelled);
            }

            let mut entries = match self.fs.list_directory(&dir).await {
                Ok(entries) => entries,
                Err(e) if dir == root => {
                    return Err(ImportError::SourceInvalid {
                        path: root.display().to_string(),
                        reason: e.to_string(),
                    })
                }
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "Skipping unreadable directory");
                    continue;
                }
            };
            entries.sort();

            let mut subdirs = Vec::new();
            for entry in entries {
                if is_hidden(&entry) {
                    continue;
                }

                let metadata = match self.fs.metadata(&entry).await {
                    Ok(metadata) => metadata,
                    Err(e) => {
                        warn!(path = %entry.display(), error = %e, "Skipping unreadable entry");
                        continue;
                    }
                };

                if metadata.is_directory {
                    if options.recursive && depth < options.max_depth {
                        subdirs.push(entry);
                    }
                    continue;
                }

                if !options.accepts(&extension_of(&entry)) {
                    continue;
                }

                match FileRecord::from_metadata(root, &entry, &metadata) {
                    Some(record) => records.push(record),
                    None => warn!(path = %entry.display(), "Skipping file with unusable name"),
                }
            }

            // Reverse so the smallest name is popped first
            pending.extend(subdirs.into_iter().rev().map(|d| (d, depth + 1)));
        }

        debug!(count = records.len(), "Scan finished");
        Ok(records)
    }

    async fn check_root(&self, root: &Path) -> Result<()> {
        let invalid = |reason: String| ImportError::SourceInvalid {
            path: root.display().to_string(),
            reason,
        };

        if !self.fs.exists(root).await.map_err(|e| invalid(e.to_string()))? {
            return Err(invalid("path does not exist".to_string()));
        }

        let metadata = self
            .fs
            .metadata(root)
            .await
            .map_err(|e| invalid(e.to_string()))?;
        if !metadata.is_directory {
            return Err(invalid("not a directory".to_string()));
        }

        Ok(())
    }
}
