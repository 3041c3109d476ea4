//! Unique naming and duplicate detection inside a destination directory

use bridge_traits::{Clock, FileSystemAccess};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::Result;

/// Split `IMG_0001.jpg` into (`IMG_0001`, `Some("jpg")`). Leading-dot names
/// such as `.profile` have no extension.
fn split_name(file_name: &str) -> (&str, Option<&str>) {
    match file_name.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < file_name.len() => {
            (&file_name[..idx], Some(&file_name[idx + 1..]))
        }
        _ => (file_name, None),
    }
}

/// `name (n).ext`
pub fn numbered_name(file_name: &str, n: u32) -> String {
    match split_name(file_name) {
        (stem, Some(ext)) => format!("{stem} ({n}).{ext}"),
        (stem, None) => format!("{stem} ({n})"),
    }
}

/// `name_<millis>.ext`, the last resort once numbered probing is exhausted
pub fn timestamped_name(file_name: &str, unix_millis: i64) -> String {
    match split_name(file_name) {
        (stem, Some(ext)) => format!("{stem}_{unix_millis}.{ext}"),
        (stem, None) => format!("{stem}_{unix_millis}"),
    }
}

/// Resolves collisions against the file system
#[derive(Clone)]
pub struct UniqueNameResolver {
    fs: Arc<dyn FileSystemAccess>,
    clock: Arc<dyn Clock>,
    limit: u32,
}

impl UniqueNameResolver {
    pub fn new(fs: Arc<dyn FileSystemAccess>, clock: Arc<dyn Clock>, limit: u32) -> Self {
        Self { fs, clock, limit }
    }

    /// Returns `candidate` when free, otherwise the first free
    /// `name (n).ext` for n in `1..=limit`, otherwise a timestamped name.
    pub async fn resolve(&self, candidate: &Path) -> Result<PathBuf> {
        if !self.fs.exists(candidate).await? {
            return Ok(candidate.to_path_buf());
        }

        let Some(file_name) = candidate.file_name().and_then(|n| n.to_str()) else {
            return Ok(candidate.to_path_buf());
        };
        let parent = candidate.parent().unwrap_or_else(|| Path::new(""));

        for n in 1..=self.limit {
            let probe = parent.join(numbered_name(file_name, n));
            if !self.fs.exists(&probe).await? {
                debug!(from = %file_name, to = ?probe.file_name(), "Resolved name collision");
                return Ok(probe);
            }
        }

        let fallback = parent.join(timestamped_name(
            file_name,
            self.clock.unix_timestamp_millis(),
        ));
        warn!(
            file = %file_name,
            limit = self.limit,
            "Numbered names exhausted, using timestamped name"
        );
        Ok(fallback)
    }

    /// Size-only duplicate test: `target` exists and has `source_size` bytes
    pub async fn is_duplicate(&self, target: &Path, source_size: u64) -> Result<bool> {
        if !self.fs.exists(target).await? {
            return Ok(false);
        }
        let metadata = self.fs.metadata(target).await?;
        Ok(!metadata.is_directory && metadata.size == source_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_desktop::TokioFileSystem;
    use bridge_traits::FixedClock;
    use chrono::TimeZone;

    fn resolver(limit: u32) -> UniqueNameResolver {
        let clock = FixedClock(chrono::Utc.timestamp_millis_opt(1_700_000_000_123).unwrap());
        UniqueNameResolver::new(Arc::new(TokioFileSystem::new()), Arc::new(clock), limit)
    }

    #[test]
    fn test_numbered_name() {
        assert_eq!(numbered_name("IMG_0001.jpg", 1), "IMG_0001 (1).jpg");
        assert_eq!(numbered_name("archive.tar.gz", 2), "archive.tar (2).gz");
        assert_eq!(numbered_name("README", 3), "README (3)");
        assert_eq!(numbered_name(".hidden", 1), ".hidden (1)");
    }

    #[test]
    fn test_timestamped_name() {
        assert_eq!(timestamped_name("a.jpg", 42), "a_42.jpg");
        assert_eq!(timestamped_name("a", 42), "a_42");
    }

    #[tokio::test]
    async fn test_free_candidate_is_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let candidate = dir.path().join("a.jpg");
        assert_eq!(resolver(1000).resolve(&candidate).await.unwrap(), candidate);
    }

    #[tokio::test]
    async fn test_smallest_free_counter_is_used() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"x").unwrap();
        std::fs::write(dir.path().join("a (1).jpg"), b"x").unwrap();
        std::fs::write(dir.path().join("a (3).jpg"), b"x").unwrap();

        let resolved = resolver(1000)
            .resolve(&dir.path().join("a.jpg"))
            .await
            .unwrap();
        assert_eq!(resolved, dir.path().join("a (2).jpg"));
    }

    #[tokio::test]
    async fn test_cap_falls_back_to_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"x").unwrap();
        std::fs::write(dir.path().join("a (1).jpg"), b"x").unwrap();
        std::fs::write(dir.path().join("a (2).jpg"), b"x").unwrap();

        let resolved = resolver(2)
            .resolve(&dir.path().join("a.jpg"))
            .await
            .unwrap();
        assert_eq!(resolved, dir.path().join("a_1700000000123.jpg"));
    }

    #[tokio::test]
    async fn test_duplicate_is_size_only() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a.jpg");
        std::fs::write(&target, b"12345").unwrap();

        let names = resolver(1000);
        assert!(names.is_duplicate(&target, 5).await.unwrap());
        assert!(!names.is_duplicate(&target, 6).await.unwrap());
        assert!(!names
            .is_duplicate(&dir.path().join("missing.jpg"), 5)
            .await
            .unwrap());
    }
}
