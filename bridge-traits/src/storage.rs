//! File System Abstractions
//!
//! Provides the platform-agnostic file system contract the import core calls
//! for stat/list/copy/mkdir. The core never touches `std::fs` directly.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// File metadata information
#[derive(Debug, Clone)]
pub struct FileMetadata {
    pub size: u64,
    pub created_at: Option<i64>,
    pub modified_at: Option<i64>,
    pub is_directory: bool,
}

/// File system access trait
///
/// Abstracts file I/O operations so the import pipeline can run against
/// the desktop filesystem, a sandboxed mobile container, or an in-memory
/// fake in tests.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::FileSystemAccess;
///
/// async fn land(fs: &dyn FileSystemAccess, src: &Path, dir: &Path) -> Result<u64> {
///     fs.create_dir_all(dir).await?;
///     fs.copy_file(src, &dir.join("IMG_0001.jpg")).await
/// }
/// ```
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    /// Get the application's cache directory
    ///
    /// Downloads land here when the caller does not name a destination.
    async fn get_cache_directory(&self) -> Result<PathBuf>;

    /// Check if a file or directory exists
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Get metadata for a file or directory
    async fn metadata(&self, path: &Path) -> Result<FileMetadata>;

    /// Create a directory and all parent directories if they don't exist
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Copy `from` to `to`, overwriting `to` if present. Returns bytes copied.
    async fn copy_file(&self, from: &Path, to: &Path) -> Result<u64>;

    /// List all entries in a directory
    async fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>>;
}
