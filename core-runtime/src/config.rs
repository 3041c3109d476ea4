//! # Core Configuration Module
//!
//! `CoreConfig` gathers the host bridges and the tunables the import core
//! needs. It is built through [`CoreConfigBuilder`], which validates
//! everything up front so a misconfigured host fails at startup rather
//! than in the middle of an import.
//!
//! ## Dependencies
//!
//! - `FileSystemAccess` - required (desktop default: `TokioFileSystem`)
//! - `FileDownloader` - optional (desktop default: `ReqwestDownloader`)
//! - `UploadService` - zero or more, registered by name
//! - `Clock` - optional, defaults to the system clock
//!
//! With the `desktop-shims` feature the desktop bridges are injected when
//! the host does not provide its own.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::time::Duration;
//!
//! let config = CoreConfig::builder()
//!     .upload_service("azure", Arc::new(MyAzureUploader::new(conn)))
//!     .upload_timeout(Duration::from_secs(120))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{Clock, FileDownloader, FileSystemAccess, SystemClock, UploadService};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_UNIQUE_NAME_LIMIT: u32 = 1000;
pub const DEFAULT_MAX_SCAN_DEPTH: usize = 32;

/// Hard ceiling on redirect hops for downloads
pub const MAX_REDIRECT_LIMIT: usize = bridge_traits::MAX_REDIRECTS;

/// Runtime configuration for the import core
#[derive(Clone)]
pub struct CoreConfig {
    pub file_system: Arc<dyn FileSystemAccess>,

    /// Absent when the host does not support URL downloads
    pub downloader: Option<Arc<dyn FileDownloader>>,

    /// Upload services keyed by the name remote destinations refer to
    pub upload_services: HashMap<String, Arc<dyn UploadService>>,

    pub clock: Arc<dyn Clock>,

    pub event_buffer_size: usize,

    /// Per-file upload timeout
    pub upload_timeout: Duration,

    pub download_timeout: Duration,

    pub max_redirects: usize,

    /// How many `name (n).ext` candidates to probe before falling back to a
    /// timestamped name
    pub unique_name_limit: u32,

    pub max_scan_depth: usize,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut services: Vec<&String> = self.upload_services.keys().collect();
        services.sort();

        f.debug_struct("CoreConfig")
            .field("file_system", &"FileSystemAccess { ... }")
            .field(
                "downloader",
                &self.downloader.as_ref().map(|_| "FileDownloader { ... }"),
            )
            .field("upload_services", &services)
            .field("event_buffer_size", &self.event_buffer_size)
            .field("upload_timeout", &self.upload_timeout)
            .field("download_timeout", &self.download_timeout)
            .field("max_redirects", &self.max_redirects)
            .field("unique_name_limit", &self.unique_name_limit)
            .field("max_scan_depth", &self.max_scan_depth)
            .finish()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Checks the tunables are within range
    pub fn validate(&self) -> Result<()> {
        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.max_redirects > MAX_REDIRECT_LIMIT {
            return Err(Error::Config(format!(
                "max_redirects {} exceeds the limit of {}",
                self.max_redirects, MAX_REDIRECT_LIMIT
            )));
        }

        if self.upload_timeout.is_zero() || self.download_timeout.is_zero() {
            return Err(Error::Config(
                "Transfer timeouts must be greater than zero".to_string(),
            ));
        }

        if self.unique_name_limit == 0 {
            return Err(Error::Config(
                "Unique name limit must be at least 1".to_string(),
            ));
        }

        if self.max_scan_depth == 0 {
            return Err(Error::Config(
                "Maximum scan depth must be at least 1".to_string(),
            ));
        }

        if let Some(name) = self.upload_services.keys().find(|name| name.trim().is_empty()) {
            return Err(Error::Config(format!(
                "Upload service name {:?} is blank",
                name
            )));
        }

        Ok(())
    }

    pub fn upload_service(&self, name: &str) -> Option<Arc<dyn UploadService>> {
        self.upload_services.get(name).cloned()
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn file_system_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "FileSystemAccess".to_string(),
        message: "FileSystemAccess implementation is required to scan and copy files. \
                 Desktop: enable the 'desktop-shims' feature to use TokioFileSystem. \
                 Mobile: inject the platform's sandboxed file system adapter."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_file_system() -> Result<Arc<dyn FileSystemAccess>> {
    use bridge_desktop::TokioFileSystem;

    let fs: Arc<dyn FileSystemAccess> = Arc::new(TokioFileSystem::new());
    Ok(fs)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_file_system() -> Result<Arc<dyn FileSystemAccess>> {
    Err(file_system_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_downloader() -> Option<Arc<dyn FileDownloader>> {
    use bridge_desktop::ReqwestDownloader;

    let downloader: Arc<dyn FileDownloader> = Arc::new(ReqwestDownloader::new());
    Some(downloader)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_downloader() -> Option<Arc<dyn FileDownloader>> {
    None
}

/// Builder for [`CoreConfig`]
#[derive(Default)]
pub struct CoreConfigBuilder {
    file_system: Option<Arc<dyn FileSystemAccess>>,
    downloader: Option<Arc<dyn FileDownloader>>,
    upload_services: HashMap<String, Arc<dyn UploadService>>,
    clock: Option<Arc<dyn Clock>>,
    event_buffer_size: Option<usize>,
    upload_timeout: Option<Duration>,
    download_timeout: Option<Duration>,
    max_redirects: Option<usize>,
    unique_name_limit: Option<u32>,
    max_scan_depth: Option<usize>,
}

impl CoreConfigBuilder {
    pub fn file_system(mut self, fs: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(fs);
        self
    }

    pub fn downloader(mut self, downloader: Arc<dyn FileDownloader>) -> Self {
        self.downloader = Some(downloader);
        self
    }

    /// Registers an upload service under `name`. A later registration with
    /// the same name replaces the earlier one.
    pub fn upload_service(mut self, name: impl Into<String>, service: Arc<dyn UploadService>) -> Self {
        self.upload_services.insert(name.into(), service);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    pub fn upload_timeout(mut self, timeout: Duration) -> Self {
        self.upload_timeout = Some(timeout);
        self
    }

    pub fn download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = Some(timeout);
        self
    }

    pub fn max_redirects(mut self, hops: usize) -> Self {
        self.max_redirects = Some(hops);
        self
    }

    pub fn unique_name_limit(mut self, limit: u32) -> Self {
        self.unique_name_limit = Some(limit);
        self
    }

    pub fn max_scan_depth(mut self, depth: usize) -> Self {
        self.max_scan_depth = Some(depth);
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// - `CapabilityMissing` when no file system is provided and the desktop
    ///   defaults are not compiled in
    /// - `Config` when a tunable is out of range
    pub fn build(self) -> Result<CoreConfig> {
        let file_system = match self.file_system {
            Some(fs) => fs,
            None => provide_default_file_system()?,
        };

        let downloader = self.downloader.or_else(provide_default_downloader);

        let config = CoreConfig {
            file_system,
            downloader,
            upload_services: self.upload_services,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            upload_timeout: self.upload_timeout.unwrap_or(DEFAULT_UPLOAD_TIMEOUT),
            download_timeout: self.download_timeout.unwrap_or(DEFAULT_DOWNLOAD_TIMEOUT),
            max_redirects: self.max_redirects.unwrap_or(MAX_REDIRECT_LIMIT),
            unique_name_limit: self.unique_name_limit.unwrap_or(DEFAULT_UNIQUE_NAME_LIMIT),
            max_scan_depth: self.max_scan_depth.unwrap_or(DEFAULT_MAX_SCAN_DEPTH),
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{
        ConnectionReport, FileMetadata, UploadOptions, UploadReceipt, ValidationReport,
    };
    use std::path::{Path, PathBuf};

    struct NullFileSystem;

    #[async_trait]
    impl FileSystemAccess for NullFileSystem {
        async fn get_cache_directory(&self) -> BridgeResult<PathBuf> {
            Ok(PathBuf::from("/tmp"))
        }
        async fn exists(&self, _path: &Path) -> BridgeResult<bool> {
            Ok(false)
        }
        async fn metadata(&self, _path: &Path) -> BridgeResult<FileMetadata> {
            Ok(FileMetadata {
                size: 0,
                created_at: None,
                modified_at: None,
                is_directory: false,
            })
        }
        async fn create_dir_all(&self, _path: &Path) -> BridgeResult<()> {
            Ok(())
        }
        async fn copy_file(&self, _from: &Path, _to: &Path) -> BridgeResult<u64> {
            Ok(0)
        }
        async fn list_directory(&self, _path: &Path) -> BridgeResult<Vec<PathBuf>> {
            Ok(Vec::new())
        }    }

    struct NullUploader;

    #[async_trait]
    impl UploadService for NullUploader {
        async fn validate_configuration(&self) -> ValidationReport {
            ValidationReport::ok()
        }
        async fn test_connection(&self) -> ConnectionReport {
            ConnectionReport {
                success: true,
                message: "ok".to_string(),
                details: None,
            }
        }
        async fn check_if_duplicate(&self, _remote_name: &str, _size: u64) -> BridgeResult<bool> {
            Ok(false)
        }
        async fn generate_unique_remote_name(&self, name: &str, _size: u64) -> BridgeResult<String> {
            Ok(name.to_string())
        }
        async fn upload_file(
            &self,
            _path: &Path,
            remote_name: &str,
            _mime_type: &str,
            _options: &UploadOptions,
        ) -> BridgeResult<UploadReceipt> {
            Ok(UploadReceipt::uploaded(remote_name))
        }
    }

    fn builder() -> CoreConfigBuilder {
        CoreConfig::builder().file_system(Arc::new(NullFileSystem))
    }

    #[test]
    fn test_builder_defaults() {
        let config = builder().build().unwrap();
        assert_eq!(config.event_buffer_size, DEFAULT_EVENT_BUFFER_SIZE);
        assert_eq!(config.upload_timeout, DEFAULT_UPLOAD_TIMEOUT);
        assert_eq!(config.download_timeout, DEFAULT_DOWNLOAD_TIMEOUT);
        assert_eq!(config.max_redirects, 5);
        assert_eq!(config.unique_name_limit, 1000);
        assert!(config.upload_services.is_empty());
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_builder_requires_file_system() {
        let result = CoreConfig::builder().build();
        match result {
            Err(Error::CapabilityMissing { capability, .. }) => {
                assert_eq!(capability, "FileSystemAccess")
            }
            other => panic!("expected CapabilityMissing, got {other:?}"),
        }
    }

    #[cfg(feature = "desktop-shims")]
    #[test]
    fn test_build_with_desktop_defaults() {
        let config = CoreConfig::builder().build().unwrap();
        assert!(config.downloader.is_some());
    }

    #[test]
    fn test_validate_rejects_excessive_redirects() {
        let result = builder().max_redirects(6).build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_buffer() {
        assert!(builder().event_buffer_size(0).build().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_timeouts() {
        assert!(builder().upload_timeout(Duration::ZERO).build().is_err());
        assert!(builder().download_timeout(Duration::ZERO).build().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_unique_limit() {
        assert!(builder().unique_name_limit(0).build().is_err());
    }

    #[test]
    fn test_upload_service_registry() {
        let config = builder()
            .upload_service("azure", Arc::new(NullUploader))
            .upload_service("gcs", Arc::new(NullUploader))
            .build()
            .unwrap();

        assert!(config.upload_service("azure").is_some());
        assert!(config.upload_service("s3").is_none());
        assert!(format!("{config:?}").contains("azure"));
    }

    #[test]
    fn test_blank_service_name_rejected() {
        let result = builder().upload_service("  ", Arc::new(NullUploader)).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_config_is_cloneable() {
        let config = builder().max_scan_depth(4).build().unwrap();
        let cloned = config.clone();
        assert_eq!(cloned.max_scan_depth, 4);
    }
}
