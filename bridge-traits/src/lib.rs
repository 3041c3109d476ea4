//! # Host Bridge Traits
//!
//! Capabilities the media import core needs from its host, expressed as
//! traits so each platform (or test) can supply its own implementation.
//!
//! ## Traits
//!
//! - [`FileSystemAccess`](storage::FileSystemAccess) - directory listing, metadata, copy
//! - [`FileDownloader`](http::FileDownloader) - fetch a URL to a local file
//! - [`UploadService`](upload::UploadService) - hand files to a remote object store
//! - [`Clock`](time::Clock) - time source for deterministic tests
//! - [`LoggerSink`](time::LoggerSink) - forward structured logs to the host
//!
//! ## Fail-Fast Strategy
//!
//! The core refuses to start when a required capability is missing instead of
//! discovering it halfway through an import:
//!
//! ```ignore
//! let fs = config.file_system.ok_or_else(|| Error::CapabilityMissing {
//!     capability: "FileSystemAccess".to_string(),
//!     message: "No file system adapter provided. \
//!               Desktop: enable the desktop-shims feature.".to_string(),
//! })?;
//! ```
//!
//! ## Error Handling
//!
//! Every trait reports failures as [`BridgeError`](error::BridgeError).
//! Adapters convert platform errors into it and keep the path or URL in the
//! message.
//!
//! ## Thread Safety
//!
//! All traits require `Send + Sync`; the core shares implementations across
//! tokio tasks behind `Arc`.

pub mod error;
pub mod http;
pub mod storage;
pub mod time;
pub mod upload;

pub use error::BridgeError;

pub use http::{DownloadReceipt, DownloadRequest, FileDownloader, MAX_REDIRECTS};
pub use storage::{FileMetadata, FileSystemAccess};
pub use time::{Clock, ConsoleLogger, FixedClock, LogEntry, LogLevel, LoggerSink, SystemClock};
pub use upload::{ConnectionReport, UploadOptions, UploadReceipt, UploadService, ValidationReport};
