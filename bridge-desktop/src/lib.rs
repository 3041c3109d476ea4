//! # Desktop Bridge Implementations
//!
//! Default implementations of the bridge traits for desktop hosts
//! (macOS, Windows, Linux).
//!
//! - `FileSystemAccess` backed by `tokio::fs`
//! - `FileDownloader` backed by `reqwest`, streaming straight to disk
//!
//! Upload services are host-specific and are not provided here.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ReqwestDownloader, TokioFileSystem};
//!
//! let fs = Arc::new(TokioFileSystem::new());
//! let downloader = Arc::new(ReqwestDownloader::new());
//! let config = CoreConfig::builder()
//!     .file_system(fs)
//!     .downloader(downloader)
//!     .build()?;
//! ```

mod filesystem;
mod http;

pub use filesystem::TokioFileSystem;
pub use http::ReqwestDownloader;
