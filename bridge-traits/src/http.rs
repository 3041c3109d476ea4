//! Network Download Abstraction
//!
//! A download lands a single remote resource on local disk. Implementations
//! must honor the request timeout, follow at most `max_redirects` hops and
//! remove any partially written output when the transfer fails.

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::Result;

/// Upper bound on redirect hops a downloader may follow
pub const MAX_REDIRECTS: usize = 5;

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// A single download request
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    pub destination: PathBuf,
    pub timeout: Duration,
    pub max_redirects: usize,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            destination: destination.into(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
            max_redirects: MAX_REDIRECTS,
        }
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = duration;
        self
    }

    /// Clamped to [`MAX_REDIRECTS`]
    pub fn max_redirects(mut self, hops: usize) -> Self {
        self.max_redirects = hops.min(MAX_REDIRECTS);
        self
    }
}

/// Outcome of a completed download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadReceipt {
    pub path: PathBuf,
    pub bytes_written: u64,
    pub final_url: String,
    pub content_type: Option<String>,
}

/// Downloads remote resources to local files
#[async_trait]
pub trait FileDownloader: Send + Sync {
    async fn download(&self, request: DownloadRequest) -> Result<DownloadReceipt>;
}
