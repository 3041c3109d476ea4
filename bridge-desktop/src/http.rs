//! Download Implementation using Reqwest

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{DownloadReceipt, DownloadRequest, FileDownloader, MAX_REDIRECTS},
};
use futures_util::StreamExt;
use reqwest::{redirect, Client};
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

const USER_AGENT: &str = "media-import-core/0.1.0";

/// Reqwest-based downloader
///
/// Streams the response body to the destination file chunk by chunk. A
/// failed transfer never leaves a partial file behind.
pub struct ReqwestDownloader {
    connect_timeout: Duration,
}

impl ReqwestDownloader {
    pub fn new() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_connect_timeout(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    fn build_client(&self, request: &DownloadRequest) -> Result<Client> {
        Client::builder()
            .timeout(request.timeout)
            .connect_timeout(self.connect_timeout)
            .redirect(redirect::Policy::limited(
                request.max_redirects.min(MAX_REDIRECTS),
            ))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| BridgeError::OperationFailed(format!("HTTP client setup failed: {e}")))
    }

    fn map_reqwest_error(request: &DownloadRequest, e: reqwest::Error) -> BridgeError {
        if e.is_timeout() {
            BridgeError::Timeout(request.timeout.as_secs())
        } else if e.is_redirect() {
            BridgeError::OperationFailed(format!(
                "Too many redirects fetching {}",
                request.url
            ))
        } else {
            BridgeError::OperationFailed(format!("Download of {} failed: {e}", request.url))
        }
    }

    async fn stream_to_file(
        request: &DownloadRequest,
        response: reqwest::Response,
    ) -> Result<u64> {
        if let Some(parent) = request.destination.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&request.destination).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Self::map_reqwest_error(request, e))?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }

        file.flush().await?;
        Ok(written)
    }

    async fn remove_partial(path: &Path) {
        if let Err(e) = fs::remove_file(path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = ?path, error = %e, "Failed to remove partial download");
            }
        }
    }
}

impl Default for ReqwestDownloader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileDownloader for ReqwestDownloader {
    async fn download(&self, request: DownloadRequest) -> Result<DownloadReceipt> {
        let client = self.build_client(&request)?;

        debug!(url = %request.url, destination = ?request.destination, "Starting download");

        let response = client
            .get(&request.url)
            .send()
            .await
            .map_err(|e| Self::map_reqwest_error(&request, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BridgeError::OperationFailed(format!(
                "Download of {} failed with HTTP {}",
                request.url,
                status.as_u16()
            )));
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        match Self::stream_to_file(&request, response).await {
            Ok(bytes_written) => {
                debug!(url = %request.url, bytes_written, "Download finished");
                Ok(DownloadReceipt {
                    path: request.destination.clone(),
                    bytes_written,
                    final_url,
                    content_type,
                })
            }
            Err(e) => {
                Self::remove_partial(&request.destination).await;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_builds_with_clamped_redirects() {
        let downloader = ReqwestDownloader::new();
        let request = DownloadRequest::new("https://example.com/a.jpg", "/tmp/a.jpg")
            .max_redirects(50);
        assert_eq!(request.max_redirects, MAX_REDIRECTS);
        assert!(downloader.build_client(&request).is_ok());
    }

    #[tokio::test]
    async fn test_invalid_url_fails_without_leaving_file() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("out.jpg");
        let downloader = ReqwestDownloader::new();

        let result = downloader
            .download(DownloadRequest::new("not a url", destination.clone()))
            .await;

        assert!(result.is_err());
        assert!(!destination.exists());
    }

    #[tokio::test]
    async fn test_remove_partial_ignores_missing() {
        let dir = tempfile::tempdir().unwrap();
        ReqwestDownloader::remove_partial(&dir.path().join("never-written")).await;
    }
}
