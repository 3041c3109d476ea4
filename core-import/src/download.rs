//! # Download Worker
//!
//! Lands a single remote resource on local disk through the
//! [`FileDownloader`] bridge. One download is in flight at a time; the
//! transfer itself runs on its own tokio task.

use bridge_traits::{DownloadRequest, FileDownloader, FileSystemAccess};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, TransferEvent};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use url::Url;
use uuid::Uuid;

use crate::error::{ImportError, Result};
use crate::upload::InFlightGuard;

const DOWNLOAD_SUBDIR: &str = "downloads";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadOutcome {
    pub download_id: String,
    pub path: PathBuf,
    pub bytes: u64,
    pub content_type: Option<String>,
}

pub struct DownloadWorker {
    downloader: Option<Arc<dyn FileDownloader>>,
    fs: Arc<dyn FileSystemAccess>,
    events: EventBus,
    in_flight: Arc<AtomicBool>,
    timeout: Duration,
    max_redirects: usize,
}

impl DownloadWorker {
    pub fn new(
        downloader: Option<Arc<dyn FileDownloader>>,
        fs: Arc<dyn FileSystemAccess>,
        events: EventBus,
    ) -> Self {
        Self {
            downloader,
            fs,
            events,
            in_flight: Arc::new(AtomicBool::new(false)),
            timeout: bridge_traits::http::DEFAULT_REQUEST_TIMEOUT,
            max_redirects: bridge_traits::MAX_REDIRECTS,
        }
    }

    pub fn from_config(config: &CoreConfig, events: EventBus) -> Self {
        Self {
            timeout: config.download_timeout,
            max_redirects: config.max_redirects,
            ..Self::new(config.downloader.clone(), Arc::clone(&config.file_system), events)
        }
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Download `url` to `destination`, or into the cache directory when no
    /// destination is given.
    ///
    /// # Errors
    ///
    /// - `DownloadBusy` while another download is running
    /// - `Runtime(CapabilityMissing)` when no downloader is configured
    /// - `Bridge` for transport failures, including timeouts
    #[instrument(skip(self, destination), fields(url = %url))]
    pub async fn download(&self, url: &str, destination: Option<PathBuf>) -> Result<DownloadOutcome> {
        let downloader = self.downloader.clone().ok_or_else(|| {
            ImportError::Runtime(core_runtime::Error::CapabilityMissing {
                capability: "FileDownloader".to_string(),
                message: "No downloader is configured for this host".to_string(),
            })
        })?;
        let guard = InFlightGuard::acquire(&self.in_flight).ok_or(ImportError::DownloadBusy)?;

        let download_id = Uuid::new_v4().to_string();
        let destination = match destination {
            Some(path) => path,
            None => self.default_destination(url, &download_id).await?,
        };
        if let Some(parent) = destination.parent() {
            self.fs.create_dir_all(parent).await?;
        }

        let request = DownloadRequest::new(url, destination)
            .timeout(self.timeout)
            .max_redirects(self.max_redirects);

        self.emit(TransferEvent::DownloadStarted {
            download_id: download_id.clone(),
            url: url.to_string(),
        });

        let result = tokio::spawn(async move {
            let _guard = guard;
            downloader.download(request).await
        })
        .await
        .map_err(|e| ImportError::Internal(format!("Download task failed: {}", e)))?;

        match result {
            Ok(receipt) => {
                info!(path = %receipt.path.display(), bytes = receipt.bytes_written, "Download finished");
                self.emit(TransferEvent::DownloadFinished {
                    download_id: download_id.clone(),
                    url: url.to_string(),
                    path: receipt.path.display().to_string(),
                    bytes: receipt.bytes_written,
                });
                Ok(DownloadOutcome {
                    download_id,
                    path: receipt.path,
                    bytes: receipt.bytes_written,
                    content_type: receipt.content_type,
                })
            }
            Err(e) => {
                warn!(error = %e, "Download failed");
                self.emit(TransferEvent::DownloadFailed {
                    download_id,
                    url: url.to_string(),
                    message: e.to_string(),
                });
                Err(e.into())
            }
        }
    }

    async fn default_destination(&self, url: &str, download_id: &str) -> Result<PathBuf> {
        let dir = self.fs.get_cache_directory().await?.join(DOWNLOAD_SUBDIR);
        let name = file_name_from_url(url).unwrap_or_else(|| format!("download-{}", download_id));
        Ok(dir.join(name))
    }

    fn emit(&self, event: TransferEvent) {
        self.events.emit(CoreEvent::Transfer(event)).ok();
    }
}

/// Decoded last path segment of an absolute URL, with any `;params` dropped
fn file_name_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.last()?;
    let segment = segment.split(';').next().unwrap_or(segment);
    let name = urlencoding::decode(segment).ok()?;
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return None;
    }
    Some(name.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_desktop::TokioFileSystem;
    use bridge_traits::{BridgeError, DownloadReceipt};
    use core_runtime::events::EventStream;
    use mockall::mock;

    mock! {
        Downloader {}

        #[async_trait]
        impl FileDownloader for Downloader {
            async fn download(&self, request: DownloadRequest) -> bridge_traits::error::Result<DownloadReceipt>;
        }
    }

    fn worker(downloader: MockDownloader, cache: &std::path::Path, bus: EventBus) -> DownloadWorker {
        DownloadWorker::new(
            Some(Arc::new(downloader)),
            Arc::new(TokioFileSystem::with_cache_directory(cache.to_path_buf())),
            bus,
        )
    }

    #[test]
    fn test_file_name_from_url() {
        assert_eq!(
            file_name_from_url("https://host/media/IMG_1.jpg?sig=abc").as_deref(),
            Some("IMG_1.jpg")
        );
        assert_eq!(file_name_from_url("https://host/"), None);
        assert_eq!(file_name_from_url("https://host"), None);
        assert_eq!(file_name_from_url("https://host/a/b.mov#t=1").as_deref(), Some("b.mov"));
        assert_eq!(file_name_from_url("not a url"), None);
    }

    #[test]
    fn test_file_name_from_url_decodes_segment() {
        assert_eq!(
            file_name_from_url("https://host/photos/IMG%201.jpg").as_deref(),
            Some("IMG 1.jpg")
        );
        assert_eq!(file_name_from_url("https://host/a.jpg;v=1").as_deref(), Some("a.jpg"));
        assert_eq!(file_name_from_url("https://host/x/%2E%2E"), None);
        assert_eq!(file_name_from_url("https://host/x/a%2Fb.jpg"), None);
    }

    #[tokio::test]
    async fn test_download_into_cache_directory() {
        let cache = tempfile::tempdir().unwrap();
        let mut mock = MockDownloader::new();
        mock.expect_download()
            .withf(|req| req.max_redirects <= 5 && req.destination.ends_with("downloads/clip.mp4"))
            .times(1)
            .returning(|req| {
                Ok(DownloadReceipt {
                    path: req.destination.clone(),
                    bytes_written: 42,
                    final_url: req.url.clone(),
                    content_type: Some("video/mp4".to_string()),
                })
            });

        let bus = EventBus::new(16);
        let mut events = EventStream::new(bus.subscribe());
        let worker = worker(mock, cache.path(), bus);

        let outcome = worker
            .download("https://cdn.example.com/v/clip.mp4", None)
            .await
            .unwrap();
        assert_eq!(outcome.bytes, 42);
        assert_eq!(outcome.path, cache.path().join("downloads").join("clip.mp4"));
        assert!(cache.path().join("downloads").is_dir());
        assert!(!worker.is_busy());

        assert!(matches!(
            events.recv().await.unwrap(),
            CoreEvent::Transfer(TransferEvent::DownloadStarted { .. })
        ));
        assert!(matches!(
            events.recv().await.unwrap(),
            CoreEvent::Transfer(TransferEvent::DownloadFinished { bytes: 42, .. })
        ));
    }

    #[tokio::test]
    async fn test_failure_emits_failed_event() {
        let cache = tempfile::tempdir().unwrap();
        let mut mock = MockDownloader::new();
        mock.expect_download()
            .returning(|_| Err(BridgeError::Timeout(60)));

        let bus = EventBus::new(16);
        let mut events = EventStream::new(bus.subscribe());
        let worker = worker(mock, cache.path(), bus);

        let result = worker
            .download("https://cdn.example.com/x.jpg", Some(cache.path().join("x.jpg")))
            .await;
        assert!(matches!(result, Err(ImportError::Bridge(BridgeError::Timeout(60)))));

        events.recv().await.unwrap();
        assert!(matches!(
            events.recv().await.unwrap(),
            CoreEvent::Transfer(TransferEvent::DownloadFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_busy_and_missing_downloader() {
        let cache = tempfile::tempdir().unwrap();
        let worker = worker(MockDownloader::new(), cache.path(), EventBus::new(4));
        let _held = InFlightGuard::acquire(&worker.in_flight).unwrap();
        assert!(matches!(
            worker.download("https://a/b.jpg", None).await,
            Err(ImportError::DownloadBusy)
        ));

        let bare = DownloadWorker::new(
            None,
            Arc::new(TokioFileSystem::with_cache_directory(cache.path().to_path_buf())),
            EventBus::new(4),
        );
        assert!(matches!(
            bare.download("https://a/b.jpg", None).await,
            Err(ImportError::Runtime(core_runtime::Error::CapabilityMissing { .. }))
        ));
    }
}
