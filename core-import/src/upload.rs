//! # Upload Hand-off
//!
//! Submits queued files to a registered external [`UploadService`].
//!
//! - One batch in flight at a time; a second `submit` is rejected with
//!   `UploadBusy`.
//! - The batch runs on its own tokio task, one file at a time.
//! - Every per-file failure (including a timeout) is recorded as an
//!   [`UploadFileOutcome`] and never retried.
//! - The cancellation token is checked before and after each file.

use bridge_traits::{Clock, ConnectionReport, UploadOptions, UploadService, ValidationReport};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, TransferEvent};
use core_runtime::logging::redact_if_sensitive;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::destination::QueuedUpload;
use crate::error::{ImportError, Result};
use crate::media::mime_type_for;
use crate::organizer::{remote_object_name, resolve_folder};

// ============================================================================
// Batch Types
// ============================================================================

#[derive(Debug, Clone)]
pub struct UploadBatch {
    pub job_id: Option<String>,
    pub service: String,
    pub items: Vec<QueuedUpload>,
    pub skip_duplicates: bool,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadFileOutcome {
    pub source_path: PathBuf,
    pub remote_name: String,
    pub success: bool,
    pub skipped: bool,
    pub url: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSummary {
    pub service: String,
    pub uploaded: u64,
    pub skipped: u64,
    pub failed: u64,
    pub files: Vec<UploadFileOutcome>,
    pub errors: Vec<String>,
    /// Stopped early at a checkpoint
    pub cancelled: bool,
}

impl UploadSummary {
    fn record(&mut self, outcome: UploadFileOutcome) {
        if !outcome.success {
            self.failed += 1;
            self.errors
                .push(format!("{}: {}", outcome.remote_name, outcome.message));
        } else if outcome.skipped {
            self.skipped += 1;
        } else {
            self.uploaded += 1;
        }
        self.files.push(outcome);
    }
}

/// Clears the in-flight flag when the owning task ends
pub(crate) struct InFlightGuard(Arc<AtomicBool>);

impl InFlightGuard {
    pub(crate) fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(Arc::clone(flag)))
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// ============================================================================
// Upload Handoff
// ============================================================================

pub struct UploadHandoff {
    services: RwLock<HashMap<String, Arc<dyn UploadService>>>,
    in_flight: Arc<AtomicBool>,
    events: EventBus,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl UploadHandoff {
    pub fn new(events: EventBus, clock: Arc<dyn Clock>, timeout: Duration) -> Self {
        Self {
            services: RwLock::new(HashMap::new()),
            in_flight: Arc::new(AtomicBool::new(false)),
            events,
            clock,
            timeout,
        }
    }

    /// Pre-registers every service named in `config`
    pub fn from_config(config: &CoreConfig, events: EventBus) -> Self {
        let services = config
            .upload_services
            .iter()
            .map(|(name, service)| (name.clone(), Arc::clone(service)))
            .collect();
        Self {
            services: RwLock::new(services),
            in_flight: Arc::new(AtomicBool::new(false)),
            events,
            clock: Arc::clone(&config.clock),
            timeout: config.upload_timeout,
        }
    }

    pub async fn register_service(&self, name: impl Into<String>, service: Arc<dyn UploadService>) {
        let name = name.into();
        debug!(service = %name, "Registering upload service");
        self.services.write().await.insert(name, service);
    }

    pub async fn service(&self, name: &str) -> Result<Arc<dyn UploadService>> {
        self.services
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| ImportError::ServiceNotRegistered(name.to_string()))
    }

    pub async fn service_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.services.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub async fn validate(&self, service: &str) -> Result<ValidationReport> {
        Ok(self.service(service).await?.validate_configuration().await)
    }

    pub async fn test_connection(&self, service: &str) -> Result<ConnectionReport> {
        let report = self.service(service).await?.test_connection().await;
        info!(service, success = report.success, "Upload service connection test");
        Ok(report)
    }

    /// Upload every item of `batch`.
    ///
    /// # Errors
    ///
    /// - `UploadBusy` when another batch is in flight
    /// - `ServiceNotRegistered` for an unknown service
    /// - `InvalidConfiguration` when the service rejects its configuration
    #[instrument(skip_all, fields(service = %batch.service, count = batch.items.len()))]
    pub async fn submit(&self, batch: UploadBatch, cancel: CancellationToken) -> Result<UploadSummary> {
        let guard = InFlightGuard::acquire(&self.in_flight).ok_or(ImportError::UploadBusy)?;

        let service = self.service(&batch.service).await?;
        let report = service.validate_configuration().await;
        if !report.valid {
            return Err(ImportError::InvalidConfiguration(format!(
                "Upload service '{}' is misconfigured: {}",
                batch.service,
                report.errors.join("; ")
            )));
        }

        for (key, value) in &batch.metadata {
            debug!(key = %key, value = %redact_if_sensitive(key, value), "Upload metadata");
        }

        self.events
            .emit(CoreEvent::Transfer(TransferEvent::UploadStarted {
                job_id: batch.job_id.clone(),
                service: batch.service.clone(),
                count: batch.items.len(),
            }))
            .ok();

        let worker = BatchWorker {
            service,
            events: self.events.clone(),
            clock: Arc::clone(&self.clock),
            timeout: self.timeout,
        };

        tokio::spawn(async move {
            let _guard = guard;
            worker.run(batch, cancel).await
        })
        .await
        .map_err(|e| ImportError::Internal(format!("Upload task failed: {}", e)))
    }
}

struct BatchWorker {
    service: Arc<dyn UploadService>,
    events: EventBus,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl BatchWorker {
    async fn run(self, batch: UploadBatch, cancel: CancellationToken) -> UploadSummary {
        let mut summary = UploadSummary {
            service: batch.service.clone(),
            ..Default::default()
        };
        let options = UploadOptions {
            skip_duplicates: batch.skip_duplicates,
            metadata: batch.metadata.clone(),
        };

        for item in &batch.items {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            let outcome = self.upload_one(item, &options).await;
            self.events
                .emit(CoreEvent::Transfer(TransferEvent::UploadFile {
                    service: batch.service.clone(),
                    remote_name: outcome.remote_name.clone(),
                    success: outcome.success,
                    skipped: outcome.skipped,
                    message: outcome.message.clone(),
                }))
                .ok();
            summary.record(outcome);

            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }
        }

        info!(
            uploaded = summary.uploaded,
            skipped = summary.skipped,
            failed = summary.failed,
            cancelled = summary.cancelled,
            "Upload batch finished"
        );
        self.events
            .emit(CoreEvent::Transfer(TransferEvent::UploadFinished {
                service: summary.service.clone(),
                uploaded: summary.uploaded,
                skipped: summary.skipped,
                failed: summary.failed,
            }))
            .ok();

        summary
    }

    async fn upload_one(&self, item: &QueuedUpload, options: &UploadOptions) -> UploadFileOutcome {
        let file = &item.file;
        let folder = resolve_folder(file, &item.folder_organization, self.clock.now());
        let natural_name = remote_object_name(&folder, &file.name);

        let outcome = |remote_name: &str,
                       success: bool,
                       skipped: bool,
                       url: Option<String>,
                       message: String| UploadFileOutcome {
            source_path: item.source_path.clone(),
            remote_name: remote_name.to_string(),
            success,
            skipped,
            url,
            message,
        };

        if options.skip_duplicates {
            match self.service.check_if_duplicate(&natural_name, file.size).await {
                Ok(true) => {
                    debug!(remote = %natural_name, "Remote duplicate, skipping");
                    return outcome(
                        &natural_name,
                        true,
                        true,
                        None,
                        "Already exists remotely".to_string(),
                    );
                }
                Ok(false) => {}
                Err(e) => warn!(remote = %natural_name, error = %e, "Duplicate check failed, uploading anyway"),
            }
        }

        let remote_name = match self
            .service
            .generate_unique_remote_name(&natural_name, file.size)
            .await
        {
            Ok(name) => name,
            Err(e) => {
                return outcome(
                    &natural_name,
                    false,
                    false,
                    None,
                    format!("Could not pick a remote name: {}", e),
                )
            }
        };

        let upload = self.service.upload_file(
            &item.source_path,
            &remote_name,
            mime_type_for(&file.extension),
            options,
        );

        match tokio::time::timeout(self.timeout, upload).await {
            Ok(Ok(receipt)) => outcome(
                &remote_name,
                receipt.success,
                receipt.skipped,
                receipt.url,
                receipt.message,
            ),
            Ok(Err(e)) => outcome(&remote_name, false, false, None, e.to_string()),
            Err(_) => outcome(
                &remote_name,
                false,
                false,
                None,
                format!("Upload timed out after {}s", self.timeout.as_secs()),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{FileRecord, MediaType};
    use async_trait::async_trait;
    use bridge_traits::{BridgeError, SystemClock, UploadReceipt};
    use core_runtime::settings::FolderOrganizationConfig;
    use std::path::Path;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeStore {
        existing: Vec<String>,
        fail_on: Option<String>,
        invalid: bool,
        uploads: Mutex<Vec<(PathBuf, String, String)>>,
    }

    #[async_trait]
    impl UploadService for FakeStore {
        async fn validate_configuration(&self) -> ValidationReport {
            if self.invalid {
                ValidationReport::invalid(vec!["missing container".to_string()])
            } else {
                ValidationReport::ok()
            }
        }

        async fn test_connection(&self) -> ConnectionReport {
            ConnectionReport {
                success: true,
                message: "ok".to_string(),
                details: None,
            }
        }

        async fn check_if_duplicate(&self, remote_name: &str, _size: u64) -> bridge_traits::error::Result<bool> {
            Ok(self.existing.iter().any(|e| e == remote_name))
        }

        async fn generate_unique_remote_name(&self, name: &str, _size: u64) -> bridge_traits::error::Result<String> {
            Ok(name.to_string())
        }

        async fn upload_file(
            &self,
            path: &Path,
            remote_name: &str,
            mime_type: &str,
            _options: &UploadOptions,
        ) -> bridge_traits::error::Result<UploadReceipt> {
            if self.fail_on.as_deref() == Some(remote_name) {
                return Err(BridgeError::OperationFailed("503".to_string()));
            }
            self.uploads.lock().unwrap().push((
                path.to_path_buf(),
                remote_name.to_string(),
                mime_type.to_string(),
            ));
            Ok(UploadReceipt::uploaded(format!("https://store/{remote_name}")))
        }
    }

    fn item(name: &str) -> QueuedUpload {
        QueuedUpload {
            source_path: PathBuf::from("/landed").join(name),
            file: FileRecord {
                name: name.to_string(),
                path: PathBuf::from("/src").join(name),
                relative_path: PathBuf::from(name),
                size: 3,
                media_type: MediaType::Image,
                extension: "jpg".to_string(),
                created_at: None,
                modified_at: None,
            },
            folder_organization: FolderOrganizationConfig::custom("Trip"),
        }
    }

    fn batch(items: Vec<QueuedUpload>) -> UploadBatch {
        UploadBatch {
            job_id: None,
            service: "fake".to_string(),
            items,
            skip_duplicates: true,
            metadata: HashMap::new(),
        }
    }

    async fn handoff(store: FakeStore) -> (UploadHandoff, Arc<FakeStore>) {
        let store = Arc::new(store);
        let handoff = UploadHandoff::new(
            EventBus::new(32),
            Arc::new(SystemClock),
            Duration::from_secs(5),
        );
        handoff.register_service("fake", store.clone()).await;
        (handoff, store)
    }

    #[tokio::test]
    async fn test_uploads_with_folder_prefix_and_mime() {
        let (handoff, store) = handoff(FakeStore::default()).await;
        let summary = handoff
            .submit(batch(vec![item("a.jpg"), item("b.jpg")]), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.uploaded, 2);
        assert_eq!(summary.failed, 0);
        let uploads = store.uploads.lock().unwrap();
        assert_eq!(uploads[0].0, PathBuf::from("/landed/a.jpg"));
        assert_eq!(uploads[0].1, "Trip/a.jpg");
        assert_eq!(uploads[0].2, "image/jpeg");
        assert!(!handoff.is_busy());
    }

    #[tokio::test]
    async fn test_remote_duplicates_are_skipped() {
        let store = FakeStore {
            existing: vec!["Trip/a.jpg".to_string()],
            ..Default::default()
        };
        let (handoff, store) = handoff(store).await;
        let summary = handoff
            .submit(batch(vec![item("a.jpg"), item("b.jpg")]), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.uploaded, 1);
        assert_eq!(store.uploads.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failures_are_per_file() {
        let store = FakeStore {
            fail_on: Some("Trip/a.jpg".to_string()),
            ..Default::default()
        };
        let (handoff, _) = handoff(store).await;
        let summary = handoff
            .submit(batch(vec![item("a.jpg"), item("b.jpg")]), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.uploaded, 1);
        assert_eq!(summary.errors.len(), 1);
        assert!(!summary.files[0].success);
    }

    #[tokio::test]
    async fn test_unknown_service_and_invalid_config() {
        let (handoff, _) = handoff(FakeStore::default()).await;
        let mut unknown = batch(vec![item("a.jpg")]);
        unknown.service = "missing".to_string();
        assert!(matches!(
            handoff.submit(unknown, CancellationToken::new()).await,
            Err(ImportError::ServiceNotRegistered(_))
        ));
        assert!(!handoff.is_busy());

        let (handoff, _) = self::handoff(FakeStore {
            invalid: true,
            ..Default::default()
        })
        .await;
        assert!(matches!(
            handoff.submit(batch(vec![item("a.jpg")]), CancellationToken::new()).await,
            Err(ImportError::InvalidConfiguration(_))
        ));
    }

    #[tokio::test]
    async fn test_busy_while_in_flight() {
        let (handoff, _) = handoff(FakeStore::default()).await;
        let _held = InFlightGuard::acquire(&handoff.in_flight).unwrap();
        assert!(handoff.is_busy());
        assert!(matches!(
            handoff.submit(batch(vec![item("a.jpg")]), CancellationToken::new()).await,
            Err(ImportError::UploadBusy)
        ));
    }

    #[tokio::test]
    async fn test_cancelled_before_start_uploads_nothing() {
        let (handoff, store) = handoff(FakeStore::default()).await;
        let token = CancellationToken::new();
        token.cancel();
        let summary = handoff
            .submit(batch(vec![item("a.jpg")]), token)
            .await
            .unwrap();
        assert!(summary.cancelled);
        assert!(store.uploads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_connection_passthrough() {
        let (handoff, _) = handoff(FakeStore::default()).await;
        assert!(handoff.test_connection("fake").await.unwrap().success);
        assert!(handoff.validate("fake").await.unwrap().valid);
        assert!(handoff.test_connection("nope").await.is_err());
    }
}
