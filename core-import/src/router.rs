//! # Destination Router
//!
//! Drives each file through every ready destination in priority order and
//! folds the per-destination results into a single per-file status.

use core_runtime::settings::{DestinationKind, FolderOrganizationConfig, ImportSettings};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::destination::{Destination, DestinationContext, DestinationResult, QueuedUpload};
use crate::media::FileRecord;

/// One destination's result for one file
#[derive(Debug, Clone)]
pub struct RoutedResult {
    pub kind: DestinationKind,
    pub display_name: String,
    pub result: DestinationResult,
}

/// Per-file status as counted by the job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Successful { skipped: bool },
    Failed,
}

/// Everything that happened to one file
#[derive(Debug, Clone, Default)]
pub struct FileOutcome {
    pub results: Vec<RoutedResult>,
    /// Cancellation was observed around the remote queueing step
    pub interrupted: bool,
}

impl FileOutcome {
    /// False when cancellation stopped the file before any destination ran
    pub fn attempted(&self) -> bool {
        !(self.interrupted && self.results.is_empty())
    }

    /// Local/Backup decide the status; the remote hand-off only decides it
    /// when no disk destination was involved.
    pub fn status(&self) -> FileStatus {
        let disk: Vec<&DestinationResult> = self
            .results
            .iter()
            .filter(|r| r.kind != DestinationKind::Remote)
            .map(|r| &r.result)
            .collect();

        if disk.is_empty() {
            let any_remote = self.results.iter().any(|r| r.result.success);
            return if any_remote {
                FileStatus::Successful { skipped: false }
            } else {
                FileStatus::Failed
            };
        }

        let successes: Vec<&&DestinationResult> = disk.iter().filter(|r| r.success).collect();
        if successes.is_empty() {
            FileStatus::Failed
        } else {
            FileStatus::Successful {
                skipped: successes.iter().all(|r| r.is_skip()),
            }
        }
    }

    /// `"<file> -> <destination>: <error>"` for each failed destination
    pub fn errors(&self, file: &FileRecord) -> Vec<String> {
        self.results
            .iter()
            .filter(|r| !r.result.success)
            .map(|r| {
                format!(
                    "{} -> {}: {}",
                    file.name,
                    r.display_name,
                    r.result.error.as_deref().unwrap_or("unknown error")
                )
            })
            .collect()
    }
}

/// Files queued for one upload service
#[derive(Debug, Clone)]
pub struct UploadQueue {
    pub service: String,
    pub options: std::collections::HashMap<String, String>,
    pub items: Vec<QueuedUpload>,
}

pub struct DestinationRouter {
    destinations: Vec<Destination>,
}

impl DestinationRouter {
    /// Destinations are kept sorted by priority; ties keep config order
    pub fn new(mut destinations: Vec<Destination>) -> Self {
        destinations.sort_by_key(|d| d.priority());
        Self { destinations }
    }

    pub fn from_settings(settings: &ImportSettings, ctx: &DestinationContext) -> Self {
        Self::new(
            settings
                .enabled_destinations()
                .map(|config| Destination::from_config(config, ctx))
                .collect(),
        )
    }

    /// Initialize every ready destination and drop the ones that fail or
    /// are not ready. Returns the display names that were dropped.
    pub async fn initialize_all(&mut self) -> Vec<String> {
        let mut failed = Vec::new();
        let mut kept = Vec::with_capacity(self.destinations.len());

        for mut destination in self.destinations.drain(..) {
            if destination.is_ready() && destination.initialize().await {
                kept.push(destination);
            } else {
                warn!(destination = %destination.display_name(), "Destination unavailable");
                failed.push(destination.display_name());
            }
        }

        self.destinations = kept;
        failed
    }

    pub fn ready_count(&self) -> usize {
        self.destinations.iter().filter(|d| d.is_ready()).count()
    }

    pub fn display_names(&self) -> Vec<String> {
        self.destinations.iter().map(|d| d.display_name()).collect()
    }

    /// Route `file` through every ready destination.
    ///
    /// `on_destination` is called with each destination's display name
    /// before it runs. Queueing for the remote hand-off is skipped when the
    /// token is already cancelled.
    pub async fn route<F>(
        &mut self,
        file: &FileRecord,
        folder_org: &FolderOrganizationConfig,
        cancel: &CancellationToken,
        mut on_destination: F,
    ) -> FileOutcome
    where
        F: FnMut(&str),
    {
        let mut outcome = FileOutcome::default();
        let mut local_copy: Option<PathBuf> = None;

        for destination in self.destinations.iter_mut().filter(|d| d.is_ready()) {
            let name = destination.display_name();
            let kind = destination.kind();
            on_destination(&name);

            let source = match kind {
                DestinationKind::Remote => {
                    if cancel.is_cancelled() {
                        outcome.interrupted = true;
                        continue;
                    }
                    local_copy.clone().unwrap_or_else(|| file.path.clone())
                }
                _ => file.path.clone(),
            };

            let result = destination.process_file(file, &source, folder_org).await;

            match kind {
                DestinationKind::Local => {
                    if local_copy.is_none() {
                        local_copy = result.final_path.clone();
                    }
                }
                DestinationKind::Remote => {
                    if cancel.is_cancelled() {
                        outcome.interrupted = true;
                    }
                }
                DestinationKind::Backup => {}
            }

            debug!(
                file = %file.name,
                destination = %name,
                success = result.success,
                "Routed"
            );
            outcome.results.push(RoutedResult {
                kind,
                display_name: name,
                result,
            });
        }

        outcome
    }

    /// Non-empty remote queues, drained
    pub fn take_upload_queues(&mut self) -> Vec<UploadQueue> {
        self.destinations
            .iter_mut()
            .filter_map(|d| d.as_remote_mut())
            .filter(|r| r.queue_len() > 0)
            .filter_map(|remote| {
                let service = remote.service()?.to_string();
                let options = remote.options().clone();
                Some(UploadQueue {
                    service,
                    options,
                    items: remote.drain(),
                })
            })
            .collect()
    }
}
