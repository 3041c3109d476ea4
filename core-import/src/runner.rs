//! # Pipeline Runner
//!
//! Owns the import job lifecycle as a single tokio actor.
//!
//! ## Overview
//!
//! `PipelineRunner::spawn` starts the actor and returns a cloneable
//! [`RunnerHandle`]. Commands arrive over an `mpsc` channel; one job runs at
//! a time and a second start is rejected with `AlreadyRunning`.
//!
//! The job itself runs on its own task and owns its [`ImportJob`] and
//! [`JobReporter`]. When it ends, both are handed back to the actor, which
//! clears the in-progress slot and then emits the single terminal event.
//!
//! ## Workflow
//!
//! 1. `started`, then `Pending → Scanning`
//! 2. Scan the source tree; no files completes the job
//! 3. `Scanning → Copying`, totals fixed
//! 4. Route every file through the ready destinations
//! 5. `Copying → Uploading` for each non-empty remote queue
//! 6. `Completed`, `Failed` or `Cancelled`
//!
//! Cancellation is checked before each directory listing, before and after
//! each file, and around every upload batch.

use bridge_traits::{Clock, FileSystemAccess};
use core_runtime::config::CoreConfig;
use core_runtime::events::EventBus;
use core_runtime::logging::redact_if_sensitive;
use core_runtime::settings::ImportSettings;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::destination::DestinationContext;
use crate::error::{ImportError, Result};
use crate::job::{ImportJob, ImportJobId};
use crate::media::FileRecord;
use crate::reporter::JobReporter;
use crate::router::{DestinationRouter, FileOutcome};
use crate::scanner::{DirectoryScanner, ScanOptions};
use crate::upload::{UploadBatch, UploadHandoff};

const COMMAND_BUFFER: usize = 32;

// ============================================================================
// Dependencies
// ============================================================================

/// Collaborators shared by every job the runner executes
#[derive(Clone)]
pub struct RunnerDeps {
    pub file_system: Arc<dyn FileSystemAccess>,
    pub clock: Arc<dyn Clock>,
    pub events: EventBus,
    pub uploads: Arc<UploadHandoff>,
    pub unique_name_limit: u32,
    pub max_scan_depth: usize,
}

impl RunnerDeps {
    pub fn from_config(config: &CoreConfig, events: EventBus, uploads: Arc<UploadHandoff>) -> Self {
        Self {
            file_system: Arc::clone(&config.file_system),
            clock: Arc::clone(&config.clock),
            events,
            uploads,
            unique_name_limit: config.unique_name_limit,
            max_scan_depth: config.max_scan_depth,
        }
    }
}

// ============================================================================
// Handle
// ============================================================================

enum RunnerCommand {
    Start {
        settings: ImportSettings,
        reply: oneshot::Sender<Result<ImportJobId>>,
    },
    Cancel {
        reply: oneshot::Sender<Result<ImportJobId>>,
    },
    Status {
        reply: oneshot::Sender<Option<ImportJobId>>,
    },
}

/// Cloneable front door to a running [`PipelineRunner`]
#[derive(Clone)]
pub struct RunnerHandle {
    commands: mpsc::Sender<RunnerCommand>,
}

impl RunnerHandle {
    /// Validate `settings` and start a job.
    ///
    /// # Errors
    ///
    /// - `Runtime(InvalidSettings)` for unusable settings
    /// - `AlreadyRunning` while another job is active
    /// - `RunnerStopped` if the actor has shut down
    pub async fn start_import(&self, settings: ImportSettings) -> Result<ImportJobId> {
        settings.validate()?;
        let (reply, rx) = oneshot::channel();
        self.send(RunnerCommand::Start { settings, reply }).await?;
        rx.await.map_err(|_| ImportError::RunnerStopped)?
    }

    /// Request cancellation of the active job; returns its id
    pub async fn cancel_import(&self) -> Result<ImportJobId> {
        let (reply, rx) = oneshot::channel();
        self.send(RunnerCommand::Cancel { reply }).await?;
        rx.await.map_err(|_| ImportError::RunnerStopped)?
    }

    /// The active job, if any
    pub async fn status(&self) -> Result<Option<ImportJobId>> {
        let (reply, rx) = oneshot::channel();
        self.send(RunnerCommand::Status { reply }).await?;
        rx.await.map_err(|_| ImportError::RunnerStopped)
    }

    async fn send(&self, command: RunnerCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ImportError::RunnerStopped)
    }
}

// ============================================================================
// Runner
// ============================================================================

struct ActiveJob {
    id: ImportJobId,
    cancel: CancellationToken,
}

enum JobEnd {
    Completed,
    Cancelled,
    Failed(String),
}

struct JobOutcome {
    job: ImportJob,
    reporter: JobReporter,
    end: JobEnd,
}

struct JobContext {
    settings: ImportSettings,
    deps: RunnerDeps,
    cancel: CancellationToken,
}

impl JobContext {
    fn destination_context(&self) -> DestinationContext {
        DestinationContext {
            fs: Arc::clone(&self.deps.file_system),
            clock: Arc::clone(&self.deps.clock),
            skip_duplicates: self.settings.skip_duplicates,
            unique_name_limit: self.deps.unique_name_limit,
        }
    }
}

pub struct PipelineRunner {
    deps: RunnerDeps,
    active: Option<ActiveJob>,
}

impl PipelineRunner {
    /// Start the actor on the current tokio runtime
    pub fn spawn(deps: RunnerDeps) -> RunnerHandle {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let runner = Self { deps, active: None };
        tokio::spawn(runner.run(rx));
        RunnerHandle { commands: tx }
    }

    async fn run(mut self, mut commands: mpsc::Receiver<RunnerCommand>) {
        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<JobOutcome>();

        loop {
            tokio::select! {
                biased;
                Some(outcome) = done_rx.recv() => self.finish(outcome),
                command = commands.recv() => match command {
                    Some(command) => self.handle(command, &done_tx),
                    None => break,
                },
            }
        }

        if let Some(cancel) = self.active.as_ref().map(|active| active.cancel.clone()) {
            debug!("Runner shutting down, cancelling active job");
            cancel.cancel();
            if let Some(outcome) = done_rx.recv().await {
                self.finish(outcome);
            }
        }
        debug!("Pipeline runner stopped");
    }

    fn handle(&mut self, command: RunnerCommand, done_tx: &mpsc::UnboundedSender<JobOutcome>) {
        match command {
            RunnerCommand::Start { settings, reply } => {
                let result = self.start(settings, done_tx.clone());
                reply.send(result).ok();
            }
            RunnerCommand::Cancel { reply } => {
                let result = match &self.active {
                    Some(active) => {
                        info!(job_id = %active.id, "Cancellation requested");
                        active.cancel.cancel();
                        Ok(active.id)
                    }
                    None => Err(ImportError::NoActiveJob),
                };
                reply.send(result).ok();
            }
            RunnerCommand::Status { reply } => {
                reply.send(self.active.as_ref().map(|a| a.id)).ok();
            }
        }
    }

    fn start(
        &mut self,
        settings: ImportSettings,
        done_tx: mpsc::UnboundedSender<JobOutcome>,
    ) -> Result<ImportJobId> {
        if let Some(active) = &self.active {
            return Err(ImportError::AlreadyRunning {
                job_id: active.id.to_string(),
            });
        }

        let job = ImportJob::new();
        let id = job.id;
        let cancel = CancellationToken::new();
        let reporter = JobReporter::new(id, self.deps.events.clone());
        let ctx = JobContext {
            settings,
            deps: self.deps.clone(),
            cancel: cancel.clone(),
        };
        let events = self.deps.events.clone();

        tokio::spawn(async move {
            let outcome = match tokio::spawn(execute(job, reporter, ctx)).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(job_id = %id, error = %e, "Import task aborted");
                    JobOutcome {
                        job: ImportJob::with_id(id),
                        reporter: JobReporter::new(id, events),
                        end: JobEnd::Failed(format!("Import task aborted: {}", e)),
                    }
                }
            };
            done_tx.send(outcome).ok();
        });

        info!(job_id = %id, "Import job accepted");
        self.active = Some(ActiveJob { id, cancel });
        Ok(id)
    }

    fn finish(&mut self, outcome: JobOutcome) {
        self.active = None;

        let JobOutcome {
            mut job,
            reporter,
            end,
        } = outcome;

        let transition = match &end {
            JobEnd::Completed => job.complete(),
            JobEnd::Cancelled => job.cancel(),
            JobEnd::Failed(message) => job.fail(message.clone()),
        };
        if let Err(e) = transition {
            warn!(job_id = %job.id, error = %e, "Unexpected terminal transition");
        }

        info!(
            job_id = %job.id,
            phase = %job.phase,
            processed = job.processed_files,
            successful = job.successful_files,
            failed = job.failed_files,
            skipped = job.skipped_files,
            "Import job finished"
        );

        let summary = job.summary();
        match end {
            JobEnd::Completed => reporter.completed(summary),
            JobEnd::Cancelled => reporter.cancelled(summary),
            JobEnd::Failed(message) => reporter.failed(message, summary),
        }
    }
}

// ============================================================================
// Job execution
// ============================================================================

async fn execute(mut job: ImportJob, reporter: JobReporter, ctx: JobContext) -> JobOutcome {
    let end = match drive(&mut job, &reporter, &ctx).await {
        Ok(()) => JobEnd::Completed,
        Err(ImportError::Cancelled) => JobEnd::Cancelled,
        Err(e) => {
            error!(job_id = %job.id, error = %e, "Import job failed");
            JobEnd::Failed(e.to_string())
        }
    };
    JobOutcome { job, reporter, end }
}

fn checkpoint(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(ImportError::Cancelled)
    } else {
        Ok(())
    }
}

/// Fold one routed file into the job counters. A file that cancellation
/// stopped before any destination ran is not counted.
fn record_outcome(job: &mut ImportJob, file: &FileRecord, outcome: &FileOutcome) -> Result<()> {
    if !outcome.attempted() {
        return Err(ImportError::Cancelled);
    }
    job.record_file(file.size, outcome.status(), outcome.errors(file))
}

#[instrument(skip_all, fields(job_id = %job.id))]
async fn drive(job: &mut ImportJob, reporter: &JobReporter, ctx: &JobContext) -> Result<()> {
    let settings = &ctx.settings;
    let source = settings.source_path.display().to_string();

    reporter.started(&source);
    job.begin_scan()?;
    reporter.progress(job);

    // Scanning
    checkpoint(&ctx.cancel)?;
    reporter.log(format!("Scanning {}", source));
    let scanner = DirectoryScanner::new(Arc::clone(&ctx.deps.file_system));
    let options = ScanOptions::from_settings(settings, ctx.deps.max_scan_depth);
    let files = scanner
        .scan(&settings.source_path, &options, &ctx.cancel)
        .await?;

    if files.is_empty() {
        reporter.log("No files found to import");
        return Ok(());
    }

    let total_bytes: u64 = files.iter().map(|f| f.size).sum();
    job.begin_copy(files.len() as u64, total_bytes)?;
    reporter.log(format!("Found {} files ({} bytes)", files.len(), total_bytes));
    reporter.progress(job);

    // Copying
    let mut router = DestinationRouter::from_settings(settings, &ctx.destination_context());
    for name in router.initialize_all().await {
        reporter.log(format!("Destination {} is unavailable and will be skipped", name));
    }
    if router.ready_count() == 0 {
        return Err(ImportError::InvalidConfiguration(
            "No destination is ready".to_string(),
        ));
    }
    reporter.log(format!("Importing to {}", router.display_names().join(", ")));

    for file in &files {
        checkpoint(&ctx.cancel)?;
        job.set_current(Some(&file.name), None);

        let outcome = router
            .route(
                file,
                &settings.folder_organization,
                &ctx.cancel,
                |destination| {
                    job.set_current(Some(&file.name), Some(destination));
                    reporter.progress(job);
                },
            )
            .await;

        record_outcome(job, file, &outcome)?;
        reporter.progress(job);
        checkpoint(&ctx.cancel)?;
    }
    job.set_current(None, None);

    // Uploading
    for queue in router.take_upload_queues() {
        checkpoint(&ctx.cancel)?;
        job.begin_upload()?;
        reporter.progress(job);

        for (key, value) in &queue.options {
            debug!(service = %queue.service, option = %key, value = %redact_if_sensitive(key, value), "Remote option");
        }

        let count = queue.items.len();
        let paths = queue
            .items
            .iter()
            .map(|item| item.source_path.display().to_string())
            .collect();
        reporter.upload_ready(paths, settings);

        let service = queue.service.clone();
        let batch = UploadBatch {
            job_id: Some(job.id.to_string()),
            service: queue.service,
            items: queue.items,
            skip_duplicates: settings.skip_duplicates,
            metadata: settings.upload_metadata.clone(),
        };

        match ctx.deps.uploads.submit(batch, ctx.cancel.child_token()).await {
            Ok(summary) => {
                reporter.log(format!(
                    "Uploaded {} of {} files to {} ({} skipped, {} failed)",
                    summary.uploaded, count, service, summary.skipped, summary.failed
                ));
                job.record_uploads(&summary)?;
            }
            Err(e) => {
                let message = format!("Upload to {} failed: {}", service, e);
                reporter.log(message.clone());
                job.record_upload_error(count as u64, message)?;
            }
        }
        reporter.progress(job);
        checkpoint(&ctx.cancel)?;
    }

    Ok(())
}
