//! Core service façade and bootstrap helpers.
//!
//! This crate wires a [`CoreConfig`] into the running import core: the
//! event bus, the upload hand-off, the download worker, the pipeline runner
//! and the [`ImportController`] that hosts talk to. Desktop apps typically
//! enable the `desktop-shims` feature so the file system and downloader
//! default to the `bridge-desktop` implementations.

pub mod controller;
pub mod error;

pub use controller::{CommandReply, ControllerCommand, ImportController};
pub use core_runtime::CoreConfig;
pub use error::{CoreError, Result};

use core_import::{DownloadWorker, PipelineRunner, RunnerDeps, RunnerHandle, UploadHandoff};
use core_runtime::events::{EventBus, EventStream};
use std::sync::Arc;
use tracing::info;

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    controller: ImportController,
    runner: RunnerHandle,
    uploads: Arc<UploadHandoff>,
    events: EventBus,
}

impl CoreService {
    /// Wire every worker from `config`. Must be called inside a tokio
    /// runtime; the pipeline runner is spawned onto it.
    pub fn bootstrap(config: CoreConfig) -> Result<Self> {
        config.validate()?;

        let events = EventBus::new(config.event_buffer_size);
        let uploads = Arc::new(UploadHandoff::from_config(&config, events.clone()));
        let downloads = Arc::new(DownloadWorker::from_config(&config, events.clone()));
        let runner = PipelineRunner::spawn(RunnerDeps::from_config(
            &config,
            events.clone(),
            Arc::clone(&uploads),
        ));
        let controller = ImportController::new(
            runner.clone(),
            Arc::clone(&uploads),
            downloads,
            events.clone(),
        );

        info!(
            upload_services = config.upload_services.len(),
            downloader = config.downloader.is_some(),
            "Import core started"
        );

        Ok(Self {
            controller,
            runner,
            uploads,
            events,
        })
    }

    pub fn controller(&self) -> &ImportController {
        &self.controller
    }

    pub fn runner(&self) -> RunnerHandle {
        self.runner.clone()
    }

    /// Services can be registered after bootstrap
    pub fn uploads(&self) -> Arc<UploadHandoff> {
        Arc::clone(&self.uploads)
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.events.subscribe())
    }
}

/// Convenience bootstrapper for desktop hosts.
///
/// ```no_run
/// # #[cfg(feature = "desktop-shims")]
/// # async fn example() -> core_service::Result<()> {
/// let core = core_service::bootstrap_desktop()?;
/// let reply = core
///     .controller()
///     .handle_json(r#"{"type":"status"}"#)
///     .await;
/// println!("{reply}");
/// # Ok(())
/// # }
/// ```
#[cfg(feature = "desktop-shims")]
pub fn bootstrap_desktop() -> Result<CoreService> {
    let config = CoreConfig::builder()
        .build()
        .map_err(|err| CoreError::InitializationFailed(err.to_string()))?;
    CoreService::bootstrap(config)
}
