//! # Import Controller
//!
//! The command/event boundary between a host and the import core. Commands
//! and replies are serde-tagged so a host can speak plain JSON over whatever
//! transport it already has:
//!
//! ```json
//! {"type": "start-import", "settings": {"sourcePath": "/card", "destinations": [{"type": "local", "path": "/photos"}]}}
//! {"type": "import-started", "jobId": "6f1c..."}
//! ```
//!
//! Progress and terminal outcomes are not replies; they arrive on the event
//! stream returned by [`ImportController::subscribe`].

use bridge_traits::{ConnectionReport, ValidationReport};
use core_import::{DownloadOutcome, DownloadWorker, RunnerHandle, UploadHandoff};
use core_runtime::events::{EventBus, EventStream};
use core_runtime::settings::ImportSettings;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{CoreError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ControllerCommand {
    StartImport {
        settings: ImportSettings,
    },
    CancelImport,
    Status,
    TestConnection {
        service: String,
    },
    Download {
        url: String,
        #[serde(default)]
        destination: Option<PathBuf>,
    },
}

impl ControllerCommand {
    fn name(&self) -> &'static str {
        match self {
            ControllerCommand::StartImport { .. } => "start-import",
            ControllerCommand::CancelImport => "cancel-import",
            ControllerCommand::Status => "status",
            ControllerCommand::TestConnection { .. } => "test-connection",
            ControllerCommand::Download { .. } => "download",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum CommandReply {
    ImportStarted {
        job_id: String,
    },
    /// Cancellation requested; the `cancelled` event follows on the stream
    ImportCancelling {
        job_id: String,
    },
    Status {
        active_job_id: Option<String>,
        upload_busy: bool,
        download_busy: bool,
        upload_services: Vec<String>,
    },
    Connection {
        service: String,
        validation: ValidationReport,
        report: ConnectionReport,
    },
    Downloaded {
        outcome: DownloadOutcome,
    },
    Error {
        message: String,
    },
}

/// Dispatches commands to the runner and the transfer workers
#[derive(Clone)]
pub struct ImportController {
    runner: RunnerHandle,
    uploads: Arc<UploadHandoff>,
    downloads: Arc<DownloadWorker>,
    events: EventBus,
}

impl ImportController {
    pub fn new(
        runner: RunnerHandle,
        uploads: Arc<UploadHandoff>,
        downloads: Arc<DownloadWorker>,
        events: EventBus,
    ) -> Self {
        Self {
            runner,
            uploads,
            downloads,
            events,
        }
    }

    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.events.subscribe())
    }

    pub async fn handle(&self, command: ControllerCommand) -> Result<CommandReply> {
        debug!(command = command.name(), "Handling controller command");

        match command {
            ControllerCommand::StartImport { settings } => {
                let job_id = self.runner.start_import(settings).await?;
                Ok(CommandReply::ImportStarted {
                    job_id: job_id.to_string(),
                })
            }
            ControllerCommand::CancelImport => {
                let job_id = self.runner.cancel_import().await?;
                Ok(CommandReply::ImportCancelling {
                    job_id: job_id.to_string(),
                })
            }
            ControllerCommand::Status => Ok(CommandReply::Status {
                active_job_id: self.runner.status().await?.map(|id| id.to_string()),
                upload_busy: self.uploads.is_busy(),
                download_busy: self.downloads.is_busy(),
                upload_services: self.uploads.service_names().await,
            }),
            ControllerCommand::TestConnection { service } => {
                let validation = self.uploads.validate(&service).await?;
                let report = self.uploads.test_connection(&service).await?;
                Ok(CommandReply::Connection {
                    service,
                    validation,
                    report,
                })
            }
            ControllerCommand::Download { url, destination } => {
                let outcome = self.downloads.download(&url, destination).await?;
                Ok(CommandReply::Downloaded { outcome })
            }
        }
    }

    /// JSON command in, JSON reply out. Every failure becomes an `error`
    /// reply.
    pub async fn handle_json(&self, raw: &str) -> String {
        let reply = match serde_json::from_str::<ControllerCommand>(raw) {
            Ok(command) => self.handle(command).await,
            Err(e) => Err(CoreError::InvalidCommand(e.to_string())),
        }
        .unwrap_or_else(|e| {
            warn!(error = %e, "Controller command failed");
            CommandReply::Error {
                message: e.to_string(),
            }
        });

        serde_json::to_string(&reply).unwrap_or_else(|e| {
            serde_json::json!({ "type": "error", "message": e.to_string() }).to_string()
        })
    }
}
