//! Job-scoped event emission.
//!
//! A `JobReporter` is moved into the job task and handed back to the runner
//! when the job ends. The terminal methods consume it, so nothing can be
//! emitted for a job after its terminal event.

use core_runtime::events::{CoreEvent, EventBus, ImportEvent, ImportSummary};
use core_runtime::settings::ImportSettings;
use tracing::{info, trace};

use crate::job::{ImportJob, ImportJobId};

#[derive(Debug)]
pub struct JobReporter {
    job_id: ImportJobId,
    bus: EventBus,
}

impl JobReporter {
    pub fn new(job_id: ImportJobId, bus: EventBus) -> Self {
        Self { job_id, bus }
    }

    pub fn job_id(&self) -> ImportJobId {
        self.job_id
    }

    pub fn started(&self, source_path: &str) {
        self.emit(ImportEvent::Started {
            job_id: self.job_id.to_string(),
            source_path: source_path.to_string(),
        });
    }

    pub fn progress(&self, job: &ImportJob) {
        self.emit(ImportEvent::Progress(job.progress()));
    }

    pub fn log(&self, message: impl Into<String>) {
        let message = message.into();
        info!(job_id = %self.job_id, "{}", message);
        self.emit(ImportEvent::Log {
            job_id: self.job_id.to_string(),
            message,
        });
    }

    pub fn upload_ready(&self, file_paths: Vec<String>, settings: &ImportSettings) {
        let count = file_paths.len();
        self.emit(ImportEvent::UploadReady {
            job_id: self.job_id.to_string(),
            file_paths,
            count,
            import_settings: settings.clone(),
        });
    }

    pub fn completed(self, result: ImportSummary) {
        self.emit(ImportEvent::Completed { result });
    }

    pub fn failed(self, message: String, result: ImportSummary) {
        self.emit(ImportEvent::Error { message, result });
    }

    pub fn cancelled(self, result: ImportSummary) {
        self.emit(ImportEvent::Cancelled { result });
    }

    fn emit(&self, event: ImportEvent) {
        // No subscribers is not an error
        if self.bus.emit(CoreEvent::Import(event)).is_err() {
            trace!(job_id = %self.job_id, "Event dropped, no subscribers");
        }
    }
}
