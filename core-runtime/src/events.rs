//! # Event Bus System
//!
//! Import jobs and transfer workers report everything they do as typed
//! events on a `tokio::sync::broadcast` channel. The controller forwards
//! them to the host; tests subscribe directly.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────┐   emit    ┌───────────┐
//! │ PipelineRunner ├──────────>│           │   subscribe   ┌────────────┐
//! └────────────────┘           │ EventBus  ├──────────────>│ Controller │
//! ┌────────────────┐   emit    │ (broadcast│               └────────────┘
//! │ Upload/Download├──────────>│  channel) │   subscribe   ┌────────────┐
//! │    workers     │           │           ├──────────────>│   Tests    │
//! └────────────────┘           └───────────┘               └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, ImportEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(100);
//! let mut sub = bus.subscribe();
//!
//! bus.emit(CoreEvent::Import(ImportEvent::Log {
//!     job_id: "job-1".to_string(),
//!     message: "Scanning /media/card".to_string(),
//! }))
//! .ok();
//!
//! let event = sub.recv().await.unwrap();
//! assert_eq!(event.description(), "Import log message");
//! # }
//! ```
//!
//! ## Ordering
//!
//! For a single job the runner emits `started`, then any number of
//! `progress`/`log`/`upload-ready` events, then exactly one of `completed`,
//! `error` or `cancelled`. Counters inside `progress` never decrease and
//! nothing for that job follows the terminal event.
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber fell behind and missed `n`
//!   events. Non-fatal.
//! - **`RecvError::Closed`**: every sender was dropped; treat as shutdown.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

use crate::settings::ImportSettings;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

// ============================================================================
// Core Event Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Import job lifecycle
    Import(ImportEvent),
    /// Upload and download workers
    Transfer(TransferEvent),
}

impl CoreEvent {
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Import(e) => e.description(),
            CoreEvent::Transfer(e) => e.description(),
        }
    }

    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Import(ImportEvent::Error { .. }) => EventSeverity::Error,
            CoreEvent::Transfer(TransferEvent::DownloadFailed { .. }) => EventSeverity::Error,
            CoreEvent::Import(ImportEvent::Cancelled { .. }) => EventSeverity::Warning,
            CoreEvent::Transfer(TransferEvent::UploadFile { success: false, .. }) => {
                EventSeverity::Warning
            }
            CoreEvent::Import(ImportEvent::Completed { .. })
            | CoreEvent::Import(ImportEvent::Started { .. })
            | CoreEvent::Import(ImportEvent::UploadReady { .. })
            | CoreEvent::Transfer(TransferEvent::UploadFinished { .. })
            | CoreEvent::Transfer(TransferEvent::DownloadFinished { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }

    /// Job id for import events
    pub fn job_id(&self) -> Option<&str> {
        match self {
            CoreEvent::Import(e) => Some(e.job_id()),
            CoreEvent::Transfer(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Import Events
// ============================================================================

/// Snapshot of a running job's counters
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImportProgress {
    pub job_id: String,
    pub phase: String,
    pub total_files: u64,
    pub processed_files: u64,
    pub successful_files: u64,
    pub failed_files: u64,
    pub skipped_files: u64,
    pub current_file: Option<String>,
    pub current_destination: Option<String>,
    pub bytes_processed: u64,
    pub total_bytes: u64,
    pub percent: u8,
}

/// Best-known counts attached to every terminal event
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub job_id: String,
    pub phase: String,
    pub total_files: u64,
    pub processed_files: u64,
    pub successful_files: u64,
    pub failed_files: u64,
    pub skipped_files: u64,
    pub bytes_processed: u64,
    pub total_bytes: u64,
    pub uploaded_files: u64,
    pub upload_failed_files: u64,
    pub upload_skipped_files: u64,
    pub errors: Vec<String>,
    pub duration_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ImportEvent {
    /// Job accepted; precedes the first progress event
    Started { job_id: String, source_path: String },
    Progress(ImportProgress),
    Log { job_id: String, message: String },
    /// Files queued for the remote hand-off, with the job's settings
    UploadReady {
        job_id: String,
        file_paths: Vec<String>,
        count: usize,
        import_settings: ImportSettings,
    },
    Completed { result: ImportSummary },
    Error { message: String, result: ImportSummary },
    Cancelled { result: ImportSummary },
}

impl ImportEvent {
    fn description(&self) -> &str {
        match self {
            ImportEvent::Started { .. } => "Import started",
            ImportEvent::Progress(_) => "Import in progress",
            ImportEvent::Log { .. } => "Import log message",
            ImportEvent::UploadReady { .. } => "Files ready for upload",
            ImportEvent::Completed { .. } => "Import completed",
            ImportEvent::Error { .. } => "Import failed",
            ImportEvent::Cancelled { .. } => "Import cancelled",
        }
    }

    pub fn job_id(&self) -> &str {
        match self {
            ImportEvent::Started { job_id, .. }
            | ImportEvent::Log { job_id, .. }
            | ImportEvent::UploadReady { job_id, .. } => job_id,
            ImportEvent::Progress(progress) => &progress.job_id,
            ImportEvent::Completed { result }
            | ImportEvent::Error { result, .. }
            | ImportEvent::Cancelled { result } => &result.job_id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ImportEvent::Completed { .. } | ImportEvent::Error { .. } | ImportEvent::Cancelled { .. }
        )
    }
}

// ============================================================================
// Transfer Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum TransferEvent {
    UploadStarted {
        job_id: Option<String>,
        service: String,
        count: usize,
    },
    UploadFile {
        service: String,
        remote_name: String,
        success: bool,
        skipped: bool,
        message: String,
    },
    UploadFinished {
        service: String,
        uploaded: u64,
        skipped: u64,
        failed: u64,
    },
    DownloadStarted {
        download_id: String,
        url: String,
    },
    DownloadFinished {
        download_id: String,
        url: String,
        path: String,
        bytes: u64,
    },
    DownloadFailed {
        download_id: String,
        url: String,
        message: String,
    },
}

impl TransferEvent {
    fn description(&self) -> &str {
        match self {
            TransferEvent::UploadStarted { .. } => "Upload batch started",
            TransferEvent::UploadFile { .. } => "File upload finished",
            TransferEvent::UploadFinished { .. } => "Upload batch finished",
            TransferEvent::DownloadStarted { .. } => "Download started",
            TransferEvent::DownloadFinished { .. } => "Download finished",
            TransferEvent::DownloadFailed { .. } => "Download failed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Cloneable handle to the broadcast channel
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Subscribers that fall more than `capacity` events behind receive
    /// `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Returns the number of subscribers reached, or an error when nobody
    /// is listening. Emitting into an empty bus is not a failure for the
    /// core; callers usually `.ok()` the result.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// `broadcast::Receiver` with an optional predicate
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let bus = EventBus::new(16);
/// let imports_only = EventStream::new(bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Import(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Only events for one import job
    pub fn for_job(self, job_id: impl Into<String>) -> Self {
        let job_id = job_id.into();
        self.filter(move |event| event.job_id() == Some(job_id.as_str()))
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Next event that passes the filter
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Returns `None` if no matching event is buffered right now.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
