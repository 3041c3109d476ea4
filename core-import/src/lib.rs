//! # Media Import Module
//!
//! Imports media files from a source directory into prioritized
//! destinations.
//!
//! ## Overview
//!
//! This module manages the lifecycle of import jobs, including:
//! - Scanning the source tree with an extension allow-list
//! - Resolving date or custom subfolders
//! - Copying to Local and Backup roots with duplicate skip and unique naming
//! - Queuing landed files for an external upload service
//! - Reporting progress and honoring cancellation
//!
//! ## Components
//!
//! - **Scanner** (`scanner`): Eager, deterministic directory walk
//! - **Organizer** (`organizer`): Folder policy and the ten date formats
//! - **Naming** (`naming`): `name (n).ext` collision resolution and the size-only duplicate test
//! - **Destinations** (`destination`): Local, Backup and Remote hand-off
//! - **Router** (`router`): Priority ordering and per-file status
//! - **Import Job State Machine** (`job`): Validated phase transitions and counters
//! - **Pipeline Runner** (`runner`): Actor owning the job lifecycle
//! - **Upload Hand-off** (`upload`): One batch at a time to a registered `UploadService`
//! - **Download Worker** (`download`): One download at a time through a `FileDownloader`

pub mod destination;
pub mod download;
pub mod error;
pub mod job;
pub mod media;
pub mod naming;
pub mod organizer;
pub mod reporter;
pub mod router;
pub mod runner;
pub mod scanner;
pub mod upload;

pub use destination::{Destination, DestinationContext, DestinationResult, QueuedUpload};
pub use download::{DownloadOutcome, DownloadWorker};
pub use error::{ImportError, Result};
pub use job::{ImportJob, ImportJobId, ImportPhase};
pub use media::{FileRecord, MediaType};
pub use naming::UniqueNameResolver;
pub use reporter::JobReporter;
pub use router::{DestinationRouter, FileOutcome, FileStatus, UploadQueue};
pub use runner::{PipelineRunner, RunnerDeps, RunnerHandle};
pub use scanner::{DirectoryScanner, ScanOptions};
pub use upload::{UploadBatch, UploadFileOutcome, UploadHandoff, UploadSummary};
