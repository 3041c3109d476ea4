//! # Import Job State Machine
//!
//! Tracks one import from acceptance to its terminal phase.
//!
//! ## State Machine
//!
//! ```text
//! Pending → Scanning → Copying → Uploading → Completed
//!              │          │          │
//!              └──────────┴──────────┴──→ Failed | Cancelled
//!              └──→ Completed (no files found)
//! ```
//!
//! Counters only move forward, and every mutator is rejected once the job
//! is terminal.

use chrono::{DateTime, Utc};
use core_runtime::events::{ImportProgress, ImportSummary};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{ImportError, Result};
use crate::router::FileStatus;
use crate::upload::UploadSummary;

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for an import job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImportJobId(Uuid);

impl ImportJobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an import job ID from a string
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid UUID
    pub fn from_string(s: &str) -> Result<Self> {
        Ok(Self(
            Uuid::parse_str(s).map_err(|e| ImportError::InvalidJobId(e.to_string()))?,
        ))
    }
}

impl Default for ImportJobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ImportJobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ImportJobId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

// ============================================================================
// Phase
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportPhase {
    Pending,
    Scanning,
    Copying,
    Uploading,
    Completed,
    Failed,
    Cancelled,
}

impl ImportPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ImportPhase::Completed | ImportPhase::Failed | ImportPhase::Cancelled
        )
    }

    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImportPhase::Pending => "pending",
            ImportPhase::Scanning => "scanning",
            ImportPhase::Copying => "copying",
            ImportPhase::Uploading => "uploading",
            ImportPhase::Completed => "completed",
            ImportPhase::Failed => "failed",
            ImportPhase::Cancelled => "cancelled",
        }
    }
}

impl FromStr for ImportPhase {
    type Err = ImportError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ImportPhase::Pending),
            "scanning" => Ok(ImportPhase::Scanning),
            "copying" => Ok(ImportPhase::Copying),
            "uploading" => Ok(ImportPhase::Uploading),
            "completed" => Ok(ImportPhase::Completed),
            "failed" => Ok(ImportPhase::Failed),
            "cancelled" => Ok(ImportPhase::Cancelled),
            _ => Err(ImportError::InvalidPhase(s.to_string())),
        }
    }
}

impl std::fmt::Display for ImportPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Import Job Entity
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportJob {
    pub id: ImportJobId,
    pub phase: ImportPhase,
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
    pub current_file: Option<String>,
    pub current_destination: Option<String>,
    pub errors: Vec<String>,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ImportJob {
    pub fn new() -> Self {
        Self::with_id(ImportJobId::new())
    }

    pub fn with_id(id: ImportJobId) -> Self {
        Self {
            id,
            phase: ImportPhase::Pending,
            total_files: 0,
            processed_files: 0,
            successful_files: 0,
            failed_files: 0,
            skipped_files: 0,
            bytes_processed: 0,
            total_bytes: 0,
            uploaded_files: 0,
            upload_failed_files: 0,
            upload_skipped_files: 0,
            current_file: None,
            current_destination: None,
            errors: Vec::new(),
            error_message: None,
            started_at: None,
            completed_at: None,
        }
    }

    /// `Pending → Scanning`
    pub fn begin_scan(&mut self) -> Result<()> {
        self.transition(ImportPhase::Scanning)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// `Scanning → Copying`; totals are fixed here
    pub fn begin_copy(&mut self, total_files: u64, total_bytes: u64) -> Result<()> {
        self.transition(ImportPhase::Copying)?;
        self.total_files = total_files;
        self.total_bytes = total_bytes;
        Ok(())
    }

    /// `Copying → Uploading`; a no-op when already uploading
    pub fn begin_upload(&mut self) -> Result<()> {
        if self.phase == ImportPhase::Uploading {
            return Ok(());
        }
        self.transition(ImportPhase::Uploading)?;
        self.current_file = None;
        Ok(())
    }

    pub fn set_current(&mut self, file: Option<&str>, destination: Option<&str>) {
        if self.phase.is_terminal() {
            return;
        }
        self.current_file = file.map(str::to_string);
        self.current_destination = destination.map(str::to_string);
    }

    /// Fold one routed file into the counters
    pub fn record_file(&mut self, size: u64, status: FileStatus, errors: Vec<String>) -> Result<()> {
        self.require_phase(ImportPhase::Copying, "record_file")?;

        self.processed_files += 1;
        self.bytes_processed += size;
        match status {
            FileStatus::Successful { skipped } => {
                self.successful_files += 1;
                if skipped {
                    self.skipped_files += 1;
                }
            }
            FileStatus::Failed => self.failed_files += 1,
        }
        self.errors.extend(errors);
        Ok(())
    }

    pub fn record_uploads(&mut self, summary: &UploadSummary) -> Result<()> {
        self.require_phase(ImportPhase::Uploading, "record_uploads")?;
        self.uploaded_files += summary.uploaded;
        self.upload_failed_files += summary.failed;
        self.upload_skipped_files += summary.skipped;
        self.errors.extend(summary.errors.iter().cloned());
        Ok(())
    }

    /// A whole batch could not be handed off
    pub fn record_upload_error(&mut self, count: u64, message: String) -> Result<()> {
        self.require_phase(ImportPhase::Uploading, "record_upload_error")?;
        self.upload_failed_files += count;
        self.errors.push(message);
        Ok(())
    }

    pub fn complete(&mut self) -> Result<()> {
        self.transition(ImportPhase::Completed)?;
        self.finish();
        Ok(())
    }

    pub fn fail(&mut self, message: String) -> Result<()> {
        self.transition(ImportPhase::Failed)?;
        self.error_message = Some(message);
        self.finish();
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<()> {
        self.transition(ImportPhase::Cancelled)?;
        self.finish();
        Ok(())
    }

    /// Processed share of the total, 0-100
    pub fn percent(&self) -> u8 {
        if self.phase == ImportPhase::Completed {
            return 100;
        }
        if self.total_files == 0 {
            return 0;
        }
        ((self.processed_files as f64 / self.total_files as f64) * 100.0).min(100.0) as u8
    }

    /// Seconds between start and end; `None` until both are known
    pub fn duration_secs(&self) -> Option<u64> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some((end - start).num_seconds().max(0) as u64),
            _ => None,
        }
    }

    pub fn progress(&self) -> ImportProgress {
        ImportProgress {
            job_id: self.id.to_string(),
            phase: self.phase.as_str().to_string(),
            total_files: self.total_files,
            processed_files: self.processed_files,
            successful_files: self.successful_files,
            failed_files: self.failed_files,
            skipped_files: self.skipped_files,
            current_file: self.current_file.clone(),
            current_destination: self.current_destination.clone(),
            bytes_processed: self.bytes_processed,
            total_bytes: self.total_bytes,
            percent: self.percent(),
        }
    }

    pub fn summary(&self) -> ImportSummary {
        ImportSummary {
            job_id: self.id.to_string(),
            phase: self.phase.as_str().to_string(),
            total_files: self.total_files,
            processed_files: self.processed_files,
            successful_files: self.successful_files,
            failed_files: self.failed_files,
            skipped_files: self.skipped_files,
            bytes_processed: self.bytes_processed,
            total_bytes: self.total_bytes,
            uploaded_files: self.uploaded_files,
            upload_failed_files: self.upload_failed_files,
            upload_skipped_files: self.upload_skipped_files,
            errors: self.errors.clone(),
            duration_secs: self.duration_secs().unwrap_or(0),
        }
    }

    fn finish(&mut self) {
        self.completed_at = Some(Utc::now());
        self.current_file = None;
        self.current_destination = None;
    }

    fn transition(&mut self, target: ImportPhase) -> Result<()> {
        self.validate_transition(target)?;
        self.phase = target;
        Ok(())
    }

    fn require_phase(&self, expected: ImportPhase, operation: &str) -> Result<()> {
        if self.phase != expected {
            return Err(ImportError::InvalidStateTransition {
                from: self.phase.as_str().to_string(),
                to: operation.to_string(),
                reason: format!("Job must be {} for {}", expected, operation),
            });
        }
        Ok(())
    }

    fn validate_transition(&self, target: ImportPhase) -> Result<()> {
        use ImportPhase::*;

        let valid = match (self.phase, target) {
            (Pending, Scanning) => true,
            (Scanning, Copying) => true,
            (Scanning, Completed) => true,
            (Copying, Uploading) => true,
            (Copying, Completed) => true,
            (Uploading, Completed) => true,
            (from, Failed) | (from, Cancelled) => !from.is_terminal(),
            _ => false,
        };

        if valid {
            Ok(())
        } else {
            Err(ImportError::InvalidStateTransition {
                from: self.phase.as_str().to_string(),
                to: target.as_str().to_string(),
                reason: format!("Cannot move an import job from {} to {}", self.phase, target),
            })
        }
    }
}

impl Default for ImportJob {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn copying(total: u64) -> ImportJob {
        let mut job = ImportJob::new();
        job.begin_scan().unwrap();
        job.begin_copy(total, total * 10).unwrap();
        job
    }

    #[test]
    fn test_job_id_roundtrip() {
        let id = ImportJobId::new();
        let parsed = ImportJobId::from_string(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
        assert!(matches!(
            ImportJobId::from_string("nope"),
            Err(ImportError::InvalidJobId(_))
        ));
    }

    #[test]
    fn test_phase_strings() {
        assert_eq!("Uploading".parse::<ImportPhase>().unwrap(), ImportPhase::Uploading);
        assert!("paused".parse::<ImportPhase>().is_err());
        assert!(ImportPhase::Cancelled.is_terminal());
        assert!(ImportPhase::Scanning.is_active());
    }

    #[test]
    fn test_happy_path() {
        let mut job = copying(2);
        job.record_file(10, FileStatus::Successful { skipped: false }, vec![])
            .unwrap();
        assert_eq!(job.percent(), 50);
        job.record_file(
            10,
            FileStatus::Failed,
            vec!["b.jpg -> Local (/x): boom".to_string()],
        )
        .unwrap();
        job.complete().unwrap();

        let summary = job.summary();
        assert_eq!(summary.phase, "completed");
        assert_eq!(summary.processed_files, 2);
        assert_eq!(summary.successful_files, 1);
        assert_eq!(summary.failed_files, 1);
        assert_eq!(summary.bytes_processed, 20);
        assert_eq!(summary.errors.len(), 1);
        assert!(job.completed_at.is_some());
        assert_eq!(job.percent(), 100);
    }

    #[test]
    fn test_skipped_counts_as_successful() {
        let mut job = copying(1);
        job.record_file(5, FileStatus::Successful { skipped: true }, vec![])
            .unwrap();
        assert_eq!(job.successful_files, 1);
        assert_eq!(job.skipped_files, 1);
    }

    #[test]
    fn test_zero_files_completes_from_scanning() {
        let mut job = ImportJob::new();
        job.begin_scan().unwrap();
        job.complete().unwrap();
        assert_eq!(job.phase, ImportPhase::Completed);
        assert_eq!(job.total_files, 0);
    }

    #[test]
    fn test_invalid_transitions() {
        let mut job = ImportJob::new();
        assert!(job.begin_copy(1, 1).is_err());
        assert!(job.complete().is_err());

        job.cancel().unwrap();
        assert!(job.fail("late".to_string()).is_err());
        assert!(job.cancel().is_err());
        assert_eq!(job.phase, ImportPhase::Cancelled);
    }

    #[test]
    fn test_counters_frozen_after_terminal() {
        let mut job = copying(3);
        job.record_file(1, FileStatus::Successful { skipped: false }, vec![])
            .unwrap();
        job.cancel().unwrap();

        assert!(job
            .record_file(1, FileStatus::Successful { skipped: false }, vec![])
            .is_err());
        job.set_current(Some("x.jpg"), None);
        assert_eq!(job.processed_files, 1);
        assert_eq!(job.current_file, None);
        assert!(job.processed_files <= job.total_files);
    }

    #[test]
    fn test_upload_phase() {
        let mut job = copying(1);
        job.begin_upload().unwrap();
        job.begin_upload().unwrap();
        job.record_uploads(&UploadSummary {
            service: "azure".to_string(),
            uploaded: 1,
            skipped: 0,
            failed: 0,
            files: vec![],
            errors: vec![],
            cancelled: false,
        })
        .unwrap();
        job.record_upload_error(2, "service down".to_string()).unwrap();
        job.complete().unwrap();

        let summary = job.summary();
        assert_eq!(summary.uploaded_files, 1);
        assert_eq!(summary.upload_failed_files, 2);
    }
}
