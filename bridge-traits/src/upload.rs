//! Upload Service Abstraction
//!
//! The contract between the import core and whatever remote object store
//! sits behind an upload destination. The core only hands files over; the
//! concrete client (SDK calls, credential parsing, multipart bodies) lives
//! in the host.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::Result;

/// Result of checking a service's configuration without touching the network
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    pub fn invalid(errors: Vec<String>) -> Self {
        Self {
            valid: false,
            errors,
        }
    }
}

/// Result of a round trip to the remote service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionReport {
    pub success: bool,
    pub message: String,
    pub details: Option<String>,
}

/// Per-upload options forwarded to the service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadOptions {
    pub skip_duplicates: bool,
    pub metadata: HashMap<String, String>,
}

/// What the service reports back for a single file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub success: bool,
    pub url: Option<String>,
    pub skipped: bool,
    pub message: String,
    pub details: Option<String>,
}

impl UploadReceipt {
    pub fn uploaded(url: impl Into<String>) -> Self {
        Self {
            success: true,
            url: Some(url.into()),
            skipped: false,
            message: "Uploaded".to_string(),
            details: None,
        }
    }

    pub fn skipped(message: impl Into<String>) -> Self {
        Self {
            success: true,
            url: None,
            skipped: true,
            message: message.into(),
            details: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            url: None,
            skipped: false,
            message: message.into(),
            details: None,
        }
    }
}

/// Remote upload collaborator
///
/// Implementations wrap one concrete object store. They are registered by
/// name with the upload hand-off and selected per destination.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::upload::{UploadOptions, UploadService};
///
/// async fn push(service: &dyn UploadService, path: &Path) -> Result<()> {
///     let options = UploadOptions { skip_duplicates: true, ..Default::default() };
///     if !service.check_if_duplicate("2025/05/26/IMG_0001.jpg", 2048).await? {
///         service.upload_file(path, "2025/05/26/IMG_0001.jpg", "image/jpeg", &options).await?;
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait UploadService: Send + Sync {
    /// Check that credentials and target settings are present and well-formed
    async fn validate_configuration(&self) -> ValidationReport;

    /// Reach the remote store and report whether it answers
    async fn test_connection(&self) -> ConnectionReport;

    /// True when an object named `remote_name` already exists with `expected_size` bytes
    async fn check_if_duplicate(&self, remote_name: &str, expected_size: u64) -> Result<bool>;

    /// Produce a remote name that does not collide with an existing object
    async fn generate_unique_remote_name(&self, name: &str, size: u64) -> Result<String>;

    /// Upload a local file under `remote_name`
    async fn upload_file(
        &self,
        path: &Path,
        remote_name: &str,
        mime_type: &str,
        options: &UploadOptions,
    ) -> Result<UploadReceipt>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receipt_constructors() {
        let uploaded = UploadReceipt::uploaded("https://bucket/2025/a.jpg");
        assert!(uploaded.success);
        assert!(!uploaded.skipped);
        assert_eq!(uploaded.url.as_deref(), Some("https://bucket/2025/a.jpg"));

        let skipped = UploadReceipt::skipped("already there");
        assert!(skipped.success);
        assert!(skipped.skipped);

        let failed = UploadReceipt::failed("403");
        assert!(!failed.success);
    }

    #[test]
    fn test_upload_options_serialize_camel_case() {
        let options = UploadOptions {
            skip_duplicates: true,
            metadata: HashMap::new(),
        };
        let json = serde_json::to_string(&options).unwrap();
        assert!(json.contains("skipDuplicates"));
    }
}
