//! # Import Settings
//!
//! The job configuration a caller sends with `start-import`. Field names are
//! camelCase on the wire so hosts can pass their settings object through
//! unchanged.
//!
//! ```json
//! {
//!   "sourcePath": "/media/card/DCIM",
//!   "recursive": true,
//!   "fileTypes": ["jpg", "mp4"],
//!   "skipDuplicates": true,
//!   "destinations": [
//!     { "type": "local", "path": "/photos", "enabled": true },
//!     { "type": "remote", "service": "azure", "enabled": true }
//!   ],
//!   "folderOrganization": { "enabled": true, "mode": "date", "dateFormat": "YYYY/mon/DD" }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Folder name used by custom mode when the caller leaves the name blank
pub const DEFAULT_CUSTOM_FOLDER: &str = "Imported";

fn default_true() -> bool {
    true
}

// ============================================================================
// Destinations
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DestinationKind {
    Local,
    Backup,
    Remote,
}

impl DestinationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DestinationKind::Local => "local",
            DestinationKind::Backup => "backup",
            DestinationKind::Remote => "remote",
        }
    }
}

impl fmt::Display for DestinationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One configured destination
///
/// `path` applies to local and backup destinations, `service` and
/// `options` to remote ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationConfig {
    #[serde(rename = "type")]
    pub kind: DestinationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub options: HashMap<String, String>,
}

impl DestinationConfig {
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self::disk(DestinationKind::Local, path.into())
    }

    pub fn backup(path: impl Into<PathBuf>) -> Self {
        Self::disk(DestinationKind::Backup, path.into())
    }

    pub fn remote(service: impl Into<String>) -> Self {
        Self {
            kind: DestinationKind::Remote,
            path: None,
            enabled: true,
            service: Some(service.into()),
            options: HashMap::new(),
        }
    }

    fn disk(kind: DestinationKind, path: PathBuf) -> Self {
        Self {
            kind,
            path: Some(path),
            enabled: true,
            service: None,
            options: HashMap::new(),
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

// ============================================================================
// Folder Organization
// ============================================================================

/// Date folder templates
///
/// Serialized as the literal selector string (`"YYYY/mon/DD"`). Selectors
/// outside this set deserialize to [`DateFolderFormat::YearMonthDay`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DateFolderFormat {
    /// `YYYY/MM/DD`
    #[default]
    YearMonthDay,
    /// `YYYY-MM-DD`
    IsoDate,
    /// `YYYY/YYYY-MM-DD`
    YearThenIsoDate,
    /// `YYYY/mon DD`
    YearThenMonthNameDay,
    /// `YYYY/MM`
    YearMonth,
    /// `YYYY/mon`
    YearMonthName,
    /// `YYYY/mon/DD`
    YearMonthNameDay,
    /// `YYYY/YYYY-MM/YYYY-MM-DD`
    YearThenIsoMonthThenIsoDate,
    /// `YYYY mon DD`
    FlatMonthNameDay,
    /// `YYYYMMDD`
    Compact,
}

impl DateFolderFormat {
    pub const ALL: [DateFolderFormat; 10] = [
        DateFolderFormat::YearMonthDay,
        DateFolderFormat::IsoDate,
        DateFolderFormat::YearThenIsoDate,
        DateFolderFormat::YearThenMonthNameDay,
        DateFolderFormat::YearMonth,
        DateFolderFormat::YearMonthName,
        DateFolderFormat::YearMonthNameDay,
        DateFolderFormat::YearThenIsoMonthThenIsoDate,
        DateFolderFormat::FlatMonthNameDay,
        DateFolderFormat::Compact,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DateFolderFormat::YearMonthDay => "YYYY/MM/DD",
            DateFolderFormat::IsoDate => "YYYY-MM-DD",
            DateFolderFormat::YearThenIsoDate => "YYYY/YYYY-MM-DD",
            DateFolderFormat::YearThenMonthNameDay => "YYYY/mon DD",
            DateFolderFormat::YearMonth => "YYYY/MM",
            DateFolderFormat::YearMonthName => "YYYY/mon",
            DateFolderFormat::YearMonthNameDay => "YYYY/mon/DD",
            DateFolderFormat::YearThenIsoMonthThenIsoDate => "YYYY/YYYY-MM/YYYY-MM-DD",
            DateFolderFormat::FlatMonthNameDay => "YYYY mon DD",
            DateFolderFormat::Compact => "YYYYMMDD",
        }
    }

    /// Match a selector exactly, falling back to `YYYY/MM/DD`
    pub fn from_selector(selector: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|format| format.as_str() == selector)
            .unwrap_or_default()
    }
}

impl From<String> for DateFolderFormat {
    fn from(value: String) -> Self {
        Self::from_selector(&value)
    }
}

impl From<DateFolderFormat> for String {
    fn from(value: DateFolderFormat) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for DateFolderFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FolderMode {
    #[default]
    Date,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FolderOrganizationConfig {
    pub enabled: bool,
    pub mode: FolderMode,
    pub date_format: DateFolderFormat,
    pub custom_name: String,
}

impl FolderOrganizationConfig {
    pub fn by_date(format: DateFolderFormat) -> Self {
        Self {
            enabled: true,
            mode: FolderMode::Date,
            date_format: format,
            custom_name: String::new(),
        }
    }

    pub fn custom(name: impl Into<String>) -> Self {
        Self {
            enabled: true,
            mode: FolderMode::Custom,
            date_format: DateFolderFormat::default(),
            custom_name: name.into(),
        }
    }
}

// ============================================================================
// Import Settings
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSettings {
    pub source_path: PathBuf,
    #[serde(default = "default_true")]
    pub recursive: bool,
    /// Extension allow-list without dots; empty accepts everything
    #[serde(default)]
    pub file_types: Vec<String>,
    #[serde(default = "default_true")]
    pub skip_duplicates: bool,
    #[serde(default)]
    pub destinations: Vec<DestinationConfig>,
    #[serde(default)]
    pub folder_organization: FolderOrganizationConfig,
    /// Forwarded verbatim to the upload service
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub upload_metadata: HashMap<String, String>,
}

impl ImportSettings {
    pub fn new(source_path: impl Into<PathBuf>) -> Self {
        Self {
            source_path: source_path.into(),
            recursive: true,
            file_types: Vec::new(),
            skip_duplicates: true,
            destinations: Vec::new(),
            folder_organization: FolderOrganizationConfig::default(),
            upload_metadata: HashMap::new(),
        }
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn file_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.file_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn skip_duplicates(mut self, skip: bool) -> Self {
        self.skip_duplicates = skip;
        self
    }

    pub fn destination(mut self, destination: DestinationConfig) -> Self {
        self.destinations.push(destination);
        self
    }

    pub fn folder_organization(mut self, config: FolderOrganizationConfig) -> Self {
        self.folder_organization = config;
        self
    }

    /// Extension allow-list lowercased with any leading dot removed
    pub fn normalized_file_types(&self) -> Vec<String> {
        self.file_types
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect()
    }

    pub fn enabled_destinations(&self) -> impl Iterator<Item = &DestinationConfig> {
        self.destinations.iter().filter(|d| d.enabled)
    }

    pub fn validate(&self) -> Result<()> {
        if self.source_path.as_os_str().is_empty() {
            return Err(Error::InvalidSettings(
                "sourcePath cannot be empty".to_string(),
            ));
        }

        if self.enabled_destinations().next().is_none() {
            return Err(Error::InvalidSettings(
                "At least one enabled destination is required".to_string(),
            ));
        }

        Ok(())
    }
}
