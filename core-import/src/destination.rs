//! # Destinations
//!
//! The three places a file can go during an import, as one closed enum:
//!
//! - `Local` and `Backup` copy into a root directory (same algorithm)
//! - `Remote` queues the file for the upload hand-off and never touches the
//!   network itself
//!
//! `process_file` never returns an error; every failure is captured in the
//! returned [`DestinationResult`].

use bridge_traits::{Clock, FileSystemAccess};
use core_runtime::settings::{DestinationConfig, DestinationKind, FolderOrganizationConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::media::FileRecord;
use crate::naming::UniqueNameResolver;
use crate::organizer::{join_folder, resolve_folder};

pub const LOCAL_PRIORITY: u32 = 1;
pub const BACKUP_PRIORITY: u32 = 50;
pub const REMOTE_PRIORITY: u32 = 200;

pub const META_SKIPPED: &str = "skipped";
pub const META_RENAMED: &str = "renamed";
pub const META_FOLDER: &str = "folder";
pub const META_QUEUED: &str = "queuedForUpload";

// ============================================================================
// Results
// ============================================================================

/// Outcome of routing one file to one destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationResult {
    pub success: bool,
    /// Where the file ended up; `None` on failure or duplicate skip
    pub final_path: Option<PathBuf>,
    pub error: Option<String>,
    pub metadata: HashMap<String, String>,
}

impl DestinationResult {
    pub fn copied(path: PathBuf, folder: &str, renamed: bool) -> Self {
        let mut metadata = HashMap::new();
        metadata.insert(META_FOLDER.to_string(), folder.to_string());
        metadata.insert(META_RENAMED.to_string(), renamed.to_string());
        Self {
            success: true,
            final_path: Some(path),
            error: None,
            metadata,
        }
    }

    pub fn skipped(folder: &str) -> Self {
        let mut metadata = HashMap::new();
        metadata.insert(META_FOLDER.to_string(), folder.to_string());
        metadata.insert(META_SKIPPED.to_string(), "true".to_string());
        Self {
            success: true,
            final_path: None,
            error: None,
            metadata,
        }
    }

    pub fn queued(source: PathBuf) -> Self {
        let mut metadata = HashMap::new();
        metadata.insert(META_QUEUED.to_string(), "true".to_string());
        Self {
            success: true,
            final_path: Some(source),
            error: None,
            metadata,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            final_path: None,
            error: Some(error.into()),
            metadata: HashMap::new(),
        }
    }

    /// Successful duplicate skip
    pub fn is_skip(&self) -> bool {
        self.success && self.metadata.get(META_SKIPPED).is_some_and(|v| v == "true")
    }
}

// ============================================================================
// Disk destination (Local / Backup)
// ============================================================================

/// Copies files under a root directory
pub struct DiskDestination {
    kind: DestinationKind,
    root: Option<PathBuf>,
    enabled: bool,
    fs: Arc<dyn FileSystemAccess>,
    clock: Arc<dyn Clock>,
    names: UniqueNameResolver,
    skip_duplicates: bool,
    initialized: bool,
}

impl DiskDestination {
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    fn is_ready(&self) -> bool {
        self.enabled && self.root.as_ref().is_some_and(|r| !r.as_os_str().is_empty())
    }

    async fn initialize(&mut self) -> bool {
        if self.initialized {
            return true;
        }
        if !self.is_ready() {
            return false;
        }
        let Some(root) = self.root.as_deref() else {
            return false;
        };

        match self.fs.create_dir_all(root).await {
            Ok(()) => {
                self.initialized = true;
                true
            }
            Err(e) => {
                warn!(root = %root.display(), error = %e, "Failed to prepare destination root");
                false
            }
        }
    }

    async fn process_file(
        &self,
        file: &FileRecord,
        source: &Path,
        folder_org: &FolderOrganizationConfig,
    ) -> DestinationResult {
        let Some(root) = self.root.as_deref() else {
            return DestinationResult::failed("Destination has no target path");
        };

        let folder = resolve_folder(file, folder_org, self.clock.now());
        let target_dir = join_folder(root, &folder);

        if let Err(e) = self.fs.create_dir_all(&target_dir).await {
            return DestinationResult::failed(format!(
                "Failed to create directory {}: {}",
                target_dir.display(),
                e
            ));
        }

        let candidate = target_dir.join(&file.name);

        if self.skip_duplicates {
            match self.names.is_duplicate(&candidate, file.size).await {
                Ok(true) => {
                    debug!(file = %file.name, target = %candidate.display(), "Duplicate, skipping");
                    return DestinationResult::skipped(&folder);
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(file = %file.name, error = %e, "Duplicate check failed, copying anyway");
                }
            }
        }

        let target = match self.names.resolve(&candidate).await {
            Ok(target) => target,
            Err(e) => {
                return DestinationResult::failed(format!(
                    "Failed to resolve a unique name for {}: {}",
                    file.name, e
                ))
            }
        };
        let renamed = target != candidate;

        match self.fs.copy_file(source, &target).await {
            Ok(bytes) => {
                debug!(file = %file.name, target = %target.display(), bytes, "Copied");
                DestinationResult::copied(target, &folder, renamed)
            }
            Err(e) => DestinationResult::failed(format!(
                "Failed to copy {} to {}: {}",
                source.display(),
                target.display(),
                e
            )),
        }
    }
}

// ============================================================================
// Remote hand-off
// ============================================================================

/// A file waiting for the upload hand-off
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedUpload {
    /// The landed local copy when there is one, else the original source
    pub source_path: PathBuf,
    pub file: FileRecord,
    pub folder_organization: FolderOrganizationConfig,
}

/// Queues files for an external upload service
#[derive(Debug)]
pub struct RemoteHandoff {
    service: Option<String>,
    enabled: bool,
    options: HashMap<String, String>,
    queue: Vec<QueuedUpload>,
}

impl RemoteHandoff {
    pub fn service(&self) -> Option<&str> {
        self.service.as_deref()
    }

    pub fn options(&self) -> &HashMap<String, String> {
        &self.options
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn drain(&mut self) -> Vec<QueuedUpload> {
        std::mem::take(&mut self.queue)
    }

    fn is_ready(&self) -> bool {
        self.enabled && self.service.as_ref().is_some_and(|s| !s.trim().is_empty())
    }

    fn process_file(
        &mut self,
        file: &FileRecord,
        source: &Path,
        folder_org: &FolderOrganizationConfig,
    ) -> DestinationResult {
        self.queue.push(QueuedUpload {
            source_path: source.to_path_buf(),
            file: file.clone(),
            folder_organization: folder_org.clone(),
        });
        DestinationResult::queued(source.to_path_buf())
    }
}

// ============================================================================
// Destination
// ============================================================================

/// Shared collaborators for building destinations
#[derive(Clone)]
pub struct DestinationContext {
    pub fs: Arc<dyn FileSystemAccess>,
    pub clock: Arc<dyn Clock>,
    pub skip_duplicates: bool,
    pub unique_name_limit: u32,
}

pub enum Destination {
    Local(DiskDestination),
    Backup(DiskDestination),
    Remote(RemoteHandoff),
}

impl Destination {
    pub fn from_config(config: &DestinationConfig, ctx: &DestinationContext) -> Self {
        let disk = |kind| DiskDestination {
            kind,
            root: config.path.clone(),
            enabled: config.enabled,
            fs: Arc::clone(&ctx.fs),
            clock: Arc::clone(&ctx.clock),
            names: UniqueNameResolver::new(
                Arc::clone(&ctx.fs),
                Arc::clone(&ctx.clock),
                ctx.unique_name_limit,
            ),
            skip_duplicates: ctx.skip_duplicates,
            initialized: false,
        };

        match config.kind {
            DestinationKind::Local => Destination::Local(disk(DestinationKind::Local)),
            DestinationKind::Backup => Destination::Backup(disk(DestinationKind::Backup)),
            DestinationKind::Remote => Destination::Remote(RemoteHandoff {
                service: config.service.clone(),
                enabled: config.enabled,
                options: config.options.clone(),
                queue: Vec::new(),
            }),
        }
    }

    pub fn kind(&self) -> DestinationKind {
        match self {
            Destination::Local(d) | Destination::Backup(d) => d.kind,
            Destination::Remote(_) => DestinationKind::Remote,
        }
    }

    pub fn priority(&self) -> u32 {
        match self {
            Destination::Local(_) => LOCAL_PRIORITY,
            Destination::Backup(_) => BACKUP_PRIORITY,
            Destination::Remote(_) => REMOTE_PRIORITY,
        }
    }

    /// e.g. `Local (/photos)` or `Remote (azure)`
    pub fn display_name(&self) -> String {
        match self {
            Destination::Local(d) => format!("Local ({})", display_root(d.root())),
            Destination::Backup(d) => format!("Backup ({})", display_root(d.root())),
            Destination::Remote(r) => format!("Remote ({})", r.service().unwrap_or("unset")),
        }
    }

    /// Enabled and minimally configured
    pub fn is_ready(&self) -> bool {
        match self {
            Destination::Local(d) | Destination::Backup(d) => d.is_ready(),
            Destination::Remote(r) => r.is_ready(),
        }
    }

    /// Prepare the destination for a job; idempotent
    pub async fn initialize(&mut self) -> bool {
        match self {
            Destination::Local(d) | Destination::Backup(d) => d.initialize().await,
            Destination::Remote(r) => r.is_ready(),
        }
    }

    pub async fn process_file(
        &mut self,
        file: &FileRecord,
        source: &Path,
        folder_org: &FolderOrganizationConfig,
    ) -> DestinationResult {
        match self {
            Destination::Local(d) | Destination::Backup(d) => {
                d.process_file(file, source, folder_org).await
            }
            Destination::Remote(r) => r.process_file(file, source, folder_org),
        }
    }

    pub fn as_remote_mut(&mut self) -> Option<&mut RemoteHandoff> {
        match self {
            Destination::Remote(r) => Some(r),
            _ => None,
        }
    }
}

fn display_root(root: Option<&Path>) -> String {
    root.map(|r| r.display().to_string())
        .unwrap_or_else(|| "unset".to_string())
}
