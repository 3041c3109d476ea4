//! File records and media classification

use bridge_traits::storage::FileMetadata;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "tif", "tiff", "webp", "heic", "heif", "avif", "dng",
    "cr2", "cr3", "nef", "arw", "orf", "rw2", "raf", "raw",
];

const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mov", "m4v", "avi", "mkv", "mts", "m2ts", "3gp", "wmv", "webm", "mpg", "mpeg",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
    Other,
}

impl MediaType {
    /// Classify by lowercase extension without the dot
    pub fn from_extension(extension: &str) -> Self {
        if IMAGE_EXTENSIONS.contains(&extension) {
            MediaType::Image
        } else if VIDEO_EXTENSIONS.contains(&extension) {
            MediaType::Video
        } else {
            MediaType::Other
        }
    }
}

/// MIME type handed to upload services
pub fn mime_type_for(extension: &str) -> &'static str {
    // Camera RAW formats missing from the shared MIME table
    match extension {
        "dng" => "image/x-adobe-dng",
        "cr2" => "image/x-canon-cr2",
        "cr3" => "image/x-canon-cr3",
        "nef" => "image/x-nikon-nef",
        "arw" => "image/x-sony-arw",
        _ => mime_guess::from_ext(extension)
            .first_raw()
            .unwrap_or("application/octet-stream"),
    }
}

/// Lowercase extension of `path`, without the dot
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .unwrap_or_default()
}

fn timestamp(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.and_then(|secs| DateTime::from_timestamp(secs, 0))
}

/// A file found by the scanner. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub name: String,
    pub path: PathBuf,
    /// Path relative to the scan root
    pub relative_path: PathBuf,
    pub size: u64,
    pub media_type: MediaType,
    pub extension: String,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
}

impl FileRecord {
    /// Returns `None` when `path` has no usable file name or lies outside `root`
    pub fn from_metadata(root: &Path, path: &Path, metadata: &FileMetadata) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_string();
        let relative_path = path.strip_prefix(root).ok()?.to_path_buf();
        let extension = extension_of(path);

        Some(Self {
            name,
            path: path.to_path_buf(),
            relative_path,
            size: metadata.size,
            media_type: MediaType::from_extension(&extension),
            extension,
            created_at: timestamp(metadata.created_at),
            modified_at: timestamp(metadata.modified_at),
        })
    }

    pub fn mime_type(&self) -> &'static str {
        mime_type_for(&self.extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_type_classification() {
        assert_eq!(MediaType::from_extension("jpg"), MediaType::Image);
        assert_eq!(MediaType::from_extension("cr2"), MediaType::Image);
        assert_eq!(MediaType::from_extension("mov"), MediaType::Video);
        assert_eq!(MediaType::from_extension("xmp"), MediaType::Other);
        assert_eq!(MediaType::from_extension(""), MediaType::Other);
    }

    #[test]
    fn test_mime_types() {
        assert_eq!(mime_type_for("jpeg"), "image/jpeg");
        assert_eq!(mime_type_for("mov"), "video/quicktime");
        assert_eq!(mime_type_for("png"), "image/png");
        assert_eq!(mime_type_for("mp4"), "video/mp4");
        assert_eq!(mime_type_for("cr3"), "image/x-canon-cr3");
        assert_eq!(mime_type_for("nef"), "image/x-nikon-nef");
        assert_eq!(mime_type_for("qqz"), "application/octet-stream");
    }

    #[test]
    fn test_file_record_from_metadata() {
        let metadata = FileMetadata {
            size: 2048,
            created_at: Some(1_748_217_600),
            modified_at: None,
            is_directory: false,
        };
        let record = FileRecord::from_metadata(
            Path::new("/card"),
            Path::new("/card/DCIM/IMG_0001.JPG"),
            &metadata,
        )
        .unwrap();

        assert_eq!(record.name, "IMG_0001.JPG");
        assert_eq!(record.relative_path, PathBuf::from("DCIM/IMG_0001.JPG"));
        assert_eq!(record.extension, "jpg");
        assert_eq!(record.media_type, MediaType::Image);
        assert_eq!(record.size, 2048);
        assert_eq!(record.created_at.unwrap().timestamp(), 1_748_217_600);
        assert!(record.modified_at.is_none());
        assert_eq!(record.mime_type(), "image/jpeg");
    }

    #[test]
    fn test_file_record_outside_root() {
        let metadata = FileMetadata {
            size: 1,
            created_at: None,
            modified_at: None,
            is_directory: false,
        };
        assert!(FileRecord::from_metadata(Path::new("/a"), Path::new("/b/c.jpg"), &metadata).is_none());
    }
}
