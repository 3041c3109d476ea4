//! Folder organization
//!
//! Maps a file and the job's folder policy to a relative subfolder such as
//! `2025/may/26`. Segments are always `/`-separated; [`join_folder`] turns
//! them into a platform path.

use chrono::{DateTime, Datelike, Local, NaiveDate, Utc};
use core_runtime::settings::{
    DateFolderFormat, FolderMode, FolderOrganizationConfig, DEFAULT_CUSTOM_FOLDER,
};
use std::path::{Path, PathBuf};

use crate::media::FileRecord;

const MONTH_NAMES: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

fn month_name(date: NaiveDate) -> &'static str {
    MONTH_NAMES[date.month0() as usize]
}

/// Render `date` with one of the folder templates
pub fn format_date_folder(date: NaiveDate, format: DateFolderFormat) -> String {
    let year = date.year();
    let month = date.month();
    let day = date.day();
    let mon = month_name(date);

    match format {
        DateFolderFormat::YearMonthDay => format!("{year:04}/{month:02}/{day:02}"),
        DateFolderFormat::IsoDate => format!("{year:04}-{month:02}-{day:02}"),
        DateFolderFormat::YearThenIsoDate => {
            format!("{year:04}/{year:04}-{month:02}-{day:02}")
        }
        DateFolderFormat::YearThenMonthNameDay => format!("{year:04}/{mon} {day:02}"),
        DateFolderFormat::YearMonth => format!("{year:04}/{month:02}"),
        DateFolderFormat::YearMonthName => format!("{year:04}/{mon}"),
        DateFolderFormat::YearMonthNameDay => format!("{year:04}/{mon}/{day:02}"),
        DateFolderFormat::YearThenIsoMonthThenIsoDate => {
            format!("{year:04}/{year:04}-{month:02}/{year:04}-{month:02}-{day:02}")
        }
        DateFolderFormat::FlatMonthNameDay => format!("{year:04} {mon} {day:02}"),
        DateFolderFormat::Compact => format!("{year:04}{month:02}{day:02}"),
    }
}

/// Relative subfolder for `file`; empty when organization is off
///
/// Date mode uses the file's creation time in the local timezone, or `now`
/// when the file has none.
pub fn resolve_folder(
    file: &FileRecord,
    config: &FolderOrganizationConfig,
    now: DateTime<Utc>,
) -> String {
    if !config.enabled {
        return String::new();
    }

    match config.mode {
        FolderMode::Custom => {
            let name = config
                .custom_name
                .split(['/', '\\'])
                .map(str::trim)
                .filter(|segment| is_plain_segment(segment))
                .collect::<Vec<_>>()
                .join("/");
            if name.is_empty() {
                DEFAULT_CUSTOM_FOLDER.to_string()
            } else {
                name
            }
        }
        FolderMode::Date => {
            let instant = file.created_at.unwrap_or(now);
            let date = instant.with_timezone(&Local).date_naive();
            format_date_folder(date, config.date_format)
        }
    }
}

fn is_plain_segment(segment: &str) -> bool {
    !segment.is_empty() && segment != "." && segment != ".."
}

/// Append the `/`-separated `folder` to `root`. Empty, `.` and `..`
/// segments are dropped so the result never leaves `root`.
pub fn join_folder(root: &Path, folder: &str) -> PathBuf {
    folder
        .split('/')
        .filter(|segment| is_plain_segment(segment))
        .fold(root.to_path_buf(), |path, segment| path.join(segment))
}

/// Object name used by remote stores: `folder/name`, or just `name`
pub fn remote_object_name(folder: &str, name: &str) -> String {
    let folder = folder.trim_matches('/');
    if folder.is_empty() {
        name.to_string()
    } else {
        format!("{folder}/{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaType;
    use chrono::TimeZone;

    fn record(created_at: Option<DateTime<Utc>>) -> FileRecord {
        FileRecord {
            name: "IMG_0001.jpg".to_string(),
            path: PathBuf::from("/card/IMG_0001.jpg"),
            relative_path: PathBuf::from("IMG_0001.jpg"),
            size: 10,
            media_type: MediaType::Image,
            extension: "jpg".to_string(),
            created_at,
            modified_at: None,
        }
    }

    #[test]
    fn test_every_format_for_fixed_date() {
        let date = NaiveDate::from_ymd_opt(2025, 5, 26).unwrap();
        let expected = [
            (DateFolderFormat::YearMonthDay, "2025/05/26"),
            (DateFolderFormat::IsoDate, "2025-05-26"),
            (DateFolderFormat::YearThenIsoDate, "2025/2025-05-26"),
            (DateFolderFormat::YearThenMonthNameDay, "2025/may 26"),
            (DateFolderFormat::YearMonth, "2025/05"),
            (DateFolderFormat::YearMonthName, "2025/may"),
            (DateFolderFormat::YearMonthNameDay, "2025/may/26"),
            (DateFolderFormat::YearThenIsoMonthThenIsoDate, "2025/2025-05/2025-05-26"),
            (DateFolderFormat::FlatMonthNameDay, "2025 may 26"),
            (DateFolderFormat::Compact, "20250526"),
        ];

        for (format, folder) in expected {
            assert_eq!(format_date_folder(date, format), folder, "{format}");
        }
    }

    #[test]
    fn test_unknown_selector_uses_year_month_day() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        let format = DateFolderFormat::from_selector("MM-YYYY");
        assert_eq!(format_date_folder(date, format), "2024/01/03");
    }

    #[test]
    fn test_disabled_returns_empty() {
        let config = FolderOrganizationConfig::default();
        assert_eq!(resolve_folder(&record(None), &config, Utc::now()), "");
    }

    #[test]
    fn test_custom_mode() {
        let now = Utc::now();
        let config = FolderOrganizationConfig::custom("Holiday 2025");
        assert_eq!(resolve_folder(&record(None), &config, now), "Holiday 2025");

        let blank = FolderOrganizationConfig::custom("   ");
        assert_eq!(resolve_folder(&record(None), &blank, now), "Imported");
    }

    #[test]
    fn test_custom_name_stays_inside_root() {
        let now = Utc::now();
        let escape = FolderOrganizationConfig::custom("../../etc");
        assert_eq!(resolve_folder(&record(None), &escape, now), "etc");

        let absolute = FolderOrganizationConfig::custom("/trips/./2025\\..");
        assert_eq!(resolve_folder(&record(None), &absolute, now), "trips/2025");

        let only_dots = FolderOrganizationConfig::custom("../..");
        assert_eq!(resolve_folder(&record(None), &only_dots, now), "Imported");
    }

    #[test]
    fn test_date_mode_uses_local_creation_date() {
        let created = Local.with_ymd_and_hms(2025, 5, 26, 12, 0, 0).unwrap();
        let config = FolderOrganizationConfig::by_date(DateFolderFormat::YearMonthNameDay);
        let folder = resolve_folder(
            &record(Some(created.with_timezone(&Utc))),
            &config,
            Utc::now(),
        );
        assert_eq!(folder, "2025/may/26");
    }

    #[test]
    fn test_date_mode_falls_back_to_now() {
        let now = Local.with_ymd_and_hms(2023, 12, 31, 12, 0, 0).unwrap();
        let config = FolderOrganizationConfig::by_date(DateFolderFormat::Compact);
        let folder = resolve_folder(&record(None), &config, now.with_timezone(&Utc));
        assert_eq!(folder, "20231231");
    }

    #[test]
    fn test_join_folder() {
        let root = Path::new("/photos");
        assert_eq!(join_folder(root, ""), PathBuf::from("/photos"));
        assert_eq!(
            join_folder(root, "2025/may 26"),
            PathBuf::from("/photos").join("2025").join("may 26")
        );
        assert_eq!(
            join_folder(root, "/../x/./y/.."),
            PathBuf::from("/photos").join("x").join("y")
        );
    }

    #[test]
    fn test_remote_object_name() {
        assert_eq!(remote_object_name("", "a.jpg"), "a.jpg");
        assert_eq!(remote_object_name("2025/05/26", "a.jpg"), "2025/05/26/a.jpg");
    }
}
