use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, Datelike, Local, NaiveDateTime};
use rayon::prelude::*;
use serde_json::Value;

use crate::picks::PickEntry;

/// Per-file metadata the token resolver and the sidecar writer read from.
///
/// Every descriptive field is optional; an absent field resolves to an empty
/// string rather than an error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileInfo {
    pub path: PathBuf,
    pub created: Option<NaiveDateTime>,
    pub title: Option<String>,
    pub creator: Option<String>,
    pub copyright: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub exposure_time: Option<String>,
    pub aperture: Option<String>,
    pub iso: Option<String>,
    pub focal_length: Option<String>,
    pub rating: Option<u8>,
    pub label: Option<String>,
}

impl FileInfo {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_created(mut self, created: NaiveDateTime) -> Self {
        self.created = Some(created);
        self
    }

    pub fn base_name(&self) -> String {
        crate::formats::base_name(&self.path)
    }
}

/// Per-file metadata lookup supplied by the data model that owns the images.
pub trait MetadataSource: Send + Sync {
    fn lookup(&self, path: &Path) -> FileInfo;
}

/// Reads metadata with only file system timestamps.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsMetadataSource;

impl MetadataSource for FsMetadataSource {
    fn lookup(&self, path: &Path) -> FileInfo {
        FileInfo {
            created: file_time(path),
            ..FileInfo::new(path)
        }
    }
}

/// Reads EXIF/XMP fields through `exiftool -j`, falling back to the file
/// modification time when the image carries no capture date.
#[derive(Debug, Clone)]
pub struct ExifToolSource {
    program: String,
}

impl Default for ExifToolSource {
    fn default() -> Self {
        Self {
            program: "exiftool".to_string(),
        }
    }
}

impl ExifToolSource {
    pub fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("-ver")
            .output()
            .is_ok_and(|out| out.status.success())
    }

    fn exif_data(&self, file_path: &Path) -> Result<Value, Box<dyn std::error::Error>> {
        let output = Command::new(&self.program).arg("-j").arg(file_path).output()?;
        let json: Vec<Value> = serde_json::from_slice(&output.stdout)?;
        Ok(json.into_iter().next().unwrap_or(Value::Null))
    }
}

impl MetadataSource for ExifToolSource {
    fn lookup(&self, path: &Path) -> FileInfo {
        match self.exif_data(path) {
            Ok(exif) => {
                let mut info = file_info_from_exif(path, &exif);
                if info.created.is_none() {
                    info.created = file_time(path);
                }
                info
            }
            Err(e) => {
                log::warn!("exiftool failed for {}: {}", path.display(), e);
                FsMetadataSource.lookup(path)
            }
        }
    }
}

fn field(exif: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match exif.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => {
            let joined: Vec<String> = items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect();
            (!joined.is_empty()).then(|| joined.join("; "))
        }
        _ => None,
    })
}

pub fn exif_date(exif: &Value) -> Option<NaiveDateTime> {
    let date_str = field(exif, &["DateTimeOriginal", "CreateDate"])?;
    // exiftool may append sub-seconds or a zone: "2024:01:01 10:00:00.12+01:00"
    let trimmed = date_str.get(..19)?;
    let dt = NaiveDateTime::parse_from_str(trimmed, "%Y:%m:%d %H:%M:%S").ok()?;
    (1900..=2100).contains(&dt.year()).then_some(dt)
}

pub fn file_info_from_exif(path: &Path, exif: &Value) -> FileInfo {
    FileInfo {
        path: path.to_path_buf(),
        created: exif_date(exif),
        title: field(exif, &["Title", "ObjectName", "Headline"]),
        creator: field(exif, &["Creator", "Artist", "By-line"]),
        copyright: field(exif, &["Rights", "Copyright", "CopyrightNotice"]),
        make: field(exif, &["Make"]),
        model: field(exif, &["Model"]),
        width: field(exif, &["ImageWidth"]).and_then(|w| w.parse().ok()),
        height: field(exif, &["ImageHeight"]).and_then(|h| h.parse().ok()),
        exposure_time: field(exif, &["ExposureTime", "ShutterSpeed"]),
        aperture: field(exif, &["FNumber", "Aperture"]),
        iso: field(exif, &["ISO"]),
        focal_length: field(exif, &["FocalLength"]),
        rating: field(exif, &["Rating"]).and_then(|r| r.parse().ok()),
        label: field(exif, &["Label"]),
    }
}

fn file_time(path: &Path) -> Option<NaiveDateTime> {
    let meta = fs::metadata(path).ok()?;
    let time = meta.created().or_else(|_| meta.modified()).ok()?;
    Some(DateTime::<Local>::from(time).naive_local())
}

/// Looks up every pick in parallel. Lookups are read-only, so this is the
/// only part of an ingest that runs on more than one thread.
pub fn load_all(source: &dyn MetadataSource, picks: &[PickEntry]) -> HashMap<PathBuf, FileInfo> {
    picks
        .par_iter()
        .map(|pick| (pick.path.clone(), source.lookup(&pick.path)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn parses_exiftool_json() {
        let exif = json!({
            "DateTimeOriginal": "2024:01:01 09:30:15.25+01:00",
            "Make": "NIKON CORPORATION",
            "Model": "NIKON D850",
            "ImageWidth": 8256,
            "ImageHeight": 5504,
            "FNumber": 5.6,
            "ISO": 400,
            "Creator": ["Jane Doe"],
            "Title": "  ",
        });
        let info = file_info_from_exif(Path::new("/card/DSC_0001.NEF"), &exif);

        let expected = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(9, 30, 15)
            .unwrap();
        assert_eq!(info.created, Some(expected));
        assert_eq!(info.make.as_deref(), Some("NIKON CORPORATION"));
        assert_eq!(info.width, Some(8256));
        assert_eq!(info.aperture.as_deref(), Some("5.6"));
        assert_eq!(info.creator.as_deref(), Some("Jane Doe"));
        assert_eq!(info.title, None);
        assert_eq!(info.base_name(), "DSC_0001");
    }

    #[test]
    fn rejects_zeroed_dates() {
        assert_eq!(exif_date(&json!({"DateTimeOriginal": "0000:00:00 00:00:00"})), None);
        assert_eq!(exif_date(&json!({})), None);
    }

    #[test]
    fn fs_source_uses_file_time() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("a.jpg");
        fs::write(&path, b"x").unwrap();
        let info = FsMetadataSource.lookup(&path);
        assert!(info.created.is_some());
        assert_eq!(info.path, path);
    }
}
