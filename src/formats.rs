use std::path::{Path, PathBuf};

pub const RAW_EXTENSIONS: &[&str] = &[
    "arw", "cr2", "cr3", "dng", "nef", "nrw", "orf", "raf", "raw", "rw2", "rwl", "sr2", "srw",
];

pub const JPEG_EXTENSIONS: &[&str] = &["jpg", "jpeg"];

pub const OTHER_IMAGE_EXTENSIONS: &[&str] =
    &["bmp", "gif", "heic", "heif", "png", "tif", "tiff", "webp"];

fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

pub fn is_raw_file(filename: &str) -> bool {
    extension_of(filename).is_some_and(|ext| RAW_EXTENSIONS.contains(&ext.as_str()))
}

pub fn is_jpeg_file(filename: &str) -> bool {
    extension_of(filename).is_some_and(|ext| JPEG_EXTENSIONS.contains(&ext.as_str()))
}

pub fn is_supported_image(filename: &str) -> bool {
    is_raw_file(filename)
        || is_jpeg_file(filename)
        || extension_of(filename).is_some_and(|ext| OTHER_IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

pub fn is_supported_path(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(is_supported_image)
}

/// Base name used for raw+jpg pairing and sequence numbering.
pub fn base_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_string()
}

pub fn suffix(path: &Path) -> String {
    path.extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_string()
}

/// Finds the jpg for a raw file (or the raw for a jpg) sitting next to it.
pub fn find_companion(path: &Path) -> Option<PathBuf> {
    let filename = path.file_name()?.to_str()?;
    let wanted: fn(&str) -> bool = if is_raw_file(filename) {
        is_jpeg_file
    } else if is_jpeg_file(filename) {
        is_raw_file
    } else {
        return None;
    };

    let base = base_name(path);
    let dir = path.parent()?;
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .flatten()
        .map(|entry| entry.path())
        .filter(|p| p.is_file() && base_name(p) == base)
        .filter(|p| p.file_name().and_then(|n| n.to_str()).is_some_and(wanted))
        .collect();
    candidates.sort();
    candidates.into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_extensions_case_insensitively() {
        assert!(is_raw_file("DSC_0001.NEF"));
        assert!(is_jpeg_file("DSC_0001.Jpeg"));
        assert!(is_supported_image("scan.tif"));
        assert!(!is_supported_image("notes.txt"));
        assert!(!is_raw_file("nef"));
    }

    #[test]
    fn finds_jpg_next_to_raw() {
        let dir = tempfile::TempDir::new().unwrap();
        let raw = dir.path().join("A.nef");
        let jpg = dir.path().join("A.JPG");
        std::fs::write(&raw, b"raw").unwrap();
        std::fs::write(&jpg, b"jpg").unwrap();
        std::fs::write(dir.path().join("B.jpg"), b"other").unwrap();

        assert_eq!(find_companion(&raw), Some(jpg));
        assert_eq!(find_companion(&dir.path().join("A.JPG")), Some(raw));
    }
}
