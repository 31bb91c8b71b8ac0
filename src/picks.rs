use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::formats;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickEntry {
    pub path: PathBuf,
    pub size: u64,
}

impl PickEntry {
    pub fn new(path: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            path: path.into(),
            size,
        }
    }

    /// Builds an entry from a file on disk, reading its size.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let metadata = fs::metadata(path)?;
        Ok(Self::new(path, metadata.len()))
    }
}

pub type PickList = Vec<PickEntry>;

pub fn total_bytes(picks: &[PickEntry]) -> u64 {
    picks.iter().map(|p| p.size).sum()
}

fn collect_all_files_recursive(directory: &Path) -> Vec<PathBuf> {
    let mut all_files = Vec::new();

    fn collect_recursive(dir: &Path, files: &mut Vec<PathBuf>) {
        if let Ok(entries) = fs::read_dir(dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_file() {
                    files.push(path);
                } else if path.is_dir() {
                    collect_recursive(&path, files);
                }
            }
        }
    }

    collect_recursive(directory, &mut all_files);
    all_files
}

/// Every supported image below `directory`, sorted by path so that a raw
/// file and its jpg end up next to each other.
pub fn collect_from_folder(directory: &Path) -> PickList {
    let mut files: Vec<PathBuf> = collect_all_files_recursive(directory)
        .into_iter()
        .filter(|p| formats::is_supported_path(p))
        .collect();
    files.sort();

    files
        .iter()
        .filter_map(|path| match PickEntry::from_path(path) {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::warn!("Skipping {}: {}", path.display(), e);
                None
            }
        })
        .collect()
}

/// Adds the raw or jpg companion of every pick directly after it, unless the
/// companion is already in the list.
pub fn expand_raw_jpg_pairs(picks: &[PickEntry]) -> PickList {
    let mut seen: HashSet<PathBuf> = picks.iter().map(|p| p.path.clone()).collect();
    let mut expanded = Vec::with_capacity(picks.len());

    for pick in picks {
        expanded.push(pick.clone());
        if let Some(companion) = formats::find_companion(&pick.path)
            && seen.insert(companion.clone())
        {
            match PickEntry::from_path(&companion) {
                Ok(entry) => expanded.push(entry),
                Err(e) => log::warn!("Skipping companion {}: {}", companion.display(), e),
            }
        }
    }
    expanded
}
