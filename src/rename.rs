use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::collision::ensure_unique;
use crate::formats;
use crate::metadata::MetadataSource;
use crate::sequence::SequenceCounter;
use crate::sidecar;
use crate::tokens;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenameReport {
    pub renamed: Vec<(PathBuf, PathBuf)>,
    pub unchanged: Vec<PathBuf>,
    pub failures: Vec<String>,
}

/// Renames files in place with a filename template. `start` is the sequence
/// number given to the first base name. A `.xmp` sidecar next to a renamed
/// file follows it.
pub fn rename_files(
    paths: &[PathBuf],
    template: &str,
    start: u64,
    metadata: &dyn MetadataSource,
) -> RenameReport {
    let mut report = RenameReport::default();
    let mut counter = SequenceCounter::new(start.saturating_sub(1));
    let mut issued: HashSet<PathBuf> = HashSet::new();

    for path in paths {
        let info = metadata.lookup(path);
        let sequence = counter.advance(&info.base_name());
        let Some(folder) = path.parent() else {
            report.failures.push(format!("{} (no parent folder)", path.display()));
            continue;
        };

        let stem = tokens::resolve(&info, template, sequence);
        let suffix = formats::suffix(path);
        if stem.trim().is_empty() || folder.join(with_suffix(&stem, &suffix)) == *path {
            report.unchanged.push(path.clone());
            continue;
        }

        let (target, _) = ensure_unique(folder, &stem, &suffix, &issued);
        match fs::rename(path, &target) {
            Ok(()) => {
                log::debug!("Renamed {} -> {}", path.display(), target.display());
                issued.insert(target.clone());
                move_sidecar(path, &target, &mut report);
                report.renamed.push((path.clone(), target));
            }
            Err(e) => {
                log::warn!("Failed to rename {}: {}", path.display(), e);
                report
                    .failures
                    .push(format!("{} -> {} ({})", path.display(), target.display(), e));
            }
        }
    }
    report
}

fn with_suffix(stem: &str, suffix: &str) -> String {
    if suffix.is_empty() {
        stem.to_string()
    } else {
        format!("{}.{}", stem, suffix)
    }
}

fn move_sidecar(from: &Path, to: &Path, report: &mut RenameReport) {
    let source = sidecar::sidecar_path(from);
    let target = sidecar::sidecar_path(to);
    if !source.is_file() || target.exists() {
        return;
    }
    if let Err(e) = fs::rename(&source, &target) {
        report
            .failures
            .push(format!("{} -> {} ({})", source.display(), target.display(), e));
    }
}
