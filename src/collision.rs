use std::collections::HashSet;
use std::path::{Path, PathBuf};

fn candidate(folder: &Path, base_name: &str, suffix: &str) -> PathBuf {
    if suffix.is_empty() {
        folder.join(base_name)
    } else {
        folder.join(format!("{}.{}", base_name, suffix))
    }
}

/// Returns a path in `folder` for `base_name.suffix` that is neither on disk
/// nor already in `issued`, together with the base name that produced it.
///
/// Collisions are resolved by appending `_1`, `_2`, ... to the original base
/// name. There is no upper bound on attempts.
pub fn ensure_unique(
    folder: &Path,
    base_name: &str,
    suffix: &str,
    issued: &HashSet<PathBuf>,
) -> (PathBuf, String) {
    ensure_unique_by(folder, base_name, suffix, |path| {
        path.exists() || issued.contains(path)
    })
}

/// Like [`ensure_unique`], with the caller deciding which candidates are
/// taken.
pub fn ensure_unique_by(
    folder: &Path,
    base_name: &str,
    suffix: &str,
    taken: impl Fn(&Path) -> bool,
) -> (PathBuf, String) {
    let mut name = base_name.to_string();
    let mut path = candidate(folder, &name, suffix);
    let mut count = 0u64;
    while taken(&path) {
        count += 1;
        name = format!("{}_{}", base_name, count);
        path = candidate(folder, &name, suffix);
    }
    (path, name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn free_name_is_returned_as_is() {
        let dir = TempDir::new().unwrap();
        let (path, name) = ensure_unique(dir.path(), "2024-01-01_0001", "jpg", &HashSet::new());
        assert_eq!(path, dir.path().join("2024-01-01_0001.jpg"));
        assert_eq!(name, "2024-01-01_0001");
    }

    #[test]
    fn appends_counter_until_free() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.jpg"), b"").unwrap();
        fs::write(dir.path().join("a_1.jpg"), b"").unwrap();
        // a different suffix does not collide
        fs::write(dir.path().join("a_2.nef"), b"").unwrap();

        let (path, name) = ensure_unique(dir.path(), "a", "jpg", &HashSet::new());
        assert_eq!(name, "a_2");
        assert!(!path.exists());

        let (again, _) = ensure_unique(dir.path(), "a", "jpg", &HashSet::new());
        assert_eq!(again, path);
    }

    #[test]
    fn caller_predicate_decides_what_is_taken() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("0001.xmp"), b"").unwrap();
        let (path, name) = ensure_unique_by(dir.path(), "0001", "jpg", |p| {
            p.exists() || p.with_extension("xmp").exists()
        });
        assert_eq!(name, "0001_1");
        assert_eq!(path, dir.path().join("0001_1.jpg"));
    }

    #[test]
    fn issued_paths_count_as_collisions() {
        let dir = TempDir::new().unwrap();
        let issued: HashSet<PathBuf> = [dir.path().join("a.jpg")].into_iter().collect();
        let (path, name) = ensure_unique(dir.path(), "a", "jpg", &issued);
        assert_eq!(name, "a_1");
        assert_eq!(path, dir.path().join("a_1.jpg"));
    }
}
