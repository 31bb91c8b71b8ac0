use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::formats;
use crate::session::SessionContext;

static TRAILING_DIGITS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)$").expect("Invalid trailing digits regex"));

/// The run of digits that ends a file's stem, e.g. `img_0007.jpg` → 7.
pub fn trailing_number(file_name: &str) -> Option<u64> {
    let stem = Path::new(file_name).file_stem()?.to_str()?;
    let captures = TRAILING_DIGITS_RE.captures(stem)?;
    captures.get(1)?.as_str().parse().ok()
}

/// Running sequence number for one operation. It advances once per distinct
/// base name, so `A.nef` followed by `A.jpg` share a number.
#[derive(Debug, Clone, Default)]
pub struct SequenceCounter {
    value: u64,
    previous_base: Option<String>,
}

impl SequenceCounter {
    pub fn new(seed: u64) -> Self {
        Self {
            value: seed,
            previous_base: None,
        }
    }

    pub fn advance(&mut self, base_name: &str) -> u64 {
        if self.previous_base.as_deref() != Some(base_name) {
            self.value = self.value.saturating_add(1);
            self.previous_base = Some(base_name.to_string());
        }
        self.value
    }

    pub fn value(&self) -> u64 {
        self.value
    }
}

/// Highest sequence number found in `folder`, never lower than the highest
/// number already issued this session.
///
/// A missing or unreadable folder counts as empty.
pub fn probe(folder: &Path, session: &mut SessionContext) -> u64 {
    let found = folder_max(folder);
    if found > session.sequence_high_water {
        log::debug!("Sequence in {} starts after {}", folder.display(), found);
        session.sequence_high_water = found;
    }
    session.sequence_high_water
}

fn folder_max(folder: &Path) -> u64 {
    let Ok(entries) = fs::read_dir(folder) else {
        return 0;
    };
    entries
        .flatten()
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .filter(|name| formats::is_supported_image(name))
        .filter_map(|name| trailing_number(&name))
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn extracts_trailing_digits() {
        assert_eq!(trailing_number("img_0007.jpg"), Some(7));
        assert_eq!(trailing_number("2024-01-01_0012.NEF"), Some(12));
        assert_eq!(trailing_number("2024-01-01_0001_3.jpg"), Some(3));
        assert_eq!(trailing_number("holiday.jpg"), None);
        assert_eq!(trailing_number("99999999999999999999999.jpg"), None);
    }

    #[test]
    fn counter_advances_per_base_name() {
        let mut counter = SequenceCounter::new(0);
        let seen: Vec<u64> = ["A", "A", "B", "A"].iter().map(|b| counter.advance(b)).collect();
        assert_eq!(seen, vec![1, 1, 2, 3]);
        assert_eq!(counter.value(), 3);
    }

    #[test]
    fn counter_stops_at_the_largest_number() {
        let mut counter = SequenceCounter::new(u64::MAX - 1);
        assert_eq!(counter.advance("A"), u64::MAX);
        assert_eq!(counter.advance("B"), u64::MAX);
        assert_eq!(counter.value(), u64::MAX);
    }

    #[test]
    fn missing_or_empty_folder_is_zero() {
        let dir = TempDir::new().unwrap();
        let mut session = SessionContext::new();
        assert_eq!(probe(&dir.path().join("nope"), &mut session), 0);
        assert_eq!(probe(dir.path(), &mut session), 0);
    }

    #[test]
    fn takes_max_over_supported_images() {
        let dir = TempDir::new().unwrap();
        for name in ["img_0007.jpg", "img_0012.png", "notes_0099.txt", "cover.jpg"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        fs::create_dir(dir.path().join("sub_0500.jpg")).unwrap();

        let mut session = SessionContext::new();
        assert_eq!(probe(dir.path(), &mut session), 12);
        assert_eq!(session.sequence_high_water, 12);
    }

    #[test]
    fn session_floor_wins_over_lower_folder() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("img_0003.jpg"), b"").unwrap();
        let mut session = SessionContext::new();
        session.raise_sequence(40);
        assert_eq!(probe(dir.path(), &mut session), 40);
        assert_eq!(probe(&dir.path().join("missing"), &mut session), 40);
    }
}
