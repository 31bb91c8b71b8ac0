use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const MAX_FOLDER_HISTORY: usize = 20;

/// State that outlives a single ingest: the sequence high-water mark, the
/// ingest counters and the folder history.
///
/// One context is created per application session (or loaded from
/// [`crate::Settings`]) and passed by `&mut` into every probe and run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionContext {
    /// Highest sequence number issued so far. Not persisted: it only guards
    /// against reusing numbers within one session.
    #[serde(skip)]
    pub sequence_high_water: u64,
    pub ingested_count: u64,
    pub last_ingest: Option<NaiveDate>,
    pub folder_history: Vec<PathBuf>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets the session-scoped sequence state. Persisted counters are kept.
    pub fn reset_sequence(&mut self) {
        self.sequence_high_water = 0;
    }

    pub fn raise_sequence(&mut self, value: u64) {
        self.sequence_high_water = self.sequence_high_water.max(value);
    }

    /// Moves `folder` to the front of the history, dropping duplicates and
    /// the oldest entries past [`MAX_FOLDER_HISTORY`].
    pub fn push_folder(&mut self, folder: &Path) {
        self.folder_history.retain(|f| f != folder);
        self.folder_history.insert(0, folder.to_path_buf());
        self.folder_history.truncate(MAX_FOLDER_HISTORY);
    }

    pub fn record_ingest(&mut self, files: u64, date: NaiveDate) {
        self.ingested_count += files;
        self.last_ingest = Some(date);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_history_is_most_recent_first_without_duplicates() {
        let mut session = SessionContext::new();
        session.push_folder(Path::new("/a"));
        session.push_folder(Path::new("/b"));
        session.push_folder(Path::new("/a"));
        assert_eq!(session.folder_history, vec![PathBuf::from("/a"), PathBuf::from("/b")]);

        for i in 0..30 {
            session.push_folder(Path::new(&format!("/f{}", i)));
        }
        assert_eq!(session.folder_history.len(), MAX_FOLDER_HISTORY);
        assert_eq!(session.folder_history[0], PathBuf::from("/f29"));
    }

    #[test]
    fn sequence_high_water_only_rises() {
        let mut session = SessionContext::new();
        session.raise_sequence(12);
        session.raise_sequence(3);
        assert_eq!(session.sequence_high_water, 12);
        session.reset_sequence();
        assert_eq!(session.sequence_high_water, 0);
    }
}
