use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{SettingsError, TemplateError};
use crate::ingest::{Destination, IngestOptions, SequenceStart};
use crate::session::SessionContext;
use crate::templates::TemplateStore;

const MAX_DESCRIPTIONS: usize = 50;

/// Persisted ingest configuration and counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub path_templates: TemplateStore,
    pub filename_templates: TemplateStore,
    pub selected_path_template: String,
    pub selected_filename_template: String,
    pub rename_files: bool,
    pub root_folder: Option<PathBuf>,
    pub manual_folder: Option<PathBuf>,
    pub use_manual_folder: bool,
    pub backup_folder: Option<PathBuf>,
    pub backup_enabled: bool,
    pub write_xmp: bool,
    pub verify_integrity: bool,
    pub combine_raw_jpg: bool,
    /// Persisted for the caller; this crate never ejects anything itself.
    pub auto_eject: bool,
    pub descriptions: Vec<String>,
    pub session: SessionContext,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            path_templates: TemplateStore::default_paths(),
            filename_templates: TemplateStore::default_filenames(),
            selected_path_template: "YYYY/YYYY-MM-DD".to_string(),
            selected_filename_template: "YYYY-MM-DD_XXXX".to_string(),
            rename_files: true,
            root_folder: None,
            manual_folder: None,
            use_manual_folder: false,
            backup_folder: None,
            backup_enabled: false,
            write_xmp: false,
            verify_integrity: true,
            combine_raw_jpg: true,
            auto_eject: false,
            descriptions: Vec::new(),
            session: SessionContext::default(),
        }
    }
}

impl Settings {
    pub fn default_path() -> Result<PathBuf, SettingsError> {
        dirs::config_dir()
            .map(|dir| dir.join("winnow").join("settings.json"))
            .ok_or(SettingsError::NoConfigDir)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        log::info!("Settings saved to: {}", path.display());
        Ok(())
    }

    /// Reads settings from `path`; a missing or unreadable file yields the
    /// defaults.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            log::info!("No settings file found. Using defaults.");
            return Self::default();
        }
        match std::fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(settings) => {
                    log::debug!("Settings loaded from: {}", path.display());
                    settings
                }
                Err(e) => {
                    log::warn!("Failed to parse settings file: {}. Using defaults.", e);
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("Failed to read settings file: {}. Using defaults.", e);
                Self::default()
            }
        }
    }

    /// Remembers a folder description for completion, most recent first.
    pub fn remember_description(&mut self, description: &str) {
        let description = description.trim();
        if description.is_empty() {
            return;
        }
        self.descriptions.retain(|d| d != description);
        self.descriptions.insert(0, description.to_string());
        self.descriptions.truncate(MAX_DESCRIPTIONS);
    }

    pub fn complete_description(&self, prefix: &str) -> Vec<&str> {
        let prefix = prefix.to_lowercase();
        self.descriptions
            .iter()
            .filter(|d| d.to_lowercase().starts_with(&prefix))
            .map(String::as_str)
            .collect()
    }

    /// Makes `root` the remembered root folder and switches back to
    /// templated destinations.
    pub fn select_root(&mut self, root: &Path) {
        self.root_folder = Some(root.to_path_buf());
        self.use_manual_folder = false;
    }

    /// Builds run options from the persisted selections. `root` overrides the
    /// stored root folder; a manual folder wins when it is enabled.
    pub fn ingest_options(
        &self,
        root: Option<&Path>,
        description: &str,
    ) -> Result<IngestOptions, TemplateError> {
        let destination = match (&self.manual_folder, self.use_manual_folder) {
            (Some(folder), true) => Destination::Manual(folder.clone()),
            _ => Destination::Template {
                root: root
                    .map(Path::to_path_buf)
                    .or_else(|| self.root_folder.clone())
                    .unwrap_or_default(),
                path_template: self.path_templates.get(&self.selected_path_template)?.to_string(),
                description: description.to_string(),
            },
        };

        let mut options = IngestOptions::new(destination)
            .starting_at(SequenceStart::Probe)
            .combine_raw_jpg(self.combine_raw_jpg)
            .write_xmp(self.write_xmp)
            .verify_integrity(self.verify_integrity);
        if self.rename_files {
            let template = self
                .filename_templates
                .get(&self.selected_filename_template)?;
            options = options.rename_with(template);
        }
        if self.backup_enabled
            && let Some(backup) = &self.backup_folder
        {
            options = options.backup_to(backup);
        }
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn round_trips_through_json_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let mut settings = Settings::default();
        settings.root_folder = Some(PathBuf::from("/photos"));
        settings.session.ingested_count = 12;
        settings.session.sequence_high_water = 99;
        settings.remember_description("Beach");
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path);
        assert_eq!(loaded.root_folder, Some(PathBuf::from("/photos")));
        assert_eq!(loaded.session.ingested_count, 12);
        // the sequence floor is session scoped
        assert_eq!(loaded.session.sequence_high_water, 0);
        assert_eq!(loaded.descriptions, vec!["Beach"]);
    }

    #[test]
    fn corrupt_or_partial_files_fall_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(Settings::load_from(&path), Settings::default());

        std::fs::write(&path, r#"{"write_xmp": true}"#).unwrap();
        let partial = Settings::load_from(&path);
        assert!(partial.write_xmp);
        assert_eq!(partial.filename_templates, TemplateStore::default_filenames());
    }

    #[test]
    fn builds_options_from_selection() {
        let mut settings = Settings::default();
        settings.backup_folder = Some(PathBuf::from("/backup"));
        settings.backup_enabled = true;
        let options = settings.ingest_options(Some(Path::new("/photos")), "Trip").unwrap();
        assert_eq!(options.filename_template.as_deref(), Some("{YYYY}-{MM}-{DD}_{XXXX}"));
        assert_eq!(options.backup_root, Some(PathBuf::from("/backup")));
        assert!(matches!(
            options.destination,
            Destination::Template { ref description, .. } if description == "Trip"
        ));

        settings.manual_folder = Some(PathBuf::from("/manual"));
        settings.use_manual_folder = true;
        settings.rename_files = false;
        let options = settings.ingest_options(None, "").unwrap();
        assert_eq!(options.destination, Destination::Manual(PathBuf::from("/manual")));
        assert_eq!(options.filename_template, None);

        settings.selected_path_template = "gone".into();
        settings.use_manual_folder = false;
        assert!(settings.ingest_options(None, "").is_err());
    }

    #[test]
    fn selected_root_is_persisted_and_leaves_manual_mode() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        let mut settings = Settings::default();
        settings.manual_folder = Some(PathBuf::from("/manual"));
        settings.use_manual_folder = true;

        settings.select_root(Path::new("/photos"));
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path);
        assert_eq!(loaded.root_folder, Some(PathBuf::from("/photos")));
        assert!(!loaded.use_manual_folder);
        let options = loaded.ingest_options(None, "").unwrap();
        assert!(matches!(
            options.destination,
            Destination::Template { ref root, .. } if root == Path::new("/photos")
        ));
    }

    #[test]
    fn descriptions_complete_case_insensitively() {
        let mut settings = Settings::default();
        for d in ["Beach", "birthday", "Alps", "beach"] {
            settings.remember_description(d);
        }
        assert_eq!(settings.complete_description("b"), vec!["beach", "birthday", "Beach"]);
    }
}
