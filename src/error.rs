use std::path::PathBuf;

/// Failures that stop an ingest before any file is copied.
///
/// Per-file problems during a run are never reported through this type; they
/// are collected as strings in [`crate::IngestReport`].
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Nothing to ingest: the pick list is empty")]
    NoPicks,

    #[error(
        "Insufficient space on {}: {required} bytes required, {available} bytes available",
        .path.display()
    )]
    InsufficientSpace {
        path: PathBuf,
        required: u64,
        available: u64,
    },

    #[error("Cannot create folder {}: {source}", .path.display())]
    CreateFolder {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Could not determine the user configuration directory")]
    NoConfigDir,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Template not found: {0}")]
    UnknownTemplate(String),

    #[error("A template named {0} already exists")]
    DuplicateName(String),

    #[error("Template names cannot be empty")]
    EmptyName,
}
