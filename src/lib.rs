pub mod collision;
pub mod error;
pub mod formats;
pub mod ingest;
pub mod metadata;
pub mod picks;
pub mod rename;
pub mod sequence;
pub mod session;
pub mod settings;
pub mod sidecar;
pub mod templates;
pub mod tokens;

pub use collision::ensure_unique;
pub use error::{IngestError, SettingsError, TemplateError};
pub use ingest::{
    CancelFlag, Destination, Fs2Space, IngestEvent, IngestExecutor, IngestObserver,
    IngestOptions, IngestReport, PlannedCopy, SequenceStart, SpaceProbe, spawn_background,
};
pub use metadata::{ExifToolSource, FileInfo, FsMetadataSource, MetadataSource};
pub use picks::{PickEntry, PickList};
pub use rename::{RenameReport, rename_files};
pub use sequence::probe;
pub use session::SessionContext;
pub use settings::Settings;
pub use templates::TemplateStore;
pub use tokens::resolve;
