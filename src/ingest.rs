//! The ingest run: copy a pick list into a templated destination folder,
//! renaming, verifying and writing sidecars along the way.
//!
//! A run has two phases. Pre-flight resolves the destination folder from the
//! first pick, checks free space and creates the folders; any failure there
//! is returned as an [`IngestError`] before a single file is touched. The
//! copy loop afterwards never fails as a whole: every per-file problem is
//! recorded in the [`IngestReport`] and the loop moves on.

use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use chrono::Local;

use crate::collision::ensure_unique_by;
use crate::error::IngestError;
use crate::formats;
use crate::metadata::{self, FileInfo, MetadataSource};
use crate::picks::{self, PickEntry, PickList};
use crate::sequence::{self, SequenceCounter};
use crate::session::SessionContext;
use crate::sidecar;
use crate::tokens;

pub type CancelFlag = Arc<AtomicBool>;

#[derive(Debug, Clone, PartialEq)]
pub enum Destination {
    /// `root` + resolved `path_template` + optional `_description`.
    Template {
        root: PathBuf,
        path_template: String,
        description: String,
    },
    /// A fixed folder chosen by the user.
    Manual(PathBuf),
}

impl Destination {
    pub fn root(&self) -> &Path {
        match self {
            Destination::Template { root, .. } => root,
            Destination::Manual(folder) => folder,
        }
    }

    /// The part of the destination below the root, resolved for `info`.
    pub fn subpath(&self, info: &FileInfo) -> PathBuf {
        let Destination::Template {
            path_template,
            description,
            ..
        } = self
        else {
            return PathBuf::new();
        };

        let resolved = tokens::resolve(info, path_template, 0);
        let resolved = resolved.trim_matches(|c: char| c == '/' || c == '\\');
        let description = description.trim();
        let joined = match (resolved.is_empty(), description.is_empty()) {
            (_, true) => resolved.to_string(),
            (true, false) => description.to_string(),
            (false, false) => format!("{}_{}", resolved, description),
        };
        joined
            .split(['/', '\\'])
            .filter(|segment| !segment.is_empty())
            .collect()
    }

    pub fn folder_for(&self, info: &FileInfo) -> PathBuf {
        self.root().join(self.subpath(info))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceStart {
    /// Continue after the highest number already in the destination folder.
    Probe,
    /// First file gets this number.
    Fixed(u64),
}

/// Everything a run needs to know, captured before it starts.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub destination: Destination,
    /// Backup copies go to the same sub-path below this root.
    pub backup_root: Option<PathBuf>,
    /// `None` keeps the original file names.
    pub filename_template: Option<String>,
    pub sequence_start: SequenceStart,
    pub combine_raw_jpg: bool,
    pub write_xmp: bool,
    pub verify_integrity: bool,
    pub cancel: CancelFlag,
}

impl IngestOptions {
    pub fn new(destination: Destination) -> Self {
        Self {
            destination,
            backup_root: None,
            filename_template: None,
            sequence_start: SequenceStart::Probe,
            combine_raw_jpg: false,
            write_xmp: false,
            verify_integrity: false,
            cancel: CancelFlag::default(),
        }
    }

    pub fn backup_to(mut self, root: impl Into<PathBuf>) -> Self {
        self.backup_root = Some(root.into());
        self
    }

    pub fn rename_with(mut self, template: impl Into<String>) -> Self {
        self.filename_template = Some(template.into());
        self
    }

    pub fn starting_at(mut self, start: SequenceStart) -> Self {
        self.sequence_start = start;
        self
    }

    pub fn combine_raw_jpg(mut self, on: bool) -> Self {
        self.combine_raw_jpg = on;
        self
    }

    pub fn write_xmp(mut self, on: bool) -> Self {
        self.write_xmp = on;
        self
    }

    pub fn verify_integrity(mut self, on: bool) -> Self {
        self.verify_integrity = on;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    pub destination: PathBuf,
    pub backup_destination: Option<PathBuf>,
    pub files_copied: u64,
    pub bytes_written: u64,
    pub failed_copies: Vec<String>,
    pub integrity_failures: Vec<String>,
    pub cancelled: bool,
    pub last_sequence: u64,
}

impl IngestReport {
    pub fn has_failures(&self) -> bool {
        !self.failed_copies.is_empty() || !self.integrity_failures.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedCopy {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub backup: Option<PathBuf>,
}

/// Hooks the caller uses to show progress and update its own model.
/// Every method has an empty default.
pub trait IngestObserver {
    fn file_started(&mut self, _index: usize, _total: usize, _source: &Path) {}
    fn progress(&mut self, _bytes_written: u64, _total_bytes: u64, _bytes_per_sec: f64) {}
    /// The primary copy of `source` succeeded; the caller may clear its pick.
    fn file_ingested(&mut self, _source: &Path, _destination: &Path) {}
    fn last_folder(&mut self, _folder: &Path) {}
    fn finished(&mut self, _report: &IngestReport) {}
}

impl IngestObserver for () {}

pub trait SpaceProbe: Send + Sync {
    fn available(&self, path: &Path) -> io::Result<u64>;
}

/// Free space as reported by the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct Fs2Space;

impl SpaceProbe for Fs2Space {
    fn available(&self, path: &Path) -> io::Result<u64> {
        fs2::available_space(path)
    }
}

/// Closest ancestor of `path` that exists. The empty ancestor of a relative
/// path stands for the current directory.
fn nearest_existing(path: &Path) -> &Path {
    path.ancestors()
        .map(|p| if p.as_os_str().is_empty() { Path::new(".") } else { p })
        .find(|p| p.exists())
        .unwrap_or(Path::new("."))
}

fn hash_file(path: &Path) -> io::Result<blake3::Hash> {
    let mut hasher = blake3::Hasher::new();
    io::copy(&mut File::open(path)?, &mut hasher)?;
    Ok(hasher.finalize())
}

fn same_content(a: &Path, b: &Path) -> io::Result<bool> {
    Ok(hash_file(a)? == hash_file(b)?)
}

/// Names handed out in one folder during a run, and which source owns each
/// sidecar name.
#[derive(Default)]
struct Claims {
    issued: HashSet<PathBuf>,
    sidecars: HashMap<PathBuf, PathBuf>,
}

impl Claims {
    /// A candidate is free when nothing sits on it, this run has not issued
    /// it, and its sidecar name is either unused or already belongs to the
    /// same source (a raw+jpg pair).
    fn take(
        &mut self,
        folder: &Path,
        stem: &str,
        suffix: &str,
        owner: &Path,
        xmp: bool,
    ) -> (PathBuf, String) {
        let (path, name) = ensure_unique_by(folder, stem, suffix, |path| {
            if path.exists() || self.issued.contains(path) {
                return true;
            }
            if !xmp {
                return false;
            }
            let xmp_path = sidecar::sidecar_path(path);
            match self.sidecars.get(&xmp_path) {
                Some(claimed_by) => claimed_by != owner,
                None => xmp_path.exists(),
            }
        });
        self.issued.insert(path.clone());
        if xmp {
            self.sidecars
                .insert(sidecar::sidecar_path(&path), owner.to_path_buf());
        }
        (path, name)
    }
}

/// Sequence numbering and collision handling for one run.
struct Namer<'a> {
    template: Option<&'a str>,
    counter: SequenceCounter,
    xmp: bool,
    primary: Claims,
    backup: Claims,
}

impl<'a> Namer<'a> {
    fn new(options: &'a IngestOptions, seed: u64) -> Self {
        Self {
            template: options.filename_template.as_deref(),
            counter: SequenceCounter::new(seed),
            xmp: options.write_xmp,
            primary: Claims::default(),
            backup: Claims::default(),
        }
    }

    /// Destination (and backup) path for the next pick. The counter moves
    /// only when the base name changes, so a raw file and its jpg share a
    /// number.
    fn next(
        &mut self,
        info: &FileInfo,
        folder: &Path,
        backup: Option<&Path>,
    ) -> (PathBuf, Option<PathBuf>) {
        let base = info.base_name();
        let sequence = self.counter.advance(&base);

        let stem = match self.template {
            Some(template) => {
                let resolved = tokens::resolve(info, template, sequence);
                if resolved.trim().is_empty() {
                    log::warn!(
                        "Template resolved to nothing for {}, keeping its name",
                        info.path.display()
                    );
                    base
                } else {
                    resolved
                }
            }
            None => base,
        };

        // the pair partner has the same path minus its extension
        let owner = info.path.with_extension("");
        let suffix = formats::suffix(&info.path);
        let (path, name) = self.primary.take(folder, &stem, &suffix, &owner, self.xmp);

        let backup_path = backup.map(|backup_folder| {
            let (backup_path, _) =
                self.backup.take(backup_folder, &name, &suffix, &owner, self.xmp);
            backup_path
        });
        (path, backup_path)
    }
}

struct Prepared {
    picks: PickList,
    infos: HashMap<PathBuf, FileInfo>,
    folder: PathBuf,
    backup_folder: Option<PathBuf>,
}

#[derive(Clone)]
pub struct IngestExecutor {
    metadata: Arc<dyn MetadataSource>,
    space: Arc<dyn SpaceProbe>,
}

impl IngestExecutor {
    pub fn new(metadata: Arc<dyn MetadataSource>) -> Self {
        Self {
            metadata,
            space: Arc::new(Fs2Space),
        }
    }

    pub fn with_space_probe(mut self, space: Arc<dyn SpaceProbe>) -> Self {
        self.space = space;
        self
    }

    fn prepare(
        &self,
        picks: &[PickEntry],
        options: &IngestOptions,
    ) -> Result<Prepared, IngestError> {
        if picks.is_empty() {
            return Err(IngestError::NoPicks);
        }
        let picks = if options.combine_raw_jpg {
            picks::expand_raw_jpg_pairs(picks)
        } else {
            picks.to_vec()
        };

        let infos = metadata::load_all(self.metadata.as_ref(), &picks);
        let first = infos
            .get(&picks[0].path)
            .cloned()
            .unwrap_or_else(|| FileInfo::new(&picks[0].path));
        let folder = options.destination.folder_for(&first);
        let backup_folder = options
            .backup_root
            .as_ref()
            .map(|root| root.join(options.destination.subpath(&first)));

        Ok(Prepared {
            picks,
            infos,
            folder,
            backup_folder,
        })
    }

    fn seed(&self, options: &IngestOptions, folder: &Path, session: &mut SessionContext) -> u64 {
        match options.sequence_start {
            SequenceStart::Probe => sequence::probe(folder, session),
            SequenceStart::Fixed(start) => start.saturating_sub(1),
        }
    }

    fn check_space(&self, folder: &Path, required: u64) -> Result<(), IngestError> {
        let existing = nearest_existing(folder);
        let available = self.space.available(existing)?;
        if available < required {
            return Err(IngestError::InsufficientSpace {
                path: existing.to_path_buf(),
                required,
                available,
            });
        }
        Ok(())
    }

    fn create_folder(folder: &Path) -> Result<(), IngestError> {
        fs::create_dir_all(folder).map_err(|source| IngestError::CreateFolder {
            path: folder.to_path_buf(),
            source,
        })
    }

    /// Where every pick would go, without touching the disk or the session.
    pub fn plan(
        &self,
        picks: &[PickEntry],
        options: &IngestOptions,
        session: &SessionContext,
    ) -> Result<Vec<PlannedCopy>, IngestError> {
        let prepared = self.prepare(picks, options)?;
        let mut scratch = session.clone();
        let seed = self.seed(options, &prepared.folder, &mut scratch);
        let mut namer = Namer::new(options, seed);

        Ok(prepared
            .picks
            .iter()
            .map(|pick| {
                let info = prepared
                    .infos
                    .get(&pick.path)
                    .cloned()
                    .unwrap_or_else(|| FileInfo::new(&pick.path));
                let (destination, backup) =
                    namer.next(&info, &prepared.folder, prepared.backup_folder.as_deref());
                PlannedCopy {
                    source: pick.path.clone(),
                    destination,
                    backup,
                }
            })
            .collect())
    }

    pub fn run(
        &self,
        picks: &[PickEntry],
        options: &IngestOptions,
        session: &mut SessionContext,
        observer: &mut dyn IngestObserver,
    ) -> Result<IngestReport, IngestError> {
        let prepared = self.prepare(picks, options)?;
        let total_bytes = picks::total_bytes(&prepared.picks);

        self.check_space(&prepared.folder, total_bytes)?;
        if let Some(backup) = &prepared.backup_folder {
            self.check_space(backup, total_bytes)?;
        }
        Self::create_folder(&prepared.folder)?;
        if let Some(backup) = &prepared.backup_folder {
            Self::create_folder(backup)?;
        }

        let seed = self.seed(options, &prepared.folder, session);
        log::info!(
            "Ingesting {} files ({} bytes) into {}",
            prepared.picks.len(),
            total_bytes,
            prepared.folder.display()
        );

        let mut report = IngestReport {
            destination: prepared.folder.clone(),
            backup_destination: prepared.backup_folder.clone(),
            ..IngestReport::default()
        };
        let mut namer = Namer::new(options, seed);
        let mut sidecars: HashSet<PathBuf> = HashSet::new();
        let copies = if prepared.backup_folder.is_some() { 2 } else { 1 };
        let progress_total = total_bytes * copies;
        let started = Instant::now();
        let total = prepared.picks.len();

        for (index, pick) in prepared.picks.iter().enumerate() {
            if options.cancel.load(Ordering::SeqCst) {
                log::info!("Ingest cancelled after {} of {} files", index, total);
                report.cancelled = true;
                break;
            }
            observer.file_started(index, total, &pick.path);

            let info = prepared
                .infos
                .get(&pick.path)
                .cloned()
                .unwrap_or_else(|| FileInfo::new(&pick.path));
            let (dest, backup_dest) =
                namer.next(&info, &prepared.folder, prepared.backup_folder.as_deref());
            log::debug!("{} -> {}", pick.path.display(), dest.display());

            let primary_ok = copy_one(&pick.path, &dest, options.verify_integrity, &mut report);
            if primary_ok {
                report.files_copied += 1;
                observer.file_ingested(&pick.path, &dest);
            }
            let backup_ok = backup_dest.as_deref().is_some_and(|backup| {
                copy_one(&pick.path, backup, options.verify_integrity, &mut report)
            });

            if options.write_xmp && primary_ok {
                write_sidecar(&pick.path, &info, &dest, &mut sidecars, &mut report);
                if backup_ok && let Some(backup) = &backup_dest {
                    write_sidecar(&pick.path, &info, backup, &mut sidecars, &mut report);
                }
            }

            let elapsed = started.elapsed().as_secs_f64().max(1e-3);
            observer.progress(
                report.bytes_written,
                progress_total,
                report.bytes_written as f64 / elapsed,
            );
        }

        report.last_sequence = namer.counter.value();
        session.raise_sequence(report.last_sequence);
        session.record_ingest(report.files_copied, Local::now().date_naive());
        session.push_folder(&prepared.folder);
        observer.last_folder(&prepared.folder);

        if report.has_failures() {
            log::warn!(
                "Ingest finished with {} failed copies and {} integrity failures",
                report.failed_copies.len(),
                report.integrity_failures.len()
            );
        } else {
            log::info!("Ingested {} files into {}", report.files_copied, prepared.folder.display());
        }
        observer.finished(&report);
        Ok(report)
    }
}

/// Copies and optionally verifies one file. Returns whether the copy is
/// usable; failures are appended to the report.
fn copy_one(source: &Path, dest: &Path, verify: bool, report: &mut IngestReport) -> bool {
    match fs::copy(source, dest) {
        Ok(bytes) => {
            report.bytes_written += bytes;
            if verify {
                verify_copy(source, dest, report);
            }
            true
        }
        Err(e) => {
            log::warn!("Failed to copy {} to {}: {}", source.display(), dest.display(), e);
            report
                .failed_copies
                .push(format!("{} -> {} ({})", source.display(), dest.display(), e));
            false
        }
    }
}

/// Compares the copy against its source and records a mismatch or an
/// unreadable file as an integrity failure.
fn verify_copy(source: &Path, dest: &Path, report: &mut IngestReport) -> bool {
    match same_content(source, dest) {
        Ok(true) => true,
        Ok(false) => {
            log::warn!("Integrity check failed for {}", dest.display());
            report
                .integrity_failures
                .push(format!("{} -> {}", source.display(), dest.display()));
            false
        }
        Err(e) => {
            log::warn!("Cannot verify {}: {}", dest.display(), e);
            report
                .integrity_failures
                .push(format!("{} -> {} ({})", source.display(), dest.display(), e));
            false
        }
    }
}

fn write_sidecar(
    source: &Path,
    info: &FileInfo,
    dest: &Path,
    written: &mut HashSet<PathBuf>,
    report: &mut IngestReport,
) {
    let target = sidecar::sidecar_path(dest);
    // raw+jpg pairs share one sidecar
    if written.contains(&target) {
        return;
    }
    if target.exists() {
        log::warn!("Not overwriting existing sidecar {}", target.display());
        report
            .failed_copies
            .push(format!("{} (sidecar already exists)", target.display()));
        return;
    }
    match sidecar::export(source, info, dest) {
        Ok(path) => {
            written.insert(path);
        }
        Err(e) => {
            log::warn!("Failed to write sidecar {}: {}", target.display(), e);
            report
                .failed_copies
                .push(format!("{} ({})", target.display(), e));
        }
    }
}

/// Progress of a background run, in the order the observer hooks fire.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestEvent {
    Started { index: usize, total: usize, source: PathBuf },
    Progress { bytes_written: u64, total_bytes: u64, bytes_per_sec: f64 },
    Ingested { source: PathBuf, destination: PathBuf },
    LastFolder(PathBuf),
    Finished,
}

struct ChannelObserver(Sender<IngestEvent>);

impl IngestObserver for ChannelObserver {
    fn file_started(&mut self, index: usize, total: usize, source: &Path) {
        let _ = self.0.send(IngestEvent::Started {
            index,
            total,
            source: source.to_path_buf(),
        });
    }

    fn progress(&mut self, bytes_written: u64, total_bytes: u64, bytes_per_sec: f64) {
        let _ = self.0.send(IngestEvent::Progress {
            bytes_written,
            total_bytes,
            bytes_per_sec,
        });
    }

    fn file_ingested(&mut self, source: &Path, destination: &Path) {
        let _ = self.0.send(IngestEvent::Ingested {
            source: source.to_path_buf(),
            destination: destination.to_path_buf(),
        });
    }

    fn last_folder(&mut self, folder: &Path) {
        let _ = self.0.send(IngestEvent::LastFolder(folder.to_path_buf()));
    }

    fn finished(&mut self, _report: &IngestReport) {
        let _ = self.0.send(IngestEvent::Finished);
    }
}

pub type BackgroundResult = (SessionContext, Result<IngestReport, IngestError>);

/// A run on its own thread. The session is handed over and comes back with
/// the result from [`BackgroundIngest::join`].
pub struct BackgroundIngest {
    pub events: Receiver<IngestEvent>,
    cancel: CancelFlag,
    handle: JoinHandle<BackgroundResult>,
}

impl BackgroundIngest {
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn join(self) -> thread::Result<BackgroundResult> {
        self.handle.join()
    }
}

pub fn spawn_background(
    executor: IngestExecutor,
    picks: PickList,
    options: IngestOptions,
    mut session: SessionContext,
) -> BackgroundIngest {
    let (tx, rx) = mpsc::channel();
    let cancel = options.cancel.clone();
    let handle = thread::spawn(move || {
        let mut observer = ChannelObserver(tx);
        let result = executor.run(&picks, &options, &mut session, &mut observer);
        (session, result)
    });
    BackgroundIngest {
        events: rx,
        cancel,
        handle,
    }
}
