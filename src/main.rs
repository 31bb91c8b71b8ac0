use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use winnow_ingest::ingest::{BackgroundIngest, IngestEvent};
use winnow_ingest::{
    Destination, ExifToolSource, FsMetadataSource, IngestExecutor, IngestObserver, IngestReport,
    MetadataSource, SequenceStart, SessionContext, Settings, picks, rename_files, spawn_background,
    tokens,
};

#[derive(Parser)]
#[command(
    name = "winnow",
    author,
    version,
    about = "Ingest picked photos into templated folders",
    long_about = None
)]
struct Cli {
    /// Settings file (defaults to the user config directory)
    #[arg(long, global = true, value_name = "FILE")]
    settings: Option<PathBuf>,
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy the images in a folder (or single files) into the destination
    Ingest {
        /// Source folders or image files
        #[arg(required = true)]
        sources: Vec<PathBuf>,
        /// Root folder for the path template
        #[arg(long, value_name = "DIR")]
        root: Option<PathBuf>,
        /// Name of the path template to use
        #[arg(long, value_name = "NAME")]
        path_template: Option<String>,
        /// Name of the filename template to use
        #[arg(long, value_name = "NAME")]
        file_template: Option<String>,
        /// Appended to the destination folder name
        #[arg(short, long, default_value = "")]
        description: String,
        /// Copy into this folder instead of root + template
        #[arg(long, value_name = "DIR")]
        manual: Option<PathBuf>,
        /// Also copy everything below this backup root
        #[arg(long, value_name = "DIR")]
        backup: Option<PathBuf>,
        /// Write or copy XMP sidecars
        #[arg(long)]
        xmp: bool,
        /// Verify every copy against its source
        #[arg(long)]
        verify: bool,
        /// First sequence number (default: continue after the destination's highest)
        #[arg(long, value_name = "N")]
        start: Option<u64>,
        /// Bring along the raw or jpg companion of every picked file
        #[arg(long)]
        combine_raw_jpg: bool,
        /// Keep original file names
        #[arg(long)]
        keep_names: bool,
        /// Print the destination of every file without copying
        #[arg(long)]
        dry_run: bool,
        /// Copy on a worker thread
        #[arg(long)]
        background: bool,
        /// Read dates from the file system instead of exiftool
        #[arg(long)]
        fs_metadata: bool,
    },
    /// Rename files in place with a filename template
    Rename {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Name of the filename template to use
        #[arg(long, value_name = "NAME")]
        template: String,
        #[arg(long, default_value_t = 1)]
        start: u64,
        #[arg(long)]
        fs_metadata: bool,
    },
    /// Edit the named templates
    Templates {
        #[command(subcommand)]
        action: TemplateAction,
    },
    /// List previously used destination folders and ingest counters
    History,
    /// List the tokens templates can use
    Tokens,
}

#[derive(Subcommand)]
enum TemplateAction {
    List,
    Set {
        #[arg(value_enum)]
        kind: TemplateKind,
        name: String,
        template: String,
    },
    Rename {
        #[arg(value_enum)]
        kind: TemplateKind,
        from: String,
        to: String,
    },
    Remove {
        #[arg(value_enum)]
        kind: TemplateKind,
        name: String,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum TemplateKind {
    Path,
    File,
}

fn progress_style(label: &str) -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(&format!(
            "{{spinner:.green}} [{{elapsed_precise}}] [{{wide_bar:.cyan/blue}}] {{bytes}}/{{total_bytes}} ({{binary_bytes_per_sec}}, {{eta}}) {}",
            label
        ))
        .expect("Failed to set progress bar style")
}

struct BarObserver {
    pb: ProgressBar,
}

impl IngestObserver for BarObserver {
    fn progress(&mut self, bytes_written: u64, total_bytes: u64, _bytes_per_sec: f64) {
        self.pb.set_length(total_bytes);
        self.pb.set_position(bytes_written);
    }

    fn last_folder(&mut self, folder: &Path) {
        self.pb.set_message(folder.display().to_string());
    }

    fn finished(&mut self, report: &IngestReport) {
        self.pb
            .finish_with_message(format!("{} files copied", report.files_copied));
    }
}

fn metadata_source(fs_only: bool) -> Arc<dyn MetadataSource> {
    let exiftool = ExifToolSource::default();
    if !fs_only && exiftool.is_available() {
        Arc::new(exiftool)
    } else {
        if !fs_only {
            log::warn!("exiftool not found; using file times for dates");
        }
        Arc::new(FsMetadataSource)
    }
}

fn collect_picks(sources: &[PathBuf]) -> picks::PickList {
    let mut list = Vec::new();
    for source in sources {
        if source.is_dir() {
            list.extend(picks::collect_from_folder(source));
        } else {
            match picks::PickEntry::from_path(source) {
                Ok(entry) => list.push(entry),
                Err(e) => log::warn!("Skipping {}: {}", source.display(), e),
            }
        }
    }
    list
}

fn print_report(report: &IngestReport) {
    println!(
        "Copied {} files ({} bytes) to {}",
        report.files_copied,
        report.bytes_written,
        report.destination.display()
    );
    if let Some(backup) = &report.backup_destination {
        println!("Backup in {}", backup.display());
    }
    if report.cancelled {
        println!("Ingest was cancelled before all files were copied.");
    }
    if !report.failed_copies.is_empty() {
        println!("Failed to copy {} files:", report.failed_copies.len());
        for failure in &report.failed_copies {
            println!("  {}", failure);
        }
    }
    if !report.integrity_failures.is_empty() {
        println!("Integrity check failed for {} files:", report.integrity_failures.len());
        for failure in &report.integrity_failures {
            println!("  {}", failure);
        }
    }
}

fn wait_for_background(
    job: BackgroundIngest,
    pb: &ProgressBar,
) -> Result<(SessionContext, IngestReport), Box<dyn std::error::Error>> {
    for event in job.events.iter() {
        match event {
            IngestEvent::Progress {
                bytes_written,
                total_bytes,
                ..
            } => {
                pb.set_length(total_bytes);
                pb.set_position(bytes_written);
            }
            IngestEvent::Started { source, .. } => {
                pb.set_message(source.display().to_string());
            }
            IngestEvent::Finished => break,
            IngestEvent::Ingested { .. } | IngestEvent::LastFolder(_) => {}
        }
    }
    let (session, result) = job.join().map_err(|_| "ingest worker panicked")?;
    pb.finish_and_clear();
    Ok((session, result?))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(Some(env_logger::fmt::TimestampPrecision::Seconds))
        .init();

    let settings_path = match cli.settings {
        Some(path) => path,
        None => Settings::default_path()?,
    };
    let mut settings = Settings::load_from(&settings_path);

    match cli.command {
        Commands::Ingest {
            sources,
            root,
            path_template,
            file_template,
            description,
            manual,
            backup,
            xmp,
            verify,
            start,
            combine_raw_jpg,
            keep_names,
            dry_run,
            background,
            fs_metadata,
        } => {
            if let Some(name) = path_template {
                settings.selected_path_template = name;
            }
            if let Some(name) = file_template {
                settings.selected_filename_template = name;
            }
            if let Some(folder) = &root {
                settings.select_root(folder);
            }
            if let Some(folder) = manual {
                settings.manual_folder = Some(folder);
                settings.use_manual_folder = true;
            }
            if let Some(folder) = backup {
                settings.backup_folder = Some(folder);
                settings.backup_enabled = true;
            }
            settings.write_xmp |= xmp;
            settings.verify_integrity |= verify;
            settings.combine_raw_jpg |= combine_raw_jpg;
            if keep_names {
                settings.rename_files = false;
            }

            let mut options = settings.ingest_options(root.as_deref(), &description)?;
            if let Destination::Template { root, .. } = &options.destination
                && root.as_os_str().is_empty()
            {
                return Err("No root folder: pass --root or --manual".into());
            }
            if let Some(n) = start {
                options = options.starting_at(SequenceStart::Fixed(n));
            }

            let pick_list = collect_picks(&sources);
            let executor = IngestExecutor::new(metadata_source(fs_metadata));

            if dry_run {
                for planned in executor.plan(&pick_list, &options, &settings.session)? {
                    let source = planned.source.display().to_string();
                    println!("{} -> {}", source, planned.destination.display());
                    if let Some(backup) = planned.backup {
                        println!("{}    backup {}", " ".repeat(source.len()), backup.display());
                    }
                }
                return Ok(());
            }

            let pb = ProgressBar::new(picks::total_bytes(&pick_list));
            pb.set_style(progress_style("Ingesting..."));

            let report = if background {
                let job = spawn_background(executor, pick_list, options, settings.session.clone());
                let (session, report) = wait_for_background(job, &pb)?;
                settings.session = session;
                report
            } else {
                let mut observer = BarObserver { pb };
                executor.run(&pick_list, &options, &mut settings.session, &mut observer)?
            };

            settings.remember_description(&description);
            settings.save_to(&settings_path)?;
            print_report(&report);
            if settings.auto_eject {
                println!("Auto-eject is on: the source volume can now be ejected.");
            }
            if report.has_failures() {
                std::process::exit(1);
            }
        }
        Commands::Rename {
            files,
            template,
            start,
            fs_metadata,
        } => {
            let template = settings.filename_templates.get(&template)?.to_string();
            let source = metadata_source(fs_metadata);
            let report = rename_files(&files, &template, start, source.as_ref());
            for (from, to) in &report.renamed {
                println!("{} -> {}", from.display(), to.display());
            }
            for failure in &report.failures {
                println!("Failed: {}", failure);
            }
            if !report.failures.is_empty() {
                std::process::exit(1);
            }
        }
        Commands::Templates { action } => {
            match action {
                TemplateAction::List => {
                    println!("Path templates:");
                    for (name, template) in settings.path_templates.iter() {
                        let selected = name == settings.selected_path_template;
                        println!(" {} {:<24} {}", if selected { "*" } else { " " }, name, template);
                    }
                    println!("Filename templates:");
                    for (name, template) in settings.filename_templates.iter() {
                        let selected = name == settings.selected_filename_template;
                        println!(" {} {:<24} {}", if selected { "*" } else { " " }, name, template);
                    }
                    return Ok(());
                }
                TemplateAction::Set {
                    kind,
                    name,
                    template,
                } => {
                    let store = match kind {
                        TemplateKind::Path => &mut settings.path_templates,
                        TemplateKind::File => &mut settings.filename_templates,
                    };
                    for unknown in store.set(&name, &template)? {
                        println!(
                            "Warning: {{{}}} is not a token and will be kept as text",
                            unknown
                        );
                    }
                    if matches!(kind, TemplateKind::File) && !tokens::uses_sequence(&template) {
                        println!(
                            "Warning: {} has no sequence token, repeated names get _N suffixes",
                            name
                        );
                    }
                }
                TemplateAction::Rename { kind, from, to } => {
                    let (store, selected) = match kind {
                        TemplateKind::Path => (
                            &mut settings.path_templates,
                            &mut settings.selected_path_template,
                        ),
                        TemplateKind::File => (
                            &mut settings.filename_templates,
                            &mut settings.selected_filename_template,
                        ),
                    };
                    store.rename(&from, &to)?;
                    if *selected == from {
                        *selected = to;
                    }
                }
                TemplateAction::Remove { kind, name } => {
                    let store = match kind {
                        TemplateKind::Path => &mut settings.path_templates,
                        TemplateKind::File => &mut settings.filename_templates,
                    };
                    store.remove(&name)?;
                }
            }
            settings.save_to(&settings_path)?;
        }
        Commands::History => {
            let session = &settings.session;
            println!("Files ingested: {}", session.ingested_count);
            match session.last_ingest {
                Some(date) => println!("Last ingest: {}", date),
                None => println!("Last ingest: never"),
            }
            for folder in &session.folder_history {
                println!("  {}", folder.display());
            }
        }
        Commands::Tokens => {
            for token in tokens::TOKENS {
                println!("{{{}}}", token);
            }
        }
    }

    Ok(())
}
