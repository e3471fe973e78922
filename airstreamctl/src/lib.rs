mod commands;

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use airstream_core::catalog::CatalogError;
use airstream_core::relay::check_relay;
use airstream_core::{
    load_streamer_config, CatalogEntry, ConfigError, DirectoryCatalog, FileCatalog,
    PlaylistArchive, PlaylistError, ScheduleError, ScheduleWindow, StreamError, StreamerConfig,
};
use chrono::Local;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use serde::Serialize;
use thiserror::Error;

pub use commands::plan::{PlanPreview, PlannedGroup};
pub use commands::run::{RunArgs, RunSummary};

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("playlist error: {0}")]
    Playlist(#[from] PlaylistError),
    #[error("schedule error: {0}")]
    Schedule(#[from] ScheduleError),
    #[error("stream error: {0}")]
    Stream(#[from] StreamError),
    #[error("relay {host}:{port} is not accepting connections")]
    RelayUnreachable { host: String, port: u16 },
    #[error("audio folder structure is invalid: {0}")]
    CatalogInvalid(PathBuf),
    #[error("{0} stream group(s) failed")]
    StreamsFailed(usize),
    #[error("required resource missing: {0}")]
    MissingResource(String),
    #[error("cancelled by termination request")]
    Cancelled,
}

impl AppError {
    /// Process exit status: 130 for a termination request, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Cancelled
            | AppError::Schedule(ScheduleError::Cancelled)
            | AppError::Stream(StreamError::Cancelled) => 130,
            _ => 1,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Scheduled multi-channel audio relay control", long_about = None)]
pub struct Cli {
    /// Path to airstream.toml
    #[arg(long, default_value = "configs/airstream.toml")]
    pub config: PathBuf,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    /// Log filter (e.g. `debug`), takes precedence over RUST_LOG
    #[arg(long)]
    pub log_level: Option<String>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate the configuration and the audio folder structure
    Validate,
    /// List catalogued audio files with their parsed location
    Catalog,
    /// Preview stream groups without writing playlists
    Plan,
    /// Generate playlists and stream them to the relay
    Run(RunArgs),
    /// List pending and already streamed playlists
    Status,
    /// Check folders, schedule and relay reachability
    Health,
    /// Print shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

pub fn run(cli: Cli) -> Result<()> {
    if let Commands::Completions { shell } = &cli.command {
        let mut command = Cli::command();
        clap_complete::generate(*shell, &mut command, "airstreamctl", &mut io::stdout());
        return Ok(());
    }

    let context = AppContext::new(&cli)?;
    match &cli.command {
        Commands::Validate => {
            let report = context.validate()?;
            render(&report, cli.format)?;
            if !report.scan_ok {
                return Err(AppError::CatalogInvalid(report.audio_dir));
            }
        }
        Commands::Catalog => {
            let listing = context.catalog_listing()?;
            render(&listing, cli.format)?;
        }
        Commands::Plan => {
            let preview = commands::plan::preview(&context.config)?;
            render(&preview, cli.format)?;
        }
        Commands::Run(args) => {
            let summary = commands::run::execute(&context.config, args)?;
            render(&summary, cli.format)?;
            if summary.cancelled {
                return Err(AppError::Cancelled);
            }
            let failed = summary.failed();
            if failed > 0 {
                return Err(AppError::StreamsFailed(failed));
            }
        }
        Commands::Status => {
            let status = context.playlist_status()?;
            render(&status, cli.format)?;
        }
        Commands::Health => {
            let report = context.health_check()?;
            render(&report, cli.format)?;
            if report
                .iter()
                .any(|entry| matches!(entry.status, CheckStatus::Error))
            {
                return Err(AppError::MissingResource(
                    "one or more checks failed".to_string(),
                ));
            }
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}

fn render<T>(value: &T, format: OutputFormat) -> Result<()>
where
    T: Serialize + DisplayFallback,
{
    match format {
        OutputFormat::Text => {
            println!("{}", value.display());
            Ok(())
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{}", json);
            Ok(())
        }
    }
}

trait DisplayFallback {
    fn display(&self) -> String;
}

#[derive(Debug)]
struct AppContext {
    config: StreamerConfig,
    config_path: PathBuf,
}

impl AppContext {
    fn new(cli: &Cli) -> Result<Self> {
        let config_path = cli.config.clone();
        let config = load_streamer_config(&config_path)?;
        Ok(Self {
            config,
            config_path,
        })
    }

    fn catalog(&self) -> Result<DirectoryCatalog> {
        Ok(DirectoryCatalog::new(
            self.config.audio_dir(),
            &self.config.catalog,
        )?)
    }

    fn validate(&self) -> Result<ValidationReport> {
        self.config.validate()?;
        let catalog = self.catalog()?;
        let scan_ok = catalog.validate();
        Ok(ValidationReport {
            config: self.config_path.clone(),
            audio_dir: self.config.audio_dir(),
            scan_ok,
            invalid_files: catalog.invalid_files(),
        })
    }

    fn catalog_listing(&self) -> Result<CatalogListing> {
        self.config.validate()?;
        let catalog = self.catalog()?;
        let entries = catalog.collect_entries();
        Ok(CatalogListing {
            root: self.config.audio_dir(),
            entries,
            invalid_files: catalog.invalid_files(),
        })
    }

    fn playlist_status(&self) -> Result<PlaylistStatus> {
        let archive = PlaylistArchive::new(self.config.playlist_dir());
        Ok(PlaylistStatus {
            playlist_dir: archive.playlist_dir().to_path_buf(),
            pending: archive.active_playlists()?,
            streamed: archive.archived_playlists()?,
        })
    }

    fn health_check(&self) -> Result<Vec<HealthEntry>> {
        let mut results = Vec::new();
        results.push(self.check_path("airstream.toml", &self.config_path));
        results.push(match self.config.validate() {
            Ok(()) => HealthEntry::ok("configuration", "valid"),
            Err(err) => HealthEntry::error("configuration", err.to_string()),
        });
        results.push(self.check_directory("audio_dir", &self.config.audio_dir(), true));
        results.push(self.check_directory("playlist_dir", &self.config.playlist_dir(), false));
        results.push(self.check_directory("archive_dir", &self.config.archive_dir(), false));
        results.push(self.check_schedule());

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let relay = &self.config.relay;
        let target = format!("{}:{}", relay.host, relay.check_port);
        results.push(if runtime.block_on(check_relay(relay)) {
            HealthEntry::ok("relay", target)
        } else {
            HealthEntry::error("relay", format!("{target} unreachable"))
        });
        Ok(results)
    }

    fn check_path(&self, name: &str, path: &Path) -> HealthEntry {
        if path.exists() {
            HealthEntry::ok(name, format!("{}", path.display()))
        } else {
            HealthEntry::error(name, format!("{path} missing", path = path.display()))
        }
    }

    /// Missing required folders are errors; the others are created on `run`.
    fn check_directory(&self, name: &str, path: &Path, required: bool) -> HealthEntry {
        match fs::metadata(path) {
            Ok(meta) if meta.is_dir() => HealthEntry::ok(name, format!("{}", path.display())),
            Ok(_) => HealthEntry::error(
                name,
                format!("{path} is not a directory", path = path.display()),
            ),
            Err(_) if required => {
                HealthEntry::error(name, format!("{path} not found", path = path.display()))
            }
            Err(_) => HealthEntry::warn(
                name,
                format!("{path} not found, will be created", path = path.display()),
            ),
        }
    }

    fn check_schedule(&self) -> HealthEntry {
        let window = ScheduleWindow::from(&self.config.schedule);
        match window.delay_until_start(Local::now().naive_local()) {
            Ok(delay) if delay.is_zero() => {
                HealthEntry::ok("schedule", format!("window open until {}", window.end))
            }
            Ok(delay) => HealthEntry::ok(
                "schedule",
                format!("starts {} (in {}s)", window.start, delay.as_secs()),
            ),
            Err(err) => HealthEntry::warn("schedule", err.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ValidationReport {
    pub config: PathBuf,
    pub audio_dir: PathBuf,
    pub scan_ok: bool,
    pub invalid_files: Vec<PathBuf>,
}

impl DisplayFallback for ValidationReport {
    fn display(&self) -> String {
        let mut lines = vec![format!("Config: {}", self.config.display())];
        if self.scan_ok {
            lines.push(format!("Audio folder {} is valid", self.audio_dir.display()));
        } else {
            lines.push(format!(
                "Audio folder {} could not be scanned",
                self.audio_dir.display()
            ));
        }
        if !self.invalid_files.is_empty() {
            lines.push(format!("Invalid files ({}):", self.invalid_files.len()));
            for file in &self.invalid_files {
                lines.push(format!("  {}", file.display()));
            }
        }
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct CatalogListing {
    pub root: PathBuf,
    pub entries: Vec<CatalogEntry>,
    pub invalid_files: Vec<PathBuf>,
}

impl DisplayFallback for CatalogListing {
    fn display(&self) -> String {
        if self.entries.is_empty() {
            return format!("No audio files found under {}", self.root.display());
        }
        let mut lines = Vec::new();
        lines.push(format!(
            "{:<14} {:<10} {:<4} {}",
            "SOURCE", "DATE", "HOUR", "FILE"
        ));
        for entry in &self.entries {
            lines.push(format!(
                "{:<14} {}-{}-{} {:<4} {}",
                entry.source,
                entry.year,
                entry.month,
                entry.day,
                entry.hour().unwrap_or_else(|| "--".to_string()),
                entry.path.display()
            ));
        }
        if !self.invalid_files.is_empty() {
            lines.push(format!("{} invalid file(s) skipped", self.invalid_files.len()));
        }
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct PlaylistStatus {
    pub playlist_dir: PathBuf,
    pub pending: Vec<PathBuf>,
    pub streamed: Vec<PathBuf>,
}

impl DisplayFallback for PlaylistStatus {
    fn display(&self) -> String {
        let mut lines = vec![format!(
            "Playlists in {}: {} pending, {} streamed",
            self.playlist_dir.display(),
            self.pending.len(),
            self.streamed.len()
        )];
        for playlist in &self.pending {
            lines.push(format!("  pending  {}", file_name(playlist)));
        }
        for playlist in &self.streamed {
            lines.push(format!("  streamed {}", file_name(playlist)));
        }
        lines.join("\n")
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

impl DisplayFallback for Vec<HealthEntry> {
    fn display(&self) -> String {
        self.iter()
            .map(DisplayFallback::display)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct HealthEntry {
    pub name: String,
    pub status: CheckStatus,
    pub detail: String,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    #[serde(rename = "ok")]
    Ok,
    #[serde(rename = "warn")]
    Warn,
    #[serde(rename = "error")]
    Error,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CheckStatus::Ok => "OK",
            CheckStatus::Warn => "WARN",
            CheckStatus::Error => "ERROR",
        };
        write!(f, "{}", label)
    }
}

impl HealthEntry {
    fn ok(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Ok,
            detail: detail.into(),
        }
    }

    fn warn(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Warn,
            detail: detail.into(),
        }
    }

    fn error(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Error,
            detail: detail.into(),
        }
    }
}

impl DisplayFallback for HealthEntry {
    fn display(&self) -> String {
        format!(
            "[{status}] {name}: {detail}",
            status = self.status,
            name = self.name,
            detail = self.detail
        )
    }
}
