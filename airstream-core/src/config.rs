use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{ConfigError, Result};

/// Name of the archive directory kept under the playlist directory.
pub const ARCHIVE_DIR_NAME: &str = "AlreadyStreamed";

/// Extension shared by active and archived playlists.
pub const PLAYLIST_EXTENSION: &str = "m3u8";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StreamerConfig {
    pub paths: PathsSection,
    #[serde(default)]
    pub catalog: CatalogSection,
    #[serde(default)]
    pub streams: StreamsSection,
    pub schedule: ScheduleSection,
    pub relay: RelaySection,
    #[serde(default)]
    pub encoder: EncoderSection,
    #[serde(default)]
    pub retry: RetrySection,
}

impl StreamerConfig {
    pub fn audio_dir(&self) -> PathBuf {
        PathBuf::from(&self.paths.audio_dir)
    }

    pub fn playlist_dir(&self) -> PathBuf {
        PathBuf::from(&self.paths.playlist_dir)
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.playlist_dir().join(ARCHIVE_DIR_NAME)
    }

    /// Checks every value the pipeline depends on before any catalog work begins.
    pub fn validate(&self) -> Result<()> {
        if self.paths.audio_dir.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "paths.audio_dir",
                reason: "audio folder path is empty".into(),
            });
        }
        if self.paths.playlist_dir.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "paths.playlist_dir",
                reason: "playlist folder path is empty".into(),
            });
        }
        if self.streams.max_streams == 0 {
            return Err(ConfigError::Invalid {
                field: "streams.max_streams",
                reason: "max streams must be greater than zero".into(),
            });
        }
        let last_port = u32::try_from(self.streams.max_streams - 1)
            .ok()
            .and_then(|extra| u32::from(self.streams.base_port).checked_add(extra));
        if !matches!(last_port, Some(port) if port <= u32::from(u16::MAX)) {
            return Err(ConfigError::Invalid {
                field: "streams.max_streams",
                reason: format!(
                    "base port {} cannot fit {} streams",
                    self.streams.base_port, self.streams.max_streams
                ),
            });
        }
        if self.schedule.end_date < self.schedule.start_date {
            return Err(ConfigError::Invalid {
                field: "schedule.end_date",
                reason: format!(
                    "end date {} precedes start date {}",
                    self.schedule.end_date, self.schedule.start_date
                ),
            });
        }
        if self.catalog.root_marker.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "catalog.root_marker",
                reason: "root marker is empty".into(),
            });
        }
        if self.catalog.source_formats.is_empty() {
            return Err(ConfigError::Invalid {
                field: "catalog.source_formats",
                reason: "at least one source format is required".into(),
            });
        }
        if self.retry.max_retries > 10 {
            return Err(ConfigError::Invalid {
                field: "retry.max_retries",
                reason: format!("{} retries exceeds the limit of 10", self.retry.max_retries),
            });
        }
        Ok(())
    }

    /// Creates the playlist directory and its archive when missing.
    pub fn prepare_playlist_dir(&self) -> Result<()> {
        for dir in [self.playlist_dir(), self.archive_dir()] {
            if dir.is_dir() {
                continue;
            }
            warn!(path = %dir.display(), "playlist folder does not exist, creating it");
            std::fs::create_dir_all(&dir).map_err(|source| ConfigError::Directory {
                source,
                path: dir.clone(),
            })?;
            info!(path = %dir.display(), "created playlist folder");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathsSection {
    pub audio_dir: String,
    pub playlist_dir: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaylistOrder {
    /// Directory enumeration order, as the filesystem yields it.
    #[default]
    Traversal,
    /// Source, date and hour parsed from the path.
    Chronological,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogSection {
    pub root_marker: String,
    pub source_prefix: String,
    pub source_formats: Vec<String>,
    pub extensions: Vec<String>,
    pub order: PlaylistOrder,
}

impl Default for CatalogSection {
    fn default() -> Self {
        Self {
            root_marker: "Rai".into(),
            source_prefix: "RAI".into(),
            source_formats: vec!["AAC".into(), "WMA".into()],
            extensions: [".aac", ".mp3", ".wav", ".flac", ".ogg", ".m4a", ".wma"]
                .into_iter()
                .map(String::from)
                .collect(),
            order: PlaylistOrder::Traversal,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreamsSection {
    pub max_streams: usize,
    pub base_port: u16,
}

impl Default for StreamsSection {
    fn default() -> Self {
        Self {
            max_streams: 20,
            base_port: 8083,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleSection {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelaySection {
    pub host: String,
    #[serde(default = "default_check_port")]
    pub check_port: u16,
    pub username: String,
    pub password: String,
    #[serde(default = "default_mount_prefix")]
    pub mount_prefix: String,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl RelaySection {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

fn default_check_port() -> u16 {
    8200
}

fn default_mount_prefix() -> String {
    "rai_".into()
}

fn default_connect_timeout_ms() -> u64 {
    2000
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EncoderSection {
    pub program: String,
    pub bitrate: String,
    pub channels: u8,
}

impl Default for EncoderSection {
    fn default() -> Self {
        Self {
            program: "ffmpeg".into(),
            bitrate: "128k".into(),
            channels: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub max_retries: u32,
    pub backoff_base_seconds: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base_seconds: 2,
        }
    }
}

pub fn load_streamer_config<P: AsRef<Path>>(path: P) -> Result<StreamerConfig> {
    load_toml(path)
}

fn load_toml<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}
