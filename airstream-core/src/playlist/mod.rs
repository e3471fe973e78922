mod archive;
mod identifier;
mod partition;

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::catalog::FileCatalog;
use crate::config::{PlaylistOrder, StreamerConfig};

pub use archive::PlaylistArchive;
pub use identifier::GroupIdentifier;
pub use partition::divide_into_streams;

/// Every entry is tagged with this duration; real lengths are never probed.
pub const ENTRY_DURATION_SECONDS: u32 = 7200;

#[derive(Debug, Error)]
pub enum PlaylistError {
    #[error("folder {marker} was not found in audio path {path}")]
    MarkerNotFound { marker: String, path: PathBuf },
    #[error("malformed audio path {path}: {reason}")]
    MalformedPath { path: PathBuf, reason: String },
    #[error("stream group has no files")]
    EmptyGroup,
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type PlaylistResult<T> = Result<T, PlaylistError>;

/// A partitioned group with a written playlist, ready to stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamGroup {
    pub identifier: GroupIdentifier,
    pub playlist: PathBuf,
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct PlaylistWriter {
    archive: PlaylistArchive,
    max_streams: usize,
    root_marker: String,
    order: PlaylistOrder,
}

impl PlaylistWriter {
    pub fn new(
        archive: PlaylistArchive,
        max_streams: usize,
        root_marker: impl Into<String>,
        order: PlaylistOrder,
    ) -> PlaylistResult<Self> {
        archive.ensure_dirs()?;
        Ok(Self {
            archive,
            max_streams,
            root_marker: root_marker.into(),
            order,
        })
    }

    pub fn from_config(config: &StreamerConfig) -> PlaylistResult<Self> {
        Self::new(
            PlaylistArchive::new(config.playlist_dir()),
            config.streams.max_streams,
            config.catalog.root_marker.clone(),
            config.catalog.order,
        )
    }

    /// Writer that leaves the filesystem untouched until
    /// [`PlaylistWriter::generate_playlists`] runs.
    pub fn detached(config: &StreamerConfig) -> Self {
        Self {
            archive: PlaylistArchive::new(config.playlist_dir()),
            max_streams: config.streams.max_streams,
            root_marker: config.catalog.root_marker.clone(),
            order: config.catalog.order,
        }
    }

    pub fn root_marker(&self) -> &str {
        &self.root_marker
    }

    pub fn archive(&self) -> &PlaylistArchive {
        &self.archive
    }

    pub fn identifier_for(&self, path: &Path) -> PlaylistResult<GroupIdentifier> {
        GroupIdentifier::from_path(path, &self.root_marker)
    }

    /// Collects the catalog and drops files whose broadcast unit is archived.
    ///
    /// With [`PlaylistOrder::Traversal`] the result keeps catalog order as is.
    pub fn load_and_sort(&self, catalog: &dyn FileCatalog) -> PlaylistResult<Vec<PathBuf>> {
        let collected = catalog.collect();
        let mut reported = HashSet::new();
        let mut keyed = Vec::with_capacity(collected.len());
        for file in collected {
            let identifier = self.identifier_for(&file)?;
            if self.archive.is_archived(&identifier) {
                if reported.insert(identifier.to_string()) {
                    warn!(%identifier, "this playlist was already streamed");
                }
                continue;
            }
            keyed.push((identifier, file));
        }

        if self.order == PlaylistOrder::Chronological {
            keyed.sort_by(|(a, a_path), (b, b_path)| {
                a.chronological_key()
                    .cmp(&b.chronological_key())
                    .then_with(|| a_path.cmp(b_path))
            });
        }

        if keyed.is_empty() {
            warn!("no valid (or new) audio files found");
        }
        Ok(keyed.into_iter().map(|(_, file)| file).collect())
    }

    pub fn divide_into_streams(&self, files: &[PathBuf]) -> Vec<Vec<PathBuf>> {
        divide_into_streams(files, self.max_streams)
    }

    /// Writes one playlist per group that is not archived yet and returns
    /// those groups, in input order.
    pub fn generate_playlists(&self, groups: Vec<Vec<PathBuf>>) -> PlaylistResult<Vec<StreamGroup>> {
        self.archive.ensure_dirs()?;
        let mut accepted = Vec::new();
        for files in groups {
            let identifier = GroupIdentifier::for_group(&files, &self.root_marker)?;
            if self.archive.is_archived(&identifier) {
                info!(%identifier, "skipping group already streamed");
                continue;
            }
            let playlist = self.archive.playlist_path(&identifier);
            fs::write(&playlist, render_playlist(&files)).map_err(|source| PlaylistError::Io {
                path: playlist.clone(),
                source,
            })?;
            accepted.push(StreamGroup {
                identifier,
                playlist,
                files,
            });
        }
        info!(count = accepted.len(), "streams needed for the collected audio files");
        Ok(accepted)
    }
}

pub fn render_playlist(files: &[PathBuf]) -> String {
    let mut playlist = String::new();
    playlist.push_str("#EXTM3U\n");
    playlist.push_str("#EXT-X-VERSION:3\n");
    playlist.push_str("#EXT-X-MEDIA-SEQUENCE:0\n");
    playlist.push_str("#EXT-X-ALLOW-CACHE:YES\n");
    for file in files {
        playlist.push_str(&format!("#EXTINF:{ENTRY_DURATION_SECONDS},\n"));
        playlist.push_str(&format!("{}\n", file.display()));
    }
    playlist
}

/// File paths listed in a playlist, in order.
pub fn parse_playlist(contents: &str) -> Vec<PathBuf> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(PathBuf::from)
        .collect()
}
