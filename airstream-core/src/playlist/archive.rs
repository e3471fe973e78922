use std::path::{Path, PathBuf};

use tokio::fs as async_fs;
use tracing::{info, warn};

use crate::config::{ARCHIVE_DIR_NAME, PLAYLIST_EXTENSION};

use super::{render_playlist, GroupIdentifier, PlaylistError, PlaylistResult};

/// Active playlist directory plus its `AlreadyStreamed` archive.
///
/// A playlist under the archive is the only durable record that a group was
/// streamed to completion.
#[derive(Debug, Clone)]
pub struct PlaylistArchive {
    playlist_dir: PathBuf,
    archive_dir: PathBuf,
}

impl PlaylistArchive {
    pub fn new(playlist_dir: impl Into<PathBuf>) -> Self {
        let playlist_dir = playlist_dir.into();
        let archive_dir = playlist_dir.join(ARCHIVE_DIR_NAME);
        Self {
            playlist_dir,
            archive_dir,
        }
    }

    pub fn ensure_dirs(&self) -> PlaylistResult<()> {
        for dir in [&self.playlist_dir, &self.archive_dir] {
            std::fs::create_dir_all(dir).map_err(|source| PlaylistError::Io {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }

    pub fn playlist_dir(&self) -> &Path {
        &self.playlist_dir
    }

    pub fn archive_dir(&self) -> &Path {
        &self.archive_dir
    }

    pub fn playlist_path(&self, identifier: &GroupIdentifier) -> PathBuf {
        self.playlist_dir
            .join(identifier.playlist_file_name(PLAYLIST_EXTENSION))
    }

    pub fn archived_path(&self, identifier: &GroupIdentifier) -> PathBuf {
        self.archive_dir
            .join(identifier.playlist_file_name(PLAYLIST_EXTENSION))
    }

    pub fn is_archived(&self, identifier: &GroupIdentifier) -> bool {
        self.archived_path(identifier).is_file()
    }

    /// Moves the active playlist into the archive. When the active playlist
    /// is gone, the archived copy is rebuilt from `files` and `false` is
    /// returned.
    pub async fn archive(
        &self,
        identifier: &GroupIdentifier,
        files: &[PathBuf],
    ) -> PlaylistResult<bool> {
        async_fs::create_dir_all(&self.archive_dir)
            .await
            .map_err(|err| PlaylistError::Io {
                path: self.archive_dir.clone(),
                source: err,
            })?;
        let source = self.playlist_path(identifier);
        let dest = self.archived_path(identifier);
        if async_fs::metadata(&source).await.is_err() {
            warn!(%identifier, path = %source.display(), "active playlist missing, rebuilding archived copy");
            async_fs::write(&dest, render_playlist(files))
                .await
                .map_err(|err| PlaylistError::Io {
                    path: dest.clone(),
                    source: err,
                })?;
            return Ok(false);
        }
        async_fs::rename(&source, &dest)
            .await
            .map_err(|err| PlaylistError::Io {
                path: dest.clone(),
                source: err,
            })?;
        info!(%identifier, path = %dest.display(), "playlist moved to archive");
        Ok(true)
    }

    /// Playlists still waiting to be streamed.
    pub fn active_playlists(&self) -> PlaylistResult<Vec<PathBuf>> {
        list_playlists(&self.playlist_dir)
    }

    pub fn archived_playlists(&self) -> PlaylistResult<Vec<PathBuf>> {
        list_playlists(&self.archive_dir)
    }
}

fn list_playlists(dir: &Path) -> PlaylistResult<Vec<PathBuf>> {
    let mut entries = Vec::new();
    if !dir.exists() {
        return Ok(entries);
    }
    let read = std::fs::read_dir(dir).map_err(|source| PlaylistError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    for entry in read {
        let entry = entry.map_err(|source| PlaylistError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_file()
            && path
                .extension()
                .map(|ext| ext == PLAYLIST_EXTENSION)
                .unwrap_or(false)
        {
            entries.push(path);
        }
    }
    entries.sort();
    Ok(entries)
}
