mod naming;
mod processed;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};
use walkdir::{DirEntry, WalkDir};

use crate::config::CatalogSection;

pub use naming::{DirectoryLevel, DirectoryNaming};
pub use processed::ProcessedSet;

/// Depth of audio files below the catalog root: `<source>/<YYYY>/<MM>/<DD>/<file>`.
const FILE_DEPTH: usize = 5;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("root directory does not exist: {0}")]
    MissingRoot(PathBuf),
    #[error("failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },
    #[error("failed to read metadata of {path}: {source}")]
    Metadata {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid directory pattern {pattern}: {source}")]
    Pattern {
        pattern: String,
        source: regex::Error,
    },
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Capability surface the pipeline needs from a catalog.
pub trait FileCatalog: Send + Sync {
    /// Scans the tree without admitting anything. `false` means the scan failed.
    fn validate(&self) -> bool;
    /// Scans the tree and admits every new valid file, in traversal order.
    fn collect(&self) -> Vec<PathBuf>;
    /// Releases a previously admitted path. Returns whether it was present.
    fn remove_processed(&self, path: &Path) -> bool;
    /// Files rejected for an unsupported extension so far.
    fn invalid_files(&self) -> Vec<PathBuf>;
}

/// An admitted audio file and the metadata implied by its location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub path: PathBuf,
    pub source: String,
    pub year: String,
    pub month: String,
    pub day: String,
}

impl CatalogEntry {
    /// Two-digit broadcast hour, read from the third `_` token of the file name.
    pub fn hour(&self) -> Option<String> {
        hour_from_file_name(&self.path)
    }
}

pub(crate) fn hour_from_file_name(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let token = stem.split('_').nth(2)?;
    token.get(..2).map(str::to_string)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanMode {
    Validate,
    Collect,
}

/// Catalog backed by the dated directory hierarchy under `root`.
#[derive(Debug)]
pub struct DirectoryCatalog {
    root: PathBuf,
    naming: DirectoryNaming,
    extensions: HashSet<String>,
    processed: ProcessedSet,
    invalid: Mutex<Vec<PathBuf>>,
}

impl DirectoryCatalog {
    pub fn new(root: impl Into<PathBuf>, config: &CatalogSection) -> CatalogResult<Self> {
        let extensions = config
            .extensions
            .iter()
            .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
            .collect();
        Ok(Self {
            root: root.into(),
            naming: DirectoryNaming::from_config(config)?,
            extensions,
            processed: ProcessedSet::new(),
            invalid: Mutex::new(Vec::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn processed(&self) -> &ProcessedSet {
        &self.processed
    }

    /// Like [`FileCatalog::collect`], keeping the parsed location metadata.
    pub fn collect_entries(&self) -> Vec<CatalogEntry> {
        let mut entries = Vec::new();
        if let Err(err) = self.scan(ScanMode::Collect, &mut entries) {
            error!(error = %err, "an error occurred while collecting the files");
        }
        entries
    }

    fn scan(&self, mode: ScanMode, entries: &mut Vec<CatalogEntry>) -> CatalogResult<()> {
        if !self.root.is_dir() {
            return Err(CatalogError::MissingRoot(self.root.clone()));
        }

        let mut count = 0usize;
        let walker = WalkDir::new(&self.root)
            .follow_links(true)
            .min_depth(1)
            .max_depth(FILE_DEPTH)
            .into_iter()
            .filter_entry(|entry| self.admits_level(entry));
        for entry in walker {
            let entry = entry.map_err(|source| CatalogError::Walk {
                path: source
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| self.root.clone()),
                source,
            })?;
            if entry.depth() != FILE_DEPTH || !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            if self.processed.contains(path) {
                continue;
            }
            if !self.has_supported_extension(path) {
                error!(path = %path.display(), "unsupported audio format");
                self.record_invalid(path);
                continue;
            }
            let size = entry
                .metadata()
                .map_err(|source| CatalogError::Metadata {
                    path: path.to_path_buf(),
                    source: source
                        .into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("metadata unavailable")),
                })?
                .len();
            if size == 0 {
                error!(path = %path.display(), "file is empty");
                continue;
            }

            count += 1;
            if mode == ScanMode::Collect {
                self.processed.insert(path);
                entries.push(self.entry_for(path));
            }
        }

        info!(count, "total valid files ready for streaming");
        Ok(())
    }

    /// Prunes directories that break the naming convention for their level.
    fn admits_level(&self, entry: &DirEntry) -> bool {
        let Some(level) = DirectoryLevel::from_depth(entry.depth()) else {
            return true;
        };
        if !entry.file_type().is_dir() {
            return false;
        }
        let name = entry.file_name().to_string_lossy();
        if self.naming.matches(level, &name) {
            true
        } else {
            error!(path = %entry.path().display(), "invalid {} folder", level.label());
            false
        }
    }

    fn has_supported_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.contains(&ext.to_ascii_lowercase()))
            .unwrap_or(false)
    }

    fn record_invalid(&self, path: &Path) {
        let mut guard = self.invalid.lock().unwrap_or_else(PoisonError::into_inner);
        if !guard.iter().any(|known| known == path) {
            guard.push(path.to_path_buf());
        }
    }

    fn entry_for(&self, path: &Path) -> CatalogEntry {
        let mut parts = path
            .strip_prefix(&self.root)
            .unwrap_or(path)
            .components()
            .map(|component| component.as_os_str().to_string_lossy().to_string());
        let mut next = || parts.next().unwrap_or_default();
        CatalogEntry {
            path: path.to_path_buf(),
            source: next(),
            year: next(),
            month: next(),
            day: next(),
        }
    }
}

impl FileCatalog for DirectoryCatalog {
    fn validate(&self) -> bool {
        let mut ignored = Vec::new();
        match self.scan(ScanMode::Validate, &mut ignored) {
            Ok(()) => true,
            Err(err) => {
                error!(error = %err, "an error occurred while validating the directory structure");
                false
            }
        }
    }

    fn collect(&self) -> Vec<PathBuf> {
        self.collect_entries()
            .into_iter()
            .map(|entry| entry.path)
            .collect()
    }

    fn remove_processed(&self, path: &Path) -> bool {
        self.processed.remove(path)
    }

    fn invalid_files(&self) -> Vec<PathBuf> {
        self.invalid
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
