use std::ffi::OsStr;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Serialize, Serializer};

use crate::catalog::hour_from_file_name;

use super::{PlaylistError, PlaylistResult};

/// Broadcast unit key: `source_year_month_day_hour`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupIdentifier {
    pub source: String,
    pub year: String,
    pub month: String,
    pub day: String,
    pub hour: String,
}

impl GroupIdentifier {
    /// Derives the identifier from the four path components that follow `marker`.
    pub fn from_path(path: &Path, marker: &str) -> PlaylistResult<Self> {
        let mut components = path.components().map(Component::as_os_str);
        if !components.any(|component| component == OsStr::new(marker)) {
            return Err(PlaylistError::MarkerNotFound {
                marker: marker.to_string(),
                path: path.to_path_buf(),
            });
        }
        let segments = components
            .by_ref()
            .take(4)
            .map(|component| component.to_string_lossy().to_string())
            .collect::<Vec<_>>();
        let malformed = || PlaylistError::MalformedPath {
            path: path.to_path_buf(),
            reason: format!("expected <source>/<year>/<month>/<day>/<file> after {marker}"),
        };
        let [source, year, month, day] =
            <[String; 4]>::try_from(segments).map_err(|_| malformed())?;
        if components.next().is_none() {
            return Err(malformed());
        }
        let hour = hour_from_file_name(path).ok_or_else(|| PlaylistError::MalformedPath {
            path: path.to_path_buf(),
            reason: "file name has no hour token".into(),
        })?;
        Ok(Self {
            source,
            year,
            month,
            day,
            hour,
        })
    }

    /// Identifier of a group is the identifier of its first file.
    pub fn for_group(files: &[PathBuf], marker: &str) -> PlaylistResult<Self> {
        let first = files.first().ok_or(PlaylistError::EmptyGroup)?;
        Self::from_path(first, marker)
    }

    pub fn playlist_file_name(&self, extension: &str) -> String {
        format!("{self}.{extension}")
    }

    /// Date-major key used for chronological ordering.
    pub(crate) fn chronological_key(&self) -> (&str, &str, &str, &str, &str) {
        (&self.year, &self.month, &self.day, &self.hour, &self.source)
    }
}

impl fmt::Display for GroupIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}_{}_{}",
            self.source, self.year, self.month, self.day, self.hour
        )
    }
}

impl Serialize for GroupIdentifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
