use regex::Regex;

use crate::config::CatalogSection;

use super::{CatalogError, CatalogResult};

/// Level of a directory below the catalog root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryLevel {
    Source,
    Year,
    Month,
    Day,
}

impl DirectoryLevel {
    /// Maps a walk depth (root = 0) to its naming level.
    pub fn from_depth(depth: usize) -> Option<Self> {
        match depth {
            1 => Some(Self::Source),
            2 => Some(Self::Year),
            3 => Some(Self::Month),
            4 => Some(Self::Day),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Source => "radio",
            Self::Year => "year",
            Self::Month => "month",
            Self::Day => "day",
        }
    }
}

/// Naming convention for `<source>/<YYYY>/<MM>/<DD>`.
#[derive(Debug, Clone)]
pub struct DirectoryNaming {
    source: Regex,
    year: Regex,
    month: Regex,
    day: Regex,
}

impl DirectoryNaming {
    pub fn from_config(config: &CatalogSection) -> CatalogResult<Self> {
        let formats = config
            .source_formats
            .iter()
            .map(|format| regex::escape(format))
            .collect::<Vec<_>>()
            .join("|");
        let source = format!(r"^{}\d+_({})$", regex::escape(&config.source_prefix), formats);
        Ok(Self {
            source: compile(&source)?,
            year: compile(r"^\d{4}$")?,
            month: compile(r"^(0[1-9]|1[0-2])$")?,
            day: compile(r"^(0[1-9]|[12][0-9]|3[01])$")?,
        })
    }

    pub fn matches(&self, level: DirectoryLevel, name: &str) -> bool {
        let pattern = match level {
            DirectoryLevel::Source => &self.source,
            DirectoryLevel::Year => &self.year,
            DirectoryLevel::Month => &self.month,
            DirectoryLevel::Day => &self.day,
        };
        pattern.is_match(name)
    }
}

fn compile(pattern: &str) -> CatalogResult<Regex> {
    Regex::new(pattern).map_err(|source| CatalogError::Pattern {
        pattern: pattern.to_string(),
        source,
    })
}
