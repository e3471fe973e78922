use std::path::PathBuf;

use airstream_core::{DirectoryCatalog, GroupIdentifier, PlaylistWriter, StreamerConfig};
use serde::Serialize;

use crate::{DisplayFallback, Result};

/// What `run` would stream right now, computed without touching the disk.
#[derive(Debug, Serialize)]
pub struct PlanPreview {
    pub total_files: usize,
    pub max_streams: usize,
    pub groups: Vec<PlannedGroup>,
}

#[derive(Debug, Serialize)]
pub struct PlannedGroup {
    pub index: usize,
    pub identifier: String,
    pub port: Option<u16>,
    pub playlist: PathBuf,
    pub files: usize,
    pub archived: bool,
}

pub fn preview(config: &StreamerConfig) -> Result<PlanPreview> {
    config.validate()?;
    let catalog = DirectoryCatalog::new(config.audio_dir(), &config.catalog)?;
    let writer = PlaylistWriter::detached(config);
    let files = writer.load_and_sort(&catalog)?;

    let mut groups = Vec::new();
    for (index, files) in writer.divide_into_streams(&files).into_iter().enumerate() {
        let identifier = GroupIdentifier::for_group(&files, writer.root_marker())?;
        let port = u16::try_from(index)
            .ok()
            .and_then(|offset| config.streams.base_port.checked_add(offset));
        groups.push(PlannedGroup {
            index,
            identifier: identifier.to_string(),
            port,
            playlist: writer.archive().playlist_path(&identifier),
            files: files.len(),
            archived: writer.archive().is_archived(&identifier),
        });
    }

    Ok(PlanPreview {
        total_files: files.len(),
        max_streams: config.streams.max_streams,
        groups,
    })
}

impl DisplayFallback for PlanPreview {
    fn display(&self) -> String {
        if self.groups.is_empty() {
            return "No new audio files to stream".to_string();
        }
        let mut lines = vec![format!(
            "{} file(s) across {} stream(s) (max {})",
            self.total_files,
            self.groups.len(),
            self.max_streams
        )];
        for group in &self.groups {
            let port = group
                .port
                .map(|port| port.to_string())
                .unwrap_or_else(|| "-".to_string());
            let marker = if group.archived { " (already streamed)" } else { "" };
            lines.push(format!(
                "#{:<3} {:<28} port {:<5} {:>4} file(s){}",
                group.index, group.identifier, port, group.files, marker
            ));
        }
        lines.join("\n")
    }
}
