use std::sync::Arc;

use airstream_core::relay::check_relay;
use airstream_core::{
    DirectoryCatalog, FileCatalog, GroupOutcome, GroupState, PlaylistWriter, ScheduleWindow,
    StreamEngine, StreamError, StreamReport, StreamerConfig,
};
use chrono::Local;
use clap::Args;
use serde::Serialize;
use tokio::runtime::Builder;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{AppError, DisplayFallback, Result};

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Start even if the relay does not accept connections
    #[arg(long)]
    pub skip_relay_check: bool,
    /// Start immediately instead of waiting for the schedule start date
    #[arg(long)]
    pub no_wait: bool,
}

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub files: usize,
    pub skipped_invalid: usize,
    pub cancelled: bool,
    pub outcomes: Vec<GroupOutcome>,
}

impl RunSummary {
    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.state == GroupState::Failed)
            .count()
    }
}

pub fn execute(config: &StreamerConfig, args: &RunArgs) -> Result<RunSummary> {
    let runtime = Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(async {
        let cancel = CancellationToken::new();
        spawn_shutdown_listener(cancel.clone());
        pipeline(config, args, cancel).await
    })
}

async fn pipeline(
    config: &StreamerConfig,
    args: &RunArgs,
    cancel: CancellationToken,
) -> Result<RunSummary> {
    config.validate()?;
    config.prepare_playlist_dir()?;

    if args.skip_relay_check {
        warn!(host = %config.relay.host, "relay check skipped");
    } else if !check_relay(&config.relay).await {
        return Err(AppError::RelayUnreachable {
            host: config.relay.host.clone(),
            port: config.relay.check_port,
        });
    }

    let catalog = Arc::new(DirectoryCatalog::new(config.audio_dir(), &config.catalog)?);
    if !catalog.validate() {
        return Err(AppError::CatalogInvalid(config.audio_dir()));
    }
    let invalid = catalog.invalid_files();
    for file in &invalid {
        warn!(path = %file.display(), "invalid audio file left out of the schedule");
    }

    let window = ScheduleWindow::from(&config.schedule);
    if args.no_wait {
        window.delay_until_start(Local::now().naive_local())?;
        info!("schedule wait skipped");
    } else {
        window.wait_for_start(&cancel).await?;
    }

    let writer = PlaylistWriter::from_config(config)?;
    let files = writer.load_and_sort(catalog.as_ref())?;
    let groups = writer.generate_playlists(writer.divide_into_streams(&files))?;

    let shared: Arc<dyn FileCatalog> = catalog;
    let engine = StreamEngine::from_config(config, shared, cancel.clone());
    let report = match engine.start_all(groups).await {
        Ok(report) => report,
        Err(StreamError::GroupsFailed { report, .. }) => report,
        Err(err) => return Err(err.into()),
    };

    Ok(summarize(files.len(), invalid.len(), report, cancel.is_cancelled()))
}

fn summarize(
    files: usize,
    skipped_invalid: usize,
    report: StreamReport,
    cancelled: bool,
) -> RunSummary {
    RunSummary {
        files,
        skipped_invalid,
        cancelled: cancelled || report.was_cancelled(),
        outcomes: report.outcomes,
    }
}

fn spawn_shutdown_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("termination requested, stopping streams");
                cancel.cancel();
            }
            Err(error) => warn!(%error, "unable to listen for termination requests"),
        }
    });
}

impl DisplayFallback for RunSummary {
    fn display(&self) -> String {
        let mut lines = vec![format!(
            "{} file(s) scheduled, {} invalid file(s) skipped",
            self.files, self.skipped_invalid
        )];
        if self.outcomes.is_empty() {
            lines.push("Nothing to stream".to_string());
        }
        for outcome in &self.outcomes {
            let port = outcome
                .port
                .map(|port| port.to_string())
                .unwrap_or_else(|| "-".to_string());
            let mut line = format!(
                "[{}] {} port {} ({} file(s) streamed)",
                outcome.state, outcome.identifier, port, outcome.files_streamed
            );
            if let Some(error) = &outcome.error {
                line.push_str(&format!(": {error}"));
            }
            lines.push(line);
        }
        if self.cancelled {
            lines.push("Streaming was cancelled".to_string());
        }
        lines.join("\n")
    }
}
