mod encoder;
mod registry;
mod retry;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::catalog::FileCatalog;
use crate::config::StreamerConfig;
use crate::playlist::{PlaylistArchive, PlaylistError, StreamGroup};

pub use encoder::{
    is_error_line, CodecProfile, CommandExecutor, CommandOutcome, EncoderInvocation,
    EncoderSettings, SystemCommandExecutor, AAC_PROFILE, MP3_PROFILE, WMA_PROFILE,
};
pub use registry::{ProcessRecord, ProcessRegistration, ProcessRegistry};
pub use retry::{RetryOutcome, RetryPolicy};

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: PathBuf,
        source: std::io::Error,
    },
    #[error("command failed ({command}) with status {status:?}")]
    CommandFailure {
        command: String,
        status: Option<i32>,
    },
    #[error("streaming was cancelled")]
    Cancelled,
    #[error("{label} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        label: String,
        attempts: u32,
        source: Box<StreamError>,
    },
    #[error("no port available for stream index {index} from base port {base_port}")]
    PortOverflow { index: usize, base_port: u16 },
    #[error("archive error: {0}")]
    Archive(#[from] PlaylistError),
    #[error("{} stream group(s) failed: {}", .failures.len(), describe_failures(.failures))]
    GroupsFailed {
        failures: Vec<GroupFailure>,
        report: StreamReport,
    },
}

impl StreamError {
    /// Cancellation is never retried; every other invocation failure is.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StreamError::Spawn { .. } | StreamError::CommandFailure { .. }
        )
    }
}

pub type StreamResult<T> = Result<T, StreamError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupFailure {
    pub identifier: String,
    pub port: Option<u16>,
    pub reason: String,
}

fn describe_failures(failures: &[GroupFailure]) -> String {
    failures
        .iter()
        .map(|failure| format!("{} ({})", failure.identifier, failure.reason))
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupState {
    Pending,
    Streaming,
    Completed,
    Failed,
    Skipped,
    Cancelled,
}

impl fmt::Display for GroupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            GroupState::Pending => "pending",
            GroupState::Streaming => "streaming",
            GroupState::Completed => "completed",
            GroupState::Failed => "failed",
            GroupState::Skipped => "skipped",
            GroupState::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupOutcome {
    pub index: usize,
    pub identifier: String,
    pub port: Option<u16>,
    pub state: GroupState,
    pub files_streamed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StreamReport {
    pub outcomes: Vec<GroupOutcome>,
}

impl StreamReport {
    pub fn count(&self, state: GroupState) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.state == state)
            .count()
    }

    pub fn was_cancelled(&self) -> bool {
        self.count(GroupState::Cancelled) > 0
    }

    fn failures(&self) -> Vec<GroupFailure> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.state == GroupState::Failed)
            .map(|outcome| GroupFailure {
                identifier: outcome.identifier.clone(),
                port: outcome.port,
                reason: outcome.error.clone().unwrap_or_default(),
            })
            .collect()
    }
}

/// Runs one worker per group against consecutive relay ports.
pub struct StreamEngine {
    catalog: Arc<dyn FileCatalog>,
    archive: PlaylistArchive,
    encoder: EncoderSettings,
    retry: RetryPolicy,
    base_port: u16,
    executor: Arc<dyn CommandExecutor>,
    registry: ProcessRegistry,
    cancel: CancellationToken,
}

impl fmt::Debug for StreamEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamEngine")
            .field("archive", &self.archive)
            .field("retry", &self.retry)
            .field("base_port", &self.base_port)
            .field("active_processes", &self.registry.len())
            .finish()
    }
}

impl StreamEngine {
    pub fn new(
        catalog: Arc<dyn FileCatalog>,
        archive: PlaylistArchive,
        encoder: EncoderSettings,
        retry: RetryPolicy,
        base_port: u16,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            catalog,
            archive,
            encoder,
            retry,
            base_port,
            executor: Arc::new(SystemCommandExecutor),
            registry: ProcessRegistry::new(),
            cancel,
        }
    }

    pub fn from_config(
        config: &StreamerConfig,
        catalog: Arc<dyn FileCatalog>,
        cancel: CancellationToken,
    ) -> Self {
        Self::new(
            catalog,
            PlaylistArchive::new(config.playlist_dir()),
            EncoderSettings::new(&config.encoder, &config.relay),
            RetryPolicy::from(&config.retry),
            config.streams.base_port,
            cancel,
        )
    }

    pub fn with_executor(mut self, executor: Arc<dyn CommandExecutor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn registry(&self) -> &ProcessRegistry {
        &self.registry
    }

    /// Streams every group concurrently and waits for all of them.
    ///
    /// Failed groups do not stop their siblings; they are collected into
    /// [`StreamError::GroupsFailed`] once every worker is done.
    pub async fn start_all(&self, groups: Vec<StreamGroup>) -> StreamResult<StreamReport> {
        if groups.is_empty() {
            error!("no streams provided for streaming");
            return Ok(StreamReport::default());
        }

        let workers = groups
            .iter()
            .enumerate()
            .map(|(index, group)| self.stream_group(index, group));
        let report = StreamReport {
            outcomes: join_all(workers).await,
        };

        if report.was_cancelled() {
            info!("streaming was cancelled");
        }
        let failures = report.failures();
        if failures.is_empty() {
            Ok(report)
        } else {
            for failure in &failures {
                error!(identifier = %failure.identifier, reason = %failure.reason, "stream group failed");
            }
            Err(StreamError::GroupsFailed { failures, report })
        }
    }

    async fn stream_group(&self, index: usize, group: &StreamGroup) -> GroupOutcome {
        let mut outcome = GroupOutcome {
            index,
            identifier: group.identifier.to_string(),
            port: None,
            state: GroupState::Pending,
            files_streamed: 0,
            error: None,
        };

        let Some(port) = self.port_for(index) else {
            let err = StreamError::PortOverflow {
                index,
                base_port: self.base_port,
            };
            return outcome.finish(GroupState::Failed, Some(&err));
        };
        outcome.port = Some(port);

        if self.cancel.is_cancelled() {
            info!(identifier = %outcome.identifier, "cancellation requested before stream start");
            return outcome.finish(GroupState::Cancelled, None);
        }
        if group.files.is_empty() {
            warn!(identifier = %outcome.identifier, "stream has no audio files, skipping");
            return outcome.finish(GroupState::Skipped, None);
        }

        outcome.state = GroupState::Streaming;
        info!(identifier = %outcome.identifier, port, files = group.files.len(), "stream started");
        for file in &group.files {
            if self.cancel.is_cancelled() {
                info!(identifier = %outcome.identifier, "cancellation requested, stopping stream");
                return outcome.finish(GroupState::Cancelled, None);
            }
            match self.publish_file(index, port, &outcome.identifier, file).await {
                Ok(()) => outcome.files_streamed += 1,
                Err(StreamError::Cancelled) => {
                    info!(identifier = %outcome.identifier, "stream cancelled mid-file");
                    return outcome.finish(GroupState::Cancelled, None);
                }
                Err(err) => {
                    error!(identifier = %outcome.identifier, file = %file.display(), error = %err, "an error occurred while streaming");
                    return outcome.finish(GroupState::Failed, Some(&err));
                }
            }
        }

        match self.complete_group(group).await {
            Ok(()) => outcome.finish(GroupState::Completed, None),
            Err(err) => outcome.finish(GroupState::Failed, Some(&err)),
        }
    }

    fn port_for(&self, index: usize) -> Option<u16> {
        u16::try_from(index)
            .ok()
            .and_then(|offset| self.base_port.checked_add(offset))
    }

    async fn publish_file(
        &self,
        index: usize,
        port: u16,
        identifier: &str,
        file: &Path,
    ) -> StreamResult<()> {
        let invocation = self.encoder.invocation(file, port, index);
        let invocation = &invocation;
        let label = format!("publish {}", file.display());
        let outcome = self
            .retry
            .run(&label, &self.cancel, move |attempt| {
                self.invoke(invocation, identifier, attempt)
            })
            .await?;
        if outcome.attempts > 1 {
            info!(identifier, file = %file.display(), attempts = outcome.attempts, "published after retry");
        }
        Ok(())
    }

    async fn invoke(
        &self,
        invocation: &EncoderInvocation,
        identifier: &str,
        attempt: u32,
    ) -> StreamResult<()> {
        let registration = self.registry.register(ProcessRecord {
            identifier: identifier.to_string(),
            file: invocation.file.clone(),
            port: invocation.port,
            attempt,
            pid: None,
            started_at: Utc::now(),
        });
        info!(identifier, attempt, command = %invocation.display_command(), "starting encoder");
        let outcome = self
            .executor
            .run(invocation, &registration, &self.cancel)
            .await
            .map_err(|source| StreamError::Spawn {
                program: invocation.program.clone(),
                source,
            })?;
        match outcome {
            CommandOutcome::Cancelled => Err(StreamError::Cancelled),
            outcome if outcome.success() => Ok(()),
            CommandOutcome::Exited { code } => {
                error!(identifier, ?code, "encoder exited with an error code");
                Err(StreamError::CommandFailure {
                    command: invocation.display_command(),
                    status: code,
                })
            }
        }
    }

    async fn complete_group(&self, group: &StreamGroup) -> StreamResult<()> {
        info!(identifier = %group.identifier, "stream has ended");
        self.archive
            .archive(&group.identifier, &group.files)
            .await?;
        let released = group
            .files
            .iter()
            .filter(|file| self.catalog.remove_processed(file))
            .count();
        info!(identifier = %group.identifier, released, "released streamed files from catalog");
        Ok(())
    }
}

impl GroupOutcome {
    fn finish(mut self, state: GroupState, error: Option<&StreamError>) -> Self {
        self.state = state;
        self.error = error.map(ToString::to_string);
        self
    }
}
