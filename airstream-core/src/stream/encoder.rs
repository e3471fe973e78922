use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{EncoderSection, RelaySection};

use super::registry::ProcessRegistration;

/// Output codec, container and content type handed to the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecProfile {
    pub codec: &'static str,
    pub format: &'static str,
    pub content_type: &'static str,
}

pub const AAC_PROFILE: CodecProfile = CodecProfile {
    codec: "libfdk_aac",
    format: "adts",
    content_type: "audio/aac",
};

pub const WMA_PROFILE: CodecProfile = CodecProfile {
    codec: "wmav2",
    format: "asf",
    content_type: "audio/x-ms-wma",
};

pub const MP3_PROFILE: CodecProfile = CodecProfile {
    codec: "libmp3lame",
    format: "mp3",
    content_type: "audio/mpeg",
};

impl CodecProfile {
    /// Unrecognized extensions fall back to MP3.
    pub fn for_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("aac") => AAC_PROFILE,
            Some("wma") => WMA_PROFILE,
            _ => MP3_PROFILE,
        }
    }
}

/// Everything needed to build one encoder command line.
#[derive(Debug, Clone)]
pub struct EncoderSettings {
    pub program: PathBuf,
    pub bitrate: String,
    pub channels: u8,
    pub host: String,
    pub username: String,
    pub password: String,
    pub mount_prefix: String,
}

impl EncoderSettings {
    pub fn new(encoder: &EncoderSection, relay: &RelaySection) -> Self {
        Self {
            program: PathBuf::from(&encoder.program),
            bitrate: encoder.bitrate.clone(),
            channels: encoder.channels,
            host: relay.host.clone(),
            username: relay.username.clone(),
            password: relay.password.clone(),
            mount_prefix: relay.mount_prefix.clone(),
        }
    }

    /// Mount points are numbered from 1 while stream indices start at 0.
    pub fn mount(&self, stream_index: usize) -> String {
        format!("{}{}", self.mount_prefix, stream_index + 1)
    }

    pub fn invocation(&self, file: &Path, port: u16, stream_index: usize) -> EncoderInvocation {
        let profile = CodecProfile::for_path(file);
        let destination = format!(
            "icecast://{}:{}@{}:{}/{}",
            self.username,
            self.password,
            self.host,
            port,
            self.mount(stream_index)
        );
        let args = vec![
            "-i".to_string(),
            file.to_string_lossy().to_string(),
            "-acodec".to_string(),
            profile.codec.to_string(),
            "-ab".to_string(),
            self.bitrate.clone(),
            "-ac".to_string(),
            self.channels.to_string(),
            "-content_type".to_string(),
            profile.content_type.to_string(),
            "-f".to_string(),
            profile.format.to_string(),
            destination,
        ];
        EncoderInvocation {
            program: self.program.clone(),
            args,
            file: file.to_path_buf(),
            port,
            profile,
            secret: self.password.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EncoderInvocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub file: PathBuf,
    pub port: u16,
    pub profile: CodecProfile,
    secret: String,
}

impl EncoderInvocation {
    /// Command line with the relay password masked, for logs and errors.
    pub fn display_command(&self) -> String {
        let line = format!("{} {}", self.program.display(), self.args.join(" "));
        if self.secret.is_empty() {
            line
        } else {
            line.replace(&format!(":{}@", self.secret), ":***@")
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Exited { code: Option<i32> },
    /// The process was stopped because cancellation was requested.
    Cancelled,
}

impl CommandOutcome {
    pub fn success(&self) -> bool {
        matches!(self, CommandOutcome::Exited { code: Some(0) })
    }
}

#[async_trait::async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn run(
        &self,
        invocation: &EncoderInvocation,
        registration: &ProcessRegistration,
        cancel: &CancellationToken,
    ) -> std::io::Result<CommandOutcome>;
}

#[derive(Debug, Default)]
pub struct SystemCommandExecutor;

#[async_trait::async_trait]
impl CommandExecutor for SystemCommandExecutor {
    async fn run(
        &self,
        invocation: &EncoderInvocation,
        registration: &ProcessRegistration,
        cancel: &CancellationToken,
    ) -> std::io::Result<CommandOutcome> {
        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let mut child = command.spawn()?;
        let pid = child.id();
        registration.attach_pid(pid);
        info!(?pid, port = invocation.port, "encoder process started");

        let stdout = child
            .stdout
            .take()
            .map(|out| tokio::spawn(drain_lines(out, OutputStream::Stdout)));
        let stderr = child
            .stderr
            .take()
            .map(|err| tokio::spawn(drain_lines(err, OutputStream::Stderr)));

        let outcome = tokio::select! {
            status = child.wait() => CommandOutcome::Exited { code: status?.code() },
            _ = cancel.cancelled() => {
                warn!(?pid, "cancellation requested, stopping encoder");
                if let Err(error) = child.kill().await {
                    debug!(?pid, %error, "encoder already exited");
                }
                CommandOutcome::Cancelled
            }
        };

        for task in [stdout, stderr].into_iter().flatten() {
            let _ = task.await;
        }
        if let CommandOutcome::Exited { code } = outcome {
            info!(?pid, ?code, "encoder process exited");
        }
        Ok(outcome)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputStream {
    Stdout,
    Stderr,
}

/// Encoder lines mentioning `Error` or `ERR` are surfaced as errors.
pub fn is_error_line(line: &str) -> bool {
    line.contains("Error") || line.contains("ERR")
}

async fn drain_lines<R>(reader: R, stream: OutputStream)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.is_empty() {
            continue;
        }
        if is_error_line(&line) {
            error!(output = %line, "encoder error");
        } else if stream == OutputStream::Stdout {
            info!(output = %line, "encoder output");
        } else {
            debug!(output = %line, "encoder output");
        }
    }
}
