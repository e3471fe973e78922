use std::fs;
use std::path::{Path, PathBuf};

use airstreamctl::{run, AppError, Cli, Commands, OutputFormat, RunArgs};
use clap::Parser;
use tempfile::TempDir;

fn write_config(root: &Path, program: &str, end_date: &str) -> PathBuf {
    let audio = root.join("audio/Rai");
    for (day, name) in [("05", "0500_x_05h.aac"), ("06", "0600_x_06h.wma")] {
        let dir = audio.join(format!("RAI1_AAC/2024/03/{day}"));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(name), b"audio").unwrap();
    }
    let path = root.join("airstream.toml");
    fs::write(
        &path,
        format!(
            r#"
[paths]
audio_dir = "{audio}"
playlist_dir = "{playlists}"

[schedule]
start_date = "2024-03-01"
end_date = "{end_date}"

[relay]
host = "127.0.0.1"
check_port = 1
username = "source"
password = "hackme"
connect_timeout_ms = 200

[encoder]
program = "{program}"

[retry]
max_retries = 0
"#,
            audio = audio.display(),
            playlists = root.join("playlists").display(),
        ),
    )
    .unwrap();
    path
}

fn cli(config: PathBuf, command: Commands) -> Cli {
    Cli {
        config,
        format: OutputFormat::Json,
        log_level: None,
        command,
    }
}

fn run_args() -> RunArgs {
    RunArgs {
        skip_relay_check: true,
        no_wait: true,
    }
}

#[test]
fn parses_run_flags() {
    let cli = Cli::try_parse_from([
        "airstreamctl",
        "--config",
        "custom.toml",
        "--format",
        "json",
        "run",
        "--skip-relay-check",
        "--no-wait",
    ])
    .unwrap();
    assert_eq!(cli.config, PathBuf::from("custom.toml"));
    let Commands::Run(args) = cli.command else {
        panic!("expected run command");
    };
    assert!(args.skip_relay_check);
    assert!(args.no_wait);
}

#[test]
fn missing_config_is_an_error() {
    let temp = TempDir::new().unwrap();
    let err = run(cli(temp.path().join("absent.toml"), Commands::Validate)).unwrap_err();
    assert!(matches!(err, AppError::Config(_)));
    assert_eq!(err.exit_code(), 1);
}

#[test]
fn unreachable_relay_stops_run() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), "true", "2999-12-31");
    let args = RunArgs {
        skip_relay_check: false,
        no_wait: true,
    };
    let err = run(cli(config, Commands::Run(args))).unwrap_err();
    assert!(matches!(err, AppError::RelayUnreachable { port: 1, .. }));
}

#[test]
fn elapsed_window_fails_before_streaming() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), "true", "2024-03-02");
    let err = run(cli(config, Commands::Run(run_args()))).unwrap_err();
    assert!(matches!(err, AppError::Schedule(_)));
    assert!(!temp.path().join("playlists/RAI1_AAC_2024_03_05_05.m3u8").exists());
}

#[cfg(unix)]
#[test]
fn run_streams_and_archives_every_group() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), "true", "2999-12-31");
    run(cli(config, Commands::Run(run_args()))).unwrap();

    let archive = temp.path().join("playlists/AlreadyStreamed");
    assert!(archive.join("RAI1_AAC_2024_03_05_05.m3u8").is_file());
    assert!(archive.join("RAI1_AAC_2024_03_06_06.m3u8").is_file());
    assert!(!temp
        .path()
        .join("playlists/RAI1_AAC_2024_03_05_05.m3u8")
        .exists());
}

#[cfg(unix)]
#[test]
fn failing_encoder_keeps_playlists_pending() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), "false", "2999-12-31");
    let err = run(cli(config, Commands::Run(run_args()))).unwrap_err();
    assert!(matches!(err, AppError::StreamsFailed(2)));
    assert_eq!(err.exit_code(), 1);
    assert!(temp
        .path()
        .join("playlists/RAI1_AAC_2024_03_05_05.m3u8")
        .is_file());
}
