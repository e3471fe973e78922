use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = airstreamctl::Cli::parse();
    init_tracing(cli.log_level.as_deref());
    if let Err(err) = airstreamctl::run(cli) {
        eprintln!("error: {err}");
        std::process::exit(err.exit_code());
    }
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
