//! Turnkit CLI binary entry point.

use tracing_subscriber::EnvFilter;
use turnkit::cli::{commands, Cli, Commands};
use turnkit::config::TurnkitConfig;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse_args();

    let result = match TurnkitConfig::load() {
        Ok(config) => match cli.command {
            Commands::Decode(args) => commands::handle_decode(args, config).await,
            Commands::Replay(args) => commands::handle_replay(args, config).await,
        },
        Err(err) => Err(err),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
