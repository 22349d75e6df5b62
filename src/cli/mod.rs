//! CLI entry point for turnkit.

pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Turnkit CLI
#[derive(Parser, Debug)]
#[command(name = "turnkit", version, about = "Turnkit: decode agent turns and broker tool permissions")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Decode a recorded wire stream and print the assembled message
    Decode(DecodeArgs),
    /// Decode a recorded stream and ask for approval of each tool call
    Replay(ReplayArgs),
}

/// Arguments for `turnkit decode`.
#[derive(Parser, Debug)]
pub struct DecodeArgs {
    /// Recorded stream file (`<code>:<json>` per line)
    pub file: PathBuf,

    /// Feed the decoder in chunks of this many bytes
    #[arg(long, default_value_t = 64)]
    pub chunk_size: usize,

    /// Print each event as a JSON line while decoding
    #[arg(long)]
    pub events: bool,
}

/// Arguments for `turnkit replay`.
#[derive(Parser, Debug)]
pub struct ReplayArgs {
    /// Recorded stream file (`<code>:<json>` per line)
    pub file: PathBuf,

    /// Seconds to wait for each answer
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
