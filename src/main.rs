//! tripfare - Main Entry Point
//!
//! Batch trip-fare regression: train, extract features, predict.

use clap::Parser;
use tripfare::cli::{self, Cli};

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so they don't interleave with the step output
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tripfare=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    cli::run(Cli::parse())
}
