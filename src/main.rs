use anyhow::Result;
use clap::Parser;

use atoll_route::cli::Cli;

fn main() -> Result<()> {
    // Logging goes to stderr so command output stays clean on stdout.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    Cli::parse().run()
}
