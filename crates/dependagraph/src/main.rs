//! Dependagraph CLI binary.

use anyhow::Result;
use dependagraph::cli::Cli;
use tracing_subscriber::EnvFilter;

/// Main entry point for the dependagraph CLI.
///
/// Crawls are network-bound, so the single-threaded runtime is enough to keep
/// many of them in flight.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // A missing .env file is fine; real environment variables still apply.
    dotenvy::dotenv().ok();

    // Example: RUST_LOG=dependagraph=debug,dependagraph_jsonl=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("dependagraph=info,dependagraph_jsonl=info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    tracing::debug!("Starting dependagraph");

    let cli = Cli::parse_args();
    cli.execute().await?;

    tracing::debug!("Dependagraph completed successfully");
    Ok(())
}
