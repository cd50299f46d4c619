//! Command-line interface.
//!
//! # Example
//!
//! ```bash
//! dependagraph --repository offset46/dependagraph
//! dependagraph --repository offset46/dependagraph --coalesce --workers 4
//! ```

mod validators;

use crate::config::Settings;
use crate::domain::RepositoryReference;
use crate::error::{ConfigError, Error};
use crate::frontier::{DEFAULT_MAX_CONCURRENT_CRAWLS, DriverOptions, FrontierDriver};
use crate::source::GithubSource;
use crate::store::{StoreBackend, create_store};
use anyhow::Result;
use clap::Parser;
use std::sync::Arc;

pub use validators::validate_positive;

/// Dependagraph - crawl GitHub's dependency graph into a graph database
///
/// Starts from one repository, records what it depends on and what depends on
/// it, and optionally keeps going until every reachable repository is crawled.
/// Store and API credentials come from the environment (or a `.env` file).
#[derive(Parser, Debug)]
#[command(name = "dependagraph")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// The repository to seed the graph with, in the form org/repo
    #[arg(long, env = "DEPENDAGRAPH_REPOSITORY")]
    pub repository: Option<String>,

    /// Keep crawling untargeted repositories until none are left (may run for a long time)
    #[arg(long)]
    pub coalesce: bool,

    /// Maximum number of repositories crawled at the same time
    #[arg(long, default_value_t = DEFAULT_MAX_CONCURRENT_CRAWLS, value_parser = validate_positive)]
    pub workers: usize,

    /// Pages of the dependents listing followed per repository
    #[arg(long, default_value_t = 1, value_parser = validate_positive)]
    pub dependent_pages: usize,
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        <Self as Parser>::parse()
    }

    /// Parse CLI arguments from an iterator (for testing)
    pub fn try_parse_from<I, T>(iter: I) -> std::result::Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(iter)
    }

    /// Run the crawl described by these arguments.
    ///
    /// # Errors
    ///
    /// Fails on missing configuration, a missing or malformed seed, a store
    /// that cannot be opened, or a frontier read that fails mid-run.
    /// Individual crawl failures are logged and do not fail the run.
    pub async fn execute(&self) -> Result<()> {
        let mut settings = Settings::from_env().map_err(Error::from)?;
        settings.github.dependent_pages = self.dependent_pages;
        tracing::debug!(?settings, "Loaded settings");

        // Environment first, then the seed, then anything that touches the network.
        let seed = self.seed()?;

        let backend = StoreBackend::from_uri(&settings.store.uri).map_err(Error::from)?;
        let store = create_store(backend, Some(&settings.store))
            .await
            .map_err(Error::from)?;
        let source = GithubSource::new(settings.github.clone())?;

        let driver = FrontierDriver::new(
            Arc::new(source),
            Arc::clone(&store),
            DriverOptions {
                coalesce: self.coalesce,
                max_concurrent_crawls: self.workers,
            },
        );

        let outcome = driver.run(&seed.to_string()).await;
        // Close even when the run failed so the window log is compacted.
        let closed = store.close().await;
        let report = outcome?;
        closed.map_err(Error::from)?;

        let stats = store.stats().await.map_err(Error::from)?;
        tracing::info!(
            crawled = report.crawled,
            failed = report.failed,
            nodes = stats.nodes,
            edges = stats.edges,
            targeted = stats.targeted,
            "Crawl complete"
        );

        if let Some(e) = report.frontier_error {
            return Err(Error::Persistence(e).into());
        }
        Ok(())
    }

    /// The seed repository, required but checked after the environment.
    fn seed(&self) -> std::result::Result<RepositoryReference, Error> {
        let text = self
            .repository
            .as_deref()
            .ok_or(ConfigError::MissingRepository)?;
        Ok(RepositoryReference::parse(text)?)
    }
}
