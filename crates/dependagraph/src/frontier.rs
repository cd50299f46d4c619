//! Frontier driver: crawl a seed, then keep crawling until nothing is left.
//!
//! Crawls run as tasks in a [`JoinSet`] capped at
//! [`DriverOptions::max_concurrent_crawls`]. The driver is the only place that
//! asks the store for new work, and it passes the names it has already claimed
//! (in flight, or failed during this run) as the exclusion set, so no
//! repository is crawled twice at once and a failing one is not retried in a
//! loop.
//!
//! [`FrontierDriver::run`] returns only after every crawl it started has
//! finished.

use crate::crawl::crawl_repository;
use crate::domain::RepositoryReference;
use crate::error::{Result, StoreError};
use crate::source::DependencySource;
use crate::store::GraphStore;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::{JoinError, JoinSet};

/// Default cap on concurrent crawls.
pub const DEFAULT_MAX_CONCURRENT_CRAWLS: usize = 8;

/// How the driver expands past the seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverOptions {
    /// Keep crawling untargeted nodes after the seed.
    pub coalesce: bool,

    /// Upper bound on crawls running at the same time. Zero is treated as one.
    pub max_concurrent_crawls: usize,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            coalesce: false,
            max_concurrent_crawls: DEFAULT_MAX_CONCURRENT_CRAWLS,
        }
    }
}

/// Outcome of one driver run.
#[derive(Debug, Default)]
pub struct DriverReport {
    /// Crawls that saved a window.
    pub crawled: usize,

    /// Crawls that failed and were skipped.
    pub failed: usize,

    /// Set when a frontier read failed and the driver stopped expanding.
    pub frontier_error: Option<StoreError>,
}

type CrawlOutcome = (RepositoryReference, Result<crate::crawl::CrawlSummary>);

/// Drives crawls over the frontier of a graph store.
pub struct FrontierDriver {
    source: Arc<dyn DependencySource>,
    store: Arc<dyn GraphStore>,
    options: DriverOptions,
}

impl FrontierDriver {
    /// Create a driver over `source` and `store`.
    pub fn new(
        source: Arc<dyn DependencySource>,
        store: Arc<dyn GraphStore>,
        options: DriverOptions,
    ) -> Self {
        Self {
            source,
            store,
            options,
        }
    }

    /// Crawl `seed`, then, in coalesce mode, the frontier until it is empty.
    ///
    /// Individual crawl failures are logged and counted, never returned.
    ///
    /// # Errors
    ///
    /// Returns `Error::MalformedReference` if `seed` is not an `org/repo`
    /// reference. Nothing is crawled in that case.
    pub async fn run(&self, seed: &str) -> Result<DriverReport> {
        let seed = RepositoryReference::parse(seed)?;
        let max = self.options.max_concurrent_crawls.max(1);

        let mut report = DriverReport::default();
        let mut claimed: HashSet<String> = HashSet::new();
        let mut tasks: JoinSet<CrawlOutcome> = JoinSet::new();

        self.spawn_crawl(&mut tasks, &mut claimed, seed);

        if self.options.coalesce {
            tracing::warn!(
                max_concurrent_crawls = max,
                "Coalesce mode: crawling until the frontier is exhausted"
            );
        }

        loop {
            if self.options.coalesce && report.frontier_error.is_none() {
                self.fill(&mut tasks, &mut claimed, &mut report, max).await;
            }

            // Empty set here means no crawl is running and the frontier had
            // nothing left, so the run is over.
            let Some(joined) = tasks.join_next().await else {
                break;
            };
            record(joined, &mut claimed, &mut report);
        }

        tracing::info!(
            crawled = report.crawled,
            failed = report.failed,
            frontier_error = report.frontier_error.is_some(),
            "Frontier driver finished"
        );
        Ok(report)
    }

    /// Start crawls from the frontier until the cap is reached or it runs dry.
    async fn fill(
        &self,
        tasks: &mut JoinSet<CrawlOutcome>,
        claimed: &mut HashSet<String>,
        report: &mut DriverReport,
        max: usize,
    ) {
        while tasks.len() < max {
            match self.store.get_untargeted_node(claimed).await {
                Ok(Some(next)) => self.spawn_crawl(tasks, claimed, next),
                Ok(None) => {
                    tracing::debug!(in_flight = tasks.len(), "Frontier is empty");
                    return;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Frontier read failed, draining in-flight crawls");
                    report.frontier_error = Some(e);
                    return;
                }
            }
        }
    }

    fn spawn_crawl(
        &self,
        tasks: &mut JoinSet<CrawlOutcome>,
        claimed: &mut HashSet<String>,
        reference: RepositoryReference,
    ) {
        claimed.insert(reference.to_string());
        let source = Arc::clone(&self.source);
        let store = Arc::clone(&self.store);
        tasks.spawn(async move {
            let result = crawl_repository(&reference, source.as_ref(), store.as_ref()).await;
            (reference, result)
        });
    }
}

fn record(
    joined: std::result::Result<CrawlOutcome, JoinError>,
    claimed: &mut HashSet<String>,
    report: &mut DriverReport,
) {
    match joined {
        Ok((reference, Ok(_))) => {
            // Now targeted, so the store excludes it on its own.
            claimed.remove(&reference.to_string());
            report.crawled += 1;
        }
        Ok((reference, Err(e))) => {
            tracing::error!(repository = %reference, error = %e, "Crawl failed");
            report.failed += 1;
        }
        Err(e) => {
            tracing::error!(error = %e, "Crawl task did not complete");
            report.failed += 1;
        }
    }
}
