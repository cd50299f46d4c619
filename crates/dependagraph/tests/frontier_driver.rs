//! Frontier driver behavior over a scripted source.

mod common;

use async_trait::async_trait;
use common::{driver, pairs};
use dependagraph::domain::{GraphNode, GraphStats, Repository, RepositoryReference};
use dependagraph::error::{Error, NeighborhoodQuery, StoreError};
use dependagraph::frontier::{DriverOptions, FrontierDriver};
use dependagraph::source::StubSource;
use dependagraph::store::GraphStore;
use dependagraph::store::in_memory::InMemoryGraphStore;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// In-memory store whose frontier reads start failing after a fixed number.
struct FailingFrontier {
    inner: InMemoryGraphStore,
    reads_left: AtomicUsize,
}

impl FailingFrontier {
    fn new(inner: InMemoryGraphStore, successful_reads: usize) -> Self {
        Self {
            inner,
            reads_left: AtomicUsize::new(successful_reads),
        }
    }
}

#[async_trait]
impl GraphStore for FailingFrontier {
    async fn save_window(
        &self,
        reference: &RepositoryReference,
        dependencies: &[Repository],
        dependents: &[Repository],
    ) -> Result<(), StoreError> {
        self.inner
            .save_window(reference, dependencies, dependents)
            .await
    }

    async fn get_untargeted_node(
        &self,
        exclude: &HashSet<String>,
    ) -> Result<Option<RepositoryReference>, StoreError> {
        let allowed = self
            .reads_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if !allowed {
            return Err(StoreError::Status(503));
        }
        self.inner.get_untargeted_node(exclude).await
    }

    async fn get_node(&self, full_name: &str) -> Result<Option<GraphNode>, StoreError> {
        self.inner.get_node(full_name).await
    }

    async fn get_dependencies(&self, full_name: &str) -> Result<Vec<String>, StoreError> {
        self.inner.get_dependencies(full_name).await
    }

    async fn get_dependents(&self, full_name: &str) -> Result<Vec<String>, StoreError> {
        self.inner.get_dependents(full_name).await
    }

    async fn stats(&self) -> Result<GraphStats, StoreError> {
        self.inner.stats().await
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.inner.close().await
    }
}

fn small_world() -> StubSource {
    StubSource::new()
        .with_dependencies("acme/widgets", &["acme/gears", "serde", "socket.io"])
        .with_dependents("acme/widgets", &["acme/app"])
        .with_dependencies("acme/gears", &["acme/bolts"])
        .with_dependents("acme/app", &["acme/site"])
}

#[tokio::test]
async fn coalesce_exhausts_the_frontier() {
    let source = small_world();
    let store = InMemoryGraphStore::new();

    let report = driver(&source, &store, true, 2)
        .run("acme/widgets")
        .await
        .unwrap();

    assert_eq!(report.crawled, 5);
    assert_eq!(report.failed, 0);
    assert!(report.frontier_error.is_none());
    assert_eq!(store.get_untargeted_node(&HashSet::new()).await.unwrap(), None);

    // Non-repository names were stored but never crawled.
    assert!(store.get_node("serde").await.unwrap().is_some());
    assert_eq!(source.call_count(NeighborhoodQuery::Dependencies, "socket.io"), 0);

    assert_eq!(
        store.edges().await,
        pairs(&[
            ("acme/app", "acme/widgets"),
            ("acme/gears", "acme/bolts"),
            ("acme/site", "acme/app"),
            ("acme/widgets", "acme/gears"),
            ("acme/widgets", "serde"),
            ("acme/widgets", "socket.io"),
        ])
    );
}

#[tokio::test]
async fn every_repository_is_crawled_once() {
    let source = small_world();
    let store = InMemoryGraphStore::new();

    driver(&source, &store, true, 4)
        .run("acme/widgets")
        .await
        .unwrap();

    for name in ["acme/widgets", "acme/gears", "acme/app", "acme/bolts", "acme/site"] {
        assert_eq!(
            source.call_count(NeighborhoodQuery::Dependencies, name),
            1,
            "{name} crawled more than once"
        );
    }
}

#[tokio::test(start_paused = true)]
async fn concurrency_stays_within_the_worker_cap() {
    let names: Vec<String> = (0..12).map(|i| format!("acme/lib{i}")).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let source = StubSource::new()
        .with_dependencies("acme/root", &refs)
        .with_delay(Duration::from_millis(50));
    let store = InMemoryGraphStore::new();

    let report = driver(&source, &store, true, 3)
        .run("acme/root")
        .await
        .unwrap();

    assert_eq!(report.crawled, 13);
    // Each crawl issues two concurrent queries.
    assert!(source.peak_in_flight() <= 6, "peak was {}", source.peak_in_flight());
    assert!(source.peak_in_flight() > 2);
}

#[tokio::test]
async fn failed_node_is_not_retried_within_a_run() {
    let source = StubSource::new()
        .with_dependencies("acme/widgets", &["acme/broken", "acme/gears"])
        .failing_dependencies("acme/broken", "500 from upstream");
    let store = InMemoryGraphStore::new();

    let report = driver(&source, &store, true, 2)
        .run("acme/widgets")
        .await
        .unwrap();

    assert_eq!(report.crawled, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(source.call_count(NeighborhoodQuery::Dependencies, "acme/broken"), 1);

    // Still on the frontier for the next run.
    assert_eq!(
        store
            .get_untargeted_node(&HashSet::new())
            .await
            .unwrap()
            .map(|r| r.to_string()),
        Some("acme/broken".to_string())
    );
}

#[tokio::test]
async fn malformed_seed_is_fatal() {
    let source = StubSource::new();
    let store = InMemoryGraphStore::new();

    let result = driver(&source, &store, true, 2).run("a/b/c").await;

    assert!(matches!(result, Err(Error::MalformedReference(_))));
    assert!(source.calls().is_empty());
    assert_eq!(store.stats().await.unwrap().nodes, 0);
}

#[tokio::test]
async fn single_mode_crawls_only_the_seed() {
    let source = small_world();
    let store = InMemoryGraphStore::new();

    let report = driver(&source, &store, false, 8)
        .run("acme/widgets")
        .await
        .unwrap();

    assert_eq!(report.crawled, 1);
    assert_eq!(source.calls().len(), 2);
    assert_eq!(store.stats().await.unwrap().targeted, 1);
}

#[tokio::test]
async fn seeded_store_resumes_existing_frontier() {
    let source = small_world();
    let store = InMemoryGraphStore::new();
    driver(&source, &store, false, 1)
        .run("acme/widgets")
        .await
        .unwrap();

    // Re-seeding an already crawled repository still drains the rest.
    let report = driver(&source, &store, true, 1)
        .run("acme/widgets")
        .await
        .unwrap();

    assert_eq!(report.crawled, 5);
    assert_eq!(store.stats().await.unwrap().targeted, 5);
}

#[tokio::test(start_paused = true)]
async fn frontier_read_failure_drains_and_is_reported() {
    let source = StubSource::new()
        .with_dependencies("acme/root", &["acme/lib0", "acme/lib1", "acme/lib2"])
        .with_delay(Duration::from_millis(20));
    let memory = InMemoryGraphStore::new();

    // Read 1 runs while the seed is in flight (empty), read 2 hands out
    // acme/lib0, read 3 fails while acme/lib0 is still running.
    let driver = FrontierDriver::new(
        Arc::new(source.clone()),
        Arc::new(FailingFrontier::new(memory.clone(), 2)),
        DriverOptions {
            coalesce: true,
            max_concurrent_crawls: 3,
        },
    );

    let report = driver.run("acme/root").await.unwrap();

    assert!(matches!(report.frontier_error, Some(StoreError::Status(503))));
    assert_eq!(report.crawled, 2);
    assert_eq!(report.failed, 0);

    // The crawl in flight when the read failed still committed.
    assert!(
        memory
            .get_node("acme/lib0")
            .await
            .unwrap()
            .unwrap()
            .last_targeted
            .is_some()
    );
    // Nothing new was started after the failure.
    assert_eq!(source.calls().len(), 4);
    assert_eq!(source.call_count(NeighborhoodQuery::Dependencies, "acme/lib1"), 0);
}
