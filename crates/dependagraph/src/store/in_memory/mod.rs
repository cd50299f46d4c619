//! In-memory graph store using petgraph.
//!
//! All data lives in a `petgraph::DiGraph` guarded by one async mutex, so each
//! window is applied while holding the lock and no other window can observe
//! it half-applied.
//!
//! # Persistence
//!
//! Created with [`InMemoryGraphStore::new`] the store is ephemeral. Opened with
//! [`InMemoryGraphStore::open`] it is backed by an append-only JSONL window
//! log: every committed window is appended (and synced) as one line *before*
//! it is applied in memory, and opening replays the log. A line torn by a
//! crash fails to decode and is skipped, which is exactly an uncommitted
//! transaction. [`close`](crate::store::GraphStore::close) compacts the log
//! to one line per crawled node.
//!
//! # Edge Direction
//!
//! Edges point from **dependent -> dependency**, matching `DEPENDS_ON` in the
//! Neo4j backend. At most one edge exists per ordered pair.

mod graph;
mod inner;
mod log;
mod trait_impl;

use crate::domain::GraphNode;
use crate::error::StoreError;
use dependagraph_jsonl::Warning;
use inner::GraphInner;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

pub use log::WindowRecord;

/// Thread-safe in-memory graph store.
///
/// Clones share the same graph.
#[derive(Clone, Default)]
pub struct InMemoryGraphStore {
    inner: Arc<Mutex<GraphInner>>,
}

impl InMemoryGraphStore {
    /// Create an empty, ephemeral store.
    ///
    /// # Example
    ///
    /// ```
    /// use dependagraph::store::in_memory::InMemoryGraphStore;
    ///
    /// let store = InMemoryGraphStore::new();
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a store backed by the window log at `path`.
    ///
    /// A missing file is a fresh, empty graph; the file is created on the first
    /// committed window. Returns the load warnings for lines that were skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing log cannot be read.
    pub async fn open(path: &Path) -> Result<(Self, Vec<Warning>), StoreError> {
        let mut inner = GraphInner::with_log(path.to_path_buf());
        let warnings = if tokio::fs::try_exists(path).await? {
            log::replay(&mut inner, path).await?
        } else {
            Vec::new()
        };

        tracing::debug!(
            path = %path.display(),
            nodes = inner.graph.node_count(),
            edges = inner.graph.edge_count(),
            "Opened window log"
        );

        Ok((
            Self {
                inner: Arc::new(Mutex::new(inner)),
            },
            warnings,
        ))
    }

    /// Rewrite the window log to one record per crawled node.
    ///
    /// No-op for an ephemeral store.
    ///
    /// # Errors
    ///
    /// Returns an error if the atomic rewrite fails; the previous log is kept.
    pub async fn compact(&self) -> Result<(), StoreError> {
        let inner = self.inner.lock().await;
        log::compact(&inner).await
    }

    /// Every node in insertion order.
    pub async fn nodes(&self) -> Vec<GraphNode> {
        let inner = self.inner.lock().await;
        inner.graph.node_weights().cloned().collect()
    }

    /// Every edge as a sorted `(dependent, dependency)` pair.
    pub async fn edges(&self) -> Vec<(String, String)> {
        let inner = self.inner.lock().await;
        graph::edge_pairs(&inner.graph)
    }
}
