//! Graph store abstraction.
//!
//! The store owns all durable crawl state. Every write is an upsert keyed by a
//! node's `full_name`, so replaying or racing windows converges to the same
//! graph. Two backends exist:
//!
//! - **In-memory**: `petgraph` graph behind a mutex, optionally made durable by
//!   an append-only JSONL window log (`jsonl:<path>`), or ephemeral (`memory:`)
//! - **Neo4j**: the HTTP transactional Cypher endpoint (`http(s)://…`)
//!
//! # Frontier
//!
//! The frontier is the set of nodes that have never been the subject of a
//! crawl and look like hostable repositories (see
//! [`is_crawlable_name`](crate::domain::is_crawlable_name)). Which candidate
//! [`GraphStore::get_untargeted_node`] returns when several qualify is
//! backend-defined and must not be relied upon.
//!
//! # Example
//!
//! ```no_run
//! use dependagraph::domain::{Repository, RepositoryReference};
//! use dependagraph::store::{GraphStore, StoreBackend, create_store};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let store = create_store(StoreBackend::InMemory, None).await?;
//!     let widgets = RepositoryReference::parse("acme/widgets")?;
//!
//!     store
//!         .save_window(&widgets, &[Repository::new("acme/gears")], &[])
//!         .await?;
//!
//!     let next = store.get_untargeted_node(&Default::default()).await?;
//!     assert_eq!(next.map(|r| r.to_string()).as_deref(), Some("acme/gears"));
//!     Ok(())
//! }
//! ```

use crate::config::StoreSettings;
use crate::domain::{GraphNode, GraphStats, Repository, RepositoryReference};
use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

pub mod in_memory;
pub mod neo4j;

/// Persistent dependency graph.
///
/// Implementations must be `Send + Sync`: many crawls share one store and
/// may commit windows concurrently. Each [`save_window`](Self::save_window)
/// is atomic and isolated from the others.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Commit one crawl's window.
    ///
    /// Upserts the crawled node and stamps its `last_targeted` with the
    /// current time, then upserts each dependency (edge crawled -> dependency)
    /// and each dependent (edge dependent -> crawled). Either all of it becomes
    /// visible or none of it does. This is the only operation that sets
    /// `last_targeted`.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the transaction could not be committed; the
    /// store is then unchanged.
    async fn save_window(
        &self,
        reference: &RepositoryReference,
        dependencies: &[Repository],
        dependents: &[Repository],
    ) -> Result<(), StoreError>;

    /// Return one frontier node whose name is not in `exclude`.
    ///
    /// `Ok(None)` means the frontier (minus `exclude`) is empty; a failed read
    /// is an `Err`, never `None`.
    async fn get_untargeted_node(
        &self,
        exclude: &HashSet<String>,
    ) -> Result<Option<RepositoryReference>, StoreError>;

    /// Look up a node by key.
    async fn get_node(&self, full_name: &str) -> Result<Option<GraphNode>, StoreError>;

    /// Names this node depends on, sorted.
    async fn get_dependencies(&self, full_name: &str) -> Result<Vec<String>, StoreError>;

    /// Names that depend on this node, sorted.
    async fn get_dependents(&self, full_name: &str) -> Result<Vec<String>, StoreError>;

    /// Node, edge and targeted-node counts.
    async fn stats(&self) -> Result<GraphStats, StoreError>;

    /// Flush and release backend resources.
    ///
    /// Safe to call more than once. The store stays usable afterwards.
    async fn close(&self) -> Result<(), StoreError>;
}

/// Graph store backend selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// Ephemeral in-memory graph (`memory:`)
    InMemory,

    /// In-memory graph persisted to a JSONL window log (`jsonl:<path>`)
    Jsonl(PathBuf),

    /// Neo4j HTTP endpoint (`http://…` or `https://…`)
    Neo4j(String),
}

impl StoreBackend {
    /// Choose a backend from a store address.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::UnsupportedUri` for any other scheme, or for
    /// `jsonl:` without a path.
    pub fn from_uri(uri: &str) -> Result<Self, StoreError> {
        let uri = uri.trim();
        if uri.starts_with("http://") || uri.starts_with("https://") {
            return Ok(StoreBackend::Neo4j(uri.trim_end_matches('/').to_string()));
        }
        if uri == "memory:" || uri == "memory://" {
            return Ok(StoreBackend::InMemory);
        }
        if let Some(path) = uri
            .strip_prefix("jsonl://")
            .or_else(|| uri.strip_prefix("jsonl:"))
            .filter(|path| !path.is_empty())
        {
            return Ok(StoreBackend::Jsonl(PathBuf::from(path)));
        }
        Err(StoreError::UnsupportedUri(uri.to_string()))
    }
}

/// Open a graph store.
///
/// `settings` supplies credentials and the database name for the Neo4j
/// backend; the in-memory backends ignore it.
///
/// # Errors
///
/// - `StoreError::Log`/`StoreError::Io` if an existing window log cannot be read
/// - `StoreError::UnsupportedUri` if Neo4j is selected without settings
/// - `StoreError::Http`, `StoreError::Status` or `StoreError::Database` if the
///   Neo4j server cannot be reached or rejects the schema statement
pub async fn create_store(
    backend: StoreBackend,
    settings: Option<&StoreSettings>,
) -> Result<Arc<dyn GraphStore>, StoreError> {
    match backend {
        StoreBackend::InMemory => Ok(Arc::new(in_memory::InMemoryGraphStore::new())),
        StoreBackend::Jsonl(path) => {
            let (store, warnings) = in_memory::InMemoryGraphStore::open(&path).await?;
            for warning in &warnings {
                tracing::warn!(warning = %warning, path = %path.display(), "Window log warning");
            }
            Ok(Arc::new(store))
        }
        StoreBackend::Neo4j(uri) => {
            let settings = settings.ok_or(StoreError::UnsupportedUri(uri.clone()))?;
            Ok(Arc::new(neo4j::Neo4jStore::connect(&uri, settings).await?))
        }
    }
}
