//! Window log: one JSON line per committed window.

use super::inner::GraphInner;
use crate::domain::{Repository, RepositoryReference};
use crate::error::StoreError;
use chrono::{DateTime, Utc};
use dependagraph_jsonl::Warning;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One committed window, as stored in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowRecord {
    /// The crawled repository.
    pub full_name: String,
    /// When the window was committed.
    pub targeted_at: DateTime<Utc>,
    /// Repositories the crawled repository depends on.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Repositories that depend on the crawled repository.
    #[serde(default)]
    pub dependents: Vec<String>,
}

impl WindowRecord {
    pub(crate) fn new(
        reference: &RepositoryReference,
        targeted_at: DateTime<Utc>,
        dependencies: &[Repository],
        dependents: &[Repository],
    ) -> Self {
        Self {
            full_name: reference.to_string(),
            targeted_at,
            dependencies: dependencies
                .iter()
                .map(|r| r.fully_qualified_name.clone())
                .collect(),
            dependents: dependents
                .iter()
                .map(|r| r.fully_qualified_name.clone())
                .collect(),
        }
    }
}

/// Apply every decodable record in `path` to `inner`, in file order.
pub(super) async fn replay(inner: &mut GraphInner, path: &Path) -> Result<Vec<Warning>, StoreError> {
    let (records, warnings) = dependagraph_jsonl::read_jsonl_resilient::<WindowRecord, _>(path).await?;
    for record in &records {
        inner.apply(record);
    }
    tracing::debug!(
        records = records.len(),
        warnings = warnings.len(),
        "Replayed window log"
    );
    Ok(warnings)
}

/// Rewrite the log so it holds exactly one record per targeted node.
///
/// Each record carries the node's current neighbors in both directions, so
/// replaying the compacted log rebuilds the same graph. Untargeted nodes with
/// no edges cannot exist, since every node is created by some window.
pub(super) async fn compact(inner: &GraphInner) -> Result<(), StoreError> {
    let Some(path) = &inner.log_path else {
        return Ok(());
    };

    let mut records: Vec<WindowRecord> = inner
        .graph
        .node_weights()
        .filter_map(|node| {
            let targeted_at = node.last_targeted?;
            Some(WindowRecord {
                full_name: node.full_name.clone(),
                targeted_at,
                dependencies: super::graph::neighbor_names(
                    &inner.graph,
                    &inner.node_map,
                    &node.full_name,
                    Direction::Outgoing,
                ),
                dependents: super::graph::neighbor_names(
                    &inner.graph,
                    &inner.node_map,
                    &node.full_name,
                    Direction::Incoming,
                ),
            })
        })
        .collect();
    records.sort_by(|a, b| a.full_name.cmp(&b.full_name));

    dependagraph_jsonl::write_jsonl_atomic_iter(path, records.iter()).await?;
    tracing::debug!(path = %path.display(), records = records.len(), "Compacted window log");
    Ok(())
}
