//! `GraphStore` implementation for the in-memory store.

use super::InMemoryGraphStore;
use super::graph;
use super::log::WindowRecord;
use crate::domain::{GraphNode, GraphStats, Repository, RepositoryReference};
use crate::error::StoreError;
use crate::store::GraphStore;
use async_trait::async_trait;
use chrono::Utc;
use petgraph::Direction;
use std::collections::HashSet;

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn save_window(
        &self,
        reference: &RepositoryReference,
        dependencies: &[Repository],
        dependents: &[Repository],
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let record = WindowRecord::new(reference, Utc::now(), dependencies, dependents);

        // Durable first: a failed append leaves the graph untouched.
        if let Some(path) = &inner.log_path {
            dependagraph_jsonl::append_jsonl(path, &record).await?;
        }
        inner.apply(&record);

        tracing::debug!(
            repository = %reference,
            dependencies = dependencies.len(),
            dependents = dependents.len(),
            "Saved window"
        );
        Ok(())
    }

    async fn get_untargeted_node(
        &self,
        exclude: &HashSet<String>,
    ) -> Result<Option<RepositoryReference>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(graph::find_untargeted(&inner.graph, exclude))
    }

    async fn get_node(&self, full_name: &str) -> Result<Option<GraphNode>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .node_map
            .get(full_name)
            .map(|&index| inner.graph[index].clone()))
    }

    async fn get_dependencies(&self, full_name: &str) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(graph::neighbor_names(
            &inner.graph,
            &inner.node_map,
            full_name,
            Direction::Outgoing,
        ))
    }

    async fn get_dependents(&self, full_name: &str) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(graph::neighbor_names(
            &inner.graph,
            &inner.node_map,
            full_name,
            Direction::Incoming,
        ))
    }

    async fn stats(&self) -> Result<GraphStats, StoreError> {
        let inner = self.inner.lock().await;
        Ok(graph::stats(&inner.graph))
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.compact().await
    }
}
