//! Graph data structures behind the store's mutex.

use super::log::WindowRecord;
use crate::domain::{GraphNode, Relationship};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;
use std::path::PathBuf;

/// Graph state (not thread-safe on its own).
#[derive(Default)]
pub(crate) struct GraphInner {
    /// Nodes carry their key and crawl timestamp; edges point dependent -> dependency.
    pub(super) graph: DiGraph<GraphNode, Relationship>,

    /// `full_name` -> node index. Every node in `graph` has exactly one entry.
    pub(super) node_map: HashMap<String, NodeIndex>,

    /// Window log path for durable stores.
    pub(super) log_path: Option<PathBuf>,
}

impl GraphInner {
    pub(super) fn with_log(path: PathBuf) -> Self {
        Self {
            log_path: Some(path),
            ..Self::default()
        }
    }

    /// Return the node keyed by `full_name`, creating it untargeted if absent.
    pub(super) fn upsert_node(&mut self, full_name: &str) -> NodeIndex {
        if let Some(&index) = self.node_map.get(full_name) {
            return index;
        }
        let index = self.graph.add_node(GraphNode::untargeted(full_name));
        self.node_map.insert(full_name.to_string(), index);
        index
    }

    /// Apply a committed window.
    ///
    /// Cannot fail, which is what lets the store log first and apply second.
    pub(super) fn apply(&mut self, record: &WindowRecord) {
        let subject = self.upsert_node(&record.full_name);
        self.graph[subject].last_targeted = Some(record.targeted_at);

        for dependency in &record.dependencies {
            let target = self.upsert_node(dependency);
            self.graph
                .update_edge(subject, target, Relationship::DependsOn);
        }

        for dependent in &record.dependents {
            let source = self.upsert_node(dependent);
            self.graph
                .update_edge(source, subject, Relationship::DependsOn);
        }
    }
}
