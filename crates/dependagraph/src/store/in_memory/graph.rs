//! Read-side graph queries.

use crate::domain::{GraphNode, GraphStats, Relationship, RepositoryReference};
use petgraph::Direction;
use petgraph::graph::DiGraph;
use petgraph::visit::EdgeRef;
use std::collections::{HashMap, HashSet};

/// First frontier node in insertion order whose name is not excluded.
///
/// Insertion order makes the in-memory frontier roughly breadth-first, but
/// that is an artifact of this backend, not a guarantee of the trait.
pub(super) fn find_untargeted(
    graph: &DiGraph<GraphNode, Relationship>,
    exclude: &HashSet<String>,
) -> Option<RepositoryReference> {
    graph
        .node_weights()
        .filter(|node| node.is_frontier_candidate() && !exclude.contains(&node.full_name))
        .find_map(|node| RepositoryReference::parse(&node.full_name).ok())
}

/// Sorted names of the neighbors of `full_name` in one direction.
///
/// `Outgoing` gives dependencies, `Incoming` gives dependents. Unknown nodes
/// have no neighbors.
pub(super) fn neighbor_names(
    graph: &DiGraph<GraphNode, Relationship>,
    node_map: &HashMap<String, petgraph::graph::NodeIndex>,
    full_name: &str,
    direction: Direction,
) -> Vec<String> {
    let Some(&index) = node_map.get(full_name) else {
        return Vec::new();
    };

    let mut names: Vec<String> = graph
        .neighbors_directed(index, direction)
        .map(|neighbor| graph[neighbor].full_name.clone())
        .collect();
    names.sort();
    names.dedup();
    names
}

pub(super) fn stats(graph: &DiGraph<GraphNode, Relationship>) -> GraphStats {
    GraphStats {
        nodes: graph.node_count(),
        edges: graph.edge_count(),
        targeted: graph
            .node_weights()
            .filter(|node| node.last_targeted.is_some())
            .count(),
    }
}

pub(super) fn edge_pairs(graph: &DiGraph<GraphNode, Relationship>) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = graph
        .edge_references()
        .map(|edge| {
            (
                graph[edge.source()].full_name.clone(),
                graph[edge.target()].full_name.clone(),
            )
        })
        .collect();
    pairs.sort();
    pairs
}
