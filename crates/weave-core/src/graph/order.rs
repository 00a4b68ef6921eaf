//! Execution order for a workflow via [`petgraph`] topological sort.
//!
//! ## Edge Direction
//!
//! The snapshot stores `A depends on B`. For ordering we insert the petgraph
//! edge `B → A` ("B must come before A"), so a topological sort yields
//! dependencies first.

use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use super::snapshot::GraphSnapshot;

/// Topological order of every task in `graph`, dependencies first.
///
/// Edge targets missing from the snapshot's task set are left out of the
/// result. Returns `None` if the graph contains a cycle.
#[must_use]
pub fn execution_order(graph: &GraphSnapshot) -> Option<Vec<String>> {
    let mut dag = DiGraph::<&str, ()>::with_capacity(graph.len(), graph.edge_count());
    let mut node_map: HashMap<&str, NodeIndex> = HashMap::with_capacity(graph.len());

    for id in graph.task_ids() {
        node_map.insert(id, dag.add_node(id));
    }

    for (dependent, dependency) in graph.edges() {
        let (Some(&before), Some(&after)) = (node_map.get(dependency), node_map.get(dependent))
        else {
            continue;
        };
        dag.add_edge(before, after, ());
    }

    let sorted = toposort(&dag, None).ok()?;
    Some(
        sorted
            .into_iter()
            .filter_map(|idx| dag.node_weight(idx).map(|id| (*id).to_string()))
            .collect(),
    )
}
