//! Cycle detection for the DependsOn graph.
//!
//! # Overview
//!
//! DependsOn edges must form a DAG: a cycle makes every task on it wait for
//! itself. The store asks this module, inside the write transaction that is
//! about to insert `from → to`, whether a path `to → … → from` already
//! exists. If it does, the insert is rejected with the cycle path.
//!
//! # Design
//!
//! - **DFS from the target**: search from `to` along existing DependsOn
//!   edges looking for `from`. This finds exactly the cycle the new edge
//!   would close.
//! - **Reject, don't warn**: a detected cycle aborts the whole transaction.
//! - **O(V+E)**: each node and edge is visited at most once.
//! - **Iterative**: an explicit stack keeps long dependency chains from
//!   exhausting the thread stack.

#![allow(clippy::module_name_repetitions, clippy::must_use_candidate)]

use std::collections::{HashMap, HashSet};
use std::fmt;

use super::snapshot::GraphSnapshot;

// ---------------------------------------------------------------------------
// CyclePath
// ---------------------------------------------------------------------------

/// The cycle a rejected DependsOn edge would have closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CyclePath {
    /// Ordered task ids forming the loop, starting and ending at `edge_from`.
    ///
    /// Adding `A → B` when `B → C → A` exists yields `["A", "B", "C", "A"]`.
    pub cycle_path: Vec<String>,

    /// Task that would have gained the dependency.
    pub edge_from: String,

    /// Task it would have depended on.
    pub edge_to: String,
}

impl CyclePath {
    /// Number of distinct tasks in the cycle.
    pub fn cycle_len(&self) -> usize {
        self.cycle_path.len().saturating_sub(1)
    }

    pub fn is_self_loop(&self) -> bool {
        self.edge_from == self.edge_to
    }

    /// Two-task cycle (A depends on B, B depends on A).
    pub fn is_mutual(&self) -> bool {
        self.cycle_len() == 2
    }
}

impl fmt::Display for CyclePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_self_loop() {
            write!(
                f,
                "cycle detected: task '{}' cannot depend on itself",
                self.edge_from
            )
        } else if self.is_mutual() {
            write!(
                f,
                "cycle detected: '{}' and '{}' would depend on each other",
                self.edge_from, self.edge_to
            )
        } else {
            write!(
                f,
                "cycle detected ({} tasks): {}",
                self.cycle_len(),
                self.cycle_path.join(" → ")
            )
        }
    }
}

// ---------------------------------------------------------------------------
// Core detection
// ---------------------------------------------------------------------------

/// Check whether adding `from → to` (`from` depends on `to`) would close a
/// cycle in `graph`.
///
/// Returns the cycle path when it would, `None` otherwise. `graph` must be
/// the state *before* the new edge.
pub fn detect_cycle_on_add(graph: &GraphSnapshot, from: &str, to: &str) -> Option<CyclePath> {
    if from == to {
        return Some(CyclePath {
            cycle_path: vec![from.to_string(), from.to_string()],
            edge_from: from.to_string(),
            edge_to: to.to_string(),
        });
    }

    let parent_map = find_path(graph, to, from)?;

    // Walk back from `from` to `to`, then prefix with the new edge's source.
    let mut chain = vec![from.to_string()];
    let mut current = from;
    while current != to {
        match parent_map.get(current) {
            Some(&parent) => {
                chain.push(parent.to_string());
                current = parent;
            }
            None => break,
        }
    }
    chain.reverse();

    let mut cycle_path = Vec::with_capacity(chain.len() + 1);
    cycle_path.push(from.to_string());
    cycle_path.extend(chain);

    Some(CyclePath {
        cycle_path,
        edge_from: from.to_string(),
        edge_to: to.to_string(),
    })
}

/// Check whether the graph already contains any cycle.
///
/// Short-circuits on the first back edge found.
pub fn has_cycles(graph: &GraphSnapshot) -> bool {
    let mut color: HashMap<&str, Color> = HashMap::new();

    for root in graph.task_ids().chain(graph.edges().map(|(from, _)| from)) {
        if color.contains_key(root) {
            continue;
        }

        // (node, expanded) pairs: a node is pushed once to open it and
        // revisited after its children to close it.
        let mut stack = vec![(root, false)];
        while let Some((node, expanded)) = stack.pop() {
            if expanded {
                color.insert(node, Color::Black);
                continue;
            }
            if color.contains_key(node) {
                continue;
            }
            color.insert(node, Color::Gray);
            stack.push((node, true));

            for next in graph.dependencies(node) {
                match color.get(next) {
                    Some(Color::Gray) => return true,
                    Some(Color::Black) => {}
                    None => stack.push((next, false)),
                }
            }
        }
    }

    false
}

// ---------------------------------------------------------------------------
// DFS internals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    /// On the DFS stack.
    Gray,
    /// Fully processed.
    Black,
}

/// DFS from `start` following DependsOn edges, looking for `target`.
///
/// Returns the child → parent map of the traversal if `target` is reached.
fn find_path<'a>(
    graph: &'a GraphSnapshot,
    start: &'a str,
    target: &str,
) -> Option<HashMap<&'a str, &'a str>> {
    let mut visited: HashSet<&str> = HashSet::new();
    let mut parent_map: HashMap<&str, &str> = HashMap::new();
    let mut stack = vec![start];

    while let Some(node) = stack.pop() {
        if node == target {
            return Some(parent_map);
        }
        if !visited.insert(node) {
            continue;
        }
        for next in graph.dependencies(node) {
            if !visited.contains(next) {
                parent_map.entry(next).or_insert(node);
                stack.push(next);
            }
        }
    }

    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
