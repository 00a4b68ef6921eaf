//! Immutable view of the dependency graph read inside one store transaction.
//!
//! The snapshot is what the resolver computes over. It is built by the graph
//! store and never written back; the store mutates SQLite and, when it needs
//! to keep checking within the same transaction, updates its local snapshot
//! copy with [`GraphSnapshot::add_edge`].

use std::collections::{BTreeMap, BTreeSet};

use crate::model::TaskStatus;

/// A task as the resolver sees it: identity, owner, and status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskNode {
    pub id: String,
    pub project_id: String,
    pub status: TaskStatus,
}

/// Task nodes plus DependsOn adjacency (task → tasks it depends on).
///
/// Ordered maps keep every derived listing deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphSnapshot {
    tasks: BTreeMap<String, TaskNode>,
    depends_on: BTreeMap<String, BTreeSet<String>>,
}

impl GraphSnapshot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_task(
        &mut self,
        id: impl Into<String>,
        project_id: impl Into<String>,
        status: TaskStatus,
    ) {
        let id = id.into();
        self.tasks.insert(
            id.clone(),
            TaskNode {
                id,
                project_id: project_id.into(),
                status,
            },
        );
    }

    /// Record `from` depends on `to`. Returns `false` if the edge was present.
    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<String>) -> bool {
        self.depends_on
            .entry(from.into())
            .or_default()
            .insert(to.into())
    }

    #[must_use]
    pub fn contains(&self, task_id: &str) -> bool {
        self.tasks.contains_key(task_id)
    }

    #[must_use]
    pub fn task(&self, task_id: &str) -> Option<&TaskNode> {
        self.tasks.get(task_id)
    }

    #[must_use]
    pub fn status(&self, task_id: &str) -> Option<TaskStatus> {
        self.tasks.get(task_id).map(|node| node.status)
    }

    #[must_use]
    pub fn has_edge(&self, from: &str, to: &str) -> bool {
        self.depends_on
            .get(from)
            .is_some_and(|targets| targets.contains(to))
    }

    /// Direct dependencies of `task_id`, sorted.
    pub fn dependencies<'a>(&'a self, task_id: &str) -> impl Iterator<Item = &'a str> + use<'a> {
        self.depends_on
            .get(task_id)
            .into_iter()
            .flat_map(|targets| targets.iter().map(String::as_str))
    }

    pub fn task_ids(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(String::as_str)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &TaskNode> {
        self.tasks.values()
    }

    /// Every DependsOn edge as `(from, to)`.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.depends_on.iter().flat_map(|(from, targets)| {
            targets
                .iter()
                .map(move |to| (from.as_str(), to.as_str()))
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.depends_on.values().map(BTreeSet::len).sum()
    }
}
