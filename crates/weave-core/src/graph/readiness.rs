//! Readiness: whether a task's dependencies no longer hold it back.
//!
//! # Scheduling semantics
//!
//! A dependency **holds back** its dependent when it is `Blocked`, or, under
//! the strict policy (`require_resolved`), when it is anything but `Done`.
//! A task is **ready** when no dependency holds it back.
//!
//! By default only direct dependencies are consulted. The transitive mode
//! walks the whole dependency closure instead; it must be selected
//! explicitly through [`ReadinessPolicy`] and is never switched on implicitly.
//!
//! A dependency id missing from the snapshot counts as holding the task back.
//! The store's foreign keys make that unreachable for committed data.

#![allow(clippy::module_name_repetitions, clippy::must_use_candidate)]

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use super::cycles::{self, CyclePath};
use super::order;
use super::snapshot::GraphSnapshot;
use crate::model::TaskStatus;

/// Which dependencies a readiness check consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadinessMode {
    /// Only the task's own DependsOn edges.
    #[default]
    Direct,
    /// Every task reachable along DependsOn edges.
    Transitive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReadinessPolicy {
    pub mode: ReadinessMode,
    /// Dependencies must also be `Done`, not merely unblocked.
    pub require_resolved: bool,
}

impl ReadinessPolicy {
    /// Whether a dependency in `status` lets its dependents proceed.
    pub const fn satisfies(self, status: TaskStatus) -> bool {
        if status.is_blocked() {
            return false;
        }
        !self.require_resolved || status.is_resolved()
    }
}

/// Pure computations over a [`GraphSnapshot`]: readiness, cycle checks,
/// ordering. Holds only its immutable policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DependencyResolver {
    policy: ReadinessPolicy,
}

impl DependencyResolver {
    pub const fn new(policy: ReadinessPolicy) -> Self {
        Self { policy }
    }

    pub const fn policy(&self) -> ReadinessPolicy {
        self.policy
    }

    /// `true` iff no consulted dependency of `task_id` holds it back.
    pub fn is_ready(&self, task_id: &str, graph: &GraphSnapshot) -> bool {
        self.unmet_dependencies(task_id, graph).is_empty()
    }

    /// Dependencies that hold `task_id` back, sorted.
    pub fn unmet_dependencies(&self, task_id: &str, graph: &GraphSnapshot) -> Vec<String> {
        let consulted: BTreeSet<&str> = match self.policy.mode {
            ReadinessMode::Direct => graph.dependencies(task_id).collect(),
            ReadinessMode::Transitive => dependency_closure(task_id, graph),
        };

        consulted
            .into_iter()
            .filter(|dep| {
                !graph
                    .status(dep)
                    .is_some_and(|status| self.policy.satisfies(status))
            })
            .map(str::to_string)
            .collect()
    }

    /// Tasks that could be picked up now: ready, and neither done nor
    /// blocked themselves. Sorted by id.
    pub fn ready_tasks(&self, graph: &GraphSnapshot) -> Vec<String> {
        graph
            .tasks()
            .filter(|node| !matches!(node.status, TaskStatus::Done | TaskStatus::Blocked))
            .filter(|node| self.is_ready(&node.id, graph))
            .map(|node| node.id.clone())
            .collect()
    }

    /// See [`cycles::detect_cycle_on_add`].
    pub fn would_create_cycle(
        &self,
        from: &str,
        to: &str,
        graph: &GraphSnapshot,
    ) -> Option<CyclePath> {
        cycles::detect_cycle_on_add(graph, from, to)
    }

    pub fn has_cycles(&self, graph: &GraphSnapshot) -> bool {
        cycles::has_cycles(graph)
    }

    /// Topological order, dependencies first. `None` if the graph is cyclic.
    pub fn execution_order(&self, graph: &GraphSnapshot) -> Option<Vec<String>> {
        order::execution_order(graph)
    }
}

/// All tasks reachable from `task_id` along DependsOn edges, excluding itself.
fn dependency_closure<'a>(task_id: &str, graph: &'a GraphSnapshot) -> BTreeSet<&'a str> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut closure = BTreeSet::new();
    let mut stack: Vec<&str> = graph.dependencies(task_id).collect();

    while let Some(dep) = stack.pop() {
        if !seen.insert(dep) {
            continue;
        }
        if dep != task_id {
            closure.insert(dep);
        }
        stack.extend(graph.dependencies(dep));
    }

    closure
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
