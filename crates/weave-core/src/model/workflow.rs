//! Read-side views returned by the workflow service.

use serde::{Deserialize, Serialize};

use super::task::TaskStatus;

/// A project with all of its tasks and their outgoing dependency edges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
    pub project_id: String,
    pub project_name: String,
    /// Tasks in insertion order.
    pub tasks: Vec<WorkflowTask>,
}

impl Workflow {
    #[must_use]
    pub fn task(&self, task_id: &str) -> Option<&WorkflowTask> {
        self.tasks.iter().find(|task| task.id == task_id)
    }

    #[must_use]
    pub fn task_ids(&self) -> Vec<&str> {
        self.tasks.iter().map(|task| task.id.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowTask {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Ids this task depends on, sorted.
    pub dependencies: Vec<String>,
    pub blocked: bool,
    pub status: TaskStatus,
}

/// Result of a readiness check for one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyCheck {
    pub all_dependencies_met: bool,
    /// Dependencies that keep the task from being ready, sorted.
    pub unmet: Vec<String>,
}

impl DependencyCheck {
    #[must_use]
    pub fn from_unmet(unmet: Vec<String>) -> Self {
        Self {
            all_dependencies_met: unmet.is_empty(),
            unmet,
        }
    }
}

/// One row of the workflow listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowSummary {
    pub project_id: String,
    pub project_name: String,
    pub task_count: usize,
}
