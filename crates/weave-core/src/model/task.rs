use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// The four task states.
///
/// `Blocked` is an explicit state rather than a flag next to the lifecycle:
/// a task is blocked only when someone marks it so, and readiness of its
/// dependents is derived from this state alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Done,
    Blocked,
}

impl TaskStatus {
    pub const ALL: [Self; 4] = [Self::Pending, Self::InProgress, Self::Done, Self::Blocked];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Done => "done",
            Self::Blocked => "blocked",
        }
    }

    #[must_use]
    pub const fn is_blocked(self) -> bool {
        matches!(self, Self::Blocked)
    }

    /// Terminal "resolved" state used by the strict readiness policy.
    #[must_use]
    pub const fn is_resolved(self) -> bool {
        matches!(self, Self::Done)
    }

    /// Validate whether a transition from self to `target` is allowed.
    ///
    /// Valid transitions:
    /// - `pending -> in_progress | done | blocked`
    /// - `in_progress -> done | pending | blocked`
    /// - `blocked -> pending | in_progress` (unblock)
    /// - `done -> pending` (reopen)
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] for no-op and disallowed transitions.
    pub fn can_transition_to(self, target: Self) -> Result<(), InvalidTransition> {
        if self == target {
            return Err(InvalidTransition {
                from: self,
                to: target,
                reason: "no-op transition is not allowed",
            });
        }

        let allowed = matches!(
            (self, target),
            (Self::Pending, Self::InProgress | Self::Done | Self::Blocked)
                | (Self::InProgress, Self::Done | Self::Pending | Self::Blocked)
                | (Self::Blocked, Self::Pending | Self::InProgress)
                | (Self::Done, Self::Pending)
        );

        if allowed {
            Ok(())
        } else {
            Err(InvalidTransition {
                from: self,
                to: target,
                reason: "transition not allowed by lifecycle rules",
            })
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown status string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown task status '{0}': expected one of pending, in_progress, done, blocked")]
pub struct ParseStatusError(pub String);

impl FromStr for TaskStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" | "todo" => Ok(Self::Pending),
            "in_progress" | "in-progress" | "doing" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            "blocked" => Ok(Self::Blocked),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

/// A rejected status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot move from {from} to {to}: {reason}")]
pub struct InvalidTransition {
    pub from: TaskStatus,
    pub to: TaskStatus,
    pub reason: &'static str,
}

/// A project row: the root of one workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub created_at_us: i64,
}

/// A task row together with its owning project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub description: String,
    pub status: TaskStatus,
    pub created_at_us: i64,
    pub updated_at_us: i64,
}

impl Task {
    #[must_use]
    pub const fn is_blocked(&self) -> bool {
        self.status.is_blocked()
    }
}

/// Input for adding a task to a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NewTask {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Ids of tasks this task depends on. Duplicates collapse to one edge.
    pub dependencies: Vec<String>,
    pub blocked: bool,
}

impl NewTask {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn depends_on<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.extend(ids.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn blocked(mut self, blocked: bool) -> Self {
        self.blocked = blocked;
        self
    }

    /// Status the task row is created with.
    #[must_use]
    pub const fn initial_status(&self) -> TaskStatus {
        if self.blocked {
            TaskStatus::Blocked
        } else {
            TaskStatus::Pending
        }
    }

    /// Dependency ids in first-seen order with duplicates removed.
    #[must_use]
    pub fn unique_dependencies(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        self.dependencies
            .iter()
            .map(String::as_str)
            .filter(|id| seen.insert(*id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_str() {
        for status in TaskStatus::ALL {
            assert_eq!(status.as_str().parse::<TaskStatus>(), Ok(status));
        }
        assert_eq!("In-Progress".parse::<TaskStatus>(), Ok(TaskStatus::InProgress));
        assert!("archived".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&TaskStatus::InProgress).expect("serialize");
        assert_eq!(json, "\"in_progress\"");
    }

    #[test]
    fn lifecycle_transitions() {
        use TaskStatus::{Blocked, Done, InProgress, Pending};

        assert!(Pending.can_transition_to(InProgress).is_ok());
        assert!(Pending.can_transition_to(Blocked).is_ok());
        assert!(InProgress.can_transition_to(Done).is_ok());
        assert!(Blocked.can_transition_to(Pending).is_ok());
        assert!(Done.can_transition_to(Pending).is_ok());

        assert!(Done.can_transition_to(Blocked).is_err());
        assert!(Blocked.can_transition_to(Done).is_err());
        assert!(Done.can_transition_to(InProgress).is_err());
    }

    #[test]
    fn no_op_transition_is_rejected() {
        let err = TaskStatus::Pending
            .can_transition_to(TaskStatus::Pending)
            .expect_err("no-op must fail");
        assert_eq!(err.reason, "no-op transition is not allowed");
    }

    #[test]
    fn unique_dependencies_keeps_first_seen_order() {
        let task = NewTask::new("t3", "Test").depends_on(["t2", "t1", "t2"]);
        assert_eq!(task.unique_dependencies(), vec!["t2", "t1"]);
    }

    #[test]
    fn blocked_flag_sets_initial_status() {
        assert_eq!(NewTask::new("a", "A").initial_status(), TaskStatus::Pending);
        assert_eq!(
            NewTask::new("a", "A").blocked(true).initial_status(),
            TaskStatus::Blocked
        );
    }
}
