use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::graph::CyclePath;
use crate::model::InvalidTransition;

/// Machine-readable error codes for callers that branch on failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    ProjectNotFound,
    TaskNotFound,
    ProjectExists,
    TaskExists,
    CycleDetected,
    InvalidArgument,
    InvalidStatusTransition,
    CorruptGraph,
    StoreFailure,
    DeadlineExceeded,
    InternalUnexpected,
}

/// Coarse classes a transport maps to its own status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorClass {
    NotFound,
    AlreadyExists,
    InvalidArgument,
    Internal,
}

impl ErrorClass {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not-found",
            Self::AlreadyExists => "already-exists",
            Self::InvalidArgument => "invalid-argument",
            Self::Internal => "internal",
        }
    }
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::ProjectNotFound => "E2001",
            Self::TaskNotFound => "E2002",
            Self::ProjectExists => "E2003",
            Self::TaskExists => "E2004",
            Self::CycleDetected => "E2005",
            Self::InvalidArgument => "E2006",
            Self::InvalidStatusTransition => "E2007",
            Self::CorruptGraph => "E3001",
            Self::StoreFailure => "E5001",
            Self::DeadlineExceeded => "E5002",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Workflow store not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::ProjectNotFound => "Project not found",
            Self::TaskNotFound => "Task not found",
            Self::ProjectExists => "Project already exists",
            Self::TaskExists => "Task already exists",
            Self::CycleDetected => "Cycle would be created",
            Self::InvalidArgument => "Invalid argument",
            Self::InvalidStatusTransition => "Invalid status transition",
            Self::CorruptGraph => "Dependency graph is corrupt",
            Self::StoreFailure => "Graph store failure",
            Self::DeadlineExceeded => "Operation deadline exceeded",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and callers.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `wv init` to create the workflow store."),
            Self::ConfigParseError => Some("Fix syntax in .weave/config.toml and retry."),
            Self::ProjectNotFound | Self::TaskNotFound | Self::TaskExists => None,
            Self::ProjectExists => Some("Pick a different project id or delete the existing workflow."),
            Self::CycleDetected => Some("Remove or adjust dependencies to keep the graph acyclic."),
            Self::InvalidArgument => None,
            Self::InvalidStatusTransition => Some(
                "Follow valid transitions: pending -> in_progress -> done; blocked -> pending.",
            ),
            Self::CorruptGraph => Some("Recreate the workflow; the stored dependencies contain a cycle."),
            Self::StoreFailure => Some("Retry the call. If persistent, check disk space and permissions."),
            Self::DeadlineExceeded => Some("Retry after concurrent writers finish."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }

    #[must_use]
    pub const fn class(self) -> ErrorClass {
        match self {
            Self::ProjectNotFound | Self::TaskNotFound => ErrorClass::NotFound,
            Self::ProjectExists | Self::TaskExists => ErrorClass::AlreadyExists,
            Self::CycleDetected | Self::InvalidArgument | Self::InvalidStatusTransition => {
                ErrorClass::InvalidArgument
            }
            Self::NotInitialized
            | Self::ConfigParseError
            | Self::CorruptGraph
            | Self::StoreFailure
            | Self::DeadlineExceeded
            | Self::InternalUnexpected => ErrorClass::Internal,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ---------------------------------------------------------------------------
// WorkflowError
// ---------------------------------------------------------------------------

/// The two node kinds an error can refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Entity {
    Project,
    Task,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Project => f.write_str("project"),
            Self::Task => f.write_str("task"),
        }
    }
}

/// Errors returned by the graph store and the workflow service.
///
/// Validation outcomes (`NotFound`, `AlreadyExists`, `CycleDetected`,
/// `InvalidArgument`, `InvalidTransition`) are deterministic. `Store` and
/// `Timeout` may be transient; the mutation that produced them was rolled
/// back.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum WorkflowError {
    #[error("{entity} '{id}' not found")]
    NotFound { entity: Entity, id: String },

    #[error("{entity} '{id}' already exists")]
    AlreadyExists { entity: Entity, id: String },

    #[error("{0}")]
    CycleDetected(CyclePath),

    #[error("invalid {field}: {reason}")]
    InvalidArgument { field: &'static str, reason: String },

    #[error("task '{task_id}': {source}")]
    InvalidTransition {
        task_id: String,
        #[source]
        source: InvalidTransition,
    },

    #[error("stored dependencies of project '{project_id}' contain a cycle")]
    CorruptGraph { project_id: String },

    #[error("store error during {op}: {source}")]
    Store {
        op: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("{op} exceeded its {budget:?} deadline")]
    Timeout { op: &'static str, budget: Duration },
}

impl WorkflowError {
    pub fn not_found(entity: Entity, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn already_exists(entity: Entity, id: impl Into<String>) -> Self {
        Self::AlreadyExists {
            entity,
            id: id.into(),
        }
    }

    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field,
            reason: reason.into(),
        }
    }

    /// Wrap a SQLite failure, classifying lock contention that outlived the
    /// busy timeout as a deadline overrun.
    #[must_use]
    pub fn from_sqlite(op: &'static str, budget: Duration, source: rusqlite::Error) -> Self {
        match source.sqlite_error_code() {
            Some(rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked) => {
                Self::Timeout { op, budget }
            }
            _ => Self::Store { op, source },
        }
    }

    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound {
                entity: Entity::Project,
                ..
            } => ErrorCode::ProjectNotFound,
            Self::NotFound {
                entity: Entity::Task,
                ..
            } => ErrorCode::TaskNotFound,
            Self::AlreadyExists {
                entity: Entity::Project,
                ..
            } => ErrorCode::ProjectExists,
            Self::AlreadyExists {
                entity: Entity::Task,
                ..
            } => ErrorCode::TaskExists,
            Self::CycleDetected(_) => ErrorCode::CycleDetected,
            Self::InvalidArgument { .. } => ErrorCode::InvalidArgument,
            Self::InvalidTransition { .. } => ErrorCode::InvalidStatusTransition,
            Self::CorruptGraph { .. } => ErrorCode::CorruptGraph,
            Self::Store { .. } => ErrorCode::StoreFailure,
            Self::Timeout { .. } => ErrorCode::DeadlineExceeded,
        }
    }

    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        self.code().class()
    }

    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }

    /// Whether retrying the same call can succeed without other changes.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Store { .. } | Self::Timeout { .. })
    }
}

pub type Result<T, E = WorkflowError> = std::result::Result<T, E>;
