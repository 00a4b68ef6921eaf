//! The graph store: transactional CRUD over projects, tasks, and DependsOn
//! edges.
//!
//! # Transactions
//!
//! Every call opens its own connection and runs as exactly one SQLite
//! transaction:
//!
//! - writes use `BEGIN IMMEDIATE`, taking the reserved lock up front, so
//!   writers are serialized and a cycle check always sees every committed
//!   edge
//! - reads use a deferred transaction over a WAL snapshot and never block
//!   writers
//!
//! A failed write drops its transaction without committing, which rolls it
//! back. Callers never observe a partial mutation.
//!
//! # Deadlines
//!
//! Each call starts a [`Deadline`]. The connection's busy timeout is set to
//! the remaining budget, and the budget is re-checked before commit.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Connection, OpenFlags, Transaction, TransactionBehavior, params};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::deadline::{DEFAULT_DEADLINE, Deadline};
use super::query::{self, SnapshotScope};
use crate::error::{Entity, Result, WorkflowError};
use crate::graph::{DependencyResolver, GraphSnapshot};
use crate::model::{NewTask, Project, Task, TaskStatus, WorkflowSummary};

/// Knobs fixed for the lifetime of a [`GraphStore`] handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    /// Budget for each store call.
    pub deadline: Duration,
    /// Allow a task to depend on a task owned by another project.
    pub cross_project_dependencies: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            deadline: DEFAULT_DEADLINE,
            cross_project_dependencies: false,
        }
    }
}

/// A project with its owned tasks and their outgoing DependsOn edges, read in
/// one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectGraph {
    pub project: Project,
    /// In insertion order.
    pub tasks: Vec<Task>,
    /// `(task, depends_on)` pairs sorted by both columns.
    pub edges: Vec<(String, String)>,
}

/// What a cascade delete removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeleteStats {
    pub tasks: usize,
    pub edges: usize,
    /// Of `edges`, those owned by tasks of other projects that depended on
    /// the deleted tasks. Only non-zero with cross-project dependencies on.
    pub foreign_edges: usize,
}

/// Result of a status update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusChange {
    pub task_id: String,
    pub from: TaskStatus,
    pub to: TaskStatus,
}

impl StatusChange {
    #[must_use]
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

/// Handle to the SQLite-backed workflow graph.
///
/// Cloning is cheap; clones share nothing but the database path, so they can
/// be moved freely across threads.
#[derive(Debug, Clone)]
pub struct GraphStore {
    path: PathBuf,
    options: StoreOptions,
    /// Cycle checks on the write path. They ignore the readiness policy, so
    /// the default resolver serves every caller.
    resolver: DependencyResolver,
}

trait SqlResultExt<T> {
    fn during(self, op: &'static str, deadline: &Deadline) -> Result<T>;
}

impl<T> SqlResultExt<T> for rusqlite::Result<T> {
    fn during(self, op: &'static str, deadline: &Deadline) -> Result<T> {
        self.map_err(|source| WorkflowError::from_sqlite(op, deadline.budget(), source))
    }
}

fn now_us() -> i64 {
    chrono::Utc::now().timestamp_micros()
}

impl GraphStore {
    /// Open the store at `path`, creating and migrating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created, configured, or
    /// migrated.
    pub fn open(path: impl Into<PathBuf>, options: StoreOptions) -> anyhow::Result<Self> {
        let path = path.into();
        let conn = super::open_store(&path, options.deadline)?;
        drop(conn);
        debug!(path = %path.display(), "graph store ready");
        Ok(Self {
            path,
            options,
            resolver: DependencyResolver::default(),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub const fn options(&self) -> StoreOptions {
        self.options
    }

    // -----------------------------------------------------------------------
    // Projects
    // -----------------------------------------------------------------------

    /// Create an empty project.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` if the id is taken, `Store`/`Timeout` on SQLite
    /// failures.
    #[instrument(skip(self))]
    pub fn create_project(&self, project_id: &str, name: &str) -> Result<Project> {
        const OP: &str = "create_project";
        let project = self.write(OP, |tx, deadline| {
            if query::project_exists(tx, project_id).during(OP, deadline)? {
                return Err(WorkflowError::already_exists(Entity::Project, project_id));
            }
            let created_at_us = now_us();
            tx.execute(
                "INSERT INTO projects (project_id, name, created_at_us) VALUES (?1, ?2, ?3)",
                params![project_id, name, created_at_us],
            )
            .during(OP, deadline)?;
            Ok(Project {
                id: project_id.to_string(),
                name: name.to_string(),
                created_at_us,
            })
        })?;
        info!(project_id, "created project");
        Ok(project)
    }

    /// Read a project with its tasks and their outgoing edges.
    ///
    /// # Errors
    ///
    /// `NotFound` if the project is absent, `Store`/`Timeout` on SQLite
    /// failures.
    #[instrument(skip(self))]
    pub fn get_project(&self, project_id: &str) -> Result<ProjectGraph> {
        const OP: &str = "get_project";
        self.read(OP, |tx, deadline| {
            let project = query::get_project(tx, project_id)
                .during(OP, deadline)?
                .ok_or_else(|| WorkflowError::not_found(Entity::Project, project_id))?;
            let tasks = query::list_project_tasks(tx, project_id).during(OP, deadline)?;
            let edges = query::list_project_edges(tx, project_id).during(OP, deadline)?;
            Ok(ProjectGraph {
                project,
                tasks,
                edges,
            })
        })
    }

    /// Delete a project, every task it owns, and every DependsOn edge
    /// touching those tasks, in one transaction.
    ///
    /// Edges from other projects' tasks into this one are removed too and
    /// counted in [`DeleteStats::foreign_edges`], so the loss is visible to
    /// the caller.
    ///
    /// # Errors
    ///
    /// `NotFound` if the project is absent, `Store`/`Timeout` on SQLite
    /// failures. Nothing is deleted on error.
    #[instrument(skip(self))]
    pub fn delete_project(&self, project_id: &str) -> Result<DeleteStats> {
        const OP: &str = "delete_project";
        let stats = self.write(OP, |tx, deadline| {
            if !query::project_exists(tx, project_id).during(OP, deadline)? {
                return Err(WorkflowError::not_found(Entity::Project, project_id));
            }
            let foreign_edges: usize = tx
                .query_row(
                    "SELECT COUNT(*) FROM task_dependencies d \
                     JOIN tasks t ON t.task_id = d.task_id \
                     WHERE t.project_id <> ?1 \
                       AND d.depends_on_task_id IN \
                           (SELECT task_id FROM tasks WHERE project_id = ?1)",
                    params![project_id],
                    |row| row.get(0),
                )
                .during(OP, deadline)?;
            let edges = tx
                .execute(
                    "DELETE FROM task_dependencies \
                     WHERE task_id IN (SELECT task_id FROM tasks WHERE project_id = ?1) \
                        OR depends_on_task_id IN (SELECT task_id FROM tasks WHERE project_id = ?1)",
                    params![project_id],
                )
                .during(OP, deadline)?;
            deadline.check(OP)?;
            let tasks = tx
                .execute("DELETE FROM tasks WHERE project_id = ?1", params![project_id])
                .during(OP, deadline)?;
            tx.execute("DELETE FROM projects WHERE project_id = ?1", params![project_id])
                .during(OP, deadline)?;
            Ok(DeleteStats {
                tasks,
                edges,
                foreign_edges,
            })
        })?;
        if stats.foreign_edges > 0 {
            warn!(
                project_id,
                foreign_edges = stats.foreign_edges,
                "removed dependencies held by tasks of other projects"
            );
        }
        info!(
            project_id,
            tasks = stats.tasks,
            edges = stats.edges,
            foreign_edges = stats.foreign_edges,
            "deleted project"
        );
        Ok(stats)
    }

    /// All projects with their task counts, ordered by id.
    ///
    /// # Errors
    ///
    /// `Store`/`Timeout` on SQLite failures.
    #[instrument(skip(self))]
    pub fn list_projects(&self) -> Result<Vec<WorkflowSummary>> {
        const OP: &str = "list_projects";
        self.read(OP, |tx, deadline| query::list_projects(tx).during(OP, deadline))
    }

    // -----------------------------------------------------------------------
    // Tasks and edges
    // -----------------------------------------------------------------------

    /// Create a task under `project_id` together with all of its DependsOn
    /// edges.
    ///
    /// Validation happens before any row is written; if any dependency is
    /// missing, owned by another project (unless allowed), or would close a
    /// cycle, nothing is created.
    ///
    /// # Errors
    ///
    /// `NotFound` for a missing project or dependency, `AlreadyExists` if the
    /// task id is taken, `CycleDetected` for a self-dependency,
    /// `InvalidArgument` for a disallowed cross-project dependency,
    /// `Store`/`Timeout` on SQLite failures.
    #[instrument(skip(self, task), fields(task_id = %task.id))]
    pub fn create_task(&self, project_id: &str, task: &NewTask) -> Result<Task> {
        const OP: &str = "create_task";
        let dependencies = task.unique_dependencies();
        let created = self.write(OP, |tx, deadline| {
            if !query::project_exists(tx, project_id).during(OP, deadline)? {
                return Err(WorkflowError::not_found(Entity::Project, project_id));
            }
            if query::task_exists(tx, &task.id).during(OP, deadline)? {
                return Err(WorkflowError::already_exists(Entity::Task, task.id.as_str()));
            }
            for dep in dependencies.iter().filter(|dep| **dep != task.id) {
                self.require_dependency(tx, deadline, OP, project_id, dep)?;
            }

            let mut graph = self.cycle_snapshot(tx, deadline, OP, project_id)?;
            let status = task.initial_status();
            graph.insert_task(task.id.as_str(), project_id, status);
            for dep in &dependencies {
                if let Some(cycle) = self.resolver.would_create_cycle(&task.id, dep, &graph) {
                    warn!(%cycle, "rejected dependency");
                    return Err(WorkflowError::CycleDetected(cycle));
                }
                graph.add_edge(task.id.as_str(), *dep);
            }
            deadline.check(OP)?;

            let now = now_us();
            tx.execute(
                "INSERT INTO tasks \
                 (task_id, project_id, name, description, status, created_at_us, updated_at_us) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![task.id, project_id, task.name, task.description, status, now],
            )
            .during(OP, deadline)?;
            for dep in &dependencies {
                tx.execute(
                    "INSERT INTO task_dependencies (task_id, depends_on_task_id, created_at_us) \
                     VALUES (?1, ?2, ?3)",
                    params![task.id, dep, now],
                )
                .during(OP, deadline)?;
            }

            Ok(Task {
                id: task.id.clone(),
                project_id: project_id.to_string(),
                name: task.name.clone(),
                description: task.description.clone(),
                status,
                created_at_us: now,
                updated_at_us: now,
            })
        })?;
        info!(
            project_id,
            dependencies = dependencies.len(),
            status = %created.status,
            "created task"
        );
        Ok(created)
    }

    /// Add one DependsOn edge between two existing tasks.
    ///
    /// Returns `false` if the edge was already present.
    ///
    /// # Errors
    ///
    /// `NotFound` if the project is absent, `task_id` is not owned by it, or
    /// `depends_on` does not exist. `CycleDetected` if the edge would close a
    /// cycle. `InvalidArgument` for a disallowed cross-project dependency.
    #[instrument(skip(self))]
    pub fn add_dependency_edge(
        &self,
        project_id: &str,
        task_id: &str,
        depends_on: &str,
    ) -> Result<bool> {
        const OP: &str = "add_dependency";
        let inserted = self.write(OP, |tx, deadline| {
            require_owned_task(tx, deadline, OP, project_id, task_id)?;
            if task_id != depends_on {
                self.require_dependency(tx, deadline, OP, project_id, depends_on)?;
            }

            let graph = self.cycle_snapshot(tx, deadline, OP, project_id)?;
            if graph.has_edge(task_id, depends_on) {
                debug!("dependency already present");
                return Ok(false);
            }
            if let Some(cycle) = self.resolver.would_create_cycle(task_id, depends_on, &graph) {
                warn!(%cycle, "rejected dependency");
                return Err(WorkflowError::CycleDetected(cycle));
            }
            deadline.check(OP)?;

            tx.execute(
                "INSERT INTO task_dependencies (task_id, depends_on_task_id, created_at_us) \
                 VALUES (?1, ?2, ?3)",
                params![task_id, depends_on, now_us()],
            )
            .during(OP, deadline)?;
            Ok(true)
        })?;
        if inserted {
            info!(project_id, task_id, depends_on, "added dependency");
        }
        Ok(inserted)
    }

    /// Move a task to `target`, validated against the status transition
    /// table. Setting the current status again is a no-op.
    ///
    /// # Errors
    ///
    /// `NotFound` if the project is absent or does not own the task,
    /// `InvalidTransition` for a disallowed move.
    #[instrument(skip(self))]
    pub fn set_task_status(
        &self,
        project_id: &str,
        task_id: &str,
        target: TaskStatus,
    ) -> Result<StatusChange> {
        self.transition(project_id, task_id, |_| target)
    }

    /// Block a task, or unblock it back to `Pending`. Repeating the current
    /// state is a no-op.
    ///
    /// # Errors
    ///
    /// As for [`Self::set_task_status`]; blocking a `Done` task is an invalid
    /// transition.
    #[instrument(skip(self))]
    pub fn set_task_blocked(
        &self,
        project_id: &str,
        task_id: &str,
        blocked: bool,
    ) -> Result<StatusChange> {
        self.transition(project_id, task_id, |current| match (blocked, current) {
            (true, _) => TaskStatus::Blocked,
            (false, TaskStatus::Blocked) => TaskStatus::Pending,
            (false, other) => other,
        })
    }

    fn transition(
        &self,
        project_id: &str,
        task_id: &str,
        choose: impl FnOnce(TaskStatus) -> TaskStatus,
    ) -> Result<StatusChange> {
        const OP: &str = "set_task_status";
        let change = self.write(OP, |tx, deadline| {
            let task = require_owned_task(tx, deadline, OP, project_id, task_id)?;
            let target = choose(task.status);
            let change = StatusChange {
                task_id: task.id,
                from: task.status,
                to: target,
            };
            if !change.changed() {
                return Ok(change);
            }
            change
                .from
                .can_transition_to(target)
                .map_err(|source| WorkflowError::InvalidTransition {
                    task_id: task_id.to_string(),
                    source,
                })?;
            tx.execute(
                "UPDATE tasks SET status = ?1, updated_at_us = ?2 WHERE task_id = ?3",
                params![target, now_us(), task_id],
            )
            .during(OP, deadline)?;
            Ok(change)
        })?;
        if change.changed() {
            info!(
                project_id,
                task_id,
                from = %change.from,
                to = %change.to,
                "task status changed"
            );
        }
        Ok(change)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// The project and a snapshot of its tasks and edges, read together.
    ///
    /// Dependencies owned by other projects appear as nodes so their status
    /// is visible to readiness checks. With `whole_store` the snapshot covers
    /// every project, which transitive checks over cross-project edges need.
    ///
    /// # Errors
    ///
    /// `NotFound` if the project is absent.
    #[instrument(skip(self))]
    pub fn load_snapshot(
        &self,
        project_id: &str,
        whole_store: bool,
    ) -> Result<(Project, GraphSnapshot)> {
        const OP: &str = "load_snapshot";
        self.read(OP, |tx, deadline| {
            let project = query::get_project(tx, project_id)
                .during(OP, deadline)?
                .ok_or_else(|| WorkflowError::not_found(Entity::Project, project_id))?;
            let scope = if whole_store {
                SnapshotScope::All
            } else {
                SnapshotScope::Project(project_id)
            };
            let graph = query::load_snapshot(tx, scope).during(OP, deadline)?;
            Ok((project, graph))
        })
    }

    /// Status of a task in any project, `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// `Store`/`Timeout` on SQLite failures.
    #[instrument(skip(self))]
    pub fn task_status(&self, task_id: &str) -> Result<Option<TaskStatus>> {
        const OP: &str = "task_status";
        self.read(OP, |tx, deadline| query::task_status(tx, task_id).during(OP, deadline))
    }

    /// Whether a task exists in any project.
    ///
    /// # Errors
    ///
    /// `Store`/`Timeout` on SQLite failures.
    #[instrument(skip(self))]
    pub fn task_exists(&self, task_id: &str) -> Result<bool> {
        const OP: &str = "task_exists";
        self.read(OP, |tx, deadline| query::task_exists(tx, task_id).during(OP, deadline))
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn connect(&self, deadline: &Deadline, op: &'static str) -> Result<Connection> {
        deadline.check(op)?;
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(&self.path, flags).during(op, deadline)?;
        super::configure_connection(&conn, deadline.remaining()).during(op, deadline)?;
        Ok(conn)
    }

    fn write<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&Transaction<'_>, &Deadline) -> Result<T>,
    ) -> Result<T> {
        let deadline = Deadline::start(self.options.deadline);
        let mut conn = self.connect(&deadline, op)?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .during(op, &deadline)?;
        let value = f(&tx, &deadline)?;
        deadline.check(op)?;
        tx.commit().during(op, &deadline)?;
        Ok(value)
    }

    fn read<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&Transaction<'_>, &Deadline) -> Result<T>,
    ) -> Result<T> {
        let deadline = Deadline::start(self.options.deadline);
        let mut conn = self.connect(&deadline, op)?;
        let tx = conn.transaction().during(op, &deadline)?;
        let value = f(&tx, &deadline)?;
        deadline.check(op)?;
        Ok(value)
    }

    /// Check that `dep` exists and may be depended on from `project_id`.
    fn require_dependency(
        &self,
        tx: &Transaction<'_>,
        deadline: &Deadline,
        op: &'static str,
        project_id: &str,
        dep: &str,
    ) -> Result<()> {
        let target = query::get_task(tx, dep)
            .during(op, deadline)?
            .ok_or_else(|| WorkflowError::not_found(Entity::Task, dep))?;
        if target.project_id != project_id && !self.options.cross_project_dependencies {
            return Err(WorkflowError::invalid(
                "dependencies",
                format!(
                    "task '{dep}' belongs to project '{}', not '{project_id}'",
                    target.project_id
                ),
            ));
        }
        Ok(())
    }

    /// Snapshot wide enough to see every cycle a new edge from `project_id`
    /// could close: the project alone while its edges stay inside it, the
    /// whole store otherwise.
    fn cycle_snapshot(
        &self,
        tx: &Transaction<'_>,
        deadline: &Deadline,
        op: &'static str,
        project_id: &str,
    ) -> Result<GraphSnapshot> {
        if !self.options.cross_project_dependencies {
            let graph =
                query::load_snapshot(tx, SnapshotScope::Project(project_id)).during(op, deadline)?;
            let self_contained = graph.tasks().all(|node| node.project_id == project_id)
                && !query::has_incoming_foreign_edges(tx, project_id).during(op, deadline)?;
            if self_contained {
                return Ok(graph);
            }
        }
        query::load_snapshot(tx, SnapshotScope::All).during(op, deadline)
    }
}

/// The task, if it exists and `project_id` owns it. A missing project is
/// reported before a missing task.
fn require_owned_task(
    tx: &Transaction<'_>,
    deadline: &Deadline,
    op: &'static str,
    project_id: &str,
    task_id: &str,
) -> Result<Task> {
    if !query::project_exists(tx, project_id).during(op, deadline)? {
        return Err(WorkflowError::not_found(Entity::Project, project_id));
    }
    query::get_task(tx, task_id)
        .during(op, deadline)?
        .filter(|task| task.project_id == project_id)
        .ok_or_else(|| WorkflowError::not_found(Entity::Task, task_id))
}
