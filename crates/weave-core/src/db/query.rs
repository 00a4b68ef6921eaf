//! Typed read queries over the graph store.
//!
//! Every function takes a shared `&Connection` (a [`rusqlite::Transaction`]
//! derefs to one) and returns typed structs, never raw rows. Callers decide
//! which transaction the reads belong to.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OptionalExtension, params};

use crate::graph::GraphSnapshot;
use crate::model::{Project, Task, TaskStatus, WorkflowSummary};

impl FromSql for TaskStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

impl ToSql for TaskStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

/// Which tasks a snapshot covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotScope<'a> {
    Project(&'a str),
    All,
}

/// Whether a project row exists.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn project_exists(conn: &Connection, project_id: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM projects WHERE project_id = ?1)",
        params![project_id],
        |row| row.get(0),
    )
}

/// Whether a task row exists in any project.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn task_exists(conn: &Connection, task_id: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM tasks WHERE task_id = ?1)",
        params![task_id],
        |row| row.get(0),
    )
}

/// Fetch a project by id.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_project(conn: &Connection, project_id: &str) -> rusqlite::Result<Option<Project>> {
    conn.query_row(
        "SELECT project_id, name, created_at_us FROM projects WHERE project_id = ?1",
        params![project_id],
        |row| {
            Ok(Project {
                id: row.get(0)?,
                name: row.get(1)?,
                created_at_us: row.get(2)?,
            })
        },
    )
    .optional()
}

/// Fetch a task by id regardless of owner.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_task(conn: &Connection, task_id: &str) -> rusqlite::Result<Option<Task>> {
    conn.query_row(
        "SELECT task_id, project_id, name, description, status, created_at_us, updated_at_us \
         FROM tasks WHERE task_id = ?1",
        params![task_id],
        row_to_task,
    )
    .optional()
}

/// Current status of a task, `None` if the task does not exist.
///
/// # Errors
///
/// Returns an error if the query fails or the stored status is unknown.
pub fn task_status(conn: &Connection, task_id: &str) -> rusqlite::Result<Option<TaskStatus>> {
    conn.query_row(
        "SELECT status FROM tasks WHERE task_id = ?1",
        params![task_id],
        |row| row.get(0),
    )
    .optional()
}

/// Tasks owned by a project, in insertion order.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn list_project_tasks(conn: &Connection, project_id: &str) -> rusqlite::Result<Vec<Task>> {
    let mut stmt = conn.prepare(
        "SELECT task_id, project_id, name, description, status, created_at_us, updated_at_us \
         FROM tasks WHERE project_id = ?1 ORDER BY rowid",
    )?;
    let rows = stmt.query_map(params![project_id], row_to_task)?;
    rows.collect()
}

/// Outgoing DependsOn edges of a project's tasks as `(task, depends_on)`,
/// sorted by both columns.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn list_project_edges(
    conn: &Connection,
    project_id: &str,
) -> rusqlite::Result<Vec<(String, String)>> {
    let mut stmt = conn.prepare(
        "SELECT d.task_id, d.depends_on_task_id \
         FROM task_dependencies d JOIN tasks t ON t.task_id = d.task_id \
         WHERE t.project_id = ?1 \
         ORDER BY d.task_id, d.depends_on_task_id",
    )?;
    let rows = stmt.query_map(params![project_id], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect()
}

/// Number of DependsOn edges with either endpoint owned by `project_id`.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn count_edges_touching_project(conn: &Connection, project_id: &str) -> rusqlite::Result<u64> {
    conn.query_row(
        "SELECT COUNT(*) FROM task_dependencies \
         WHERE task_id IN (SELECT task_id FROM tasks WHERE project_id = ?1) \
            OR depends_on_task_id IN (SELECT task_id FROM tasks WHERE project_id = ?1)",
        params![project_id],
        |row| row.get(0),
    )
}

/// Whether any task outside `project_id` depends on a task inside it.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn has_incoming_foreign_edges(conn: &Connection, project_id: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM task_dependencies d
            JOIN tasks src ON src.task_id = d.task_id
            JOIN tasks dst ON dst.task_id = d.depends_on_task_id
            WHERE dst.project_id = ?1 AND src.project_id <> ?1
        )",
        params![project_id],
        |row| row.get(0),
    )
}

/// Load the task nodes and DependsOn edges within `scope`.
///
/// For a project scope, edges whose target lies outside the project are kept
/// and their target is added as a node so readiness sees its status.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn load_snapshot(conn: &Connection, scope: SnapshotScope<'_>) -> rusqlite::Result<GraphSnapshot> {
    let mut graph = GraphSnapshot::new();

    let (task_sql, edge_sql, target_sql) = match scope {
        SnapshotScope::Project(_) => (
            "SELECT task_id, project_id, status FROM tasks WHERE project_id = ?1",
            "SELECT d.task_id, d.depends_on_task_id \
             FROM task_dependencies d JOIN tasks t ON t.task_id = d.task_id \
             WHERE t.project_id = ?1",
            Some(
                "SELECT o.task_id, o.project_id, o.status \
                 FROM task_dependencies d \
                 JOIN tasks t ON t.task_id = d.task_id \
                 JOIN tasks o ON o.task_id = d.depends_on_task_id \
                 WHERE t.project_id = ?1 AND o.project_id <> ?1",
            ),
        ),
        SnapshotScope::All => (
            "SELECT task_id, project_id, status FROM tasks",
            "SELECT task_id, depends_on_task_id FROM task_dependencies",
            None,
        ),
    };

    let mut node_sqls = vec![task_sql];
    node_sqls.extend(target_sql);
    for sql in node_sqls {
        let mut stmt = conn.prepare(sql)?;
        let mut rows = match scope {
            SnapshotScope::Project(project_id) => stmt.query(params![project_id])?,
            SnapshotScope::All => stmt.query([])?,
        };
        while let Some(row) = rows.next()? {
            let id: String = row.get(0)?;
            let project_id: String = row.get(1)?;
            graph.insert_task(id, project_id, row.get(2)?);
        }
    }

    let mut stmt = conn.prepare(edge_sql)?;
    let mut rows = match scope {
        SnapshotScope::Project(project_id) => stmt.query(params![project_id])?,
        SnapshotScope::All => stmt.query([])?,
    };
    while let Some(row) = rows.next()? {
        let from: String = row.get(0)?;
        let to: String = row.get(1)?;
        graph.add_edge(from, to);
    }

    Ok(graph)
}

/// Every project with its task count, ordered by id.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn list_projects(conn: &Connection) -> rusqlite::Result<Vec<WorkflowSummary>> {
    let mut stmt = conn.prepare(
        "SELECT p.project_id, p.name, COUNT(t.task_id) \
         FROM projects p LEFT JOIN tasks t ON t.project_id = p.project_id \
         GROUP BY p.project_id, p.name \
         ORDER BY p.project_id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(WorkflowSummary {
            project_id: row.get(0)?,
            project_name: row.get(1)?,
            task_count: row.get(2)?,
        })
    })?;
    rows.collect()
}

fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        project_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        status: row.get(4)?,
        created_at_us: row.get(5)?,
        updated_at_us: row.get(6)?,
    })
}
