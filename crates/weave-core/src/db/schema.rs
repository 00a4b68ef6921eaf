//! Canonical SQLite schema for the workflow graph store.
//!
//! The property graph is modelled with adjacency tables:
//! - `projects` holds workflow roots
//! - `tasks` carries the ownership edge as its `project_id` column
//! - `task_dependencies` holds DependsOn edges (task → task it waits on)
//! - `store_meta` records the applied schema version

/// Migration v1: core tables plus store metadata.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS projects (
    project_id TEXT PRIMARY KEY CHECK (length(trim(project_id)) > 0),
    name TEXT NOT NULL,
    created_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS tasks (
    task_id TEXT PRIMARY KEY CHECK (length(trim(task_id)) > 0),
    project_id TEXT NOT NULL REFERENCES projects(project_id) ON DELETE RESTRICT,
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending', 'in_progress', 'done', 'blocked')),
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS task_dependencies (
    task_id TEXT NOT NULL REFERENCES tasks(task_id) ON DELETE RESTRICT,
    depends_on_task_id TEXT NOT NULL REFERENCES tasks(task_id) ON DELETE RESTRICT,
    created_at_us INTEGER NOT NULL,
    PRIMARY KEY (task_id, depends_on_task_id),
    CHECK (task_id <> depends_on_task_id)
);

CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL
);

INSERT OR IGNORE INTO store_meta (id, schema_version) VALUES (1, 1);
";

/// Migration v2: read-path indexes.
pub const MIGRATION_V2_SQL: &str = r"
CREATE INDEX IF NOT EXISTS idx_tasks_project
    ON tasks(project_id, task_id);

CREATE INDEX IF NOT EXISTS idx_tasks_status
    ON tasks(status);

CREATE INDEX IF NOT EXISTS idx_task_dependencies_target
    ON task_dependencies(depends_on_task_id, task_id);
";

/// Indexes expected after all migrations ran.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_tasks_project",
    "idx_tasks_status",
    "idx_task_dependencies_target",
];

#[cfg(test)]
mod tests {
    use crate::db::migrations;
    use rusqlite::{Connection, params};

    fn migrated() -> Connection {
        let mut conn = Connection::open_in_memory().expect("open in-memory db");
        conn.pragma_update(None, "foreign_keys", "ON")
            .expect("enable foreign keys");
        migrations::migrate(&mut conn).expect("migrate");
        conn
    }

    fn seed(conn: &Connection) {
        conn.execute(
            "INSERT INTO projects (project_id, name, created_at_us) VALUES ('p', 'Alpha', 1)",
            [],
        )
        .expect("insert project");
        for id in ["a", "b"] {
            conn.execute(
                "INSERT INTO tasks (task_id, project_id, name, created_at_us, updated_at_us)
                 VALUES (?1, 'p', ?1, 1, 1)",
                params![id],
            )
            .expect("insert task");
        }
    }

    #[test]
    fn self_dependency_is_rejected_by_check() {
        let conn = migrated();
        seed(&conn);
        let err = conn.execute(
            "INSERT INTO task_dependencies (task_id, depends_on_task_id, created_at_us)
             VALUES ('a', 'a', 1)",
            [],
        );
        assert!(err.is_err());
    }

    #[test]
    fn dangling_dependency_is_rejected_by_foreign_key() {
        let conn = migrated();
        seed(&conn);
        let err = conn.execute(
            "INSERT INTO task_dependencies (task_id, depends_on_task_id, created_at_us)
             VALUES ('a', 'ghost', 1)",
            [],
        );
        assert!(err.is_err());
    }

    #[test]
    fn unknown_status_is_rejected() {
        let conn = migrated();
        seed(&conn);
        let err = conn.execute("UPDATE tasks SET status = 'archived' WHERE task_id = 'a'", []);
        assert!(err.is_err());
    }

    #[test]
    fn project_with_tasks_cannot_be_deleted_alone() {
        let conn = migrated();
        seed(&conn);
        let err = conn.execute("DELETE FROM projects WHERE project_id = 'p'", []);
        assert!(err.is_err());
    }

    #[test]
    fn dependency_lookup_uses_target_index() {
        let conn = migrated();
        let plan: String = conn
            .query_row(
                "EXPLAIN QUERY PLAN
                 SELECT task_id FROM task_dependencies WHERE depends_on_task_id = 'a'",
                [],
                |row| row.get(3),
            )
            .expect("query plan");
        assert!(
            plan.contains("idx_task_dependencies_target"),
            "unexpected plan: {plan}"
        );
    }
}
