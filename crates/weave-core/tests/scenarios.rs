//! End-to-end workflow scenarios against a real on-disk store.

use rusqlite::Connection;
use tempfile::TempDir;
use weave_core::WorkflowService;
use weave_core::db::query;
use weave_core::db::{GraphStore, StoreOptions};
use weave_core::error::{Entity, WorkflowError};
use weave_core::graph::ReadinessPolicy;
use weave_core::model::{NewTask, TaskStatus};

fn service() -> (TempDir, WorkflowService) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let store = GraphStore::open(dir.path().join("weave.sqlite3"), StoreOptions::default())
        .expect("open store");
    (dir, WorkflowService::new(store, ReadinessPolicy::default()))
}

/// `proj1` with `t1` (Design) and `t2` (Build, depends on `t1`).
fn alpha() -> (TempDir, WorkflowService) {
    let (dir, svc) = service();
    svc.create_workflow("proj1", "Alpha").expect("create workflow");
    svc.add_task("proj1", &NewTask::new("t1", "Design"))
        .expect("add t1");
    svc.add_task("proj1", &NewTask::new("t2", "Build").depends_on(["t1"]))
        .expect("add t2");
    (dir, svc)
}

fn raw(svc: &WorkflowService) -> Connection {
    Connection::open(svc.store().path()).expect("open raw connection")
}

#[test]
fn blocking_a_dependency_flips_readiness() {
    let (_dir, svc) = alpha();

    let check = svc
        .check_task_dependencies("proj1", "t2")
        .expect("check t2");
    assert!(check.all_dependencies_met);

    svc.set_task_blocked("proj1", "t1", true).expect("block t1");
    let check = svc
        .check_task_dependencies("proj1", "t2")
        .expect("check t2");
    assert!(!check.all_dependencies_met);
    assert_eq!(check.unmet, vec!["t1"]);

    svc.set_task_blocked("proj1", "t1", false)
        .expect("unblock t1");
    assert!(
        svc.check_task_dependencies("proj1", "t2")
            .expect("check t2")
            .all_dependencies_met
    );
}

#[test]
fn unknown_dependency_leaves_workflow_untouched() {
    let (_dir, svc) = alpha();

    let err = svc
        .add_task(
            "proj1",
            &NewTask::new("t3", "Test").depends_on(["t2", "tX"]),
        )
        .expect_err("tX does not exist");
    assert!(matches!(
        err,
        WorkflowError::NotFound { entity: Entity::Task, ref id } if id == "tX"
    ));

    let workflow = svc.get_workflow("proj1").expect("get workflow");
    assert_eq!(workflow.task_ids(), vec!["t1", "t2"]);
    assert!(!svc.task_exists("t3").expect("exists"));

    let edges: i64 = raw(&svc)
        .query_row(
            "SELECT COUNT(*) FROM task_dependencies WHERE task_id = 't3'",
            [],
            |row| row.get(0),
        )
        .expect("count edges");
    assert_eq!(edges, 0);
}

#[test]
fn reverse_edge_is_rejected_and_graph_is_unchanged() {
    let (_dir, svc) = alpha();

    let err = svc
        .add_dependency("proj1", "t1", "t2")
        .expect_err("t1 -> t2 closes a cycle");
    let WorkflowError::CycleDetected(cycle) = err else {
        panic!("expected cycle, got {err:?}");
    };
    assert!(cycle.is_mutual());
    assert_eq!(cycle.edge_from, "t1");
    assert_eq!(cycle.edge_to, "t2");

    let workflow = svc.get_workflow("proj1").expect("get workflow");
    assert!(workflow.task("t1").expect("t1").dependencies.is_empty());
    assert_eq!(workflow.task("t2").expect("t2").dependencies, vec!["t1"]);
}

#[test]
fn longer_cycle_reports_its_path() {
    let (_dir, svc) = alpha();
    svc.add_task("proj1", &NewTask::new("t3", "Test").depends_on(["t2"]))
        .expect("add t3");

    let err = svc
        .add_dependency("proj1", "t1", "t3")
        .expect_err("t1 -> t3 closes a cycle");
    let WorkflowError::CycleDetected(cycle) = err else {
        panic!("expected cycle, got {err:?}");
    };
    assert_eq!(cycle.cycle_path, vec!["t1", "t3", "t2", "t1"]);
}

#[test]
fn delete_removes_every_trace() {
    let (_dir, svc) = alpha();
    svc.create_workflow("proj2", "Beta").expect("create proj2");
    svc.add_task("proj2", &NewTask::new("b1", "Unrelated"))
        .expect("add b1");

    let stats = svc.delete_workflow("proj1").expect("delete");
    assert_eq!(stats.tasks, 2);
    assert_eq!(stats.edges, 1);
    assert_eq!(stats.foreign_edges, 0);

    assert!(matches!(
        svc.get_workflow("proj1"),
        Err(WorkflowError::NotFound { entity: Entity::Project, .. })
    ));
    assert!(!svc.task_exists("t1").expect("exists"));
    assert!(!svc.task_exists("t2").expect("exists"));
    assert_eq!(
        query::count_edges_touching_project(&raw(&svc), "proj1").expect("count"),
        0
    );

    let remaining = svc.get_workflow("proj2").expect("proj2 survives");
    assert_eq!(remaining.task_ids(), vec!["b1"]);
}

#[test]
fn deleting_a_dependency_workflow_reports_foreign_edges() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let options = StoreOptions {
        cross_project_dependencies: true,
        ..StoreOptions::default()
    };
    let store = GraphStore::open(dir.path().join("weave.sqlite3"), options).expect("open store");
    let svc = WorkflowService::new(store, ReadinessPolicy::default());
    svc.create_workflow("p", "Upstream").expect("create p");
    svc.add_task("p", &NewTask::new("t1", "Schema").blocked(true))
        .expect("add t1");
    svc.create_workflow("q", "Downstream").expect("create q");
    svc.add_task("q", &NewTask::new("q1", "Consume").depends_on(["t1"]))
        .expect("add q1");

    let check = svc.check_task_dependencies("q", "q1").expect("check q1");
    assert_eq!(check.unmet, vec!["t1"]);

    let stats = svc.delete_workflow("p").expect("delete p");
    assert_eq!(stats.tasks, 1);
    assert_eq!(stats.edges, 1);
    assert_eq!(stats.foreign_edges, 1);

    let downstream = svc.get_workflow("q").expect("q survives");
    assert_eq!(
        downstream.task("q1").map(|t| t.dependencies.clone()),
        Some(Vec::new())
    );
    assert!(
        svc.check_task_dependencies("q", "q1")
            .expect("check q1")
            .all_dependencies_met
    );
}

#[test]
fn repeated_reads_are_identical() {
    let (_dir, svc) = alpha();
    svc.add_task(
        "proj1",
        &NewTask::new("t3", "Test")
            .with_description("run the suite")
            .depends_on(["t2", "t1"]),
    )
    .expect("add t3");

    let first = svc.get_workflow("proj1").expect("first read");
    let second = svc.get_workflow("proj1").expect("second read");
    assert_eq!(first, second);
    assert_eq!(
        first.task("t3").expect("t3").dependencies,
        vec!["t1", "t2"]
    );
    assert_eq!(first.task("t3").expect("t3").description, "run the suite");
}

#[test]
fn duplicate_creation_is_already_exists() {
    let (_dir, svc) = alpha();
    assert!(matches!(
        svc.create_workflow("proj1", "Again"),
        Err(WorkflowError::AlreadyExists { entity: Entity::Project, .. })
    ));
    assert!(matches!(
        svc.add_task("proj1", &NewTask::new("t1", "Again")),
        Err(WorkflowError::AlreadyExists { entity: Entity::Task, .. })
    ));
}

#[test]
fn task_created_blocked_holds_back_dependents() {
    let (_dir, svc) = alpha();
    svc.add_task("proj1", &NewTask::new("t3", "Review").blocked(true))
        .expect("add blocked t3");
    svc.add_task("proj1", &NewTask::new("t4", "Ship").depends_on(["t3", "t2"]))
        .expect("add t4");

    let workflow = svc.get_workflow("proj1").expect("get workflow");
    let t3 = workflow.task("t3").expect("t3");
    assert!(t3.blocked);
    assert_eq!(t3.status, TaskStatus::Blocked);
    assert!(svc.is_task_blocked("t3").expect("lookup"));

    let check = svc
        .check_task_dependencies("proj1", "t4")
        .expect("check t4");
    assert_eq!(check.unmet, vec!["t3"]);
}

#[test]
fn missing_project_is_not_found_everywhere() {
    let (_dir, svc) = service();
    let not_found = |err: WorkflowError| {
        matches!(err, WorkflowError::NotFound { entity: Entity::Project, .. })
    };
    assert!(not_found(
        svc.add_task("ghost", &NewTask::new("t", "T")).expect_err("add")
    ));
    assert!(not_found(svc.delete_workflow("ghost").expect_err("delete")));
    assert!(not_found(
        svc.check_task_dependencies("ghost", "t").expect_err("check")
    ));
    assert!(not_found(svc.ready_tasks("ghost").expect_err("ready")));
}

#[test]
fn store_survives_reopen() {
    let (dir, svc) = alpha();
    let path = svc.store().path().to_path_buf();
    drop(svc);

    let store = GraphStore::open(&path, StoreOptions::default()).expect("reopen");
    let svc = WorkflowService::new(store, ReadinessPolicy::default());
    assert_eq!(
        svc.get_workflow("proj1").expect("get").task_ids(),
        vec!["t1", "t2"]
    );
    drop(dir);
}
