//! The workflow service: the stable API over the graph store and the
//! dependency resolver.
//!
//! Every operation validates its arguments, then either runs one store
//! transaction or loads one snapshot and hands it to the resolver. The
//! service holds no mutable state; clones can be shared across threads.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use tracing::{debug, instrument, warn};

use crate::config::WeaveConfig;
use crate::db::{DeleteStats, GraphStore, StatusChange};
use crate::error::{Entity, Result, WorkflowError};
use crate::graph::{DependencyResolver, GraphSnapshot, ReadinessMode, ReadinessPolicy};
use crate::model::{
    DependencyCheck, NewTask, Project, Task, TaskStatus, Workflow, WorkflowSummary, WorkflowTask,
};

#[derive(Debug, Clone)]
pub struct WorkflowService {
    store: GraphStore,
    resolver: DependencyResolver,
}

impl WorkflowService {
    #[must_use]
    pub const fn new(store: GraphStore, policy: ReadinessPolicy) -> Self {
        Self {
            store,
            resolver: DependencyResolver::new(policy),
        }
    }

    /// Open the store named by `config` (relative to `project_root`) and
    /// build a service with the configured readiness policy.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened or migrated.
    pub fn open(config: &WeaveConfig, project_root: &Path) -> anyhow::Result<Self> {
        let path = config.store_path(project_root);
        let store = GraphStore::open(&path, config.store_options())
            .with_context(|| format!("open workflow store at {}", path.display()))?;
        Ok(Self::new(store, config.readiness_policy()))
    }

    #[must_use]
    pub const fn store(&self) -> &GraphStore {
        &self.store
    }

    #[must_use]
    pub const fn resolver(&self) -> &DependencyResolver {
        &self.resolver
    }

    // -----------------------------------------------------------------------
    // Core operations
    // -----------------------------------------------------------------------

    /// Create an empty workflow rooted at a new project.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an empty id or name, `AlreadyExists` if the
    /// project id is taken.
    #[instrument(skip(self))]
    pub fn create_workflow(&self, project_id: &str, name: &str) -> Result<Project> {
        require_non_empty("project_id", project_id)?;
        require_non_empty("project_name", name)?;
        self.store.create_project(project_id, name)
    }

    /// Add a task and its dependency edges to a workflow, all or nothing.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for empty ids or names, `NotFound` for a missing
    /// project or dependency, `AlreadyExists` for a taken task id,
    /// `CycleDetected` if any edge would close a cycle.
    #[instrument(skip(self, task), fields(task_id = %task.id))]
    pub fn add_task(&self, project_id: &str, task: &NewTask) -> Result<Task> {
        require_non_empty("project_id", project_id)?;
        require_non_empty("task_id", &task.id)?;
        require_non_empty("task_name", &task.name)?;
        for dep in &task.dependencies {
            require_non_empty("dependencies", dep)?;
        }
        self.store.create_task(project_id, task)
    }

    /// The workflow with every task and its sorted dependency ids.
    ///
    /// # Errors
    ///
    /// `NotFound` if the project is absent.
    #[instrument(skip(self))]
    pub fn get_workflow(&self, project_id: &str) -> Result<Workflow> {
        require_non_empty("project_id", project_id)?;
        let graph = self.store.get_project(project_id)?;

        let mut dependencies: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (task, depends_on) in graph.edges {
            dependencies.entry(task).or_default().push(depends_on);
        }

        let tasks = graph
            .tasks
            .into_iter()
            .map(|task| WorkflowTask {
                dependencies: dependencies.remove(&task.id).unwrap_or_default(),
                blocked: task.status.is_blocked(),
                status: task.status,
                id: task.id,
                name: task.name,
                description: task.description,
            })
            .collect();

        Ok(Workflow {
            project_id: graph.project.id,
            project_name: graph.project.name,
            tasks,
        })
    }

    /// Delete the workflow with all of its tasks and their edges. Edges that
    /// other workflows' tasks held on the deleted tasks go too, and are
    /// counted in [`DeleteStats::foreign_edges`].
    ///
    /// # Errors
    ///
    /// `NotFound` if the project is absent.
    #[instrument(skip(self))]
    pub fn delete_workflow(&self, project_id: &str) -> Result<DeleteStats> {
        require_non_empty("project_id", project_id)?;
        self.store.delete_project(project_id)
    }

    /// Whether `task_id`'s dependencies let it proceed, with the ids that
    /// hold it back.
    ///
    /// # Errors
    ///
    /// `NotFound` if the project is absent or does not own the task.
    #[instrument(skip(self))]
    pub fn check_task_dependencies(&self, project_id: &str, task_id: &str) -> Result<DependencyCheck> {
        require_non_empty("project_id", project_id)?;
        require_non_empty("task_id", task_id)?;
        let graph = self.snapshot(project_id)?;
        if !owns(&graph, project_id, task_id) {
            return Err(WorkflowError::not_found(Entity::Task, task_id));
        }
        let check = DependencyCheck::from_unmet(self.resolver.unmet_dependencies(task_id, &graph));
        debug!(met = check.all_dependencies_met, unmet = ?check.unmet, "checked dependencies");
        Ok(check)
    }

    // -----------------------------------------------------------------------
    // Mutations on existing tasks
    // -----------------------------------------------------------------------

    /// Make `task_id` depend on an existing task. Returns `false` if the edge
    /// was already present.
    ///
    /// # Errors
    ///
    /// `NotFound`, `CycleDetected`, or `InvalidArgument` as for
    /// [`Self::add_task`].
    #[instrument(skip(self))]
    pub fn add_dependency(&self, project_id: &str, task_id: &str, depends_on: &str) -> Result<bool> {
        require_non_empty("project_id", project_id)?;
        require_non_empty("task_id", task_id)?;
        require_non_empty("depends_on", depends_on)?;
        self.store.add_dependency_edge(project_id, task_id, depends_on)
    }

    /// # Errors
    ///
    /// `NotFound` if the project does not own the task, `InvalidTransition`
    /// for a move the status table forbids.
    #[instrument(skip(self))]
    pub fn set_task_status(
        &self,
        project_id: &str,
        task_id: &str,
        status: TaskStatus,
    ) -> Result<StatusChange> {
        require_non_empty("project_id", project_id)?;
        require_non_empty("task_id", task_id)?;
        self.store.set_task_status(project_id, task_id, status)
    }

    /// Block a task, or unblock it back to pending.
    ///
    /// # Errors
    ///
    /// `NotFound` if the project does not own the task. Blocking a done task
    /// is an `InvalidTransition`.
    #[instrument(skip(self))]
    pub fn set_task_blocked(
        &self,
        project_id: &str,
        task_id: &str,
        blocked: bool,
    ) -> Result<StatusChange> {
        require_non_empty("project_id", project_id)?;
        require_non_empty("task_id", task_id)?;
        self.store.set_task_blocked(project_id, task_id, blocked)
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    /// # Errors
    ///
    /// `NotFound` if no project owns a task with this id.
    #[instrument(skip(self))]
    pub fn is_task_blocked(&self, task_id: &str) -> Result<bool> {
        require_non_empty("task_id", task_id)?;
        self.store
            .task_status(task_id)?
            .map(TaskStatus::is_blocked)
            .ok_or_else(|| WorkflowError::not_found(Entity::Task, task_id))
    }

    /// # Errors
    ///
    /// `Store`/`Timeout` on storage failures.
    #[instrument(skip(self))]
    pub fn task_exists(&self, task_id: &str) -> Result<bool> {
        require_non_empty("task_id", task_id)?;
        self.store.task_exists(task_id)
    }

    /// # Errors
    ///
    /// `Store`/`Timeout` on storage failures.
    pub fn list_workflows(&self) -> Result<Vec<WorkflowSummary>> {
        self.store.list_projects()
    }

    /// Tasks of the project that could be picked up now, sorted by id.
    ///
    /// # Errors
    ///
    /// `NotFound` if the project is absent.
    #[instrument(skip(self))]
    pub fn ready_tasks(&self, project_id: &str) -> Result<Vec<String>> {
        require_non_empty("project_id", project_id)?;
        let graph = self.snapshot(project_id)?;
        Ok(self
            .resolver
            .ready_tasks(&graph)
            .into_iter()
            .filter(|id| owns(&graph, project_id, id))
            .collect())
    }

    /// The project's tasks in an order where every task follows its
    /// dependencies.
    ///
    /// # Errors
    ///
    /// `NotFound` if the project is absent, `CorruptGraph` if the stored
    /// edges contain a cycle.
    #[instrument(skip(self))]
    pub fn execution_order(&self, project_id: &str) -> Result<Vec<String>> {
        require_non_empty("project_id", project_id)?;
        let graph = self.snapshot(project_id)?;
        let corrupt = || WorkflowError::CorruptGraph {
            project_id: project_id.to_string(),
        };
        if self.resolver.has_cycles(&graph) {
            warn!(project_id, "stored dependencies contain a cycle");
            return Err(corrupt());
        }
        let order = self.resolver.execution_order(&graph).ok_or_else(corrupt)?;
        Ok(order
            .into_iter()
            .filter(|id| owns(&graph, project_id, id))
            .collect())
    }

    /// Snapshot wide enough for the resolver's policy.
    fn snapshot(&self, project_id: &str) -> Result<GraphSnapshot> {
        let whole_store = self.resolver.policy().mode == ReadinessMode::Transitive
            && self.store.options().cross_project_dependencies;
        let (_, graph) = self.store.load_snapshot(project_id, whole_store)?;
        Ok(graph)
    }
}

fn owns(graph: &GraphSnapshot, project_id: &str, task_id: &str) -> bool {
    graph
        .task(task_id)
        .is_some_and(|node| node.project_id == project_id)
}

fn require_non_empty(field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(WorkflowError::invalid(field, "must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::StoreOptions;

    fn service(policy: ReadinessPolicy) -> (tempfile::TempDir, WorkflowService) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let store = GraphStore::open(dir.path().join("weave.sqlite3"), StoreOptions::default())
            .expect("open store");
        (dir, WorkflowService::new(store, policy))
    }

    fn alpha(policy: ReadinessPolicy) -> (tempfile::TempDir, WorkflowService) {
        let (dir, svc) = service(policy);
        svc.create_workflow("proj1", "Alpha").expect("workflow");
        svc.add_task("proj1", &NewTask::new("t1", "Design")).expect("t1");
        svc.add_task("proj1", &NewTask::new("t2", "Build").depends_on(["t1"]))
            .expect("t2");
        svc.add_task("proj1", &NewTask::new("t3", "Test").depends_on(["t2"]))
            .expect("t3");
        (dir, svc)
    }

    #[test]
    fn empty_ids_are_invalid() {
        let (_dir, svc) = service(ReadinessPolicy::default());
        let err = svc.create_workflow("  ", "Alpha").expect_err("empty id");
        assert!(matches!(err, WorkflowError::InvalidArgument { field: "project_id", .. }));

        svc.create_workflow("p", "Alpha").expect("workflow");
        let err = svc
            .add_task("p", &NewTask::new("t", "Name").depends_on([""]))
            .expect_err("empty dependency");
        assert!(matches!(err, WorkflowError::InvalidArgument { field: "dependencies", .. }));
    }

    #[test]
    fn workflow_lists_tasks_in_insertion_order() {
        let (_dir, svc) = alpha(ReadinessPolicy::default());
        let workflow = svc.get_workflow("proj1").expect("get");
        assert_eq!(workflow.project_name, "Alpha");
        assert_eq!(workflow.task_ids(), vec!["t1", "t2", "t3"]);
        assert_eq!(
            workflow.task("t3").map(|t| t.dependencies.clone()),
            Some(vec!["t2".to_string()])
        );
        assert!(workflow.tasks.iter().all(|t| !t.blocked));
    }

    #[test]
    fn direct_mode_only_sees_direct_dependencies() {
        let (_dir, svc) = alpha(ReadinessPolicy::default());
        svc.set_task_blocked("proj1", "t1", true).expect("block");
        assert!(!svc.check_task_dependencies("proj1", "t2").expect("check").all_dependencies_met);
        assert!(svc.check_task_dependencies("proj1", "t3").expect("check").all_dependencies_met);
    }

    #[test]
    fn transitive_mode_sees_the_closure() {
        let (_dir, svc) = alpha(ReadinessPolicy {
            mode: ReadinessMode::Transitive,
            require_resolved: false,
        });
        svc.set_task_blocked("proj1", "t1", true).expect("block");
        let check = svc.check_task_dependencies("proj1", "t3").expect("check");
        assert!(!check.all_dependencies_met);
        assert_eq!(check.unmet, vec!["t1"]);
    }

    #[test]
    fn check_on_foreign_task_is_not_found() {
        let (_dir, svc) = alpha(ReadinessPolicy::default());
        svc.create_workflow("proj2", "Beta").expect("proj2");
        let err = svc.check_task_dependencies("proj2", "t1").expect_err("foreign");
        assert!(matches!(err, WorkflowError::NotFound { entity: Entity::Task, .. }));
    }

    #[test]
    fn ready_tasks_and_order_follow_status() {
        let (_dir, svc) = alpha(ReadinessPolicy {
            mode: ReadinessMode::Direct,
            require_resolved: true,
        });
        assert_eq!(svc.ready_tasks("proj1").expect("ready"), vec!["t1"]);
        svc.set_task_status("proj1", "t1", TaskStatus::Done).expect("done");
        assert_eq!(svc.ready_tasks("proj1").expect("ready"), vec!["t2"]);
        assert_eq!(
            svc.execution_order("proj1").expect("order"),
            vec!["t1", "t2", "t3"]
        );
    }

    #[test]
    fn blocked_lookup_is_global() {
        let (_dir, svc) = alpha(ReadinessPolicy::default());
        assert!(!svc.is_task_blocked("t2").expect("lookup"));
        svc.set_task_blocked("proj1", "t2", true).expect("block");
        assert!(svc.is_task_blocked("t2").expect("lookup"));
        assert!(matches!(
            svc.is_task_blocked("nope"),
            Err(WorkflowError::NotFound { .. })
        ));
        assert!(svc.task_exists("t3").expect("exists"));
    }

    #[test]
    fn cyclic_stored_graph_is_corrupt() {
        let (_dir, svc) = alpha(ReadinessPolicy::default());
        let conn = rusqlite::Connection::open(svc.store().path()).expect("raw connection");
        conn.execute(
            "INSERT INTO task_dependencies (task_id, depends_on_task_id, created_at_us) \
             VALUES ('t1', 't3', 0)",
            [],
        )
        .expect("insert closing edge behind the service");

        let err = svc.execution_order("proj1").expect_err("cyclic graph");
        assert!(matches!(err, WorkflowError::CorruptGraph { ref project_id } if project_id == "proj1"));
    }

    #[test]
    fn oversized_deadline_does_not_panic_on_open() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let mut config = WeaveConfig::default();
        config.store.deadline_ms = 3_000_000_000;

        let svc = WorkflowService::open(&config, dir.path()).expect("open with clamped timeout");
        svc.create_workflow("p", "Alpha").expect("store calls still work");
        assert_eq!(svc.list_workflows().expect("list").len(), 1);
    }

    #[test]
    fn listing_counts_tasks() {
        let (_dir, svc) = alpha(ReadinessPolicy::default());
        svc.create_workflow("proj0", "Empty").expect("proj0");
        let listing = svc.list_workflows().expect("list");
        let counts: Vec<(&str, usize)> = listing
            .iter()
            .map(|w| (w.project_id.as_str(), w.task_count))
            .collect();
        assert_eq!(counts, vec![("proj0", 0), ("proj1", 3)]);
    }
}
