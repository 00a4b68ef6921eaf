pub mod task;
pub mod workflow;

pub use task::{InvalidTransition, NewTask, Project, Task, TaskStatus};
pub use workflow::{DependencyCheck, Workflow, WorkflowSummary, WorkflowTask};
