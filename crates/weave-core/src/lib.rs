//! weave-core: a workflow dependency graph engine.
//!
//! Projects own tasks; tasks depend on other tasks. The graph lives in
//! SQLite ([`db::GraphStore`]), readiness and cycle checks are pure
//! computations over snapshots ([`graph::DependencyResolver`]), and
//! [`service::WorkflowService`] ties the two together behind a stable API.
//!
//! # Conventions
//!
//! - **Errors**: operations return [`error::Result`] with a typed
//!   [`error::WorkflowError`]; setup paths (opening stores, loading config)
//!   use `anyhow::Result`.
//! - **Logging**: `tracing` macros; committed mutations log at `info`.

pub mod config;
pub mod db;
pub mod error;
pub mod graph;
pub mod model;
pub mod service;

pub use error::{ErrorClass, ErrorCode, WorkflowError};
pub use service::WorkflowService;
