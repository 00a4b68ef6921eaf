//! Graph-level computations over task dependencies.
//!
//! Nothing in this module touches storage. The store loads a
//! [`GraphSnapshot`] inside a transaction and hands it here.
//!
//! ## Submodules
//!
//! - [`snapshot`]: task nodes plus DependsOn adjacency.
//! - [`cycles`]: DFS cycle detection for edge insertion.
//! - [`readiness`]: the [`DependencyResolver`] and its readiness policy.
//! - [`order`]: topological execution order.

pub mod cycles;
pub mod order;
pub mod readiness;
pub mod snapshot;

pub use cycles::CyclePath;
pub use readiness::{DependencyResolver, ReadinessMode, ReadinessPolicy};
pub use snapshot::{GraphSnapshot, TaskNode};
