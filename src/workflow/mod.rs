//! Workflow engine: transitions, status aggregation, and business operations

pub mod aggregator;
pub mod manager;
pub mod models;
pub mod transitions;

pub use aggregator::{
    compute_rollup, derive_project_status, derive_sprint_status, StatusAggregator,
};
pub use manager::{WorkflowError, WorkflowManager};
pub use models::*;
pub use transitions::{
    allowed_targets, target_gate, task_actor_allowed, validate_module_transition, TransitionError,
};
