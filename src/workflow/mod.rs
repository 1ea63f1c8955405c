//! Run orchestration.
//!
//! This module provides:
//! - Execution options with ambient-default overlay
//! - The runtime context of in-flight run handles
//! - Per-entry-point run units (dependency wait, parameter resolution,
//!   submission)
//! - The workflow orchestrator state machine

mod context;
mod options;
mod orchestrator;
mod run_unit;

pub use context::RuntimeContext;
pub use options::{RunOptions, RunOptionsOverride, DEFAULT_BACKEND, DEFAULT_ROOT_KEY};
pub use orchestrator::Workflow;
pub use run_unit::WorkflowRun;
