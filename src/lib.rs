//! # Runweave
//!
//! Dependency-graph orchestration for multi-step workflow runs.
//!
//! Runweave drives a pipeline of independently executable entry points,
//! declared with static dependency and parameter-linkage metadata, through a
//! run lifecycle:
//!
//! - **Entry-point model**: normalized steps with declared parameters,
//!   parameter-source bindings, and dependency sets
//! - **Dependency graph**: binding-implied edge inference and deterministic
//!   topological ordering with cycle detection
//! - **Run orchestration**: submit in dependency order, let independent
//!   branches fan out, fail fast and cancel in-flight siblings on failure
//! - **Parameter resolution**: artifact locations and logged parameter
//!   values pulled from upstream runs at submission time
//!
//! The mechanism that physically executes a step (subprocess, container,
//! remote cluster) and the store that tracks runs are external collaborators
//! behind the [`backend`] traits.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use runweave::prelude::*;
//!
//! let entry_points = YamlProjectLoader.load(Path::new("./project"))?;
//! let mut workflow = Workflow::new(entry_points, active_run, None, backend, store)?;
//!
//! let status = workflow.run(RunOptionsOverride::default()).await?;
//! assert_eq!(status, RunStatus::Finished);
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod backend;
pub mod errors;
pub mod graph;
pub mod model;
pub mod observability;
pub mod project;
pub mod testing;
pub mod workflow;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::backend::{
        ExecutionBackend, RunHandle, RunRecord, TrackingStore,
    };
    pub use crate::errors::{
        ConfigurationError, CycleDetectedError, DependencyFailure,
        InvalidGraphError, OrchestrationError, ResolutionError, WorkflowError,
    };
    pub use crate::graph::DependencyGraph;
    pub use crate::model::{EntryPoint, EntryPointBuilder, ParamBinding, ParamSpec, RunStatus};
    pub use crate::project::{ProjectLoader, YamlProjectLoader};
    pub use crate::workflow::{
        RunOptions, RunOptionsOverride, RuntimeContext, Workflow, WorkflowRun,
    };
}
