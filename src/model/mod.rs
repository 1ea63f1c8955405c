//! Normalized representation of pipeline steps.
//!
//! This module provides:
//! - Entry points with declared parameters and dependency sets
//! - Parameter-source bindings (literal, artifact, logged parameter)
//! - The workflow run lifecycle states

mod binding;
mod entry_point;
mod status;

pub use binding::ParamBinding;
pub use entry_point::{EntryPoint, EntryPointBuilder, ParamSpec};
pub use status::RunStatus;
