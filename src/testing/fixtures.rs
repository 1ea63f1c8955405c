//! Shared fixtures for orchestration tests.

use crate::backend::RunRecord;
use crate::model::EntryPoint;

/// A top-level run record for driving a workflow under test.
#[must_use]
pub fn active_run() -> RunRecord {
    RunRecord::new("workflow-run", "mock://artifacts/workflow-run")
}

/// An entry point named after its step, depending on the given keys.
#[must_use]
pub fn step(entry: &str, deps: &[&str]) -> EntryPoint {
    EntryPoint::builder(".", entry)
        .dependencies(deps.iter().copied())
        .build()
}
