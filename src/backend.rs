//! Collaborator contracts for execution and run tracking.
//!
//! The orchestration core never assumes how a unit of work is physically
//! executed. It is handed an [`ExecutionBackend`] that turns a submission
//! into an opaque [`RunHandle`], and a [`TrackingStore`] that exposes an
//! upstream run's artifact location and logged parameter values during
//! parameter resolution.

use crate::errors::WorkflowError;
use crate::workflow::RunOptions;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Tag carrying the default execution backend for a run.
pub const TAG_BACKEND: &str = "workflow.backend";
/// Tag carrying the default environment manager for a run.
pub const TAG_ENV_MANAGER: &str = "workflow.env_manager";
/// Tag carrying the root entry-point key for a run.
pub const TAG_ENTRY_POINT: &str = "workflow.entry_point";

/// An opaque reference to one in-flight or completed execution of a unit of
/// work.
///
/// Handles are owned exclusively by the orchestration runtime for the
/// duration of the run and are removed from tracking once waited on
/// (at-most-once wait per handle).
#[async_trait]
pub trait RunHandle: Send + Sync {
    /// The identifier of the tracked run behind this handle.
    fn run_id(&self) -> &str;

    /// Waits for the execution to complete, returning whether it succeeded.
    async fn wait(&self) -> Result<bool, WorkflowError>;

    /// Whether this handle supports cancellation.
    ///
    /// Callers check this before calling [`cancel`](Self::cancel); a handle
    /// that cannot cancel is tolerated, never treated as fatal.
    fn supports_cancel(&self) -> bool {
        false
    }

    /// Requests cancellation of the execution (best effort).
    async fn cancel(&self) -> Result<(), WorkflowError> {
        Err(WorkflowError::Backend(format!(
            "run '{}' does not support cancellation",
            self.run_id()
        )))
    }
}

/// The sole mechanism that actually executes a unit of work.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Launches one entry point, returning a handle to the submission.
    ///
    /// `run_name` is a human-readable label for the launched run; the
    /// orchestrator forwards the entry name.
    async fn submit(
        &self,
        source: &str,
        entry: &str,
        parameters: BTreeMap<String, serde_json::Value>,
        run_name: &str,
        options: &RunOptions,
    ) -> Result<Arc<dyn RunHandle>, WorkflowError>;
}

/// Read access to the run-metadata store.
#[async_trait]
pub trait TrackingStore: Send + Sync {
    /// Fetches the tracked record for a run identifier.
    async fn get_run(&self, run_id: &str) -> Result<RunRecord, WorkflowError>;
}

/// The tracked metadata of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// The run identifier.
    pub run_id: String,

    /// Base location of the run's artifact store.
    pub artifact_uri: String,

    /// Parameter values logged by the run.
    #[serde(default)]
    pub params: BTreeMap<String, String>,

    /// Tags attached to the run, including ambient workflow defaults.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,

    /// When the run started.
    #[serde(default = "Utc::now")]
    pub start_time: DateTime<Utc>,
}

impl RunRecord {
    /// Creates a run record with the given identity and artifact base.
    #[must_use]
    pub fn new(run_id: impl Into<String>, artifact_uri: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            artifact_uri: artifact_uri.into(),
            params: BTreeMap::new(),
            tags: BTreeMap::new(),
            start_time: Utc::now(),
        }
    }

    /// Adds a logged parameter value.
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Adds a tag.
    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Resolves a path relative to this run's artifact base location.
    #[must_use]
    pub fn artifact_path(&self, relative: &str) -> String {
        format!(
            "{}/{}",
            self.artifact_uri.trim_end_matches('/'),
            relative.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_path_concatenation() {
        let record = RunRecord::new("run123", "s3://bucket/run123");
        assert_eq!(record.artifact_path("model.pkl"), "s3://bucket/run123/model.pkl");
    }

    #[test]
    fn test_artifact_path_normalizes_slashes() {
        let record = RunRecord::new("run123", "s3://bucket/run123/");
        assert_eq!(
            record.artifact_path("/nested/model.pkl"),
            "s3://bucket/run123/nested/model.pkl"
        );
    }

    #[test]
    fn test_builder_helpers() {
        let record = RunRecord::new("run123", "file:///tmp/artifacts")
            .with_param("epochs", "10")
            .with_tag(TAG_BACKEND, "local");

        assert_eq!(record.params.get("epochs"), Some(&"10".to_string()));
        assert_eq!(record.tags.get(TAG_BACKEND), Some(&"local".to_string()));
    }
}
