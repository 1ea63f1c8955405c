//! Per-entry-point execution wrapper.

use super::{RunOptions, RuntimeContext};
use crate::backend::{ExecutionBackend, RunHandle, RunRecord, TrackingStore};
use crate::errors::{DependencyFailure, OrchestrationError, ResolutionError, WorkflowError};
use crate::model::{EntryPoint, ParamBinding};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// One entry point's run: waits for its dependencies, resolves its runtime
/// parameter values, and submits the unit of work to the execution backend.
///
/// The root entry point carries a pre-bound run record (the pipeline's own
/// top-level run) instead of spawning a new submission.
pub struct WorkflowRun {
    key: String,
    entry_point: EntryPoint,
    run: Mutex<Option<RunRecord>>,
    handle: Mutex<Option<Arc<dyn RunHandle>>>,
}

impl WorkflowRun {
    /// Creates a run unit for one entry point.
    #[must_use]
    pub fn new(key: impl Into<String>, entry_point: EntryPoint) -> Self {
        Self {
            key: key.into(),
            entry_point,
            run: Mutex::new(None),
            handle: Mutex::new(None),
        }
    }

    /// Creates a run unit pre-bound to an existing run record.
    #[must_use]
    pub fn with_run(key: impl Into<String>, entry_point: EntryPoint, run: RunRecord) -> Self {
        Self {
            key: key.into(),
            entry_point,
            run: Mutex::new(Some(run)),
            handle: Mutex::new(None),
        }
    }

    /// The graph key of this unit's entry point.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The entry point this unit runs.
    #[must_use]
    pub const fn entry_point(&self) -> &EntryPoint {
        &self.entry_point
    }

    /// Whether this unit has been submitted.
    #[must_use]
    pub fn is_submitted(&self) -> bool {
        self.handle.lock().is_some()
    }

    /// The handle of this unit's submission, if one has been made.
    #[must_use]
    pub fn handle(&self) -> Option<Arc<dyn RunHandle>> {
        self.handle.lock().clone()
    }

    /// The run record backing this unit, lazily materialized from the
    /// submitted handle the first time it is needed.
    ///
    /// # Errors
    ///
    /// [`OrchestrationError::NotSubmitted`] when no pre-bound record exists
    /// and no submission has occurred.
    pub async fn run_record(&self, store: &dyn TrackingStore) -> Result<RunRecord, WorkflowError> {
        if let Some(record) = self.run.lock().as_ref() {
            return Ok(record.clone());
        }

        let handle = self.handle.lock().clone().ok_or_else(|| {
            OrchestrationError::NotSubmitted {
                key: self.key.clone(),
            }
        })?;

        let record = store.get_run(handle.run_id()).await?;
        *self.run.lock() = Some(record.clone());
        Ok(record)
    }

    /// Waits on every dependency still present in the runtime context,
    /// removing each handle once it reports success.
    ///
    /// Dependencies already absent from the context were waited on by an
    /// earlier unit and are treated as satisfied; the at-most-once wait per
    /// handle is load-bearing. Short-circuits on the first failure.
    ///
    /// # Errors
    ///
    /// [`DependencyFailure`] naming the first upstream that finished
    /// unsuccessfully.
    pub async fn wait_dependencies(
        &self,
        runtime_context: &mut RuntimeContext,
    ) -> Result<(), DependencyFailure> {
        for dependency in &self.entry_point.depends_on {
            let Some(handle) = runtime_context.get(dependency) else {
                continue;
            };
            let handle = Arc::clone(handle);

            debug!(key = %self.key, dependency = %dependency, "waiting on dependency");
            let succeeded = match handle.wait().await {
                Ok(succeeded) => succeeded,
                Err(error) => {
                    warn!(dependency = %dependency, %error, "dependency wait failed");
                    false
                }
            };
            if !succeeded {
                return Err(DependencyFailure::new(dependency.clone()));
            }

            runtime_context.remove(dependency);
        }

        Ok(())
    }

    /// Resolves every declared parameter binding against the other run
    /// units.
    ///
    /// Artifact bindings concatenate the upstream run's artifact base with
    /// the bound relative path; logged-parameter bindings read the upstream
    /// run's logged value, falling back to the upstream entry point's
    /// declared default; literals pass through unchanged.
    pub async fn resolve_parameters(
        &self,
        units: &BTreeMap<String, WorkflowRun>,
        store: &dyn TrackingStore,
    ) -> Result<BTreeMap<String, serde_json::Value>, WorkflowError> {
        let mut resolved = BTreeMap::new();
        for (name, binding) in &self.entry_point.parameter_source {
            let value = self.resolve_binding(name, binding, units, store).await?;
            resolved.insert(name.clone(), value);
        }
        Ok(resolved)
    }

    async fn resolve_binding(
        &self,
        name: &str,
        binding: &ParamBinding,
        units: &BTreeMap<String, WorkflowRun>,
        store: &dyn TrackingStore,
    ) -> Result<serde_json::Value, WorkflowError> {
        match binding {
            ParamBinding::Literal { value } => Ok(value.clone()),

            ParamBinding::Artifact { from, path } => {
                let upstream = self.upstream(name, from, units)?;
                let record = upstream.run_record(store).await?;
                Ok(serde_json::Value::String(record.artifact_path(path)))
            }

            ParamBinding::LoggedParam {
                from,
                name: param_name,
            } => {
                let upstream = self.upstream(name, from, units)?;
                let record = upstream.run_record(store).await?;

                if let Some(value) = record.params.get(param_name) {
                    return Ok(serde_json::Value::String(value.clone()));
                }
                upstream
                    .entry_point()
                    .default_for(param_name)
                    .cloned()
                    .ok_or_else(|| {
                        ResolutionError::MissingLoggedParameter {
                            entry: self.key.clone(),
                            upstream: from.clone(),
                            parameter: param_name.clone(),
                        }
                        .into()
                    })
            }
        }
    }

    fn upstream<'a>(
        &self,
        parameter: &str,
        from: &str,
        units: &'a BTreeMap<String, WorkflowRun>,
    ) -> Result<&'a WorkflowRun, WorkflowError> {
        units.get(from).ok_or_else(|| {
            ResolutionError::UnknownUpstream {
                entry: self.key.clone(),
                upstream: from.to_string(),
                parameter: parameter.to_string(),
            }
            .into()
        })
    }

    /// Resolves parameters and hands the entry point to the execution
    /// backend, storing and returning the resulting handle.
    ///
    /// # Errors
    ///
    /// [`OrchestrationError::DoubleSubmission`] if this unit was already
    /// submitted; resolution and backend errors propagate unchanged.
    pub async fn submit(
        &self,
        units: &BTreeMap<String, WorkflowRun>,
        backend: &dyn ExecutionBackend,
        store: &dyn TrackingStore,
        options: &RunOptions,
    ) -> Result<Arc<dyn RunHandle>, WorkflowError> {
        if self.is_submitted() {
            return Err(OrchestrationError::DoubleSubmission {
                key: self.key.clone(),
            }
            .into());
        }

        let parameters = self.resolve_parameters(units, store).await?;
        debug!(
            key = %self.key,
            source = %self.entry_point.source,
            entry = %self.entry_point.entry,
            "submitting entry point"
        );

        let handle = backend
            .submit(
                &self.entry_point.source,
                &self.entry_point.entry,
                parameters,
                &self.entry_point.entry,
                options,
            )
            .await?;

        *self.handle.lock() = Some(Arc::clone(&handle));
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ParamSpec;
    use crate::testing::{MockBackend, MockTrackingStore};
    use pretty_assertions::assert_eq;

    fn store_with(record: RunRecord) -> MockTrackingStore {
        let store = MockTrackingStore::new();
        store.insert(record);
        store
    }

    fn submitted_unit(key: &str, entry_point: EntryPoint, run_id: &str) -> WorkflowRun {
        let unit = WorkflowRun::new(key, entry_point);
        *unit.handle.lock() = Some(Arc::new(crate::testing::MockRunHandle::succeeding(run_id)));
        unit
    }

    #[tokio::test]
    async fn test_run_record_requires_submission() {
        let unit = WorkflowRun::new("train", EntryPoint::builder(".", "train").build());
        let store = MockTrackingStore::new();

        let err = unit.run_record(&store).await.unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::Orchestration(OrchestrationError::NotSubmitted { .. })
        ));
    }

    #[tokio::test]
    async fn test_run_record_is_materialized_once() {
        let store = store_with(RunRecord::new("run1", "mock://artifacts/run1"));
        let unit = submitted_unit("train", EntryPoint::builder(".", "train").build(), "run1");

        let first = unit.run_record(&store).await.unwrap();
        // A second access must not refetch.
        store.clear();
        let second = unit.run_record(&store).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_artifact_resolution_concatenates_uri() {
        let store = store_with(RunRecord::new("run123", "s3://bucket/run123"));

        let mut units = BTreeMap::new();
        units.insert(
            "train".to_string(),
            submitted_unit("train", EntryPoint::builder(".", "train").build(), "run123"),
        );

        let downstream = WorkflowRun::new(
            "eval",
            EntryPoint::builder(".", "eval")
                .binding("model", ParamBinding::artifact("train", "model.pkl"))
                .build(),
        );

        let resolved = downstream.resolve_parameters(&units, &store).await.unwrap();
        assert_eq!(
            resolved.get("model"),
            Some(&serde_json::json!("s3://bucket/run123/model.pkl"))
        );
    }

    #[tokio::test]
    async fn test_logged_param_prefers_logged_value() {
        let store = store_with(
            RunRecord::new("run1", "mock://artifacts/run1").with_param("epochs", "25"),
        );

        let mut units = BTreeMap::new();
        units.insert(
            "train".to_string(),
            submitted_unit(
                "train",
                EntryPoint::builder(".", "train")
                    .parameter_default("epochs", 10)
                    .build(),
                "run1",
            ),
        );

        let downstream = WorkflowRun::new(
            "eval",
            EntryPoint::builder(".", "eval")
                .binding("epochs", ParamBinding::logged_param("train", "epochs"))
                .build(),
        );

        let resolved = downstream.resolve_parameters(&units, &store).await.unwrap();
        assert_eq!(resolved.get("epochs"), Some(&serde_json::json!("25")));
    }

    #[tokio::test]
    async fn test_logged_param_falls_back_to_default() {
        let store = store_with(RunRecord::new("run1", "mock://artifacts/run1"));

        let mut units = BTreeMap::new();
        units.insert(
            "train".to_string(),
            submitted_unit(
                "train",
                EntryPoint::builder(".", "train")
                    .parameter("epochs", ParamSpec::with_default(10))
                    .build(),
                "run1",
            ),
        );

        let downstream = WorkflowRun::new(
            "eval",
            EntryPoint::builder(".", "eval")
                .binding("epochs", ParamBinding::logged_param("train", "epochs"))
                .build(),
        );

        let resolved = downstream.resolve_parameters(&units, &store).await.unwrap();
        assert_eq!(resolved.get("epochs"), Some(&serde_json::json!(10)));
    }

    #[tokio::test]
    async fn test_logged_param_missing_everywhere_is_an_error() {
        let store = store_with(RunRecord::new("run1", "mock://artifacts/run1"));

        let mut units = BTreeMap::new();
        units.insert(
            "train".to_string(),
            submitted_unit("train", EntryPoint::builder(".", "train").build(), "run1"),
        );

        let downstream = WorkflowRun::new(
            "eval",
            EntryPoint::builder(".", "eval")
                .binding("epochs", ParamBinding::logged_param("train", "epochs"))
                .build(),
        );

        let err = downstream.resolve_parameters(&units, &store).await.unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::Resolution(ResolutionError::MissingLoggedParameter { .. })
        ));
    }

    #[tokio::test]
    async fn test_double_submission_is_an_error() {
        let backend = MockBackend::new();
        let store = MockTrackingStore::new();
        let units = BTreeMap::new();

        let unit = WorkflowRun::new("train", EntryPoint::builder(".", "train").build());

        unit.submit(&units, &backend, &store, &RunOptions::default())
            .await
            .unwrap();
        let second = unit
            .submit(&units, &backend, &store, &RunOptions::default())
            .await;

        assert!(matches!(
            second,
            Err(WorkflowError::Orchestration(
                OrchestrationError::DoubleSubmission { .. }
            ))
        ));
    }

    #[tokio::test]
    async fn test_wait_dependencies_short_circuits_on_failure() {
        let unit = WorkflowRun::new(
            "eval",
            EntryPoint::builder(".", "eval")
                .dependency("a")
                .dependency("b")
                .build(),
        );

        let failing = Arc::new(crate::testing::MockRunHandle::failing("run-a"));
        let pending = Arc::new(crate::testing::MockRunHandle::succeeding("run-b"));

        let mut ctx = RuntimeContext::new();
        ctx.insert("a", failing.clone());
        ctx.insert("b", pending.clone());

        let err = unit.wait_dependencies(&mut ctx).await.unwrap_err();
        assert_eq!(err.key, "a");
        // Remaining dependencies are untouched.
        assert_eq!(pending.wait_count(), 0);
        // The failed handle stays in the context for cleanup.
        assert!(ctx.contains("a"));
    }

    #[tokio::test]
    async fn test_wait_dependencies_treats_absent_as_satisfied() {
        let unit = WorkflowRun::new(
            "eval",
            EntryPoint::builder(".", "eval").dependency("a").build(),
        );

        let mut ctx = RuntimeContext::new();
        unit.wait_dependencies(&mut ctx).await.unwrap();
    }
}
