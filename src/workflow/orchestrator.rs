//! The workflow orchestrator state machine.

use super::{RunOptions, RunOptionsOverride, RuntimeContext, WorkflowRun, DEFAULT_ROOT_KEY};
use crate::backend::{ExecutionBackend, RunRecord, TrackingStore, TAG_ENTRY_POINT};
use crate::errors::WorkflowError;
use crate::graph::DependencyGraph;
use crate::model::{EntryPoint, RunStatus};
use crate::observability::SpanTimer;
use crate::project::ProjectLoader;
use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Drives one pipeline instance end to end.
///
/// Submits entry points in topological order, tracks in-flight execution
/// handles in the runtime context, waits on completions, and propagates
/// failure and cancellation. Constructed with the run record and
/// collaborators it must use; nothing is discovered from ambient state.
pub struct Workflow {
    status: RunStatus,
    active_run: RunRecord,
    root_key: Option<String>,
    workflow_runs: BTreeMap<String, WorkflowRun>,
    // Consumed once, in order; restart is not supported.
    order: VecDeque<String>,
    runtime_context: RuntimeContext,
    backend: Arc<dyn ExecutionBackend>,
    store: Arc<dyn TrackingStore>,
}

impl Workflow {
    /// Creates a workflow over the given entry points.
    ///
    /// The root entry point defaults to the active run's
    /// [`TAG_ENTRY_POINT`] tag, then to `"root"` when such a key is
    /// declared. The root reuses the pipeline's own top-level run rather
    /// than spawning a new one.
    ///
    /// # Errors
    ///
    /// Graph validation errors: unknown root, root with dependencies,
    /// dependency on an undeclared key, or a cycle.
    pub fn new(
        entry_points: BTreeMap<String, EntryPoint>,
        active_run: RunRecord,
        root: Option<String>,
        backend: Arc<dyn ExecutionBackend>,
        store: Arc<dyn TrackingStore>,
    ) -> Result<Self, WorkflowError> {
        let root_key = root
            .or_else(|| active_run.tags.get(TAG_ENTRY_POINT).cloned())
            .or_else(|| {
                entry_points
                    .contains_key(DEFAULT_ROOT_KEY)
                    .then(|| DEFAULT_ROOT_KEY.to_string())
            });

        let graph = DependencyGraph::new(entry_points);
        let order: VecDeque<String> = graph
            .topological_order(root_key.as_deref())?
            .into_iter()
            .collect();

        let workflow_runs = graph
            .into_nodes()
            .into_iter()
            .map(|(key, entry_point)| {
                let unit = if root_key.as_deref() == Some(key.as_str()) {
                    WorkflowRun::with_run(key.clone(), entry_point, active_run.clone())
                } else {
                    WorkflowRun::new(key.clone(), entry_point)
                };
                (key, unit)
            })
            .collect();

        Ok(Self {
            status: RunStatus::Scheduled,
            active_run,
            root_key,
            workflow_runs,
            order,
            runtime_context: RuntimeContext::new(),
            backend,
            store,
        })
    }

    /// Creates a workflow by loading entry points from a project location.
    pub fn from_project(
        loader: &dyn ProjectLoader,
        location: &Path,
        active_run: RunRecord,
        root: Option<String>,
        backend: Arc<dyn ExecutionBackend>,
        store: Arc<dyn TrackingStore>,
    ) -> Result<Self, WorkflowError> {
        let entry_points = loader.load(location)?;
        Self::new(entry_points, active_run, root, backend, store)
    }

    /// The current lifecycle state.
    #[must_use]
    pub const fn status(&self) -> RunStatus {
        self.status
    }

    /// The identifier of the pipeline's own top-level run.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.active_run.run_id
    }

    /// The designated root entry-point key, if any.
    #[must_use]
    pub fn root_key(&self) -> Option<&str> {
        self.root_key.as_deref()
    }

    /// The run unit for an entry-point key.
    #[must_use]
    pub fn run_unit(&self, key: &str) -> Option<&WorkflowRun> {
        self.workflow_runs.get(key)
    }

    /// The number of in-flight, not-yet-waited-on submissions.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.runtime_context.len()
    }

    /// Advances the pipeline through its full lifecycle.
    ///
    /// No-op unless the workflow is still `Scheduled`. Walks the
    /// topological order once: each unit waits on its own dependencies,
    /// resolves its parameters, and is submitted, fanning out wherever no
    /// dependency edge forces an order. The first dependency failure,
    /// resolution error, or submission error stops further submissions and
    /// cancels in-flight siblings.
    ///
    /// Returns the terminal state reached; a FAILED outcome caused by an
    /// upstream unit is reported through the state, not as an error.
    pub async fn run(
        &mut self,
        overrides: RunOptionsOverride,
    ) -> Result<RunStatus, WorkflowError> {
        if self.status != RunStatus::Scheduled {
            return Ok(self.status);
        }

        let options = RunOptions::resolve(overrides, &self.active_run);
        let timer = SpanTimer::start("workflow.run");
        self.status = RunStatus::Running;
        info!(run_id = %self.active_run.run_id, backend = %options.backend, "workflow started");

        while let Some(key) = self.order.pop_front() {
            let Some(unit) = self.workflow_runs.get(&key) else {
                continue;
            };

            if let Err(failure) = unit.wait_dependencies(&mut self.runtime_context).await {
                warn!(key = %key, %failure, "dependency failed; aborting workflow");
                self.cleanup(RunStatus::Failed).await;
                return Ok(self.status);
            }

            match unit
                .submit(
                    &self.workflow_runs,
                    self.backend.as_ref(),
                    self.store.as_ref(),
                    &options,
                )
                .await
            {
                Ok(handle) => self.runtime_context.insert(key, handle),
                Err(error) => {
                    warn!(key = %key, %error, "submission failed; aborting workflow");
                    self.cleanup(RunStatus::Failed).await;
                    return Err(error);
                }
            }
        }

        if self.wait().await {
            self.end_run(RunStatus::Finished);
        } else {
            self.cleanup(RunStatus::Failed).await;
        }
        info!(
            run_id = %self.active_run.run_id,
            status = %self.status,
            duration_ms = timer.elapsed_ms(),
            "workflow run completed"
        );
        Ok(self.status)
    }

    /// Drains the runtime context, waiting on each outstanding handle in
    /// insertion order.
    ///
    /// Returns false on the first handle that reports non-success.
    pub async fn wait(&mut self) -> bool {
        while let Some((key, handle)) = self.runtime_context.pop_front() {
            let succeeded = match handle.wait().await {
                Ok(succeeded) => succeeded,
                Err(error) => {
                    warn!(key = %key, %error, "wait failed");
                    false
                }
            };
            if !succeeded {
                return false;
            }
        }
        true
    }

    /// Cancels the workflow, recording the `Killed` terminal state.
    pub async fn cancel(&mut self) {
        self.cleanup(RunStatus::Killed).await;
    }

    /// Fails the workflow, recording the `Failed` terminal state.
    pub async fn fail(&mut self) {
        self.cleanup(RunStatus::Failed).await;
    }

    /// Cancels every outstanding handle and records the terminal state.
    ///
    /// No-op when the run is already terminal. A handle that does not
    /// support cancellation, or whose cancellation fails, is tolerated.
    async fn cleanup(&mut self, status: RunStatus) {
        if self.status.is_terminal() {
            return;
        }

        let mut outstanding = Vec::with_capacity(self.runtime_context.len());
        while let Some(entry) = self.runtime_context.pop_front() {
            outstanding.push(entry);
        }
        futures::future::join_all(outstanding.into_iter().map(|(key, handle)| async move {
            if !handle.supports_cancel() {
                info!(key = %key, "in-flight run does not support cancellation");
                return;
            }
            if let Err(error) = handle.cancel().await {
                warn!(key = %key, %error, "failed to cancel in-flight run");
            }
        }))
        .await;

        self.end_run(status);
    }

    fn end_run(&mut self, status: RunStatus) {
        self.status = status;
        info!(run_id = %self.active_run.run_id, status = %status, "workflow ended");
    }
}
