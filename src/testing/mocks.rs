//! Mock backend, run handles, and tracking store.

use crate::backend::{ExecutionBackend, RunHandle, RunRecord, TrackingStore};
use crate::errors::WorkflowError;
use crate::workflow::RunOptions;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// A scriptable run handle that records waits and cancellations.
#[derive(Debug)]
pub struct MockRunHandle {
    run_id: String,
    succeeds: bool,
    cancellable: bool,
    cancel_fails: bool,
    waits: AtomicUsize,
    cancelled: AtomicBool,
}

impl MockRunHandle {
    /// Creates a handle whose `wait` reports success.
    #[must_use]
    pub fn succeeding(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            succeeds: true,
            cancellable: true,
            cancel_fails: false,
            waits: AtomicUsize::new(0),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Creates a handle whose `wait` reports failure.
    #[must_use]
    pub fn failing(run_id: impl Into<String>) -> Self {
        Self {
            succeeds: false,
            ..Self::succeeding(run_id)
        }
    }

    /// Makes the handle report that it cannot be cancelled.
    #[must_use]
    pub fn without_cancel_support(mut self) -> Self {
        self.cancellable = false;
        self
    }

    /// Makes `cancel` return an error despite the handle claiming support.
    #[must_use]
    pub fn with_failing_cancel(mut self) -> Self {
        self.cancel_fails = true;
        self
    }

    /// The number of times `wait` was called.
    #[must_use]
    pub fn wait_count(&self) -> usize {
        self.waits.load(Ordering::SeqCst)
    }

    /// Whether a cancellation succeeded against this handle.
    #[must_use]
    pub fn was_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RunHandle for MockRunHandle {
    fn run_id(&self) -> &str {
        &self.run_id
    }

    async fn wait(&self) -> Result<bool, WorkflowError> {
        self.waits.fetch_add(1, Ordering::SeqCst);
        Ok(self.succeeds)
    }

    fn supports_cancel(&self) -> bool {
        self.cancellable
    }

    async fn cancel(&self) -> Result<(), WorkflowError> {
        if self.cancel_fails {
            return Err(WorkflowError::Backend(format!(
                "cancellation of run '{}' is not supported on this platform",
                self.run_id
            )));
        }
        self.cancelled.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// One recorded call to [`MockBackend::submit`].
#[derive(Debug, Clone)]
pub struct SubmissionRecord {
    /// The submitted source location.
    pub source: String,
    /// The submitted entry name.
    pub entry: String,
    /// The resolved parameters handed to the backend.
    pub parameters: BTreeMap<String, serde_json::Value>,
    /// The run name forwarded with the submission.
    pub run_name: String,
    /// The execution options forwarded with the submission.
    pub options: RunOptions,
}

/// An in-memory execution backend.
///
/// Every submission registers a run record in the attached tracking store
/// (logged parameters default to the submitted values) and returns a
/// [`MockRunHandle`] scripted per entry name.
#[derive(Default)]
pub struct MockBackend {
    store: Option<Arc<MockTrackingStore>>,
    fail_entries: Mutex<BTreeSet<String>>,
    no_cancel_entries: Mutex<BTreeSet<String>>,
    fail_cancel_entries: Mutex<BTreeSet<String>>,
    logged_params: Mutex<BTreeMap<String, BTreeMap<String, String>>>,
    submissions: Mutex<Vec<SubmissionRecord>>,
    handles: Mutex<BTreeMap<String, Arc<MockRunHandle>>>,
}

impl MockBackend {
    /// Creates a backend with no tracking store attached.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend that registers every submission in `store`.
    #[must_use]
    pub fn with_store(store: Arc<MockTrackingStore>) -> Self {
        Self {
            store: Some(store),
            ..Self::default()
        }
    }

    /// Scripts the named entry's handle to report failure.
    pub fn fail_entry(&self, entry: impl Into<String>) {
        self.fail_entries.lock().insert(entry.into());
    }

    /// Scripts the named entry's handle to refuse cancellation support.
    pub fn forbid_cancel(&self, entry: impl Into<String>) {
        self.no_cancel_entries.lock().insert(entry.into());
    }

    /// Scripts the named entry's handle to error when cancelled.
    pub fn fail_cancel(&self, entry: impl Into<String>) {
        self.fail_cancel_entries.lock().insert(entry.into());
    }

    /// Scripts a logged parameter value on the named entry's run record.
    pub fn log_param(
        &self,
        entry: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.logged_params
            .lock()
            .entry(entry.into())
            .or_default()
            .insert(name.into(), value.into());
    }

    /// The submissions recorded so far, in order.
    #[must_use]
    pub fn submissions(&self) -> Vec<SubmissionRecord> {
        self.submissions.lock().clone()
    }

    /// The entry names submitted so far, in order.
    #[must_use]
    pub fn submitted_entries(&self) -> Vec<String> {
        self.submissions
            .lock()
            .iter()
            .map(|record| record.entry.clone())
            .collect()
    }

    /// The handle issued for an entry name, if it was submitted.
    #[must_use]
    pub fn handle_for(&self, entry: &str) -> Option<Arc<MockRunHandle>> {
        self.handles.lock().get(entry).cloned()
    }
}

#[async_trait]
impl ExecutionBackend for MockBackend {
    async fn submit(
        &self,
        source: &str,
        entry: &str,
        parameters: BTreeMap<String, serde_json::Value>,
        run_name: &str,
        options: &RunOptions,
    ) -> Result<Arc<dyn RunHandle>, WorkflowError> {
        let run_id = format!("run-{entry}-{}", Uuid::new_v4());

        if let Some(store) = &self.store {
            let mut record =
                RunRecord::new(run_id.clone(), format!("mock://artifacts/{run_id}"));
            for (name, value) in &parameters {
                record.params.insert(name.clone(), stringify(value));
            }
            if let Some(scripted) = self.logged_params.lock().get(entry) {
                record.params.extend(scripted.clone());
            }
            store.insert(record);
        }

        let mut handle = if self.fail_entries.lock().contains(entry) {
            MockRunHandle::failing(run_id)
        } else {
            MockRunHandle::succeeding(run_id)
        };
        if self.no_cancel_entries.lock().contains(entry) {
            handle = handle.without_cancel_support();
        }
        if self.fail_cancel_entries.lock().contains(entry) {
            handle = handle.with_failing_cancel();
        }
        let handle = Arc::new(handle);

        self.submissions.lock().push(SubmissionRecord {
            source: source.to_string(),
            entry: entry.to_string(),
            parameters,
            run_name: run_name.to_string(),
            options: options.clone(),
        });
        self.handles
            .lock()
            .insert(entry.to_string(), Arc::clone(&handle));

        Ok(handle)
    }
}

/// An in-memory run-metadata store.
#[derive(Default)]
pub struct MockTrackingStore {
    runs: Mutex<BTreeMap<String, RunRecord>>,
}

impl MockTrackingStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a run record.
    pub fn insert(&self, record: RunRecord) {
        self.runs.lock().insert(record.run_id.clone(), record);
    }

    /// Removes every registered run record.
    pub fn clear(&self) {
        self.runs.lock().clear();
    }
}

#[async_trait]
impl TrackingStore for MockTrackingStore {
    async fn get_run(&self, run_id: &str) -> Result<RunRecord, WorkflowError> {
        self.runs.lock().get(run_id).cloned().ok_or_else(|| {
            WorkflowError::Backend(format!("run '{run_id}' not found in tracking store"))
        })
    }
}

fn stringify(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
