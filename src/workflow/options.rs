//! Execution options forwarded to the backend.

use crate::backend::{RunRecord, TAG_BACKEND, TAG_ENV_MANAGER};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The backend used when neither the caller nor the active run names one.
pub const DEFAULT_BACKEND: &str = "local";

/// The root key assumed when neither the caller nor the active run names
/// one.
pub const DEFAULT_ROOT_KEY: &str = "root";

/// Resolved execution options handed to the backend with every submission.
///
/// The `synchronous` flag is a configuration hint forwarded to the backend,
/// not a change to graph traversal: sequencing is enforced structurally by
/// each run unit's dependency wait.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOptions {
    /// Execution backend identity (e.g. "local", "kubernetes").
    pub backend: String,

    /// Environment manager for the launched unit, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_manager: Option<String>,

    /// Whether the backend should block each submission until completion.
    #[serde(default)]
    pub synchronous: bool,

    /// Free-form backend-specific options, forwarded unchanged.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            backend: DEFAULT_BACKEND.to_string(),
            env_manager: None,
            synchronous: false,
            extra: BTreeMap::new(),
        }
    }
}

impl RunOptions {
    /// Overlays caller-supplied values atop the active run's ambient tag
    /// defaults.
    #[must_use]
    pub fn resolve(overrides: RunOptionsOverride, active_run: &RunRecord) -> Self {
        let backend = overrides
            .backend
            .or_else(|| active_run.tags.get(TAG_BACKEND).cloned())
            .unwrap_or_else(|| DEFAULT_BACKEND.to_string());
        let env_manager = overrides
            .env_manager
            .or_else(|| active_run.tags.get(TAG_ENV_MANAGER).cloned());

        Self {
            backend,
            env_manager,
            synchronous: overrides.sequential,
            extra: overrides.extra,
        }
    }
}

/// Caller-supplied execution options, each falling back to the active run's
/// ambient defaults when absent.
#[derive(Debug, Clone, Default)]
pub struct RunOptionsOverride {
    /// Execution backend identity.
    pub backend: Option<String>,

    /// Environment manager for launched units.
    pub env_manager: Option<String>,

    /// Run the steps sequentially instead of fanning out where possible.
    pub sequential: bool,

    /// Free-form backend-specific options.
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl RunOptionsOverride {
    /// Sets the backend identity.
    #[must_use]
    pub fn with_backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = Some(backend.into());
        self
    }

    /// Sets the environment manager.
    #[must_use]
    pub fn with_env_manager(mut self, env_manager: impl Into<String>) -> Self {
        self.env_manager = Some(env_manager.into());
        self
    }

    /// Requests sequential execution.
    #[must_use]
    pub fn sequential(mut self) -> Self {
        self.sequential = true;
        self
    }

    /// Adds a backend-specific option.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_resolve_falls_back_to_tags() {
        let active_run = RunRecord::new("run1", "file:///artifacts")
            .with_tag(TAG_BACKEND, "kubernetes")
            .with_tag(TAG_ENV_MANAGER, "conda");

        let options = RunOptions::resolve(RunOptionsOverride::default(), &active_run);

        assert_eq!(options.backend, "kubernetes");
        assert_eq!(options.env_manager.as_deref(), Some("conda"));
        assert!(!options.synchronous);
    }

    #[test]
    fn test_resolve_prefers_caller_values() {
        let active_run = RunRecord::new("run1", "file:///artifacts")
            .with_tag(TAG_BACKEND, "kubernetes");

        let overrides = RunOptionsOverride::default()
            .with_backend("local")
            .sequential();
        let options = RunOptions::resolve(overrides, &active_run);

        assert_eq!(options.backend, "local");
        assert!(options.synchronous);
    }

    #[test]
    fn test_resolve_defaults_to_local() {
        let active_run = RunRecord::new("run1", "file:///artifacts");

        let options = RunOptions::resolve(RunOptionsOverride::default(), &active_run);

        assert_eq!(options.backend, DEFAULT_BACKEND);
        assert_eq!(options.env_manager, None);
    }
}
