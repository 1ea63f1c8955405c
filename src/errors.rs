//! Error types for the runweave orchestration core.
//!
//! The taxonomy separates configuration problems (surfaced before any
//! execution begins), graph-shape violations, orchestration contract bugs,
//! and per-unit resolution failures. Nothing in this core retries silently;
//! the workflow's terminal [`RunStatus`](crate::model::RunStatus) is the
//! externally observable failure signal.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for runweave operations.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// A malformed or missing project declaration.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// The dependency graph violates a structural invariant.
    #[error("{0}")]
    InvalidGraph(#[from] InvalidGraphError),

    /// A cycle was detected in the dependency graph.
    #[error("{0}")]
    CycleDetected(#[from] CycleDetectedError),

    /// A programming-contract violation in the driving logic.
    #[error("{0}")]
    Orchestration(#[from] OrchestrationError),

    /// A parameter binding could not be resolved.
    #[error("{0}")]
    Resolution(#[from] ResolutionError),

    /// An upstream unit finished unsuccessfully or was cancelled.
    #[error("{0}")]
    Dependency(#[from] DependencyFailure),

    /// The execution backend reported a failure.
    #[error("backend error: {0}")]
    Backend(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error raised when a project declaration is malformed or missing.
///
/// Configuration errors are fatal and surface before any execution begins.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// No project file was found under the given location.
    #[error("no project file found under '{}'", location.display())]
    ProjectFileNotFound {
        /// The directory that was searched.
        location: PathBuf,
    },

    /// The project file could not be parsed.
    #[error("failed to parse project file '{}': {source}", path.display())]
    Malformed {
        /// The offending file.
        path: PathBuf,
        /// The underlying parse error.
        #[source]
        source: serde_yaml::Error,
    },

    /// A delegated entry point does not exist in the referenced sub-project.
    #[error("entry point '{entry}' not found in project '{}'", location.display())]
    UnknownEntryPoint {
        /// The missing entry-point key.
        entry: String,
        /// The sub-project that was searched.
        location: PathBuf,
    },

    /// A parameter-source declaration is not one of the supported kinds.
    #[error("invalid binding for parameter '{parameter}': {reason}")]
    InvalidBinding {
        /// The parameter carrying the bad binding.
        parameter: String,
        /// Why the binding was rejected.
        reason: String,
    },

    /// The project file could not be read.
    #[error("failed to read project file '{}': {source}", path.display())]
    Io {
        /// The offending file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Error raised when the dependency graph violates a structural invariant.
#[derive(Debug, Clone, Error)]
pub enum InvalidGraphError {
    /// The designated root entry point declares upstream dependencies.
    ///
    /// The root is the top of the tree, not a downstream consumer.
    #[error("root entry point '{root}' cannot have dependencies: {dependencies:?}")]
    RootHasDependencies {
        /// The root key.
        root: String,
        /// The offending dependency set.
        dependencies: Vec<String>,
    },

    /// The designated root entry point is not declared in the graph.
    #[error("root entry point '{root}' is not declared in the graph")]
    UnknownRoot {
        /// The root key.
        root: String,
    },

    /// An entry point depends on a key with no declared node.
    #[error("entry point '{node}' depends on undeclared entry point '{dependency}'")]
    MissingDependency {
        /// The dependent node.
        node: String,
        /// The missing dependency key.
        dependency: String,
    },
}

/// Error raised when a cycle is detected in the dependency graph.
#[derive(Debug, Clone, Error)]
#[error("cycle detected in workflow graph: {}", cycle_path.join(" -> "))]
pub struct CycleDetectedError {
    /// The path of entry points forming the cycle.
    pub cycle_path: Vec<String>,
}

impl CycleDetectedError {
    /// Creates a new cycle detected error.
    #[must_use]
    pub const fn new(cycle_path: Vec<String>) -> Self {
        Self { cycle_path }
    }
}

/// Error raised on a programming-contract violation in the driving logic.
///
/// These indicate a bug in the caller, not a transient condition.
#[derive(Debug, Clone, Error)]
pub enum OrchestrationError {
    /// The same run unit was submitted twice.
    #[error("entry point '{key}' was already submitted")]
    DoubleSubmission {
        /// The entry-point key.
        key: String,
    },

    /// A run record was requested before any submission occurred.
    #[error("run for entry point '{key}' requested before submission")]
    NotSubmitted {
        /// The entry-point key.
        key: String,
    },
}

/// Error raised when a declared parameter binding cannot be resolved.
#[derive(Debug, Clone, Error)]
pub enum ResolutionError {
    /// A logged-parameter binding has neither a logged value nor a default.
    #[error(
        "parameter '{parameter}' of entry point '{entry}' has no logged value \
         on upstream '{upstream}' and no declared default"
    )]
    MissingLoggedParameter {
        /// The entry point being resolved.
        entry: String,
        /// The upstream entry-point key the binding references.
        upstream: String,
        /// The bound parameter name.
        parameter: String,
    },

    /// A binding references an entry-point key with no run unit.
    #[error("parameter '{parameter}' of entry point '{entry}' references unknown upstream '{upstream}'")]
    UnknownUpstream {
        /// The entry point being resolved.
        entry: String,
        /// The unknown upstream key.
        upstream: String,
        /// The bound parameter name.
        parameter: String,
    },
}

/// Failure of an upstream unit, propagated fail-fast to its dependents.
#[derive(Debug, Clone, Error)]
#[error("dependency '{key}' finished unsuccessfully")]
pub struct DependencyFailure {
    /// The failed upstream entry-point key.
    pub key: String,
}

impl DependencyFailure {
    /// Creates a new dependency failure for the given upstream key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_error_display() {
        let err = CycleDetectedError::new(vec![
            "a".to_string(),
            "b".to_string(),
            "a".to_string(),
        ]);

        assert!(err.to_string().contains("a -> b -> a"));
    }

    #[test]
    fn test_root_has_dependencies_display() {
        let err = InvalidGraphError::RootHasDependencies {
            root: "root".to_string(),
            dependencies: vec!["train".to_string()],
        };

        assert!(err.to_string().contains("root"));
        assert!(err.to_string().contains("train"));
    }

    #[test]
    fn test_orchestration_error_display() {
        let err = OrchestrationError::DoubleSubmission {
            key: "train".to_string(),
        };
        assert_eq!(err.to_string(), "entry point 'train' was already submitted");
    }

    #[test]
    fn test_workflow_error_from_dependency_failure() {
        let err: WorkflowError = DependencyFailure::new("load_data").into();
        assert!(matches!(err, WorkflowError::Dependency(_)));
        assert!(err.to_string().contains("load_data"));
    }
}
