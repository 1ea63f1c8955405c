//! Parameter-source bindings.

use serde::{Deserialize, Serialize};

/// The rule for how a parameter's runtime value is obtained.
///
/// Bindings are owned by the [`EntryPoint`](super::EntryPoint) that declares
/// them; they only reference other entry points by key, never hold them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParamBinding {
    /// A relative path within an upstream run's artifact store.
    Artifact {
        /// The upstream entry-point key.
        from: String,
        /// The path relative to the upstream run's artifact base location.
        path: String,
    },

    /// A parameter value logged by an upstream run, with fallback to the
    /// upstream entry point's declared default.
    LoggedParam {
        /// The upstream entry-point key.
        from: String,
        /// The logged parameter name.
        name: String,
    },

    /// A directly supplied value, not tied to any upstream run.
    Literal {
        /// The value to pass through unchanged.
        value: serde_json::Value,
    },
}

impl ParamBinding {
    /// Creates an artifact binding.
    #[must_use]
    pub fn artifact(from: impl Into<String>, path: impl Into<String>) -> Self {
        Self::Artifact {
            from: from.into(),
            path: path.into(),
        }
    }

    /// Creates a logged-parameter binding.
    #[must_use]
    pub fn logged_param(from: impl Into<String>, name: impl Into<String>) -> Self {
        Self::LoggedParam {
            from: from.into(),
            name: name.into(),
        }
    }

    /// Creates a literal binding.
    #[must_use]
    pub fn literal(value: impl Into<serde_json::Value>) -> Self {
        Self::Literal {
            value: value.into(),
        }
    }

    /// Returns the upstream entry-point key this binding references, if any.
    ///
    /// Resolution requires the upstream run to exist and be tracked, so
    /// every key returned here implies a dependency edge.
    #[must_use]
    pub fn upstream_key(&self) -> Option<&str> {
        match self {
            Self::Artifact { from, .. } | Self::LoggedParam { from, .. } => Some(from),
            Self::Literal { .. } => None,
        }
    }
}
