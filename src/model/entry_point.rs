//! Entry points: one executable step of the pipeline.

use super::ParamBinding;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A declared parameter of an entry point.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParamSpec {
    /// The declared parameter type (e.g. "string", "path"), if any.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub param_type: Option<String>,

    /// The declared default value, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

impl ParamSpec {
    /// Creates a parameter spec with only a type.
    #[must_use]
    pub fn typed(param_type: impl Into<String>) -> Self {
        Self {
            param_type: Some(param_type.into()),
            default: None,
        }
    }

    /// Creates a parameter spec with a default value.
    #[must_use]
    pub fn with_default(value: impl Into<serde_json::Value>) -> Self {
        Self {
            param_type: None,
            default: Some(value.into()),
        }
    }
}

/// One executable step of the pipeline.
///
/// Constructed once during graph assembly (a locally declared entry point is
/// layered on top of any entry point it delegates to in a referenced
/// sub-project) and immutable thereafter. Identity is the graph key owned by
/// the surrounding mapping, not the entry point itself.
///
/// Invariant: `depends_on` is a superset of every entry-point key referenced
/// by `parameter_source` once the graph has applied dependency inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryPoint {
    /// Path or URI of the project containing this entry point.
    pub source: String,

    /// The callable entry name within the source project.
    pub entry: String,

    /// Declared parameters, each with an optional default value.
    #[serde(default)]
    pub parameters: BTreeMap<String, ParamSpec>,

    /// Where each parameter's runtime value comes from.
    #[serde(default)]
    pub parameter_source: BTreeMap<String, ParamBinding>,

    /// Keys of entry points that must complete before this one runs.
    #[serde(default)]
    pub depends_on: BTreeSet<String>,
}

impl EntryPoint {
    /// Starts building an entry point.
    #[must_use]
    pub fn builder(source: impl Into<String>, entry: impl Into<String>) -> EntryPointBuilder {
        EntryPointBuilder {
            inner: Self {
                source: source.into(),
                entry: entry.into(),
                parameters: BTreeMap::new(),
                parameter_source: BTreeMap::new(),
                depends_on: BTreeSet::new(),
            },
        }
    }

    /// Projects the declared parameters to their default values.
    ///
    /// Parameters with no declared default are omitted.
    #[must_use]
    pub fn defaults(&self) -> BTreeMap<String, serde_json::Value> {
        self.parameters
            .iter()
            .filter_map(|(name, spec)| {
                spec.default.as_ref().map(|value| (name.clone(), value.clone()))
            })
            .collect()
    }

    /// Looks up the declared default for one parameter.
    #[must_use]
    pub fn default_for(&self, name: &str) -> Option<&serde_json::Value> {
        self.parameters.get(name).and_then(|spec| spec.default.as_ref())
    }
}

/// Builder for [`EntryPoint`].
///
/// Delegated sub-project merging is expressed as explicit composition:
/// build the upstream entry point first, then overlay local declarations
/// with [`layered_on`](Self::layered_on).
#[derive(Debug, Clone)]
pub struct EntryPointBuilder {
    inner: EntryPoint,
}

impl EntryPointBuilder {
    /// Declares a parameter.
    #[must_use]
    pub fn parameter(mut self, name: impl Into<String>, spec: ParamSpec) -> Self {
        self.inner.parameters.insert(name.into(), spec);
        self
    }

    /// Declares a parameter with a default value.
    #[must_use]
    pub fn parameter_default(
        mut self,
        name: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.inner
            .parameters
            .insert(name.into(), ParamSpec::with_default(value));
        self
    }

    /// Binds a parameter to a resolution source.
    #[must_use]
    pub fn binding(mut self, name: impl Into<String>, binding: ParamBinding) -> Self {
        self.inner.parameter_source.insert(name.into(), binding);
        self
    }

    /// Adds a dependency key.
    #[must_use]
    pub fn dependency(mut self, key: impl Into<String>) -> Self {
        self.inner.depends_on.insert(key.into());
        self
    }

    /// Adds several dependency keys.
    #[must_use]
    pub fn dependencies(mut self, keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.inner
            .depends_on
            .extend(keys.into_iter().map(Into::into));
        self
    }

    /// Layers the declarations built so far on top of an upstream entry
    /// point.
    ///
    /// Inherited parameters, bindings, and dependencies are kept; local
    /// entries win key-by-key. The local source and entry name are
    /// preserved.
    #[must_use]
    pub fn layered_on(mut self, upstream: &EntryPoint) -> Self {
        let mut parameters = upstream.parameters.clone();
        parameters.append(&mut self.inner.parameters);
        self.inner.parameters = parameters;

        let mut parameter_source = upstream.parameter_source.clone();
        parameter_source.append(&mut self.inner.parameter_source);
        self.inner.parameter_source = parameter_source;

        self.inner
            .depends_on
            .extend(upstream.depends_on.iter().cloned());
        self
    }

    /// Finishes building the entry point.
    #[must_use]
    pub fn build(self) -> EntryPoint {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_projection() {
        let entry = EntryPoint::builder(".", "train")
            .parameter_default("epochs", 10)
            .parameter("data", ParamSpec::typed("path"))
            .build();

        let defaults = entry.defaults();
        assert_eq!(defaults.get("epochs"), Some(&serde_json::json!(10)));
        assert!(!defaults.contains_key("data"));
    }

    #[test]
    fn test_layering_keeps_inherited_and_prefers_local() {
        let upstream = EntryPoint::builder("./sub", "train")
            .parameter_default("epochs", 10)
            .parameter_default("lr", 0.1)
            .binding("data", ParamBinding::artifact("load_data", "data.csv"))
            .dependency("load_data")
            .build();

        let merged = EntryPoint::builder("./sub", "train")
            .parameter_default("epochs", 20)
            .dependency("gen_metrics")
            .layered_on(&upstream)
            .build();

        // Local default wins; inherited declarations survive.
        assert_eq!(merged.default_for("epochs"), Some(&serde_json::json!(20)));
        assert_eq!(merged.default_for("lr"), Some(&serde_json::json!(0.1)));
        assert!(merged.parameter_source.contains_key("data"));
        assert!(merged.depends_on.contains("load_data"));
        assert!(merged.depends_on.contains("gen_metrics"));
    }
}
