//! Declarative project loading.
//!
//! A project is a directory containing a `workflow.yaml` file (case
//! insensitive, `.yml` accepted) declaring entry points. An entry point may
//! delegate to another project via `source`; delegation composes
//! explicitly: the referenced entry point is built first, then the local
//! parameters, bindings, and dependencies are layered on top.
//!
//! ```yaml
//! name: example
//! entry_points:
//!   load_data:
//!     parameters:
//!       path: { type: string, default: data.csv }
//!   train:
//!     source: ./training
//!     entry: train_model
//!     depends_on: load_data
//!     parameter_source:
//!       data: { type: artifact, id: load_data, key: data.csv }
//! ```

use crate::errors::ConfigurationError;
use crate::model::{EntryPoint, EntryPointBuilder, ParamBinding, ParamSpec};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Project file names probed in order, case insensitively.
pub const PROJECT_FILE_NAMES: [&str; 2] = ["workflow.yaml", "workflow.yml"];

/// Supplies the entry-point model's raw inputs from a project location.
pub trait ProjectLoader: Send + Sync {
    /// Loads and normalizes every entry point declared at `location`,
    /// resolving delegated sub-project sources.
    fn load(&self, location: &Path) -> Result<BTreeMap<String, EntryPoint>, ConfigurationError>;
}

/// Loads projects from YAML `workflow.yaml` files.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlProjectLoader;

impl ProjectLoader for YamlProjectLoader {
    fn load(&self, location: &Path) -> Result<BTreeMap<String, EntryPoint>, ConfigurationError> {
        let project = load_raw_project(location)?;
        debug!(location = %location.display(), entry_points = project.entry_points.len(), "loaded project");

        project
            .entry_points
            .into_iter()
            .map(|(key, raw)| {
                let entry_point = load_entry(raw, &key, location)?;
                Ok((key, entry_point))
            })
            .collect()
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawProject {
    #[serde(default)]
    #[allow(dead_code)]
    name: Option<String>,
    #[serde(default)]
    entry_points: BTreeMap<String, RawEntryPoint>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawEntryPoint {
    /// Delegation to a sub-project, relative to the declaring project.
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    entry: Option<String>,
    /// The launch command is a backend concern; accepted and ignored here.
    #[serde(default)]
    #[allow(dead_code)]
    command: Option<String>,
    #[serde(default)]
    depends_on: DependsOn,
    #[serde(default)]
    parameters: BTreeMap<String, RawParam>,
    #[serde(default)]
    parameter_source: BTreeMap<String, RawBinding>,
}

/// `depends_on` accepts a single key or a sequence of keys.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum DependsOn {
    One(String),
    Many(Vec<String>),
}

impl Default for DependsOn {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

impl DependsOn {
    fn into_set(self) -> BTreeSet<String> {
        match self {
            Self::One(key) => BTreeSet::from([key]),
            Self::Many(keys) => keys.into_iter().collect(),
        }
    }
}

/// A declared parameter: a bare type string or a `{type, default}` map.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawParam {
    Typed(String),
    Spec {
        #[serde(rename = "type", default)]
        param_type: Option<String>,
        #[serde(default)]
        default: Option<serde_json::Value>,
    },
}

impl From<RawParam> for ParamSpec {
    fn from(raw: RawParam) -> Self {
        match raw {
            RawParam::Typed(param_type) => Self::typed(param_type),
            RawParam::Spec {
                param_type,
                default,
            } => Self {
                param_type,
                default,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawBinding {
    /// Binding kind; logged-parameter when omitted.
    #[serde(rename = "type", default)]
    kind: Option<String>,
    /// The upstream entry-point key.
    #[serde(default)]
    id: Option<String>,
    /// Artifact path or logged parameter name.
    #[serde(default)]
    key: Option<String>,
    /// The value of a literal binding.
    #[serde(default)]
    value: Option<serde_json::Value>,
}

impl RawBinding {
    fn into_binding(self, parameter: &str) -> Result<ParamBinding, ConfigurationError> {
        let invalid = |reason: &str| ConfigurationError::InvalidBinding {
            parameter: parameter.to_string(),
            reason: reason.to_string(),
        };

        match self.kind.as_deref() {
            Some("artifact") => {
                let from = self.id.ok_or_else(|| invalid("artifact binding requires 'id'"))?;
                let path = self.key.ok_or_else(|| invalid("artifact binding requires 'key'"))?;
                Ok(ParamBinding::artifact(from, path))
            }
            Some("parameter") | None => {
                let from = self
                    .id
                    .ok_or_else(|| invalid("parameter binding requires 'id'"))?;
                let name = self
                    .key
                    .ok_or_else(|| invalid("parameter binding requires 'key'"))?;
                Ok(ParamBinding::logged_param(from, name))
            }
            Some("literal") => {
                let value = self
                    .value
                    .ok_or_else(|| invalid("literal binding requires 'value'"))?;
                Ok(ParamBinding::literal(value))
            }
            Some(other) => Err(invalid(&format!("unsupported binding type '{other}'"))),
        }
    }
}

fn load_raw_project(location: &Path) -> Result<RawProject, ConfigurationError> {
    let path = find_project_file(location).ok_or_else(|| {
        ConfigurationError::ProjectFileNotFound {
            location: location.to_path_buf(),
        }
    })?;

    let content = fs::read_to_string(&path).map_err(|source| ConfigurationError::Io {
        path: path.clone(),
        source,
    })?;

    serde_yaml::from_str(&content).map_err(|source| ConfigurationError::Malformed {
        path,
        source,
    })
}

fn find_project_file(location: &Path) -> Option<PathBuf> {
    for name in PROJECT_FILE_NAMES {
        let entries = fs::read_dir(location).ok()?;
        for entry in entries.flatten() {
            if entry.file_name().to_string_lossy().eq_ignore_ascii_case(name) {
                return Some(entry.path());
            }
        }
    }
    None
}

fn load_entry(
    raw: RawEntryPoint,
    key: &str,
    location: &Path,
) -> Result<EntryPoint, ConfigurationError> {
    let entry = raw.entry.clone().unwrap_or_else(|| key.to_string());

    match raw.source.clone() {
        None => {
            let builder = local_builder(raw, &location.display().to_string(), &entry)?;
            Ok(builder.build())
        }
        Some(source) => {
            let source_path = resolve_source(location, &source);
            let sub_project = load_raw_project(&source_path)?;
            let sub_raw = sub_project.entry_points.get(&entry).cloned().ok_or_else(|| {
                ConfigurationError::UnknownEntryPoint {
                    entry: entry.clone(),
                    location: source_path.clone(),
                }
            })?;
            let upstream = load_entry(sub_raw, &entry, &source_path)?;

            let builder = local_builder(raw, &source_path.display().to_string(), &entry)?;
            Ok(builder.layered_on(&upstream).build())
        }
    }
}

fn local_builder(
    raw: RawEntryPoint,
    source: &str,
    entry: &str,
) -> Result<EntryPointBuilder, ConfigurationError> {
    let mut builder = EntryPoint::builder(source, entry)
        .dependencies(raw.depends_on.into_set());

    for (name, param) in raw.parameters {
        builder = builder.parameter(name, param.into());
    }
    for (name, raw_binding) in raw.parameter_source {
        let binding = raw_binding.into_binding(&name)?;
        builder = builder.binding(name, binding);
    }

    Ok(builder)
}

fn resolve_source(location: &Path, source: &str) -> PathBuf {
    let path = Path::new(source);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        let joined = location.join(path);
        joined.canonicalize().unwrap_or(joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn write_project(dir: &Path, content: &str) {
        fs::write(dir.join("workflow.yaml"), content).unwrap();
    }

    #[test]
    fn test_missing_project_file_is_a_configuration_error() {
        let dir = TempDir::new().unwrap();

        let err = YamlProjectLoader.load(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigurationError::ProjectFileNotFound { .. }));
    }

    #[test]
    fn test_malformed_yaml_is_a_configuration_error() {
        let dir = TempDir::new().unwrap();
        write_project(dir.path(), "entry_points: [not, a, map]");

        let err = YamlProjectLoader.load(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigurationError::Malformed { .. }));
    }

    #[test]
    fn test_case_insensitive_file_discovery() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("Workflow.YAML"),
            "entry_points:\n  main: {}\n",
        )
        .unwrap();

        let entry_points = YamlProjectLoader.load(dir.path()).unwrap();
        assert!(entry_points.contains_key("main"));
    }

    #[test]
    fn test_loads_parameters_bindings_and_dependencies() {
        let dir = TempDir::new().unwrap();
        write_project(
            dir.path(),
            r"
name: example
entry_points:
  load_data:
    command: python load.py
    parameters:
      path: string
      limit: { type: int, default: 100 }
  train:
    depends_on: load_data
    parameter_source:
      data: { type: artifact, id: load_data, key: data.csv }
      limit: { type: parameter, id: load_data, key: limit }
      title: { type: literal, value: nightly }
  report:
    depends_on: [load_data, train]
",
        );

        let entry_points = YamlProjectLoader.load(dir.path()).unwrap();

        let load_data = &entry_points["load_data"];
        assert_eq!(load_data.entry, "load_data");
        assert_eq!(
            load_data.parameters["path"],
            ParamSpec::typed("string")
        );
        assert_eq!(
            load_data.parameters["limit"].default,
            Some(serde_json::json!(100))
        );

        let train = &entry_points["train"];
        assert!(train.depends_on.contains("load_data"));
        assert_eq!(
            train.parameter_source["data"],
            ParamBinding::artifact("load_data", "data.csv")
        );
        assert_eq!(
            train.parameter_source["limit"],
            ParamBinding::logged_param("load_data", "limit")
        );
        assert_eq!(
            train.parameter_source["title"],
            ParamBinding::literal("nightly")
        );

        let report = &entry_points["report"];
        assert_eq!(report.depends_on.len(), 2);
    }

    #[test]
    fn test_binding_type_defaults_to_parameter() {
        let dir = TempDir::new().unwrap();
        write_project(
            dir.path(),
            r"
entry_points:
  eval:
    parameter_source:
      epochs: { id: train, key: epochs }
",
        );

        let entry_points = YamlProjectLoader.load(dir.path()).unwrap();
        assert_eq!(
            entry_points["eval"].parameter_source["epochs"],
            ParamBinding::logged_param("train", "epochs")
        );
    }

    #[test]
    fn test_unsupported_binding_type_is_rejected() {
        let dir = TempDir::new().unwrap();
        write_project(
            dir.path(),
            r"
entry_points:
  eval:
    parameter_source:
      epochs: { type: metric, id: train, key: epochs }
",
        );

        let err = YamlProjectLoader.load(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidBinding { .. }));
    }

    #[test]
    fn test_delegated_source_layers_local_over_inherited() {
        let parent = TempDir::new().unwrap();
        let sub = parent.path().join("training");
        fs::create_dir(&sub).unwrap();

        write_project(
            &sub,
            r"
entry_points:
  train_model:
    parameters:
      epochs: { type: int, default: 10 }
      lr: { type: float, default: 0.1 }
    parameter_source:
      data: { type: artifact, id: load_data, key: data.csv }
",
        );
        write_project(
            parent.path(),
            r"
entry_points:
  load_data: {}
  train:
    source: ./training
    entry: train_model
    depends_on: load_data
    parameters:
      epochs: { type: int, default: 20 }
",
        );

        let entry_points = YamlProjectLoader.load(parent.path()).unwrap();
        let train = &entry_points["train"];

        assert_eq!(train.entry, "train_model");
        assert!(train.source.ends_with("training"));
        // Local default wins; inherited declarations survive.
        assert_eq!(train.default_for("epochs"), Some(&serde_json::json!(20)));
        assert_eq!(train.default_for("lr"), Some(&serde_json::json!(0.1)));
        assert!(train.parameter_source.contains_key("data"));
        assert!(train.depends_on.contains("load_data"));
    }

    #[test]
    fn test_delegation_to_unknown_entry_is_rejected() {
        let parent = TempDir::new().unwrap();
        let sub = parent.path().join("training");
        fs::create_dir(&sub).unwrap();

        write_project(&sub, "entry_points:\n  other: {}\n");
        write_project(
            parent.path(),
            "entry_points:\n  train:\n    source: ./training\n",
        );

        let err = YamlProjectLoader.load(parent.path()).unwrap_err();
        assert!(matches!(err, ConfigurationError::UnknownEntryPoint { .. }));
    }
}
