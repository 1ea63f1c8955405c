//! Dependency graph construction and topological ordering.
//!
//! The graph derives a dependency set per entry point (explicit `depends_on`
//! plus edges implied by parameter bindings that reference other entry
//! points) and produces a deterministic depth-first topological ordering
//! rooted at a designated entry point.

use crate::errors::{CycleDetectedError, InvalidGraphError, WorkflowError};
use crate::model::EntryPoint;
use std::collections::{BTreeMap, HashMap};

/// Visitation marker for the traversal.
///
/// The separate in-progress state turns a cyclic graph into a reported
/// [`CycleDetectedError`] instead of unbounded traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitState {
    InProgress,
    Done,
}

/// A mapping from key to [`EntryPoint`] with no implicit nodes.
///
/// Construction applies dependency inference: every artifact or
/// logged-parameter binding adds its upstream key to the owning entry
/// point's dependency set, keeping the dependency set consistent with the
/// data-flow graph even when authors omit explicit declarations.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: BTreeMap<String, EntryPoint>,
}

impl DependencyGraph {
    /// Builds a graph from entry points, inferring binding-implied edges.
    #[must_use]
    pub fn new(entry_points: BTreeMap<String, EntryPoint>) -> Self {
        Self {
            nodes: infer_dependencies(entry_points),
        }
    }

    /// Returns the entry point for a key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&EntryPoint> {
        self.nodes.get(key)
    }

    /// Returns true if the graph declares the given key.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.nodes.contains_key(key)
    }

    /// Returns the key-to-entry-point mapping.
    #[must_use]
    pub const fn nodes(&self) -> &BTreeMap<String, EntryPoint> {
        &self.nodes
    }

    /// Returns the number of entry points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the graph has no entry points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Consumes the graph, returning the entry points with inferred
    /// dependencies applied.
    #[must_use]
    pub fn into_nodes(self) -> BTreeMap<String, EntryPoint> {
        self.nodes
    }

    /// Produces a deterministic depth-first topological ordering.
    ///
    /// Every dependency key appears strictly before its dependents. The
    /// root, when supplied, must exist, must have an empty dependency set,
    /// and is excluded from the ordering: it stands for the pipeline's own
    /// top-level run and is never submitted as a step.
    ///
    /// # Errors
    ///
    /// [`InvalidGraphError`] when the root is unknown or declares
    /// dependencies, or when a dependency edge points at an undeclared key;
    /// [`CycleDetectedError`] when the graph is cyclic.
    pub fn topological_order(&self, root: Option<&str>) -> Result<Vec<String>, WorkflowError> {
        let mut states: HashMap<&str, VisitState> = HashMap::with_capacity(self.nodes.len());

        if let Some(root) = root {
            let node = self
                .nodes
                .get(root)
                .ok_or_else(|| InvalidGraphError::UnknownRoot {
                    root: root.to_string(),
                })?;
            if !node.depends_on.is_empty() {
                return Err(InvalidGraphError::RootHasDependencies {
                    root: root.to_string(),
                    dependencies: node.depends_on.iter().cloned().collect(),
                }
                .into());
            }
            // The root is only ever the pipeline's own run; mark it done so
            // traversal never visits or emits it.
            if let Some((key, _)) = self.nodes.get_key_value(root) {
                states.insert(key.as_str(), VisitState::Done);
            }
        }

        let mut order = Vec::with_capacity(self.nodes.len());
        for key in self.nodes.keys() {
            if states.contains_key(key.as_str()) {
                continue;
            }
            self.visit(key, &mut states, &mut order)?;
        }

        Ok(order)
    }

    /// Depth-first post-order walk from one seed node.
    ///
    /// Uses an explicit stack of (node, dependency-iterator) frames instead
    /// of recursion, so graph depth is not bounded by the call stack.
    fn visit<'a>(
        &'a self,
        start: &'a str,
        states: &mut HashMap<&'a str, VisitState>,
        order: &mut Vec<String>,
    ) -> Result<(), WorkflowError> {
        let Some((start_key, start_node)) = self.nodes.get_key_value(start) else {
            return Ok(());
        };

        let mut stack: Vec<(&'a str, std::collections::btree_set::Iter<'a, String>)> =
            vec![(start_key.as_str(), start_node.depends_on.iter())];
        states.insert(start_key.as_str(), VisitState::InProgress);

        while let Some(frame) = stack.last_mut() {
            let node = frame.0;
            let Some(dep) = frame.1.next() else {
                // All dependencies emitted; post-order append.
                states.insert(node, VisitState::Done);
                order.push(node.to_string());
                stack.pop();
                continue;
            };

            match states.get(dep.as_str()) {
                Some(VisitState::Done) => {}
                Some(VisitState::InProgress) => {
                    let from = stack
                        .iter()
                        .position(|(name, _)| *name == dep.as_str())
                        .unwrap_or(0);
                    let mut cycle_path: Vec<String> = stack[from..]
                        .iter()
                        .map(|(name, _)| (*name).to_string())
                        .collect();
                    cycle_path.push(dep.clone());
                    return Err(CycleDetectedError::new(cycle_path).into());
                }
                None => {
                    let (dep_key, dep_node) =
                        self.nodes.get_key_value(dep.as_str()).ok_or_else(|| {
                            InvalidGraphError::MissingDependency {
                                node: node.to_string(),
                                dependency: dep.clone(),
                            }
                        })?;
                    states.insert(dep_key.as_str(), VisitState::InProgress);
                    stack.push((dep_key.as_str(), dep_node.depends_on.iter()));
                }
            }
        }

        Ok(())
    }
}

/// Adds binding-implied edges to every entry point's dependency set.
fn infer_dependencies(
    mut entry_points: BTreeMap<String, EntryPoint>,
) -> BTreeMap<String, EntryPoint> {
    for entry_point in entry_points.values_mut() {
        let implied: Vec<String> = entry_point
            .parameter_source
            .values()
            .filter_map(|binding| binding.upstream_key().map(str::to_string))
            .collect();
        entry_point.depends_on.extend(implied);
    }
    entry_points
}
