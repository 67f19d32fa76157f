//! Static measure registry and graph-construction primitives.

pub mod graph;

use std::collections::{BTreeSet, HashMap};

use crate::model::measure::Measure;

pub use graph::DependencyGraph;

/// Holds the static measure definitions and builds dependency graphs over
/// them.
///
/// Registries are constructed explicitly (from code or the TOML loader)
/// and shared read-only; there is no global instance.
#[derive(Debug, Clone, Default)]
pub struct MeasureRegistry {
    measures: HashMap<String, Measure>,
}

impl MeasureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a collection of definitions. Later duplicates
    /// replace earlier ones.
    pub fn from_measures(measures: impl IntoIterator<Item = Measure>) -> Self {
        let mut registry = Self::new();
        for measure in measures {
            registry.insert(measure);
        }
        registry
    }

    /// Register a definition, returning any previous definition under the
    /// same key.
    pub fn insert(&mut self, measure: Measure) -> Option<Measure> {
        self.measures.insert(measure.key.clone(), measure)
    }

    pub fn get(&self, key: &str) -> Option<&Measure> {
        self.measures.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.measures.contains_key(key)
    }

    /// All registered keys, sorted.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.measures.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    pub fn len(&self) -> usize {
        self.measures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measures.is_empty()
    }

    pub fn measures(&self) -> impl Iterator<Item = &Measure> {
        self.measures.values()
    }

    /// Build the dependency graph for a requested measure set: walk each
    /// measure's referenced keys recursively to the transitive closure,
    /// memoized per build call. The graph is built per request and never
    /// cached across requests.
    pub fn dependency_graph<K: AsRef<str>>(&self, keys: &[K]) -> DependencyGraph {
        let mut graph = DependencyGraph::default();
        for key in keys {
            let mut stack = Vec::new();
            self.walk(key.as_ref(), &mut graph, &mut stack);
        }
        graph
    }

    fn walk(&self, key: &str, graph: &mut DependencyGraph, stack: &mut Vec<String>) {
        if graph.direct.contains_key(key) || stack.iter().any(|k| k == key) {
            return;
        }

        let deps = self
            .get(key)
            .map(|m| m.referenced_measures())
            .unwrap_or_default();
        graph.direct.insert(key.to_string(), deps.clone());

        stack.push(key.to_string());
        for dep in &deps {
            self.walk(dep, graph, stack);
        }
        stack.pop();

        // Transitive closure from the post-order results. Members of a
        // cycle get a partial closure; topological_sort rejects the graph
        // before anything consumes it.
        let mut all = BTreeSet::new();
        for dep in &deps {
            all.insert(dep.clone());
            if let Some(transitive) = graph.transitive.get(dep) {
                all.extend(transitive.iter().cloned());
            }
        }
        graph.transitive.insert(key.to_string(), all);
    }
}
