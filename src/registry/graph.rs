//! Dependency graph over measure definitions.
//!
//! Built per batch request from the registry's static definitions: direct
//! edges drive topological ordering and level grouping, the transitive
//! closure answers "what does this measure ultimately need".

use std::collections::{BTreeSet, HashMap, HashSet};

use petgraph::graph::{DiGraph, NodeIndex};

use crate::error::{EngineError, EngineResult};

/// Dependency graph for a set of measures.
///
/// Keys map to their *direct* dependencies and to the transitive closure.
/// Unknown referenced keys appear as leaf nodes; they fail the consuming
/// measure's branch at execution time, never graph construction.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    pub(crate) direct: HashMap<String, BTreeSet<String>>,
    pub(crate) transitive: HashMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    /// All keys in the graph, sorted for deterministic iteration.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.direct.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    pub fn contains(&self, key: &str) -> bool {
        self.direct.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.direct.len()
    }

    pub fn is_empty(&self) -> bool {
        self.direct.is_empty()
    }

    /// Direct dependencies of a measure.
    pub fn direct_dependencies(&self, key: &str) -> Option<&BTreeSet<String>> {
        self.direct.get(key)
    }

    /// Transitive dependencies of a measure.
    pub fn dependencies(&self, key: &str) -> Option<&BTreeSet<String>> {
        self.transitive.get(key)
    }

    /// The full transitive map (diagnostic surface).
    pub fn transitive_map(&self) -> &HashMap<String, BTreeSet<String>> {
        &self.transitive
    }

    /// A dependency-respecting order: every measure appears after all of
    /// its dependencies. Fails with `CircularDependency` (carrying the
    /// full key chain) when the graph has a cycle.
    pub fn topological_sort(&self) -> EngineResult<Vec<String>> {
        let mut graph: DiGraph<&str, ()> = DiGraph::new();
        let mut indices: HashMap<&str, NodeIndex> = HashMap::new();

        // Insert nodes in sorted order so the result is deterministic.
        for key in self.keys() {
            indices.insert(key, graph.add_node(key));
        }
        for (key, deps) in &self.direct {
            for dep in deps {
                if let (Some(&from), Some(&to)) =
                    (indices.get(dep.as_str()), indices.get(key.as_str()))
                {
                    // Edge points dependency -> dependent.
                    graph.add_edge(from, to, ());
                }
            }
        }

        match petgraph::algo::toposort(&graph, None) {
            Ok(order) => Ok(order.into_iter().map(|i| graph[i].to_string()).collect()),
            Err(_) => Err(EngineError::CircularDependency {
                chain: self.find_cycle().unwrap_or_default(),
            }),
        }
    }

    /// Partition a topological order into levels: every measure's
    /// dependencies lie in strictly lower levels, and each measure takes
    /// the earliest level its dependencies allow, maximizing per-level
    /// parallelism.
    pub fn group_by_level(&self, order: &[String]) -> Vec<Vec<String>> {
        let mut level_of: HashMap<&str, usize> = HashMap::new();
        let mut levels: Vec<Vec<String>> = Vec::new();

        for key in order {
            let level = self
                .direct
                .get(key)
                .map(|deps| {
                    deps.iter()
                        .filter_map(|d| level_of.get(d.as_str()))
                        .map(|l| l + 1)
                        .max()
                        .unwrap_or(0)
                })
                .unwrap_or(0);

            level_of.insert(key, level);
            if levels.len() <= level {
                levels.resize_with(level + 1, Vec::new);
            }
            levels[level].push(key.clone());
        }

        levels
    }

    /// Extract one cycle as a key chain ending on the re-entered key.
    fn find_cycle(&self) -> Option<Vec<String>> {
        let mut done: HashSet<&str> = HashSet::new();
        for key in self.keys() {
            let mut stack: Vec<&str> = Vec::new();
            if let Some(chain) = self.cycle_from(key, &mut stack, &mut done) {
                return Some(chain);
            }
        }
        None
    }

    fn cycle_from<'a>(
        &'a self,
        key: &'a str,
        stack: &mut Vec<&'a str>,
        done: &mut HashSet<&'a str>,
    ) -> Option<Vec<String>> {
        if let Some(position) = stack.iter().position(|k| *k == key) {
            let mut chain: Vec<String> = stack[position..].iter().map(|k| k.to_string()).collect();
            chain.push(key.to_string());
            return Some(chain);
        }
        if done.contains(key) {
            return None;
        }

        stack.push(key);
        if let Some(deps) = self.direct.get(key) {
            for dep in deps {
                if let Some(chain) = self.cycle_from(dep, stack, done) {
                    return Some(chain);
                }
            }
        }
        stack.pop();
        done.insert(key);
        None
    }
}
