//! Batch orchestration: dependency-aware, level-parallel execution.
//!
//! The orchestrator is the only place that fans out concurrent work, and
//! it does so strictly level by level: every measure of a level starts
//! together, and the next level starts only after all of them settle. A
//! measure therefore never starts before its dependencies (all in strictly
//! earlier levels) have values in the cache.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;

use crate::config::EngineSettings;
use crate::error::{EngineError, EngineResult};
use crate::model::context::{ExecutionContext, ExecutionFilters};
use crate::registry::{DependencyGraph, MeasureRegistry};
use crate::source::{CodeLookup, TableSource};

use super::CalculationEngine;

/// Diagnostic view of how a batch would execute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionPlan {
    /// Dependency-respecting execution order.
    pub order: Vec<String>,
    /// Level grouping; measures within a level run concurrently.
    pub levels: Vec<Vec<String>>,
}

/// Validates, schedules, and isolates batch measure execution.
pub struct CalculationOrchestrator<P: TableSource> {
    engine: CalculationEngine<P>,
}

impl<P: TableSource> CalculationOrchestrator<P> {
    pub fn new(registry: Arc<MeasureRegistry>, source: Arc<P>, codes: Arc<dyn CodeLookup>) -> Self {
        Self {
            engine: CalculationEngine::new(registry, source, codes),
        }
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.engine = self.engine.with_settings(settings);
        self
    }

    pub fn engine(&self) -> &CalculationEngine<P> {
        &self.engine
    }

    /// Execute one measure; errors propagate to the caller.
    pub async fn execute_measure(
        &self,
        key: &str,
        filters: &ExecutionFilters,
        context: &ExecutionContext,
    ) -> EngineResult<f64> {
        self.engine.execute(key, filters, context).await
    }

    /// Execute a batch of measures for one (filters, context) pair.
    ///
    /// Every requested key must resolve; otherwise the call fails before
    /// any computation, naming all missing keys. Per-measure failures
    /// during execution are isolated: the failing key maps to NaN and
    /// siblings proceed. The result holds exactly the requested keys —
    /// transitively-computed helper measures are not leaked.
    pub async fn execute_batch<K: AsRef<str>>(
        &self,
        keys: &[K],
        filters: &ExecutionFilters,
        context: &ExecutionContext,
    ) -> EngineResult<HashMap<String, f64>> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }
        self.validate_keys(keys)?;

        // Single-measure batches skip the graph machinery; behavior is
        // identical to the general path: cycles fail the batch, everything
        // else degrades to the NaN sentinel.
        if let [only] = keys {
            let key = only.as_ref();
            let value = match self.engine.execute(key, filters, context).await {
                Ok(value) => value,
                Err(err @ EngineError::CircularDependency { .. }) => return Err(err),
                Err(_) => f64::NAN,
            };
            return Ok(HashMap::from([(key.to_string(), value)]));
        }

        let graph = self.engine.registry().dependency_graph(keys);
        let order = graph.topological_sort()?;
        let levels = graph.group_by_level(&order);

        let mut computed: HashMap<String, f64> = HashMap::with_capacity(order.len());
        for level in &levels {
            let runs = level.iter().map(|key| async move {
                (
                    key.clone(),
                    self.engine.execute(key, filters, context).await,
                )
            });
            for (key, outcome) in join_all(runs).await {
                computed.insert(key, outcome.unwrap_or(f64::NAN));
            }
        }

        Ok(keys
            .iter()
            .map(|key| {
                let key = key.as_ref();
                (
                    key.to_string(),
                    computed.get(key).copied().unwrap_or(f64::NAN),
                )
            })
            .collect())
    }

    /// The transitive dependency graph for a set of requested keys.
    pub fn dependency_graph<K: AsRef<str>>(&self, keys: &[K]) -> EngineResult<DependencyGraph> {
        self.validate_keys(keys)?;
        Ok(self.engine.registry().dependency_graph(keys))
    }

    /// How a batch would be ordered and leveled (diagnostic).
    pub fn execution_plan<K: AsRef<str>>(&self, keys: &[K]) -> EngineResult<ExecutionPlan> {
        let graph = self.dependency_graph(keys)?;
        let order = graph.topological_sort()?;
        let levels = graph.group_by_level(&order);
        Ok(ExecutionPlan { order, levels })
    }

    /// Drop every cached measure value.
    pub fn clear_cache(&self) {
        self.engine.clear_cache();
    }

    /// Requested keys must all resolve; name every miss at once.
    fn validate_keys<K: AsRef<str>>(&self, keys: &[K]) -> EngineResult<()> {
        let missing: Vec<String> = keys
            .iter()
            .map(AsRef::as_ref)
            .filter(|key| !self.engine.registry().contains(key))
            .map(str::to_string)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(EngineError::MeasureNotFound { keys: missing })
        }
    }
}
