//! Calculation engine: executes single measures.
//!
//! One engine instance owns the registry handle, the external source
//! handles, and the dependency-value cache. Execution of a measure:
//!
//! 1. consult the cache;
//! 2. guard against re-entry via the visited chain (copied, never shared,
//!    into every recursive call);
//! 3. dispatch on [`CalculationKind`]: stock-cover projection, date
//!    lookup, or generic component composition;
//! 4. cache and return the value.
//!
//! Batch scheduling lives in [`orchestrator`]; the engine only ever runs
//! one measure (and its recursive dependencies) per call.

pub mod cache;
pub mod months_cover;
pub mod orchestrator;
mod table;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use futures::future::{join_all, BoxFuture};

use crate::config::EngineSettings;
use crate::error::{EngineError, EngineResult};
use crate::filter::FilterEvaluator;
use crate::model::context::{ExecutionContext, ExecutionFilters, COUNTRY_FIELD, SKU_FIELD};
use crate::model::measure::{
    CalculationKind, ComponentSource, CompositionStrategy, Measure, MeasureComponent,
};
use crate::model::types::Operation;
use crate::registry::MeasureRegistry;
use crate::source::{CodeLookup, Record, TableSource};
use crate::time;

pub use cache::ValueCache;
pub use orchestrator::{CalculationOrchestrator, ExecutionPlan};

/// Ordered set of measure keys on the current recursion path.
///
/// Passed by value into every recursive engine call: sibling branches
/// sharing an ancestor each get their own copy, so they never falsely
/// collide. Re-entry of a key on the chain is a circular dependency.
#[derive(Debug, Clone, Default)]
pub struct VisitChain {
    keys: Vec<String>,
}

impl VisitChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }

    /// A new chain with `key` appended; the receiver is untouched.
    pub fn extended(&self, key: &str) -> Self {
        let mut keys = self.keys.clone();
        keys.push(key.to_string());
        Self { keys }
    }

    /// The full chain ending on the re-entered key, for error reporting.
    fn cycle_through(&self, key: &str) -> Vec<String> {
        let mut chain = self.keys.clone();
        chain.push(key.to_string());
        chain
    }
}

/// Executes measures against an external table source.
pub struct CalculationEngine<P: TableSource> {
    registry: Arc<MeasureRegistry>,
    source: Arc<P>,
    codes: Arc<dyn CodeLookup>,
    settings: EngineSettings,
    cache: ValueCache,
}

impl<P: TableSource> CalculationEngine<P> {
    pub fn new(registry: Arc<MeasureRegistry>, source: Arc<P>, codes: Arc<dyn CodeLookup>) -> Self {
        Self {
            registry,
            source,
            codes,
            settings: EngineSettings::default(),
            cache: ValueCache::new(),
        }
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn registry(&self) -> &MeasureRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Drop every cached value.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Number of cached values (diagnostic).
    pub fn cached_values(&self) -> usize {
        self.cache.len()
    }

    /// Execute one measure for a (filters, context) pair.
    pub async fn execute(
        &self,
        key: &str,
        filters: &ExecutionFilters,
        context: &ExecutionContext,
    ) -> EngineResult<f64> {
        self.execute_chained(key, filters, context, VisitChain::new())
            .await
    }

    /// Recursive entry point. Boxed because measure-sourced components
    /// re-enter the engine.
    pub(crate) fn execute_chained<'a>(
        &'a self,
        key: &'a str,
        filters: &'a ExecutionFilters,
        context: &'a ExecutionContext,
        chain: VisitChain,
    ) -> BoxFuture<'a, EngineResult<f64>> {
        Box::pin(async move {
            let cache_key = cache::content_key(key, filters, context);
            if let Some(cache_key) = &cache_key {
                if let Some(hit) = self.cache.get(cache_key) {
                    return Ok(hit);
                }
            }

            if chain.contains(key) {
                return Err(EngineError::CircularDependency {
                    chain: chain.cycle_through(key),
                });
            }
            let chain = chain.extended(key);

            let measure = self
                .registry
                .get(key)
                .ok_or_else(|| EngineError::not_found(key))?;

            let value = match &measure.calculation {
                CalculationKind::Composition => {
                    self.compose(measure, filters, context, &chain).await?
                }
                CalculationKind::StockCover {
                    stock_measure,
                    issues_measure,
                } => {
                    self.stock_cover(stock_measure, issues_measure, filters, context, &chain)
                        .await?
                }
                CalculationKind::DateLookup {
                    table_key,
                    date_field,
                    quantity_field,
                } => {
                    self.date_lookup(table_key, date_field, quantity_field, filters, context)
                        .await?
                }
            };

            if let Some(cache_key) = cache_key {
                self.cache.insert(cache_key, value);
            }
            Ok(value)
        })
    }

    /// Generic component composition.
    async fn compose(
        &self,
        measure: &Measure,
        filters: &ExecutionFilters,
        context: &ExecutionContext,
        chain: &VisitChain,
    ) -> EngineResult<f64> {
        // A declared time window scopes every component of the measure.
        // The measure's own declaration wins over one carried by the call.
        let scoped;
        let context = match measure
            .time_intelligence
            .as_ref()
            .or(context.time_intelligence.as_ref())
        {
            Some(spec) => {
                scoped = context.with_date_range(time::resolve(spec, context)?);
                &scoped
            }
            None => context,
        };

        // Eagerly resolve direct measure-sourced dependencies in parallel.
        // Components with their own time window resolve lazily under the
        // narrowed context instead. Failures are stored and surfaced only
        // when a component consumes the dependency, so this pass stays a
        // pure optimization.
        let eager: BTreeSet<&str> = measure
            .components
            .iter()
            .filter(|c| c.time_intelligence.is_none())
            .filter_map(|c| match &c.source {
                ComponentSource::Measure { measure_key } => Some(measure_key.as_str()),
                _ => None,
            })
            .collect();

        let lookups = eager.iter().copied().map(|dep| {
            let chain = chain.clone();
            async move {
                (
                    dep.to_string(),
                    self.execute_chained(dep, filters, context, chain).await,
                )
            }
        });
        let resolved: HashMap<String, EngineResult<f64>> =
            join_all(lookups).await.into_iter().collect();

        // Fold the components in declaration order; the first seeds the
        // running result.
        let mut result = 0.0;
        for (index, component) in measure.ordered_components().into_iter().enumerate() {
            let value = self
                .component_value(measure, component, filters, context, &resolved, chain)
                .await?;
            result = if index == 0 {
                value
            } else {
                self.combine(
                    measure,
                    index,
                    result,
                    component.operation,
                    value,
                    filters,
                    context,
                    chain,
                )
                .await?
            };
        }
        Ok(result)
    }

    /// Resolve one component's value under its (possibly narrowed) context.
    async fn component_value(
        &self,
        measure: &Measure,
        component: &MeasureComponent,
        filters: &ExecutionFilters,
        context: &ExecutionContext,
        resolved: &HashMap<String, EngineResult<f64>>,
        chain: &VisitChain,
    ) -> EngineResult<f64> {
        let scoped;
        let context = match &component.time_intelligence {
            Some(spec) => {
                scoped = context.with_date_range(time::resolve(spec, context)?);
                &scoped
            }
            None => context,
        };
        self.resolve_source(
            measure,
            component,
            &component.source,
            filters,
            context,
            resolved,
            chain,
            false,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    fn resolve_source<'a>(
        &'a self,
        measure: &'a Measure,
        component: &'a MeasureComponent,
        source: &'a ComponentSource,
        filters: &'a ExecutionFilters,
        context: &'a ExecutionContext,
        resolved: &'a HashMap<String, EngineResult<f64>>,
        chain: &'a VisitChain,
        nested: bool,
    ) -> BoxFuture<'a, EngineResult<f64>> {
        Box::pin(async move {
            match source {
                ComponentSource::Table {
                    table_key,
                    field_name,
                } => {
                    table::execute(
                        self.source.as_ref(),
                        self.codes.as_ref(),
                        &self.settings,
                        component,
                        table_key,
                        field_name,
                        filters,
                        context,
                    )
                    .await
                }
                ComponentSource::Measure { measure_key } => {
                    if component.time_intelligence.is_none() {
                        if let Some(outcome) = resolved.get(measure_key) {
                            return outcome.clone();
                        }
                    }
                    self.execute_chained(measure_key, filters, context, chain.clone())
                        .await
                }
                ComponentSource::Conditional {
                    conditions,
                    primary,
                    fallback,
                } => {
                    if nested {
                        return Err(EngineError::invalid_source(
                            &measure.key,
                            "conditional sources may not nest",
                        ));
                    }
                    let evaluator = FilterEvaluator::new(&self.settings, self.codes.as_ref());
                    let branch = if evaluator.matches(conditions, &context_record(context)) {
                        primary
                    } else {
                        fallback
                    };
                    self.resolve_source(
                        measure, component, branch, filters, context, resolved, chain, true,
                    )
                    .await
                }
            }
        })
    }

    /// Combine a component value into the running result.
    #[allow(clippy::too_many_arguments)]
    async fn combine(
        &self,
        measure: &Measure,
        index: usize,
        result: f64,
        operation: Operation,
        value: f64,
        filters: &ExecutionFilters,
        context: &ExecutionContext,
        chain: &VisitChain,
    ) -> EngineResult<f64> {
        let combined = match operation {
            Operation::Add => result + value,
            Operation::Subtract => result - value,
            Operation::Multiply => {
                if let CompositionStrategy::MarginSubstitution { margin_measure } =
                    &measure.composition
                {
                    // An empty seed with a live multiplier falls back to
                    // multiplier times the margin measure.
                    if index == 1 && (result == 0.0 || result.is_nan()) && value != 0.0 {
                        let margin = self
                            .execute_chained(margin_measure, filters, context, chain.clone())
                            .await?;
                        return Ok(value * margin);
                    }
                }
                result * value
            }
            Operation::Divide => match &measure.composition {
                CompositionStrategy::Ratio { growth } => {
                    if !value.is_finite() || value == 0.0 {
                        0.0
                    } else if *growth {
                        (result - value) / value
                    } else {
                        result / value
                    }
                }
                _ => {
                    if value.is_finite() && value != 0.0 {
                        result / value
                    } else {
                        0.0
                    }
                }
            },
            Operation::Fallback => {
                if result.is_finite() && result != 0.0 {
                    result
                } else {
                    value
                }
            }
        };
        Ok(combined)
    }

    /// Months-of-stock-cover: resolve the closing stock, then walk the
    /// coming months' issuance. The value cache supplies already-known
    /// months, so the walk does not re-trigger the dependency cascade.
    async fn stock_cover(
        &self,
        stock_measure: &str,
        issues_measure: &str,
        filters: &ExecutionFilters,
        context: &ExecutionContext,
        chain: &VisitChain,
    ) -> EngineResult<f64> {
        let stock = self
            .execute_chained(stock_measure, filters, context, chain.clone())
            .await?;
        if !(stock > 0.0) {
            return Ok(0.0);
        }

        let (year, month) = context.reference_month().ok_or_else(|| {
            EngineError::MissingContext(
                "months-cover projection needs a year/month anchor".to_string(),
            )
        })?;
        let anchor = time::month_start(year, month);

        let mut issuance = Vec::new();
        for step in 1..=self.settings.projection_horizon_months {
            let future = time::shift_month(anchor, step as i32);
            let month_context = context.for_month(future.year(), future.month());
            let value = self
                .execute_chained(issues_measure, filters, &month_context, chain.clone())
                .await?;
            // Months with non-positive issuance are discarded.
            if value > 0.0 {
                issuance.push(value);
            }
        }

        Ok(months_cover::project_cover(
            stock,
            &issuance,
            self.settings.default_cover_months,
        ))
    }

    /// Latest raw event with a non-zero quantity, encoded YYYYMMDD; NaN
    /// when no event qualifies.
    async fn date_lookup(
        &self,
        table_key: &str,
        date_field: &str,
        quantity_field: &str,
        filters: &ExecutionFilters,
        context: &ExecutionContext,
    ) -> EngineResult<f64> {
        // Event history is scanned in full; no derived month range.
        let records = table::fetch(
            self.source.as_ref(),
            &self.settings,
            table_key,
            filters,
            context,
            None,
        )
        .await?;

        let mut dated: Vec<(NaiveDate, f64)> = records
            .iter()
            .filter_map(|record| {
                let date = record.date(date_field)?;
                Some((date, record.number(quantity_field).unwrap_or(0.0)))
            })
            .collect();
        // The source is append-only; order by date, newest first.
        dated.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(dated
            .into_iter()
            .find(|(_, quantity)| *quantity != 0.0)
            .map(|(date, _)| encode_date(date))
            .unwrap_or(f64::NAN))
    }
}

/// The execution context viewed as a record, for conditional-source
/// evaluation.
fn context_record(context: &ExecutionContext) -> Record {
    let mut record = Record::new();
    if let Some(country) = &context.country_id {
        record = record.with(COUNTRY_FIELD, country.as_str());
    }
    if let Some(sku) = &context.sku_id {
        record = record.with(SKU_FIELD, sku.as_str());
    }
    if let Some(year) = context.year {
        record = record.with("year", year);
    }
    if let Some(month) = context.month {
        record = record.with("month", month);
    }
    record
}

fn encode_date(date: NaiveDate) -> f64 {
    date.year() as f64 * 10_000.0 + date.month() as f64 * 100.0 + date.day() as f64
}
