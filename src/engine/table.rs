//! Table component execution: query narrowing, fetch, and aggregation.

use std::collections::HashSet;

use crate::config::EngineSettings;
use crate::error::{EngineError, EngineResult};
use crate::filter::FilterEvaluator;
use crate::model::context::{ExecutionContext, ExecutionFilters, SKU_FIELD};
use crate::model::measure::MeasureComponent;
use crate::model::types::{Aggregation, DateRange};
use crate::source::{CodeLookup, Record, TableSource};
use crate::time;

/// Execute one table-sourced component: fetch the narrowed record set,
/// apply the component's filter logic, aggregate the declared field.
pub(crate) async fn execute(
    source: &dyn TableSource,
    codes: &dyn CodeLookup,
    settings: &EngineSettings,
    component: &MeasureComponent,
    table_key: &str,
    field_name: &str,
    filters: &ExecutionFilters,
    context: &ExecutionContext,
) -> EngineResult<f64> {
    let range = effective_range(settings, table_key, context);
    let records = fetch(source, settings, table_key, filters, context, range).await?;

    // The source already restricted by range; re-check record-by-record as
    // a safety net for sources that ignore the range parameter.
    let evaluator = FilterEvaluator::new(settings, codes);
    let matching: Vec<&Record> = records
        .iter()
        .filter(|record| match range {
            Some(range) => record
                .date(&settings.date_field)
                .map(|d| range.contains(d))
                .unwrap_or(true),
            None => true,
        })
        .filter(|record| match &component.filters {
            Some(logic) => evaluator.matches(logic, record),
            None => true,
        })
        .collect();

    Ok(aggregate(&matching, field_name, component.aggregation.unwrap_or_default()))
}

/// The date range a table query runs under: an already-derived range wins;
/// date-less tables never get one; otherwise the context's target month.
pub(crate) fn effective_range(
    settings: &EngineSettings,
    table_key: &str,
    context: &ExecutionContext,
) -> Option<DateRange> {
    if let Some(range) = context.date_range {
        return Some(range);
    }
    if settings.dateless_tables.contains(table_key) {
        return None;
    }
    context
        .reference_month()
        .map(|(year, month)| time::month_range(year, month))
}

/// Fetch records with the merged query filter: call filters plus the
/// context's identity fields. Country-only tables drop the sku field.
pub(crate) async fn fetch(
    source: &dyn TableSource,
    settings: &EngineSettings,
    table_key: &str,
    filters: &ExecutionFilters,
    context: &ExecutionContext,
    range: Option<DateRange>,
) -> EngineResult<Vec<Record>> {
    let mut merged = filters.clone();
    let country_only = settings.country_only_tables.contains(table_key);
    for (key, value) in context.table_scope() {
        if country_only && key == SKU_FIELD {
            continue;
        }
        merged.0.insert(key, value);
    }

    source
        .fetch(table_key, &merged, range.as_ref())
        .await
        .map_err(|err| EngineError::TableFetch {
            table: table_key.to_string(),
            message: err.to_string(),
        })
}

/// Collapse the matching records into one number.
pub(crate) fn aggregate(records: &[&Record], field: &str, aggregation: Aggregation) -> f64 {
    match aggregation {
        Aggregation::Sum => records.iter().filter_map(|r| r.number(field)).sum(),
        Aggregation::Count => records
            .iter()
            .filter(|r| r.get(field).map(|v| !v.is_null()).unwrap_or(false))
            .count() as f64,
        Aggregation::CountDistinct => {
            let distinct: HashSet<String> = records
                .iter()
                .filter_map(|r| r.get(field))
                .filter(|v| !v.is_null())
                .map(|v| v.to_string())
                .collect();
            distinct.len() as f64
        }
        Aggregation::Average => {
            let values: Vec<f64> = records.iter().filter_map(|r| r.number(field)).collect();
            if values.is_empty() {
                0.0
            } else {
                values.iter().sum::<f64>() / values.len() as f64
            }
        }
        Aggregation::Min => records
            .iter()
            .filter_map(|r| r.number(field))
            .reduce(f64::min)
            .unwrap_or(0.0),
        Aggregation::Max => records
            .iter()
            .filter_map(|r| r.number(field))
            .reduce(f64::max)
            .unwrap_or(0.0),
    }
}
