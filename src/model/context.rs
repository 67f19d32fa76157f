// src/model/context.rs
//! Execution context and call filters shared by a calculation request.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::model::filter::FilterValue;
use crate::model::types::{DateRange, TimeIntelligence};

/// Context field name for the country scope.
pub const COUNTRY_FIELD: &str = "countryId";
/// Context field name for the sku scope.
pub const SKU_FIELD: &str = "skuId";

/// Immutable per-call execution context.
///
/// A context is never mutated in place: components derive extended copies
/// via [`ExecutionContext::with_date_range`] and
/// [`ExecutionContext::for_month`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExecutionContext {
    pub country_id: Option<String>,
    pub sku_id: Option<String>,
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub date: Option<NaiveDate>,
    pub date_range: Option<DateRange>,
    pub time_intelligence: Option<TimeIntelligence>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scope the context to a country.
    pub fn with_country(mut self, country_id: impl Into<String>) -> Self {
        self.country_id = Some(country_id.into());
        self
    }

    /// Scope the context to a sku.
    pub fn with_sku(mut self, sku_id: impl Into<String>) -> Self {
        self.sku_id = Some(sku_id.into());
        self
    }

    /// Point the context at a calendar month.
    pub fn with_month(mut self, year: i32, month: u32) -> Self {
        self.year = Some(year);
        self.month = Some(month);
        self
    }

    /// Point the context at an exact date.
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    /// The date the context's time windows anchor on: the explicit date if
    /// set, else the first day of the (year, month) pair.
    pub fn reference_date(&self) -> Option<NaiveDate> {
        if let Some(date) = self.date {
            return Some(date);
        }
        match (self.year, self.month) {
            (Some(year), Some(month)) => NaiveDate::from_ymd_opt(year, month, 1),
            _ => None,
        }
    }

    /// The (year, month) pair time walks anchor on.
    pub fn reference_month(&self) -> Option<(i32, u32)> {
        self.reference_date().map(|d| (d.year(), d.month()))
    }

    /// A derived copy carrying a resolved date range.
    pub fn with_date_range(&self, range: DateRange) -> Self {
        Self {
            date_range: Some(range),
            ..self.clone()
        }
    }

    /// A derived copy pointed at another month, with any exact date or
    /// resolved range cleared so the new month governs range derivation.
    pub fn for_month(&self, year: i32, month: u32) -> Self {
        Self {
            year: Some(year),
            month: Some(month),
            date: None,
            date_range: None,
            time_intelligence: None,
            ..self.clone()
        }
    }

    /// The identity fields merged into table queries.
    ///
    /// Date fields (year/month/date) never travel through here; they are
    /// used only to derive a date range.
    pub fn table_scope(&self) -> Vec<(String, FilterValue)> {
        let mut scope = Vec::new();
        if let Some(country) = &self.country_id {
            scope.push((COUNTRY_FIELD.to_string(), FilterValue::from(country.clone())));
        }
        if let Some(sku) = &self.sku_id {
            scope.push((SKU_FIELD.to_string(), FilterValue::from(sku.clone())));
        }
        scope
    }
}

/// Free-form key/value filters merged into every table query of a call.
///
/// Backed by an ordered map so serialized forms (and cache keys derived
/// from them) are deterministic.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionFilters(pub BTreeMap<String, FilterValue>);

impl ExecutionFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&FilterValue> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FilterValue)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}
