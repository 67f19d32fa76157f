//! In-memory source implementations for tests and examples.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::model::context::ExecutionFilters;
use crate::model::filter::FilterValue;
use crate::model::types::DateRange;

use super::{CodeLookup, Record, SourceError, SourceResult, TableSource};

/// A [`TableSource`] backed by static record vectors.
///
/// Applies the equality filter and date range the way a real backend
/// would, so engine tests exercise the same narrowing the production
/// source performs.
#[derive(Debug)]
pub struct StaticTableSource {
    tables: HashMap<String, Vec<Record>>,
    date_field: String,
}

impl Default for StaticTableSource {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticTableSource {
    pub fn new() -> Self {
        Self {
            tables: HashMap::new(),
            date_field: "date".to_string(),
        }
    }

    /// Override the field consulted for date-range narrowing.
    pub fn with_date_field(mut self, field: impl Into<String>) -> Self {
        self.date_field = field.into();
        self
    }

    /// Register a table's records.
    pub fn with_table(mut self, table_key: impl Into<String>, records: Vec<Record>) -> Self {
        self.tables.insert(table_key.into(), records);
        self
    }

    fn filter_matches(record: &Record, filter: &ExecutionFilters) -> bool {
        filter.iter().all(|(key, wanted)| match record.get(key) {
            Some(actual) => match wanted {
                FilterValue::Text(text) => actual.as_str() == Some(text.as_str()),
                FilterValue::Number(number) => {
                    actual.as_f64().map(|n| n == *number).unwrap_or(false)
                }
                FilterValue::Flag(flag) => actual.as_bool() == Some(*flag),
            },
            None => false,
        })
    }
}

#[async_trait]
impl TableSource for StaticTableSource {
    async fn fetch(
        &self,
        table_key: &str,
        filter: &ExecutionFilters,
        range: Option<&DateRange>,
    ) -> SourceResult<Vec<Record>> {
        let records = self
            .tables
            .get(table_key)
            .ok_or_else(|| SourceError::UnknownTable(table_key.to_string()))?;

        Ok(records
            .iter()
            .filter(|r| Self::filter_matches(r, filter))
            .filter(|r| match range {
                Some(range) => r
                    .date(&self.date_field)
                    .map(|d| range.contains(d))
                    .unwrap_or(true),
                None => true,
            })
            .cloned()
            .collect())
    }
}

/// A [`TableSource`] that fails every fetch; for failure-isolation tests.
#[derive(Debug, Default)]
pub struct FailingTableSource;

#[async_trait]
impl TableSource for FailingTableSource {
    async fn fetch(
        &self,
        table_key: &str,
        _filter: &ExecutionFilters,
        _range: Option<&DateRange>,
    ) -> SourceResult<Vec<Record>> {
        Err(SourceError::backend(format!(
            "fetch of '{table_key}' refused"
        )))
    }
}

/// A [`CodeLookup`] backed by a static name-to-code map.
///
/// Lookups trim and lowercase the name, matching how document-type names
/// arrive from user-authored filter definitions.
#[derive(Debug, Default)]
pub struct StaticCodeLookup {
    codes: HashMap<String, i64>,
}

impl StaticCodeLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_code(mut self, name: impl Into<String>, code: i64) -> Self {
        self.codes.insert(name.into().trim().to_lowercase(), code);
        self
    }
}

impl CodeLookup for StaticCodeLookup {
    fn name_to_code(&self, name: &str) -> Option<i64> {
        self.codes.get(&name.trim().to_lowercase()).copied()
    }
}
