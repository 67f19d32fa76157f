//! External data-source traits.
//!
//! The engine consumes the outside world through two narrow interfaces: a
//! [`TableSource`] that returns semantically-named records for a
//! (table, filter, date-range) query, and a [`CodeLookup`] that translates
//! document-type names into their numeric codes for the one filter field
//! that is always compared numerically.

pub mod memory;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::context::ExecutionFilters;
use crate::model::types::DateRange;

pub use memory::{FailingTableSource, StaticCodeLookup, StaticTableSource};

/// Result type for source operations.
pub type SourceResult<T> = Result<T, SourceError>;

/// Errors produced by table sources.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("unknown table: '{0}'")]
    UnknownTable(String),

    #[error("{0}")]
    Backend(String),
}

impl SourceError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}

/// One row of an external table, fields pre-normalized to semantic names.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field setter.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Numeric view of a field, coercing numeric text.
    pub fn number(&self, name: &str) -> Option<f64> {
        match self.fields.get(name)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Text view of a field.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name)?.as_str()
    }

    /// Date view of a field. Accepts `YYYY-MM-DD`, ignoring any trailing
    /// time component.
    pub fn date(&self, name: &str) -> Option<NaiveDate> {
        let raw = self.text(name)?;
        let prefix = raw.get(..10).unwrap_or(raw);
        NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
    }
}

/// Async access to external tables.
///
/// Implementations perform the actual I/O (an OData client in production,
/// [`StaticTableSource`] in tests). The engine treats the returned rows as
/// already normalized to semantic field names.
#[async_trait]
pub trait TableSource: Send + Sync {
    /// Fetch all records of `table_key` matching the equality `filter`,
    /// optionally restricted to a half-open date range.
    async fn fetch(
        &self,
        table_key: &str,
        filter: &ExecutionFilters,
        range: Option<&DateRange>,
    ) -> SourceResult<Vec<Record>>;
}

/// Categorical code lookup for the document-type filter field.
pub trait CodeLookup: Send + Sync {
    /// Translate a document-type name into its numeric code.
    fn name_to_code(&self, name: &str) -> Option<i64>;
}
