// src/model/filter.rs
//! Declarative per-record filter conditions attached to measure components.

use serde::{Deserialize, Serialize};

/// How the conditions of a [`FilterLogic`] combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    #[default]
    And,
    Or,
}

/// A group of conditions combined with AND/OR logic.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FilterLogic {
    #[serde(default)]
    pub logic: FilterMode,
    #[serde(default)]
    pub conditions: Vec<FilterCondition>,
}

impl FilterLogic {
    /// All of the given conditions must match.
    pub fn all(conditions: Vec<FilterCondition>) -> Self {
        Self {
            logic: FilterMode::And,
            conditions,
        }
    }

    /// Any of the given conditions may match.
    pub fn any(conditions: Vec<FilterCondition>) -> Self {
        Self {
            logic: FilterMode::Or,
            conditions,
        }
    }
}

/// Comparison operators for filter conditions.
///
/// Unrecognized wire names coerce to `Eq`; the runtime enum is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum FilterOperator {
    #[default]
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Contains,
    StartsWith,
    EndsWith,
    In,
    NotIn,
    IsNull,
    IsNotNull,
}

impl From<String> for FilterOperator {
    fn from(name: String) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "ne" | "neq" | "notequals" => FilterOperator::Ne,
            "gt" => FilterOperator::Gt,
            "ge" | "gte" => FilterOperator::Ge,
            "lt" => FilterOperator::Lt,
            "le" | "lte" => FilterOperator::Le,
            "contains" => FilterOperator::Contains,
            "startswith" => FilterOperator::StartsWith,
            "endswith" => FilterOperator::EndsWith,
            "in" => FilterOperator::In,
            "notin" => FilterOperator::NotIn,
            "isnull" => FilterOperator::IsNull,
            "isnotnull" => FilterOperator::IsNotNull,
            // "eq" and anything unrecognized
            _ => FilterOperator::Eq,
        }
    }
}

/// A literal operand in a filter condition or execution filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Flag(bool),
    Number(f64),
    Text(String),
}

impl FilterValue {
    /// Numeric view of the operand, coercing numeric text.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FilterValue::Number(n) => Some(*n),
            FilterValue::Text(s) => s.trim().parse().ok(),
            FilterValue::Flag(b) => Some(*b as i64 as f64),
        }
    }

    /// Text view of the operand.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FilterValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Text(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Text(value)
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        FilterValue::Number(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Number(value as f64)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Flag(value)
    }
}

/// One predicate over one record field.
///
/// `In`/`NotIn` read their operands from `values`; every other operator
/// reads `value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCondition {
    pub column: String,
    #[serde(default)]
    pub operator: FilterOperator,
    #[serde(default)]
    pub value: Option<FilterValue>,
    #[serde(default)]
    pub values: Option<Vec<FilterValue>>,
}

impl FilterCondition {
    /// A condition with a single operand.
    pub fn new(
        column: impl Into<String>,
        operator: FilterOperator,
        value: impl Into<FilterValue>,
    ) -> Self {
        Self {
            column: column.into(),
            operator,
            value: Some(value.into()),
            values: None,
        }
    }

    /// An `In`/`NotIn` condition over a list of operands.
    pub fn within(
        column: impl Into<String>,
        operator: FilterOperator,
        values: Vec<FilterValue>,
    ) -> Self {
        Self {
            column: column.into(),
            operator,
            value: None,
            values: Some(values),
        }
    }

    /// An operand-less condition (`IsNull` / `IsNotNull`).
    pub fn bare(column: impl Into<String>, operator: FilterOperator) -> Self {
        Self {
            column: column.into(),
            operator,
            value: None,
            values: None,
        }
    }

    /// The operand list: `values` when present, else the single `value`.
    pub fn operands(&self) -> Vec<&FilterValue> {
        match (&self.values, &self.value) {
            (Some(list), _) => list.iter().collect(),
            (None, Some(single)) => vec![single],
            (None, None) => vec![],
        }
    }
}
