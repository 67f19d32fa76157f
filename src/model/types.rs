// src/model/types.rs
//! Shared primitive types for the measure model.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Unit of a measure's value, used for display and composition hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    /// Plain quantity (units of stock, order lines, ...).
    #[default]
    Quantity,
    /// Monetary amount.
    Currency,
    /// Ratio expressed as a fraction (0.25 == 25%).
    Percentage,
    /// Months (stock cover projections).
    Months,
    /// Calendar days (lead times).
    Days,
}

/// Business category a measure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasureCategory {
    Stock,
    Supply,
    Demand,
    Growth,
    Financial,
    #[default]
    General,
}

/// A display threshold attached to a measure (traffic-light bands).
///
/// Thresholds are carried as metadata for consumers; the engine itself
/// never interprets them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub label: String,
    pub value: f64,
}

/// How matching rows of a table component are collapsed into one number.
///
/// Unrecognized wire names coerce to `Sum`; the runtime enum is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Aggregation {
    #[default]
    Sum,
    Count,
    CountDistinct,
    Average,
    Min,
    Max,
}

impl From<String> for Aggregation {
    fn from(name: String) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "count" => Aggregation::Count,
            "countdistinct" | "count_distinct" => Aggregation::CountDistinct,
            "average" | "avg" => Aggregation::Average,
            "min" => Aggregation::Min,
            "max" => Aggregation::Max,
            // "sum" and anything unrecognized
            _ => Aggregation::Sum,
        }
    }
}

/// How a component's value combines with the running composed result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// result + value. Accepts both `add` and `sum` on the wire.
    #[default]
    #[serde(alias = "sum")]
    Add,
    /// result - value.
    Subtract,
    /// result * value.
    Multiply,
    /// result / value; a zero or non-finite divisor yields 0.
    Divide,
    /// Keep the result when it is finite and non-zero, else take the value.
    Fallback,
}

/// Semantic time-window kinds resolved by [`crate::time`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeIntelligenceKind {
    /// The reference month, one year earlier.
    SamePeriodLastYear,
    /// January 1st of the reference year through the end of the reference month.
    Ytd,
    /// Trailing N months ending after the reference date (N defaults to 12).
    Rolling,
    /// N months starting the month after the reference date (N defaults to 12).
    Forward,
    /// The full prior calendar year.
    LastYear,
    /// The full calendar year two years prior.
    PastLastYear,
}

/// A declarative time-window specification.
///
/// `months` only applies to `Rolling` and `Forward`. Explicit `start`/`end`
/// overrides replace the computed boundaries, normalized to first-of-month.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeIntelligence {
    pub kind: TimeIntelligenceKind,
    #[serde(default)]
    pub months: Option<u32>,
    #[serde(default)]
    pub start: Option<NaiveDate>,
    #[serde(default)]
    pub end: Option<NaiveDate>,
}

impl TimeIntelligence {
    /// A window of the given kind with no overrides.
    pub fn of(kind: TimeIntelligenceKind) -> Self {
        Self {
            kind,
            months: None,
            start: None,
            end: None,
        }
    }

    /// A trailing window of `months` months.
    pub fn rolling(months: u32) -> Self {
        Self {
            months: Some(months),
            ..Self::of(TimeIntelligenceKind::Rolling)
        }
    }

    /// A forward window of `months` months.
    pub fn forward(months: u32) -> Self {
        Self {
            months: Some(months),
            ..Self::of(TimeIntelligenceKind::Forward)
        }
    }
}

/// A half-open date range `[start, end)`, normalized to month boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Does the range contain `date`? The end bound is exclusive.
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end
    }
}
