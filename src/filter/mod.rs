//! Per-record filter evaluation.
//!
//! Evaluates a component's [`FilterLogic`] against fetched records. Two
//! fields get special treatment, named by [`EngineSettings`]:
//!
//! - the categorical text field compares trimmed and case-insensitively;
//! - the document-type field is *always* compared numerically — text
//!   operands are translated through the [`CodeLookup`], and a side that
//!   cannot resolve to a code makes the condition false rather than
//!   silently matching.

use serde_json::Value;

use crate::config::EngineSettings;
use crate::model::filter::{FilterCondition, FilterLogic, FilterMode, FilterOperator, FilterValue};
use crate::source::{CodeLookup, Record};

/// Evaluates filter logic against records.
pub struct FilterEvaluator<'a> {
    settings: &'a EngineSettings,
    codes: &'a dyn CodeLookup,
}

impl<'a> FilterEvaluator<'a> {
    pub fn new(settings: &'a EngineSettings, codes: &'a dyn CodeLookup) -> Self {
        Self { settings, codes }
    }

    /// Does the record satisfy the whole filter group?
    ///
    /// An empty condition list matches everything.
    pub fn matches(&self, logic: &FilterLogic, record: &Record) -> bool {
        if logic.conditions.is_empty() {
            return true;
        }
        match logic.logic {
            FilterMode::And => logic
                .conditions
                .iter()
                .all(|c| self.matches_condition(c, record)),
            FilterMode::Or => logic
                .conditions
                .iter()
                .any(|c| self.matches_condition(c, record)),
        }
    }

    /// Does the record satisfy one condition?
    pub fn matches_condition(&self, condition: &FilterCondition, record: &Record) -> bool {
        if condition.column == self.settings.document_type_field {
            return self.document_type_matches(condition, record);
        }

        let value = record.get(&condition.column);
        let categorical = condition.column == self.settings.categorical_field;

        match condition.operator {
            FilterOperator::IsNull => value.map(Value::is_null).unwrap_or(true),
            FilterOperator::IsNotNull => value.map(|v| !v.is_null()).unwrap_or(false),
            FilterOperator::Eq => self.equals_single(value, condition, categorical),
            FilterOperator::Ne => !self.equals_single(value, condition, categorical),
            FilterOperator::Gt => compare_numeric(value, condition, |a, b| a > b),
            FilterOperator::Ge => compare_numeric(value, condition, |a, b| a >= b),
            FilterOperator::Lt => compare_numeric(value, condition, |a, b| a < b),
            FilterOperator::Le => compare_numeric(value, condition, |a, b| a <= b),
            FilterOperator::Contains => text_op(value, condition, |v, op| v.contains(op)),
            FilterOperator::StartsWith => text_op(value, condition, |v, op| v.starts_with(op)),
            FilterOperator::EndsWith => text_op(value, condition, |v, op| v.ends_with(op)),
            FilterOperator::In => condition
                .operands()
                .iter()
                .any(|op| equals(value, op, categorical)),
            FilterOperator::NotIn => !condition
                .operands()
                .iter()
                .any(|op| equals(value, op, categorical)),
        }
    }

    fn equals_single(
        &self,
        value: Option<&Value>,
        condition: &FilterCondition,
        categorical: bool,
    ) -> bool {
        condition
            .value
            .as_ref()
            .map(|op| equals(value, op, categorical))
            .unwrap_or(false)
    }

    /// Document-type conditions: both sides must resolve to numeric codes.
    fn document_type_matches(&self, condition: &FilterCondition, record: &Record) -> bool {
        let Some(actual) = record
            .get(&condition.column)
            .and_then(|v| self.resolve_code(v))
        else {
            return false;
        };

        let mut wanted = Vec::with_capacity(condition.operands().len());
        for operand in condition.operands() {
            match self.resolve_operand_code(operand) {
                Some(code) => wanted.push(code),
                // An unresolvable operand never silently matches.
                None => return false,
            }
        }

        match condition.operator {
            FilterOperator::Eq => wanted.first().map(|w| actual == *w).unwrap_or(false),
            FilterOperator::Ne => wanted.first().map(|w| actual != *w).unwrap_or(false),
            FilterOperator::Gt => wanted.first().map(|w| actual > *w).unwrap_or(false),
            FilterOperator::Ge => wanted.first().map(|w| actual >= *w).unwrap_or(false),
            FilterOperator::Lt => wanted.first().map(|w| actual < *w).unwrap_or(false),
            FilterOperator::Le => wanted.first().map(|w| actual <= *w).unwrap_or(false),
            FilterOperator::In => wanted.contains(&actual),
            FilterOperator::NotIn => !wanted.is_empty() && !wanted.contains(&actual),
            // No numeric semantics for text/null operators on this field.
            _ => false,
        }
    }

    fn resolve_code(&self, value: &Value) -> Option<i64> {
        match value {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => self.codes.name_to_code(s.trim()),
            _ => None,
        }
    }

    fn resolve_operand_code(&self, operand: &FilterValue) -> Option<i64> {
        match operand {
            FilterValue::Number(n) => Some(*n as i64),
            FilterValue::Text(s) => self.codes.name_to_code(s.trim()),
            FilterValue::Flag(_) => None,
        }
    }
}

/// Equality with numeric coercion; text falls back to case-insensitive
/// comparison, trimmed as well for the categorical field.
fn equals(value: Option<&Value>, operand: &FilterValue, categorical: bool) -> bool {
    let Some(value) = value else {
        return false;
    };
    if let (Some(a), Some(b)) = (value_number(value), operand.as_number()) {
        return a == b;
    }
    if let (Some(a), Some(b)) = (value.as_str(), operand.as_text()) {
        return if categorical {
            a.trim().eq_ignore_ascii_case(b.trim())
        } else {
            a.eq_ignore_ascii_case(b)
        };
    }
    if let (Some(a), FilterValue::Flag(b)) = (value.as_bool(), operand) {
        return a == *b;
    }
    false
}

fn compare_numeric(
    value: Option<&Value>,
    condition: &FilterCondition,
    cmp: impl Fn(f64, f64) -> bool,
) -> bool {
    let (Some(value), Some(operand)) = (value, condition.value.as_ref()) else {
        return false;
    };
    match (value_number(value), operand.as_number()) {
        (Some(a), Some(b)) => cmp(a, b),
        _ => false,
    }
}

fn text_op(
    value: Option<&Value>,
    condition: &FilterCondition,
    op: impl Fn(&str, &str) -> bool,
) -> bool {
    let (Some(value), Some(operand)) = (
        value.and_then(Value::as_str),
        condition.value.as_ref().and_then(FilterValue::as_text),
    ) else {
        return false;
    };
    op(&value.to_lowercase(), &operand.to_lowercase())
}

/// Numeric view of a record value, coercing numeric text.
fn value_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(*b as i64 as f64),
        _ => None,
    }
}
