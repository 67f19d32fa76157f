//! Time-intelligence resolution.
//!
//! Converts a semantic time-window declaration into a concrete half-open
//! [`DateRange`], normalized to month boundaries. Resolution is a pure
//! function of the declaration and the execution context.

use chrono::{Datelike, NaiveDate};

use crate::error::{EngineError, EngineResult};
use crate::model::context::ExecutionContext;
use crate::model::types::{DateRange, TimeIntelligence, TimeIntelligenceKind};

/// Default window width for rolling and forward ranges.
pub const DEFAULT_WINDOW_MONTHS: u32 = 12;

/// First day of the given month.
pub fn month_start(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).expect("first of month is a valid date")
}

/// First-of-month `delta` months away from the month containing `date`.
pub fn shift_month(date: NaiveDate, delta: i32) -> NaiveDate {
    let total = date.year() * 12 + date.month() as i32 - 1 + delta;
    let year = total.div_euclid(12);
    let month = total.rem_euclid(12) as u32 + 1;
    month_start(year, month)
}

/// The half-open range covering exactly the given calendar month.
pub fn month_range(year: i32, month: u32) -> DateRange {
    let start = month_start(year, month);
    DateRange::new(start, shift_month(start, 1))
}

/// Resolve a time-window declaration against a context.
///
/// Fails with `MissingContext` when the context carries neither a date nor
/// a (year, month) pair to anchor on.
pub fn resolve(spec: &TimeIntelligence, context: &ExecutionContext) -> EngineResult<DateRange> {
    let reference = context.reference_date().ok_or_else(|| {
        EngineError::MissingContext("time window needs a date or a year/month pair".to_string())
    })?;
    let ref_month = month_start(reference.year(), reference.month());

    let mut range = match spec.kind {
        TimeIntelligenceKind::SamePeriodLastYear => {
            let start = shift_month(ref_month, -12);
            DateRange::new(start, shift_month(start, 1))
        }
        TimeIntelligenceKind::Ytd => DateRange::new(
            month_start(reference.year(), 1),
            shift_month(ref_month, 1),
        ),
        TimeIntelligenceKind::Rolling => {
            let months = spec.months.unwrap_or(DEFAULT_WINDOW_MONTHS);
            let end = shift_month(ref_month, 1);
            DateRange::new(shift_month(end, -(months as i32)), end)
        }
        TimeIntelligenceKind::Forward => {
            let months = spec.months.unwrap_or(DEFAULT_WINDOW_MONTHS);
            let start = shift_month(ref_month, 1);
            DateRange::new(start, shift_month(start, months as i32))
        }
        TimeIntelligenceKind::LastYear => DateRange::new(
            month_start(reference.year() - 1, 1),
            month_start(reference.year(), 1),
        ),
        TimeIntelligenceKind::PastLastYear => DateRange::new(
            month_start(reference.year() - 2, 1),
            month_start(reference.year() - 1, 1),
        ),
    };

    // Explicit overrides win, snapped to first-of-month.
    if let Some(start) = spec.start {
        range.start = month_start(start.year(), start.month());
    }
    if let Some(end) = spec.end {
        range.end = month_start(end.year(), end.month());
    }

    Ok(range)
}
