//! Months-of-stock-cover projection.
//!
//! Given a closing stock quantity and the projected issuance of the coming
//! months, computes how many months the stock sustains. The async month
//! walk lives on the engine; the projection itself is a pure function so
//! the arithmetic is testable without a table source.

/// Project months of cover from a closing stock and the positive issuance
/// values of the upcoming months, in chronological order.
///
/// - non-positive (or NaN) stock covers nothing;
/// - with no valid months at all the projection falls back to
///   `default_months`;
/// - a stock that does not cover even the first month yields the fraction
///   `stock / first month`;
/// - otherwise the cover is the count of fully covered months plus the
///   fraction of the next month the remainder sustains, capped at one
///   month; when the walk ran out of months the fraction is extrapolated
///   from the average issuance.
///
/// The result is rounded to 2 decimals.
pub(crate) fn project_cover(closing_stock: f64, issuance: &[f64], default_months: f64) -> f64 {
    if !(closing_stock > 0.0) {
        return 0.0;
    }
    if issuance.is_empty() {
        return default_months;
    }

    // Index of the last month whose cumulative issuance the stock covers.
    let mut cumulative = 0.0;
    let mut last_full: Option<(usize, f64)> = None;
    for (index, month) in issuance.iter().enumerate() {
        cumulative += month;
        if cumulative <= closing_stock {
            last_full = Some((index, cumulative));
        } else {
            break;
        }
    }

    let Some((index, through_full)) = last_full else {
        // Stock does not cover even the first month.
        return round2(closing_stock / issuance[0]);
    };

    let full_months = (index + 1) as f64;
    let remainder = closing_stock - through_full;

    let fraction = match issuance.get(index + 1) {
        Some(next) => (remainder / next).min(1.0),
        None => {
            // Ran out of known months; extrapolate from the average.
            let average = issuance.iter().sum::<f64>() / issuance.len() as f64;
            if average > 0.0 {
                (remainder / average).min(1.0)
            } else {
                0.0
            }
        }
    };

    round2(full_months + fraction)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
