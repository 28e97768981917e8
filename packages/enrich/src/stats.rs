//! Rate, percentile and interval arithmetic.
//!
//! All rates are annual incidents per 1,000 residents. A count observed
//! over `period_weeks` is annualized by `52 / period_weeks` before being
//! divided by population.

use safety_map_aggregate_models::DateRange;
use safety_map_enrich_models::ConfidenceInterval;

/// Weeks in a year, for annualizing period counts.
pub const WEEKS_PER_YEAR: f64 = 52.0;

/// z-score of a two-sided 95% interval.
pub const Z_95: f64 = 1.96;

/// Length of `range` in weeks, floored at one week. Falls back to
/// `default_weeks` when no range is known or the default is not positive.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn period_weeks(range: Option<DateRange>, default_weeks: f64) -> f64 {
    match range {
        Some(range) => (range.days_inclusive() as f64 / 7.0).max(1.0),
        None if default_weeks.is_finite() && default_weeks > 0.0 => default_weeks,
        None => 1.0,
    }
}

/// Scales a period count to a yearly count.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn annualize(count: u64, period_weeks: f64) -> f64 {
    count as f64 * (WEEKS_PER_YEAR / period_weeks)
}

/// Annual incidents per 1,000 residents. `None` without a positive
/// population.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn per_capita_rate(count: u64, period_weeks: f64, population: Option<u64>) -> Option<f64> {
    let population = population.filter(|&p| p > 0)? as f64;
    Some(annualize(count, period_weeks) / population * 1000.0)
}

/// Annual incidents per square mile. `None` without a positive area.
#[must_use]
pub fn per_area_rate(count: u64, period_weeks: f64, area_sq_mi: Option<f64>) -> Option<f64> {
    let area = area_sq_mi.filter(|a| a.is_finite() && *a > 0.0)?;
    Some(annualize(count, period_weeks) / area)
}

/// Percentage of `values` strictly below `value`, rounded.
///
/// The smallest value always ranks `0`. An empty set ranks `0`.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn percentile_rank(value: f64, values: &[f64]) -> u8 {
    if values.is_empty() {
        return 0;
    }
    let below = values.iter().filter(|&&v| v < value).count();
    (100.0 * below as f64 / values.len() as f64).round() as u8
}

/// Arithmetic mean, `None` for an empty slice.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// `value / average`, `None` when the average is zero or unknown.
#[must_use]
pub fn ratio_to_average(value: f64, average: Option<f64>) -> Option<f64> {
    average.filter(|&avg| avg > 0.0).map(|avg| value / avg)
}

/// 95% normal-approximation interval on a Poisson period count,
/// converted to an annual per-capita rate.
///
/// `None` when the population is unknown or nothing was counted.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn poisson_interval(
    count: u64,
    period_weeks: f64,
    population: Option<u64>,
) -> Option<ConfidenceInterval> {
    let population = population.filter(|&p| p > 0)? as f64;
    if count == 0 {
        return None;
    }

    let mean = annualize(count, period_weeks);
    let margin = Z_95 * mean.sqrt();
    let to_rate = |annual: f64| annual / population * 1000.0;

    Some(ConfidenceInterval {
        lower: to_rate((mean - margin).max(0.0)),
        upper: to_rate(mean + margin),
    })
}

/// Rounds to two decimals.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
