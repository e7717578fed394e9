//! Year-over-year and quarter-over-quarter growth
//!
//! Percent changes are computed with integer arithmetic and rounded to two
//! decimals half-to-even, so a zero baseline is an exact comparison and the
//! result never depends on float tolerance.

use crate::aggregate::{AggregateKey, Aggregated};
use crate::error::QueryError;
use crate::models::{GrowthKind, GrowthMetric};

/// Growth of every entity in `current` against its baseline period.
///
/// Missing baselines and zero baselines both yield `percent_change = None`;
/// they differ in `baseline_value` (`None` vs `Some(0)`). Entities that only
/// appear in `baseline` produce no metric.
pub fn compute_growth(
    current: &Aggregated,
    baseline: &Aggregated,
    kind: GrowthKind,
) -> Result<Vec<GrowthMetric>, QueryError> {
    let mut metrics = Vec::with_capacity(current.len());

    for (key, &current_value) in current {
        let baseline_period = key
            .period
            .baseline(kind)
            .ok_or(QueryError::GranularityMismatch(key.period.granularity()))?;
        let baseline_value = baseline
            .get(&AggregateKey::new(key.dimension_value.clone(), baseline_period))
            .copied();

        let (percent_change, absolute_change) = match baseline_value {
            Some(base) if base > 0 => (
                Some(percent_change(current_value, base)),
                signed(current_value) - signed(base),
            ),
            _ => (None, signed(current_value)),
        };

        metrics.push(GrowthMetric {
            dimension_value: key.dimension_value.clone(),
            kind,
            current_period: key.period,
            baseline_period,
            current_value,
            baseline_value,
            percent_change,
            absolute_change,
        });
    }

    Ok(metrics)
}

/// `(current - baseline) / baseline * 100`, rounded half-to-even to 2 decimals.
/// `baseline` must be non-zero.
pub fn percent_change(current: u64, baseline: u64) -> f64 {
    let numerator = (i128::from(current) - i128::from(baseline)) * 10_000;
    round_half_even(numerator, i128::from(baseline)) as f64 / 100.0
}

/// `part / whole * 100`, rounded half-to-even to 2 decimals. `whole` must be non-zero.
pub fn percent_of(part: u64, whole: u64) -> f64 {
    round_half_even(i128::from(part) * 10_000, i128::from(whole)) as f64 / 100.0
}

/// Integer division rounding to nearest, ties to even. `den > 0`.
fn round_half_even(num: i128, den: i128) -> i128 {
    let q = num.div_euclid(den);
    let r = num.rem_euclid(den);
    match (2 * r).cmp(&den) {
        std::cmp::Ordering::Greater => q + 1,
        std::cmp::Ordering::Less => q,
        std::cmp::Ordering::Equal => {
            if q % 2 == 0 {
                q
            } else {
                q + 1
            }
        }
    }
}

fn signed(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}
