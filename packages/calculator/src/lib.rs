#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Payout formulas for index-based crop and livestock cover.
//!
//! Every function here is pure and total: any combination of real inputs
//! yields an amount, and non-finite inputs yield zero. Callers are expected
//! to have validated the sum insured before calling in.

/// Values above this are treated as percentile-scaled and divided by 100.
const FRACTION_CEILING: f64 = 1.0;

/// Z-score at or above which a livestock policy pays nothing.
pub const LIVESTOCK_TRIGGER: f64 = 1.5;

/// Z-score at or below which a livestock policy pays the full sum insured.
pub const LIVESTOCK_EXIT: f64 = 0.5;

/// Share of the sum insured paid as soon as any partial livestock loss
/// triggers.
pub const LIVESTOCK_MIN_PAYMENT_FRACTION: f64 = 0.10;

/// Converts a percentile-scaled value (0-100) to a fraction (0-1). Values
/// already on the fractional scale pass through unchanged.
#[must_use]
pub fn normalize_scale(value: f64) -> f64 {
    if value > FRACTION_CEILING {
        value / 100.0
    } else {
        value
    }
}

/// Rounds an amount to two decimal places.
#[must_use]
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Derives the livestock z-score from a raw index reading.
#[must_use]
pub fn livestock_z_score(index: f64) -> f64 {
    (normalize_scale(index) - 0.5) * 2.0
}

/// Computes the crop payout for one period.
///
/// * `trigger == exit == 0` means no active coverage and pays nothing.
/// * `index >= trigger` pays nothing.
/// * `index <= exit` pays the full `sum_insured`.
/// * Anything in between is interpolated linearly and rounded to cents.
///
/// `index`, `trigger` and `exit` above 1 are normalized by dividing by 100
/// first, so percentile-scaled thresholds compare correctly against a
/// fractional index.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn crop_payout(index: f64, trigger: f64, exit: f64, sum_insured: f64) -> f64 {
    if !all_finite(&[index, trigger, exit, sum_insured]) {
        return 0.0;
    }

    let index = normalize_scale(index);
    let trigger = normalize_scale(trigger);
    let exit = normalize_scale(exit);

    if trigger == 0.0 && exit == 0.0 {
        return 0.0;
    }
    if index >= trigger {
        return 0.0;
    }
    if index <= exit {
        return sum_insured;
    }

    interpolate(index, trigger, exit, sum_insured)
}

/// Computes the livestock payout for a z-score.
///
/// Uses the fixed [`LIVESTOCK_TRIGGER`] and [`LIVESTOCK_EXIT`] points. A
/// partial loss never pays less than [`LIVESTOCK_MIN_PAYMENT_FRACTION`] of
/// `sum_insured`.
#[must_use]
pub fn livestock_payout(z_score: f64, sum_insured: f64) -> f64 {
    if !all_finite(&[z_score, sum_insured]) {
        return 0.0;
    }
    if z_score >= LIVESTOCK_TRIGGER {
        return 0.0;
    }
    if z_score <= LIVESTOCK_EXIT {
        return sum_insured;
    }

    let amount = interpolate(z_score, LIVESTOCK_TRIGGER, LIVESTOCK_EXIT, sum_insured);
    amount.max(LIVESTOCK_MIN_PAYMENT_FRACTION * sum_insured)
}

/// Linear share of `sum_insured` for a value strictly between `exit` and
/// `trigger`. A zero-width window pays nothing.
#[allow(clippy::float_cmp)]
fn interpolate(value: f64, trigger: f64, exit: f64, sum_insured: f64) -> f64 {
    let span = trigger - exit;
    if span == 0.0 {
        return 0.0;
    }
    round_cents((trigger - value) / span * sum_insured)
}

fn all_finite(values: &[f64]) -> bool {
    values.iter().all(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUM: f64 = 10_000.0;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn crop_interpolates_between_exit_and_trigger() {
        assert!(approx(crop_payout(0.10, 0.15, 0.05, SUM), 5000.0));
    }

    #[test]
    fn crop_pays_nothing_at_or_above_trigger() {
        assert!(approx(crop_payout(0.20, 0.15, 0.05, SUM), 0.0));
        assert!(approx(crop_payout(0.15, 0.15, 0.05, SUM), 0.0));
    }

    #[test]
    fn crop_pays_full_sum_at_or_below_exit() {
        assert!(approx(crop_payout(0.05, 0.15, 0.05, SUM), SUM));
        assert!(approx(crop_payout(0.01, 0.15, 0.05, SUM), SUM));
    }

    #[test]
    fn crop_inactive_window_pays_nothing() {
        for idx in [-1.0, 0.0, 0.3, 0.99, 55.0] {
            assert!(approx(crop_payout(idx, 0.0, 0.0, SUM), 0.0));
            assert!(approx(crop_payout(idx, 0.0, 0.0, 1.0), 0.0));
        }
    }

    #[test]
    fn crop_normalizes_percentile_thresholds() {
        // 15 and 5 are percentiles: same window as 0.15 / 0.05.
        assert!(approx(crop_payout(0.10, 15.0, 5.0, SUM), 5000.0));
        // An index reported as a percentile is normalized too.
        assert!(approx(crop_payout(10.0, 0.15, 0.05, SUM), 5000.0));
    }

    #[test]
    fn crop_rounds_to_cents() {
        let amount = crop_payout(0.1, 0.3, 0.0, 100.0);
        assert!(approx(amount, 66.67));
    }

    #[test]
    fn crop_degenerate_window_pays_all_or_nothing() {
        // trigger == exit: at or above the point pays nothing, below pays in full.
        assert!(approx(crop_payout(0.1, 0.1, 0.1, SUM), 0.0));
        assert!(approx(crop_payout(0.2, 0.1, 0.1, SUM), 0.0));
        assert!(approx(crop_payout(0.05, 0.1, 0.1, SUM), SUM));
        assert!(approx(crop_payout(0.0, 0.1, 0.1, SUM), SUM));
    }

    #[test]
    fn crop_is_monotone_non_increasing_inside_the_window() {
        let (trigger, exit) = (0.6, 0.2);
        let mut previous = f64::INFINITY;
        let mut idx = 0.201;
        while idx < trigger {
            let amount = crop_payout(idx, trigger, exit, SUM);
            assert!(amount > 0.0 && amount < SUM, "idx={idx} amount={amount}");
            assert!(amount <= previous, "idx={idx} amount={amount} previous={previous}");
            previous = amount;
            idx += 0.01;
        }
    }

    #[test]
    fn crop_non_finite_inputs_pay_nothing() {
        assert!(approx(crop_payout(f64::NAN, 0.15, 0.05, SUM), 0.0));
        assert!(approx(crop_payout(0.1, f64::INFINITY, 0.05, SUM), 0.0));
    }

    #[test]
    fn livestock_thresholds() {
        assert!(approx(livestock_payout(1.5, SUM), 0.0));
        assert!(approx(livestock_payout(2.0, SUM), 0.0));
        assert!(approx(livestock_payout(0.5, SUM), SUM));
        assert!(approx(livestock_payout(-1.0, SUM), SUM));
    }

    #[test]
    fn livestock_interpolates_above_the_floor() {
        // (1.5 - 1.0) / (1.5 - 0.5) = 0.5
        assert!(approx(livestock_payout(1.0, SUM), 5000.0));
    }

    #[test]
    fn livestock_floor_binds_close_to_trigger() {
        let floor = LIVESTOCK_MIN_PAYMENT_FRACTION * SUM;
        assert!(approx(livestock_payout(1.49, SUM), floor));
        assert!(approx(livestock_payout(1.499_999, SUM), floor));
    }

    #[test]
    fn livestock_never_pays_below_floor_once_triggered() {
        for sum in [1.0, 333.33, 10_000.0] {
            let floor = LIVESTOCK_MIN_PAYMENT_FRACTION * sum;
            let mut z = -2.0;
            while z < LIVESTOCK_TRIGGER {
                let amount = livestock_payout(z, sum);
                assert!(amount >= floor, "z={z} sum={sum} amount={amount}");
                z += 0.013;
            }
        }
    }

    #[test]
    fn z_score_from_index() {
        assert!(approx(livestock_z_score(0.5), 0.0));
        assert!(approx(livestock_z_score(1.0), 1.0));
        assert!(approx(livestock_z_score(75.0), 0.5));
    }
}
