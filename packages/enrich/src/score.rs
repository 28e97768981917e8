//! Weighted composite safety score.
//!
//! Each category rate is clamped into its calibration band and inverted to
//! a 0-100 sub-score (0 at the top of the band, 100 at the bottom). The
//! score is the weighted sum of sub-scores, rounded.

use safety_map_crime_models::{CategoryValues, CrimeCategory};
use safety_map_enrich_models::SafetyGrade;

/// Fixed range a category rate is clamped into before scoring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationBand {
    /// Rate scoring 100.
    pub min: f64,
    /// Rate scoring 0.
    pub max: f64,
}

impl CalibrationBand {
    /// Inverts a rate to a 0-100 sub-score.
    #[must_use]
    pub fn sub_score(&self, rate: f64) -> f64 {
        let span = self.max - self.min;
        if span <= 0.0 {
            return 100.0;
        }
        let clamped = rate.clamp(self.min, self.max);
        100.0 * (self.max - clamped) / span
    }
}

/// Category weights; they sum to `1.0`.
pub const WEIGHTS: CategoryValues<f64> = CategoryValues {
    violent: 0.40,
    car_theft: 0.20,
    break_in: 0.25,
    petty_theft: 0.15,
};

/// Annual incidents per 1,000 residents.
pub const BANDS: CategoryValues<CalibrationBand> = CategoryValues {
    violent: CalibrationBand { min: 0.0, max: 15.0 },
    car_theft: CalibrationBand { min: 0.0, max: 12.0 },
    break_in: CalibrationBand { min: 0.0, max: 10.0 },
    petty_theft: CalibrationBand { min: 0.0, max: 25.0 },
};

/// Safety score for per-capita category rates, in `[0, 100]`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn safety_score(rates: &CategoryValues<f64>) -> u8 {
    let weighted: f64 = CrimeCategory::all()
        .iter()
        .map(|&category| {
            WEIGHTS.get(category) * BANDS.get(category).sub_score(*rates.get(category))
        })
        .sum();

    if weighted.is_nan() {
        return 0;
    }
    weighted.round().clamp(0.0, 100.0) as u8
}

/// Score and grade for optional rates. Both are `None` unless every
/// category rate is known.
#[must_use]
pub fn score_and_grade(rates: &CategoryValues<Option<f64>>) -> (Option<u8>, Option<SafetyGrade>) {
    let (Some(violent), Some(car_theft), Some(break_in), Some(petty_theft)) =
        (rates.violent, rates.car_theft, rates.break_in, rates.petty_theft)
    else {
        return (None, None);
    };

    let score = safety_score(&CategoryValues {
        violent,
        car_theft,
        break_in,
        petty_theft,
    });
    (Some(score), Some(SafetyGrade::from_score(score)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rates(violent: f64, car_theft: f64, break_in: f64, petty_theft: f64) -> CategoryValues<f64> {
        CategoryValues {
            violent,
            car_theft,
            break_in,
            petty_theft,
        }
    }

    #[test]
    fn weights_sum_to_one() {
        let total: f64 = WEIGHTS.iter().map(|(_, w)| *w).sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn no_crime_scores_100() {
        assert_eq!(safety_score(&rates(0.0, 0.0, 0.0, 0.0)), 100);
    }

    #[test]
    fn saturated_bands_score_0() {
        assert_eq!(safety_score(&rates(15.0, 12.0, 10.0, 25.0)), 0);
        assert_eq!(safety_score(&rates(1e9, 1e9, 1e9, 1e9)), 0);
    }

    #[test]
    fn half_band_violent_only() {
        // Violent at mid-band loses half of its 40 points.
        assert_eq!(safety_score(&rates(7.5, 0.0, 0.0, 0.0)), 80);
    }

    #[test]
    fn score_stays_in_bounds() {
        for value in [-5.0, 0.0, 3.3, 9.9, 14.2, 30.0, f64::INFINITY] {
            let score = safety_score(&rates(value, value, value, value));
            assert!(score <= 100, "{value} -> {score}");
        }
        assert_eq!(safety_score(&rates(f64::NAN, 0.0, 0.0, 0.0)), 0);
    }

    #[test]
    fn score_is_monotonic_per_category() {
        for category in CrimeCategory::all() {
            let mut previous = u8::MAX;
            for step in 0..=40 {
                let mut values = rates(2.0, 2.0, 2.0, 2.0);
                *values.get_mut(*category) = f64::from(step);
                let score = safety_score(&values);
                assert!(score <= previous, "{category} at {step}: {score} > {previous}");
                previous = score;
            }
        }
    }

    #[test]
    fn grade_needs_every_rate() {
        let mut optional = CategoryValues {
            violent: Some(0.0),
            car_theft: Some(0.0),
            break_in: Some(0.0),
            petty_theft: None,
        };
        assert_eq!(score_and_grade(&optional), (None, None));
        optional.petty_theft = Some(0.0);
        assert_eq!(score_and_grade(&optional), (Some(100), Some(SafetyGrade::A)));
    }

    #[test]
    fn degenerate_band_scores_full() {
        let band = CalibrationBand { min: 5.0, max: 5.0 };
        assert!((band.sub_score(10.0) - 100.0).abs() < f64::EPSILON);
    }
}
