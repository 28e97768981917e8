//! Data-quality heuristics.
//!
//! The quality score starts at 100 and loses fixed penalties for missing or
//! weak population data, stale or undated counts, and suspiciously low
//! incident totals. A zero count usually means incomplete ingestion rather
//! than a perfectly safe neighborhood.

use chrono::NaiveDate;
use safety_map_aggregate_models::DateRange;
use safety_map_enrich_models::{PopulationConfidence, PopulationRecord};
use serde::{Deserialize, Serialize};

/// A staleness penalty applied once the data is older than `older_than_days`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StalenessTier {
    /// Age in days the data must exceed.
    pub older_than_days: i64,
    /// Points deducted.
    pub penalty: u8,
}

/// Penalties and thresholds for the data-quality score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityPolicy {
    /// Deducted when the neighborhood has no usable population.
    pub missing_population_penalty: u8,
    /// Deducted for a low-confidence population figure.
    pub low_confidence_penalty: u8,
    /// Deducted for a medium-confidence population figure.
    pub medium_confidence_penalty: u8,
    /// Age tiers; only the largest exceeded penalty applies.
    pub staleness: Vec<StalenessTier>,
    /// Deducted when the covered period is unknown.
    pub unknown_range_penalty: u8,
    /// Deducted when no incident was attributed.
    pub no_incidents_penalty: u8,
    /// Incident counts below this (but above zero) are "few".
    pub few_incidents_threshold: u64,
    /// Deducted for few incidents.
    pub few_incidents_penalty: u8,
    /// Minimum quality score for a record to count as sufficient.
    pub sufficient_threshold: u8,
}

impl Default for QualityPolicy {
    fn default() -> Self {
        Self {
            missing_population_penalty: 40,
            low_confidence_penalty: 20,
            medium_confidence_penalty: 5,
            staleness: vec![
                StalenessTier {
                    older_than_days: 365,
                    penalty: 30,
                },
                StalenessTier {
                    older_than_days: 180,
                    penalty: 20,
                },
                StalenessTier {
                    older_than_days: 90,
                    penalty: 10,
                },
                StalenessTier {
                    older_than_days: 30,
                    penalty: 5,
                },
            ],
            unknown_range_penalty: 15,
            no_incidents_penalty: 30,
            few_incidents_threshold: 5,
            few_incidents_penalty: 15,
            sufficient_threshold: 60,
        }
    }
}

impl QualityPolicy {
    /// Quality score in `[0, 100]`.
    #[must_use]
    pub fn score(
        &self,
        population: Option<&PopulationRecord>,
        date_range: Option<DateRange>,
        as_of: NaiveDate,
        incident_count: u64,
    ) -> u8 {
        let penalties = [
            self.population_penalty(population),
            self.staleness_penalty(date_range, as_of),
            self.volume_penalty(incident_count),
        ];
        let deducted: u32 = penalties.iter().map(|&p| u32::from(p)).sum();
        u8::try_from(100_u32.saturating_sub(deducted)).unwrap_or(0)
    }

    /// Whether a record with this quality score can be relied on.
    #[must_use]
    pub const fn is_sufficient(
        &self,
        has_population: bool,
        quality_score: u8,
        incident_count: u64,
    ) -> bool {
        has_population && quality_score >= self.sufficient_threshold && incident_count > 0
    }

    const fn population_penalty(&self, population: Option<&PopulationRecord>) -> u8 {
        match population {
            Some(record) if record.population > 0 => match record.confidence {
                PopulationConfidence::High => 0,
                PopulationConfidence::Medium => self.medium_confidence_penalty,
                PopulationConfidence::Low => self.low_confidence_penalty,
            },
            _ => self.missing_population_penalty,
        }
    }

    fn staleness_penalty(&self, date_range: Option<DateRange>, as_of: NaiveDate) -> u8 {
        let Some(range) = date_range else {
            return self.unknown_range_penalty;
        };
        let age_days = (as_of - range.end).num_days();
        self.staleness
            .iter()
            .filter(|tier| age_days > tier.older_than_days)
            .map(|tier| tier.penalty)
            .max()
            .unwrap_or(0)
    }

    const fn volume_penalty(&self, incident_count: u64) -> u8 {
        if incident_count == 0 {
            self.no_incidents_penalty
        } else if incident_count < self.few_incidents_threshold {
            self.few_incidents_penalty
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn population(confidence: PopulationConfidence) -> PopulationRecord {
        PopulationRecord {
            name: "Hollywood".to_string(),
            population: 85_000,
            area_sq_mi: Some(3.5),
            confidence,
        }
    }

    fn fresh_range() -> Option<DateRange> {
        Some(DateRange::new(day(2024, 1, 1), day(2024, 5, 31)))
    }

    fn as_of() -> NaiveDate {
        day(2024, 6, 1)
    }

    #[test]
    fn perfect_data_scores_100() {
        let policy = QualityPolicy::default();
        let record = population(PopulationConfidence::High);
        assert_eq!(policy.score(Some(&record), fresh_range(), as_of(), 500), 100);
    }

    #[test]
    fn population_penalties() {
        let policy = QualityPolicy::default();
        let medium = population(PopulationConfidence::Medium);
        let low = population(PopulationConfidence::Low);
        let zero = PopulationRecord {
            population: 0,
            ..population(PopulationConfidence::High)
        };
        assert_eq!(policy.score(Some(&medium), fresh_range(), as_of(), 500), 95);
        assert_eq!(policy.score(Some(&low), fresh_range(), as_of(), 500), 80);
        assert_eq!(policy.score(None, fresh_range(), as_of(), 500), 60);
        assert_eq!(policy.score(Some(&zero), fresh_range(), as_of(), 500), 60);
    }

    #[test]
    fn staleness_tiers() {
        let policy = QualityPolicy::default();
        let record = population(PopulationConfidence::High);
        let ending = |end: NaiveDate| Some(DateRange::new(day(2020, 1, 1), end));
        let as_of = day(2024, 6, 1);

        assert_eq!(policy.score(Some(&record), ending(day(2024, 5, 2)), as_of, 500), 100);
        assert_eq!(policy.score(Some(&record), ending(day(2024, 5, 1)), as_of, 500), 95);
        assert_eq!(policy.score(Some(&record), ending(day(2024, 2, 1)), as_of, 500), 90);
        assert_eq!(policy.score(Some(&record), ending(day(2023, 11, 1)), as_of, 500), 80);
        assert_eq!(policy.score(Some(&record), ending(day(2022, 1, 1)), as_of, 500), 70);
        assert_eq!(policy.score(Some(&record), None, as_of, 500), 85);
    }

    #[test]
    fn future_range_is_not_stale() {
        let policy = QualityPolicy::default();
        let record = population(PopulationConfidence::High);
        let range = Some(DateRange::new(day(2024, 1, 1), day(2024, 12, 31)));
        assert_eq!(policy.score(Some(&record), range, as_of(), 500), 100);
    }

    #[test]
    fn volume_penalties() {
        let policy = QualityPolicy::default();
        let record = population(PopulationConfidence::High);
        assert_eq!(policy.score(Some(&record), fresh_range(), as_of(), 0), 70);
        assert_eq!(policy.score(Some(&record), fresh_range(), as_of(), 4), 85);
        assert_eq!(policy.score(Some(&record), fresh_range(), as_of(), 5), 100);
    }

    #[test]
    fn score_is_clamped_at_zero() {
        let policy = QualityPolicy {
            missing_population_penalty: 90,
            ..QualityPolicy::default()
        };
        assert_eq!(policy.score(None, None, as_of(), 0), 0);
    }

    #[test]
    fn sufficiency_needs_all_three() {
        let policy = QualityPolicy::default();
        assert!(policy.is_sufficient(true, 60, 1));
        assert!(!policy.is_sufficient(false, 100, 10));
        assert!(!policy.is_sufficient(true, 59, 10));
        assert!(!policy.is_sufficient(true, 100, 0));
    }

    #[test]
    fn policy_reads_partial_toml() {
        let policy: QualityPolicy = toml::from_str(
            r"
            sufficient_threshold = 75

            [[staleness]]
            older_than_days = 7
            penalty = 50
            ",
        )
        .unwrap();
        assert_eq!(policy.sufficient_threshold, 75);
        assert_eq!(policy.missing_population_penalty, 40);
        assert_eq!(policy.staleness.len(), 1);
        assert_eq!(policy.staleness[0].penalty, 50);
    }
}
