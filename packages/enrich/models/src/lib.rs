#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Enriched neighborhood safety profile types.
//!
//! These are the public output of a pipeline run: one
//! [`EnrichedNeighborhoodRecord`] per neighborhood plus a single
//! [`RunMetadata`]. [`PopulationRecord`] is the reference table the
//! per-capita figures are derived from.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use safety_map_aggregate_models::{AggregationResult, DataSource, DateRange};
use safety_map_crime_models::CategoryValues;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// How much a population estimate can be trusted.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum PopulationConfidence {
    /// Census-derived figure.
    #[default]
    High,
    /// Interpolated or a few years old.
    Medium,
    /// Rough estimate.
    Low,
}

/// Population reference data for one neighborhood.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulationRecord {
    /// Neighborhood name, matching the boundary name.
    pub name: String,
    /// Resident count. `0` is treated as unavailable.
    pub population: u64,
    /// Land area in square miles.
    pub area_sq_mi: Option<f64>,
    /// Source confidence.
    pub confidence: PopulationConfidence,
}

impl PopulationRecord {
    /// Returns the population if it can be used as a rate denominator.
    #[must_use]
    pub const fn usable_population(&self) -> Option<u64> {
        if self.population == 0 {
            None
        } else {
            Some(self.population)
        }
    }
}

/// Population records keyed by neighborhood name.
pub type PopulationTable = BTreeMap<String, PopulationRecord>;

/// Letter-grade tier for a safety score.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum SafetyGrade {
    /// 85 and above.
    A,
    /// 70 to 84.
    B,
    /// 55 to 69.
    C,
    /// 40 to 54.
    D,
    /// Below 40.
    F,
}

impl SafetyGrade {
    /// Maps a 0-100 safety score to its tier.
    #[must_use]
    pub const fn from_score(score: u8) -> Self {
        match score {
            85.. => Self::A,
            70..=84 => Self::B,
            55..=69 => Self::C,
            40..=54 => Self::D,
            _ => Self::F,
        }
    }
}

/// A 95% confidence interval on an annual per-capita rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceInterval {
    /// Lower bound, never negative.
    pub lower: f64,
    /// Upper bound.
    pub upper: f64,
}

/// Terminal per-neighborhood safety profile.
///
/// Every per-capita field is `None` when the neighborhood has no usable
/// population record; raw counts are always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedNeighborhoodRecord {
    /// Neighborhood name.
    pub name: String,
    /// Classified incident counts.
    pub counts: CategoryValues<u64>,
    /// Attributed incidents that fit no category.
    pub unclassified: u64,
    /// Every attributed incident.
    pub total: u64,
    /// Raw incidents attributed.
    pub incident_count: u64,
    /// Usable population, if known.
    pub population: Option<u64>,
    /// Annual incidents per 1,000 residents, per category.
    pub rates: CategoryValues<Option<f64>>,
    /// Annual incidents per 1,000 residents, all incidents.
    pub total_rate: Option<f64>,
    /// Annual incidents per square mile, all incidents.
    pub incidents_per_sq_mi: Option<f64>,
    /// Share of neighborhoods with a lower rate, per category.
    pub percentiles: CategoryValues<Option<u8>>,
    /// Share of neighborhoods with more total crime; higher is safer.
    pub overall_safety_percentile: Option<u8>,
    /// Weighted 0-100 composite, 100 is safest.
    pub safety_score: Option<u8>,
    /// Tier of [`Self::safety_score`].
    pub grade: Option<SafetyGrade>,
    /// 0-100 heuristic on how far the figures can be trusted.
    pub data_quality_score: u8,
    /// Population known, quality above threshold and at least one incident.
    pub has_sufficient_data: bool,
    /// Rate divided by the cohort mean rate, per category.
    pub vs_average: CategoryValues<Option<f64>>,
    /// 95% interval on the violent crime rate.
    pub violent_ci: Option<ConfidenceInterval>,
    /// 95% interval on the total crime rate.
    pub total_ci: Option<ConfidenceInterval>,
    /// Period the counts cover.
    pub date_range: Option<DateRange>,
    /// Which source the counts came from.
    pub source: DataSource,
}

/// Run-level counters published alongside the enriched records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetadata {
    /// Incidents processed.
    pub total_processed: u64,
    /// Incidents attributed to a neighborhood.
    pub mapped_count: u64,
    /// Valid incidents outside every neighborhood.
    pub unmapped_count: u64,
    /// Incidents with unusable coordinates.
    pub invalid_coordinate_count: u64,
    /// Attributed incidents that fit no category.
    pub unclassified_count: u64,
    /// Percentage of processed incidents attributed.
    pub percent_mapped: f64,
    /// Period stamped onto the aggregates.
    pub date_range: Option<DateRange>,
    /// Reference date for staleness.
    pub as_of: NaiveDate,
    /// Source tag of the output.
    pub source: DataSource,
    /// Number of enriched neighborhoods.
    pub neighborhood_count: usize,
}

impl RunMetadata {
    /// Collects the run counters of `result`.
    #[must_use]
    pub fn from_result(
        result: &AggregationResult,
        date_range: Option<DateRange>,
        as_of: NaiveDate,
    ) -> Self {
        Self {
            total_processed: result.total_processed(),
            mapped_count: result.mapped_count,
            unmapped_count: result.unmapped_count,
            invalid_coordinate_count: result.invalid_coordinate_count,
            unclassified_count: result.unclassified_count,
            percent_mapped: (result.percent_mapped() * 100.0).round() / 100.0,
            date_range,
            as_of,
            source: result.source,
            neighborhood_count: result.per_neighborhood.len(),
        }
    }
}
