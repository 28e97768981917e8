#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Per-neighborhood aggregate types.
//!
//! A [`NeighborhoodAggregate`] accumulates incident counts for one
//! neighborhood while incidents are folded, and an [`AggregationResult`]
//! holds every aggregate of a run plus the run-level quality counters.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use safety_map_crime_models::{CategoryValues, CrimeCategory};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Which incident source an aggregate came from.
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
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DataSource {
    /// The main incident feed.
    Primary,
    /// An additional feed (e.g. a differently-schemed dataset covering an
    /// older time window).
    Secondary,
    /// The merge of several sources.
    Combined,
}

/// An inclusive date range.
///
/// Deserialization goes through [`DateRange::new`], so reversed bounds in
/// input files are swapped rather than producing a negative period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "DateRangeBounds")]
pub struct DateRange {
    /// First day covered.
    pub start: NaiveDate,
    /// Last day covered.
    pub end: NaiveDate,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DateRangeBounds {
    start: NaiveDate,
    end: NaiveDate,
}

impl From<DateRangeBounds> for DateRange {
    fn from(bounds: DateRangeBounds) -> Self {
        Self::new(bounds.start, bounds.end)
    }
}

impl DateRange {
    /// Creates a range, swapping the bounds if they are reversed.
    #[must_use]
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    /// A single-day range.
    #[must_use]
    pub const fn single(day: NaiveDate) -> Self {
        Self {
            start: day,
            end: day,
        }
    }

    /// Smallest range covering both ranges.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Extends the range to include `day`.
    #[must_use]
    pub fn including(&self, day: NaiveDate) -> Self {
        self.union(&Self::single(day))
    }

    /// Number of days covered, counting both ends.
    #[must_use]
    pub fn days_inclusive(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

/// Union of two optional ranges; `None` only if both are `None`.
#[must_use]
pub fn union_ranges(a: Option<DateRange>, b: Option<DateRange>) -> Option<DateRange> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.union(&b)),
        (a, b) => a.or(b),
    }
}

/// Incident counts attributed to one neighborhood.
///
/// `total` and `incident_count` count every attributed incident, including
/// unclassified ones; `counts` only counts classified incidents, so
/// `counts.sum() + unclassified == total`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NeighborhoodAggregate {
    /// Neighborhood name.
    pub name: String,
    /// Classified incident counts per category.
    pub counts: CategoryValues<u64>,
    /// Attributed incidents that fit no category.
    pub unclassified: u64,
    /// Every attributed incident.
    pub total: u64,
    /// Raw incidents attributed to this neighborhood.
    pub incident_count: u64,
    /// Period the counts cover, stamped after folding.
    pub date_range: Option<DateRange>,
    /// Which source the counts came from.
    pub source: DataSource,
}

impl NeighborhoodAggregate {
    /// Creates a zeroed aggregate.
    #[must_use]
    pub fn new(name: impl Into<String>, source: DataSource) -> Self {
        Self {
            name: name.into(),
            counts: CategoryValues::default(),
            unclassified: 0,
            total: 0,
            incident_count: 0,
            date_range: None,
            source,
        }
    }

    /// Records one attributed incident.
    pub const fn record(&mut self, category: Option<CrimeCategory>) {
        self.incident_count += 1;
        self.total += 1;
        match category {
            Some(category) => *self.counts.get_mut(category) += 1,
            None => self.unclassified += 1,
        }
    }

    /// Adds every counter of `other` into this aggregate and widens the
    /// date range to cover both.
    pub fn absorb(&mut self, other: &Self) {
        self.counts.accumulate(&other.counts);
        self.unclassified += other.unclassified;
        self.total += other.total;
        self.incident_count += other.incident_count;
        self.date_range = union_ranges(self.date_range, other.date_range);
    }

    /// Returns `true` if no incident was attributed.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.incident_count == 0
    }
}

/// Output of one aggregation run.
///
/// `mapped_count + unmapped_count + invalid_coordinate_count` is the number
/// of incidents processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationResult {
    /// One aggregate per known neighborhood, including zero-crime ones.
    pub per_neighborhood: BTreeMap<String, NeighborhoodAggregate>,
    /// Incidents attributed to a neighborhood.
    pub mapped_count: u64,
    /// Incidents with valid coordinates outside every neighborhood.
    pub unmapped_count: u64,
    /// Incidents with missing, unparseable or sentinel coordinates.
    pub invalid_coordinate_count: u64,
    /// Mapped incidents that fit no category.
    pub unclassified_count: u64,
    /// Min/max occurrence date over mapped incidents with a parseable date.
    pub observed_range: Option<DateRange>,
    /// Source tag applied to every aggregate.
    pub source: DataSource,
}

impl AggregationResult {
    /// Creates an empty result with one zeroed aggregate per name.
    pub fn with_neighborhoods<'a>(
        names: impl IntoIterator<Item = &'a str>,
        source: DataSource,
    ) -> Self {
        Self {
            per_neighborhood: names
                .into_iter()
                .map(|name| (name.to_string(), NeighborhoodAggregate::new(name, source)))
                .collect(),
            mapped_count: 0,
            unmapped_count: 0,
            invalid_coordinate_count: 0,
            unclassified_count: 0,
            observed_range: None,
            source,
        }
    }

    /// Creates an empty result with no neighborhoods.
    #[must_use]
    pub fn empty(source: DataSource) -> Self {
        Self::with_neighborhoods(std::iter::empty::<&str>(), source)
    }

    /// Stamps `range` onto every aggregate.
    pub fn stamp_date_range(&mut self, range: DateRange) {
        for aggregate in self.per_neighborhood.values_mut() {
            aggregate.date_range = Some(range);
        }
    }

    /// Number of incidents processed.
    #[must_use]
    pub const fn total_processed(&self) -> u64 {
        self.mapped_count + self.unmapped_count + self.invalid_coordinate_count
    }

    /// Percentage of processed incidents attributed to a neighborhood,
    /// `0.0` when nothing was processed.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percent_mapped(&self) -> f64 {
        let total = self.total_processed();
        if total == 0 {
            return 0.0;
        }
        self.mapped_count as f64 / total as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn record_counts_classified_and_unclassified() {
        let mut agg = NeighborhoodAggregate::new("Hollywood", DataSource::Primary);
        agg.record(Some(CrimeCategory::Violent));
        agg.record(None);
        agg.record(Some(CrimeCategory::Violent));
        assert_eq!(agg.counts.violent, 2);
        assert_eq!(agg.unclassified, 1);
        assert_eq!(agg.total, 3);
        assert_eq!(agg.incident_count, 3);
        assert_eq!(agg.counts.sum() + agg.unclassified, agg.total);
    }

    #[test]
    fn absorb_sums_and_widens_range() {
        let mut a = NeighborhoodAggregate::new("X", DataSource::Primary);
        a.record(Some(CrimeCategory::BreakIn));
        a.date_range = Some(DateRange::new(day(2024, 3, 1), day(2024, 3, 31)));

        let mut b = NeighborhoodAggregate::new("X", DataSource::Secondary);
        b.record(Some(CrimeCategory::BreakIn));
        b.record(None);
        b.date_range = Some(DateRange::new(day(2023, 1, 1), day(2023, 12, 31)));

        a.absorb(&b);
        assert_eq!(a.counts.break_in, 2);
        assert_eq!(a.total, 3);
        assert_eq!(
            a.date_range,
            Some(DateRange::new(day(2023, 1, 1), day(2024, 3, 31)))
        );
    }

    #[test]
    fn date_range_swaps_reversed_bounds() {
        let range = DateRange::new(day(2024, 2, 1), day(2024, 1, 1));
        assert_eq!(range.start, day(2024, 1, 1));
        assert_eq!(range.days_inclusive(), 32);
        assert_eq!(DateRange::single(day(2024, 1, 1)).days_inclusive(), 1);
    }

    #[test]
    fn deserialized_reversed_range_is_swapped() {
        let range: DateRange =
            serde_json::from_str(r#"{"start": "2024-05-31", "end": "2024-01-01"}"#).unwrap();
        assert_eq!(range, DateRange::new(day(2024, 1, 1), day(2024, 5, 31)));
        assert_eq!(range.days_inclusive(), 152);
    }

    #[test]
    fn union_ranges_ignores_missing() {
        let r = DateRange::single(day(2024, 1, 1));
        assert_eq!(union_ranges(None, Some(r)), Some(r));
        assert_eq!(union_ranges(Some(r), None), Some(r));
        assert_eq!(union_ranges(None, None), None);
        assert_eq!(
            r.including(day(2024, 1, 5)),
            DateRange::new(day(2024, 1, 1), day(2024, 1, 5))
        );
    }

    #[test]
    fn zero_initialized_neighborhoods() {
        let result = AggregationResult::with_neighborhoods(["A", "B"], DataSource::Primary);
        assert_eq!(result.per_neighborhood.len(), 2);
        assert!(result.per_neighborhood["A"].is_empty());
        assert_eq!(result.total_processed(), 0);
        assert!(result.percent_mapped().abs() < f64::EPSILON);
    }

    #[test]
    fn serializes_camel_case() {
        let agg = NeighborhoodAggregate::new("X", DataSource::Combined);
        let json = serde_json::to_value(&agg).unwrap();
        assert_eq!(json["incidentCount"], 0);
        assert_eq!(json["source"], "combined");
        assert_eq!(json["counts"]["carTheft"], 0);
    }
}
