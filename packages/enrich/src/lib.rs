#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Statistical enrichment of neighborhood aggregates.
//!
//! Turns frozen [`NeighborhoodAggregate`]s plus a population table into
//! [`EnrichedNeighborhoodRecord`]s: per-capita rates, percentile ranks
//! against every neighborhood with population data, a weighted safety
//! score and grade, ratios to the average, Poisson confidence intervals and
//! a data-quality score.
//!
//! Enrichment is a pure function of its inputs. The reference date for
//! staleness comes from [`EnrichmentContext`], never from the clock.

pub mod cohort;
pub mod quality;
pub mod score;
pub mod stats;

use std::collections::BTreeMap;

use chrono::NaiveDate;
use safety_map_aggregate_models::NeighborhoodAggregate;
use safety_map_crime_models::CategoryValues;
use safety_map_enrich_models::{
    ConfidenceInterval, EnrichedNeighborhoodRecord, PopulationRecord, PopulationTable,
};

use crate::cohort::{Cohort, NeighborhoodRates};
use crate::quality::QualityPolicy;
use crate::stats::{
    per_area_rate, percentile_rank, period_weeks, poisson_interval, ratio_to_average, round2,
};

/// Inputs to enrichment that are the same for every neighborhood.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentContext {
    /// Reference date for staleness.
    pub as_of: NaiveDate,
    /// Period length for aggregates without a date range.
    pub default_period_weeks: f64,
    /// Data-quality penalties.
    pub quality: QualityPolicy,
}

impl EnrichmentContext {
    /// Context with the default one-week period and quality policy.
    #[must_use]
    pub fn new(as_of: NaiveDate) -> Self {
        Self {
            as_of,
            default_period_weeks: 1.0,
            quality: QualityPolicy::default(),
        }
    }

    /// Sets the fallback period length.
    #[must_use]
    pub const fn with_default_period_weeks(mut self, weeks: f64) -> Self {
        self.default_period_weeks = weeks;
        self
    }

    /// Sets the quality policy.
    #[must_use]
    pub fn with_quality(mut self, quality: QualityPolicy) -> Self {
        self.quality = quality;
        self
    }
}

/// Enriches one aggregate, ranking it against `all`.
#[must_use]
pub fn enrich(
    aggregate: &NeighborhoodAggregate,
    all: &BTreeMap<String, NeighborhoodAggregate>,
    population: &PopulationTable,
    context: &EnrichmentContext,
) -> EnrichedNeighborhoodRecord {
    let cohort = Cohort::build(all, population, context);
    enrich_against(aggregate, &cohort, population.get(&aggregate.name), context)
}

/// Enriches every aggregate, building the comparison cohort once.
#[must_use]
pub fn enrich_all(
    aggregates: &BTreeMap<String, NeighborhoodAggregate>,
    population: &PopulationTable,
    context: &EnrichmentContext,
) -> BTreeMap<String, EnrichedNeighborhoodRecord> {
    let cohort = Cohort::build(aggregates, population, context);

    for name in population.keys() {
        if !aggregates.contains_key(name) {
            log::debug!("Population record for unknown neighborhood '{name}'");
        }
    }

    let records: BTreeMap<String, EnrichedNeighborhoodRecord> = aggregates
        .iter()
        .map(|(name, aggregate)| {
            (
                name.clone(),
                enrich_against(aggregate, &cohort, population.get(name), context),
            )
        })
        .collect();

    let sufficient = records.values().filter(|r| r.has_sufficient_data).count();
    log::info!(
        "Enriched {} neighborhoods ({} with population data, {} sufficient)",
        records.len(),
        cohort.len(),
        sufficient
    );
    if cohort.is_empty() && !records.is_empty() {
        log::warn!("No neighborhood has population data; every per-capita field is null");
    }

    records
}

/// Enriches one aggregate against a prebuilt cohort.
#[must_use]
pub fn enrich_against(
    aggregate: &NeighborhoodAggregate,
    cohort: &Cohort,
    population: Option<&PopulationRecord>,
    context: &EnrichmentContext,
) -> EnrichedNeighborhoodRecord {
    let usable = population.and_then(PopulationRecord::usable_population);
    let weeks = period_weeks(aggregate.date_range, context.default_period_weeks);
    let rates = NeighborhoodRates::compute(aggregate, usable, context);

    let category_rates = CategoryValues::from_fn(|category| {
        rates.map(|r| *r.categories.get(category))
    });

    let percentiles = CategoryValues::from_fn(|category| {
        rates.map(|r| {
            percentile_rank(
                *r.categories.get(category),
                cohort.category_rates().get(category),
            )
        })
    });
    let overall_safety_percentile =
        rates.map(|r| 100 - percentile_rank(r.total, cohort.total_rates()));

    let vs_average = CategoryValues::from_fn(|category| {
        rates
            .and_then(|r| ratio_to_average(*r.categories.get(category), *cohort.means().get(category)))
            .map(round2)
    });

    let (safety_score, grade) = score::score_and_grade(&category_rates);

    let data_quality_score = context.quality.score(
        population,
        aggregate.date_range,
        context.as_of,
        aggregate.incident_count,
    );
    let has_sufficient_data = context.quality.is_sufficient(
        usable.is_some(),
        data_quality_score,
        aggregate.incident_count,
    );

    let round_interval = |ci: ConfidenceInterval| ConfidenceInterval {
        lower: round2(ci.lower),
        upper: round2(ci.upper),
    };

    EnrichedNeighborhoodRecord {
        name: aggregate.name.clone(),
        counts: aggregate.counts,
        unclassified: aggregate.unclassified,
        total: aggregate.total,
        incident_count: aggregate.incident_count,
        population: usable,
        rates: category_rates.map(|_, rate| rate.map(round2)),
        total_rate: rates.map(|r| round2(r.total)),
        incidents_per_sq_mi: per_area_rate(
            aggregate.total,
            weeks,
            population.and_then(|p| p.area_sq_mi),
        )
        .map(round2),
        percentiles,
        overall_safety_percentile,
        safety_score,
        grade,
        data_quality_score,
        has_sufficient_data,
        vs_average,
        violent_ci: poisson_interval(aggregate.counts.violent, weeks, usable).map(round_interval),
        total_ci: poisson_interval(aggregate.total, weeks, usable).map(round_interval),
        date_range: aggregate.date_range,
        source: aggregate.source,
    }
}
