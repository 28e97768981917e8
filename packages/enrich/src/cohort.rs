//! The comparison set for percentiles and vs-average ratios.
//!
//! Only neighborhoods with a usable population have per-capita rates, so
//! only they take part in the comparison.

use std::collections::BTreeMap;

use safety_map_aggregate_models::NeighborhoodAggregate;
use safety_map_crime_models::CategoryValues;
use safety_map_enrich_models::{PopulationRecord, PopulationTable};

use crate::EnrichmentContext;
use crate::stats::{mean, per_capita_rate, period_weeks};

/// Per-capita rates of one neighborhood.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeighborhoodRates {
    /// Per category.
    pub categories: CategoryValues<f64>,
    /// All attributed incidents.
    pub total: f64,
}

impl NeighborhoodRates {
    /// Rates of `aggregate`, `None` without a usable population.
    #[must_use]
    pub fn compute(
        aggregate: &NeighborhoodAggregate,
        population: Option<u64>,
        context: &EnrichmentContext,
    ) -> Option<Self> {
        let weeks = period_weeks(aggregate.date_range, context.default_period_weeks);
        let total = per_capita_rate(aggregate.total, weeks, population)?;
        let categories = aggregate
            .counts
            .map(|_, &count| per_capita_rate(count, weeks, population).unwrap_or_default());
        Some(Self { categories, total })
    }
}

/// Rates of every neighborhood with population data.
#[derive(Debug, Clone, Default)]
pub struct Cohort {
    categories: CategoryValues<Vec<f64>>,
    totals: Vec<f64>,
    means: CategoryValues<Option<f64>>,
}

impl Cohort {
    /// Collects the rates of every aggregate with a usable population.
    #[must_use]
    pub fn build(
        aggregates: &BTreeMap<String, NeighborhoodAggregate>,
        population: &PopulationTable,
        context: &EnrichmentContext,
    ) -> Self {
        let mut cohort = Self::default();

        for (name, aggregate) in aggregates {
            let usable = population
                .get(name)
                .and_then(PopulationRecord::usable_population);
            let Some(rates) = NeighborhoodRates::compute(aggregate, usable, context) else {
                continue;
            };
            for (category, rate) in rates.categories.iter() {
                cohort.categories.get_mut(category).push(*rate);
            }
            cohort.totals.push(rates.total);
        }

        cohort.means = cohort.categories.map(|_, values| mean(values));
        cohort
    }

    /// Number of neighborhoods compared.
    #[must_use]
    pub fn len(&self) -> usize {
        self.totals.len()
    }

    /// Returns `true` if no neighborhood has population data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    /// Category rates of every member.
    #[must_use]
    pub const fn category_rates(&self) -> &CategoryValues<Vec<f64>> {
        &self.categories
    }

    /// Total rates of every member.
    #[must_use]
    pub fn total_rates(&self) -> &[f64] {
        &self.totals
    }

    /// Mean category rates.
    #[must_use]
    pub const fn means(&self) -> &CategoryValues<Option<f64>> {
        &self.means
    }
}
