#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Incident aggregation.
//!
//! Folds raw incidents into one [`NeighborhoodAggregate`] per known
//! neighborhood. Every incident passes three checks in order: coordinate
//! validity, spatial match, classification. Failing the first two drops
//! the incident into the invalid or unmapped counter; failing
//! classification still attributes it to its neighborhood's totals.
//!
//! Neighborhoods are zero-initialized before folding so zero-crime
//! neighborhoods are present in the output. Date ranges are stamped in a
//! separate step after folding ([`stamp_date_range`]).

pub mod merge;
pub mod parsing;
pub mod progress;

use safety_map_aggregate_models::{
    AggregationResult, DataSource, DateRange, NeighborhoodAggregate,
};
use safety_map_classifier::Classifier;
use safety_map_crime_models::RawIncident;
use safety_map_spatial::BoundarySet;

pub use merge::{merge, merge_results};

use crate::parsing::{parse_coordinates, parse_occurrence_date};
use crate::progress::{NullProgress, ProgressCallback};

/// How many incidents to fold between progress updates.
const PROGRESS_BATCH: u64 = 10_000;

/// Aggregates incidents against a fixed boundary set and classifier.
pub struct Aggregator<'a> {
    classifier: &'a Classifier,
    boundaries: &'a BoundarySet,
    source: DataSource,
}

impl<'a> Aggregator<'a> {
    /// Creates an aggregator tagging its output as [`DataSource::Primary`].
    #[must_use]
    pub const fn new(classifier: &'a Classifier, boundaries: &'a BoundarySet) -> Self {
        Self {
            classifier,
            boundaries,
            source: DataSource::Primary,
        }
    }

    /// Sets the source tag applied to every aggregate.
    #[must_use]
    pub const fn with_source(mut self, source: DataSource) -> Self {
        self.source = source;
        self
    }

    /// Folds `incidents` into per-neighborhood aggregates.
    #[must_use]
    pub fn aggregate(&self, incidents: &[RawIncident]) -> AggregationResult {
        self.aggregate_with_progress(incidents, &NullProgress)
    }

    /// Folds `incidents`, reporting progress as it goes.
    #[must_use]
    pub fn aggregate_with_progress(
        &self,
        incidents: &[RawIncident],
        progress: &dyn ProgressCallback,
    ) -> AggregationResult {
        progress.set_total(incidents.len() as u64);

        let mut result =
            AggregationResult::with_neighborhoods(self.boundaries.names(), self.source);
        self.fold(incidents, &mut result, progress);

        progress.finish(format!(
            "{} mapped, {} unmapped, {} invalid",
            result.mapped_count, result.unmapped_count, result.invalid_coordinate_count
        ));
        log_summary(&result);

        result
    }

    /// Folds `incidents` in `shards` parallel slices and merges the
    /// partials.
    ///
    /// Neighborhoods are zero-initialized once in the final result; shard
    /// partials only hold the neighborhoods they touched. The output equals
    /// [`Self::aggregate`] on the same input.
    #[must_use]
    pub fn aggregate_sharded(
        &self,
        incidents: &[RawIncident],
        shards: usize,
        progress: &dyn ProgressCallback,
    ) -> AggregationResult {
        let shards = shards.max(1);
        if shards == 1 || incidents.len() < shards {
            return self.aggregate_with_progress(incidents, progress);
        }

        progress.set_total(incidents.len() as u64);
        let chunk_size = incidents.len().div_ceil(shards);

        let partials: Vec<AggregationResult> = std::thread::scope(|scope| {
            let handles: Vec<_> = incidents
                .chunks(chunk_size)
                .map(|chunk| {
                    scope.spawn(move || {
                        let mut partial = AggregationResult::empty(self.source);
                        self.fold(chunk, &mut partial, progress);
                        partial
                    })
                })
                .collect();

            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
                })
                .collect()
        });

        let mut result =
            AggregationResult::with_neighborhoods(self.boundaries.names(), self.source);
        for partial in &partials {
            merge::absorb_partial(&mut result, partial);
        }

        progress.finish(format!(
            "{} mapped, {} unmapped, {} invalid ({shards} shards)",
            result.mapped_count, result.unmapped_count, result.invalid_coordinate_count
        ));
        log_summary(&result);

        result
    }

    /// Strict left fold of `incidents` into `result`.
    fn fold(
        &self,
        incidents: &[RawIncident],
        result: &mut AggregationResult,
        progress: &dyn ProgressCallback,
    ) {
        let mut pending = 0;

        for incident in incidents {
            self.fold_one(incident, result);

            pending += 1;
            if pending == PROGRESS_BATCH {
                progress.inc(pending);
                pending = 0;
            }
        }

        if pending > 0 {
            progress.inc(pending);
        }
    }

    fn fold_one(&self, incident: &RawIncident, result: &mut AggregationResult) {
        let Some((lat, lon)) = parse_coordinates(incident) else {
            result.invalid_coordinate_count += 1;
            return;
        };

        let Some(boundary) = self.boundaries.resolve(lat, lon) else {
            result.unmapped_count += 1;
            return;
        };

        let category = self.classifier.classify_incident(incident);
        if category.is_none() {
            result.unclassified_count += 1;
            log::trace!(
                "Unclassified incident {:?} (code {:?}) in {}",
                incident.source_incident_id,
                incident.crime_code,
                boundary.name()
            );
        }

        let source = result.source;
        result
            .per_neighborhood
            .entry(boundary.name().to_string())
            .or_insert_with(|| NeighborhoodAggregate::new(boundary.name(), source))
            .record(category);
        result.mapped_count += 1;

        if let Some(day) = incident
            .occurred_at
            .as_deref()
            .and_then(parse_occurrence_date)
        {
            result.observed_range = Some(
                result
                    .observed_range
                    .map_or_else(|| DateRange::single(day), |range| range.including(day)),
            );
        }
    }
}

/// Folds `incidents` with a primary-source [`Aggregator`].
#[must_use]
pub fn aggregate(
    incidents: &[RawIncident],
    boundaries: &BoundarySet,
    classifier: &Classifier,
) -> AggregationResult {
    Aggregator::new(classifier, boundaries).aggregate(incidents)
}

/// Stamps the period covered by a run onto its aggregates.
///
/// Uses `explicit` when given, else the observed occurrence range. Leaves
/// the aggregates unstamped (and returns `None`) when neither is known.
pub fn stamp_date_range(
    result: &mut AggregationResult,
    explicit: Option<DateRange>,
) -> Option<DateRange> {
    let range = explicit.or(result.observed_range)?;
    result.stamp_date_range(range);
    log::debug!(
        "Stamped {} aggregates with {} to {}",
        result.per_neighborhood.len(),
        range.start,
        range.end
    );
    Some(range)
}

fn log_summary(result: &AggregationResult) {
    log::info!(
        "Aggregated {} incidents ({}): {} mapped ({:.1}%), {} unmapped, {} invalid coordinates, {} unclassified",
        result.total_processed(),
        result.source,
        result.mapped_count,
        result.percent_mapped(),
        result.unmapped_count,
        result.invalid_coordinate_count,
        result.unclassified_count,
    );
}
