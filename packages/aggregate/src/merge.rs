//! Merging of aggregates produced from independent incident sources.
//!
//! Counters are summed per neighborhood and date ranges widened to the
//! earliest start and latest end. A neighborhood missing from one input
//! counts as zero there. Summation is commutative, so input order never
//! changes the counts.

use std::collections::BTreeMap;

use safety_map_aggregate_models::{
    AggregationResult, DataSource, NeighborhoodAggregate, union_ranges,
};

/// Merges per-neighborhood aggregate maps into one map tagged
/// [`DataSource::Combined`].
#[must_use]
pub fn merge(
    aggregates: &[BTreeMap<String, NeighborhoodAggregate>],
) -> BTreeMap<String, NeighborhoodAggregate> {
    let mut merged: BTreeMap<String, NeighborhoodAggregate> = BTreeMap::new();

    for source in aggregates {
        for (name, aggregate) in source {
            merged
                .entry(name.clone())
                .or_insert_with(|| NeighborhoodAggregate::new(name.as_str(), DataSource::Combined))
                .absorb(aggregate);
        }
    }

    for aggregate in merged.values_mut() {
        aggregate.source = DataSource::Combined;
    }

    merged
}

/// Merges whole aggregation results, summing the run-level counters as
/// well as the per-neighborhood aggregates. The result is tagged
/// [`DataSource::Combined`].
#[must_use]
pub fn merge_results(results: &[AggregationResult]) -> AggregationResult {
    let maps: Vec<BTreeMap<String, NeighborhoodAggregate>> = results
        .iter()
        .map(|result| result.per_neighborhood.clone())
        .collect();

    let mut merged = AggregationResult::empty(DataSource::Combined);
    merged.per_neighborhood = merge(&maps);
    for result in results {
        add_counters(&mut merged, result);
    }

    log::debug!(
        "Merged {} results: {} neighborhoods, {} incidents processed",
        results.len(),
        merged.per_neighborhood.len(),
        merged.total_processed()
    );

    merged
}

/// Folds a partial result from the same source into `target`, keeping the
/// target's source tag. Used to combine shard partials.
pub(crate) fn absorb_partial(target: &mut AggregationResult, partial: &AggregationResult) {
    let source = target.source;
    for (name, aggregate) in &partial.per_neighborhood {
        target
            .per_neighborhood
            .entry(name.clone())
            .or_insert_with(|| NeighborhoodAggregate::new(name.as_str(), source))
            .absorb(aggregate);
    }
    add_counters(target, partial);
}

fn add_counters(target: &mut AggregationResult, other: &AggregationResult) {
    target.mapped_count += other.mapped_count;
    target.unmapped_count += other.unmapped_count;
    target.invalid_coordinate_count += other.invalid_coordinate_count;
    target.unclassified_count += other.unclassified_count;
    target.observed_range = union_ranges(target.observed_range, other.observed_range);
}
