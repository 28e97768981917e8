#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! End-to-end neighborhood safety pipeline.
//!
//! Wires the stages together: every incident source is aggregated against
//! the shared boundaries and code table, several sources are merged into a
//! combined aggregate, the covered period is stamped, and the aggregates
//! are enriched into a [`RunReport`].
//!
//! Loading reference data and incidents from files lives in [`load`];
//! run settings in [`config`].

pub mod config;
pub mod load;

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use safety_map_aggregate::progress::{ProgressCallback, null_progress};
use safety_map_aggregate::{Aggregator, merge_results, stamp_date_range};
use safety_map_aggregate_models::{AggregationResult, DataSource};
use safety_map_classifier::{Classifier, ClassifierError};
use safety_map_crime_models::RawIncident;
use safety_map_enrich::enrich_all;
use safety_map_enrich_models::{EnrichedNeighborhoodRecord, PopulationTable, RunMetadata};
use safety_map_spatial::{BoundarySet, SpatialError};
use serde::{Deserialize, Serialize};

pub use config::PipelineConfig;

/// Errors that abort a pipeline run.
///
/// Only configuration and reference data problems are errors; bad incident
/// records are counted, never raised.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// Path that failed.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// I/O error while writing output.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV could not be parsed.
    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON could not be parsed or written.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration TOML is invalid.
    #[error("invalid configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// Boundary reference data is malformed.
    #[error(transparent)]
    Spatial(#[from] SpatialError),

    /// The crime code table is malformed.
    #[error(transparent)]
    Classifier(#[from] ClassifierError),

    /// An incident file has an unrecognized extension.
    #[error("unsupported incident file format: {path} (expected .csv or .json)")]
    UnsupportedFormat {
        /// Offending path.
        path: String,
    },
}

/// Read-only reference data shared by every source of a run.
pub struct ReferenceData {
    /// Crime code table.
    pub classifier: Classifier,
    /// Neighborhood boundaries in priority order.
    pub boundaries: BoundarySet,
    /// Population keyed by neighborhood name.
    pub population: PopulationTable,
}

impl ReferenceData {
    /// Loads boundaries, population and the code table from files. The
    /// embedded LAPD table is used when `codes` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if any file is unreadable or malformed.
    pub fn load(
        boundaries: &Path,
        population: &Path,
        codes: Option<&Path>,
        config: &PipelineConfig,
    ) -> Result<Self, PipelineError> {
        let reference = Self {
            classifier: load::load_classifier(codes)?,
            boundaries: load::load_boundaries(boundaries, &config.boundary_name_field)?,
            population: load::load_population(population)?,
        };

        for name in load::unmatched_population(&reference.population, &reference.boundaries) {
            log::warn!("Population row '{name}' matches no boundary and will be ignored");
        }

        Ok(reference)
    }
}

/// Output of a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    /// One record per neighborhood, keyed by name.
    pub neighborhoods: BTreeMap<String, EnrichedNeighborhoodRecord>,
    /// Run-level counters.
    pub metadata: RunMetadata,
}

impl RunReport {
    /// Writes the report as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if serialization or the write fails.
    pub fn write_json(&self, mut writer: impl Write) -> Result<(), PipelineError> {
        serde_json::to_writer_pretty(&mut writer, self)?;
        writeln!(writer)?;
        writer.flush()?;
        Ok(())
    }
}

/// Runs the pipeline over a single incident source.
#[must_use]
pub fn run(
    incidents: &[RawIncident],
    reference: &ReferenceData,
    config: &PipelineConfig,
    as_of: NaiveDate,
) -> RunReport {
    run_sources(&[incidents], reference, config, as_of)
}

/// Runs the pipeline over several incident sources.
///
/// The first source is tagged primary, the others secondary; with more
/// than one source the merged output is tagged combined.
#[must_use]
pub fn run_sources(
    sources: &[&[RawIncident]],
    reference: &ReferenceData,
    config: &PipelineConfig,
    as_of: NaiveDate,
) -> RunReport {
    run_sources_with_progress(sources, reference, config, as_of, &|_| null_progress())
}

/// [`run_sources`], reporting the aggregation of each source to the
/// reporter `progress` returns for its index.
#[must_use]
pub fn run_sources_with_progress(
    sources: &[&[RawIncident]],
    reference: &ReferenceData,
    config: &PipelineConfig,
    as_of: NaiveDate,
    progress: &dyn Fn(usize) -> Arc<dyn ProgressCallback>,
) -> RunReport {
    let mut result = aggregate_sources(sources, reference, config, progress);
    let date_range = stamp_date_range(&mut result, config.date_range);
    if date_range.is_none() {
        log::warn!(
            "No date range known; rates assume a {}-week period",
            config.default_period_weeks
        );
    }

    let context = config.enrichment_context(as_of);
    let neighborhoods = enrich_all(&result.per_neighborhood, &reference.population, &context);
    let metadata = RunMetadata::from_result(&result, date_range, as_of);

    log::info!(
        "Run complete: {} neighborhoods, {} of {} incidents mapped ({:.1}%)",
        metadata.neighborhood_count,
        metadata.mapped_count,
        metadata.total_processed,
        metadata.percent_mapped
    );

    RunReport {
        neighborhoods,
        metadata,
    }
}

fn aggregate_sources(
    sources: &[&[RawIncident]],
    reference: &ReferenceData,
    config: &PipelineConfig,
    progress: &dyn Fn(usize) -> Arc<dyn ProgressCallback>,
) -> AggregationResult {
    let mut results: Vec<AggregationResult> = sources
        .iter()
        .enumerate()
        .map(|(index, incidents)| {
            let source = if index == 0 {
                DataSource::Primary
            } else {
                DataSource::Secondary
            };
            Aggregator::new(&reference.classifier, &reference.boundaries)
                .with_source(source)
                .aggregate_sharded(incidents, config.shards, progress(index).as_ref())
        })
        .collect();

    if results.len() > 1 {
        return merge_results(&results);
    }
    results.pop().unwrap_or_else(|| {
        AggregationResult::with_neighborhoods(reference.boundaries.names(), DataSource::Primary)
    })
}

#[cfg(test)]
mod tests {
    use safety_map_aggregate_models::DateRange;
    use safety_map_enrich_models::{PopulationConfidence, PopulationRecord, SafetyGrade};
    use safety_map_spatial::NeighborhoodBoundary;

    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn square(name: &str, lon: f64, lat: f64, size: f64) -> NeighborhoodBoundary {
        NeighborhoodBoundary::new(
            name,
            vec![
                [lon, lat],
                [lon, lat + size],
                [lon + size, lat + size],
                [lon + size, lat],
            ],
        )
        .unwrap()
    }

    fn reference() -> ReferenceData {
        let population = [("Hollywood", 85_000), ("Venice", 40_000)]
            .into_iter()
            .map(|(name, population)| {
                (
                    name.to_string(),
                    PopulationRecord {
                        name: name.to_string(),
                        population,
                        area_sq_mi: None,
                        confidence: PopulationConfidence::High,
                    },
                )
            })
            .collect();

        ReferenceData {
            classifier: Classifier::lapd(),
            boundaries: BoundarySet::new(vec![
                square("Hollywood", -118.36, 34.08, 0.04),
                square("Venice", -118.48, 33.98, 0.03),
                square("Westwood", -118.45, 34.05, 0.02),
            ])
            .unwrap(),
            population,
        }
    }

    fn hollywood(code: &str, date: &str) -> RawIncident {
        RawIncident::new(code, None, "34.10", "-118.33").with_occurred_at(date)
    }

    fn venice(code: &str, date: &str) -> RawIncident {
        RawIncident::new(code, None, "33.99", "-118.46").with_occurred_at(date)
    }

    #[test]
    fn end_to_end_single_source() {
        let incidents = vec![
            RawIncident::new("624", Some("BATTERY - SIMPLE ASSAULT"), "34.10", "-118.33")
                .with_occurred_at("2024-01-01T00:00:00.000"),
            RawIncident::new("624", Some("BATTERY - SIMPLE ASSAULT"), "0", "0"),
        ];
        let report = run(
            &incidents,
            &reference(),
            &PipelineConfig::default(),
            day(2024, 1, 15),
        );

        let hollywood = &report.neighborhoods["Hollywood"];
        assert_eq!(hollywood.total, 1);
        assert_eq!(hollywood.counts.violent, 1);
        assert_eq!(report.metadata.invalid_coordinate_count, 1);
        assert_eq!(report.metadata.mapped_count, 1);
        assert_eq!(report.metadata.total_processed, 2);
        assert!((report.metadata.percent_mapped - 50.0).abs() < f64::EPSILON);
        assert_eq!(report.metadata.source, DataSource::Primary);
        assert_eq!(
            report.metadata.date_range,
            Some(DateRange::single(day(2024, 1, 1)))
        );
    }

    #[test]
    fn malformed_json_records_count_as_invalid() {
        let incidents = load::parse_incidents_json(
            r#"[
                {"crm_cd": "0310", "lat": "34.10", "lon": "-118.33"},
                {"crm_cd": "624", "lat": true, "lon": "-118.33"},
                {"crm_cd": "624", "lat": "34.10", "lon": "-118.33"}
            ]"#
            .as_bytes(),
        )
        .unwrap();
        let report = run(
            &incidents,
            &reference(),
            &PipelineConfig::default(),
            day(2024, 1, 15),
        );

        let hollywood = &report.neighborhoods["Hollywood"];
        assert_eq!(hollywood.total, 2);
        assert_eq!(hollywood.counts.break_in, 1);
        assert_eq!(hollywood.counts.violent, 1);
        assert_eq!(report.metadata.total_processed, 3);
        assert_eq!(report.metadata.mapped_count, 2);
        assert_eq!(report.metadata.invalid_coordinate_count, 1);
    }

    #[test]
    fn every_boundary_gets_a_record() {
        let report = run(&[], &reference(), &PipelineConfig::default(), day(2024, 1, 1));
        assert_eq!(report.neighborhoods.len(), 3);
        let westwood = &report.neighborhoods["Westwood"];
        assert_eq!(westwood.total, 0);
        assert_eq!(westwood.population, None);
        assert_eq!(westwood.safety_score, None);
        assert!(!westwood.has_sufficient_data);
        assert_eq!(report.metadata.date_range, None);
    }

    #[test]
    fn explicit_date_range_wins() {
        let incidents = vec![hollywood("624", "2024-03-10")];
        let range = DateRange::new(day(2024, 1, 1), day(2024, 12, 29));
        let config = PipelineConfig {
            date_range: Some(range),
            ..PipelineConfig::default()
        };
        let report = run(&incidents, &reference(), &config, day(2025, 1, 1));
        assert_eq!(report.metadata.date_range, Some(range));
        assert!(
            report
                .neighborhoods
                .values()
                .all(|r| r.date_range == Some(range))
        );
        // One violent incident a year over 85,000 residents.
        assert_eq!(report.neighborhoods["Hollywood"].rates.violent, Some(0.01));
    }

    #[test]
    fn merges_sources_as_combined() {
        let recent = vec![
            hollywood("624", "2024-05-01"),
            hollywood("510", "2024-05-02"),
            venice("440", "2024-05-03"),
        ];
        let older = vec![hollywood("310", "2019-06-01"), venice("624", "2019-07-01")];

        let report = run_sources(
            &[recent.as_slice(), older.as_slice()],
            &reference(),
            &PipelineConfig::default(),
            day(2024, 6, 1),
        );

        assert_eq!(report.metadata.source, DataSource::Combined);
        assert_eq!(report.metadata.mapped_count, 5);
        assert_eq!(
            report.metadata.date_range,
            Some(DateRange::new(day(2019, 6, 1), day(2024, 5, 3)))
        );

        let hollywood = &report.neighborhoods["Hollywood"];
        assert_eq!(hollywood.source, DataSource::Combined);
        assert_eq!(hollywood.counts.violent, 1);
        assert_eq!(hollywood.counts.car_theft, 1);
        assert_eq!(hollywood.counts.break_in, 1);
        assert_eq!(report.neighborhoods["Venice"].total, 2);
        assert_eq!(report.neighborhoods.len(), 3);
    }

    #[test]
    fn source_order_does_not_change_counts() {
        let a = vec![hollywood("624", "2024-05-01"), venice("440", "2024-05-03")];
        let b = vec![hollywood("310", "2019-06-01")];
        let reference = reference();
        let config = PipelineConfig::default();

        let ab = run_sources(&[a.as_slice(), b.as_slice()], &reference, &config, day(2024, 6, 1));
        let ba = run_sources(&[b.as_slice(), a.as_slice()], &reference, &config, day(2024, 6, 1));
        assert_eq!(ab.neighborhoods, ba.neighborhoods);
    }

    #[test]
    fn sharded_run_matches_sequential() {
        let incidents: Vec<RawIncident> = (0..50)
            .map(|i| {
                if i % 3 == 0 {
                    venice("440", "2024-04-01")
                } else {
                    hollywood("624", "2024-04-02")
                }
            })
            .collect();
        let reference = reference();
        let sequential = run(&incidents, &reference, &PipelineConfig::default(), day(2024, 6, 1));
        let sharded = run(
            &incidents,
            &reference,
            &PipelineConfig {
                shards: 4,
                ..PipelineConfig::default()
            },
            day(2024, 6, 1),
        );
        assert_eq!(sequential, sharded);
    }

    #[test]
    fn writes_report_json() {
        let report = run(&[], &reference(), &PipelineConfig::default(), day(2024, 1, 1));
        let mut buffer = Vec::new();
        report.write_json(&mut buffer).unwrap();
        let parsed: RunReport = serde_json::from_slice(&buffer).unwrap();
        assert_eq!(parsed, report);
    }

    #[test]
    fn report_serializes_camel_case() {
        let incidents: Vec<RawIncident> = (0..20).map(|_| hollywood("624", "2024-05-20")).collect();
        let report = run(&incidents, &reference(), &PipelineConfig::default(), day(2024, 6, 1));
        let json = serde_json::to_value(&report).unwrap();
        let hollywood = &json["neighborhoods"]["Hollywood"];
        assert_eq!(hollywood["counts"]["violent"], 20);
        assert!(hollywood["safetyScore"].is_number());
        assert!(hollywood["hasSufficientData"].as_bool().unwrap());
        assert!(json["neighborhoods"]["Westwood"]["totalRate"].is_null());
        assert_eq!(json["metadata"]["mappedCount"], 20);
        assert_eq!(
            report.neighborhoods["Hollywood"].grade,
            report.neighborhoods["Hollywood"]
                .safety_score
                .map(SafetyGrade::from_score)
        );
    }
}
