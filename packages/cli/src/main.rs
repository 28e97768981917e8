#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the neighborhood safety pipeline.
//!
//! Uses `indicatif-log-bridge` (via [`progress::init_logger`]) to route
//! `log` output through `indicatif::MultiProgress` so that log lines and
//! the aggregation progress bars never fight for the terminal.

mod progress;

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use indicatif::MultiProgress;
use safety_map_pipeline::{PipelineConfig, ReferenceData, RunReport, load};

use crate::progress::IndicatifProgress;

#[derive(Parser)]
#[command(name = "safety_map", about = "Neighborhood crime safety pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify, aggregate and enrich incidents into per-neighborhood
    /// safety profiles
    Run {
        /// Incident files (`.csv` or `.json`). The first is the primary
        /// source; any others are merged in as secondary sources.
        #[arg(long, required = true, num_args = 1..)]
        incidents: Vec<PathBuf>,
        /// Neighborhood boundaries (`GeoJSON` `FeatureCollection`)
        #[arg(long)]
        boundaries: PathBuf,
        /// Population CSV (`name,population,area_sq_mi,confidence`)
        #[arg(long)]
        population: PathBuf,
        /// Pipeline configuration TOML
        #[arg(long)]
        config: Option<PathBuf>,
        /// Crime code table TOML (defaults to the embedded LAPD table)
        #[arg(long)]
        codes: Option<PathBuf>,
        /// Reference date for staleness (YYYY-MM-DD). Overrides the config;
        /// defaults to today.
        #[arg(long)]
        as_of: Option<NaiveDate>,
        /// Write the JSON report here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Validate a boundary `GeoJSON` file and list its neighborhoods
    CheckBoundaries {
        /// Boundary file
        path: PathBuf,
        /// Feature property holding the neighborhood name
        #[arg(long, default_value = "name")]
        name_field: String,
        /// Population CSV to cross-check against the boundary names
        #[arg(long)]
        population: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = progress::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            incidents,
            boundaries,
            population,
            config,
            codes,
            as_of,
            output,
        } => {
            let config = match config {
                Some(path) => PipelineConfig::load(&path)?,
                None => PipelineConfig::default(),
            };
            let as_of = as_of.unwrap_or_else(|| config.resolve_as_of(Utc::now().date_naive()));

            run(
                &multi,
                &incidents,
                &boundaries,
                &population,
                codes.as_deref(),
                &config,
                as_of,
                output.as_deref(),
            )?;
        }
        Commands::CheckBoundaries {
            path,
            name_field,
            population,
        } => {
            let boundaries = load::load_boundaries(&path, &name_field)?;
            println!("{:<40} {:>6} {:>8}", "NAME", "RINGS", "VERTICES");
            println!("{}", "-".repeat(56));
            for boundary in boundaries.boundaries() {
                let vertices: usize = boundary.rings().iter().map(Vec::len).sum();
                println!(
                    "{:<40} {:>6} {:>8}",
                    boundary.name(),
                    boundary.rings().len(),
                    vertices
                );
            }
            println!();
            println!("{} boundaries OK", boundaries.len());

            if let Some(population) = population {
                let population = load::load_population(&population)?;
                let unmatched = load::unmatched_population(&population, &boundaries);
                if unmatched.is_empty() {
                    println!("All {} population rows match a boundary", population.len());
                } else {
                    println!();
                    println!("Population rows with no matching boundary:");
                    for name in &unmatched {
                        println!("  {name}");
                    }
                }
            }
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run(
    multi: &MultiProgress,
    incident_paths: &[PathBuf],
    boundaries: &Path,
    population: &Path,
    codes: Option<&Path>,
    config: &PipelineConfig,
    as_of: NaiveDate,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let start = Instant::now();

    let reference = ReferenceData::load(boundaries, population, codes, config)?;

    let sources = incident_paths
        .iter()
        .map(|path| load::load_incidents(path))
        .collect::<Result<Vec<_>, _>>()?;
    let slices: Vec<&[_]> = sources.iter().map(Vec::as_slice).collect();

    let report = safety_map_pipeline::run_sources_with_progress(
        &slices,
        &reference,
        config,
        as_of,
        &|index| {
            let label = incident_paths
                .get(index)
                .map_or_else(String::new, |path| path.display().to_string());
            IndicatifProgress::incidents_bar(multi, &format!("Aggregating {label}"))
        },
    );

    match output {
        Some(path) => {
            report.write_json(BufWriter::new(File::create(path)?))?;
            print_summary(&report);
            log::info!(
                "Wrote report to {} in {:.1}s",
                path.display(),
                start.elapsed().as_secs_f64()
            );
        }
        None => report.write_json(std::io::stdout().lock())?,
    }

    Ok(())
}

fn print_summary(report: &RunReport) {
    println!(
        "{:<32} {:>6} {:>6} {:>6} {:>8} {:>10}",
        "NEIGHBORHOOD", "TOTAL", "SCORE", "GRADE", "QUALITY", "SUFFICIENT"
    );
    println!("{}", "-".repeat(73));

    let mut records: Vec<_> = report.neighborhoods.values().collect();
    records.sort_by(|a, b| {
        b.safety_score
            .cmp(&a.safety_score)
            .then_with(|| a.name.cmp(&b.name))
    });

    for record in records {
        println!(
            "{:<32} {:>6} {:>6} {:>6} {:>8} {:>10}",
            record.name,
            record.total,
            record
                .safety_score
                .map_or_else(|| "-".to_string(), |s| s.to_string()),
            record
                .grade
                .map_or_else(|| "-".to_string(), |g| g.to_string()),
            record.data_quality_score,
            if record.has_sufficient_data { "yes" } else { "no" },
        );
    }

    let metadata = &report.metadata;
    println!();
    println!(
        "{} incidents: {} mapped ({:.2}%), {} unmapped, {} invalid, {} unclassified",
        metadata.total_processed,
        metadata.mapped_count,
        metadata.percent_mapped,
        metadata.unmapped_count,
        metadata.invalid_coordinate_count,
        metadata.unclassified_count
    );
}
