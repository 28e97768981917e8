//! File loaders for incidents, boundaries, population and code tables.
//!
//! Incident files are CSV or JSON, picked by extension. Rows are read
//! leniently: a row that cannot be read at all is kept as an empty
//! incident so aggregation counts it as invalid rather than losing it.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use safety_map_classifier::Classifier;
use safety_map_crime_models::RawIncident;
use safety_map_enrich_models::{PopulationConfidence, PopulationRecord, PopulationTable};
use safety_map_spatial::BoundarySet;
use serde::Deserialize;

use crate::PipelineError;

/// Reads a whole file to a string, naming the path on failure.
///
/// # Errors
///
/// Returns [`PipelineError::Read`] if the file cannot be read.
pub fn read_file(path: &Path) -> Result<String, PipelineError> {
    std::fs::read_to_string(path).map_err(|source| PipelineError::Read {
        path: path.display().to_string(),
        source,
    })
}

fn open_file(path: &Path) -> Result<BufReader<File>, PipelineError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| PipelineError::Read {
            path: path.display().to_string(),
            source,
        })
}

/// Loads incidents from a `.csv` or `.json` file.
///
/// # Errors
///
/// Returns [`PipelineError`] if the file cannot be read, the extension is
/// not recognized, or the file is not a CSV table or JSON array.
pub fn load_incidents(path: &Path) -> Result<Vec<RawIncident>, PipelineError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    let incidents = match extension.as_deref() {
        Some("csv") => parse_incidents_csv(open_file(path)?)?,
        Some("json") => parse_incidents_json(open_file(path)?)?,
        _ => {
            return Err(PipelineError::UnsupportedFormat {
                path: path.display().to_string(),
            });
        }
    };

    log::info!("Loaded {} incidents from {}", incidents.len(), path.display());
    Ok(incidents)
}

/// Parses a JSON array of incident objects.
///
/// Elements are read one at a time; an element that does not fit the
/// incident shape (an object-valued field, a boolean latitude, a bare
/// string) is kept as an empty incident, as with unreadable CSV rows.
///
/// # Errors
///
/// Returns [`PipelineError::Json`] if the input is not valid JSON or not
/// an array.
pub fn parse_incidents_json(reader: impl Read) -> Result<Vec<RawIncident>, PipelineError> {
    let values: Vec<serde_json::Value> = serde_json::from_reader(reader)?;

    let mut incidents = Vec::with_capacity(values.len());
    let mut unreadable = 0_u64;

    for (index, value) in values.into_iter().enumerate() {
        match serde_json::from_value::<RawIncident>(value) {
            Ok(incident) => incidents.push(incident),
            Err(e) => {
                log::debug!("Unreadable incident record {index}: {e}");
                unreadable += 1;
                incidents.push(RawIncident::default());
            }
        }
    }

    if unreadable > 0 {
        log::warn!("{unreadable} incident records could not be read and will count as invalid");
    }

    Ok(incidents)
}

/// Parses a CSV table of incidents with a header row.
///
/// Headers are trimmed; headers containing spaces or written in upper case
/// (as in the LAPD export, e.g. `Crm Cd`, `LAT`) are lowercased with
/// underscores so they match the field aliases.
///
/// # Errors
///
/// Returns [`PipelineError::Csv`] if the header row cannot be read.
pub fn parse_incidents_csv(reader: impl Read) -> Result<Vec<RawIncident>, PipelineError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

    let headers: csv::StringRecord = reader.headers()?.iter().map(normalize_header).collect();
    reader.set_headers(headers);

    let mut incidents = Vec::new();
    let mut unreadable = 0_u64;

    for (row, result) in reader.deserialize::<RawIncident>().enumerate() {
        match result {
            Ok(incident) => incidents.push(incident),
            Err(e) => {
                log::debug!("Unreadable incident row {}: {e}", row + 1);
                unreadable += 1;
                incidents.push(RawIncident::default());
            }
        }
    }

    if unreadable > 0 {
        log::warn!("{unreadable} incident rows could not be read and will count as invalid");
    }

    Ok(incidents)
}

fn normalize_header(header: &str) -> String {
    let header = header.trim();
    let shouting = header.chars().any(char::is_alphabetic)
        && !header.chars().any(char::is_lowercase);
    if header.contains(char::is_whitespace) || shouting {
        header
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_")
            .to_lowercase()
    } else {
        header.to_string()
    }
}

#[derive(Debug, Deserialize)]
struct PopulationRow {
    name: String,
    #[serde(default)]
    population: Option<String>,
    #[serde(default)]
    area_sq_mi: Option<String>,
    #[serde(default)]
    confidence: Option<String>,
}

/// Population rows whose name matches no boundary. Their populations
/// never reach an enriched record, which usually means a spelling
/// mismatch between the two reference files.
#[must_use]
pub fn unmatched_population<'a>(
    population: &'a PopulationTable,
    boundaries: &BoundarySet,
) -> Vec<&'a str> {
    population
        .keys()
        .filter(|name| boundaries.get(name).is_none())
        .map(String::as_str)
        .collect()
}

/// Loads a population CSV (`name,population,area_sq_mi,confidence`).
///
/// # Errors
///
/// Returns [`PipelineError`] if the file cannot be read or has no usable
/// header row.
pub fn load_population(path: &Path) -> Result<PopulationTable, PipelineError> {
    let table = parse_population_csv(open_file(path)?)?;
    log::info!(
        "Loaded population for {} neighborhoods from {}",
        table.len(),
        path.display()
    );
    Ok(table)
}

/// Parses population rows.
///
/// Rows with a missing or unparseable population are skipped with a
/// warning, which leaves that neighborhood without population data.
/// Thousands separators are accepted. A missing confidence means `high`;
/// an unrecognized one is downgraded to `low`.
///
/// # Errors
///
/// Returns [`PipelineError::Csv`] if the header row cannot be read.
pub fn parse_population_csv(reader: impl Read) -> Result<PopulationTable, PipelineError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: csv::StringRecord = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();
    reader.set_headers(headers);

    let mut table = BTreeMap::new();

    for (row, result) in reader.deserialize::<PopulationRow>().enumerate() {
        let line = row + 2;
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                log::warn!("Skipping population row {line}: {e}");
                continue;
            }
        };

        if record.name.is_empty() {
            log::warn!("Skipping population row {line}: empty name");
            continue;
        }

        let Some(population) = record.population.as_deref().and_then(parse_count) else {
            log::warn!(
                "Skipping population row {line} ({}): unparseable population {:?}",
                record.name,
                record.population
            );
            continue;
        };

        let area_sq_mi = record
            .area_sq_mi
            .as_deref()
            .filter(|s| !s.is_empty())
            .and_then(|s| s.replace(',', "").parse::<f64>().ok())
            .filter(|a| a.is_finite() && *a > 0.0);

        let confidence = match record.confidence.as_deref().filter(|s| !s.is_empty()) {
            None => PopulationConfidence::default(),
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                log::warn!(
                    "Unknown population confidence {raw:?} for {}, using low",
                    record.name
                );
                PopulationConfidence::Low
            }),
        };

        let name = record.name.clone();
        let previous = table.insert(
            name.clone(),
            PopulationRecord {
                name: record.name,
                population,
                area_sq_mi,
                confidence,
            },
        );
        if previous.is_some() {
            log::warn!("Duplicate population row for {name}; keeping the last one");
        }
    }

    Ok(table)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn parse_count(raw: &str) -> Option<u64> {
    let cleaned = raw.trim().replace(',', "");
    cleaned.parse::<u64>().ok().or_else(|| {
        cleaned
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map(|v| v.round() as u64)
    })
}

/// Loads neighborhood boundaries from a `GeoJSON` file.
///
/// # Errors
///
/// Returns [`PipelineError`] if the file cannot be read, or
/// [`PipelineError::Spatial`] if any boundary is malformed.
pub fn load_boundaries(path: &Path, name_field: &str) -> Result<BoundarySet, PipelineError> {
    let contents = read_file(path)?;
    Ok(BoundarySet::from_geojson(&contents, name_field)?)
}

/// Loads a crime code table, or the embedded LAPD table when `path` is
/// `None`.
///
/// # Errors
///
/// Returns [`PipelineError`] if the file cannot be read, or
/// [`PipelineError::Classifier`] if the table is invalid.
pub fn load_classifier(path: Option<&Path>) -> Result<Classifier, PipelineError> {
    let Some(path) = path else {
        return Ok(Classifier::lapd());
    };
    let classifier = Classifier::from_toml(&read_file(path)?)?;
    log::info!(
        "Loaded code table '{}' ({} codes) from {}",
        classifier.id(),
        classifier.code_count(),
        path.display()
    );
    Ok(classifier)
}
