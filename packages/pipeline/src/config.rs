//! Run configuration, read from TOML.
//!
//! Every field has a default, so an empty file (or no file at all) is a
//! valid configuration:
//!
//! ```toml
//! as_of = "2024-06-01"
//! default_period_weeks = 4.0
//! boundary_name_field = "name"
//! shards = 4
//!
//! [date_range]
//! start = "2024-01-01"
//! end = "2024-05-31"
//!
//! [quality]
//! sufficient_threshold = 70
//! ```

use std::path::Path;

use chrono::NaiveDate;
use safety_map_aggregate_models::DateRange;
use safety_map_enrich::EnrichmentContext;
use safety_map_enrich::quality::QualityPolicy;
use serde::{Deserialize, Serialize};

use crate::PipelineError;

/// Settings for one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Reference date for staleness. Callers fall back to today.
    pub as_of: Option<NaiveDate>,
    /// Period the incidents cover. Defaults to the observed occurrence
    /// range.
    pub date_range: Option<DateRange>,
    /// Period length when no date range is known.
    pub default_period_weeks: f64,
    /// `GeoJSON` property holding the neighborhood name.
    pub boundary_name_field: String,
    /// Parallel aggregation shards per source.
    pub shards: usize,
    /// Data-quality penalties.
    pub quality: QualityPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            as_of: None,
            date_range: None,
            default_period_weeks: 1.0,
            boundary_name_field: "name".to_string(),
            shards: 1,
            quality: QualityPolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Parses a TOML configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Toml`] if the TOML is malformed or a value
    /// has the wrong type.
    pub fn from_toml(toml_str: &str) -> Result<Self, PipelineError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Reads a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let contents = crate::load::read_file(path)?;
        let config = Self::from_toml(&contents)?;
        log::debug!("Loaded pipeline config from {}", path.display());
        Ok(config)
    }

    /// Reference date: the configured one, else `today`.
    #[must_use]
    pub fn resolve_as_of(&self, today: NaiveDate) -> NaiveDate {
        self.as_of.unwrap_or(today)
    }

    /// Enrichment settings for a run as of `as_of`.
    #[must_use]
    pub fn enrichment_context(&self, as_of: NaiveDate) -> EnrichmentContext {
        EnrichmentContext::new(as_of)
            .with_default_period_weeks(self.default_period_weeks)
            .with_quality(self.quality.clone())
    }
}
