#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Crime category types and the raw incident record.
//!
//! This crate defines the closed set of tracked crime categories used
//! across the safety pipeline, a per-category value container, and the
//! [`RawIncident`] shape produced by upstream fetchers. Incidents that fit
//! no category are represented as `Option<CrimeCategory>::None` and are
//! counted toward totals only.

use serde::{Deserialize, Deserializer, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Tracked crime categories.
///
/// Variant order is the classification priority order: when an incident
/// description matches keywords from several categories, the earliest
/// variant wins.
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
pub enum CrimeCategory {
    /// Crimes against persons (homicide, assault, robbery, sexual assault)
    Violent,
    /// Theft of or from a motor vehicle
    CarTheft,
    /// Burglary of a residence or business
    BreakIn,
    /// Larceny, shoplifting, pickpocketing and other non-vehicle theft
    PettyTheft,
}

impl CrimeCategory {
    /// Returns all variants of this enum in priority order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Violent, Self::CarTheft, Self::BreakIn, Self::PettyTheft]
    }
}

/// One value per [`CrimeCategory`].
///
/// Used for raw counts (`CategoryValues<u64>`), rates
/// (`CategoryValues<Option<f64>>`), percentiles and ratios so that every
/// consumer is forced to handle all four categories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryValues<T> {
    /// Violent crime value.
    pub violent: T,
    /// Car theft value.
    pub car_theft: T,
    /// Break-in value.
    pub break_in: T,
    /// Petty theft value.
    pub petty_theft: T,
}

impl<T> CategoryValues<T> {
    /// Builds a value set by evaluating `f` once per category.
    pub fn from_fn(mut f: impl FnMut(CrimeCategory) -> T) -> Self {
        Self {
            violent: f(CrimeCategory::Violent),
            car_theft: f(CrimeCategory::CarTheft),
            break_in: f(CrimeCategory::BreakIn),
            petty_theft: f(CrimeCategory::PettyTheft),
        }
    }

    /// Returns the value for `category`.
    #[must_use]
    pub const fn get(&self, category: CrimeCategory) -> &T {
        match category {
            CrimeCategory::Violent => &self.violent,
            CrimeCategory::CarTheft => &self.car_theft,
            CrimeCategory::BreakIn => &self.break_in,
            CrimeCategory::PettyTheft => &self.petty_theft,
        }
    }

    /// Returns a mutable reference to the value for `category`.
    pub const fn get_mut(&mut self, category: CrimeCategory) -> &mut T {
        match category {
            CrimeCategory::Violent => &mut self.violent,
            CrimeCategory::CarTheft => &mut self.car_theft,
            CrimeCategory::BreakIn => &mut self.break_in,
            CrimeCategory::PettyTheft => &mut self.petty_theft,
        }
    }

    /// Maps every value through `f`, keeping the category association.
    pub fn map<U>(&self, mut f: impl FnMut(CrimeCategory, &T) -> U) -> CategoryValues<U> {
        CategoryValues::from_fn(|category| f(category, self.get(category)))
    }

    /// Iterates `(category, value)` pairs in priority order.
    pub fn iter(&self) -> impl Iterator<Item = (CrimeCategory, &T)> {
        CrimeCategory::all()
            .iter()
            .map(move |&category| (category, self.get(category)))
    }
}

impl CategoryValues<u64> {
    /// Sum of all category counts.
    #[must_use]
    pub const fn sum(&self) -> u64 {
        self.violent + self.car_theft + self.break_in + self.petty_theft
    }

    /// Adds another count set to this one, category by category.
    pub const fn accumulate(&mut self, other: &Self) {
        self.violent += other.violent;
        self.car_theft += other.car_theft;
        self.break_in += other.break_in;
        self.petty_theft += other.petty_theft;
    }
}

/// One reported crime as delivered by an upstream fetcher.
///
/// Nothing here is validated. Coordinates and the crime code arrive as the
/// source delivered them (the LAPD open-data feed uses strings, and `0`/`0`
/// for incidents it could not geocode); aggregation decides whether the
/// record is usable. Field aliases accept the LAPD column names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawIncident {
    /// Original incident ID from the data source.
    #[serde(default, alias = "dr_no", deserialize_with = "lenient_string")]
    pub source_incident_id: Option<String>,
    /// Source-specific crime classification code (e.g. LAPD `crm_cd`).
    #[serde(default, alias = "crm_cd", deserialize_with = "lenient_string")]
    pub crime_code: Option<String>,
    /// Free-text crime description (e.g. "BATTERY - SIMPLE ASSAULT").
    #[serde(default, alias = "crm_cd_desc")]
    pub description: Option<String>,
    /// Occurrence timestamp as delivered by the source.
    #[serde(default, alias = "date_occ")]
    pub occurred_at: Option<String>,
    /// Latitude (WGS84) as delivered by the source.
    #[serde(default, alias = "lat", deserialize_with = "lenient_string")]
    pub latitude: Option<String>,
    /// Longitude (WGS84) as delivered by the source.
    #[serde(default, alias = "lon", deserialize_with = "lenient_string")]
    pub longitude: Option<String>,
    /// Source-specific area label (e.g. LAPD division name).
    #[serde(default, alias = "area_name")]
    pub area_label: Option<String>,
}

impl RawIncident {
    /// Creates an incident with a code, description and coordinate strings.
    #[must_use]
    pub fn new(code: &str, description: Option<&str>, latitude: &str, longitude: &str) -> Self {
        Self {
            crime_code: Some(code.to_string()),
            description: description.map(str::to_string),
            latitude: Some(latitude.to_string()),
            longitude: Some(longitude.to_string()),
            ..Self::default()
        }
    }

    /// Sets the occurrence timestamp.
    #[must_use]
    pub fn with_occurred_at(mut self, occurred_at: &str) -> Self {
        self.occurred_at = Some(occurred_at.to_string());
        self
    }

    /// Sets the source area label.
    #[must_use]
    pub fn with_area_label(mut self, area_label: &str) -> Self {
        self.area_label = Some(area_label.to_string());
        self
    }
}

/// Accepts a JSON string or number (or null) for fields that some feeds
/// deliver as numbers and others as strings.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Integer(i64),
        Float(f64),
    }

    Ok(
        Option::<StringOrNumber>::deserialize(deserializer)?.map(|value| match value {
            StringOrNumber::String(s) => s,
            StringOrNumber::Integer(i) => i.to_string(),
            StringOrNumber::Float(f) => f.to_string(),
        }),
    )
}
