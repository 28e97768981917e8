//! Code table definitions.
//!
//! A code table maps source-specific crime codes to categories and lists
//! the description keywords used when a code is unknown. Tables are plain
//! TOML so alternate tables can be injected by callers and tests; the LAPD
//! table ships embedded in the binary.

use safety_map_crime_models::CrimeCategory;
use serde::Deserialize;

/// Embedded LAPD code table.
pub const LAPD_TABLE: &str = include_str!("../tables/lapd.toml");

/// A code table as written in TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct CodeTableDefinition {
    /// Unique table identifier (e.g. `"lapd"`).
    pub id: String,
    /// Human-readable table name.
    pub name: String,
    /// Width that codes are left-zero-padded to before lookup.
    pub code_width: usize,
    /// Codes per category.
    #[serde(default)]
    pub codes: CategoryLists,
    /// Description keywords per category.
    #[serde(default)]
    pub keywords: CategoryLists,
}

/// One string list per crime category, keyed by the snake-case category
/// name in TOML.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryLists {
    /// Violent crime entries.
    #[serde(default)]
    pub violent: Vec<String>,
    /// Car theft entries.
    #[serde(default)]
    pub car_theft: Vec<String>,
    /// Break-in entries.
    #[serde(default)]
    pub break_in: Vec<String>,
    /// Petty theft entries.
    #[serde(default)]
    pub petty_theft: Vec<String>,
}

impl CategoryLists {
    /// Returns the list for `category`.
    #[must_use]
    pub fn get(&self, category: CrimeCategory) -> &[String] {
        match category {
            CrimeCategory::Violent => &self.violent,
            CrimeCategory::CarTheft => &self.car_theft,
            CrimeCategory::BreakIn => &self.break_in,
            CrimeCategory::PettyTheft => &self.petty_theft,
        }
    }
}

/// Parses a code table definition from TOML.
///
/// # Errors
///
/// Returns a [`toml::de::Error`] if the TOML is malformed or missing
/// required fields.
pub fn parse_definition(toml_str: &str) -> Result<CodeTableDefinition, toml::de::Error> {
    toml::de::from_str(toml_str)
}
