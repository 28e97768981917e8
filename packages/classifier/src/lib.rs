#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Crime classification.
//!
//! Maps a raw incident's crime code to a [`CrimeCategory`] through an
//! explicit code table, falling back to case-insensitive keyword matching
//! on the free-text description. Keyword sets are checked in
//! [`CrimeCategory::all`] order so the highest-priority category wins when
//! a description matches several.

pub mod table;

use std::collections::BTreeMap;

use safety_map_crime_models::{CrimeCategory, RawIncident};

use crate::table::{CodeTableDefinition, LAPD_TABLE, parse_definition};

/// Errors that can occur while building a classifier.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    /// The code table TOML failed to parse.
    #[error("Code table parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A code in the table has no digits.
    #[error("Code table '{table}': code '{code}' contains no digits")]
    EmptyCode {
        /// Table identifier.
        table: String,
        /// The offending code.
        code: String,
    },

    /// The same normalized code is listed under two categories.
    #[error("Code table '{table}': code {code} listed under both {first} and {second}")]
    ConflictingCode {
        /// Table identifier.
        table: String,
        /// The normalized code.
        code: String,
        /// Category the code was first assigned to.
        first: CrimeCategory,
        /// Category that tried to claim it again.
        second: CrimeCategory,
    },

    /// A keyword is empty or whitespace.
    #[error("Code table '{table}': empty keyword under {category}")]
    EmptyKeyword {
        /// Table identifier.
        table: String,
        /// Category holding the empty keyword.
        category: CrimeCategory,
    },

    /// The code width is zero.
    #[error("Code table '{table}': code_width must be at least 1")]
    ZeroWidth {
        /// Table identifier.
        table: String,
    },
}

/// Immutable crime classifier built from a code table.
#[derive(Debug, Clone)]
pub struct Classifier {
    id: String,
    code_width: usize,
    codes: BTreeMap<String, CrimeCategory>,
    /// Lower-cased keywords, in category priority order.
    keywords: Vec<(CrimeCategory, Vec<String>)>,
}

impl Classifier {
    /// Builds a classifier from a parsed code table definition.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifierError`] if the table has a zero code width, a
    /// code without digits, a code claimed by two categories, or an empty
    /// keyword.
    pub fn from_definition(definition: &CodeTableDefinition) -> Result<Self, ClassifierError> {
        if definition.code_width == 0 {
            return Err(ClassifierError::ZeroWidth {
                table: definition.id.clone(),
            });
        }

        let mut codes = BTreeMap::new();
        let mut keywords = Vec::with_capacity(CrimeCategory::all().len());

        for &category in CrimeCategory::all() {
            for raw in definition.codes.get(category) {
                let code = normalize_code(raw, definition.code_width).ok_or_else(|| {
                    ClassifierError::EmptyCode {
                        table: definition.id.clone(),
                        code: raw.clone(),
                    }
                })?;
                if let Some(&first) = codes.get(&code) {
                    return Err(ClassifierError::ConflictingCode {
                        table: definition.id.clone(),
                        code,
                        first,
                        second: category,
                    });
                }
                codes.insert(code, category);
            }

            let mut category_keywords = Vec::new();
            for keyword in definition.keywords.get(category) {
                let keyword = keyword.trim().to_lowercase();
                if keyword.is_empty() {
                    return Err(ClassifierError::EmptyKeyword {
                        table: definition.id.clone(),
                        category,
                    });
                }
                category_keywords.push(keyword);
            }
            keywords.push((category, category_keywords));
        }

        log::debug!(
            "Built classifier '{}' ({}) with {} codes",
            definition.id,
            definition.name,
            codes.len()
        );

        Ok(Self {
            id: definition.id.clone(),
            code_width: definition.code_width,
            codes,
            keywords,
        })
    }

    /// Builds a classifier from code table TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifierError`] if the TOML fails to parse or the table
    /// is invalid (see [`Self::from_definition`]).
    pub fn from_toml(toml_str: &str) -> Result<Self, ClassifierError> {
        Self::from_definition(&parse_definition(toml_str)?)
    }

    /// Returns the classifier for the embedded LAPD code table.
    ///
    /// # Panics
    ///
    /// Panics if the embedded table fails to parse or validate. Since it is
    /// a compile-time constant, a failure indicates a development error and
    /// is caught by tests.
    #[must_use]
    pub fn lapd() -> Self {
        Self::from_toml(LAPD_TABLE)
            .unwrap_or_else(|e| panic!("Failed to load embedded LAPD code table: {e}"))
    }

    /// Returns the code table identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Number of distinct codes in the table.
    #[must_use]
    pub fn code_count(&self) -> usize {
        self.codes.len()
    }

    /// Classifies an incident by code, falling back to its description.
    ///
    /// Malformed codes never fail: they go through [`normalize_code`]
    /// before lookup. Returns `None` when
    /// neither the code nor the description matches (unclassified).
    #[must_use]
    pub fn classify(&self, code: Option<&str>, description: Option<&str>) -> Option<CrimeCategory> {
        code.and_then(|raw| normalize_code(raw, self.code_width))
            .and_then(|normalized| self.codes.get(&normalized).copied())
            .or_else(|| description.and_then(|text| self.classify_description(text)))
    }

    /// Classifies a [`RawIncident`].
    #[must_use]
    pub fn classify_incident(&self, incident: &RawIncident) -> Option<CrimeCategory> {
        self.classify(
            incident.crime_code.as_deref(),
            incident.description.as_deref(),
        )
    }

    /// Matches a description against the keyword lists in priority order.
    #[must_use]
    pub fn classify_description(&self, description: &str) -> Option<CrimeCategory> {
        let lower = description.to_lowercase();
        self.keywords
            .iter()
            .find(|(_, needles)| contains_any(&lower, needles))
            .map(|(category, _)| *category)
    }
}

/// Normalizes a raw crime code: strips every non-digit and leading zeros,
/// then left-pads with zeros to `width`, so `"0310"`, `"310"` and `310`
/// all become `"310"` at width 3. Significant digits beyond `width` are
/// kept whole. Returns `None` if the code contains no digits.
#[must_use]
pub fn normalize_code(raw: &str, width: usize) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    let significant = digits.trim_start_matches('0');
    let significant = if significant.is_empty() { "0" } else { significant };
    Some(format!("{significant:0>width$}"))
}

/// Checks if `haystack` contains any of the given `needles`.
fn contains_any(haystack: &str, needles: &[String]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL_TABLE: &str = r#"
id = "test"
name = "Test table"
code_width = 4

[codes]
violent = ["1"]
break_in = ["0020"]

[keywords]
violent = ["Assault"]
petty_theft = ["theft"]
"#;

    #[test]
    fn maps_lapd_codes() {
        let classifier = Classifier::lapd();
        assert_eq!(
            classifier.classify(Some("624"), None),
            Some(CrimeCategory::Violent)
        );
        assert_eq!(
            classifier.classify(Some("510"), None),
            Some(CrimeCategory::CarTheft)
        );
        assert_eq!(
            classifier.classify(Some("310"), None),
            Some(CrimeCategory::BreakIn)
        );
        assert_eq!(
            classifier.classify(Some("440"), None),
            Some(CrimeCategory::PettyTheft)
        );
    }

    #[test]
    fn normalizes_malformed_codes() {
        assert_eq!(normalize_code("624", 3).as_deref(), Some("624"));
        assert_eq!(normalize_code(" 62-4 ", 3).as_deref(), Some("624"));
        assert_eq!(normalize_code("7", 3).as_deref(), Some("007"));
        assert_eq!(normalize_code("12345", 3).as_deref(), Some("12345"));
        assert_eq!(normalize_code("0310", 3).as_deref(), Some("310"));
        assert_eq!(normalize_code("000624", 3).as_deref(), Some("624"));
        assert_eq!(normalize_code("0000", 3).as_deref(), Some("000"));
        assert_eq!(normalize_code("01234", 3).as_deref(), Some("1234"));
        assert_eq!(normalize_code("abc", 3), None);
        assert_eq!(normalize_code("", 3), None);
    }

    #[test]
    fn padded_codes_match_table() {
        let classifier = Classifier::from_toml(SMALL_TABLE).unwrap();
        assert_eq!(
            classifier.classify(Some("0001"), None),
            Some(CrimeCategory::Violent)
        );
        assert_eq!(
            classifier.classify(Some("20"), None),
            Some(CrimeCategory::BreakIn)
        );
        assert_eq!(
            classifier.classify(Some("CODE#1"), None),
            Some(CrimeCategory::Violent)
        );
    }

    #[test]
    fn extra_leading_zeros_match_table() {
        let classifier = Classifier::lapd();
        assert_eq!(
            classifier.classify(Some("0310"), None),
            Some(CrimeCategory::BreakIn)
        );
        assert_eq!(
            classifier.classify(Some("00624"), None),
            Some(CrimeCategory::Violent)
        );
        assert_eq!(
            classifier.classify(Some("0310"), None),
            classifier.classify(Some("310"), None)
        );
    }

    #[test]
    fn falls_back_to_description() {
        let classifier = Classifier::lapd();
        assert_eq!(
            classifier.classify(Some("999"), Some("BATTERY - SIMPLE ASSAULT")),
            Some(CrimeCategory::Violent)
        );
        assert_eq!(
            classifier.classify(None, Some("Shoplifting - petty theft")),
            Some(CrimeCategory::PettyTheft)
        );
        assert_eq!(
            classifier.classify(Some(""), Some("BURGLARY")),
            Some(CrimeCategory::BreakIn)
        );
    }

    #[test]
    fn code_takes_precedence_over_description() {
        let classifier = Classifier::lapd();
        assert_eq!(
            classifier.classify(Some("510"), Some("ROBBERY")),
            Some(CrimeCategory::CarTheft)
        );
    }

    #[test]
    fn keyword_priority_order() {
        let classifier = Classifier::lapd();
        // Matches both car_theft ("burglary from vehicle") and break_in ("burglary").
        assert_eq!(
            classifier.classify_description("BURGLARY FROM VEHICLE"),
            Some(CrimeCategory::CarTheft)
        );
        // Matches violent ("robbery") and petty_theft ("theft").
        assert_eq!(
            classifier.classify_description("robbery and theft"),
            Some(CrimeCategory::Violent)
        );
    }

    #[test]
    fn keywords_are_case_insensitive() {
        let classifier = Classifier::from_toml(SMALL_TABLE).unwrap();
        assert_eq!(
            classifier.classify_description("aggravated ASSAULT"),
            Some(CrimeCategory::Violent)
        );
    }

    #[test]
    fn unclassified_returns_none() {
        let classifier = Classifier::lapd();
        assert_eq!(classifier.classify(Some("999"), Some("VANDALISM")), None);
        assert_eq!(classifier.classify(None, None), None);
        assert_eq!(classifier.classify(Some("???"), None), None);
    }

    #[test]
    fn classifies_raw_incident() {
        let classifier = Classifier::lapd();
        let incident = RawIncident::new("624", Some("BATTERY - SIMPLE ASSAULT"), "34.1", "-118.3");
        assert_eq!(
            classifier.classify_incident(&incident),
            Some(CrimeCategory::Violent)
        );
    }

    #[test]
    fn rejects_conflicting_codes() {
        let toml = r#"
id = "bad"
name = "Bad"
code_width = 3
[codes]
violent = ["12"]
petty_theft = ["012"]
"#;
        assert!(matches!(
            Classifier::from_toml(toml),
            Err(ClassifierError::ConflictingCode { .. })
        ));
    }

    #[test]
    fn rejects_codes_without_digits() {
        let toml = "id = \"bad\"\nname = \"Bad\"\ncode_width = 3\n[codes]\nviolent = [\"ab\"]\n";
        assert!(matches!(
            Classifier::from_toml(toml),
            Err(ClassifierError::EmptyCode { .. })
        ));
    }

    #[test]
    fn rejects_empty_keywords() {
        let toml = "id = \"bad\"\nname = \"Bad\"\ncode_width = 3\n[keywords]\nbreak_in = [\" \"]\n";
        assert!(matches!(
            Classifier::from_toml(toml),
            Err(ClassifierError::EmptyKeyword { .. })
        ));
    }

    #[test]
    fn rejects_zero_width() {
        let toml = "id = \"bad\"\nname = \"Bad\"\ncode_width = 0\n";
        assert!(matches!(
            Classifier::from_toml(toml),
            Err(ClassifierError::ZeroWidth { .. })
        ));
    }

    #[test]
    fn lapd_table_loads() {
        let classifier = Classifier::lapd();
        assert_eq!(classifier.id(), "lapd");
        assert!(classifier.code_count() > 40);
    }
}
