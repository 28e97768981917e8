#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Neighborhood boundary attribution.
//!
//! Resolves a latitude/longitude to the neighborhood polygon containing it
//! using the ray-casting (even-odd) test in [`geometry`]. A [`BoundarySet`]
//! keeps an R-tree of boundary envelopes to skip polygons that cannot
//! contain the point, while preserving first-match order: when boundaries
//! accidentally overlap, the one listed first wins.

pub mod boundary;
pub mod geometry;
pub mod load;

use std::collections::BTreeMap;

use rstar::{AABB, RTree, RTreeObject};

pub use boundary::NeighborhoodBoundary;

/// Structural errors in boundary reference data.
///
/// These are fatal at load time: they indicate corrupt reference data, as
/// opposed to per-incident problems which are only counted.
#[derive(Debug, thiserror::Error)]
pub enum SpatialError {
    /// The `GeoJSON` text could not be parsed.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// A boundary has a blank name.
    #[error("Boundary has an empty name")]
    EmptyName,

    /// A feature has no usable name property.
    #[error("Feature {index} has no '{field}' name property")]
    MissingName {
        /// Feature position in the collection.
        index: usize,
        /// Property that was expected to hold the name.
        field: String,
    },

    /// A feature has no geometry.
    #[error("Boundary '{name}' has no geometry")]
    MissingGeometry {
        /// Neighborhood name.
        name: String,
    },

    /// A feature's geometry is not polygonal.
    #[error("Boundary '{name}' has unsupported geometry type {kind}")]
    UnsupportedGeometry {
        /// Neighborhood name.
        name: String,
        /// The geometry type found.
        kind: String,
    },

    /// A ring has fewer than 3 distinct vertices.
    #[error("Boundary '{name}' has a ring with {vertices} distinct vertices (need at least 3)")]
    DegenerateBoundary {
        /// Neighborhood name.
        name: String,
        /// Number of distinct vertices found.
        vertices: usize,
    },

    /// A vertex coordinate is NaN or infinite.
    #[error("Boundary '{name}' has a non-finite vertex")]
    NonFiniteVertex {
        /// Neighborhood name.
        name: String,
    },

    /// Two boundaries share a name.
    #[error("Duplicate boundary name '{name}'")]
    DuplicateName {
        /// The repeated name.
        name: String,
    },

    /// Data conversion error.
    #[error("Conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

/// Returns `true` if a coordinate pair can be a real location.
///
/// `0`/`0` is the upstream sentinel for a missing geocode, and non-finite
/// or out-of-range values cannot be real WGS84 coordinates.
#[must_use]
pub fn is_valid_coordinate(lat: f64, lon: f64) -> bool {
    if !lat.is_finite() || !lon.is_finite() {
        return false;
    }
    if lat == 0.0 && lon == 0.0 {
        return false;
    }
    (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon)
}

/// Returns the first boundary containing the point, scanning in order.
///
/// Invalid coordinates (see [`is_valid_coordinate`]) return `None` before
/// any geometric test.
#[must_use]
pub fn resolve_neighborhood(
    lat: f64,
    lon: f64,
    boundaries: &[NeighborhoodBoundary],
) -> Option<&NeighborhoodBoundary> {
    if !is_valid_coordinate(lat, lon) {
        return None;
    }
    boundaries.iter().find(|boundary| boundary.contains(lon, lat))
}

/// A boundary envelope stored in the R-tree with its position in the set.
struct IndexedEnvelope {
    position: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Ordered, validated boundary collection with an envelope index.
///
/// Constructed once per run and shared read-only by every consumer.
pub struct BoundarySet {
    boundaries: Vec<NeighborhoodBoundary>,
    by_name: BTreeMap<String, usize>,
    index: RTree<IndexedEnvelope>,
}

impl BoundarySet {
    /// Builds a set from boundaries in priority order.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::DuplicateName`] if two boundaries share a
    /// name, since aggregates are keyed by name.
    pub fn new(boundaries: Vec<NeighborhoodBoundary>) -> Result<Self, SpatialError> {
        let mut by_name = BTreeMap::new();
        for (position, boundary) in boundaries.iter().enumerate() {
            if by_name.insert(boundary.name().to_string(), position).is_some() {
                return Err(SpatialError::DuplicateName {
                    name: boundary.name().to_string(),
                });
            }
        }

        let entries = boundaries
            .iter()
            .enumerate()
            .map(|(position, boundary)| IndexedEnvelope {
                position,
                envelope: *boundary.envelope(),
            })
            .collect();

        log::info!("Loaded {} boundaries into spatial index", boundaries.len());

        Ok(Self {
            boundaries,
            by_name,
            index: RTree::bulk_load(entries),
        })
    }

    /// Parses `GeoJSON` and builds a set from its features.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError`] if parsing or validation fails, or if two
    /// features share a name.
    pub fn from_geojson(geojson_str: &str, name_field: &str) -> Result<Self, SpatialError> {
        Self::new(load::parse_boundaries(geojson_str, name_field)?)
    }

    /// Returns the first boundary (in set order) containing the point.
    ///
    /// Equivalent to [`resolve_neighborhood`] over [`Self::boundaries`],
    /// but only polygons whose envelope covers the point are tested.
    #[must_use]
    pub fn resolve(&self, lat: f64, lon: f64) -> Option<&NeighborhoodBoundary> {
        if !is_valid_coordinate(lat, lon) {
            return None;
        }

        let query_env = AABB::from_point([lon, lat]);
        self.index
            .locate_in_envelope_intersecting(&query_env)
            .filter(|entry| self.boundaries[entry.position].contains(lon, lat))
            .map(|entry| entry.position)
            .min()
            .map(|position| &self.boundaries[position])
    }

    /// Boundaries in priority order.
    #[must_use]
    pub fn boundaries(&self) -> &[NeighborhoodBoundary] {
        &self.boundaries
    }

    /// Looks up a boundary by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&NeighborhoodBoundary> {
        self.by_name.get(name).map(|&position| &self.boundaries[position])
    }

    /// Boundary names in priority order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.boundaries.iter().map(NeighborhoodBoundary::name)
    }

    /// Number of boundaries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.boundaries.len()
    }

    /// Returns `true` if the set has no boundaries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.boundaries.is_empty()
    }
}
