//! Loads neighborhood boundaries from `GeoJSON`.
//!
//! Accepts a `FeatureCollection` (or a single `Feature`) whose features
//! carry `Polygon` or `MultiPolygon` geometry and a name property. Every
//! malformed feature is a fatal error: a broken boundary file is corrupt
//! reference data, not bad input to be skipped.

use geojson::{Feature, GeoJson, Value};

use crate::SpatialError;
use crate::boundary::NeighborhoodBoundary;
use crate::geometry::Vertex;

/// Parses `GeoJSON` text into boundaries, in feature order.
///
/// `name_field` is the feature property holding the neighborhood name.
///
/// # Errors
///
/// Returns [`SpatialError`] if the text is not valid `GeoJSON`, is a bare
/// geometry, or any feature lacks a name, lacks geometry, has a
/// non-polygonal geometry, or fails boundary validation.
pub fn parse_boundaries(
    geojson_str: &str,
    name_field: &str,
) -> Result<Vec<NeighborhoodBoundary>, SpatialError> {
    let features = match geojson_str.parse::<GeoJson>()? {
        GeoJson::FeatureCollection(collection) => collection.features,
        GeoJson::Feature(feature) => vec![feature],
        GeoJson::Geometry(_) => {
            return Err(SpatialError::Conversion {
                message: "expected a FeatureCollection or Feature, found a bare geometry"
                    .to_string(),
            });
        }
    };

    let boundaries = features
        .iter()
        .enumerate()
        .map(|(index, feature)| feature_to_boundary(index, feature, name_field))
        .collect::<Result<Vec<_>, _>>()?;

    log::info!("Parsed {} neighborhood boundaries", boundaries.len());

    Ok(boundaries)
}

fn feature_to_boundary(
    index: usize,
    feature: &Feature,
    name_field: &str,
) -> Result<NeighborhoodBoundary, SpatialError> {
    let name = feature
        .property(name_field)
        .and_then(|value| match value {
            serde_json::Value::String(s) => Some(s.trim().to_string()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .filter(|s| !s.is_empty())
        .ok_or_else(|| SpatialError::MissingName {
            index,
            field: name_field.to_string(),
        })?;

    let geometry = feature
        .geometry
        .as_ref()
        .ok_or_else(|| SpatialError::MissingGeometry { name: name.clone() })?;

    let rings = match &geometry.value {
        Value::Polygon(polygon) => polygon_rings(&name, polygon)?,
        Value::MultiPolygon(polygons) => {
            let mut rings = Vec::new();
            for polygon in polygons {
                rings.extend(polygon_rings(&name, polygon)?);
            }
            rings
        }
        other => {
            return Err(SpatialError::UnsupportedGeometry {
                name,
                kind: geometry_kind(other).to_string(),
            });
        }
    };

    NeighborhoodBoundary::with_rings(name, rings)
}

fn polygon_rings(name: &str, polygon: &[Vec<Vec<f64>>]) -> Result<Vec<Vec<Vertex>>, SpatialError> {
    polygon
        .iter()
        .map(|ring| {
            ring.iter()
                .map(|position| match position.as_slice() {
                    [lon, lat, ..] => Ok([*lon, *lat]),
                    _ => Err(SpatialError::Conversion {
                        message: format!("boundary '{name}' has a position with fewer than 2 values"),
                    }),
                })
                .collect()
        })
        .collect()
}

const fn geometry_kind(value: &Value) -> &'static str {
    match value {
        Value::Point(_) => "Point",
        Value::MultiPoint(_) => "MultiPoint",
        Value::LineString(_) => "LineString",
        Value::MultiLineString(_) => "MultiLineString",
        Value::Polygon(_) => "Polygon",
        Value::MultiPolygon(_) => "MultiPolygon",
        Value::GeometryCollection(_) => "GeometryCollection",
    }
}
