//! Validated neighborhood boundary polygons.

use rstar::AABB;

use crate::SpatialError;
use crate::geometry::{Vertex, point_in_rings};

/// A named neighborhood polygon.
///
/// Rings are stored as `[longitude, latitude]` vertices without a repeated
/// closing vertex. Construction validates every ring, so a boundary that
/// exists is always usable for point-in-polygon tests.
#[derive(Debug, Clone)]
pub struct NeighborhoodBoundary {
    name: String,
    rings: Vec<Vec<Vertex>>,
    envelope: AABB<Vertex>,
}

impl NeighborhoodBoundary {
    /// Creates a single-ring boundary.
    ///
    /// The ring may be explicitly closed (last vertex equal to the first)
    /// or implicitly closed.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError`] if the name is blank, a vertex is not
    /// finite, or the ring has fewer than 3 distinct vertices.
    pub fn new(name: impl Into<String>, ring: Vec<Vertex>) -> Result<Self, SpatialError> {
        Self::with_rings(name, vec![ring])
    }

    /// Creates a boundary from several rings (holes or disjoint parts).
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError`] if the name is blank, there are no rings,
    /// a vertex is not finite, or any ring has fewer than 3 distinct
    /// vertices.
    pub fn with_rings(
        name: impl Into<String>,
        rings: Vec<Vec<Vertex>>,
    ) -> Result<Self, SpatialError> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(SpatialError::EmptyName);
        }
        if rings.is_empty() {
            return Err(SpatialError::DegenerateBoundary {
                name,
                vertices: 0,
            });
        }

        let mut normalized = Vec::with_capacity(rings.len());
        for ring in rings {
            normalized.push(normalize_ring(&name, ring)?);
        }

        let envelope = AABB::from_points(normalized.iter().flatten());

        Ok(Self {
            name,
            rings: normalized,
            envelope,
        })
    }

    /// Neighborhood name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rings as `[longitude, latitude]` vertices, without closing vertex.
    #[must_use]
    pub fn rings(&self) -> &[Vec<Vertex>] {
        &self.rings
    }

    /// Axis-aligned bounding box of all rings.
    #[must_use]
    pub const fn envelope(&self) -> &AABB<Vertex> {
        &self.envelope
    }

    /// Even-odd containment test for a longitude/latitude point.
    ///
    /// See [`crate::geometry`] for the edge convention.
    #[must_use]
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        point_in_rings(&self.rings, lon, lat)
    }
}

/// Drops an explicit closing vertex and checks the ring is usable.
fn normalize_ring(name: &str, mut ring: Vec<Vertex>) -> Result<Vec<Vertex>, SpatialError> {
    if ring
        .iter()
        .any(|[x, y]| !x.is_finite() || !y.is_finite())
    {
        return Err(SpatialError::NonFiniteVertex {
            name: name.to_string(),
        });
    }

    if ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }

    let mut distinct: Vec<Vertex> = Vec::with_capacity(ring.len());
    for vertex in &ring {
        if !distinct.contains(vertex) {
            distinct.push(*vertex);
            if distinct.len() >= 3 {
                return Ok(ring);
            }
        }
    }

    Err(SpatialError::DegenerateBoundary {
        name: name.to_string(),
        vertices: distinct.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_implicitly_closed_ring() {
        let boundary =
            NeighborhoodBoundary::new("Square", vec![[0.0, 0.0], [0.0, 1.0], [1.0, 1.0]]).unwrap();
        assert_eq!(boundary.rings()[0].len(), 3);
    }

    #[test]
    fn drops_explicit_closing_vertex() {
        let boundary = NeighborhoodBoundary::new(
            "Square",
            vec![[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]],
        )
        .unwrap();
        assert_eq!(boundary.rings()[0].len(), 4);
        assert!(boundary.contains(0.5, 0.5));
    }

    #[test]
    fn rejects_two_vertex_ring() {
        let err = NeighborhoodBoundary::new("Line", vec![[0.0, 0.0], [1.0, 1.0]]).unwrap_err();
        assert!(matches!(
            err,
            SpatialError::DegenerateBoundary { vertices: 2, .. }
        ));
    }

    #[test]
    fn closed_triangle_without_third_vertex_is_degenerate() {
        let err = NeighborhoodBoundary::new(
            "Sliver",
            vec![[0.0, 0.0], [1.0, 1.0], [1.0, 1.0], [0.0, 0.0]],
        )
        .unwrap_err();
        assert!(matches!(err, SpatialError::DegenerateBoundary { .. }));
    }

    #[test]
    fn rejects_non_finite_vertex() {
        let err = NeighborhoodBoundary::new(
            "Broken",
            vec![[0.0, 0.0], [f64::NAN, 1.0], [1.0, 1.0]],
        )
        .unwrap_err();
        assert!(matches!(err, SpatialError::NonFiniteVertex { .. }));
    }

    #[test]
    fn rejects_blank_name() {
        let err =
            NeighborhoodBoundary::new("  ", vec![[0.0, 0.0], [0.0, 1.0], [1.0, 1.0]]).unwrap_err();
        assert!(matches!(err, SpatialError::EmptyName));
    }

    #[test]
    fn envelope_covers_all_rings() {
        let boundary = NeighborhoodBoundary::with_rings(
            "Two parts",
            vec![
                vec![[0.0, 0.0], [0.0, 1.0], [1.0, 1.0]],
                vec![[5.0, 5.0], [5.0, 6.0], [6.0, 6.0]],
            ],
        )
        .unwrap();
        assert_eq!(boundary.envelope().lower(), [0.0, 0.0]);
        assert_eq!(boundary.envelope().upper(), [6.0, 6.0]);
        assert!(boundary.contains(5.2, 5.5));
        assert!(!boundary.contains(3.0, 3.0));
    }
}
