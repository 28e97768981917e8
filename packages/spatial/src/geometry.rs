//! Ray-casting (even-odd) point-in-polygon test.
//!
//! A horizontal ray is cast from the test point toward `+x` and the edges
//! it crosses are counted; the point is inside iff the count is odd.
//!
//! Edge convention: an edge counts when exactly one of its endpoints lies
//! strictly above the point (`y_i > y` differs from `y_j > y`) and the
//! crossing lies strictly to the right of the point. This makes the test
//! half-open: for an axis-aligned rectangle, points on the minimum-x and
//! minimum-y edges (including the minimum corner) are inside, and points on
//! the maximum-x and maximum-y edges are outside. The result is
//! deterministic for every input, so adjacent polygons sharing an edge never
//! both claim a point on it.

/// A vertex as `[x, y]` (`[longitude, latitude]` for boundaries).
pub type Vertex = [f64; 2];

/// Counts the edges of `ring` crossed by a ray cast from `(x, y)` toward
/// `+x`. The ring is implicitly closed (last vertex connects to the first).
#[must_use]
pub fn ring_crossings(ring: &[Vertex], x: f64, y: f64) -> usize {
    let n = ring.len();
    if n < 3 {
        return 0;
    }

    let mut crossings = 0;
    let mut j = n - 1;
    for i in 0..n {
        let [xi, yi] = ring[i];
        let [xj, yj] = ring[j];
        if (yi > y) != (yj > y) {
            let x_cross = (xj - xi) * (y - yi) / (yj - yi) + xi;
            if x < x_cross {
                crossings += 1;
            }
        }
        j = i;
    }
    crossings
}

/// Even-odd test for a single ring.
#[must_use]
pub fn point_in_ring(ring: &[Vertex], x: f64, y: f64) -> bool {
    ring_crossings(ring, x, y) % 2 == 1
}

/// Even-odd test across several rings.
///
/// Crossings are summed over every ring, so interior rings act as holes
/// and disjoint exterior rings act as separate parts.
#[must_use]
pub fn point_in_rings(rings: &[Vec<Vertex>], x: f64, y: f64) -> bool {
    rings
        .iter()
        .map(|ring| ring_crossings(ring, x, y))
        .sum::<usize>()
        % 2
        == 1
}
