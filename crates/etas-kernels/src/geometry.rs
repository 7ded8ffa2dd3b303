//! Target region geometry.
//!
//! A [`Region`] is a simple polygon given as `[latitude, longitude]`
//! vertices. It answers point-in-polygon queries (boundary inclusive),
//! reports its bounding rectangle and measures its area either on the
//! sphere (km²) or in raw coordinate units.

use serde::{Deserialize, Serialize};

use crate::error::KernelError;
use crate::spatial::EARTH_RADIUS_KM;

/// Tolerance for the on-boundary test, in degrees.
const BOUNDARY_EPS: f64 = 1e-12;

/// How the area of a region is measured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaMetric {
    /// Area on a sphere of radius [`EARTH_RADIUS_KM`], in km².
    #[default]
    Geodesic,
    /// Area in squared coordinate units (degrees²).
    Planar,
}

/// Axis-aligned bounding rectangle in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Southern edge.
    pub min_lat: f64,
    /// Northern edge.
    pub max_lat: f64,
    /// Western edge.
    pub min_lon: f64,
    /// Eastern edge.
    pub max_lon: f64,
}

impl Bounds {
    /// The rectangle as a four-vertex region.
    pub fn to_region(&self) -> Result<Region, KernelError> {
        Region::new(vec![
            [self.min_lat, self.min_lon],
            [self.max_lat, self.min_lon],
            [self.max_lat, self.max_lon],
            [self.min_lat, self.max_lon],
        ])
    }

    /// Whether the point lies inside the closed rectangle.
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&latitude)
            && (self.min_lon..=self.max_lon).contains(&longitude)
    }
}

/// An immutable simple polygon on the latitude/longitude plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<[f64; 2]>", into = "Vec<[f64; 2]>")]
pub struct Region {
    vertices: Vec<[f64; 2]>,
    bounds: Bounds,
}

impl Region {
    /// Create a polygon from `[latitude, longitude]` vertices.
    ///
    /// A trailing vertex equal to the first one (closed ring) is dropped.
    /// Fails with fewer than three distinct vertices or non-finite
    /// coordinates.
    pub fn new(mut vertices: Vec<[f64; 2]>) -> Result<Self, KernelError> {
        if vertices.len() > 1 && vertices.first() == vertices.last() {
            vertices.pop();
        }
        if vertices.len() < 3 {
            return Err(KernelError::DegeneratePolygon {
                count: vertices.len(),
            });
        }
        if vertices.iter().flatten().any(|v| !v.is_finite()) {
            return Err(KernelError::NonFinite {
                name: "polygon vertex",
            });
        }

        let mut bounds = Bounds {
            min_lat: f64::INFINITY,
            max_lat: f64::NEG_INFINITY,
            min_lon: f64::INFINITY,
            max_lon: f64::NEG_INFINITY,
        };
        for &[lat, lon] in &vertices {
            bounds.min_lat = bounds.min_lat.min(lat);
            bounds.max_lat = bounds.max_lat.max(lat);
            bounds.min_lon = bounds.min_lon.min(lon);
            bounds.max_lon = bounds.max_lon.max(lon);
        }
        Ok(Self { vertices, bounds })
    }

    /// Vertices as `[latitude, longitude]` pairs (open ring).
    pub fn vertices(&self) -> &[[f64; 2]] {
        &self.vertices
    }

    /// Bounding rectangle.
    pub const fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Consecutive vertex pairs, closing the ring.
    fn edges(&self) -> impl Iterator<Item = ([f64; 2], [f64; 2])> + '_ {
        self.vertices
            .iter()
            .copied()
            .zip(self.vertices.iter().copied().cycle().skip(1))
    }

    /// Whether the point lies inside the polygon or on its boundary.
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        if !self.bounds.contains(latitude, longitude) {
            return false;
        }
        let (y, x) = (latitude, longitude);
        let mut inside = false;
        for ([y1, x1], [y2, x2]) in self.edges() {
            if on_segment(x, y, x1, y1, x2, y2) {
                return true;
            }
            if (y1 > y) != (y2 > y) {
                let x_cross = x1 + (y - y1) * (x2 - x1) / (y2 - y1);
                if x < x_cross {
                    inside = !inside;
                }
            }
        }
        inside
    }

    /// Area of the polygon under the given metric.
    pub fn area(&self, metric: AreaMetric) -> f64 {
        match metric {
            AreaMetric::Geodesic => self.geodesic_area(),
            AreaMetric::Planar => self.planar_area(),
        }
    }

    /// Shoelace area in degrees².
    pub fn planar_area(&self) -> f64 {
        let twice: f64 = self
            .edges()
            .map(|([y1, x1], [y2, x2])| x1 * y2 - x2 * y1)
            .sum();
        twice.abs() / 2.0
    }

    /// Area of the polygon on the sphere in km².
    pub fn geodesic_area(&self) -> f64 {
        let sum: f64 = self
            .edges()
            .map(|([lat1, lon1], [lat2, lon2])| {
                (lon2 - lon1).to_radians()
                    * (2.0 + lat1.to_radians().sin() + lat2.to_radians().sin())
            })
            .sum();
        (sum * EARTH_RADIUS_KM * EARTH_RADIUS_KM / 2.0).abs()
    }
}

impl TryFrom<Vec<[f64; 2]>> for Region {
    type Error = KernelError;

    fn try_from(vertices: Vec<[f64; 2]>) -> Result<Self, Self::Error> {
        Self::new(vertices)
    }
}

impl From<Region> for Vec<[f64; 2]> {
    fn from(region: Region) -> Self {
        region.vertices
    }
}

/// Whether `(x, y)` lies on the segment `(x1, y1)–(x2, y2)`.
fn on_segment(x: f64, y: f64, x1: f64, y1: f64, x2: f64, y2: f64) -> bool {
    let cross = (x2 - x1) * (y - y1) - (y2 - y1) * (x - x1);
    let scale = (x2 - x1).abs().max((y2 - y1).abs()).max(1.0);
    cross.abs() <= BOUNDARY_EPS * scale
        && x >= x1.min(x2) - BOUNDARY_EPS
        && x <= x1.max(x2) + BOUNDARY_EPS
        && y >= y1.min(y2) - BOUNDARY_EPS
        && y <= y1.max(y2) + BOUNDARY_EPS
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn unit_square() -> Region {
        Region::new(vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]).unwrap()
    }

    #[test]
    fn unit_square_planar_area() {
        assert!((unit_square().planar_area() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn geodesic_area_of_one_degree_cell_at_equator() {
        // R² · Δλ · (sin φ2 − sin φ1)
        let expected = EARTH_RADIUS_KM.powi(2) * 1_f64.to_radians() * 1_f64.to_radians().sin();
        let area = unit_square().geodesic_area();
        assert!((area - expected).abs() / expected < 1e-9, "{area} vs {expected}");
    }

    #[test]
    fn contains_is_boundary_inclusive() {
        let square = unit_square();
        assert!(square.contains(0.5, 0.5));
        assert!(square.contains(0.0, 0.0));
        assert!(square.contains(1.0, 0.3));
        assert!(square.contains(0.4, 1.0));
        assert!(!square.contains(1.2, 0.5));
        assert!(!square.contains(0.5, -0.01));
    }

    #[test]
    fn contains_handles_concave_polygon() {
        // L-shaped region missing the upper-right quadrant.
        let region = Region::new(vec![
            [0.0, 0.0],
            [2.0, 0.0],
            [2.0, 1.0],
            [1.0, 1.0],
            [1.0, 2.0],
            [0.0, 2.0],
        ])
        .unwrap();
        assert!(region.contains(1.5, 0.5));
        assert!(region.contains(0.5, 1.5));
        assert!(!region.contains(1.5, 1.5));
    }

    #[test]
    fn closed_ring_is_accepted() {
        let region = Region::new(vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]);
        assert_eq!(region.map(|r| r.vertices().len()).ok(), Some(3));
    }

    #[test]
    fn rejects_degenerate_input() {
        assert!(matches!(
            Region::new(vec![[0.0, 0.0], [1.0, 1.0]]),
            Err(KernelError::DegeneratePolygon { count: 2 })
        ));
        assert!(Region::new(vec![[0.0, 0.0], [1.0, f64::NAN], [1.0, 1.0]]).is_err());
    }

    #[test]
    fn deserializes_from_vertex_list() {
        let region: Region = serde_json::from_str("[[0, 0], [0, 2], [2, 2], [2, 0]]").unwrap();
        assert!((region.planar_area() - 4.0).abs() < 1e-12);
    }
}
