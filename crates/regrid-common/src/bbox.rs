//! Geographic bounding box types and operations.

use serde::{Deserialize, Serialize};

use crate::digest::KeyHasher;
use crate::geometry::normalise_longitude;

/// Tolerance in degrees used when comparing box edges.
const EDGE_EPSILON: f64 = 1e-9;

/// A geographic bounding box in degrees.
///
/// Longitudes are kept so that `west <= east <= west + 360`; a box whose
/// longitude span is 360 degrees wraps around the globe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub north: f64,
    pub west: f64,
    pub south: f64,
    pub east: f64,
}

impl BoundingBox {
    /// Create a new bounding box, normalising `east` relative to `west`.
    pub fn new(north: f64, west: f64, south: f64, east: f64) -> Result<Self, BboxParseError> {
        if !(north.is_finite() && west.is_finite() && south.is_finite() && east.is_finite()) {
            return Err(BboxParseError::InvalidNumber(format!(
                "{}/{}/{}/{}",
                north, west, south, east
            )));
        }
        if north < south {
            return Err(BboxParseError::InvertedLatitudes { north, south });
        }
        if north > 90.0 + EDGE_EPSILON || south < -90.0 - EDGE_EPSILON {
            return Err(BboxParseError::LatitudeOutOfRange(north.max(-south)));
        }

        let span = east - west;
        let east = if span >= 360.0 - EDGE_EPSILON {
            west + 360.0
        } else {
            normalise_longitude(east, west)
        };

        Ok(Self {
            north,
            west,
            south,
            east,
        })
    }

    /// The whole globe.
    pub fn global() -> Self {
        Self {
            north: 90.0,
            west: 0.0,
            south: -90.0,
            east: 360.0,
        }
    }

    /// Parse an area string: "north/west/south/east".
    pub fn from_area_string(s: &str) -> Result<Self, BboxParseError> {
        let parts: Vec<&str> = s.split('/').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(BboxParseError::InvalidFormat(s.to_string()));
        }

        let mut values = [0.0f64; 4];
        for (value, part) in values.iter_mut().zip(&parts) {
            *value = part
                .parse()
                .map_err(|_| BboxParseError::InvalidNumber(part.to_string()))?;
        }

        Self::new(values[0], values[1], values[2], values[3])
    }

    /// Whether the box spans the full 360 degrees of longitude.
    pub fn is_periodic_west_east(&self) -> bool {
        self.east - self.west >= 360.0 - EDGE_EPSILON
    }

    /// Whether the box covers the whole globe.
    pub fn is_global(&self) -> bool {
        self.is_periodic_west_east()
            && self.north >= 90.0 - EDGE_EPSILON
            && self.south <= -90.0 + EDGE_EPSILON
    }

    /// Check if a point is contained within this box (edges inclusive).
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        if lat > self.north + EDGE_EPSILON || lat < self.south - EDGE_EPSILON {
            return false;
        }
        if self.is_periodic_west_east() {
            return true;
        }
        let lon = normalise_longitude(lon, self.west - EDGE_EPSILON);
        lon <= self.east + EDGE_EPSILON
    }

    /// Expand the box by a margin in degrees, clamping latitudes to the poles.
    pub fn expand(&self, margin: f64) -> Self {
        let north = (self.north + margin).min(90.0);
        let south = (self.south - margin).max(-90.0);

        if self.east - self.west + 2.0 * margin >= 360.0 {
            return Self {
                north,
                west: self.west,
                south,
                east: self.west + 360.0,
            };
        }

        Self {
            north,
            west: self.west - margin,
            south,
            east: self.east + margin,
        }
    }

    /// Smallest box enclosing a set of points.
    ///
    /// The longitude extent is taken from whichever of the [0, 360) and
    /// [-180, 180) conventions gives the narrower span, so boxes crossing
    /// the date line stay tight. Returns `None` for an empty set.
    pub fn enclosing<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut north = f64::NEG_INFINITY;
        let mut south = f64::INFINITY;
        let (mut min_a, mut max_a) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut min_b, mut max_b) = (f64::INFINITY, f64::NEG_INFINITY);
        let mut any = false;

        for (lat, lon) in points {
            any = true;
            north = north.max(lat);
            south = south.min(lat);

            let a = normalise_longitude(lon, 0.0);
            min_a = min_a.min(a);
            max_a = max_a.max(a);

            let b = normalise_longitude(lon, -180.0);
            min_b = min_b.min(b);
            max_b = max_b.max(b);
        }

        if !any {
            return None;
        }

        let (west, east) = if max_b - min_b < max_a - min_a {
            (min_b, max_b)
        } else {
            (min_a, max_a)
        };

        Some(Self {
            north,
            west,
            south,
            east,
        })
    }

    /// Feed the box into a cache-key digest.
    pub fn hash(&self, hasher: &mut KeyHasher) {
        hasher.add_str("bbox");
        hasher.add_f64(self.north);
        hasher.add_f64(self.west);
        hasher.add_f64(self.south);
        hasher.add_f64(self.east);
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::global()
    }
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}/{}", self.north, self.west, self.south, self.east)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BboxParseError {
    #[error("Invalid area format: {0}. Expected 'north/west/south/east'")]
    InvalidFormat(String),

    #[error("Invalid number in area: {0}")]
    InvalidNumber(String),

    #[error("North {north} is below south {south}")]
    InvertedLatitudes { north: f64, south: f64 },

    #[error("Latitude {0} outside [-90, 90]")]
    LatitudeOutOfRange(f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_area() {
        let bbox = BoundingBox::from_area_string("60/-10/30/40").unwrap();
        assert_eq!(bbox.north, 60.0);
        assert_eq!(bbox.west, -10.0);
        assert_eq!(bbox.south, 30.0);
        assert_eq!(bbox.east, 40.0);
    }

    #[test]
    fn test_east_normalised_after_west() {
        let bbox = BoundingBox::new(10.0, 350.0, -10.0, 10.0).unwrap();
        assert_eq!(bbox.east, 370.0);
        assert!(bbox.contains(0.0, 0.0));
        assert!(bbox.contains(0.0, -5.0));
        assert!(!bbox.contains(0.0, 20.0));
    }

    #[test]
    fn test_inverted_latitudes_rejected() {
        let result = BoundingBox::new(-10.0, 0.0, 10.0, 20.0);
        assert!(matches!(result, Err(BboxParseError::InvertedLatitudes { .. })));
    }

    #[test]
    fn test_enclosing_crosses_date_line() {
        let bbox = BoundingBox::enclosing([(0.0, 170.0), (10.0, -170.0)]).unwrap();
        assert!((bbox.east - bbox.west - 20.0).abs() < 1e-9);
        assert!(bbox.contains(5.0, 180.0));
    }
}
