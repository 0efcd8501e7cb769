//! Spherical geometry helpers.
//!
//! All search and weighting happens on the unit sphere embedded in 3-D
//! Cartesian space; distances are chord lengths, not great-circle arcs.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in metres, used to convert user distances to chords.
pub const EARTH_RADIUS_M: f64 = 6_371_229.0;

/// A point on the unit sphere.
pub type Point3 = [f64; 3];

/// A geographic coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Project onto the unit sphere.
    pub fn to_cartesian(self) -> Point3 {
        to_cartesian(self.lat, self.lon)
    }
}

impl From<(f64, f64)> for LatLon {
    fn from((lat, lon): (f64, f64)) -> Self {
        Self { lat, lon }
    }
}

/// Project a latitude/longitude (degrees) onto the unit sphere.
#[inline]
pub fn to_cartesian(lat: f64, lon: f64) -> Point3 {
    let (sin_lat, cos_lat) = lat.to_radians().sin_cos();
    let (sin_lon, cos_lon) = lon.to_radians().sin_cos();
    [cos_lat * cos_lon, cos_lat * sin_lon, sin_lat]
}

/// Recover latitude/longitude (degrees) from a point on (or near) the sphere.
#[inline]
pub fn from_cartesian(p: &Point3) -> LatLon {
    let r = (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt();
    let lat = (p[2] / r).clamp(-1.0, 1.0).asin().to_degrees();
    let lon = p[1].atan2(p[0]).to_degrees();
    LatLon { lat, lon }
}

/// Squared Euclidean distance between two points.
#[inline]
pub fn squared_distance(a: &Point3, b: &Point3) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    dx * dx + dy * dy + dz * dz
}

/// Convert a surface distance in metres to a unit-sphere chord length.
pub fn arc_to_chord(distance_m: f64) -> f64 {
    let angle = (distance_m / EARTH_RADIUS_M).min(std::f64::consts::PI);
    2.0 * (angle / 2.0).sin()
}

/// Bring a longitude into `[minimum, minimum + 360)`.
#[inline]
pub fn normalise_longitude(lon: f64, minimum: f64) -> f64 {
    let mut lon = lon;
    while lon < minimum {
        lon += 360.0;
    }
    while lon >= minimum + 360.0 {
        lon -= 360.0;
    }
    lon
}
