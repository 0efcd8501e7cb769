//! Rotated-pole transformation.
//!
//! A rotated grid is defined in a frame whose south pole sits at
//! `(south_pole_latitude, south_pole_longitude)` in geographic coordinates,
//! optionally spun by `angle` degrees about the rotated polar axis.

use nalgebra::{Rotation3, Vector3};

use regrid_common::geometry::{from_cartesian, to_cartesian};
use regrid_common::{KeyHasher, LatLon};

/// Rotated-pole parameters plus the precomputed rotation.
#[derive(Debug, Clone)]
pub struct Rotation {
    pub south_pole_latitude: f64,
    pub south_pole_longitude: f64,
    pub angle: f64,
    /// Rotated frame to geographic frame.
    matrix: Rotation3<f64>,
}

impl Rotation {
    pub fn new(south_pole_latitude: f64, south_pole_longitude: f64, angle: f64) -> Self {
        let z = Vector3::z_axis();
        let y = Vector3::y_axis();
        let matrix = Rotation3::from_axis_angle(&z, south_pole_longitude.to_radians())
            * Rotation3::from_axis_angle(&y, -(90.0 + south_pole_latitude).to_radians())
            * Rotation3::from_axis_angle(&z, angle.to_radians());

        Self {
            south_pole_latitude,
            south_pole_longitude,
            angle,
            matrix,
        }
    }

    /// True when the rotation leaves coordinates unchanged.
    pub fn is_identity(&self) -> bool {
        (self.south_pole_latitude + 90.0).abs() < 1e-12 && self.angle.abs() < 1e-12
            && self.south_pole_longitude.abs() < 1e-12
    }

    /// Rotated coordinates to geographic coordinates.
    pub fn unrotate(&self, p: LatLon) -> LatLon {
        let v = self.matrix * Vector3::from(to_cartesian(p.lat, p.lon));
        from_cartesian(&[v.x, v.y, v.z])
    }

    /// Geographic coordinates to rotated coordinates.
    pub fn rotate(&self, p: LatLon) -> LatLon {
        let v = self.matrix.inverse() * Vector3::from(to_cartesian(p.lat, p.lon));
        from_cartesian(&[v.x, v.y, v.z])
    }

    pub fn hash(&self, hasher: &mut KeyHasher) {
        hasher.add_str("rotation");
        hasher.add_f64(self.south_pole_latitude);
        hasher.add_f64(self.south_pole_longitude);
        hasher.add_f64(self.angle);
    }
}

impl PartialEq for Rotation {
    fn eq(&self, other: &Self) -> bool {
        self.south_pole_latitude == other.south_pole_latitude
            && self.south_pole_longitude == other.south_pole_longitude
            && self.angle == other.angle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: LatLon, b: LatLon) -> bool {
        let pa = a.to_cartesian();
        let pb = b.to_cartesian();
        regrid_common::geometry::squared_distance(&pa, &pb) < 1e-20
    }

    #[test]
    fn test_identity_rotation() {
        let r = Rotation::new(-90.0, 0.0, 0.0);
        assert!(r.is_identity());
        let p = LatLon::new(12.5, 33.0);
        assert!(close(r.unrotate(p), p));
    }

    #[test]
    fn test_rotated_south_pole_lands_on_parameters() {
        let r = Rotation::new(-40.0, 10.0, 0.0);
        let pole = r.unrotate(LatLon::new(-90.0, 0.0));
        assert!(close(pole, LatLon::new(-40.0, 10.0)));
    }

    #[test]
    fn test_rotate_inverts_unrotate() {
        let r = Rotation::new(-35.0, 15.0, 20.0);
        for &(lat, lon) in &[(0.0, 0.0), (45.0, 100.0), (-70.0, -30.0)] {
            let p = LatLon::new(lat, lon);
            assert!(close(r.rotate(r.unrotate(p)), p));
        }
    }
}
