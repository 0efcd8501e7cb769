//! Generators for synthetic point clouds and fields.
//!
//! Everything here is deterministic: random generators take a seed, so a
//! failing test reproduces exactly.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regrid_common::{LatLon, Point3};
use representation::Representation;

/// Uniformly distributed points on the sphere.
///
/// Latitude is drawn via `asin` of a uniform `z` so points do not cluster
/// at the poles.
///
/// # Example
///
/// ```
/// use test_utils::random_points;
///
/// let a = random_points(100, 7);
/// let b = random_points(100, 7);
/// assert_eq!(a, b);
/// assert!(a.iter().all(|p| p.lat.abs() <= 90.0));
/// ```
pub fn random_points(n: usize, seed: u64) -> Vec<LatLon> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            let z: f64 = rng.gen_range(-1.0..1.0);
            let lon: f64 = rng.gen_range(0.0..360.0);
            LatLon::new(z.asin().to_degrees(), lon)
        })
        .collect()
}

/// Uniformly distributed points on the unit sphere in Cartesian form.
pub fn random_cartesian_cloud(n: usize, seed: u64) -> Vec<Point3> {
    random_points(n, seed)
        .into_iter()
        .map(LatLon::to_cartesian)
        .collect()
}

/// Uniformly distributed points inside a latitude/longitude window.
pub fn random_points_in(
    n: usize,
    seed: u64,
    (south, north): (f64, f64),
    (west, east): (f64, f64),
) -> Vec<LatLon> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| LatLon::new(rng.gen_range(south..=north), rng.gen_range(west..=east)))
        .collect()
}

/// Field whose value is the point index: `0, 1, 2, ...`.
pub fn index_field(n: usize) -> Vec<f64> {
    (0..n).map(|i| i as f64).collect()
}

/// Smooth, strictly positive analytic field evaluated on a representation.
///
/// `2 + sin(lat) cos(lon)` is continuous across the date line and the
/// poles, so interpolation error shrinks with resolution.
pub fn smooth_field(rep: &Representation) -> Vec<f64> {
    rep.points()
        .map(|points| points.map(smooth_value).collect())
        .unwrap_or_default()
}

/// The analytic function behind [`smooth_field`].
pub fn smooth_value(p: LatLon) -> f64 {
    2.0 + p.lat.to_radians().sin() * p.lon.to_radians().cos()
}

/// Replace every `every`-th value (starting at `offset`) with `marker`.
pub fn with_missing(values: &[f64], every: usize, offset: usize, marker: f64) -> Vec<f64> {
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            if every > 0 && i >= offset && (i - offset) % every == 0 {
                marker
            } else {
                v
            }
        })
        .collect()
}
