//! Pseudo-Laplace weights.
//!
//! Weights `w_i = 1 + λ·d_i` on the neighbour offsets `d_i` in the tangent
//! plane of the target, with `λ` chosen so the weighted offsets cancel. The
//! resulting rows reproduce fields that vary linearly across the plane.

use nalgebra::{Matrix2, Vector2, Vector3};

use point_search::{DistanceWeighting, Neighbour, DEFAULT_EXACT_MATCH_EPSILON};
use regrid_common::geometry::from_cartesian;
use regrid_common::{Point3, RegridError, RegridResult, Triplet};

/// Relative determinant below which the neighbours are treated as collinear.
const DEGENERATE: f64 = 1e-12;

/// Pseudo-Laplace weights of `neighbours` for output point `row` at `target`.
///
/// Falls back to inverse distance weighting when the neighbours do not
/// span the tangent plane.
pub fn pseudo_laplace_weights(
    row: usize,
    target: &Point3,
    neighbours: &[Neighbour],
) -> RegridResult<Vec<Triplet>> {
    if neighbours.is_empty() {
        return Ok(Vec::new());
    }

    if let Some(exact) = neighbours
        .iter()
        .filter(|n| n.distance2 <= DEFAULT_EXACT_MATCH_EPSILON)
        .map(|n| n.payload)
        .min()
    {
        return Ok(vec![Triplet::new(row, exact, 1.0)]);
    }

    let (east, north) = tangent_basis(target);
    let origin = Vector3::from(*target);
    let offsets: Vec<Vector2<f64>> = neighbours
        .iter()
        .map(|n| {
            let d = Vector3::from(n.point) - origin;
            Vector2::new(d.dot(&east), d.dot(&north))
        })
        .collect();

    let r: Vector2<f64> = offsets.iter().sum();
    let inertia = offsets
        .iter()
        .fold(Matrix2::zeros(), |acc, d| acc + d * d.transpose());

    let scale = inertia.trace();
    if scale <= 0.0 || inertia.determinant().abs() <= DEGENERATE * scale * scale {
        return DistanceWeighting::inverse_distance().weights(row, neighbours);
    }
    let Some(inverse) = inertia.try_inverse() else {
        return DistanceWeighting::inverse_distance().weights(row, neighbours);
    };
    let lambda = -(inverse * r);

    let raw: Vec<f64> = offsets.iter().map(|d| 1.0 + lambda.dot(d)).collect();
    let total: f64 = raw.iter().sum();
    if !(total.is_finite() && total.abs() > f64::EPSILON) {
        return Err(RegridError::invalid_matrix(
            "pseudo-laplace",
            "",
            "",
            format!("total pseudo-Laplace weight {}", total),
        )
        .at_row(row));
    }

    Ok(neighbours
        .iter()
        .zip(raw)
        .map(|(n, w)| Triplet::new(row, n.payload, w / total))
        .collect())
}

/// Unit east and north vectors at a point on the sphere.
fn tangent_basis(p: &Point3) -> (Vector3<f64>, Vector3<f64>) {
    let ll = from_cartesian(p);
    let (sin_lat, cos_lat) = ll.lat.to_radians().sin_cos();
    let (sin_lon, cos_lon) = ll.lon.to_radians().sin_cos();
    let east = Vector3::new(-sin_lon, cos_lon, 0.0);
    let north = Vector3::new(-sin_lat * cos_lon, -sin_lat * sin_lon, cos_lat);
    (east, north)
}
