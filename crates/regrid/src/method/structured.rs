//! Bilinear interpolation on row-structured grids.
//!
//! The target is placed between the two input rows bracketing its latitude;
//! on each row it is interpolated linearly in longitude between the two
//! bracketing points, and the two row values are combined linearly in
//! latitude. Works in the grid's native frame, so rotated grids are handled
//! by rotating the target.

use rayon::prelude::*;

use regrid_common::{LatLon, RegridError, RegridResult, Triplet};
use representation::{GridRow, Pole, Representation};

use crate::matrix::WeightMatrix;

const LATITUDE_EPSILON: f64 = 1e-9;

pub(crate) fn assemble(
    input: &Representation,
    targets: &[Option<LatLon>],
) -> RegridResult<WeightMatrix> {
    let structure = input.structure().ok_or_else(|| {
        RegridError::unsupported(format!(
            "structured-bilinear needs a row-structured input, got {}",
            input
        ))
    })?;
    let (Some(first), Some(last)) = (structure.rows.first(), structure.rows.last()) else {
        return Err(RegridError::empty_domain(format!("{} has no rows", input)));
    };

    let northmost = first.latitude;
    let southmost = last.latitude;
    let north_cap = input.includes_pole(Pole::North);
    let south_cap = input.includes_pole(Pole::South);
    let periodic = structure.periodic_west_east;

    let rows: Vec<Vec<Triplet>> = targets
        .par_iter()
        .enumerate()
        .map(|(row, target)| {
            let Some(target) = target else {
                return Vec::new();
            };
            let q = input.to_native(*target);

            if (q.lat > northmost + LATITUDE_EPSILON && !north_cap)
                || (q.lat < southmost - LATITUDE_EPSILON && !south_cap)
            {
                return Vec::new();
            }
            let Some((n, s, frac)) = structure.bracket_latitude(q.lat) else {
                return Vec::new();
            };

            let along = |grid_row: &GridRow, scale: f64| {
                grid_row.bracket(q.lon, periodic).map(|(w, e, f)| {
                    [
                        Triplet::new(row, grid_row.offset + w, scale * (1.0 - f)),
                        Triplet::new(row, grid_row.offset + e, scale * f),
                    ]
                })
            };

            let weights: Option<Vec<Triplet>> = if n == s {
                along(&structure.rows[n], 1.0).map(|t| t.to_vec())
            } else {
                along(&structure.rows[n], 1.0 - frac)
                    .zip(along(&structure.rows[s], frac))
                    .map(|(a, b)| a.into_iter().chain(b).collect())
            };

            weights
                .map(|t| t.into_iter().filter(|t| t.weight != 0.0).collect())
                .unwrap_or_default()
        })
        .collect();

    WeightMatrix::from_triplets(
        targets.len(),
        input.number_of_points(),
        rows.into_iter().flatten().collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::fixtures::{four_by_four, global_coarse};

    fn targets(points: &[(f64, f64)]) -> Vec<Option<LatLon>> {
        points.iter().map(|&(lat, lon)| Some(LatLon::new(lat, lon))).collect()
    }

    #[test]
    fn test_cell_centre() {
        let m = assemble(&four_by_four(), &targets(&[(25.0, 5.0)])).unwrap();
        let (cols, weights) = m.row(0);
        assert_eq!(cols, &[0, 1, 4, 5]);
        assert!(weights.iter().all(|w| (w - 0.25).abs() < 1e-12));
    }

    #[test]
    fn test_on_node() {
        let m = assemble(&four_by_four(), &targets(&[(20.0, 10.0)])).unwrap();
        assert_eq!(m.row(0), (&[5usize][..], &[1.0][..]));
    }

    #[test]
    fn test_outside_regional_grid_is_empty() {
        let m = assemble(&four_by_four(), &targets(&[(45.0, 10.0), (15.0, 40.0)])).unwrap();
        assert!(m.row_is_empty(0));
        assert!(m.row_is_empty(1));
    }

    #[test]
    fn test_wraps_periodic_grid() {
        let grid = global_coarse();
        let m = assemble(&grid, &targets(&[(0.0, 355.0)])).unwrap();
        let (cols, weights) = m.row(0);
        assert_eq!(cols.len(), 2);
        assert!((m.row_sum(0) - 1.0).abs() < 1e-12);
        assert!(weights.iter().all(|w| (w - 0.5).abs() < 1e-12));
    }

    #[test]
    fn test_unstructured_rejected() {
        let grid: Representation = representation::Unstructured::new(vec![0.0], vec![0.0])
            .unwrap()
            .into();
        assert!(assemble(&grid, &targets(&[(0.0, 0.0)])).is_err());
    }
}
