//! Finite-element assembly: interpolation within mesh elements, and the
//! conservative operator derived from it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use rayon::prelude::*;
use tracing::debug;

use regrid_common::{BoundingBox, LatLon, Point3, RegridResult, Triplet};
use representation::Representation;

use crate::matrix::WeightMatrix;
use crate::mesh::{Mesh, MeshGenerator, MeshLocator, QuadWeights};

/// Interpolate from the nodes of a mesh over `input` to each target.
pub(crate) fn interpolate(
    generator: &dyn MeshGenerator,
    input: &Representation,
    targets: &[Option<LatLon>],
    quads: QuadWeights,
) -> RegridResult<WeightMatrix> {
    let mesh = generator.generate(input)?;
    let points: Vec<Option<Point3>> = targets.iter().map(|t| t.map(LatLon::to_cartesian)).collect();
    locate_all(&mesh, &points, quads)
}

/// Conservative remapping.
///
/// Input nodes are located in a mesh over the output, giving the linear
/// interpolation `B` from output to input. The operator is its transpose
/// scaled by the ratio of lumped node masses,
/// `W[i][j] = B[j][i] * m_in[j] / m_out[i]`, so that the mass-weighted sum
/// of a field is the same before and after remapping.
pub(crate) fn conservative(
    generator: &dyn MeshGenerator,
    input: &Representation,
    output: &Representation,
    targets: &[Option<LatLon>],
    cropping: Option<&BoundingBox>,
) -> RegridResult<WeightMatrix> {
    let input_mesh = generator.generate(input)?;
    let output_mesh = generator.generate(output)?;

    let sources: Vec<Option<Point3>> = input
        .points()?
        .zip(&input_mesh.nodes)
        .map(|(ll, p)| match cropping {
            Some(area) if !area.contains(ll.lat, ll.lon) => None,
            _ => Some(*p),
        })
        .collect();

    let backward = locate_all(&output_mesh, &sources, QuadWeights::Triangulated)?;
    let input_mass = input_mesh.lumped_masses();
    let output_mass = output_mesh.lumped_masses();

    let triplets: Vec<Triplet> = backward
        .transpose()
        .triplets()
        .filter(|t| targets[t.row].is_some() && output_mass[t.row] > 0.0)
        .map(|t| Triplet::new(t.row, t.col, t.weight * input_mass[t.col] / output_mass[t.row]))
        .collect();

    WeightMatrix::from_triplets(targets.len(), input.number_of_points(), triplets)
}

fn locate_all(
    mesh: &Mesh,
    points: &[Option<Point3>],
    quads: QuadWeights,
) -> RegridResult<WeightMatrix> {
    let start = Instant::now();
    let locator = MeshLocator::new(mesh)?;
    let fallbacks = AtomicUsize::new(0);

    let rows: Vec<Vec<Triplet>> = points
        .par_iter()
        .enumerate()
        .map(|(row, p)| {
            let Some(p) = p else {
                return Vec::new();
            };
            let location = locator.locate(p, quads);
            if location.fallback {
                fallbacks.fetch_add(1, Ordering::Relaxed);
            }
            location
                .weights
                .into_iter()
                .filter(|&(_, w)| w != 0.0)
                .map(|(col, w)| Triplet::new(row, col, w))
                .collect()
        })
        .collect();

    debug!(
        points = points.len(),
        elements = mesh.elements.len(),
        fallbacks = fallbacks.load(Ordering::Relaxed),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Located points in mesh"
    );

    WeightMatrix::from_triplets(
        points.len(),
        mesh.number_of_nodes(),
        rows.into_iter().flatten().collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::StructuredMeshGenerator;
    use test_utils::fixtures::{four_by_four, regular_ll};

    #[test]
    fn test_linear_reproduces_nodes() {
        let grid = four_by_four();
        let targets: Vec<Option<LatLon>> = grid.points().unwrap().map(Some).collect();
        let m = interpolate(&StructuredMeshGenerator, &grid, &targets, QuadWeights::Triangulated)
            .unwrap();
        for r in 0..16 {
            let (cols, weights) = m.row(r);
            let own: f64 = cols
                .iter()
                .zip(weights)
                .filter(|(c, _)| **c == r)
                .map(|(_, w)| w)
                .sum();
            assert!((own - 1.0).abs() < 1e-9, "row {}", r);
        }
    }

    #[test]
    fn test_conservative_preserves_mass() {
        let input = regular_ll(40.0, 0.0, 2.0, 11);
        let output = regular_ll(40.0, 0.0, 5.0, 5);
        let targets: Vec<Option<LatLon>> = output.points().unwrap().map(Some).collect();
        let m = conservative(&StructuredMeshGenerator, &input, &output, &targets, None).unwrap();

        let m_in = StructuredMeshGenerator.generate(&input).unwrap().lumped_masses();
        let m_out = StructuredMeshGenerator.generate(&output).unwrap().lumped_masses();
        let field: Vec<f64> = (0..input.number_of_points()).map(|i| 1.0 + (i % 7) as f64).collect();
        let remapped = m.apply(&field, None).unwrap();

        let before: f64 = field.iter().zip(&m_in).map(|(v, m)| v * m).sum();
        let after: f64 = remapped.iter().zip(&m_out).map(|(v, m)| v * m).sum();
        assert!(((before - after) / before).abs() < 1e-9);
    }
}
