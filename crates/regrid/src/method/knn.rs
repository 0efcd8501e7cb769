//! Neighbour-search assembly: each output point picks input neighbours from
//! a k-d tree and weights them.

use rayon::prelude::*;
use tracing::debug;

use point_search::{DistanceWeighting, Neighbour, Pick, PointSearch};
use regrid_common::geometry::{arc_to_chord, normalise_longitude};
use regrid_common::{BoundingBox, LatLon, Point3, RegridResult, Triplet};

use super::pseudo_laplace::pseudo_laplace_weights;
use crate::matrix::WeightMatrix;

/// Relative shrink of the edge clearance, so rounding in the squared
/// distances never counts a point on the edge as clear of it.
const CLEARANCE_SLACK: f64 = 1e-9;

/// How the picked neighbours of a row become weights.
#[derive(Debug, Clone, Copy)]
pub(crate) enum RowWeights<'a> {
    Distance(&'a DistanceWeighting),
    PseudoLaplace,
}

impl RowWeights<'_> {
    fn row(&self, row: usize, p: &Point3, neighbours: &[Neighbour]) -> RegridResult<Vec<Triplet>> {
        match self {
            RowWeights::Distance(w) => w.weights(row, neighbours),
            RowWeights::PseudoLaplace => pseudo_laplace_weights(row, p, neighbours),
        }
    }
}

/// Rows are built in parallel and merged into one matrix afterwards.
pub(crate) fn assemble(
    tree: &PointSearch,
    targets: &[Option<LatLon>],
    cols: usize,
    pick: &Pick,
    weights: RowWeights<'_>,
) -> RegridResult<WeightMatrix> {
    let rows: Vec<Vec<Triplet>> = targets
        .par_iter()
        .enumerate()
        .map(|(row, target)| match target {
            Some(target) => search_row(tree, row, target, pick, weights),
            None => Ok(Vec::new()),
        })
        .collect::<RegridResult<_>>()?;

    WeightMatrix::from_triplets(targets.len(), cols, rows.into_iter().flatten().collect())
}

/// Like [`assemble`], searching `near`, a subset of the input holding every
/// point inside `area`.
///
/// A row is kept only when everything its pick looked at lies closer to the
/// target than any point outside `area`, which makes it the row a search of
/// the whole input would give. The other rows are searched again in the
/// tree returned by `full`, built only if some row needs it.
pub(crate) fn assemble_near<F>(
    near: &PointSearch,
    area: &BoundingBox,
    full: F,
    targets: &[Option<LatLon>],
    cols: usize,
    pick: &Pick,
    weights: RowWeights<'_>,
) -> RegridResult<WeightMatrix>
where
    F: FnOnce() -> RegridResult<PointSearch>,
{
    let mut rows: Vec<Option<Vec<Triplet>>> = targets
        .par_iter()
        .enumerate()
        .map(|(row, target)| {
            let Some(target) = target else {
                return Ok(Some(Vec::new()));
            };
            let p = target.to_cartesian();
            let Ok(neighbours) = pick.pick(near, row, &p) else {
                return Ok(None);
            };
            match (reach2(pick, &neighbours), clearance2(area, target)) {
                (Some(reach), Some(clear)) if reach < clear => {
                    weights.row(row, &p, &neighbours).map(Some)
                }
                _ => Ok(None),
            }
        })
        .collect::<RegridResult<_>>()?;

    let redo: Vec<usize> = rows
        .iter()
        .enumerate()
        .filter(|(_, r)| r.is_none())
        .map(|(i, _)| i)
        .collect();

    if !redo.is_empty() {
        debug!(
            rows = redo.len(),
            total = targets.len(),
            near = near.len(),
            "Rows reach past the cropped input, searching all of it"
        );
        let tree = full()?;
        let fixed: Vec<(usize, Vec<Triplet>)> = redo
            .par_iter()
            .map(|&row| {
                let triplets = match &targets[row] {
                    Some(target) => search_row(&tree, row, target, pick, weights)?,
                    None => Vec::new(),
                };
                Ok((row, triplets))
            })
            .collect::<RegridResult<_>>()?;
        for (row, triplets) in fixed {
            rows[row] = Some(triplets);
        }
    }

    let triplets = rows.into_iter().flatten().flatten().collect();
    WeightMatrix::from_triplets(targets.len(), cols, triplets)
}

fn search_row(
    tree: &PointSearch,
    row: usize,
    target: &LatLon,
    pick: &Pick,
    weights: RowWeights<'_>,
) -> RegridResult<Vec<Triplet>> {
    let p = target.to_cartesian();
    let neighbours = pick.pick(tree, row, &p)?;
    weights.row(row, &p, &neighbours)
}

/// Squared chord out to which `pick` examined the input, or `None` if it
/// came back short and a larger tree could have answered differently.
fn reach2(pick: &Pick, neighbours: &[Neighbour]) -> Option<f64> {
    let farthest = neighbours.iter().map(|n| n.distance2).fold(0.0, f64::max);
    match *pick {
        Pick::NClosest(n) => (neighbours.len() >= n).then_some(farthest),
        Pick::DistanceWithMinNClosest { distance, n } => (neighbours.len() >= n)
            .then(|| farthest.max(arc_to_chord(distance).powi(2))),
        Pick::Sample { distance, .. } => Some(arc_to_chord(distance).powi(2)),
    }
}

/// Squared chord from `target` to the nearest point outside `area`, or
/// `None` if the target is not inside it.
fn clearance2(area: &BoundingBox, target: &LatLon) -> Option<f64> {
    if !area.contains(target.lat, target.lon) {
        return None;
    }

    // Degrees of arc; latitude edges at the poles bound nothing.
    let mut clearance = 180.0f64;
    if area.north < 90.0 {
        clearance = clearance.min(area.north - target.lat);
    }
    if area.south > -90.0 {
        clearance = clearance.min(target.lat - area.south);
    }
    if !area.is_periodic_west_east() {
        let lon = normalise_longitude(target.lon, area.west);
        let cos_lat = target.lat.to_radians().cos();
        for delta in [lon - area.west, area.east - lon] {
            // Past 90 degrees the nearest point of the edge meridian is a pole.
            let delta = delta.clamp(0.0, 90.0).to_radians();
            let arc = (cos_lat * delta.sin()).clamp(-1.0, 1.0).asin().to_degrees();
            clearance = clearance.min(arc);
        }
    }

    let clearance = clearance.max(0.0).to_radians();
    let chord = 2.0 * (clearance / 2.0).sin();
    Some(chord * chord * (1.0 - CLEARANCE_SLACK))
}
