//! Turning picked neighbours into matrix rows.

use regrid_common::{KeyHasher, RegridError, RegridResult, Triplet};

use crate::kdtree::Neighbour;

/// Squared chord distance below which two points are treated as the same.
pub const DEFAULT_EXACT_MATCH_EPSILON: f64 = 1e-12;

/// Distances within this of the minimum count as a tie for
/// [`DistanceWeighting::NearestNeighbourWithLowestIndex`].
const TIE_EPSILON: f64 = 1e-14;

/// How neighbours are weighted.
#[derive(Debug, Clone, PartialEq)]
pub enum DistanceWeighting {
    /// Weight 1 to the first (closest) neighbour.
    NearestNeighbour,
    /// Weight 1 to the closest neighbour, ties broken by lowest payload.
    NearestNeighbourWithLowestIndex,
    /// Weights proportional to `1 / distance^power`.
    InverseDistanceWeighting { power: f64, epsilon: f64 },
    /// Equal weights.
    NoDistanceWeighting,
}

impl DistanceWeighting {
    pub const NAMES: &'static [&'static str] = &[
        "nearest-neighbour",
        "nearest-neighbour-with-lowest-index",
        "inverse-distance-weighting",
        "no-distance-weighting",
    ];

    /// Look up a weighting by name, with default parameters.
    pub fn from_name(name: &str) -> RegridResult<Self> {
        match name {
            "nearest-neighbour" => Ok(DistanceWeighting::NearestNeighbour),
            "nearest-neighbour-with-lowest-index" => {
                Ok(DistanceWeighting::NearestNeighbourWithLowestIndex)
            }
            "inverse-distance-weighting" => Ok(Self::inverse_distance()),
            "no-distance-weighting" => Ok(DistanceWeighting::NoDistanceWeighting),
            other => Err(RegridError::configuration(format!(
                "unknown distance weighting '{}', expected one of: {}",
                other,
                Self::NAMES.join(", ")
            ))),
        }
    }

    /// Inverse-square distance weighting with the default exact-match epsilon.
    pub fn inverse_distance() -> Self {
        DistanceWeighting::InverseDistanceWeighting {
            power: 2.0,
            epsilon: DEFAULT_EXACT_MATCH_EPSILON,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DistanceWeighting::NearestNeighbour => Self::NAMES[0],
            DistanceWeighting::NearestNeighbourWithLowestIndex => Self::NAMES[1],
            DistanceWeighting::InverseDistanceWeighting { .. } => Self::NAMES[2],
            DistanceWeighting::NoDistanceWeighting => Self::NAMES[3],
        }
    }

    pub fn validate(&self) -> RegridResult<()> {
        if let DistanceWeighting::InverseDistanceWeighting { power, epsilon } = *self {
            if !(power.is_finite() && power > 0.0) {
                return Err(RegridError::configuration(format!(
                    "inverse distance power must be positive, got {}",
                    power
                )));
            }
            if !(epsilon.is_finite() && epsilon >= 0.0) {
                return Err(RegridError::configuration(format!(
                    "exact-match epsilon must be non-negative, got {}",
                    epsilon
                )));
            }
        }
        Ok(())
    }

    /// Weight the neighbours of output point `row`.
    ///
    /// No neighbours gives no triplets.
    pub fn weights(&self, row: usize, neighbours: &[Neighbour]) -> RegridResult<Vec<Triplet>> {
        let Some(first) = neighbours.first() else {
            return Ok(Vec::new());
        };

        match *self {
            DistanceWeighting::NearestNeighbour => {
                let closest = neighbours
                    .iter()
                    .fold(first, |best, n| if n.distance2 < best.distance2 { n } else { best });
                Ok(vec![Triplet::new(row, closest.payload, 1.0)])
            }
            DistanceWeighting::NearestNeighbourWithLowestIndex => {
                let min = neighbours
                    .iter()
                    .map(|n| n.distance2)
                    .fold(f64::INFINITY, f64::min);
                let chosen = neighbours
                    .iter()
                    .filter(|n| n.distance2 <= min + TIE_EPSILON)
                    .map(|n| n.payload)
                    .min()
                    .unwrap_or(first.payload);
                Ok(vec![Triplet::new(row, chosen, 1.0)])
            }
            DistanceWeighting::InverseDistanceWeighting { power, epsilon } => {
                let exact = neighbours
                    .iter()
                    .filter(|n| n.distance2 <= epsilon)
                    .map(|n| n.payload)
                    .min();
                if let Some(col) = exact {
                    return Ok(vec![Triplet::new(row, col, 1.0)]);
                }

                let raw: Vec<f64> = neighbours
                    .iter()
                    .map(|n| 1.0 / n.distance2.powf(power / 2.0))
                    .collect();
                let total: f64 = raw.iter().sum();
                if !(total.is_finite() && total > 0.0) {
                    return Err(RegridError::invalid_matrix(
                        self.name(),
                        "",
                        "",
                        format!("total inverse-distance weight {}", total),
                    )
                    .at_row(row));
                }

                Ok(neighbours
                    .iter()
                    .zip(raw)
                    .map(|(n, w)| Triplet::new(row, n.payload, w / total))
                    .collect())
            }
            DistanceWeighting::NoDistanceWeighting => {
                let w = 1.0 / neighbours.len() as f64;
                Ok(neighbours
                    .iter()
                    .map(|n| Triplet::new(row, n.payload, w))
                    .collect())
            }
        }
    }

    pub fn hash(&self, hasher: &mut KeyHasher) {
        hasher.add_str(self.name());
        if let DistanceWeighting::InverseDistanceWeighting { power, epsilon } = *self {
            hasher.add_f64(power);
            hasher.add_f64(epsilon);
        }
    }
}

impl Default for DistanceWeighting {
    fn default() -> Self {
        Self::inverse_distance()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn neighbour(payload: usize, distance2: f64) -> Neighbour {
        Neighbour {
            point: [0.0; 3],
            payload,
            distance2,
        }
    }

    #[test]
    fn test_lowest_index_tie_break() {
        let w = DistanceWeighting::NearestNeighbourWithLowestIndex;
        let a = [neighbour(9, 0.5), neighbour(4, 0.5), neighbour(1, 0.7)];
        let b = [neighbour(4, 0.5), neighbour(9, 0.5), neighbour(1, 0.7)];
        for set in [&a[..], &b[..]] {
            let t = w.weights(3, set).unwrap();
            assert_eq!(t, vec![Triplet::new(3, 4, 1.0)]);
        }
    }

    #[test]
    fn test_plain_nearest_takes_first_minimum() {
        let w = DistanceWeighting::NearestNeighbour;
        let t = w.weights(0, &[neighbour(9, 0.5), neighbour(4, 0.5)]).unwrap();
        assert_eq!(t[0].col, 9);
    }

    #[test]
    fn test_inverse_distance_partition_of_unity() {
        let w = DistanceWeighting::inverse_distance();
        let t = w
            .weights(0, &[neighbour(0, 1.0), neighbour(1, 4.0), neighbour(2, 16.0)])
            .unwrap();
        let sum: f64 = t.iter().map(|t| t.weight).sum();
        assert!((sum - 1.0).abs() < 1e-12);
        // 1/d^2 with d^2 = 1, 4, 16.
        assert!((t[0].weight / t[1].weight - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_inverse_distance_exact_match() {
        let w = DistanceWeighting::inverse_distance();
        let t = w.weights(5, &[neighbour(2, 0.0), neighbour(1, 0.3)]).unwrap();
        assert_eq!(t, vec![Triplet::new(5, 2, 1.0)]);
    }

    #[test]
    fn test_inverse_distance_total_overflow_is_invalid() {
        let w = DistanceWeighting::InverseDistanceWeighting {
            power: 2.0,
            epsilon: 0.0,
        };
        let err = w.weights(8, &[neighbour(0, 1e-320)]).unwrap_err();
        assert!(matches!(
            err,
            RegridError::InvalidWeightMatrix { row: Some(8), .. }
        ));
    }

    #[test]
    fn test_equal_weights() {
        let w = DistanceWeighting::NoDistanceWeighting;
        let t = w
            .weights(0, &[neighbour(0, 1.0), neighbour(1, 2.0), neighbour(2, 3.0), neighbour(3, 4.0)])
            .unwrap();
        assert!(t.iter().all(|t| t.weight == 0.25));
    }

    #[test]
    fn test_names() {
        for name in DistanceWeighting::NAMES {
            assert_eq!(DistanceWeighting::from_name(name).unwrap().name(), *name);
        }
        assert!(DistanceWeighting::from_name("bogus").is_err());
    }
}
