//! Neighbour selection strategies.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use regrid_common::geometry::arc_to_chord;
use regrid_common::{KeyHasher, Point3, RegridError, RegridResult};

use crate::kdtree::{Neighbour, PointSearch};

/// Chooses which points of the input participate in a target point's row.
///
/// Distances are surface distances in metres.
#[derive(Debug, Clone, PartialEq)]
pub enum Pick {
    /// Exactly `n` closest points.
    NClosest(usize),
    /// Every point within `distance`, topped up to the `n` closest when the
    /// radius yields fewer.
    DistanceWithMinNClosest { distance: f64, n: usize },
    /// Points within `distance`, sampled down to at most `n`.
    Sample { distance: f64, n: usize },
}

impl Pick {
    /// Names accepted by [`Pick::from_name`].
    pub const NAMES: &'static [&'static str] =
        &["nclosest", "distance-and-nclosest", "sample"];

    pub fn from_name(name: &str, n: usize, distance: f64) -> RegridResult<Self> {
        let pick = match name {
            "nclosest" => Pick::NClosest(n),
            "distance-and-nclosest" => Pick::DistanceWithMinNClosest { distance, n },
            "sample" => Pick::Sample { distance, n },
            other => {
                return Err(RegridError::configuration(format!(
                    "unknown pick '{}', expected one of: {}",
                    other,
                    Self::NAMES.join(", ")
                )))
            }
        };
        pick.validate()?;
        Ok(pick)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Pick::NClosest(_) => Self::NAMES[0],
            Pick::DistanceWithMinNClosest { .. } => Self::NAMES[1],
            Pick::Sample { .. } => Self::NAMES[2],
        }
    }

    /// Number of neighbours requested.
    pub fn n(&self) -> usize {
        match *self {
            Pick::NClosest(n) => n,
            Pick::DistanceWithMinNClosest { n, .. } | Pick::Sample { n, .. } => n,
        }
    }

    /// Whether a target may legitimately end up with no neighbours.
    pub fn allows_empty(&self) -> bool {
        matches!(self, Pick::Sample { .. })
    }

    pub fn validate(&self) -> RegridResult<()> {
        if self.n() == 0 {
            return Err(RegridError::configuration(format!(
                "{} needs at least one neighbour",
                self.name()
            )));
        }
        match *self {
            Pick::DistanceWithMinNClosest { distance, .. } | Pick::Sample { distance, .. }
                if !(distance.is_finite() && distance > 0.0) =>
            {
                Err(RegridError::configuration(format!(
                    "{} distance must be positive, got {}",
                    self.name(),
                    distance
                )))
            }
            _ => Ok(()),
        }
    }

    /// Select neighbours of `point`, the target at row `target`.
    ///
    /// Results are ordered by distance then payload, except for `Sample`
    /// which returns its sample ordered by payload.
    pub fn pick(
        &self,
        tree: &PointSearch,
        target: usize,
        point: &Point3,
    ) -> RegridResult<Vec<Neighbour>> {
        match *self {
            Pick::NClosest(n) => {
                if tree.len() < n {
                    return Err(RegridError::configuration(format!(
                        "nclosest={} but only {} input points",
                        n,
                        tree.len()
                    )));
                }
                Ok(tree.closest_n_points(point, n))
            }
            Pick::DistanceWithMinNClosest { distance, n } => {
                let mut found = tree.closest_within_radius(point, arc_to_chord(distance));
                if found.len() < n {
                    return Ok(tree.closest_n_points(point, n));
                }
                found.sort_by(Neighbour::cmp_distance);
                Ok(found)
            }
            Pick::Sample { distance, n } => {
                let mut found = tree.closest_within_radius(point, arc_to_chord(distance));
                found.sort_by_key(|nb| nb.payload);
                if found.len() > n {
                    found = reservoir_sample(found, n, target as u64);
                    found.sort_by_key(|nb| nb.payload);
                }
                Ok(found)
            }
        }
    }

    pub fn hash(&self, hasher: &mut KeyHasher) {
        hasher.add_str(self.name());
        hasher.add_usize(self.n());
        if let Pick::DistanceWithMinNClosest { distance, .. } | Pick::Sample { distance, .. } =
            self
        {
            hasher.add_f64(*distance);
        }
    }
}

impl Default for Pick {
    fn default() -> Self {
        Pick::NClosest(4)
    }
}

/// Algorithm R, seeded so the same target always keeps the same sample.
fn reservoir_sample(items: Vec<Neighbour>, n: usize, seed: u64) -> Vec<Neighbour> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut reservoir: Vec<Neighbour> = Vec::with_capacity(n);

    for (i, item) in items.into_iter().enumerate() {
        if i < n {
            reservoir.push(item);
        } else {
            let j = rng.gen_range(0..=i);
            if j < n {
                reservoir[j] = item;
            }
        }
    }
    reservoir
}

#[cfg(test)]
mod tests {
    use super::*;
    use regrid_common::geometry::to_cartesian;
    use regrid_common::EARTH_RADIUS_M;

    fn equator_line() -> PointSearch {
        PointSearch::new((0..60).map(|i| to_cartesian(0.0, i as f64)).collect()).unwrap()
    }

    fn degrees(d: f64) -> f64 {
        d.to_radians() * EARTH_RADIUS_M
    }

    #[test]
    fn test_nclosest_needs_enough_points() {
        let tree = PointSearch::new(vec![to_cartesian(0.0, 0.0)]).unwrap();
        let pick = Pick::NClosest(2);
        assert!(pick.pick(&tree, 0, &to_cartesian(0.0, 0.0)).is_err());
    }

    #[test]
    fn test_distance_topped_up() {
        let tree = equator_line();
        let pick = Pick::DistanceWithMinNClosest {
            distance: degrees(0.1),
            n: 3,
        };
        let found = pick.pick(&tree, 0, &to_cartesian(0.0, 30.2)).unwrap();
        let payloads: Vec<usize> = found.iter().map(|n| n.payload).collect();
        assert_eq!(payloads, vec![30, 31, 29]);
    }

    #[test]
    fn test_distance_keeps_all_within_radius() {
        let tree = equator_line();
        let pick = Pick::DistanceWithMinNClosest {
            distance: degrees(3.5),
            n: 2,
        };
        let found = pick.pick(&tree, 0, &to_cartesian(0.0, 30.0)).unwrap();
        assert_eq!(found.len(), 7);
        assert_eq!(found[0].payload, 30);
    }

    #[test]
    fn test_sample_deterministic_and_bounded() {
        let tree = equator_line();
        let pick = Pick::Sample {
            distance: degrees(10.5),
            n: 5,
        };
        let p = to_cartesian(0.0, 30.0);
        let a = pick.pick(&tree, 42, &p).unwrap();
        let b = pick.pick(&tree, 42, &p).unwrap();
        assert_eq!(a.len(), 5);
        assert_eq!(a, b);
        assert!(a.iter().all(|n| (20..=40).contains(&n.payload)));
    }

    #[test]
    fn test_names_round_trip() {
        for name in Pick::NAMES {
            let pick = Pick::from_name(name, 4, 1000.0).unwrap();
            assert_eq!(pick.name(), *name);
        }
        assert!(Pick::from_name("nearest", 4, 1000.0).is_err());
        assert!(Pick::from_name("sample", 4, -1.0).is_err());
        assert!(Pick::from_name("nclosest", 0, 1.0).is_err());
    }
}
