//! k-d tree over points on the unit sphere.
//!
//! The tree is stored as flat arrays: points and payloads are reordered so
//! each leaf owns a contiguous range, and nodes refer to children by index.
//! Splits are at the median of the widest axis.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Instant;

use tracing::debug;

use regrid_common::geometry::squared_distance;
use regrid_common::{LatLon, Point3, RegridError, RegridResult};
use representation::Representation;

/// Maximum number of points in a leaf bucket.
const LEAF_SIZE: usize = 16;

/// Slack when deciding whether a subtree can be skipped. A subtree is pruned
/// only when its distance bound is strictly greater than the current worst
/// distance plus this amount.
const PRUNE_EPSILON: f64 = 1e-12;

#[inline]
fn strictly_greater(a: f64, b: f64) -> bool {
    a > b + PRUNE_EPSILON
}

/// A point returned by a query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbour {
    pub point: Point3,
    /// Index of the point in the representation the tree was built from.
    pub payload: usize,
    /// Squared chord distance to the query point.
    pub distance2: f64,
}

impl Neighbour {
    /// Order by distance, then by payload.
    pub fn cmp_distance(&self, other: &Self) -> Ordering {
        self.distance2
            .total_cmp(&other.distance2)
            .then(self.payload.cmp(&other.payload))
    }
}

/// Heap entry so `BinaryHeap` keeps the current worst candidate on top.
struct Candidate(Neighbour);

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp_distance(&other.0)
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        start: usize,
        end: usize,
    },
    Split {
        axis: usize,
        value: f64,
        left: usize,
        right: usize,
    },
}

/// Spatial index answering nearest-neighbour and radius queries.
///
/// Immutable once built and safe to query from many threads.
#[derive(Debug, Clone)]
pub struct PointSearch {
    points: Vec<Point3>,
    payloads: Vec<usize>,
    nodes: Vec<Node>,
}

impl PointSearch {
    /// Build from points whose payloads are their positions in `points`.
    pub fn new(points: Vec<Point3>) -> RegridResult<Self> {
        let payloads = (0..points.len()).collect();
        Self::with_payloads(points, payloads)
    }

    /// Build from points with explicit payloads.
    pub fn with_payloads(points: Vec<Point3>, payloads: Vec<usize>) -> RegridResult<Self> {
        if points.is_empty() {
            return Err(RegridError::empty_domain("cannot search an empty point set"));
        }
        if points.len() != payloads.len() {
            return Err(RegridError::DimensionMismatch {
                expected: points.len(),
                actual: payloads.len(),
            });
        }

        let start = Instant::now();
        let n = points.len();
        let mut order: Vec<usize> = (0..n).collect();
        let mut nodes = Vec::with_capacity(2 * n / LEAF_SIZE + 1);
        build_node(&points, &payloads, &mut order, 0, n, &mut nodes);

        let tree = Self {
            points: order.iter().map(|&i| points[i]).collect(),
            payloads: order.iter().map(|&i| payloads[i]).collect(),
            nodes,
        };

        debug!(
            points = n,
            nodes = tree.nodes.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Built point search"
        );
        Ok(tree)
    }

    /// Build from geographic coordinates.
    pub fn from_points<I>(points: I) -> RegridResult<Self>
    where
        I: IntoIterator<Item = LatLon>,
    {
        Self::new(points.into_iter().map(LatLon::to_cartesian).collect())
    }

    /// Build over every point of a representation.
    pub fn from_representation(rep: &Representation) -> RegridResult<Self> {
        Self::from_points(rep.points()?).map_err(|e| match e {
            RegridError::EmptyDomain(_) => {
                RegridError::empty_domain(format!("representation {} has no points", rep))
            }
            other => other,
        })
    }

    /// Build over the points of `rep` selected by `indices`, keeping the
    /// original indices as payloads.
    pub fn from_subset(rep: &Representation, indices: &[usize]) -> RegridResult<Self> {
        let all: Vec<Point3> = rep.points()?.map(LatLon::to_cartesian).collect();
        let mut points = Vec::with_capacity(indices.len());
        for &i in indices {
            let p = all.get(i).ok_or_else(|| {
                RegridError::configuration(format!(
                    "index {} outside representation {} of {} points",
                    i,
                    rep,
                    all.len()
                ))
            })?;
            points.push(*p);
        }
        Self::with_payloads(points, indices.to_vec())
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The `k` closest points ordered by ascending distance, ties by payload.
    ///
    /// Returns fewer than `k` entries only when the tree holds fewer points.
    pub fn closest_n_points(&self, p: &Point3, k: usize) -> Vec<Neighbour> {
        if k == 0 {
            return Vec::new();
        }
        let mut heap = BinaryHeap::with_capacity(k + 1);
        self.search_n(0, p, k, &mut heap);

        let mut result: Vec<Neighbour> = heap.into_iter().map(|c| c.0).collect();
        result.sort_by(Neighbour::cmp_distance);
        result
    }

    /// The closest point, ties broken by lowest payload.
    pub fn closest_point(&self, p: &Point3) -> Neighbour {
        // Construction guarantees at least one point.
        self.closest_n_points(p, 1)[0]
    }

    /// All points within chord distance `radius`, in no particular order.
    pub fn closest_within_radius(&self, p: &Point3, radius: f64) -> Vec<Neighbour> {
        let mut result = Vec::new();
        if radius < 0.0 {
            return result;
        }
        self.search_radius(0, p, radius * radius, &mut result);
        result
    }

    fn search_n(&self, node: usize, p: &Point3, k: usize, heap: &mut BinaryHeap<Candidate>) {
        match self.nodes[node] {
            Node::Leaf { start, end } => {
                for i in start..end {
                    let candidate = Neighbour {
                        point: self.points[i],
                        payload: self.payloads[i],
                        distance2: squared_distance(p, &self.points[i]),
                    };
                    if heap.len() < k {
                        heap.push(Candidate(candidate));
                    } else if let Some(worst) = heap.peek() {
                        if candidate.cmp_distance(&worst.0) == Ordering::Less {
                            heap.pop();
                            heap.push(Candidate(candidate));
                        }
                    }
                }
            }
            Node::Split {
                axis,
                value,
                left,
                right,
            } => {
                let diff = p[axis] - value;
                let (near, far) = if diff < 0.0 { (left, right) } else { (right, left) };

                self.search_n(near, p, k, heap);

                let visit_far = heap.len() < k
                    || heap
                        .peek()
                        .map_or(true, |worst| !strictly_greater(diff * diff, worst.0.distance2));
                if visit_far {
                    self.search_n(far, p, k, heap);
                }
            }
        }
    }

    fn search_radius(&self, node: usize, p: &Point3, radius2: f64, out: &mut Vec<Neighbour>) {
        match self.nodes[node] {
            Node::Leaf { start, end } => {
                for i in start..end {
                    let distance2 = squared_distance(p, &self.points[i]);
                    if distance2 <= radius2 {
                        out.push(Neighbour {
                            point: self.points[i],
                            payload: self.payloads[i],
                            distance2,
                        });
                    }
                }
            }
            Node::Split {
                axis,
                value,
                left,
                right,
            } => {
                let diff = p[axis] - value;
                let (near, far) = if diff < 0.0 { (left, right) } else { (right, left) };
                self.search_radius(near, p, radius2, out);
                if !strictly_greater(diff * diff, radius2) {
                    self.search_radius(far, p, radius2, out);
                }
            }
        }
    }
}

/// Recursively build the node covering `order[start..end]`, returning its index.
fn build_node(
    points: &[Point3],
    payloads: &[usize],
    order: &mut [usize],
    start: usize,
    end: usize,
    nodes: &mut Vec<Node>,
) -> usize {
    let id = nodes.len();

    if end - start <= LEAF_SIZE {
        nodes.push(Node::Leaf { start, end });
        return id;
    }

    // Widest axis over this range.
    let mut min = [f64::INFINITY; 3];
    let mut max = [f64::NEG_INFINITY; 3];
    for &i in &order[start..end] {
        for d in 0..3 {
            min[d] = min[d].min(points[i][d]);
            max[d] = max[d].max(points[i][d]);
        }
    }
    let axis = (0..3)
        .max_by(|&a, &b| (max[a] - min[a]).total_cmp(&(max[b] - min[b])))
        .unwrap_or(0);

    // Partition around the median; payload breaks coordinate ties so the
    // layout is independent of input order.
    let mid = start + (end - start) / 2;
    order[start..end].select_nth_unstable_by(mid - start, |&a, &b| {
        points[a][axis]
            .total_cmp(&points[b][axis])
            .then(payloads[a].cmp(&payloads[b]))
    });
    let value = points[order[mid]][axis];

    // Reserve this slot, then fill in children.
    nodes.push(Node::Leaf { start, end });
    let left = build_node(points, payloads, order, start, mid, nodes);
    let right = build_node(points, payloads, order, mid, end, nodes);
    nodes[id] = Node::Split {
        axis,
        value,
        left,
        right,
    };
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use regrid_common::geometry::to_cartesian;

    #[test]
    fn test_empty_domain() {
        assert!(matches!(
            PointSearch::new(Vec::new()),
            Err(RegridError::EmptyDomain(_))
        ));
    }

    #[test]
    fn test_single_point() {
        let tree = PointSearch::new(vec![to_cartesian(10.0, 20.0)]).unwrap();
        let n = tree.closest_point(&to_cartesian(-50.0, 100.0));
        assert_eq!(n.payload, 0);
        assert_eq!(tree.closest_n_points(&to_cartesian(0.0, 0.0), 3).len(), 1);
    }

    #[test]
    fn test_equal_distance_ordered_by_payload() {
        // Two points symmetric about the query, inserted high payload first.
        let points = vec![to_cartesian(0.0, 1.0), to_cartesian(0.0, -1.0)];
        let tree = PointSearch::with_payloads(points, vec![7, 3]).unwrap();
        let result = tree.closest_n_points(&to_cartesian(0.0, 0.0), 2);
        assert_eq!(result[0].payload, 3);
        assert_eq!(result[1].payload, 7);
    }

    #[test]
    fn test_radius_search() {
        let points: Vec<Point3> = (0..100).map(|i| to_cartesian(0.0, i as f64)).collect();
        let tree = PointSearch::new(points).unwrap();
        let chord = regrid_common::geometry::arc_to_chord(
            2.5_f64.to_radians() * regrid_common::EARTH_RADIUS_M,
        );
        let mut found: Vec<usize> = tree
            .closest_within_radius(&to_cartesian(0.0, 50.0), chord)
            .into_iter()
            .map(|n| n.payload)
            .collect();
        found.sort_unstable();
        assert_eq!(found, vec![48, 49, 50, 51, 52]);
    }

    #[test]
    fn test_radius_search_may_be_empty() {
        let tree = PointSearch::new(vec![to_cartesian(0.0, 0.0)]).unwrap();
        assert!(tree
            .closest_within_radius(&to_cartesian(45.0, 45.0), 1e-3)
            .is_empty());
    }
}
