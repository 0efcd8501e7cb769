//! Meshes over representations and point location within them.
//!
//! Finite-element methods interpolate inside the elements of a mesh whose
//! nodes are the points of the input representation. Producing the mesh is
//! delegated to a [`MeshGenerator`]; the built-in [`StructuredMeshGenerator`]
//! handles row-structured grids, and an external triangulator can be plugged
//! in for scattered points.

use std::fmt::Debug;
use std::time::Instant;

use nalgebra::{Matrix2, Vector2, Vector3};
use tracing::debug;

use point_search::PointSearch;
use regrid_common::{Point3, RegridError, RegridResult};
use representation::{GridRow, Representation};

/// Candidate elements examined per located point.
const CANDIDATE_ELEMENTS: usize = 16;

/// Barycentric slack accepted on element edges.
const EDGE_TOLERANCE: f64 = 1e-10;

/// Newton iterations for the inverse bilinear map.
const BILINEAR_ITERATIONS: usize = 12;

/// One mesh element; indices are node (point) indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Element {
    Triangle([usize; 3]),
    /// Corners in order around the quad.
    Quad([usize; 4]),
}

impl Element {
    pub fn nodes(&self) -> &[usize] {
        match self {
            Element::Triangle(n) => n,
            Element::Quad(n) => n,
        }
    }

    /// Split into triangles sharing the first corner.
    pub fn triangles(&self) -> impl Iterator<Item = [usize; 3]> {
        let (a, b) = match *self {
            Element::Triangle(t) => (Some(t), None),
            Element::Quad([n0, n1, n2, n3]) => (Some([n0, n1, n2]), Some([n0, n2, n3])),
        };
        a.into_iter().chain(b)
    }
}

/// Nodes on the unit sphere plus the elements joining them.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub nodes: Vec<Point3>,
    pub elements: Vec<Element>,
}

impl Mesh {
    pub fn number_of_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Area of each node's share of the mesh: every element gives an equal
    /// fraction of its (planar) area to each of its corners.
    pub fn lumped_masses(&self) -> Vec<f64> {
        let mut masses = vec![0.0; self.nodes.len()];
        for element in &self.elements {
            let nodes = element.nodes();
            let area: f64 = element
                .triangles()
                .map(|[a, b, c]| triangle_area(&self.nodes[a], &self.nodes[b], &self.nodes[c]))
                .sum();
            let share = area / nodes.len() as f64;
            for &n in nodes {
                masses[n] += share;
            }
        }
        masses
    }
}

/// Source of meshes for finite-element methods.
pub trait MeshGenerator: Send + Sync + Debug {
    /// Name used in cache keys and logs.
    fn name(&self) -> &str;

    /// Mesh whose nodes are the points of `rep`, in point order.
    fn generate(&self, rep: &Representation) -> RegridResult<Mesh>;
}

/// Meshes row-structured grids.
///
/// Adjacent rows with identical longitudes are joined by quads, other row
/// pairs are zipped together with triangles. Periodic grids wrap west to
/// east. Nothing covers the caps beyond the first and last rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredMeshGenerator;

impl MeshGenerator for StructuredMeshGenerator {
    fn name(&self) -> &str {
        "structured"
    }

    fn generate(&self, rep: &Representation) -> RegridResult<Mesh> {
        let structure = rep.structure().ok_or_else(|| {
            RegridError::unsupported(format!(
                "no structured mesh for {}; supply a mesh generator",
                rep
            ))
        })?;

        let start = Instant::now();
        let nodes: Vec<Point3> = rep.points()?.map(|p| p.to_cartesian()).collect();
        let periodic = structure.periodic_west_east;

        let mut elements = Vec::new();
        for pair in structure.rows.windows(2) {
            let (north, south) = (&pair[0], &pair[1]);
            if same_longitudes(north, south) {
                quads_between(north, south, periodic, &mut elements);
            } else {
                zip_rows(north, south, periodic, &mut elements);
            }
        }

        debug!(
            grid = %rep,
            nodes = nodes.len(),
            elements = elements.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Generated structured mesh"
        );

        Ok(Mesh { nodes, elements })
    }
}

fn same_longitudes(a: &GridRow, b: &GridRow) -> bool {
    a.count == b.count
        && (a.first_longitude - b.first_longitude).abs() < 1e-9
        && (a.increment - b.increment).abs() < 1e-9
}

fn quads_between(north: &GridRow, south: &GridRow, periodic: bool, out: &mut Vec<Element>) {
    let n = north.count;
    let last = if periodic { n } else { n.saturating_sub(1) };
    for i in 0..last {
        let j = (i + 1) % n;
        if i == j {
            continue;
        }
        out.push(Element::Quad([
            north.offset + i,
            north.offset + j,
            south.offset + j,
            south.offset + i,
        ]));
    }
}

/// Triangulate between two rows by always advancing along the row whose
/// next point lies further west.
fn zip_rows(north: &GridRow, south: &GridRow, periodic: bool, out: &mut Vec<Element>) {
    if north.count == 0 || south.count == 0 {
        return;
    }
    let (end_n, end_s) = if periodic {
        (north.count, south.count)
    } else {
        (north.count - 1, south.count - 1)
    };

    let node_n = |i: usize| north.offset + i % north.count;
    let node_s = |j: usize| south.offset + j % south.count;

    let (mut i, mut j) = (0usize, 0usize);
    while i < end_n || j < end_s {
        let advance_north = if i == end_n {
            false
        } else if j == end_s {
            true
        } else {
            north.longitude(i + 1) <= south.longitude(j + 1)
        };

        let triangle = if advance_north {
            i += 1;
            [node_n(i - 1), node_s(j), node_n(i)]
        } else {
            j += 1;
            [node_n(i), node_s(j - 1), node_s(j)]
        };

        if triangle[0] != triangle[1] && triangle[1] != triangle[2] && triangle[0] != triangle[2] {
            out.push(Element::Triangle(triangle));
        }
    }
}

/// Where a point falls within a mesh, as node weights summing to one.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub weights: Vec<(usize, f64)>,
    /// Whether the point was outside every element and took the nearest node.
    pub fallback: bool,
}

/// How weights inside quads are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuadWeights {
    /// Split quads into triangles and use barycentric weights.
    Triangulated,
    /// Inverse bilinear mapping.
    Bilinear,
}

/// Locates points in a mesh.
///
/// Candidate elements come from a search over element centroids; each is
/// tested by intersecting the ray from the sphere's centre through the point.
pub struct MeshLocator<'a> {
    mesh: &'a Mesh,
    centroids: Option<PointSearch>,
    nodes: PointSearch,
}

impl<'a> MeshLocator<'a> {
    pub fn new(mesh: &'a Mesh) -> RegridResult<Self> {
        let nodes = PointSearch::new(mesh.nodes.clone())?;
        let centroids = if mesh.elements.is_empty() {
            None
        } else {
            let points = mesh
                .elements
                .iter()
                .map(|e| centroid(&mesh.nodes, e.nodes()))
                .collect();
            Some(PointSearch::new(points)?)
        };
        Ok(Self {
            mesh,
            centroids,
            nodes,
        })
    }

    pub fn locate(&self, p: &Point3, quads: QuadWeights) -> Location {
        if let Some(centroids) = &self.centroids {
            let k = CANDIDATE_ELEMENTS.min(centroids.len());
            for candidate in centroids.closest_n_points(p, k) {
                let element = &self.mesh.elements[candidate.payload];
                if let Some(weights) = self.weights_in(element, p, quads) {
                    return Location {
                        weights,
                        fallback: false,
                    };
                }
            }
        }

        let nearest = self.nodes.closest_point(p);
        Location {
            weights: vec![(nearest.payload, 1.0)],
            fallback: true,
        }
    }

    fn weights_in(
        &self,
        element: &Element,
        p: &Point3,
        quads: QuadWeights,
    ) -> Option<Vec<(usize, f64)>> {
        let nodes = &self.mesh.nodes;
        for tri in element.triangles() {
            let Some(bary) = ray_triangle(p, &nodes[tri[0]], &nodes[tri[1]], &nodes[tri[2]])
            else {
                continue;
            };

            if let (Element::Quad(corners), QuadWeights::Bilinear) = (element, quads) {
                let hit = combine(&[nodes[tri[0]], nodes[tri[1]], nodes[tri[2]]], &bary);
                let quad = corners.map(|c| nodes[c]);
                if let Some((s, t)) = inverse_bilinear(&quad, &hit) {
                    let w = [(1.0 - s) * (1.0 - t), s * (1.0 - t), s * t, (1.0 - s) * t];
                    return Some(corners.iter().copied().zip(w).collect());
                }
            }

            return Some(tri.iter().copied().zip(bary).collect());
        }
        None
    }
}

/// Möller–Trumbore intersection of the ray from the origin through `dir`
/// with triangle `(a, b, c)`. Returns clamped, normalised barycentric
/// weights of the hit.
fn ray_triangle(dir: &Point3, a: &Point3, b: &Point3, c: &Point3) -> Option<[f64; 3]> {
    let dir = Vector3::from(*dir);
    let v0 = Vector3::from(*a);
    let edge1 = Vector3::from(*b) - v0;
    let edge2 = Vector3::from(*c) - v0;

    let h = dir.cross(&edge2);
    let det = edge1.dot(&h);
    if det.abs() < 1e-15 {
        return None;
    }
    let inv = 1.0 / det;

    let s = -v0;
    let u = inv * s.dot(&h);
    if u < -EDGE_TOLERANCE || u > 1.0 + EDGE_TOLERANCE {
        return None;
    }
    let q = s.cross(&edge1);
    let v = inv * dir.dot(&q);
    if v < -EDGE_TOLERANCE || u + v > 1.0 + EDGE_TOLERANCE {
        return None;
    }
    let t = inv * edge2.dot(&q);
    if t <= 0.0 {
        return None;
    }

    let raw = [(1.0 - u - v).max(0.0), u.max(0.0), v.max(0.0)];
    let total: f64 = raw.iter().sum();
    Some(raw.map(|w| w / total))
}

/// Solve `P(s, t) = hit` for the bilinear patch through the quad corners,
/// by Gauss-Newton on the 3-D residual.
fn inverse_bilinear(quad: &[Point3; 4], hit: &Point3) -> Option<(f64, f64)> {
    let [p0, p1, p2, p3] = quad.map(Vector3::from);
    let target = Vector3::from(*hit);
    let (mut s, mut t) = (0.5, 0.5);

    for _ in 0..BILINEAR_ITERATIONS {
        let point = p0 * ((1.0 - s) * (1.0 - t)) + p1 * (s * (1.0 - t)) + p2 * (s * t) + p3 * ((1.0 - s) * t);
        let residual = point - target;

        let ds = (p1 - p0) * (1.0 - t) + (p2 - p3) * t;
        let dt = (p3 - p0) * (1.0 - s) + (p2 - p1) * s;

        let normal = Matrix2::new(ds.dot(&ds), ds.dot(&dt), dt.dot(&ds), dt.dot(&dt));
        let rhs = Vector2::new(ds.dot(&residual), dt.dot(&residual));
        let step = normal.try_inverse()? * rhs;

        s -= step.x;
        t -= step.y;
        if step.norm() < 1e-14 {
            break;
        }
    }

    let inside = |x: f64| (-1e-8..=1.0 + 1e-8).contains(&x);
    if !(s.is_finite() && t.is_finite() && inside(s) && inside(t)) {
        return None;
    }
    Some((s.clamp(0.0, 1.0), t.clamp(0.0, 1.0)))
}

fn combine(points: &[Point3; 3], weights: &[f64; 3]) -> Point3 {
    let mut out = [0.0; 3];
    for (p, &w) in points.iter().zip(weights) {
        for k in 0..3 {
            out[k] += w * p[k];
        }
    }
    out
}

fn centroid(nodes: &[Point3], element: &[usize]) -> Point3 {
    let mut c = [0.0; 3];
    for &n in element {
        for k in 0..3 {
            c[k] += nodes[n][k];
        }
    }
    let count = element.len() as f64;
    c.map(|x| x / count)
}

fn triangle_area(a: &Point3, b: &Point3, c: &Point3) -> f64 {
    let ab = Vector3::from(*b) - Vector3::from(*a);
    let ac = Vector3::from(*c) - Vector3::from(*a);
    0.5 * ab.cross(&ac).norm()
}
