//! The `Representation` sum type.

use std::fmt;

use tracing::debug;

use regrid_common::{BoundingBox, KeyHasher, LatLon, RegridError, RegridResult};

use crate::gaussian::{ReducedGaussian, RegularGaussian};
use crate::healpix::Healpix;
use crate::latlon::{ReducedLatLon, RegularLatLon};
use crate::rotation::Rotation;
use crate::spectral::SphericalHarmonics;
use crate::structure::GridStructure;
use crate::unstructured::Unstructured;

/// Tolerance (degrees) when testing whether a grid reaches a pole.
const POLE_EPSILON: f64 = 1e-9;

/// Lazy sequence of geographic points. A fresh one is built per traversal.
pub type Points<'a> = Box<dyn Iterator<Item = LatLon> + Send + 'a>;

/// Which pole a query refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pole {
    North,
    South,
}

impl Pole {
    fn latitude(self) -> f64 {
        match self {
            Pole::North => 90.0,
            Pole::South => -90.0,
        }
    }
}

/// A set of geographic points, or a spectral field.
///
/// Representations are immutable; share them with `Arc`. Equality compares
/// kind and defining parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Representation {
    RegularLatLon(RegularLatLon),
    ReducedLatLon(ReducedLatLon),
    RegularGaussian(RegularGaussian),
    ReducedGaussian(ReducedGaussian),
    /// A lat/lon or Gaussian grid defined in a rotated frame.
    Rotated {
        inner: Box<Representation>,
        rotation: Rotation,
    },
    Unstructured(Unstructured),
    Healpix(Healpix),
    SphericalHarmonics(SphericalHarmonics),
}

impl Representation {
    /// Wrap a grid in a rotated frame.
    ///
    /// Only lat/lon and Gaussian grids can be rotated, and an identity
    /// rotation returns the grid unchanged.
    pub fn rotated(inner: Representation, rotation: Rotation) -> RegridResult<Self> {
        if inner.structure().is_none() || matches!(inner, Representation::Rotated { .. }) {
            return Err(RegridError::unsupported(format!(
                "cannot rotate a {} representation",
                inner.kind_name()
            )));
        }
        if rotation.is_identity() {
            return Ok(inner);
        }
        Ok(Representation::Rotated {
            inner: Box::new(inner),
            rotation,
        })
    }

    /// Static name of the variant.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Representation::RegularLatLon(_) => "regular_ll",
            Representation::ReducedLatLon(_) => "reduced_ll",
            Representation::RegularGaussian(_) => "regular_gg",
            Representation::ReducedGaussian(_) => "reduced_gg",
            Representation::Rotated { .. } => "rotated",
            Representation::Unstructured(_) => "unstructured",
            Representation::Healpix(_) => "healpix",
            Representation::SphericalHarmonics(_) => "spherical_harmonics",
        }
    }

    pub fn number_of_points(&self) -> usize {
        match self {
            Representation::RegularLatLon(g) => g.number_of_points(),
            Representation::ReducedLatLon(g) => g.number_of_points(),
            Representation::RegularGaussian(g) => g.number_of_points(),
            Representation::ReducedGaussian(g) => g.number_of_points(),
            Representation::Rotated { inner, .. } => inner.number_of_points(),
            Representation::Unstructured(g) => g.number_of_points(),
            Representation::Healpix(g) => g.number_of_points(),
            Representation::SphericalHarmonics(g) => g.number_of_points(),
        }
    }

    /// Geographic (unrotated) coordinates of every point, in point order.
    pub fn points(&self) -> RegridResult<Points<'_>> {
        if let Some(structure) = self.structure() {
            if let Representation::Rotated { rotation, .. } = self {
                return Ok(Box::new(
                    structure.into_points().map(move |p| rotation.unrotate(p)),
                ));
            }
            return Ok(Box::new(structure.into_points()));
        }

        match self {
            Representation::Unstructured(g) => Ok(Box::new(g.points())),
            Representation::Healpix(g) => Ok(Box::new(g.points())),
            _ => Err(RegridError::unsupported(format!(
                "{} has no geographic points",
                self
            ))),
        }
    }

    /// Latitude rows in the grid's native frame, for row-structured grids.
    pub fn structure(&self) -> Option<GridStructure> {
        match self {
            Representation::RegularLatLon(g) => Some(g.structure()),
            Representation::ReducedLatLon(g) => Some(g.structure()),
            Representation::RegularGaussian(g) => Some(g.structure()),
            Representation::ReducedGaussian(g) => Some(g.structure()),
            Representation::Rotated { inner, .. } => inner.structure(),
            _ => None,
        }
    }

    /// Map a geographic point into the frame `structure()` is expressed in.
    pub fn to_native(&self, p: LatLon) -> LatLon {
        match self {
            Representation::Rotated { rotation, .. } => rotation.rotate(p),
            _ => p,
        }
    }

    /// Geographic bounding box, when one is defined.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        match self {
            Representation::RegularLatLon(g) => Some(g.bbox),
            Representation::ReducedLatLon(g) => Some(g.bounding_box()),
            Representation::RegularGaussian(_)
            | Representation::ReducedGaussian(_)
            | Representation::Healpix(_) => Some(BoundingBox::global()),
            Representation::Rotated { inner, .. } => {
                if inner.bounding_box().map_or(false, |b| b.is_global()) {
                    return Some(BoundingBox::global());
                }
                let points = self.points().ok()?;
                BoundingBox::enclosing(points.map(|p| (p.lat, p.lon)))
            }
            Representation::Unstructured(g) => {
                BoundingBox::enclosing(g.points().map(|p| (p.lat, p.lon)))
            }
            Representation::SphericalHarmonics(_) => None,
        }
    }

    pub fn is_periodic_west_east(&self) -> bool {
        match self {
            Representation::RegularLatLon(g) => g.is_periodic_west_east(),
            Representation::ReducedLatLon(_)
            | Representation::RegularGaussian(_)
            | Representation::ReducedGaussian(_)
            | Representation::Healpix(_) => true,
            Representation::Rotated { inner, .. } => inner.is_periodic_west_east(),
            Representation::Unstructured(_) | Representation::SphericalHarmonics(_) => false,
        }
    }

    /// Whether the grid reaches the given pole.
    ///
    /// Global Gaussian grids count as including both poles even though no
    /// Gaussian latitude lies exactly on one.
    pub fn includes_pole(&self, pole: Pole) -> bool {
        let lat = pole.latitude();
        match self {
            Representation::RegularLatLon(g) => match pole {
                Pole::North => g.bbox.north >= lat - POLE_EPSILON,
                Pole::South => g.bbox.south <= lat + POLE_EPSILON,
            },
            Representation::ReducedLatLon(g) => match pole {
                Pole::North => g.north >= lat - POLE_EPSILON,
                Pole::South => g.south <= lat + POLE_EPSILON,
            },
            Representation::RegularGaussian(_)
            | Representation::ReducedGaussian(_)
            | Representation::Healpix(_)
            | Representation::SphericalHarmonics(_) => true,
            Representation::Rotated { inner, rotation } => {
                let native = rotation.rotate(LatLon::new(lat, 0.0));
                inner
                    .bounding_box()
                    .map_or(false, |b| b.contains(native.lat, native.lon))
            }
            Representation::Unstructured(g) => g
                .latitudes()
                .iter()
                .any(|&p| (p - lat).abs() <= POLE_EPSILON),
        }
    }

    /// Restrict to the points inside `bbox`.
    ///
    /// Returns an unstructured representation of the retained points and,
    /// for each of them, its index in `self`.
    pub fn crop(&self, bbox: &BoundingBox) -> RegridResult<(Representation, Vec<usize>)> {
        let mut mapping = Vec::new();
        let mut latitudes = Vec::new();
        let mut longitudes = Vec::new();

        for (i, p) in self.points()?.enumerate() {
            if bbox.contains(p.lat, p.lon) {
                mapping.push(i);
                latitudes.push(p.lat);
                longitudes.push(p.lon);
            }
        }

        debug!(
            grid = %self,
            bbox = %bbox,
            kept = mapping.len(),
            total = self.number_of_points(),
            "Cropped representation"
        );

        let cropped = Unstructured::new(latitudes, longitudes)?;
        Ok((Representation::Unstructured(cropped), mapping))
    }

    /// Change the truncation of a spectral field.
    pub fn truncate(
        &self,
        truncation: usize,
        values: &[f64],
    ) -> RegridResult<(Representation, Vec<f64>)> {
        match self {
            Representation::SphericalHarmonics(sh) => {
                let (out, values) = sh.truncate(truncation, values)?;
                Ok((Representation::SphericalHarmonics(out), values))
            }
            _ => Err(RegridError::unsupported(format!(
                "truncate is only defined for spectral fields, not {}",
                self
            ))),
        }
    }

    /// Kind and defining parameters are equal.
    pub fn same_as(&self, other: &Representation) -> bool {
        self == other
    }

    /// Feed the defining parameters into a cache-key digest.
    pub fn hash(&self, hasher: &mut KeyHasher) {
        match self {
            Representation::RegularLatLon(g) => g.hash(hasher),
            Representation::ReducedLatLon(g) => g.hash(hasher),
            Representation::RegularGaussian(g) => g.hash(hasher),
            Representation::ReducedGaussian(g) => g.hash(hasher),
            Representation::Rotated { inner, rotation } => {
                hasher.add_str("rotated");
                inner.hash(hasher);
                rotation.hash(hasher);
            }
            Representation::Unstructured(g) => g.hash(hasher),
            Representation::Healpix(g) => g.hash(hasher),
            Representation::SphericalHarmonics(g) => g.hash(hasher),
        }
    }

    /// Compact name for logs and error messages.
    pub fn short_name(&self) -> String {
        match self {
            Representation::RegularLatLon(g) => g.short_name(),
            Representation::ReducedLatLon(g) => format!("reduced_ll{}", g.pl.len()),
            Representation::RegularGaussian(g) => format!("F{}", g.n),
            Representation::ReducedGaussian(g) => g.short_name(),
            Representation::Rotated { inner, .. } => format!("rotated_{}", inner.short_name()),
            Representation::Unstructured(g) => format!("unstructured{}", g.number_of_points()),
            Representation::Healpix(g) => format!("H{}", g.nside),
            Representation::SphericalHarmonics(g) => format!("T{}", g.truncation),
        }
    }
}

impl fmt::Display for Representation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short_name())
    }
}

impl From<RegularLatLon> for Representation {
    fn from(g: RegularLatLon) -> Self {
        Representation::RegularLatLon(g)
    }
}

impl From<ReducedLatLon> for Representation {
    fn from(g: ReducedLatLon) -> Self {
        Representation::ReducedLatLon(g)
    }
}

impl From<RegularGaussian> for Representation {
    fn from(g: RegularGaussian) -> Self {
        Representation::RegularGaussian(g)
    }
}

impl From<ReducedGaussian> for Representation {
    fn from(g: ReducedGaussian) -> Self {
        Representation::ReducedGaussian(g)
    }
}

impl From<Unstructured> for Representation {
    fn from(g: Unstructured) -> Self {
        Representation::Unstructured(g)
    }
}

impl From<Healpix> for Representation {
    fn from(g: Healpix) -> Self {
        Representation::Healpix(g)
    }
}

impl From<SphericalHarmonics> for Representation {
    fn from(g: SphericalHarmonics) -> Self {
        Representation::SphericalHarmonics(g)
    }
}
