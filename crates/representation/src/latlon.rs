//! Regular and reduced latitude/longitude grids.

use regrid_common::{BoundingBox, KeyHasher, RegridError, RegridResult};

use crate::structure::GridStructure;

/// Tolerance (degrees) when deciding whether a grid closes around the globe.
const PERIODIC_EPSILON: f64 = 1e-6;

/// Number of increments spanned by `extent`, rejecting non-integral spans.
fn steps(extent: f64, increment: f64, what: &str) -> RegridResult<usize> {
    let n = extent / increment;
    let rounded = n.round();
    if (n - rounded).abs() > 1e-6 {
        return Err(RegridError::configuration(format!(
            "{} extent {} is not a multiple of increment {}",
            what, extent, increment
        )));
    }
    Ok(rounded as usize)
}

/// A regular latitude/longitude grid.
///
/// The bounding box gives the first and last rows (north, south) and the
/// first and last columns (west, east); points start at the north-west
/// corner.
#[derive(Debug, Clone, PartialEq)]
pub struct RegularLatLon {
    pub west_east_increment: f64,
    pub south_north_increment: f64,
    pub bbox: BoundingBox,
    ni: usize,
    nj: usize,
}

impl RegularLatLon {
    /// Create a grid from its increments and area.
    pub fn new(
        west_east_increment: f64,
        south_north_increment: f64,
        bbox: BoundingBox,
    ) -> RegridResult<Self> {
        if !(west_east_increment > 0.0 && south_north_increment > 0.0) {
            return Err(RegridError::configuration(format!(
                "increments must be positive, got {}/{}",
                west_east_increment, south_north_increment
            )));
        }

        let nj = steps(bbox.north - bbox.south, south_north_increment, "latitude")? + 1;

        // A box spanning the full circle would repeat its first column.
        let span = bbox.east - bbox.west;
        let ni = if span >= 360.0 - PERIODIC_EPSILON {
            steps(360.0, west_east_increment, "longitude")?
        } else {
            let n = steps(span, west_east_increment, "longitude")? + 1;
            let full = (360.0 / west_east_increment).round() as usize;
            n.min(full)
        };

        Ok(Self {
            west_east_increment,
            south_north_increment,
            bbox,
            ni,
            nj,
        })
    }

    /// A global grid with the first point at (90, 0).
    pub fn global(west_east_increment: f64, south_north_increment: f64) -> RegridResult<Self> {
        let bbox = BoundingBox::new(90.0, 0.0, -90.0, 360.0 - west_east_increment)?;
        Self::new(west_east_increment, south_north_increment, bbox)
    }

    pub fn ni(&self) -> usize {
        self.ni
    }

    pub fn nj(&self) -> usize {
        self.nj
    }

    pub fn number_of_points(&self) -> usize {
        self.ni * self.nj
    }

    pub fn is_periodic_west_east(&self) -> bool {
        (self.ni as f64 * self.west_east_increment - 360.0).abs() < PERIODIC_EPSILON
    }

    pub fn structure(&self) -> GridStructure {
        let rows = (0..self.nj).map(|j| {
            let lat = self.bbox.north - j as f64 * self.south_north_increment;
            (lat, self.bbox.west, self.west_east_increment, self.ni)
        });
        GridStructure::from_rows(rows, self.is_periodic_west_east())
    }

    pub fn hash(&self, hasher: &mut KeyHasher) {
        hasher.add_str("regular_ll");
        hasher.add_f64(self.west_east_increment);
        hasher.add_f64(self.south_north_increment);
        self.bbox.hash(hasher);
    }

    pub fn short_name(&self) -> String {
        format!("{}x{}", self.west_east_increment, self.south_north_increment)
    }
}

/// A reduced latitude/longitude grid: equally spaced rows, each with its own
/// number of globally spaced points starting at longitude 0.
#[derive(Debug, Clone, PartialEq)]
pub struct ReducedLatLon {
    pub north: f64,
    pub south: f64,
    pub pl: Vec<usize>,
}

impl ReducedLatLon {
    pub fn new(north: f64, south: f64, pl: Vec<usize>) -> RegridResult<Self> {
        if pl.len() < 2 {
            return Err(RegridError::configuration(
                "reduced lat/lon grid needs at least two rows",
            ));
        }
        if north <= south {
            return Err(RegridError::configuration(format!(
                "reduced lat/lon north {} must exceed south {}",
                north, south
            )));
        }
        Ok(Self { north, south, pl })
    }

    pub fn number_of_points(&self) -> usize {
        self.pl.iter().sum()
    }

    pub fn south_north_increment(&self) -> f64 {
        (self.north - self.south) / (self.pl.len() - 1) as f64
    }

    pub fn structure(&self) -> GridStructure {
        let dlat = self.south_north_increment();
        let rows = self.pl.iter().enumerate().map(|(j, &count)| {
            let lat = self.north - j as f64 * dlat;
            let increment = if count > 0 { 360.0 / count as f64 } else { 0.0 };
            (lat, 0.0, increment, count)
        });
        GridStructure::from_rows(rows, true)
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox {
            north: self.north,
            west: 0.0,
            south: self.south,
            east: 360.0,
        }
    }

    pub fn hash(&self, hasher: &mut KeyHasher) {
        hasher.add_str("reduced_ll");
        hasher.add_f64(self.north);
        hasher.add_f64(self.south);
        hasher.add_usize_slice(&self.pl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_one_degree() {
        let grid = RegularLatLon::global(1.0, 1.0).unwrap();
        assert_eq!(grid.ni(), 360);
        assert_eq!(grid.nj(), 181);
        assert!(grid.is_periodic_west_east());
        assert_eq!(grid.structure().number_of_points(), 360 * 181);
    }

    #[test]
    fn test_limited_area() {
        let bbox = BoundingBox::new(15.0, 0.0, -15.0, 30.0).unwrap();
        let grid = RegularLatLon::new(10.0, 10.0, bbox).unwrap();
        assert_eq!((grid.ni(), grid.nj()), (4, 4));
        assert!(!grid.is_periodic_west_east());
    }

    #[test]
    fn test_non_integral_span_rejected() {
        let bbox = BoundingBox::new(10.0, 0.0, 0.0, 10.0).unwrap();
        assert!(RegularLatLon::new(3.0, 1.0, bbox).is_err());
    }

    #[test]
    fn test_reduced_rows() {
        let grid = ReducedLatLon::new(90.0, -90.0, vec![1, 4, 1]).unwrap();
        assert_eq!(grid.number_of_points(), 6);
        let s = grid.structure();
        assert_eq!(s.rows[1].latitude, 0.0);
        assert_eq!(s.rows[1].increment, 90.0);
    }
}
