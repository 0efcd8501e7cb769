//! Row structure shared by lat/lon and Gaussian grids.
//!
//! Every structured grid is a list of latitude rows ordered north to south,
//! each row a run of equally spaced longitudes. Points are numbered row by
//! row, west to east.

use regrid_common::geometry::normalise_longitude;
use regrid_common::LatLon;

/// One latitude row of a structured grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridRow {
    /// Latitude of the row in degrees.
    pub latitude: f64,
    /// Longitude of the first point in degrees.
    pub first_longitude: f64,
    /// Longitude increment between consecutive points in degrees.
    pub increment: f64,
    /// Number of points on the row.
    pub count: usize,
    /// Global index of the first point on the row.
    pub offset: usize,
}

impl GridRow {
    /// Longitude of the i-th point on the row.
    #[inline]
    pub fn longitude(&self, i: usize) -> f64 {
        self.first_longitude + i as f64 * self.increment
    }

    /// Find the two points bracketing `lon` on this row.
    ///
    /// Returns the index of the western neighbour, the index of the eastern
    /// neighbour and the fractional position between them, or `None` if the
    /// longitude falls outside a non-periodic row.
    pub fn bracket(&self, lon: f64, periodic: bool) -> Option<(usize, usize, f64)> {
        if self.count == 0 {
            return None;
        }
        if self.count == 1 {
            return Some((0, 0, 0.0));
        }

        let lon = normalise_longitude(lon, self.first_longitude);
        let position = (lon - self.first_longitude) / self.increment;
        let last = (self.count - 1) as f64;

        if periodic {
            let west = (position.floor() as usize).min(self.count - 1);
            let east = (west + 1) % self.count;
            let frac = (position - west as f64).clamp(0.0, 1.0);
            return Some((west, east, frac));
        }

        if position > last + 1e-9 {
            return None;
        }
        let position = position.min(last);
        let west = (position.floor() as usize).min(self.count - 2);
        Some((west, west + 1, position - west as f64))
    }
}

/// Rows of a structured grid.
#[derive(Debug, Clone, PartialEq)]
pub struct GridStructure {
    pub rows: Vec<GridRow>,
    /// Whether each row wraps around the globe.
    pub periodic_west_east: bool,
}

impl GridStructure {
    /// Build from `(latitude, first_longitude, increment, count)` rows.
    pub fn from_rows<I>(rows: I, periodic_west_east: bool) -> Self
    where
        I: IntoIterator<Item = (f64, f64, f64, usize)>,
    {
        let mut offset = 0;
        let rows = rows
            .into_iter()
            .map(|(latitude, first_longitude, increment, count)| {
                let row = GridRow {
                    latitude,
                    first_longitude,
                    increment,
                    count,
                    offset,
                };
                offset += count;
                row
            })
            .collect();

        Self {
            rows,
            periodic_west_east,
        }
    }

    /// Total number of points over all rows.
    pub fn number_of_points(&self) -> usize {
        self.rows.iter().map(|r| r.count).sum()
    }

    /// Iterate the points row by row.
    pub fn into_points(self) -> StructuredPoints {
        StructuredPoints {
            rows: self.rows,
            row: 0,
            column: 0,
        }
    }

    /// Find the rows bracketing a latitude.
    ///
    /// Returns `(north_row, south_row, fraction)` where `fraction` is the
    /// distance from the northern row. Outside the first/last row the nearest
    /// row is returned twice.
    pub fn bracket_latitude(&self, lat: f64) -> Option<(usize, usize, f64)> {
        let n = self.rows.len();
        if n == 0 {
            return None;
        }
        if lat >= self.rows[0].latitude {
            return Some((0, 0, 0.0));
        }
        if lat <= self.rows[n - 1].latitude {
            return Some((n - 1, n - 1, 0.0));
        }

        // Rows are ordered north to south.
        let south = self.rows.partition_point(|r| r.latitude > lat);
        let north = south - 1;
        let span = self.rows[north].latitude - self.rows[south].latitude;
        let frac = if span > 0.0 {
            (self.rows[north].latitude - lat) / span
        } else {
            0.0
        };
        Some((north, south, frac))
    }
}

/// Lazy iterator over the points of a [`GridStructure`].
pub struct StructuredPoints {
    rows: Vec<GridRow>,
    row: usize,
    column: usize,
}

impl Iterator for StructuredPoints {
    type Item = LatLon;

    fn next(&mut self) -> Option<LatLon> {
        while let Some(row) = self.rows.get(self.row) {
            if self.column < row.count {
                let point = LatLon::new(row.latitude, row.longitude(self.column));
                self.column += 1;
                return Some(point);
            }
            self.row += 1;
            self.column = 0;
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self
            .rows
            .iter()
            .skip(self.row)
            .map(|r| r.count)
            .sum::<usize>()
            .saturating_sub(self.column);
        (remaining, Some(remaining))
    }
}
