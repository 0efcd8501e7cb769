//! Scattered point lists.

use std::sync::Arc;

use regrid_common::{KeyHasher, LatLon, RegridError, RegridResult};

/// An unstructured list of points, defined entirely by its coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Unstructured {
    latitudes: Arc<[f64]>,
    longitudes: Arc<[f64]>,
}

impl Unstructured {
    pub fn new(latitudes: Vec<f64>, longitudes: Vec<f64>) -> RegridResult<Self> {
        if latitudes.len() != longitudes.len() {
            return Err(RegridError::configuration(format!(
                "unstructured grid has {} latitudes but {} longitudes",
                latitudes.len(),
                longitudes.len()
            )));
        }
        if let Some(bad) = latitudes.iter().find(|lat| !(-90.0..=90.0).contains(*lat)) {
            return Err(RegridError::configuration(format!(
                "unstructured latitude {} outside [-90, 90]",
                bad
            )));
        }

        Ok(Self {
            latitudes: latitudes.into(),
            longitudes: longitudes.into(),
        })
    }

    /// Build from an iterator of points.
    pub fn from_points<I>(points: I) -> RegridResult<Self>
    where
        I: IntoIterator<Item = LatLon>,
    {
        let (lats, lons): (Vec<f64>, Vec<f64>) =
            points.into_iter().map(|p| (p.lat, p.lon)).unzip();
        Self::new(lats, lons)
    }

    pub fn number_of_points(&self) -> usize {
        self.latitudes.len()
    }

    pub fn latitudes(&self) -> &[f64] {
        &self.latitudes
    }

    pub fn longitudes(&self) -> &[f64] {
        &self.longitudes
    }

    pub fn points(&self) -> impl Iterator<Item = LatLon> + Send + '_ {
        self.latitudes
            .iter()
            .zip(self.longitudes.iter())
            .map(|(&lat, &lon)| LatLon::new(lat, lon))
    }

    pub fn hash(&self, hasher: &mut KeyHasher) {
        hasher.add_str("unstructured");
        hasher.add_f64_slice(&self.latitudes);
        hasher.add_f64_slice(&self.longitudes);
    }
}
