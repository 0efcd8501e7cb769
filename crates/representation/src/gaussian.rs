//! Regular and reduced Gaussian grids.
//!
//! Gaussian latitudes are the roots of the Legendre polynomial of degree
//! 2N, mapped through `asin`. They are computed here by Newton iteration.

use std::f64::consts::PI;

use regrid_common::{KeyHasher, RegridError, RegridResult};

use crate::structure::GridStructure;

/// Compute the 2N Gaussian latitudes (degrees, north to south) for number N.
pub fn gaussian_latitudes(n: usize) -> Vec<f64> {
    let degree = 2 * n;
    let mut lats = vec![0.0; degree];

    for i in 0..n {
        // Initial guess for the i-th root, counted from the north.
        let mut z = (PI * (i as f64 + 0.75) / (degree as f64 + 0.5)).cos();

        for _ in 0..100 {
            let mut p1 = 1.0;
            let mut p2 = 0.0;
            for j in 1..=degree {
                let p3 = p2;
                p2 = p1;
                p1 = ((2 * j - 1) as f64 * z * p2 - (j - 1) as f64 * p3) / j as f64;
            }
            let derivative = degree as f64 * (z * p1 - p2) / (z * z - 1.0);
            let previous = z;
            z = previous - p1 / derivative;
            if (z - previous).abs() < 1e-15 {
                break;
            }
        }

        let lat = z.asin().to_degrees();
        lats[i] = lat;
        lats[degree - 1 - i] = -lat;
    }

    lats
}

/// Points per row of the octahedral reduced Gaussian grid `O<N>`.
pub fn octahedral_pl(n: usize) -> Vec<usize> {
    let north: Vec<usize> = (0..n).map(|i| 20 + 4 * i).collect();
    north.iter().chain(north.iter().rev()).copied().collect()
}

fn check_number(n: usize) -> RegridResult<()> {
    if n == 0 {
        return Err(RegridError::configuration("Gaussian number must be positive"));
    }
    Ok(())
}

/// A global regular Gaussian grid `F<N>`: 2N rows of 4N points.
#[derive(Debug, Clone, PartialEq)]
pub struct RegularGaussian {
    pub n: usize,
}

impl RegularGaussian {
    pub fn new(n: usize) -> RegridResult<Self> {
        check_number(n)?;
        Ok(Self { n })
    }

    pub fn number_of_points(&self) -> usize {
        8 * self.n * self.n
    }

    pub fn structure(&self) -> GridStructure {
        let ni = 4 * self.n;
        let increment = 360.0 / ni as f64;
        let rows = gaussian_latitudes(self.n)
            .into_iter()
            .map(|lat| (lat, 0.0, increment, ni));
        GridStructure::from_rows(rows, true)
    }

    pub fn hash(&self, hasher: &mut KeyHasher) {
        hasher.add_str("regular_gg");
        hasher.add_usize(self.n);
    }
}

/// A global reduced Gaussian grid with an explicit `pl` array.
#[derive(Debug, Clone, PartialEq)]
pub struct ReducedGaussian {
    pub n: usize,
    pub pl: Vec<usize>,
    pub octahedral: bool,
}

impl ReducedGaussian {
    pub fn new(n: usize, pl: Vec<usize>) -> RegridResult<Self> {
        check_number(n)?;
        if pl.len() != 2 * n {
            return Err(RegridError::configuration(format!(
                "reduced Gaussian N{} needs {} pl entries, got {}",
                n,
                2 * n,
                pl.len()
            )));
        }
        let octahedral = pl == octahedral_pl(n);
        Ok(Self { n, pl, octahedral })
    }

    /// The octahedral grid `O<N>`.
    pub fn octahedral(n: usize) -> RegridResult<Self> {
        Self::new(n, octahedral_pl(n))
    }

    pub fn number_of_points(&self) -> usize {
        self.pl.iter().sum()
    }

    pub fn structure(&self) -> GridStructure {
        let rows = gaussian_latitudes(self.n)
            .into_iter()
            .zip(&self.pl)
            .map(|(lat, &count)| {
                let increment = if count > 0 { 360.0 / count as f64 } else { 0.0 };
                (lat, 0.0, increment, count)
            });
        GridStructure::from_rows(rows, true)
    }

    pub fn hash(&self, hasher: &mut KeyHasher) {
        hasher.add_str("reduced_gg");
        hasher.add_usize(self.n);
        hasher.add_usize_slice(&self.pl);
    }

    pub fn short_name(&self) -> String {
        if self.octahedral {
            format!("O{}", self.n)
        } else {
            format!("N{}", self.n)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_n1_latitudes() {
        // Roots of P2 are +-1/sqrt(3).
        let lats = gaussian_latitudes(1);
        let expected = (1.0f64 / 3.0f64.sqrt()).asin().to_degrees();
        assert_eq!(lats.len(), 2);
        assert!((lats[0] - expected).abs() < 1e-12);
        assert!((lats[1] + expected).abs() < 1e-12);
    }

    #[test]
    fn test_latitudes_symmetric_and_descending() {
        let lats = gaussian_latitudes(32);
        assert_eq!(lats.len(), 64);
        for i in 0..64 {
            assert!((lats[i] + lats[63 - i]).abs() < 1e-12);
        }
        assert!(lats.windows(2).all(|w| w[0] > w[1]));
        assert!(lats[0] < 90.0);
    }

    #[test]
    fn test_octahedral_pl() {
        let pl = octahedral_pl(3);
        assert_eq!(pl, vec![20, 24, 28, 28, 24, 20]);
        let grid = ReducedGaussian::octahedral(3).unwrap();
        assert_eq!(grid.number_of_points(), 144);
        assert_eq!(grid.short_name(), "O3");
    }

    #[test]
    fn test_regular_gaussian_count() {
        let grid = RegularGaussian::new(2).unwrap();
        assert_eq!(grid.number_of_points(), 32);
        assert_eq!(grid.structure().into_points().count(), 32);
    }
}
