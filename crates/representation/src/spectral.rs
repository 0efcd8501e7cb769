//! Spherical-harmonic (spectral) fields.
//!
//! Coefficients are stored as interleaved (real, imaginary) pairs ordered by
//! zonal wavenumber m, then total wavenumber n ≥ m:
//! `(0,0) (0,1) … (0,T) (1,1) … (T,T)`.

use regrid_common::{KeyHasher, RegridError, RegridResult};

/// A triangular spectral truncation `T<T>`.
#[derive(Debug, Clone, PartialEq)]
pub struct SphericalHarmonics {
    pub truncation: usize,
}

impl SphericalHarmonics {
    pub fn new(truncation: usize) -> Self {
        Self { truncation }
    }

    /// Number of complex coefficients.
    pub fn number_of_complex_coefficients(truncation: usize) -> usize {
        (truncation + 1) * (truncation + 2) / 2
    }

    /// Number of real values (real and imaginary parts).
    pub fn number_of_points(&self) -> usize {
        2 * Self::number_of_complex_coefficients(self.truncation)
    }

    /// Truncate (or zero-pad) coefficients to a new truncation.
    pub fn truncate(&self, truncation: usize, values: &[f64]) -> RegridResult<(Self, Vec<f64>)> {
        if values.len() != self.number_of_points() {
            return Err(RegridError::DimensionMismatch {
                expected: self.number_of_points(),
                actual: values.len(),
            });
        }

        let out = Self::new(truncation);
        let mut result = Vec::with_capacity(out.number_of_points());
        let t_in = self.truncation;

        // Input index of (m, n); the block for m starts after all blocks m' < m.
        let index = |m: usize, n: usize| {
            let block = m * (t_in + 1) - m * m.saturating_sub(1) / 2;
            2 * (block + n - m)
        };

        for m in 0..=truncation {
            for n in m..=truncation {
                if n <= t_in {
                    let i = index(m, n);
                    result.push(values[i]);
                    result.push(values[i + 1]);
                } else {
                    result.push(0.0);
                    result.push(0.0);
                }
            }
        }

        Ok((out, result))
    }

    pub fn hash(&self, hasher: &mut KeyHasher) {
        hasher.add_str("spherical_harmonics");
        hasher.add_usize(self.truncation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Encode (m, n, part) so values are recognisable after truncation.
    fn tagged(truncation: usize) -> Vec<f64> {
        let mut v = Vec::new();
        for m in 0..=truncation {
            for n in m..=truncation {
                v.push((m * 1000 + n * 10) as f64);
                v.push((m * 1000 + n * 10 + 1) as f64);
            }
        }
        v
    }

    #[test]
    fn test_sizes() {
        assert_eq!(SphericalHarmonics::new(0).number_of_points(), 2);
        assert_eq!(SphericalHarmonics::new(639).number_of_points(), 640 * 641);
    }

    #[test]
    fn test_truncate_keeps_retained_coefficients() {
        let sh = SphericalHarmonics::new(5);
        let (out, values) = sh.truncate(3, &tagged(5)).unwrap();
        assert_eq!(out.truncation, 3);
        assert_eq!(values, tagged(3));
    }

    #[test]
    fn test_pad_with_zeros() {
        let sh = SphericalHarmonics::new(2);
        let (out, values) = sh.truncate(3, &tagged(2)).unwrap();
        assert_eq!(values.len(), out.number_of_points());
        // (0,3) is new and zero.
        assert_eq!(values[6], 0.0);
        assert_eq!(values[7], 0.0);
        // (1,1) kept.
        assert_eq!(values[8], 1010.0);
    }

    #[test]
    fn test_size_mismatch() {
        let sh = SphericalHarmonics::new(2);
        assert!(matches!(
            sh.truncate(1, &[0.0; 3]),
            Err(RegridError::DimensionMismatch { .. })
        ));
    }
}
