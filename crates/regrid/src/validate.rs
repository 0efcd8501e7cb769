//! Checks applied to freshly assembled matrices.

use rayon::prelude::*;

use regrid_common::{RegridError, RegridResult};

use crate::matrix::WeightMatrix;

/// Allowed deviation of a row sum from one, relative to the row's total
/// absolute weight.
pub const ROW_SUM_TOLERANCE: f64 = 1e-9;

/// Which properties a matrix must have.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatrixChecks {
    /// Every non-empty row sums to one.
    pub partition_of_unity: bool,
    /// No weight is negative.
    pub non_negative: bool,
    /// Rows may have no entries.
    pub allow_empty_rows: bool,
    pub tolerance: f64,
}

impl Default for MatrixChecks {
    fn default() -> Self {
        Self {
            partition_of_unity: true,
            non_negative: true,
            allow_empty_rows: false,
            tolerance: ROW_SUM_TOLERANCE,
        }
    }
}

/// Check `matrix`, reporting the first offending row.
///
/// Non-finite weights are always rejected.
pub fn check_matrix(
    matrix: &WeightMatrix,
    checks: &MatrixChecks,
    method: &str,
    input: &str,
    output: &str,
) -> RegridResult<()> {
    let failure = (0..matrix.rows())
        .into_par_iter()
        .find_map_first(|r| row_problem(matrix, r, checks).map(|reason| (r, reason)));

    match failure {
        None => Ok(()),
        Some((row, reason)) => {
            Err(RegridError::invalid_matrix(method, input, output, reason).at_row(row))
        }
    }
}

fn row_problem(matrix: &WeightMatrix, r: usize, checks: &MatrixChecks) -> Option<String> {
    let (cols, weights) = matrix.row(r);
    if cols.is_empty() {
        return (!checks.allow_empty_rows).then(|| "empty row".to_string());
    }

    if let Some((c, w)) = cols.iter().zip(weights).find(|(_, w)| !w.is_finite()) {
        return Some(format!("non-finite weight {} at column {}", w, c));
    }

    // Cancelling signed weights carry rounding in proportion to their size.
    let scale = weights.iter().map(|w| w.abs()).sum::<f64>().max(1.0);
    let tolerance = checks.tolerance * scale;

    if checks.non_negative {
        if let Some((c, w)) = cols
            .iter()
            .zip(weights)
            .find(|(_, w)| **w < -tolerance)
        {
            return Some(format!("negative weight {} at column {}", w, c));
        }
    }

    if checks.partition_of_unity {
        let sum: f64 = weights.iter().sum();
        if (sum - 1.0).abs() > tolerance {
            return Some(format!("row sum {}", sum));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use regrid_common::Triplet;

    fn matrix(triplets: Vec<Triplet>) -> WeightMatrix {
        WeightMatrix::from_triplets(3, 2, triplets).unwrap()
    }

    #[test]
    fn test_valid_matrix() {
        let m = matrix(vec![
            Triplet::new(0, 0, 1.0),
            Triplet::new(1, 1, 1.0),
            Triplet::new(2, 0, 0.5),
            Triplet::new(2, 1, 0.5),
        ]);
        assert!(check_matrix(&m, &MatrixChecks::default(), "m", "a", "b").is_ok());
    }

    #[test]
    fn test_first_bad_row_reported() {
        let m = matrix(vec![
            Triplet::new(0, 0, 1.0),
            Triplet::new(1, 1, 0.5),
            Triplet::new(2, 0, 0.5),
        ]);
        let err = check_matrix(&m, &MatrixChecks::default(), "k-nearest", "F4", "1x1").unwrap_err();
        match err {
            RegridError::InvalidWeightMatrix {
                method, row, reason, ..
            } => {
                assert_eq!(method, "k-nearest");
                assert_eq!(row, Some(1));
                assert!(reason.contains("0.5"));
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_empty_rows() {
        let m = matrix(vec![Triplet::new(0, 0, 1.0), Triplet::new(2, 1, 1.0)]);
        assert!(check_matrix(&m, &MatrixChecks::default(), "m", "a", "b").is_err());
        let lenient = MatrixChecks {
            allow_empty_rows: true,
            ..Default::default()
        };
        assert!(check_matrix(&m, &lenient, "m", "a", "b").is_ok());
    }

    #[test]
    fn test_negative_weights() {
        let m = matrix(vec![
            Triplet::new(0, 0, 1.5),
            Triplet::new(0, 1, -0.5),
            Triplet::new(1, 1, 1.0),
            Triplet::new(2, 1, 1.0),
        ]);
        assert!(check_matrix(&m, &MatrixChecks::default(), "m", "a", "b").is_err());
        let signed = MatrixChecks {
            non_negative: false,
            ..Default::default()
        };
        assert!(check_matrix(&m, &signed, "m", "a", "b").is_ok());
    }

    #[test]
    fn test_row_sum_tolerance() {
        let near = matrix(vec![
            Triplet::new(0, 0, 1.0 + 5e-10),
            Triplet::new(1, 1, 1.0),
            Triplet::new(2, 1, 1.0),
        ]);
        assert!(check_matrix(&near, &MatrixChecks::default(), "m", "a", "b").is_ok());

        let off = matrix(vec![
            Triplet::new(0, 0, 1.0 + 5e-9),
            Triplet::new(1, 1, 1.0),
            Triplet::new(2, 1, 1.0),
        ]);
        assert!(check_matrix(&off, &MatrixChecks::default(), "m", "a", "b").is_err());

        // Large cancelling weights are judged against their own size.
        let signed = MatrixChecks {
            non_negative: false,
            ..Default::default()
        };
        let cancelling = matrix(vec![
            Triplet::new(0, 0, 1.0e3 + 1.0 + 1e-7),
            Triplet::new(0, 1, -1.0e3),
            Triplet::new(1, 1, 1.0),
            Triplet::new(2, 1, 1.0),
        ]);
        assert!(check_matrix(&cancelling, &signed, "m", "a", "b").is_ok());
    }
}
