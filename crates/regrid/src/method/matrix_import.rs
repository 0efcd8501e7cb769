//! Pre-computed matrices read from a file.

use std::path::Path;

use tracing::info;

use regrid_common::{RegridError, RegridResult};
use representation::Representation;

use crate::matrix::WeightMatrix;

/// Load a matrix written by [`export_matrix`] and check it fits the pair.
pub(crate) fn load(
    path: &Path,
    input: &Representation,
    output: &Representation,
) -> RegridResult<WeightMatrix> {
    let bytes = std::fs::read(path)?;
    let matrix = WeightMatrix::from_bytes(&bytes).map_err(|e| {
        RegridError::configuration(format!("cannot import {}: {}", path.display(), e))
    })?;

    if matrix.rows() != output.number_of_points() {
        return Err(RegridError::DimensionMismatch {
            expected: output.number_of_points(),
            actual: matrix.rows(),
        });
    }
    if matrix.cols() != input.number_of_points() {
        return Err(RegridError::DimensionMismatch {
            expected: input.number_of_points(),
            actual: matrix.cols(),
        });
    }

    info!(
        path = %path.display(),
        rows = matrix.rows(),
        cols = matrix.cols(),
        nnz = matrix.nnz(),
        "Imported weight matrix"
    );
    Ok(matrix)
}

/// Write a matrix in the format read by `matrix-import`.
pub fn export_matrix(matrix: &WeightMatrix, path: impl AsRef<Path>) -> RegridResult<()> {
    let path = path.as_ref();
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, matrix.to_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::fixtures::{four_by_four, global_coarse};

    #[test]
    fn test_export_then_import() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("m.rgwm");
        let grid = four_by_four();
        export_matrix(&WeightMatrix::identity(16), &path).unwrap();

        let m = load(&path, &grid, &grid).unwrap();
        assert_eq!(m, WeightMatrix::identity(16));
    }

    #[test]
    fn test_shape_checked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.rgwm");
        export_matrix(&WeightMatrix::identity(16), &path).unwrap();

        assert!(matches!(
            load(&path, &four_by_four(), &global_coarse()),
            Err(RegridError::DimensionMismatch { expected, actual: 16 }) if expected == global_coarse().number_of_points()
        ));
    }

    #[test]
    fn test_garbage_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.rgwm");
        std::fs::write(&path, b"not a matrix").unwrap();
        assert!(matches!(
            load(&path, &four_by_four(), &four_by_four()),
            Err(RegridError::Configuration(_))
        ));
    }
}
