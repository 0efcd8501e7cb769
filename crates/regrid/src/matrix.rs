//! Sparse interpolation weights in compressed-row form.
//!
//! Row `i` of the matrix describes output point `i` as a weighted sum of
//! input points. Matrices are immutable once built and are shared behind
//! `Arc` between the in-process cache and callers.

use rayon::prelude::*;
use thiserror::Error;

use regrid_common::{RegridError, RegridResult, Triplet};

/// Magic bytes of a serialised matrix.
pub const MATRIX_MAGIC: &[u8; 4] = b"RGWM";

/// Serialisation format version.
pub const MATRIX_VERSION: u32 = 1;

const HEADER_LEN: usize = 4 + 4 + 8 + 8 + 8;

/// Errors decoding a serialised matrix.
#[derive(Debug, Error, PartialEq)]
pub enum MatrixFormatError {
    #[error("invalid magic bytes")]
    InvalidMagic,

    #[error("unsupported matrix version {0}")]
    UnsupportedVersion(u32),

    #[error("invalid size: expected {expected} bytes, got {actual}")]
    InvalidSize { expected: usize, actual: usize },

    #[error("malformed matrix: {0}")]
    Malformed(String),
}

/// Sparse weight matrix, `rows` output points by `cols` input points.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightMatrix {
    rows: usize,
    cols: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<f64>,
}

impl WeightMatrix {
    /// Build from unordered triplets.
    ///
    /// Entries are sorted by row then column; duplicates are summed.
    pub fn from_triplets(
        rows: usize,
        cols: usize,
        mut triplets: Vec<Triplet>,
    ) -> RegridResult<Self> {
        if let Some(t) = triplets.iter().find(|t| t.row >= rows || t.col >= cols) {
            return Err(RegridError::invalid_matrix(
                "",
                "",
                "",
                format!("entry ({}, {}) outside {}x{} matrix", t.row, t.col, rows, cols),
            )
            .at_row(t.row));
        }

        triplets.sort_by_key(|t| (t.row, t.col));

        let mut row_ptr = vec![0usize; rows + 1];
        let mut col_idx: Vec<usize> = Vec::with_capacity(triplets.len());
        let mut values: Vec<f64> = Vec::with_capacity(triplets.len());
        let mut last: Option<(usize, usize)> = None;

        for t in triplets {
            if last == Some((t.row, t.col)) {
                if let Some(v) = values.last_mut() {
                    *v += t.weight;
                }
                continue;
            }
            col_idx.push(t.col);
            values.push(t.weight);
            row_ptr[t.row + 1] += 1;
            last = Some((t.row, t.col));
        }

        for i in 0..rows {
            row_ptr[i + 1] += row_ptr[i];
        }

        Ok(Self {
            rows,
            cols,
            row_ptr,
            col_idx,
            values,
        })
    }

    /// Identity matrix of size `n`.
    pub fn identity(n: usize) -> Self {
        Self {
            rows: n,
            cols: n,
            row_ptr: (0..=n).collect(),
            col_idx: (0..n).collect(),
            values: vec![1.0; n],
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Columns and weights of one row.
    pub fn row(&self, i: usize) -> (&[usize], &[f64]) {
        let range = self.row_ptr[i]..self.row_ptr[i + 1];
        (&self.col_idx[range.clone()], &self.values[range])
    }

    pub fn row_is_empty(&self, i: usize) -> bool {
        self.row_ptr[i] == self.row_ptr[i + 1]
    }

    /// Sum of the weights of one row.
    pub fn row_sum(&self, i: usize) -> f64 {
        self.row(i).1.iter().sum()
    }

    /// All entries in row-major order.
    pub fn triplets(&self) -> impl Iterator<Item = Triplet> + '_ {
        (0..self.rows).flat_map(move |r| {
            let (cols, weights) = self.row(r);
            cols.iter()
                .zip(weights)
                .map(move |(&c, &w)| Triplet::new(r, c, w))
        })
    }

    pub fn transpose(&self) -> Self {
        let mut counts = vec![0usize; self.cols + 1];
        for &c in &self.col_idx {
            counts[c + 1] += 1;
        }
        for i in 0..self.cols {
            counts[i + 1] += counts[i];
        }

        let row_ptr = counts.clone();
        let mut next = counts;
        let mut col_idx = vec![0usize; self.nnz()];
        let mut values = vec![0.0f64; self.nnz()];

        // Walking rows in order keeps each transposed row sorted by column.
        for r in 0..self.rows {
            let (cols, weights) = self.row(r);
            for (&c, &w) in cols.iter().zip(weights) {
                let slot = next[c];
                col_idx[slot] = r;
                values[slot] = w;
                next[c] += 1;
            }
        }

        Self {
            rows: self.cols,
            cols: self.rows,
            row_ptr,
            col_idx,
            values,
        }
    }

    /// Approximate heap size in bytes.
    pub fn memory_usage(&self) -> usize {
        (self.row_ptr.len() + self.col_idx.len()) * std::mem::size_of::<usize>()
            + self.values.len() * std::mem::size_of::<f64>()
    }

    /// Interpolate a field.
    ///
    /// Input values equal to `missing` (or NaN) are excluded and the
    /// remaining weights of the row renormalised. A row whose inputs are
    /// all missing, or which has no entries, yields `missing` (NaN when no
    /// marker is given). Rows without missing inputs are a plain weighted
    /// sum.
    pub fn apply(&self, values: &[f64], missing: Option<f64>) -> RegridResult<Vec<f64>> {
        if values.len() != self.cols {
            return Err(RegridError::DimensionMismatch {
                expected: self.cols,
                actual: values.len(),
            });
        }

        let marker = missing.unwrap_or(f64::NAN);
        let is_missing = |v: f64| v.is_nan() || missing.map_or(false, |m| v == m);

        Ok((0..self.rows)
            .into_par_iter()
            .map(|r| {
                let (cols, weights) = self.row(r);
                if cols.is_empty() {
                    return marker;
                }

                let mut sum = 0.0;
                let mut present = 0.0;
                let mut any_missing = false;
                let mut any_present = false;
                for (&c, &w) in cols.iter().zip(weights) {
                    let v = values[c];
                    if is_missing(v) {
                        any_missing = true;
                    } else {
                        sum += w * v;
                        present += w;
                        any_present = true;
                    }
                }

                if !any_present {
                    marker
                } else if !any_missing {
                    sum
                } else if present == 0.0 {
                    marker
                } else {
                    sum / present
                }
            })
            .collect())
    }

    /// Interpolate several fields (e.g. the components of a vector field)
    /// with the same weights.
    pub fn apply_fields(
        &self,
        fields: &[&[f64]],
        missing: Option<f64>,
    ) -> RegridResult<Vec<Vec<f64>>> {
        fields.iter().map(|f| self.apply(f, missing)).collect()
    }

    /// Serialise to the little-endian matrix format.
    ///
    /// ```text
    /// magic "RGWM" | version u32 | rows u64 | cols u64 | nnz u64
    /// row_ptr (rows + 1) x u64 | col_idx nnz x u64 | values nnz x f64
    /// ```
    pub fn to_bytes(&self) -> Vec<u8> {
        let nnz = self.nnz();
        let mut bytes = Vec::with_capacity(HEADER_LEN + (self.rows + 1 + 2 * nnz) * 8);
        bytes.extend_from_slice(MATRIX_MAGIC);
        bytes.extend_from_slice(&MATRIX_VERSION.to_le_bytes());
        bytes.extend_from_slice(&(self.rows as u64).to_le_bytes());
        bytes.extend_from_slice(&(self.cols as u64).to_le_bytes());
        bytes.extend_from_slice(&(nnz as u64).to_le_bytes());
        for &p in &self.row_ptr {
            bytes.extend_from_slice(&(p as u64).to_le_bytes());
        }
        for &c in &self.col_idx {
            bytes.extend_from_slice(&(c as u64).to_le_bytes());
        }
        for &v in &self.values {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes
    }

    /// Decode the format written by [`WeightMatrix::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MatrixFormatError> {
        if bytes.len() < HEADER_LEN {
            return Err(MatrixFormatError::InvalidSize {
                expected: HEADER_LEN,
                actual: bytes.len(),
            });
        }
        if &bytes[0..4] != MATRIX_MAGIC {
            return Err(MatrixFormatError::InvalidMagic);
        }
        let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if version != MATRIX_VERSION {
            return Err(MatrixFormatError::UnsupportedVersion(version));
        }

        let rows = read_u64(bytes, 8) as usize;
        let cols = read_u64(bytes, 16) as usize;
        let nnz = read_u64(bytes, 24) as usize;

        let expected = rows
            .checked_add(1)
            .and_then(|n| nnz.checked_mul(2).and_then(|m| m.checked_add(n)))
            .and_then(|words| words.checked_mul(8))
            .and_then(|b| b.checked_add(HEADER_LEN))
            .ok_or_else(|| MatrixFormatError::Malformed("size overflow".to_string()))?;
        if bytes.len() != expected {
            return Err(MatrixFormatError::InvalidSize {
                expected,
                actual: bytes.len(),
            });
        }

        let mut offset = HEADER_LEN;
        let mut words = |n: usize| {
            let out: Vec<u64> = (0..n).map(|i| read_u64(bytes, offset + 8 * i)).collect();
            offset += 8 * n;
            out
        };
        let row_ptr: Vec<usize> = words(rows + 1).into_iter().map(|p| p as usize).collect();
        let col_idx: Vec<usize> = words(nnz).into_iter().map(|c| c as usize).collect();
        let values: Vec<f64> = words(nnz).into_iter().map(f64::from_bits).collect();

        if row_ptr.first() != Some(&0) || row_ptr.last() != Some(&nnz) {
            return Err(MatrixFormatError::Malformed(
                "row pointers do not span the entries".to_string(),
            ));
        }
        if row_ptr.windows(2).any(|w| w[0] > w[1]) {
            return Err(MatrixFormatError::Malformed(
                "row pointers are not monotonic".to_string(),
            ));
        }
        if let Some(c) = col_idx.iter().find(|&&c| c >= cols) {
            return Err(MatrixFormatError::Malformed(format!(
                "column {} outside {} columns",
                c, cols
            )));
        }

        Ok(Self {
            rows,
            cols,
            row_ptr,
            col_idx,
            values,
        })
    }
}

fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_le_bytes(word)
}
