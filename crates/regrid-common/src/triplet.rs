//! Sparse matrix contributions.

use serde::{Deserialize, Serialize};

/// One `(output row, input column, weight)` contribution to a weight matrix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Triplet {
    pub row: usize,
    pub col: usize,
    pub weight: f64,
}

impl Triplet {
    pub fn new(row: usize, col: usize, weight: f64) -> Self {
        Self { row, col, weight }
    }
}
