//! Shared test utilities for the regrid workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Deterministic point-cloud and field generators
//! - Fixture grids and areas
//! - Temporary cache directories
//! - Approximate-equality assertions
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```

pub mod fixtures;
pub mod generators;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;

/// Assert two floats agree to within a relative tolerance.
///
/// The tolerance is scaled by `max(1, |left|, |right|)`, so it acts as an
/// absolute tolerance near zero.
///
/// ```ignore
/// use test_utils::assert_close;
///
/// assert_close!(1.0 + 1e-12, 1.0, 1e-9);
/// ```
#[macro_export]
macro_rules! assert_close {
    ($left:expr, $right:expr, $tolerance:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let scale = 1.0_f64.max(left.abs()).max(right.abs());
        let diff = (left - right).abs();
        if !(diff <= $tolerance as f64 * scale) {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > tolerance `{:?}`",
                left, right, diff, $tolerance
            );
        }
    }};
}

/// Assert two value vectors agree element-wise, treating NaN as equal to NaN.
#[macro_export]
macro_rules! assert_values_close {
    ($left:expr, $right:expr, $tolerance:expr) => {{
        let left: &[f64] = &$left;
        let right: &[f64] = &$right;
        assert_eq!(left.len(), right.len(), "length mismatch");
        for (i, (a, b)) in left.iter().zip(right).enumerate() {
            if a.is_nan() && b.is_nan() {
                continue;
            }
            let scale = 1.0_f64.max(a.abs()).max(b.abs());
            assert!(
                (a - b).abs() <= $tolerance as f64 * scale,
                "index {}: {} vs {}",
                i,
                a,
                b
            );
        }
    }};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_assert_close_passes() {
        assert_close!(1.0 + 1e-12, 1.0, 1e-9);
        assert_close!(0.0, 1e-12, 1e-9);
        assert_close!(1e6 + 1e-4, 1e6, 1e-9);
    }

    #[test]
    #[should_panic(expected = "assertion failed")]
    fn test_assert_close_fails() {
        assert_close!(1.1, 1.0, 1e-3);
    }

    #[test]
    fn test_assert_values_close_nan() {
        assert_values_close!(vec![1.0, f64::NAN], vec![1.0, f64::NAN], 1e-12);
    }
}
