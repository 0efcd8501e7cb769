//! Error types for weight assembly.
//!
//! The taxonomy lives in `regrid-common` so every layer reports the same
//! variants; this module re-exports it under the crate's usual names.

pub use regrid_common::error::{RegridError, RegridResult};

/// Result type for regrid operations.
pub type Result<T> = std::result::Result<T, RegridError>;

/// Convert a YAML error into a configuration error.
pub(crate) fn yaml_error(err: serde_yaml::Error) -> RegridError {
    RegridError::configuration(format!("YAML error: {}", err))
}
