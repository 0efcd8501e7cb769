//! Error types for regridding.

use thiserror::Error;

/// Result type alias using RegridError.
pub type RegridResult<T> = Result<T, RegridError>;

/// Primary error type for representation, search, assembly and cache operations.
#[derive(Debug, Error)]
pub enum RegridError {
    // === Setup Errors ===
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Empty domain: {0}")]
    EmptyDomain(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    // === Assembly Errors ===
    #[error("Invalid weight matrix from '{method}' ({input} -> {output}){}: {reason}", .row.map(|r| format!(" at row {}", r)).unwrap_or_default())]
    InvalidWeightMatrix {
        method: String,
        input: String,
        output: String,
        row: Option<usize>,
        reason: String,
    },

    #[error("Dimension mismatch: expected {expected} values, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    // === Cache Errors ===
    #[error("Corrupt cache entry {key}: {reason}")]
    CacheCorruption { key: String, reason: String },

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RegridError {
    /// Create a Configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create an EmptyDomain error.
    pub fn empty_domain(msg: impl Into<String>) -> Self {
        Self::EmptyDomain(msg.into())
    }

    /// Create an UnsupportedOperation error.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedOperation(msg.into())
    }

    /// Create an InvalidWeightMatrix error without row context.
    pub fn invalid_matrix(
        method: impl Into<String>,
        input: impl Into<String>,
        output: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidWeightMatrix {
            method: method.into(),
            input: input.into(),
            output: output.into(),
            row: None,
            reason: reason.into(),
        }
    }

    /// Create a CacheCorruption error.
    pub fn corruption(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CacheCorruption {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create a Cache error.
    pub fn cache(msg: impl Into<String>) -> Self {
        Self::Cache(msg.into())
    }

    /// Attach a row index to an InvalidWeightMatrix error; other errors pass through.
    pub fn at_row(self, index: usize) -> Self {
        match self {
            Self::InvalidWeightMatrix {
                method,
                input,
                output,
                reason,
                ..
            } => Self::InvalidWeightMatrix {
                method,
                input,
                output,
                row: Some(index),
                reason,
            },
            other => other,
        }
    }

    /// Fill in the method and representation names of an InvalidWeightMatrix
    /// error raised below the method layer; other errors pass through.
    pub fn with_context(
        self,
        method: impl Into<String>,
        input: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        match self {
            Self::InvalidWeightMatrix { row, reason, .. } => Self::InvalidWeightMatrix {
                method: method.into(),
                input: input.into(),
                output: output.into(),
                row,
                reason,
            },
            other => other,
        }
    }

    /// Errors that come from the cache layer and may be recovered by recomputing.
    pub fn is_cache_recoverable(&self) -> bool {
        matches!(
            self,
            Self::CacheCorruption { .. } | Self::Cache(_) | Self::Io(_)
        )
    }
}

impl From<serde_json::Error> for RegridError {
    fn from(err: serde_json::Error) -> Self {
        RegridError::Configuration(format!("JSON error: {}", err))
    }
}

impl From<crate::bbox::BboxParseError> for RegridError {
    fn from(err: crate::bbox::BboxParseError) -> Self {
        RegridError::Configuration(err.to_string())
    }
}
