//! Weighted interpolation between point representations.
//!
//! This crate assembles sparse weight matrices that map a field on one
//! representation (a regular or reduced grid, HEALPix, an unstructured
//! cloud) onto another, and applies them to data. It provides:
//!
//! - **Method families**: nearest neighbour, k-nearest with distance
//!   weighting, finite-element linear/bilinear, conservative,
//!   structured bilinear, pseudo-Laplace and matrix import
//! - **Cached assembly**: matrices are keyed by a digest of the method and
//!   both representations and reused through the `weight-cache` crate
//! - **Validation**: every assembled matrix is checked before it is cached
//!
//! # Architecture
//!
//! ```text
//! input ──┐
//!         ├─► Method::assemble ──► WeightMatrix (CSR)
//! output ─┘        │                     │
//!                  │                     ▼
//!                  │            WeightMatrix::apply(field, missing)
//!                  │                     │
//!                  ▼                     ▼
//!        MemoryCache / Cache      output field
//! ```
//!
//! # Example
//!
//! ```ignore
//! use regrid::{Method, MethodConfig, MethodKind};
//! use representation::Representation;
//!
//! let input = Representation::from_name("O32")?;
//! let output = Representation::from_name("1/1")?;
//! let method = Method::new(&MethodConfig::for_method(MethodKind::KNearest))?;
//!
//! let (matrix, outcome) = method.assemble(&input, &output)?;
//! let regridded = matrix.apply(&field, Some(9999.0))?;
//! ```

pub mod config;
pub mod error;
pub mod matrix;
pub mod mesh;
pub mod method;
pub mod validate;

// Re-export commonly used types at crate root
pub use config::MethodConfig;
pub use error::{RegridError, RegridResult, Result};
pub use matrix::{MatrixFormatError, WeightMatrix, MATRIX_MAGIC, MATRIX_VERSION};
pub use mesh::{Element, Mesh, MeshGenerator, MeshLocator, QuadWeights, StructuredMeshGenerator};
pub use method::{export_matrix, pseudo_laplace_weights, AssemblyOutcome, Method, MethodKind};
pub use validate::{check_matrix, MatrixChecks, ROW_SUM_TOLERANCE};
