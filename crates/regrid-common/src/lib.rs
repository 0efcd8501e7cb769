//! Common types and utilities shared across the regrid workspace.

pub mod bbox;
pub mod digest;
pub mod error;
pub mod geometry;
pub mod triplet;

pub use bbox::{BboxParseError, BoundingBox};
pub use digest::{CacheKey, KeyHasher};
pub use error::{RegridError, RegridResult};
pub use geometry::{LatLon, Point3, EARTH_RADIUS_M};
pub use triplet::Triplet;
