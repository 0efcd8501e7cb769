//! Nearest-neighbour search on the unit sphere.
//!
//! [`PointSearch`] indexes the points of a representation; [`Pick`] decides
//! which of them a target uses and [`DistanceWeighting`] turns that choice
//! into matrix triplets.

pub mod kdtree;
pub mod pick;
pub mod weighting;

pub use kdtree::{Neighbour, PointSearch};
pub use pick::Pick;
pub use weighting::{DistanceWeighting, DEFAULT_EXACT_MATCH_EPSILON};
