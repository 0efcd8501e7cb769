//! Point-set representations used as regridding inputs and outputs.
//!
//! Every grid kind is a variant of the closed [`Representation`] enum.
//! Grids are built from parameters or looked up by name and never change
//! afterwards.

pub mod gaussian;
pub mod healpix;
pub mod latlon;
pub mod name;
pub mod representation;
pub mod rotation;
pub mod spectral;
pub mod structure;
pub mod unstructured;

pub use gaussian::{gaussian_latitudes, octahedral_pl, ReducedGaussian, RegularGaussian};
pub use healpix::Healpix;
pub use latlon::{ReducedLatLon, RegularLatLon};
pub use name::grid_name_patterns;
pub use representation::{Points, Pole, Representation};
pub use rotation::Rotation;
pub use spectral::SphericalHarmonics;
pub use structure::{GridRow, GridStructure};
pub use unstructured::Unstructured;
