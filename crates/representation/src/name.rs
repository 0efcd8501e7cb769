//! Named-grid lookup.
//!
//! Recognised forms:
//! - `F<N>` regular Gaussian
//! - `O<N>` octahedral reduced Gaussian
//! - `H<Nside>` HEALPix (RING)
//! - `T<T>` spherical harmonics
//! - `<dlon>/<dlat>` global regular lat/lon

use regrid_common::{RegridError, RegridResult};

use crate::gaussian::{ReducedGaussian, RegularGaussian};
use crate::healpix::Healpix;
use crate::latlon::RegularLatLon;
use crate::representation::Representation;
use crate::spectral::SphericalHarmonics;

type Builder = fn(usize) -> RegridResult<Representation>;

fn regular_gaussian(n: usize) -> RegridResult<Representation> {
    Ok(RegularGaussian::new(n)?.into())
}

fn octahedral(n: usize) -> RegridResult<Representation> {
    Ok(ReducedGaussian::octahedral(n)?.into())
}

fn healpix(n: usize) -> RegridResult<Representation> {
    Ok(Healpix::new(n)?.into())
}

fn spectral(n: usize) -> RegridResult<Representation> {
    Ok(SphericalHarmonics::new(n).into())
}

/// Prefix letter, description and constructor for each numbered family.
const NUMBERED: &[(char, &str, Builder)] = &[
    ('F', "regular Gaussian", regular_gaussian),
    ('O', "octahedral reduced Gaussian", octahedral),
    ('H', "HEALPix ring", healpix),
    ('T', "spherical harmonics", spectral),
];

/// Known grid name patterns, for diagnostics.
pub fn grid_name_patterns() -> Vec<String> {
    NUMBERED
        .iter()
        .map(|(prefix, what, _)| format!("{}<N> ({})", prefix, what))
        .chain(std::iter::once("<dlon>/<dlat> (global regular lat/lon)".to_string()))
        .collect()
}

impl Representation {
    /// Resolve a named grid.
    pub fn from_name(name: &str) -> RegridResult<Representation> {
        let name = name.trim();

        if let Some((dlon, dlat)) = name.split_once('/') {
            let parse = |s: &str| {
                s.trim().parse::<f64>().map_err(|_| {
                    RegridError::configuration(format!("invalid increment '{}' in '{}'", s, name))
                })
            };
            return Ok(RegularLatLon::global(parse(dlon)?, parse(dlat)?)?.into());
        }

        let mut chars = name.chars();
        let prefix = chars.next().map(|c| c.to_ascii_uppercase());
        let number = chars.as_str();

        let builder = NUMBERED
            .iter()
            .find(|(p, _, _)| Some(*p) == prefix)
            .map(|(_, _, build)| build);

        match (builder, number.parse::<usize>()) {
            (Some(build), Ok(n)) => build(n),
            _ => Err(RegridError::configuration(format!(
                "unknown grid name '{}', expected one of: {}",
                name,
                grid_name_patterns().join(", ")
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbered_names() {
        assert_eq!(Representation::from_name("F2").unwrap().number_of_points(), 32);
        assert_eq!(Representation::from_name("O3").unwrap().number_of_points(), 144);
        assert_eq!(Representation::from_name("H2").unwrap().number_of_points(), 48);
        assert_eq!(Representation::from_name("t21").unwrap().short_name(), "T21");
    }

    #[test]
    fn test_lat_lon_name() {
        let grid = Representation::from_name("1.5/1.5").unwrap();
        assert_eq!(grid.number_of_points(), 240 * 121);
    }

    #[test]
    fn test_unknown_names() {
        for name in ["", "X12", "O", "Fabc", "1/x"] {
            assert!(matches!(
                Representation::from_name(name),
                Err(RegridError::Configuration(_))
            ));
        }
    }
}
