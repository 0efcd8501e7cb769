//! HEALPix grids in RING ordering.

use std::f64::consts::{FRAC_PI_2, PI};

use regrid_common::{KeyHasher, LatLon, RegridError, RegridResult};

/// A HEALPix grid `H<Nside>` with 12·Nside² equal-area pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct Healpix {
    pub nside: usize,
}

impl Healpix {
    pub fn new(nside: usize) -> RegridResult<Self> {
        if nside == 0 {
            return Err(RegridError::configuration("HEALPix Nside must be positive"));
        }
        Ok(Self { nside })
    }

    pub fn number_of_points(&self) -> usize {
        12 * self.nside * self.nside
    }

    /// Centre of pixel `pix` (RING scheme).
    pub fn pixel_centre(&self, pix: usize) -> LatLon {
        let nside = self.nside as i64;
        let npix = 12 * nside * nside;
        let ncap = 2 * nside * (nside - 1);
        let fact2 = 4.0 / npix as f64;
        let fact1 = (2 * nside) as f64 * fact2;
        let pix = pix as i64;

        let (z, phi) = if pix < ncap {
            let iring = (1 + isqrt(1 + 2 * pix)) >> 1;
            let iphi = (pix + 1) - 2 * iring * (iring - 1);
            let z = 1.0 - (iring * iring) as f64 * fact2;
            (z, (iphi as f64 - 0.5) * FRAC_PI_2 / iring as f64)
        } else if pix < npix - ncap {
            let ip = pix - ncap;
            let iring = ip / (4 * nside) + nside;
            let iphi = ip % (4 * nside) + 1;
            let fodd = if (iring + nside) & 1 == 1 { 1.0 } else { 0.5 };
            let z = (2 * nside - iring) as f64 * fact1;
            (z, (iphi as f64 - fodd) * PI / (2 * nside) as f64)
        } else {
            let ip = npix - pix;
            let iring = (1 + isqrt(2 * ip - 1)) >> 1;
            let iphi = 4 * iring + 1 - (ip - 2 * iring * (iring - 1));
            let z = -1.0 + (iring * iring) as f64 * fact2;
            (z, (iphi as f64 - 0.5) * FRAC_PI_2 / iring as f64)
        };

        LatLon::new(z.clamp(-1.0, 1.0).asin().to_degrees(), phi.to_degrees())
    }

    pub fn points(&self) -> impl Iterator<Item = LatLon> + Send + '_ {
        (0..self.number_of_points()).map(move |pix| self.pixel_centre(pix))
    }

    pub fn hash(&self, hasher: &mut KeyHasher) {
        hasher.add_str("healpix_ring");
        hasher.add_usize(self.nside);
    }
}

/// Integer square root, rounded down.
fn isqrt(v: i64) -> i64 {
    let mut r = (v as f64).sqrt() as i64;
    while r * r > v {
        r -= 1;
    }
    while (r + 1) * (r + 1) <= v {
        r += 1;
    }
    r
}
