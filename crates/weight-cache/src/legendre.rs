//! Cache for spectral-transform Legendre coefficients.
//!
//! Coefficients are stored as a flat little-endian `f64` array keyed by
//! truncation and the exact set of Gaussian latitudes.

use tracing::{info, warn};

use regrid_common::{CacheKey, KeyHasher, RegridError, RegridResult};

use crate::cache::{Cache, PutOutcome};

/// Namespace for Legendre coefficient tables.
pub const LEGENDRE_NAMESPACE: &str = "legendre";

/// Coefficients returned by [`LegendreCache::get_or_compute`].
#[derive(Debug, Clone, PartialEq)]
pub struct LegendreCoefficients {
    pub values: Vec<f64>,
    /// Whether the values were read from the cache rather than built.
    pub from_cache: bool,
}

#[derive(Debug, Clone)]
pub struct LegendreCache {
    cache: Cache,
}

impl LegendreCache {
    pub fn new(cache: Cache) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub fn key(truncation: usize, latitudes: &[f64]) -> CacheKey {
        let mut hasher = KeyHasher::new();
        hasher.add_str(LEGENDRE_NAMESPACE);
        hasher.add_usize(truncation);
        hasher.add_f64_slice(latitudes);
        hasher.finish()
    }

    /// Fetch the coefficients for `truncation` at `latitudes`, building and
    /// storing them on a miss.
    ///
    /// A corrupt or unreadable entry is treated as a miss and overwritten.
    pub fn get_or_compute<F>(
        &self,
        truncation: usize,
        latitudes: &[f64],
        build: F,
    ) -> RegridResult<LegendreCoefficients>
    where
        F: FnOnce() -> RegridResult<Vec<f64>>,
    {
        let key = Self::key(truncation, latitudes);

        match self.load(&key) {
            Ok(Some(values)) => {
                return Ok(LegendreCoefficients {
                    values,
                    from_cache: true,
                })
            }
            Ok(None) => {}
            Err(e) if e.is_cache_recoverable() => {
                warn!(key = %key, error = %e, "Rebuilding Legendre coefficients");
            }
            Err(e) => return Err(e),
        }

        let values = build()?;
        info!(
            truncation,
            latitudes = latitudes.len(),
            values = values.len(),
            "Computed Legendre coefficients"
        );

        match self.cache.put(&key, &encode(&values)) {
            Ok(PutOutcome::Stored | PutOutcome::LostRace | PutOutcome::Skipped) => {}
            Err(e) => warn!(key = %key, error = %e, "Failed to store Legendre coefficients"),
        }

        Ok(LegendreCoefficients {
            values,
            from_cache: false,
        })
    }

    fn load(&self, key: &CacheKey) -> RegridResult<Option<Vec<f64>>> {
        let Some(handle) = self.cache.get(key)? else {
            return Ok(None);
        };
        let payload = handle
            .payload()
            .map_err(|e| RegridError::corruption(key.as_str(), e.to_string()))?;
        decode(payload)
            .map(Some)
            .ok_or_else(|| {
                RegridError::corruption(
                    key.as_str(),
                    format!("payload of {} bytes is not a f64 array", payload.len()),
                )
            })
    }
}

fn encode(values: &[f64]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode(bytes: &[u8]) -> Option<Vec<f64>> {
    if bytes.len() % 8 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(8)
            .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
            .collect(),
    )
}
