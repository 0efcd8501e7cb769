//! Configuration for the weight and coefficient caches.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cache::{Cache, WEIGHTS_NAMESPACE};
use crate::legendre::{LegendreCache, LEGENDRE_NAMESPACE};
use crate::loader::LoaderKind;

/// Configuration for the on-disk caches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Root directory of the on-disk cache.
    pub cache_dir: PathBuf,

    /// Loader used for interpolation weight matrices.
    pub matrix_loader: LoaderKind,

    /// Loader used for Legendre coefficients.
    pub legendre_loader: LoaderKind,

    /// Directory holding shared-memory segments.
    pub shm_dir: PathBuf,

    /// Decoded matrices kept in process memory (0 disables).
    pub memory_cache_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: std::env::temp_dir().join("regrid-cache"),
            matrix_loader: LoaderKind::Buffer,
            legendre_loader: LoaderKind::Buffer,
            shm_dir: PathBuf::from("/dev/shm"),
            memory_cache_entries: 16,
        }
    }
}

impl CacheConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("REGRID_CACHE_DIR") {
            config.cache_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("REGRID_MATRIX_LOADER") {
            match val.parse() {
                Ok(loader) => config.matrix_loader = loader,
                Err(e) => warn!(error = %e, "Ignoring REGRID_MATRIX_LOADER"),
            }
        }

        if let Ok(val) = std::env::var("REGRID_LEGENDRE_LOADER") {
            match val.parse() {
                Ok(loader) => config.legendre_loader = loader,
                Err(e) => warn!(error = %e, "Ignoring REGRID_LEGENDRE_LOADER"),
            }
        }

        if let Ok(val) = std::env::var("REGRID_SHM_DIR") {
            config.shm_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("REGRID_MEMORY_CACHE_ENTRIES") {
            if let Ok(n) = val.parse() {
                config.memory_cache_entries = n;
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.cache_dir.as_os_str().is_empty() {
            return Err("cache_dir must not be empty".to_string());
        }

        let uses_shm = [self.matrix_loader, self.legendre_loader].contains(&LoaderKind::SharedMemory);
        if uses_shm && self.shm_dir.as_os_str().is_empty() {
            return Err("shm_dir must be set for the shared-memory loader".to_string());
        }

        Ok(())
    }

    /// Cache for interpolation weight matrices.
    pub fn matrix_cache(&self) -> Cache {
        Cache::new(
            &self.cache_dir,
            WEIGHTS_NAMESPACE,
            self.matrix_loader,
            &self.shm_dir,
        )
    }

    /// Cache for Legendre coefficients.
    pub fn legendre_cache(&self) -> LegendreCache {
        LegendreCache::new(Cache::new(
            &self.cache_dir,
            LEGENDRE_NAMESPACE,
            self.legendre_loader,
            &self.shm_dir,
        ))
    }
}
