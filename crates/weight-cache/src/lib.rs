//! Content-addressed cache for interpolation weights and spectral coefficients.
//!
//! Provides:
//! - A versioned, checksummed on-disk entry format
//! - Loaders that bring entries into memory by reading, mapping, or attaching
//!   to a shared-memory segment
//! - Atomic, race-tolerant publication of new entries
//! - An in-process LRU in front of the disk

pub mod cache;
pub mod config;
pub mod entry;
pub mod legendre;
pub mod loader;
pub mod memory;
pub mod shared_memory;
pub mod stats;

pub use cache::{Cache, PutOutcome, WEIGHTS_NAMESPACE};
pub use config::CacheConfig;
pub use entry::EntryError;
pub use legendre::{LegendreCache, LegendreCoefficients, LEGENDRE_NAMESPACE};
pub use loader::{Handle, LoaderKind};
pub use memory::MemoryCache;
pub use stats::{CacheStats, CacheStatsSnapshot};
