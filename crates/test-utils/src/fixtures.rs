//! Common test fixtures for the regrid workspace.
//!
//! Named grids and areas used across the crates' tests, plus a temporary
//! cache directory that cleans up after itself.

use std::path::{Path, PathBuf};

use regrid_common::BoundingBox;
use representation::{RegularLatLon, Representation};
use tempfile::TempDir;

/// Common areas for cropping tests.
pub mod areas {
    use regrid_common::BoundingBox;

    /// Europe, `north/west/south/east`.
    pub fn europe() -> BoundingBox {
        BoundingBox {
            north: 72.0,
            west: -15.0,
            south: 35.0,
            east: 45.0,
        }
    }

    /// A box straddling the date line.
    pub fn pacific() -> BoundingBox {
        BoundingBox {
            north: 30.0,
            west: 160.0,
            south: -30.0,
            east: 220.0,
        }
    }

    /// A small box well inside the tropics.
    pub fn tropics_small() -> BoundingBox {
        BoundingBox {
            north: 10.0,
            west: 20.0,
            south: -10.0,
            east: 40.0,
        }
    }
}

/// Regular lat/lon grid with `n` rows and columns at `increment` degrees,
/// starting at `(north, west)`.
pub fn regular_ll(north: f64, west: f64, increment: f64, n: usize) -> Representation {
    let span = increment * (n - 1) as f64;
    let bbox = BoundingBox {
        north,
        west,
        south: north - span,
        east: west + span,
    };
    RegularLatLon::new(increment, increment, bbox)
        .expect("fixture grid is valid")
        .into()
}

/// The 4x4 grid, 10 degree spacing, from (30N, 0E) to (0N, 30E).
pub fn four_by_four() -> Representation {
    regular_ll(30.0, 0.0, 10.0, 4)
}

/// A coarse global grid for quick end-to-end tests.
pub fn global_coarse() -> Representation {
    RegularLatLon::global(10.0, 10.0)
        .expect("fixture grid is valid")
        .into()
}

/// Temporary directory tree for cache tests.
///
/// Holds a cache root and a separate shared-memory directory so tests never
/// touch `/dev/shm`. Removed on drop.
pub struct TempCacheDir {
    dir: TempDir,
}

impl TempCacheDir {
    pub fn new() -> Self {
        let dir = tempfile::Builder::new()
            .prefix("regrid-test-")
            .tempdir()
            .expect("create temp dir");
        std::fs::create_dir_all(dir.path().join("cache")).expect("create cache dir");
        std::fs::create_dir_all(dir.path().join("shm")).expect("create shm dir");
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.dir.path().join("cache")
    }

    pub fn shm_dir(&self) -> PathBuf {
        self.dir.path().join("shm")
    }
}

impl Default for TempCacheDir {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_four_by_four() {
        let grid = four_by_four();
        assert_eq!(grid.number_of_points(), 16);
        assert!(!grid.is_periodic_west_east());
    }

    #[test]
    fn test_temp_cache_dir_cleanup() {
        let root;
        {
            let tmp = TempCacheDir::new();
            root = tmp.root().to_path_buf();
            assert!(tmp.cache_dir().is_dir());
            assert!(tmp.shm_dir().is_dir());
        }
        assert!(!root.exists());
    }

    #[test]
    fn test_areas_are_ordered() {
        for area in [areas::europe(), areas::pacific(), areas::tropics_small()] {
            assert!(area.north > area.south);
            assert!(area.east > area.west);
        }
    }
}
