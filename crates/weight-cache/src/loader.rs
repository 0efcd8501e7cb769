//! Loader strategies and the handles they produce.

use std::fmt;
use std::fs::File;
use std::path::Path;
use std::str::FromStr;

use bytes::Bytes;
use memmap2::Mmap;
use serde::{Deserialize, Serialize};

use crate::entry::{self, EntryError};

/// How a cache entry's bytes are brought into memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LoaderKind {
    /// Read the whole entry into process memory.
    #[default]
    Buffer,
    /// Map the entry file read-only.
    #[serde(rename = "mmap")]
    MemoryMapped,
    /// Attach to a named segment in the shared-memory directory.
    SharedMemory,
    /// Never read or write the cache.
    Disabled,
}

impl LoaderKind {
    pub const ALL: [LoaderKind; 4] = [
        LoaderKind::Buffer,
        LoaderKind::MemoryMapped,
        LoaderKind::SharedMemory,
        LoaderKind::Disabled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LoaderKind::Buffer => "buffer",
            LoaderKind::MemoryMapped => "mmap",
            LoaderKind::SharedMemory => "shared-memory",
            LoaderKind::Disabled => "disabled",
        }
    }

    /// Names of every loader, for diagnostics.
    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|k| k.as_str()).collect()
    }

    /// Parse a loader name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.to_lowercase();
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }
}

impl fmt::Display for LoaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoaderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| {
            format!(
                "unknown loader '{}', expected one of: {}",
                s,
                Self::names().join(", ")
            )
        })
    }
}

/// Validated bytes of one cache entry.
///
/// The backing storage (heap buffer or mapping) is released when the
/// handle is dropped.
#[derive(Debug)]
pub enum Handle {
    Buffer(Bytes),
    Mapped(Mmap),
}

impl Handle {
    /// Read a framed entry file into memory.
    pub(crate) fn read(path: &Path) -> std::io::Result<Self> {
        Ok(Handle::Buffer(Bytes::from(std::fs::read(path)?)))
    }

    /// Map a framed entry file read-only.
    pub(crate) fn map(path: &Path) -> std::io::Result<Self> {
        let file = File::open(path)?;
        // SAFETY: entries are published by atomic rename and never modified
        // in place, so the mapped bytes cannot change under us.
        let map = unsafe { Mmap::map(&file)? };
        Ok(Handle::Mapped(map))
    }

    /// The full framed entry.
    pub fn raw(&self) -> &[u8] {
        match self {
            Handle::Buffer(bytes) => &bytes[..],
            Handle::Mapped(map) => &map[..],
        }
    }

    /// The payload, after checking framing and checksum.
    pub fn payload(&self) -> Result<&[u8], EntryError> {
        entry::decode(self.raw())
    }

    /// Size of the framed entry in bytes.
    pub fn len(&self) -> usize {
        self.raw().len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw().is_empty()
    }
}
