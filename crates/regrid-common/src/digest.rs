//! Content-addressed cache keys.
//!
//! A key is the SHA-256 of everything that determines the bytes of a cached
//! artefact: method name and parameters, both representation signatures and
//! the cropping area. Two processes computing the same key therefore agree
//! on the file or segment name without any coordination.

use sha2::{Digest, Sha256};

/// Incremental builder for a [`CacheKey`].
#[derive(Clone, Default)]
pub struct KeyHasher {
    inner: Sha256,
}

impl KeyHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a string field, length-prefixed so adjacent fields cannot merge.
    pub fn add_str(&mut self, s: &str) {
        self.inner.update((s.len() as u64).to_le_bytes());
        self.inner.update(s.as_bytes());
    }

    pub fn add_u64(&mut self, v: u64) {
        self.inner.update(v.to_le_bytes());
    }

    pub fn add_usize(&mut self, v: usize) {
        self.add_u64(v as u64);
    }

    pub fn add_bool(&mut self, v: bool) {
        self.inner.update([v as u8]);
    }

    /// Add a float by bit pattern. Negative zero hashes like zero.
    pub fn add_f64(&mut self, v: f64) {
        let v = if v == 0.0 { 0.0 } else { v };
        self.inner.update(v.to_bits().to_le_bytes());
    }

    pub fn add_f64_slice(&mut self, values: &[f64]) {
        self.add_usize(values.len());
        for &v in values {
            self.add_f64(v);
        }
    }

    pub fn add_usize_slice(&mut self, values: &[usize]) {
        self.add_usize(values.len());
        for &v in values {
            self.add_usize(v);
        }
    }

    /// Finish the digest.
    pub fn finish(self) -> CacheKey {
        CacheKey(format!("{:x}", self.inner.finalize()))
    }
}

/// Hex-encoded SHA-256 identifying one cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Wrap an existing hex digest (e.g. read back from a file name).
    pub fn from_hex(hex: impl Into<String>) -> Option<Self> {
        let hex = hex.into();
        let valid = hex.len() == 64 && hex.bytes().all(|b| b.is_ascii_hexdigit());
        valid.then(|| Self(hex.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Two-character shard prefix used to fan entries out over directories.
    pub fn shard(&self) -> &str {
        &self.0[..2]
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_inputs_same_key() {
        let mut a = KeyHasher::new();
        a.add_str("k-nearest");
        a.add_usize(4);
        let mut b = KeyHasher::new();
        b.add_str("k-nearest");
        b.add_usize(4);
        assert_eq!(a.finish(), b.finish());
    }

    #[test]
    fn test_field_boundaries_matter() {
        let mut a = KeyHasher::new();
        a.add_str("ab");
        a.add_str("c");
        let mut b = KeyHasher::new();
        b.add_str("a");
        b.add_str("bc");
        assert_ne!(a.finish(), b.finish());
    }

    #[test]
    fn test_negative_zero() {
        let mut a = KeyHasher::new();
        a.add_f64(0.0);
        let mut b = KeyHasher::new();
        b.add_f64(-0.0);
        assert_eq!(a.finish(), b.finish());
    }

    #[test]
    fn test_key_shape() {
        let key = KeyHasher::new().finish();
        assert_eq!(key.as_str().len(), 64);
        assert_eq!(key.shard().len(), 2);
        assert_eq!(CacheKey::from_hex(key.as_str()), Some(key));
        assert!(CacheKey::from_hex("not-hex").is_none());
    }
}
