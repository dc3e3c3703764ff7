//! Content hashing for identity and grouping.
//!
//! Uses SHA-256 over canonical JSON with truncated output to provide stable
//! identifiers. These ids group logically-identical report entities; they are
//! not a security boundary.

use crate::canonicalize::Canonicalizer;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Default number of bytes to keep from the digest (32 hex chars).
pub const DEFAULT_TRUNCATION_BYTES: usize = 16;

/// Stable identifier derived from content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(String);

impl ContentId {
    /// Sentinel grouping for entities that have no parent suite.
    pub fn no_suite() -> Self {
        ContentId("no-suite".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hashes values and tuples into [`ContentId`]s.
#[derive(Debug, Clone, Copy)]
pub struct ContentHasher {
    canonicalizer: Canonicalizer,
    truncation_bytes: usize,
}

impl ContentHasher {
    pub fn new() -> Self {
        Self {
            canonicalizer: Canonicalizer::new(),
            truncation_bytes: DEFAULT_TRUNCATION_BYTES,
        }
    }

    /// Keep `bytes` bytes of the digest (clamped to 8..=32).
    pub fn with_truncation(mut self, bytes: usize) -> Self {
        self.truncation_bytes = bytes.clamp(8, 32);
        self
    }

    pub fn with_canonicalizer(mut self, canonicalizer: Canonicalizer) -> Self {
        self.canonicalizer = canonicalizer;
        self
    }

    /// Identity of any serializable value, insensitive to key order.
    pub fn hash_value<T: Serialize + ?Sized>(&self, value: &T) -> Result<ContentId> {
        let value = serde_json::to_value(value)?;
        let canonical = self.canonicalizer.canonicalize(&value);
        Ok(self.digest(canonical.as_bytes()))
    }

    /// Identity of an ordered tuple of strings.
    ///
    /// Each part is length-prefixed so `("ab", "c")` and `("a", "bc")` differ.
    pub fn hash_parts(&self, parts: &[&str]) -> ContentId {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update((part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        self.finish(hasher)
    }

    fn digest(&self, bytes: &[u8]) -> ContentId {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        self.finish(hasher)
    }

    fn finish(&self, hasher: Sha256) -> ContentId {
        let result = hasher.finalize();
        ContentId(hex::encode(&result[..self.truncation_bytes]))
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Identity of a value using the default hasher.
pub fn content_id<T: Serialize + ?Sized>(value: &T) -> Result<ContentId> {
    ContentHasher::new().hash_value(value)
}

/// Identity of an ordered tuple using the default hasher.
pub fn content_id_of_parts(parts: &[&str]) -> ContentId {
    ContentHasher::new().hash_parts(parts)
}
