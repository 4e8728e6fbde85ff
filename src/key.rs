//! Cache key construction and the per-process key memoization cache.

use std::collections::HashMap;
use std::sync::Mutex;

use sha1::{Digest, Sha1};

/// Prefix for metadata keys.
pub const METADATA_PREFIX: &str = "md";
/// Prefix for entity (content-addressed body) keys.
pub const ENTITY_PREFIX: &str = "en";

/// Length of a hex-encoded SHA-1 digest.
const DIGEST_HEX_LEN: usize = 40;
/// Total length of a cache key: 2-char prefix + 40 hex chars.
pub const KEY_LEN: usize = 2 + DIGEST_HEX_LEN;

fn sha1_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Builds the metadata key `"md" + sha1(canonical_uri)` for a canonical URI.
pub fn metadata_key(canonical_uri: &str) -> String {
    format!("{METADATA_PREFIX}{}", sha1_hex(canonical_uri.as_bytes()))
}

/// Builds the entity key `"en" + sha1(body)` for a response body.
pub fn entity_key(body: &[u8]) -> String {
    format!("{ENTITY_PREFIX}{}", sha1_hex(body))
}

/// Returns the two-character prefix distinguishing metadata keys from entity
/// keys, or `None` if `key` is too short or carries neither prefix.
pub fn prefix(key: &str) -> Option<&str> {
    if key.len() != KEY_LEN {
        return None;
    }
    match &key[..2] {
        p @ (METADATA_PREFIX | ENTITY_PREFIX) => Some(p),
        _ => None,
    }
}

/// Per-process memoization of `canonical URI -> metadata key`, kept on the
/// process instance rather than in a global singleton (see
/// [`crate::CacheStore`]).
#[derive(Debug, Default)]
pub struct KeyCache {
    entries: Mutex<HashMap<String, String>>,
}

impl KeyCache {
    /// Creates an empty key cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the memoized metadata key for `canonical_uri`, computing and
    /// storing it on first lookup.
    pub fn get_or_compute(&self, canonical_uri: &str) -> String {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(key) = entries.get(canonical_uri) {
            return key.clone();
        }
        let key = metadata_key(canonical_uri);
        entries.insert(canonical_uri.to_owned(), key.clone());
        key
    }
}
