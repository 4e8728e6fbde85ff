//! Maps a cache key to its ordered [`MetadataEntry`].
//!
//! Uses the same atomic write path as the entity store, with one
//! difference: the payload is a serialized [`MetadataEntry`] rather than a
//! raw body. A corrupt or unrecognized-version blob collapses to "no
//! metadata" rather than raising.

use std::path::PathBuf;

use crate::error::Result;
use crate::headers::MetadataEntry;
use crate::{atomic, path as path_encoder};

/// Stores and retrieves metadata entries under a root directory.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    root: PathBuf,
}

impl MetadataStore {
    /// Creates a metadata store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path the metadata entry for `key` would be stored at.
    pub fn path(&self, key: &str) -> PathBuf {
        path_encoder::encode(&self.root, key)
    }

    /// Loads the metadata entry for `key`. A missing file, an unparseable
    /// blob, and an unrecognized format version all collapse to `None`
    /// (all equivalent to a miss); only a filesystem error propagates.
    pub fn load(&self, key: &str) -> Result<Option<MetadataEntry>> {
        let bytes = match atomic::read(&self.path(key))? {
            Some(bytes) => bytes,
            None => return Ok(None),
        };
        match MetadataEntry::from_bytes(&bytes) {
            Some(entry) => Ok(Some(entry)),
            None => {
                log::warn!(
                    "corrupt or unrecognized metadata at key {key}; treating as miss"
                );
                Ok(None)
            }
        }
    }

    /// Persists `entry` for `key`, replacing whatever was there.
    pub fn store(&self, key: &str, entry: &MetadataEntry) -> Result<()> {
        let bytes = entry.to_bytes()?;
        atomic::write_atomic(&self.path(key), &bytes)
    }

    /// Best-effort delete of the metadata file for `key`. Returns whether a
    /// file was actually removed.
    pub fn remove(&self, key: &str) -> bool {
        atomic::remove_best_effort(&self.path(key))
    }
}
