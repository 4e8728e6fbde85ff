//! Content-addressed blob store. Key is `"en" + sha1(body)`; write-once.

use std::path::PathBuf;

use crate::error::Result;
use crate::{atomic, key, path as path_encoder};

/// Stores and retrieves entity blobs under a root directory.
#[derive(Debug, Clone)]
pub struct EntityStore {
    root: PathBuf,
}

impl EntityStore {
    /// Creates an entity store rooted at `root` (typically `<cache root>/en`
    /// is implied by callers joining with the shared path encoder; the
    /// encoder itself already namespaces metadata/entity/lock paths by key
    /// prefix, so `root` here is the cache's top-level directory).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path the entity with key `key` would be stored at.
    pub fn path(&self, key: &str) -> PathBuf {
        path_encoder::encode(&self.root, key)
    }

    /// Persists `body`, returning its entity key. Content addressing makes
    /// this write-once: if the key's file already exists, two writers
    /// racing to produce the same content both succeed and agree on the
    /// final bytes, so this simply re-runs the atomic writer rather than
    /// special-casing "already present".
    pub fn save(&self, body: &[u8]) -> Result<String> {
        let entity_key = key::entity_key(body);
        let path = self.path(&entity_key);
        atomic::write_atomic(&path, body)?;
        Ok(entity_key)
    }

    /// Loads the body stored under `key`, or `None` if absent.
    pub fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        atomic::read(&self.path(key))
    }

    /// Returns whether an entity exists under `key`, without reading it.
    pub fn exists(&self, key: &str) -> bool {
        self.path(key).is_file()
    }

    /// Best-effort delete. Returns whether a file was removed.
    pub fn remove(&self, key: &str) -> bool {
        atomic::remove_best_effort(&self.path(key))
    }
}

/// Computes the entity key a body would get without writing anything.
pub fn digest_for(body: &[u8]) -> String {
    key::entity_key(body)
}
