//! Per-key advisory locks that serialize concurrent cache fills.
//!
//! A lock is nothing but the presence of a sibling `.lck` file next to a
//! metadata entry: its existence alone means "in flight", its absence means
//! "free". Acquiring one is an exclusive create; releasing one is an
//! unlink. The registry additionally tracks
//! which locks *this* process created so `cleanup` can release them on
//! shutdown without scanning the whole tree.

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::Result;
use crate::{atomic, path as path_encoder};

/// Outcome of attempting to acquire a lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockOutcome {
    /// The lock was created by this call; the caller owns it.
    Acquired,
    /// Another actor already holds the lock. Carries the lock file's path
    /// so the caller knows where it's held.
    HeldElsewhere(PathBuf),
    /// Lock creation failed for a reason other than "already exists"
    /// (e.g. the parent directory could not be created).
    Failed,
}

/// Tracks locks owned by this process and exposes acquire/release/query.
///
/// A registry lives on the [`crate::CacheStore`] instance rather than
/// behind a global, so two stores in the same process never confuse each
/// other's owned locks.
#[derive(Debug, Default)]
pub struct LockRegistry {
    owned: Mutex<HashSet<PathBuf>>,
}

/// Contents written into a lock file: who created it and when. Advisory
/// only - nothing currently parses this back to reap a dead lock, but it
/// gives a future reaper something to read instead of an empty file.
fn stamp() -> Vec<u8> {
    let pid = std::process::id();
    let started_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("pid={pid} started_at={started_at}\n").into_bytes()
}

impl LockRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts to acquire the lock for `key` under `root`.
    pub fn lock(&self, root: &Path, key: &str) -> Result<LockOutcome> {
        let lock_path = path_encoder::encode_lock(root, key);
        let parent = lock_path.parent().unwrap_or_else(|| Path::new("."));
        if std::fs::create_dir_all(parent).is_err() {
            return Ok(LockOutcome::Failed);
        }

        match OpenOptions::new().write(true).create_new(true).open(&lock_path) {
            Ok(mut file) => {
                let _ = file.write_all(&stamp());
                self.owned.lock().unwrap_or_else(|e| e.into_inner()).insert(lock_path);
                Ok(LockOutcome::Acquired)
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Ok(LockOutcome::HeldElsewhere(lock_path))
            }
            Err(e) => {
                log::warn!("lock acquire for {key} failed: {e}");
                Ok(LockOutcome::Failed)
            }
        }
    }

    /// Releases the lock for `key` under `root`. Returns whether a file was
    /// actually removed.
    pub fn unlock(&self, root: &Path, key: &str) -> bool {
        let lock_path = path_encoder::encode_lock(root, key);
        let removed = atomic::remove_best_effort(&lock_path);
        self.owned.lock().unwrap_or_else(|e| e.into_inner()).remove(&lock_path);
        removed
    }

    /// Returns whether a lock file currently exists for `key` under `root`.
    pub fn is_locked(&self, root: &Path, key: &str) -> bool {
        path_encoder::encode_lock(root, key).is_file()
    }

    /// Releases every lock this process has acquired, best-effort. Does
    /// *not* run the sweeper - only unlinks locks this process owns.
    pub fn cleanup(&self) {
        let mut owned = self.owned.lock().unwrap_or_else(|e| e.into_inner());
        for path in owned.drain() {
            atomic::remove_best_effort(&path);
        }
    }
}
