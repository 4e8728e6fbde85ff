//! Deterministic mapping between an opaque cache key and a filesystem path.
//!
//! Keys are always `prefix + 40 hex chars` (42 bytes total, see [`crate::key`]).
//! The path is a three-level, 256-way fan-out over hex pairs followed by the
//! remaining tail, so no single directory ever holds more than a handful of
//! entries even at very large cache sizes:
//!
//! ```text
//! root / k[0..2] / k[2..4] / k[4..6] / k[6..]
//! ```
//!
//! The same function serves metadata, entity, and lock paths - lock files are
//! just the key's path with `.lck` appended.

use std::path::{Path, PathBuf};

/// Minimum key length the encoder accepts. Keys shorter than this can't be
/// split into three two-character fan-out segments plus a tail.
const MIN_KEY_LEN: usize = 8;

/// Builds the on-disk path for `key` under `root`.
///
/// Panics if `key` is shorter than [`MIN_KEY_LEN`] - callers only ever pass
/// keys produced by [`crate::key`], which are always 42 bytes.
pub fn encode(root: &Path, key: &str) -> PathBuf {
    assert!(
        key.len() >= MIN_KEY_LEN,
        "cache key {key:?} shorter than minimum length {MIN_KEY_LEN}"
    );
    root.join(&key[0..2]).join(&key[2..4]).join(&key[4..6]).join(&key[6..])
}

/// Recovers the cache key that produced `path` via [`encode`].
///
/// Returns `None` if `path` does not live under `root` or doesn't have the
/// expected four-segment shape.
pub fn decode(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let mut segments = rel.components();
    let a = segments.next()?.as_os_str().to_str()?;
    let b = segments.next()?.as_os_str().to_str()?;
    let c = segments.next()?.as_os_str().to_str()?;
    let rest = segments.next()?.as_os_str().to_str()?;
    if segments.next().is_some() {
        return None;
    }
    Some(format!("{a}{b}{c}{rest}"))
}

/// Path for the advisory lock sibling of `key`.
pub fn encode_lock(root: &Path, key: &str) -> PathBuf {
    let mut path = encode(root, key).into_os_string();
    path.push(".lck");
    PathBuf::from(path)
}
