//! Two-phase garbage collection: fully-stale metadata entries, then orphan
//! entity blobs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::entity::EntityStore;
use crate::error::Result;
use crate::key::{self, METADATA_PREFIX};
use crate::metadata::MetadataStore;
use crate::request::FreshnessPolicy;
use crate::path as path_encoder;

/// Walk depth bound for the metadata subtree scan. Relative to `root`, a
/// metadata path is `md/aa/bb/rest` - four components - so five gives
/// headroom without risking runaway recursion on an unexpectedly deep tree.
const MAX_WALK_DEPTH: usize = 5;

/// Runs the sweeper: deletes metadata entries every one of whose variants
/// is stale, then deletes any entity blob no surviving variant references.
/// Returns the total number of files deleted.
pub fn sweep<F: FreshnessPolicy>(
    root: &Path,
    metadata: &MetadataStore,
    entity: &EntityStore,
    freshness: &F,
) -> Result<usize> {
    let mut deleted = 0usize;
    let mut referenced: HashMap<String, bool> = HashMap::new();

    let metadata_root = root.join(METADATA_PREFIX);
    for file in walk_metadata_files(&metadata_root) {
        let Some(key) = path_encoder::decode(root, &file) else { continue };
        if key::prefix(&key) != Some(METADATA_PREFIX) {
            log::warn!("sweeper: decoded {key} under the metadata subtree but it has a non-metadata prefix; skipping");
            continue;
        }

        let entry = metadata.load(&key)?;
        let variants = entry.map(|e| e.variants).unwrap_or_default();

        let mut all_stale = true;
        for variant in &variants {
            let digest = variant.response.content_digest().map(str::to_owned);
            let fresh = match &digest {
                Some(d) => freshness.is_fresh(&variant.response) && entity.exists(d),
                None => false,
            };
            if fresh {
                all_stale = false;
            }
            if let Some(d) = digest {
                referenced
                    .entry(d)
                    .and_modify(|needed| *needed = *needed || fresh)
                    .or_insert(fresh);
            }
        }

        if all_stale {
            if metadata.remove(&key) {
                deleted += 1;
            }
            let lock_path = path_encoder::encode_lock(root, &key);
            crate::atomic::remove_best_effort(&lock_path);
            log::debug!("sweeper: removed fully-stale metadata entry {key}");
        }
    }

    for (digest, needed) in referenced {
        if !needed && entity.remove(&digest) {
            deleted += 1;
            log::debug!("sweeper: removed orphan entity blob {digest}");
        }
    }

    Ok(deleted)
}

/// Enumerates metadata files (skipping `.lck` siblings) under `dir`, bounded
/// to [`MAX_WALK_DEPTH`] levels.
fn walk_metadata_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    walk(dir, 0, &mut files);
    files
}

fn walk(dir: &Path, depth: usize, out: &mut Vec<PathBuf>) {
    if depth >= MAX_WALK_DEPTH {
        return;
    }
    let Ok(entries) = std::fs::read_dir(dir) else { return };
    for entry in entries.flatten() {
        let path = entry.path();
        let file_type = match entry.file_type() {
            Ok(ft) => ft,
            Err(_) => continue,
        };
        if file_type.is_dir() {
            walk(&path, depth + 1, out);
        } else if file_type.is_file() {
            if path.extension().and_then(|e| e.to_str()) == Some("lck") {
                continue;
            }
            out.push(path);
        }
    }
}
