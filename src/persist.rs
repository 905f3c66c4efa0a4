//! Atomic file replacement for the identity and directory stores.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::errors::{MatadorError, Result};

/// Replace `path` with `bytes` in one rename.
///
/// The data is staged in a temporary file in the same directory and synced
/// before the rename, so readers see either the old or the new contents. With
/// `private` set the file is created owner-read/write only on unix.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8], private: bool) -> Result<()> {
    stage(path, bytes, private)?
        .persist(path)
        .map_err(|e| MatadorError::Io(e.error.to_string()))?;
    Ok(())
}

/// Like [`write_atomic`], but fails with [`MatadorError::AlreadyExists`]
/// instead of replacing a file already at `path`.
pub(crate) fn write_new(path: &Path, bytes: &[u8], private: bool) -> Result<()> {
    stage(path, bytes, private)?
        .persist_noclobber(path)
        .map_err(|e| match e.error.kind() {
            ErrorKind::AlreadyExists => MatadorError::AlreadyExists(path.to_path_buf()),
            _ => MatadorError::Io(e.error.to_string()),
        })?;
    Ok(())
}

fn stage(path: &Path, bytes: &[u8], private: bool) -> Result<NamedTempFile> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;

    let mut staged = NamedTempFile::new_in(&parent)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = if private { 0o600 } else { 0o644 };
        fs::set_permissions(staged.path(), fs::Permissions::from_mode(mode))?;
    }
    #[cfg(not(unix))]
    let _ = private;

    staged.write_all(bytes)?;
    staged.as_file().sync_all()?;
    Ok(staged)
}

/// Read a whole file, mapping a missing file to [`MatadorError::NotFound`].
pub(crate) fn read(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => MatadorError::NotFound(path.to_path_buf()),
        _ => MatadorError::Io(e.to_string()),
    })
}
