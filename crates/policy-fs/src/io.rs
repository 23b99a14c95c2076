//! Atomic replacement of policy, state and system configuration files
//!
//! A file is never rewritten in place. New content is staged in a temporary
//! file beside the target and renamed over it, so a reader sees either the
//! old or the new document. An existing target keeps its permissions and is
//! held under an exclusive advisory lock while its replacement is staged.

use crate::{Error, NormalizedPath, Result};
use fs2::FileExt;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Replace the file at `path` with `content`, creating parent directories.
pub fn write_atomic(path: &NormalizedPath, content: &[u8]) -> Result<()> {
    let target = path.to_native();
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;

    // Released when dropped, after the rename
    let current = lock_current(&target)?;

    let mut staged = NamedTempFile::new_in(&dir).map_err(|e| Error::io(&dir, e))?;
    let staged_path = staged.path().to_path_buf();
    staged
        .write_all(content)
        .map_err(|e| Error::io(&staged_path, e))?;
    if let Some(current) = &current {
        let permissions = current
            .metadata()
            .map_err(|e| Error::io(&target, e))?
            .permissions();
        staged
            .as_file()
            .set_permissions(permissions)
            .map_err(|e| Error::io(&staged_path, e))?;
    }
    staged
        .as_file()
        .sync_all()
        .map_err(|e| Error::io(&staged_path, e))?;
    staged
        .persist(&target)
        .map_err(|e| Error::io(&target, e.error))?;

    tracing::trace!(path = %path, bytes = content.len(), replaced = current.is_some(), "replaced file");
    Ok(())
}

/// Open and exclusively lock the file being replaced, if it exists.
fn lock_current(target: &Path) -> Result<Option<File>> {
    let file = match File::open(target) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::io(target, e)),
    };
    file.lock_exclusive().map_err(|source| Error::LockFailed {
        path: target.to_path_buf(),
        source,
    })?;
    Ok(Some(file))
}

/// Replace a text file atomically.
pub fn write_text(path: &NormalizedPath, content: &str) -> Result<()> {
    write_atomic(path, content.as_bytes())
}

/// Read a whole text file.
pub fn read_text(path: &NormalizedPath) -> Result<String> {
    let native = path.to_native();
    fs::read_to_string(&native).map_err(|e| Error::io(&native, e))
}

/// Read a text file, or `None` if it does not exist yet.
pub fn read_text_if_exists(path: &NormalizedPath) -> Result<Option<String>> {
    match read_text(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}
