//! File-level fragment operations.

use crate::error::Result;
use crate::parser::FragmentTag;
use crate::writer::{Placement, strip_fragment, upsert_fragment};
use policy_fs::{NormalizedPath, io};

/// Insert or replace a fragment in a file.
///
/// A missing file is treated as empty and created. Returns `true` if the
/// file content changed.
pub fn upsert_fragment_in_file(
    path: &NormalizedPath,
    tag: &FragmentTag,
    body: &[String],
    placement: &Placement,
) -> Result<bool> {
    let original = io::read_text_if_exists(path)?.unwrap_or_default();
    let updated = upsert_fragment(&original, tag, body, placement);
    if updated == original {
        tracing::debug!(%path, %tag, "fragment already up to date");
        return Ok(false);
    }
    io::write_text(path, &updated)?;
    tracing::debug!(%path, %tag, "wrote fragment");
    Ok(true)
}

/// Remove a fragment from a file if present.
///
/// Returns `true` if a fragment was removed. A missing file is not an error.
pub fn remove_fragment_from_file(path: &NormalizedPath, tag: &FragmentTag) -> Result<bool> {
    let Some(original) = io::read_text_if_exists(path)? else {
        return Ok(false);
    };
    let (kept, removed) = strip_fragment(&original, tag);
    if !removed {
        return Ok(false);
    }
    let mut updated = kept.join("\n");
    if !kept.is_empty() {
        updated.push('\n');
    }
    io::write_text(path, &updated)?;
    tracing::debug!(%path, %tag, "removed fragment");
    Ok(true)
}
