//! Atomic destination writes.
//!
//! The bundle (and its map) are written to a temporary sibling first
//! and renamed into place, so a crash mid-write never leaves a
//! truncated artifact at the destination. Nothing is written at all
//! when the build failed upstream.

use std::path::Path;

use crate::Result;

/// Write `contents` to `dest` atomically, creating parent directories
/// as needed.
pub(crate) fn write_atomic(dest: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = dest.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut tmp = dest.as_os_str().to_os_string();
    tmp.push(".tmp");
    let tmp = Path::new(&tmp);

    std::fs::write(tmp, contents)?;
    if let Err(err) = std::fs::rename(tmp, dest) {
        let _ = std::fs::remove_file(tmp);
        return Err(err.into());
    }

    tracing::debug!(dest = %dest.display(), bytes = contents.len(), "wrote artifact");
    Ok(())
}
