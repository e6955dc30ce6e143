//! Conditional library injection.
//!
//! When enabled, the bundler probes the project's `node_modules` for
//! one configured library and, if present, prepends its distributed
//! build to the bundle ahead of the loader prologue. An absent or
//! unreadable package is a quiet no-op: the feature is opportunistic
//! and must never fail a build on its own.

use std::path::{Path, PathBuf};

use crate::Result;

/// A library build found in the project's dependency directory.
#[derive(Debug, Clone)]
pub struct InjectedLibrary {
    /// Path relative to the project root, used for source-map naming.
    pub rel: String,
    /// The library's distributed source text.
    pub code: String,
    /// Where the text was read from.
    pub path: PathBuf,
}

/// Probe for the configured library and read its distributed build.
///
/// Returns `Ok(None)` when injection is disabled, the package is not
/// installed, or its manifest does not point at a readable file.
pub(crate) fn maybe_inject(
    root: &Path,
    library: &str,
    enabled: bool,
) -> Result<Option<InjectedLibrary>> {
    if !enabled {
        return Ok(None);
    }

    let package_dir = root.join("node_modules").join(library);
    let manifest = package_dir.join("package.json");
    let Ok(text) = std::fs::read_to_string(&manifest) else {
        tracing::debug!(library, "library not installed, skipping injection");
        return Ok(None);
    };

    let main = serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|manifest| manifest.get("main")?.as_str().map(str::to_string))
        .unwrap_or_else(|| "index.js".to_string());

    let path = package_dir.join(main);
    let Ok(code) = std::fs::read_to_string(&path) else {
        tracing::debug!(library, path = %path.display(), "library build unreadable, skipping injection");
        return Ok(None);
    };

    let rel = path
        .strip_prefix(root)
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|_| path.display().to_string());

    tracing::debug!(library, %rel, bytes = code.len(), "injecting library");
    Ok(Some(InjectedLibrary { rel, code, path }))
}
