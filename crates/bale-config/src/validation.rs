//! Configuration validation.
//!
//! Two layers, following the same split the error type makes: schema
//! validation is pure (no filesystem access) and is safe to run on
//! untrusted input; path validation touches the filesystem and is
//! meant for the task-runner boundary right before a build.

use std::path::Path;

use path_clean::PathClean;

use crate::error::{ConfigError, Result};
use crate::options::BundleOptions;

/// Validate the options document without touching the filesystem.
///
/// Checks that an entry is present and, when an explicit project root
/// is configured, that the entry cannot resolve outside of it.
pub fn validate_schema(options: &BundleOptions) -> Result<()> {
    if options.source.as_os_str().is_empty() {
        return Err(ConfigError::NoEntry);
    }

    if let Some(root) = &options.project_root {
        let root = root.clean();
        let entry = if options.source.is_absolute() {
            options.source.clean()
        } else {
            root.join(&options.source).clean()
        };
        if !entry.starts_with(&root) {
            return Err(ConfigError::EntryOutsideRoot {
                entry: options.source.clone(),
                root: root.clone(),
            });
        }
    }

    Ok(())
}

/// Validate that configured paths exist on disk.
pub fn validate_paths(options: &BundleOptions) -> Result<()> {
    validate_schema(options)?;

    if !options.source.is_file() {
        return Err(ConfigError::EntryNotFound(options.source.clone()));
    }

    if let Some(root) = &options.project_root {
        if !Path::new(root).is_dir() {
            return Err(ConfigError::RootNotFound(root.clone()));
        }
    }

    Ok(())
}
