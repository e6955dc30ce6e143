//! Error types for configuration validation and loading.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    // Filesystem validation errors (for task-runner use)
    #[error("entry path not found: {0}")]
    EntryNotFound(PathBuf),

    #[error("project root not found: {0}")]
    RootNotFound(PathBuf),

    // Schema validation errors (no filesystem checks)
    #[error("no entry file specified")]
    NoEntry,

    #[error("entry path {entry} is outside the project root {root}")]
    EntryOutsideRoot { entry: PathBuf, root: PathBuf },

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
