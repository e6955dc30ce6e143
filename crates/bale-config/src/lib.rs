//! # bale-config
//!
//! Declarative configuration for the bale build task.
//!
//! This crate owns the serde-facing side of configuration: the
//! [`BundleOptions`] document with its field defaults, loading from a
//! `serde_json::Value` (for programmatic config from a task runner),
//! and validation. The bundler crate converts these options into its
//! own builder type before running a build.

mod error;
mod options;
mod validation;

pub use error::{ConfigError, Result};
pub use options::{BundleOptions, DEFAULT_LIBRARY};
pub use validation::{validate_paths, validate_schema};
