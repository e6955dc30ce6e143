//! # bale-bundler
//!
//! Policy-driven single-bundle build task on top of the oxc toolchain.
//!
//! Bale sits between a task runner and the parsing/codegen layer. It
//! turns one JavaScript entry file into one loader-wrapped bundle,
//! adding the policy the lower layers do not have: dependency sandbox
//! validation, conditional third-party injection, build-time
//! environment inlining, transpilation to a down-level target (with
//! optional JSX rewriting), minification, source-map emission, and
//! syntax-restriction enforcement.
//!
//! ## Quick start
//!
//! ```no_run
//! use bale_bundler::{build, BuildOptions};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let task = build(
//!     BuildOptions::new("src/index.js")
//!         .destination_path("dist/bundle.js")
//!         .minify(true),
//! );
//!
//! // No I/O has happened yet; the task is cold until started.
//! let stream = task.start();
//! let bytes = stream.into_bytes()?;
//! assert!(!bytes.is_empty());
//! # Ok(()) }
//! ```
//!
//! ## Error channels
//!
//! A failed build delivers exactly one [`BuildError`], either through
//! the stream or through an error callback installed with
//! [`BuildTask::on_error`] - never both:
//!
//! ```no_run
//! use bale_bundler::{build, BuildOptions};
//!
//! let stream = build(BuildOptions::new("src/index.js"))
//!     .on_error(|err| eprintln!("build failed: {err}"))
//!     .start();
//! // With a callback installed the stream stays silent on failure.
//! for chunk in stream {
//!     let _ = chunk;
//! }
//! ```

mod assemble;
mod graph;
mod inject;
mod options;
mod sandbox;
mod stage;
mod stream;
mod task;
mod writer;

pub use graph::ModuleRecord;
pub use inject::InjectedLibrary;
pub use options::BuildOptions;
pub use sandbox::validate_reference;
pub use stage::Stage;
pub use stream::BundleStream;
pub use task::{build, BuildTask};

// Re-export the declarative configuration layer for task runners.
pub use bale_config::BundleOptions;

// Logging utilities (optional, enabled with "logging" feature)
#[cfg(feature = "logging")]
pub mod logging;

/// Error types for bale-bundler operations.
///
/// The build taxonomy is deliberately small: a sandbox violation, a
/// syntax rejection, or a transform failure. Every one of them is
/// fatal, never retried, and delivered as a value on the configured
/// error channel rather than thrown across the stream boundary.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// A module reference escapes the dependency sandbox.
    #[error("dependency reference \"{specifier}\" in {from} escapes the dependency sandbox: contains \"{fragment}\"")]
    SandboxViolation {
        specifier: String,
        from: String,
        fragment: String,
    },

    /// Source uses rejected or non-finalized syntax.
    #[error("syntax error in {file}: {message}")]
    Syntax { file: String, message: String },

    /// A transform stage failed on otherwise-valid input.
    #[error("transform failed for {file}: {message}")]
    Transform { file: String, message: String },

    /// Invalid build options.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for bale-bundler operations.
pub type Result<T> = std::result::Result<T, BuildError>;

impl miette::Diagnostic for BuildError {
    fn code(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        Some(Box::new(match self {
            BuildError::SandboxViolation { .. } => "SANDBOX_VIOLATION",
            BuildError::Syntax { .. } => "SYNTAX_ERROR",
            BuildError::Transform { .. } => "TRANSFORM_ERROR",
            BuildError::InvalidConfig(_) => "INVALID_CONFIG",
            BuildError::Io(_) => "IO_ERROR",
        }))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(miette::Severity::Error)
    }

    fn help(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        match self {
            BuildError::SandboxViolation { specifier, .. } => Some(Box::new(format!(
                "The reference '{specifier}' resolves into a dependency cache outside the project boundary.\nImport installed packages by name instead of by relative path."
            ))),
            BuildError::Syntax { .. } => Some(Box::new(
                "Only finalized language syntax is accepted. Check the offending token against the current standard.".to_string(),
            )),
            BuildError::InvalidConfig(msg) => Some(Box::new(format!(
                "Check the build options for mistakes.\nError: {msg}"
            ))),
            _ => None,
        }
    }
}
