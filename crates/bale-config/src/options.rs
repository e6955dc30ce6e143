//! The bundle options document.
//!
//! `BundleOptions` is the serde-facing form of a single build
//! invocation. Field defaults mirror the behaviour of the task runner
//! integration: source maps and library injection are on unless
//! switched off, minification is opt-in.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConfigError, Result};

/// The optional third-party library probed for by default.
pub const DEFAULT_LIBRARY: &str = "jquery";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleOptions {
    /// Entry file for the bundle. Required; must live inside the
    /// project root.
    pub source: PathBuf,

    /// Where to persist the bundle. When absent the in-memory stream
    /// is the only output channel.
    #[serde(default)]
    pub destination: Option<PathBuf>,

    /// Collapse the bundle to one line and strip debug calls.
    #[serde(default)]
    pub minify: bool,

    /// Emit a source map next to the destination file.
    #[serde(default = "default_true")]
    pub sourcemaps: bool,

    /// Prepend the optional library bundle when it is installed.
    #[serde(default = "default_true")]
    pub inject_library: bool,

    /// Name of the optional library to probe for.
    #[serde(default = "default_library")]
    pub library: String,

    /// Run the modern-syntax transform preset (module lowering and
    /// transpilation to the down-level target). Class declarations
    /// are never lowered.
    #[serde(default = "default_true")]
    pub modern_syntax: bool,

    /// Parse JSX and rewrite elements to classic
    /// `React.createElement` calls.
    #[serde(default)]
    pub react: bool,

    /// Dependency sandbox root. Defaults to the nearest ancestor of
    /// the entry file containing a `package.json`.
    #[serde(default)]
    pub project_root: Option<PathBuf>,

    /// Explicit environment snapshot for build-time inlining. When
    /// absent the invoking process environment is captured at build
    /// time.
    #[serde(default)]
    pub env: Option<BTreeMap<String, String>>,
}

fn default_true() -> bool {
    true
}

fn default_library() -> String {
    DEFAULT_LIBRARY.to_string()
}

impl BundleOptions {
    /// Create options for a single entry file with all defaults.
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: None,
            minify: false,
            sourcemaps: true,
            inject_library: true,
            library: default_library(),
            modern_syntax: true,
            react: false,
            project_root: None,
            env: None,
        }
    }

    /// Create from a `serde_json::Value` (for programmatic config
    /// handed over by a task runner).
    ///
    /// # Example
    ///
    /// ```
    /// use bale_config::BundleOptions;
    /// use serde_json::json;
    ///
    /// let options = BundleOptions::from_value(json!({
    ///     "source": "src/index.js",
    ///     "minify": true
    /// })).unwrap();
    /// assert!(options.minify);
    /// assert!(options.sourcemaps);
    /// ```
    pub fn from_value(value: Value) -> Result<Self> {
        let options: BundleOptions = serde_json::from_value(value)
            .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;
        tracing::debug!(source = %options.source.display(), "loaded bundle options");
        Ok(options)
    }

    /// Convert back to a `serde_json::Value`.
    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(|e| ConfigError::InvalidValue(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_value_applies_defaults() {
        let options = BundleOptions::from_value(json!({
            "source": "src/index.js"
        }))
        .unwrap();

        assert_eq!(options.source, PathBuf::from("src/index.js"));
        assert!(!options.minify);
        assert!(options.sourcemaps);
        assert!(options.inject_library);
        assert!(options.modern_syntax);
        assert!(!options.react);
        assert_eq!(options.library, DEFAULT_LIBRARY);
        assert!(options.destination.is_none());
        assert!(options.env.is_none());
    }

    #[test]
    fn from_value_rejects_missing_source() {
        let result = BundleOptions::from_value(json!({ "minify": true }));
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn round_trips_through_value() {
        let mut options = BundleOptions::new("src/index.js");
        options.minify = true;
        options.sourcemaps = false;

        let value = options.to_value().unwrap();
        let back = BundleOptions::from_value(value).unwrap();

        assert!(back.minify);
        assert!(!back.sourcemaps);
        assert_eq!(back.source, options.source);
    }
}
