//! Build options builder.
//!
//! `BuildOptions` is the programmatic API of the bundler. The
//! serde-facing [`bale_config::BundleOptions`] document converts into
//! this type, so task runners can hand over plain JSON while library
//! users keep the builder.

use std::collections::BTreeMap;
use std::path::PathBuf;

use bale_config::BundleOptions;

/// Options for a single bundle build.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Entry file for the bundle.
    pub source_path: PathBuf,

    /// Where to persist the bundle; the stream stays the primary
    /// channel either way.
    pub destination_path: Option<PathBuf>,

    /// Collapse the bundle to one line and strip debug calls.
    pub minify: bool,

    /// Emit a source map next to the destination file.
    pub sourcemaps: bool,

    /// Prepend the optional library when it is installed.
    pub inject_library: bool,

    /// Name of the optional library to probe for.
    pub library: String,

    /// Run the modern-syntax preset: module lowering plus
    /// transpilation to the down-level target. Class declarations are
    /// never lowered.
    pub modern_syntax: bool,

    /// Parse JSX and rewrite elements to classic
    /// `React.createElement` calls.
    pub react: bool,

    /// Dependency sandbox root. Defaults to the nearest ancestor of
    /// the entry file containing a `package.json`, else the entry's
    /// directory.
    pub project_root: Option<PathBuf>,

    /// Environment snapshot for build-time inlining. `None` captures
    /// the invoking process environment when the task starts.
    pub env: Option<BTreeMap<String, String>>,
}

impl BuildOptions {
    /// Create options for a single entry file with defaults matching
    /// the configuration contract: source maps and injection on,
    /// minification off.
    pub fn new(source_path: impl Into<PathBuf>) -> Self {
        Self {
            source_path: source_path.into(),
            destination_path: None,
            minify: false,
            sourcemaps: true,
            inject_library: true,
            library: bale_config::DEFAULT_LIBRARY.to_string(),
            modern_syntax: true,
            react: false,
            project_root: None,
            env: None,
        }
    }

    /// Set the destination file for the bundle.
    pub fn destination_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.destination_path = Some(path.into());
        self
    }

    /// Enable or disable minification.
    pub fn minify(mut self, minify: bool) -> Self {
        self.minify = minify;
        self
    }

    /// Enable or disable source-map emission.
    pub fn sourcemaps(mut self, sourcemaps: bool) -> Self {
        self.sourcemaps = sourcemaps;
        self
    }

    /// Enable or disable conditional library injection.
    pub fn inject_library(mut self, inject: bool) -> Self {
        self.inject_library = inject;
        self
    }

    /// Override the name of the optional library to probe for.
    pub fn library(mut self, name: impl Into<String>) -> Self {
        self.library = name.into();
        self
    }

    /// Enable or disable the modern-syntax preset.
    pub fn modern_syntax(mut self, modern: bool) -> Self {
        self.modern_syntax = modern;
        self
    }

    /// Enable or disable JSX parsing and rewriting.
    pub fn react(mut self, react: bool) -> Self {
        self.react = react;
        self
    }

    /// Pin the dependency sandbox root explicitly.
    pub fn project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project_root = Some(root.into());
        self
    }

    /// Replace the environment snapshot wholesale.
    pub fn env_snapshot(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = Some(env);
        self
    }

    /// Add one variable to the environment snapshot, starting from an
    /// empty snapshot if none was set.
    pub fn env_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }
}

impl From<BundleOptions> for BuildOptions {
    fn from(options: BundleOptions) -> Self {
        Self {
            source_path: options.source,
            destination_path: options.destination,
            minify: options.minify,
            sourcemaps: options.sourcemaps,
            inject_library: options.inject_library,
            library: options.library,
            modern_syntax: options.modern_syntax,
            react: options.react,
            project_root: options.project_root,
            env: options.env,
        }
    }
}
