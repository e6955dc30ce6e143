//! Build task orchestration.
//!
//! [`build`] only captures options; every side effect - reading the
//! entry, walking the graph, writing artifacts - waits until
//! [`BuildTask::start`]. A task is therefore free to construct
//! eagerly and run never, which is how task runners wire up targets.
//!
//! A failed build produces exactly one [`BuildError`] on one channel:
//! the stream by default, or the callback installed with
//! [`BuildTask::on_error`], in which case the stream ends empty.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::options::BuildOptions;
use crate::stream::BundleStream;
use crate::{assemble, graph, inject, stage, writer, BuildError, Result};

/// Create a cold build task. No I/O happens until [`BuildTask::start`].
pub fn build(options: BuildOptions) -> BuildTask {
    BuildTask {
        options,
        on_error: None,
    }
}

/// A configured, not-yet-started bundle build.
pub struct BuildTask {
    options: BuildOptions,
    on_error: Option<Box<dyn Fn(BuildError) + Send + Sync>>,
}

impl std::fmt::Debug for BuildTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildTask")
            .field("options", &self.options)
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

impl BuildTask {
    /// Install an error callback. With a callback present, a build
    /// failure is delivered there and the stream ends without items.
    pub fn on_error(mut self, callback: impl Fn(BuildError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(callback));
        self
    }

    /// Run the build and return the bundle stream.
    pub fn start(self) -> BundleStream {
        match run(&self.options) {
            Ok(bytes) => BundleStream::from_bytes(bytes),
            Err(err) => match &self.on_error {
                Some(callback) => {
                    callback(err);
                    BundleStream::empty()
                }
                None => BundleStream::failed(err),
            },
        }
    }
}

fn run(options: &BuildOptions) -> Result<Vec<u8>> {
    let source = options.source_path.canonicalize().map_err(|e| {
        BuildError::Io(std::io::Error::new(
            e.kind(),
            format!(
                "cannot open entry {entry}: {e}",
                entry = options.source_path.display()
            ),
        ))
    })?;

    let root = match &options.project_root {
        Some(root) => root.canonicalize()?,
        None => find_project_root(&source),
    };
    if !source.starts_with(&root) {
        return Err(BuildError::InvalidConfig(format!(
            "entry {entry} is outside the project root {root}",
            entry = source.display(),
            root = root.display()
        )));
    }

    tracing::info!(entry = %source.display(), root = %root.display(), "starting bundle build");

    let env = match &options.env {
        Some(env) => env.clone(),
        None => std::env::vars().collect::<BTreeMap<_, _>>(),
    };

    let stages = stage::plan(options);
    let modules = graph::collect(&source, &root, &stages, &env, options.react)?;
    let injected = inject::maybe_inject(&root, &options.library, options.inject_library)?;

    let dest_name = options
        .destination_path
        .as_ref()
        .and_then(|dest| dest.file_name())
        .map(|name| name.to_string_lossy().into_owned());

    let artifact = assemble::assemble(
        &modules,
        injected.as_ref(),
        options.minify,
        options.sourcemaps,
        dest_name.as_deref(),
    )?;

    let mut code = artifact.code;
    if let Some(dest) = &options.destination_path {
        if options.sourcemaps {
            if let (Some(map), Some(name)) = (&artifact.map, &dest_name) {
                if !code.ends_with('\n') {
                    code.push('\n');
                }
                code.push_str(&format!("//# sourceMappingURL={name}.map\n"));
                writer::write_atomic(&map_path(dest), map.as_bytes())?;
            }
        }
        writer::write_atomic(dest, code.as_bytes())?;
    }

    tracing::info!(
        modules = modules.len(),
        bytes = code.len(),
        "bundle build finished"
    );
    Ok(code.into_bytes())
}

/// `dist/bundle.js` -> `dist/bundle.js.map`.
fn map_path(dest: &Path) -> PathBuf {
    let mut path = dest.as_os_str().to_os_string();
    path.push(".map");
    PathBuf::from(path)
}

/// Nearest ancestor of the entry containing a `package.json`, falling
/// back to the entry's own directory.
fn find_project_root(source: &Path) -> PathBuf {
    let start = source.parent().unwrap_or(source);
    for dir in start.ancestors() {
        if dir.join("package.json").is_file() {
            return dir.to_path_buf();
        }
    }
    start.to_path_buf()
}
