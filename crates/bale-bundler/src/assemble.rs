//! Bundle assembly.
//!
//! Joins the transformed module graph into one loader-wrapped bundle:
//! the optional injected library first, then a small CommonJS loader
//! prologue, then every module body wrapped in a definition function
//! with its specifier-to-id table, closed by a call that loads the
//! entry module (always id 0).
//!
//! The source map is built while the text is joined, one token per
//! output line. The loader prologue is attributed to a synthetic
//! `_prelude.js` source so consumers can tell framework lines from
//! project lines. The map describes the pre-minified bundle; the
//! terminal minification pass runs after the map is sealed.

use std::path::Path;

use sourcemap::SourceMapBuilder;

use crate::graph::ModuleRecord;
use crate::inject::InjectedLibrary;
use crate::{stage, BuildError, Result};

/// Synthetic source name for the loader prologue.
pub(crate) const PRELUDE_NAME: &str = "_prelude.js";

const PRELUDE: &str = "(function (modules, entry) {\n  var cache = {};\n  function load(id) {\n    if (cache[id]) return cache[id].exports;\n    var module = cache[id] = { exports: {} };\n    var definition = modules[id];\n    definition[0].call(module.exports, function (request) {\n      return load(definition[1][request]);\n    }, module, module.exports);\n    return module.exports;\n  }\n  return load(entry);\n})({\n";

/// The assembled bundle text and its optional source map document.
#[derive(Debug)]
pub(crate) struct BundleArtifact {
    pub code: String,
    pub map: Option<String>,
}

/// Join the module graph into the final bundle.
pub(crate) fn assemble(
    modules: &[ModuleRecord],
    injected: Option<&InjectedLibrary>,
    minify: bool,
    sourcemaps: bool,
    map_file: Option<&str>,
) -> Result<BundleArtifact> {
    let mut builder = sourcemaps.then(|| SourceMapBuilder::new(map_file));
    let mut out = String::new();
    let mut line: u32 = 0;

    if let Some(library) = injected {
        // Minified builds scrub debug calls from the injected code
        // too; the per-module stage list never sees it.
        let code = if minify {
            stage::strip_debug_calls(&library.code, &library.path, false)?
        } else {
            library.code.clone()
        };
        append_mapped(
            &mut out,
            &mut line,
            &mut builder,
            &code,
            &library.rel,
            &library.code,
        );
    }

    append_mapped(&mut out, &mut line, &mut builder, PRELUDE, PRELUDE_NAME, PRELUDE);

    for (id, module) in modules.iter().enumerate() {
        append(
            &mut out,
            &mut line,
            &format!("{id}: [function (require, module, exports) {{"),
        );
        append_mapped(
            &mut out,
            &mut line,
            &mut builder,
            &module.transformed,
            &module.rel,
            &module.raw,
        );
        append(&mut out, &mut line, &format!("}}, {}],", deps_table(module)));
    }

    append(&mut out, &mut line, "}, 0);");

    let map = match builder {
        Some(builder) => Some(serialize_map(builder)?),
        None => None,
    };

    let code = if minify {
        let label = Path::new(map_file.unwrap_or("bundle.js"));
        stage::minify_source(&out, label)?
    } else {
        out
    };

    Ok(BundleArtifact { code, map })
}

/// The specifier-to-id table of one module, as a JSON object literal.
fn deps_table(module: &ModuleRecord) -> String {
    let mut table = serde_json::Map::new();
    for (specifier, id) in &module.deps {
        table.insert(specifier.clone(), serde_json::Value::from(*id));
    }
    serde_json::Value::Object(table).to_string()
}

/// Append text with a trailing newline, tracking the output line.
fn append(out: &mut String, line: &mut u32, text: &str) {
    if text.is_empty() {
        return;
    }
    out.push_str(text);
    if !text.ends_with('\n') {
        out.push('\n');
    }
    *line += text.lines().count() as u32;
}

/// Append text and record one line-granular token per output line,
/// attributing it to `source` with `contents` embedded in the map.
fn append_mapped(
    out: &mut String,
    line: &mut u32,
    builder: &mut Option<SourceMapBuilder>,
    text: &str,
    source: &str,
    contents: &str,
) {
    if let Some(builder) = builder.as_mut() {
        let source_id = builder.add_source(source);
        builder.set_source_contents(source_id, Some(contents));
        for index in 0..text.lines().count() as u32 {
            builder.add(*line + index, 0, index, 0, Some(source), None, false);
        }
    }
    append(out, line, text);
}

fn serialize_map(builder: SourceMapBuilder) -> Result<String> {
    let map = builder.into_sourcemap();
    let mut buffer = Vec::new();
    map.to_writer(&mut buffer).map_err(|e| BuildError::Transform {
        file: "bundle".to_string(),
        message: format!("source map serialization failed: {e}"),
    })?;
    String::from_utf8(buffer).map_err(|e| BuildError::Transform {
        file: "bundle".to_string(),
        message: format!("source map is not valid UTF-8: {e}"),
    })
}
