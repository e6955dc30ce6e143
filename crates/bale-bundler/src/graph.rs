//! Module graph collection.
//!
//! Starting from the entry file, the collector discovers every
//! reachable module in pre-order, validates each reference against
//! the dependency sandbox before touching the file it names, and runs
//! the configured stage list over each module body. Numeric ids are
//! assigned in discovery order, so the entry module is always id 0.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use oxc_allocator::Allocator;
use oxc_ast::ast::{Argument, CallExpression, ExportAllDeclaration, ExportNamedDeclaration, Expression, ImportDeclaration};
use oxc_ast_visit::{walk, Visit};
use path_clean::PathClean;
use rustc_hash::FxHashMap;

use crate::{sandbox, stage, BuildError, Result, Stage};

/// One module of the bundle, after transformation.
#[derive(Debug, Clone)]
pub struct ModuleRecord {
    /// Canonical path on disk.
    pub path: PathBuf,
    /// Path relative to the project root, used for source-map naming.
    pub rel: String,
    /// Original source text.
    pub raw: String,
    /// Source text after the stage list ran.
    pub transformed: String,
    /// Specifier-to-id mapping for the loader table.
    pub deps: Vec<(String, usize)>,
}

/// Collect the module graph reachable from `entry`.
///
/// `entry` and `root` must be canonical paths; the orchestrator
/// canonicalizes both before calling in.
pub(crate) fn collect(
    entry: &Path,
    root: &Path,
    stages: &[Stage],
    env: &BTreeMap<String, String>,
    jsx: bool,
) -> Result<Vec<ModuleRecord>> {
    let mut builder = GraphBuilder {
        root,
        stages,
        env,
        jsx,
        ids: FxHashMap::default(),
        modules: Vec::new(),
    };
    builder.visit(entry)?;

    // Every placeholder is filled once its subtree is done; the only
    // way a None survives is a bug in the traversal.
    builder
        .modules
        .into_iter()
        .map(|module| {
            module.ok_or_else(|| {
                BuildError::Transform {
                    file: entry.display().to_string(),
                    message: "module graph traversal left an unfilled slot".to_string(),
                }
            })
        })
        .collect()
}

struct GraphBuilder<'a> {
    root: &'a Path,
    stages: &'a [Stage],
    env: &'a BTreeMap<String, String>,
    jsx: bool,
    ids: FxHashMap<PathBuf, usize>,
    modules: Vec<Option<ModuleRecord>>,
}

impl GraphBuilder<'_> {
    /// Visit one module, returning its id. Re-entry during a cycle
    /// returns the already-assigned id without re-reading the file.
    fn visit(&mut self, path: &Path) -> Result<usize> {
        if let Some(&id) = self.ids.get(path) {
            return Ok(id);
        }

        let id = self.modules.len();
        self.ids.insert(path.to_path_buf(), id);
        self.modules.push(None);

        let raw = std::fs::read_to_string(path)?;
        let specifiers = scan_references(&raw, path, self.jsx)?;

        let mut deps = Vec::with_capacity(specifiers.len());
        for specifier in specifiers {
            sandbox::validate_reference(path, &specifier, self.root)?;
            let resolved = self.resolve(path, &specifier)?;
            let dep_id = self.visit(&resolved)?;
            deps.push((specifier, dep_id));
        }

        let ctx = stage::StageContext {
            env: self.env,
            file: path,
            jsx: self.jsx,
        };
        let transformed = stage::apply_all(self.stages, &raw, &ctx)?;

        let rel = path
            .strip_prefix(self.root)
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|_| path.display().to_string());

        tracing::debug!(module = %rel, id, deps = deps.len(), "collected module");

        self.modules[id] = Some(ModuleRecord {
            path: path.to_path_buf(),
            rel,
            raw,
            transformed,
            deps,
        });
        Ok(id)
    }

    /// Resolve a specifier to a canonical file path. Relative
    /// specifiers try the exact path, then a `.js` suffix, then a
    /// directory `index.js`. Bare specifiers resolve through the
    /// project's `node_modules` by package-manifest `main`.
    fn resolve(&self, from: &Path, specifier: &str) -> Result<PathBuf> {
        let resolved = if specifier.starts_with('.') {
            let base = from.parent().unwrap_or(self.root);
            let joined = base.join(specifier).clean();
            relative_candidates(&joined)
                .into_iter()
                .find(|candidate| candidate.is_file())
        } else {
            let package_dir = self.root.join("node_modules").join(specifier);
            let main = package_main(&package_dir);
            let candidate = package_dir.join(main);
            candidate.is_file().then_some(candidate)
        };

        match resolved {
            Some(path) => Ok(path.canonicalize()?),
            None => Err(BuildError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!(
                    "cannot resolve \"{specifier}\" from {from}",
                    from = from.display()
                ),
            ))),
        }
    }
}

fn relative_candidates(joined: &Path) -> Vec<PathBuf> {
    let mut with_suffix = OsString::from(joined.as_os_str());
    with_suffix.push(".js");
    vec![
        joined.to_path_buf(),
        PathBuf::from(with_suffix),
        joined.join("index.js"),
    ]
}

/// Entry file of an installed package, from its manifest's `main`
/// field. A missing or unreadable manifest falls back to `index.js`.
fn package_main(package_dir: &Path) -> String {
    std::fs::read_to_string(package_dir.join("package.json"))
        .ok()
        .and_then(|text| serde_json::from_str::<serde_json::Value>(&text).ok())
        .and_then(|manifest| manifest.get("main")?.as_str().map(str::to_string))
        .unwrap_or_else(|| "index.js".to_string())
}

/// Collect every module reference of one file in source order:
/// import/export-from declarations plus literal `require(...)` calls.
fn scan_references(source: &str, file: &Path, jsx: bool) -> Result<Vec<String>> {
    let allocator = Allocator::default();
    let program = stage::parse_program(&allocator, source, file, jsx)?;

    let mut scanner = ReferenceScanner {
        specifiers: Vec::new(),
    };
    walk::walk_program(&mut scanner, &program);

    // Dedupe preserving first occurrence.
    let mut seen = FxHashMap::default();
    Ok(scanner
        .specifiers
        .into_iter()
        .filter(|s| seen.insert(s.clone(), ()).is_none())
        .collect())
}

struct ReferenceScanner {
    specifiers: Vec<String>,
}

impl<'a> Visit<'a> for ReferenceScanner {
    fn visit_import_declaration(&mut self, decl: &ImportDeclaration<'a>) {
        self.specifiers.push(decl.source.value.to_string());
        walk::walk_import_declaration(self, decl);
    }

    fn visit_export_named_declaration(&mut self, decl: &ExportNamedDeclaration<'a>) {
        if let Some(source) = &decl.source {
            self.specifiers.push(source.value.to_string());
        }
        walk::walk_export_named_declaration(self, decl);
    }

    fn visit_export_all_declaration(&mut self, decl: &ExportAllDeclaration<'a>) {
        self.specifiers.push(decl.source.value.to_string());
        walk::walk_export_all_declaration(self, decl);
    }

    fn visit_call_expression(&mut self, call: &CallExpression<'a>) {
        if let Expression::Identifier(callee) = &call.callee {
            if callee.name == "require" && call.arguments.len() == 1 {
                if let Argument::StringLiteral(request) = &call.arguments[0] {
                    self.specifiers.push(request.value.to_string());
                }
            }
        }
        walk::walk_call_expression(self, call);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::fs;
    use tempfile::TempDir;

    fn project(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("package.json"), "{\"name\":\"t\"}").unwrap();
        for (name, content) in files {
            let path = dir.path().join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, content).unwrap();
        }
        dir
    }

    fn collect_from(dir: &TempDir, entry: &str) -> Result<Vec<ModuleRecord>> {
        let root = dir.path().canonicalize().unwrap();
        let entry = root.join(entry).canonicalize().unwrap();
        collect(&entry, &root, &[], &BTreeMap::new(), false)
    }

    #[test]
    fn assigns_ids_in_discovery_order() {
        let dir = project(&[
            ("index.js", "var util = require('./util');\nutil();"),
            ("util.js", "module.exports = function () {};"),
        ]);

        let modules = collect_from(&dir, "index.js").unwrap();
        assert_eq!(modules.len(), 2);
        assert_eq!(modules[0].rel, "index.js");
        assert_eq!(modules[1].rel, "util.js");
        assert_eq!(modules[0].deps, vec![("./util".to_string(), 1)]);
    }

    #[test]
    fn tolerates_require_cycles() {
        let dir = project(&[
            ("a.js", "require('./b');"),
            ("b.js", "require('./a');"),
        ]);

        let modules = collect_from(&dir, "a.js").unwrap();
        assert_eq!(modules.len(), 2);
        assert_eq!(modules[1].deps, vec![("./a".to_string(), 0)]);
    }

    #[test]
    fn resolves_bare_specifiers_through_the_manifest() {
        let dir = project(&[
            ("index.js", "require('widget');"),
            (
                "node_modules/widget/package.json",
                "{\"name\":\"widget\",\"main\":\"lib/widget.js\"}",
            ),
            ("node_modules/widget/lib/widget.js", "module.exports = 1;"),
        ]);

        let modules = collect_from(&dir, "index.js").unwrap();
        assert_eq!(modules.len(), 2);
        assert!(modules[1].rel.contains("widget"));
    }

    #[test]
    fn reports_unresolvable_references() {
        let dir = project(&[("index.js", "require('./missing');")]);
        let err = collect_from(&dir, "index.js").unwrap_err();
        assert!(err.to_string().contains("./missing"));
    }

    #[test]
    fn rejects_sandbox_escaping_references_before_reading() {
        let dir = project(&[
            ("index.js", "require('../node_modules/fake-module');"),
            ("node_modules/fake-module/index.js", "module.exports = 1;"),
        ]);

        let err = collect_from(&dir, "index.js").unwrap_err();
        assert!(matches!(err, BuildError::SandboxViolation { .. }));
    }

    #[test]
    fn finds_es_module_imports() {
        let dir = project(&[
            ("index.js", "import helper from './helper';\nhelper();"),
            ("helper.js", "export default function () {}"),
        ]);

        let modules = collect_from(&dir, "index.js").unwrap();
        assert_eq!(modules.len(), 2);
        assert_eq!(modules[0].deps[0].0, "./helper");
    }
}
