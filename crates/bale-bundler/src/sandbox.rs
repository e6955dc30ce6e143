//! Dependency sandbox validation.
//!
//! Every module reference discovered during bundling is checked here
//! before the referenced file is read: the rule is about the
//! reference itself, not about the content it points at. A relative
//! specifier must stay inside the project root and must never reach
//! into a `node_modules` directory by path traversal - installed
//! packages are imported by name, which resolves through the
//! project's own dependency directory.

use std::path::{Component, Path};

use path_clean::PathClean;

use crate::{BuildError, Result};

/// Validate one module reference against the sandbox root.
///
/// Bare specifiers (`"lodash"`) always pass; they resolve through the
/// project's own `node_modules` and cannot escape. Relative
/// specifiers are resolved against the referencing module's directory
/// and rejected when the normalized result leaves the project root or
/// lands inside any `node_modules` directory.
///
/// The error message carries the literal escaping fragment of the
/// specifier so the failure is debuggable from the message alone.
pub fn validate_reference(from: &Path, specifier: &str, root: &Path) -> Result<()> {
    if !specifier.starts_with('.') {
        return Ok(());
    }

    let base = from.parent().unwrap_or(root);
    let resolved = base.join(specifier).clean();

    let escapes_root = !resolved.starts_with(root);
    let reaches_dependency_cache = resolved
        .components()
        .any(|c| matches!(c, Component::Normal(name) if name == "node_modules"));

    if escapes_root || reaches_dependency_cache {
        let fragment = escaping_fragment(specifier, &resolved);
        tracing::debug!(
            specifier,
            from = %from.display(),
            fragment = %fragment,
            "rejected sandbox-escaping reference"
        );
        return Err(BuildError::SandboxViolation {
            specifier: specifier.to_string(),
            from: from.display().to_string(),
            fragment,
        });
    }

    Ok(())
}

/// The part of the reference that makes it escape. For references
/// that traverse into a dependency cache this is the specifier up to
/// and including `node_modules`; otherwise the resolved path itself.
fn escaping_fragment(specifier: &str, resolved: &Path) -> String {
    match specifier.find("node_modules") {
        Some(index) => specifier[..index + "node_modules".len()].to_string(),
        None => resolved.display().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn root() -> PathBuf {
        PathBuf::from("/project")
    }

    #[test]
    fn accepts_plain_relative_reference() {
        let from = root().join("src/index.js");
        assert!(validate_reference(&from, "./util.js", &root()).is_ok());
        assert!(validate_reference(&from, "../shared/util.js", &root()).is_ok());
    }

    #[test]
    fn accepts_bare_specifiers() {
        let from = root().join("src/index.js");
        assert!(validate_reference(&from, "lodash", &root()).is_ok());
    }

    #[test]
    fn rejects_traversal_into_dependency_cache() {
        let from = root().join("src/index.js");
        let err = validate_reference(&from, "../node_modules/fake-module", &root()).unwrap_err();
        assert!(err.to_string().contains("contains \"../node_modules\""));
    }

    #[test]
    fn rejects_dependency_cache_even_inside_root() {
        let from = root().join("index.js");
        let err = validate_reference(&from, "./node_modules/fake-module", &root()).unwrap_err();
        assert!(matches!(err, BuildError::SandboxViolation { .. }));
    }

    #[test]
    fn rejects_escape_from_project_root() {
        let from = root().join("src/index.js");
        let err = validate_reference(&from, "../../outside.js", &root()).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("outside.js"), "fragment missing: {text}");
    }
}
