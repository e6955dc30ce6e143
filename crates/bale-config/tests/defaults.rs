//! Behaviour of field defaults across loading paths.

use bale_config::{validate_paths, BundleOptions, ConfigError};
use serde_json::json;
use tempfile::TempDir;

#[test]
fn defaults_match_task_runner_contract() {
    let options = BundleOptions::new("src/index.js");

    // Source maps and injection are opt-out, minification is opt-in.
    assert!(options.sourcemaps);
    assert!(options.inject_library);
    assert!(options.modern_syntax);
    assert!(!options.minify);
}

#[test]
fn explicit_false_overrides_defaults() {
    let options = BundleOptions::from_value(json!({
        "source": "src/index.js",
        "sourcemaps": false,
        "inject_library": false
    }))
    .unwrap();

    assert!(!options.sourcemaps);
    assert!(!options.inject_library);
    // Unrelated defaults are untouched.
    assert!(options.modern_syntax);
}

#[test]
fn env_snapshot_survives_round_trip() {
    let options = BundleOptions::from_value(json!({
        "source": "src/index.js",
        "env": { "API_URL": "https://example.test" }
    }))
    .unwrap();

    let env = options.env.as_ref().expect("env snapshot");
    assert_eq!(env.get("API_URL").map(String::as_str), Some("https://example.test"));
}

#[test]
fn path_validation_checks_the_filesystem() {
    let dir = TempDir::new().expect("temp dir");
    let entry = dir.path().join("index.js");
    std::fs::write(&entry, "console.log('hi');\n").expect("write entry");

    let mut options = BundleOptions::new(&entry);
    options.project_root = Some(dir.path().to_path_buf());
    assert!(validate_paths(&options).is_ok());

    let missing = BundleOptions::new(dir.path().join("missing.js"));
    assert!(matches!(
        validate_paths(&missing),
        Err(ConfigError::EntryNotFound(_))
    ));
}
