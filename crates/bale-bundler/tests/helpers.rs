#![allow(dead_code)]

//! Shared fixtures for the integration tests: tiny on-disk projects
//! built in a temporary directory.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A throwaway project with a `package.json` at its root.
pub struct Project {
    dir: TempDir,
}

impl Project {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("create temp project");
        fs::write(
            dir.path().join("package.json"),
            "{\"name\":\"fixture\",\"version\":\"0.0.0\"}",
        )
        .expect("write manifest");
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Write a source file, creating parent directories.
    pub fn file(self, name: &str, content: &str) -> Self {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create fixture dirs");
        }
        fs::write(path, content).expect("write fixture file");
        self
    }

    /// Install a fake package under `node_modules` with a manifest
    /// pointing at `main`.
    pub fn package(self, name: &str, main: &str, content: &str) -> Self {
        let package_dir = self.dir.path().join("node_modules").join(name);
        let main_path = package_dir.join(main);
        if let Some(parent) = main_path.parent() {
            fs::create_dir_all(parent).expect("create package dirs");
        }
        fs::write(
            package_dir.join("package.json"),
            format!("{{\"name\":\"{name}\",\"main\":\"{main}\"}}"),
        )
        .expect("write package manifest");
        fs::write(main_path, content).expect("write package main");
        self
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

/// Read a built artifact as text.
pub fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_else(|e| panic!("read {}: {e}", path.display()))
}
