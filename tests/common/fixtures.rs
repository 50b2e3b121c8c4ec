//! Test fixtures for firmware project workspaces.
//!
//! Provides a `ProjectBuilder` pattern for creating temporary git
//! repositories with committed source trees and a rules file -- all offline.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use super::git_helpers;

/// A test project with a temporary directory cleaned up on drop.
pub struct ProjectFixture {
    /// Kept alive for the lifetime of the fixture.
    pub _temp: TempDir,
    /// Repository root.
    pub root: PathBuf,
}

impl ProjectFixture {
    /// Path to a file within the project.
    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    /// Write a file without staging it (shows up as created).
    pub fn write(&self, rel: &str, content: &str) {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    /// Write and stage a file (shows up as added).
    pub fn write_staged(&self, rel: &str, content: &str) {
        self.write(rel, content);
        git_helpers::stage(&self.root, rel);
    }

    /// Load the rules committed into this project.
    pub fn load_rules(&self) -> zgate::core::rules::Rules {
        zgate::core::rules::Rules::load(self.path(".agent_rules.json"))
            .expect("fixture rules should load")
    }
}

/// Builder for test projects.
pub struct ProjectBuilder {
    files: Vec<(String, String)>,
    rules_json: Option<String>,
    with_git: bool,
}

impl ProjectBuilder {
    pub fn new() -> Self {
        Self {
            files: Vec::new(),
            rules_json: None,
            with_git: true,
        }
    }

    /// Add a file committed during setup.
    pub fn file(mut self, rel: &str, content: &str) -> Self {
        self.files.push((rel.to_string(), content.to_string()));
        self
    }

    /// Set the rules file content, committed during setup.
    pub fn rules_json(mut self, json: &str) -> Self {
        self.rules_json = Some(json.to_string());
        self
    }

    /// Skip git init (for checks that do not need a repository).
    pub fn without_git(mut self) -> Self {
        self.with_git = false;
        self
    }

    pub fn build(self) -> ProjectFixture {
        let temp = TempDir::new().expect("create tempdir");
        // Canonicalize so paths match git's resolved toplevel on macOS
        let root = temp.path().canonicalize().expect("canonicalize tempdir");

        if self.with_git {
            git_helpers::init_repo(&root);
        }

        write_file(&root, "CMakeLists.txt", "project(firmware)\n");
        for (rel, content) in &self.files {
            write_file(&root, rel, content);
        }
        if let Some(json) = &self.rules_json {
            write_file(&root, ".agent_rules.json", json);
        }

        if self.with_git {
            git_helpers::commit_all(&root, "initial");
        }

        ProjectFixture { _temp: temp, root }
    }
}

fn write_file(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

/// A rules file with a single zephyr project locked to `unit_tests/`.
pub fn zephyr_rules_json() -> &'static str {
    r#"{
        "project_configurations": [
            {
                "project_type": "zephyr",
                "file_rules": {
                    "allowed_to_modify": ["unit_tests/"],
                    "allowed_extensions": [".c", ".h", ".cpp", ".hpp", ".txt", ".cmake"],
                    "ignored_files": ["*.md"]
                },
                "cmake_rules": {
                    "not_allowed_include_dirs": ["../../src/"],
                    "not_allowed_subdirectories": ["../../drivers/"],
                    "not_allowed_linked_libraries": ["app_prod"]
                },
                "include_rules": {
                    "not_allowed_header_includes": ["zephyr/", "autoconf.h"],
                    "not_allowed_include_extensions": [".c"]
                },
                "mock_rules": {
                    "mock_cmake": "unit_tests/mock_files/CMakeLists.txt",
                    "app_target": "app",
                    "scan_dir": "unit_tests/driver"
                },
                "coverage_rules": {
                    "report": "reports/coverage.xml",
                    "threshold": 80.0
                },
                "testframework": {
                    "test_builder": {"execute_path": ".", "command": "true"},
                    "test_runner": {"execute_path": ".", "command": "true"}
                }
            }
        ]
    }"#
}
