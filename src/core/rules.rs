//! Agent rules file parsing and lookup
//!
//! The rules file (`.agent_rules.json`) defines per-project policy: which
//! paths an automated contributor may touch, which CMake constructs and
//! header includes are forbidden, how to build and run the unit tests, and
//! the coverage gate.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default rules file name, discovered in the current directory or the
/// repository root.
pub const RULES_FILE_NAME: &str = ".agent_rules.json";

/// Errors that can occur when loading or querying a rules file
#[derive(Error, Debug)]
pub enum RulesError {
    #[error("rules file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read rules file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse rules JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("no project_configurations found in rules file")]
    Empty,

    #[error("unknown project type '{requested}'. Available: {available}")]
    UnknownProject {
        requested: String,
        available: String,
    },

    #[error("multiple project_configurations found; use --project to select one")]
    Ambiguous,
}

/// Root of the rules document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Rules {
    #[serde(default)]
    pub project_configurations: Vec<ProjectConfig>,
}

/// Per-project policy and test framework configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub project_type: String,
    #[serde(default)]
    pub file_rules: FileRules,
    #[serde(default)]
    pub cmake_rules: CmakeRules,
    #[serde(default)]
    pub include_rules: IncludeRules,
    #[serde(default)]
    pub mock_rules: MockRules,
    #[serde(default)]
    pub coverage_rules: CoverageRules,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub testframework: Option<TestFramework>,
}

/// Which files may be touched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileRules {
    /// Path prefixes changed files must fall under (empty = unrestricted)
    #[serde(default)]
    pub allowed_to_modify: Vec<String>,
    /// File extensions changed files must carry (empty = unrestricted)
    #[serde(default)]
    pub allowed_extensions: Vec<String>,
    /// Glob patterns exempting files from checks
    #[serde(default)]
    pub ignored_files: Vec<String>,
}

/// Forbidden CMake constructs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CmakeRules {
    /// Patterns forbidden in include directory arguments; a trailing `/`
    /// makes the pattern match as a directory prefix
    #[serde(default)]
    pub not_allowed_include_dirs: Vec<String>,
    /// Patterns forbidden in `add_subdirectory()` calls
    #[serde(default)]
    pub not_allowed_subdirectories: Vec<String>,
    /// Library names forbidden in `target_link_libraries()` blocks
    #[serde(default)]
    pub not_allowed_linked_libraries: Vec<String>,
}

/// Forbidden `#include` targets in C/C++ sources
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncludeRules {
    /// Forbidden include patterns: `dir/` prefixes, `name.h` filenames, or
    /// bare tokens
    #[serde(default)]
    pub not_allowed_header_includes: Vec<String>,
    /// Source-file extensions that must not appear as include targets
    #[serde(default)]
    pub not_allowed_include_extensions: Vec<String>,
}

/// Mock library link audit configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockRules {
    /// CMakeLists declaring the mock libraries, relative to the repo root
    #[serde(default = "default_mock_cmake")]
    pub mock_cmake: String,
    /// Target the mocks must be reachable from
    #[serde(default = "default_app_target")]
    pub app_target: String,
    /// Directory scanned for unit test CMakeLists, relative to the repo root
    #[serde(default = "default_scan_dir")]
    pub scan_dir: String,
}

impl Default for MockRules {
    fn default() -> Self {
        Self {
            mock_cmake: default_mock_cmake(),
            app_target: default_app_target(),
            scan_dir: default_scan_dir(),
        }
    }
}

fn default_mock_cmake() -> String {
    "unit_tests/mock_files/CMakeLists.txt".to_string()
}

fn default_app_target() -> String {
    "app".to_string()
}

fn default_scan_dir() -> String {
    "unit_tests/driver".to_string()
}

/// Coverage gate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageRules {
    /// Coverage XML report path, relative to the repo root
    #[serde(default = "default_coverage_report")]
    pub report: String,
    /// Minimum acceptable line coverage, in percent
    #[serde(default = "default_coverage_threshold")]
    pub threshold: f64,
}

impl Default for CoverageRules {
    fn default() -> Self {
        Self {
            report: default_coverage_report(),
            threshold: default_coverage_threshold(),
        }
    }
}

fn default_coverage_report() -> String {
    "reports/coverage.xml".to_string()
}

fn default_coverage_threshold() -> f64 {
    80.0
}

/// Test framework configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestFramework {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_builder: Option<CommandSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_runner: Option<CommandSpec>,
}

/// Where and what to execute for a build or test step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Working directory, relative to the repo root
    pub execute_path: String,
    /// Command line to run
    pub command: String,
}

impl Rules {
    /// Load rules from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RulesError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(RulesError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse rules from a JSON string.
    pub fn parse(content: &str) -> Result<Self, RulesError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Look up a project configuration by type, case-insensitively.
    pub fn project(&self, project_type: &str) -> Result<&ProjectConfig, RulesError> {
        if self.project_configurations.is_empty() {
            return Err(RulesError::Empty);
        }
        let key = project_type.to_lowercase();
        self.project_configurations
            .iter()
            .find(|p| p.project_type.to_lowercase() == key)
            .ok_or_else(|| RulesError::UnknownProject {
                requested: project_type.to_string(),
                available: self.available_projects(),
            })
    }

    /// Select a project configuration: by name when given, implicitly when
    /// exactly one configuration exists.
    pub fn select(&self, project_type: Option<&str>) -> Result<&ProjectConfig, RulesError> {
        match project_type {
            Some(name) => self.project(name),
            None => match self.project_configurations.len() {
                0 => Err(RulesError::Empty),
                1 => Ok(&self.project_configurations[0]),
                _ => Err(RulesError::Ambiguous),
            },
        }
    }

    fn available_projects(&self) -> String {
        let mut names: Vec<String> = self
            .project_configurations
            .iter()
            .map(|p| p.project_type.to_lowercase())
            .collect();
        names.sort();
        names.dedup();
        names.join(", ")
    }
}

impl ProjectConfig {
    /// The configured test runner, if any.
    pub fn test_runner(&self) -> Option<&CommandSpec> {
        self.testframework.as_ref()?.test_runner.as_ref()
    }

    /// The configured test builder, if any.
    pub fn test_builder(&self) -> Option<&CommandSpec> {
        self.testframework.as_ref()?.test_builder.as_ref()
    }
}

/// Resolve the rules file path: an explicit `--rules` argument wins, then
/// `.agent_rules.json` in the current directory, then in the repo root.
pub fn resolve_rules_path(explicit: Option<&Path>) -> Result<PathBuf, RulesError> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(RulesError::NotFound(path.to_path_buf()));
        }
        return Ok(path.to_path_buf());
    }

    let cwd = std::env::current_dir()?;
    let local = cwd.join(RULES_FILE_NAME);
    if local.is_file() {
        return Ok(local);
    }

    if let Some(root) = crate::git::repo_root(&cwd) {
        let in_root = root.join(RULES_FILE_NAME);
        if in_root.is_file() {
            return Ok(in_root);
        }
    }

    Err(RulesError::NotFound(local))
}
