//! Command implementations
//!
//! Each command returns its exit code: 0 on success, 1 on findings or
//! build/test failures. Configuration and environment errors propagate as
//! `Err` and exit with code 2.

pub mod build;
pub mod check;
pub mod status;
pub mod verify;

pub use build::run_build;
pub use check::{
    run_check_cmake, run_check_coverage, run_check_files, run_check_includes, run_check_mocks,
};
pub use status::run_status;
pub use test::run_test;
pub use verify::run_verify;

use std::path::{Path, PathBuf};

use crate::core::rules::{resolve_rules_path, ProjectConfig, Rules};

/// Shared command context: the repository root and the loaded rules.
pub struct GateContext {
    /// Repository root (git toplevel, or the current directory outside a repo)
    pub repo_root: PathBuf,
    /// Path the rules were loaded from
    pub rules_path: PathBuf,
    pub rules: Rules,
}

impl GateContext {
    /// Resolve the rules file and repository root from the current directory.
    pub fn load(rules_arg: Option<&Path>) -> anyhow::Result<Self> {
        let cwd = std::env::current_dir()?;
        let repo_root = crate::git::repo_root(&cwd)
            .or_else(|| crate::runner::find_project_root(&cwd))
            .unwrap_or(cwd);

        let rules_path = resolve_rules_path(rules_arg)?;
        let rules = Rules::load(&rules_path)?;

        Ok(Self {
            repo_root,
            rules_path,
            rules,
        })
    }

    /// Select a project configuration by name, or implicitly.
    pub fn project(&self, name: Option<&str>) -> anyhow::Result<&ProjectConfig> {
        Ok(self.rules.select(name)?)
    }
}
