//! Build command: clean CMake configure and build of the unit tests.

use std::path::{Path, PathBuf};

use crate::cli::commands::GateContext;
use crate::cli::output::Output;
use crate::core::rules::ProjectConfig;
use crate::runner::{RunnerError, TestRunner};

/// Run a clean unit test build.
///
/// With `sdk_compiler` the ambient toolchain environment is kept; otherwise
/// the host compiler is forced.
pub fn run_build(
    rules_arg: Option<&Path>,
    project: Option<&str>,
    sdk_compiler: bool,
) -> anyhow::Result<i32> {
    let ctx = GateContext::load(rules_arg)?;
    let config = ctx.project(project)?;

    let project_dir = build_dir_for(&ctx, config);
    let runner = TestRunner::new(&project_dir, !sdk_compiler)?;

    Output::info(&format!("building unit tests in {}", project_dir.display()));
    match runner.build() {
        Ok(()) => {
            Output::success("build passed");
            Ok(0)
        }
        Err(RunnerError::StepFailed { step, code }) => {
            Output::error(&format!("{} failed with exit code {:?}", step, code));
            Ok(1)
        }
        Err(e) => Err(e.into()),
    }
}

/// The directory the unit test build runs in: the test builder's
/// `execute_path` when configured, the repo root otherwise.
pub(crate) fn build_dir_for(ctx: &GateContext, config: &ProjectConfig) -> PathBuf {
    match config.test_builder() {
        Some(spec) => ctx.repo_root.join(&spec.execute_path),
        None => ctx.repo_root.clone(),
    }
}
