//! Verify command: run the full gate.
//!
//! Checks run in order: files, cmake, mocks, includes. The first failing
//! check stops the chain. Building and running tests are opt-in and use the
//! `testframework` commands from the rules file; after a passing test run on
//! a zephyr project the coverage gate runs automatically.

use std::path::Path;
use std::process::Command;

use anyhow::{bail, Context};

use crate::checks::coverage::{check_coverage, CoverageCheck};
use crate::checks::mock_link::{check_mock_links, MockAuditStatus};
use crate::checks::{cmake, files, includes, Finding};
use crate::cli::commands::GateContext;
use crate::cli::output::Output;
use crate::core::rules::{CommandSpec, ProjectConfig};
use crate::git::ChangedFiles;
use crate::util::log_cmd;

/// Run the verification chain.
///
/// `build` and `run_tests` are `Some` when requested; a non-empty value is
/// passed to the respective testframework command as an extra argument.
pub fn run_verify(
    rules_arg: Option<&Path>,
    project: Option<&str>,
    build: Option<&str>,
    run_tests: Option<&str>,
) -> anyhow::Result<i32> {
    let ctx = GateContext::load(rules_arg)?;
    let config = ctx.project(project)?;
    let changed = ChangedFiles::collect(&ctx.repo_root)?;

    let findings = files::check_files(&changed, &config.file_rules)?;
    if !step_passed("file check", &findings) {
        return Ok(1);
    }

    let findings = cmake::check_cmake(
        &ctx.repo_root,
        &changed,
        &config.file_rules,
        &config.cmake_rules,
    )?;
    if !step_passed("cmake check", &findings) {
        return Ok(1);
    }

    let findings = mock_findings(&ctx, config)?;
    if !step_passed("mock link audit", &findings) {
        return Ok(1);
    }

    let findings = includes::check_includes(
        &ctx.repo_root,
        &changed,
        &config.file_rules,
        &config.include_rules,
    )?;
    if !step_passed("include check", &findings) {
        return Ok(1);
    }

    if let Some(build_arg) = build {
        let spec = config
            .test_builder()
            .context("rules file has no testframework.test_builder command")?;
        let extra = (!build_arg.is_empty()).then_some(build_arg);
        if !run_command_spec(&ctx.repo_root, spec, extra)? {
            Output::error("Stopped: build failed");
            return Ok(1);
        }
        Output::success("build passed");
    }

    if let Some(test_arg) = run_tests {
        let spec = config
            .test_runner()
            .context("rules file has no testframework.test_runner command")?;
        let extra = (!test_arg.is_empty()).then_some(test_arg);
        if !run_command_spec(&ctx.repo_root, spec, extra)? {
            Output::error("Stopped: tests failed");
            return Ok(1);
        }
        Output::success("tests passed");

        if config.project_type.eq_ignore_ascii_case("zephyr") {
            let report_path = ctx.repo_root.join(&config.coverage_rules.report);
            match check_coverage(&report_path, config.coverage_rules.threshold)? {
                CoverageCheck::Passed { percent } => {
                    Output::success(&format!("coverage check passed ({:.2}%)", percent));
                }
                CoverageCheck::Failed(failure) => {
                    Output::error(&failure.render(&report_path));
                    Output::error("Stopped: coverage check failed");
                    return Ok(1);
                }
            }
        }
    }

    Output::success("All checks passed");
    Ok(0)
}

/// Report one step's findings; true when the step passed.
fn step_passed(step: &str, findings: &[Finding]) -> bool {
    if findings.is_empty() {
        Output::success(&format!("{} passed", step));
        return true;
    }
    for finding in findings {
        Output::error(&finding.render());
    }
    Output::error(&format!("Stopped: {} failed", step));
    false
}

fn mock_findings(ctx: &GateContext, config: &ProjectConfig) -> anyhow::Result<Vec<Finding>> {
    let (status, findings) = check_mock_links(&ctx.repo_root, &config.mock_rules)?;
    if status == MockAuditStatus::NoMocksFound {
        Output::warning("no mock libraries found to audit");
    }
    Ok(findings)
}

/// Run a testframework command through the shell in its configured
/// working directory, optionally appending one extra argument.
fn run_command_spec(
    repo_root: &Path,
    spec: &CommandSpec,
    extra_arg: Option<&str>,
) -> anyhow::Result<bool> {
    if spec.command.trim().is_empty() {
        bail!("testframework command is empty");
    }
    let cwd = repo_root.join(&spec.execute_path);
    if !cwd.is_dir() {
        bail!("execute_path does not exist: {}", cwd.display());
    }

    let mut command_line = spec.command.clone();
    if let Some(arg) = extra_arg {
        command_line.push(' ');
        command_line.push_str(arg);
    }

    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(&command_line).current_dir(&cwd);
    log_cmd(&cmd);
    let status = cmd
        .status()
        .with_context(|| format!("failed to run: {}", command_line))?;
    Ok(status.success())
}
