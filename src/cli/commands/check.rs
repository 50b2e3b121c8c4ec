//! Standalone policy check commands.
//!
//! Each check prints `FAIL:` lines for its findings (or an `OK` line) and
//! returns exit code 1 when findings exist.

use std::path::Path;

use crate::checks::coverage::{check_coverage, CoverageCheck};
use crate::checks::mock_link::{check_mock_links, MockAuditStatus};
use crate::checks::{cmake, files, includes, Finding};
use crate::cli::commands::GateContext;
use crate::cli::output::Output;
use crate::git::ChangedFiles;

fn report(findings: &[Finding], ok_message: &str) -> i32 {
    if findings.is_empty() {
        Output::success(ok_message);
        return 0;
    }
    for finding in findings {
        Output::error(&finding.render());
    }
    1
}

/// Verify changed files against the allow-list.
pub fn run_check_files(rules_arg: Option<&Path>, project: Option<&str>) -> anyhow::Result<i32> {
    let ctx = GateContext::load(rules_arg)?;
    let config = ctx.project(project)?;
    let changed = ChangedFiles::collect(&ctx.repo_root)?;

    let findings = files::check_files(&changed, &config.file_rules)?;
    Ok(report(&findings, "OK: file check passed"))
}

/// Lint changed CMakeLists.txt files.
pub fn run_check_cmake(rules_arg: Option<&Path>, project: Option<&str>) -> anyhow::Result<i32> {
    let ctx = GateContext::load(rules_arg)?;
    let config = ctx.project(project)?;
    let changed = ChangedFiles::collect(&ctx.repo_root)?;

    let findings = cmake::check_cmake(
        &ctx.repo_root,
        &changed,
        &config.file_rules,
        &config.cmake_rules,
    )?;
    Ok(report(&findings, "OK: cmake check passed"))
}

/// Lint changed (or all relevant) C/C++ sources for forbidden includes.
pub fn run_check_includes(rules_arg: Option<&Path>, project: Option<&str>) -> anyhow::Result<i32> {
    let ctx = GateContext::load(rules_arg)?;
    let config = ctx.project(project)?;
    let changed = ChangedFiles::collect(&ctx.repo_root)?;

    let findings = includes::check_includes(
        &ctx.repo_root,
        &changed,
        &config.file_rules,
        &config.include_rules,
    )?;
    Ok(report(&findings, "OK: include check passed"))
}

/// Audit mock library linkage.
pub fn run_check_mocks(rules_arg: Option<&Path>, project: Option<&str>) -> anyhow::Result<i32> {
    let ctx = GateContext::load(rules_arg)?;
    let config = ctx.project(project)?;

    let (status, findings) = check_mock_links(&ctx.repo_root, &config.mock_rules)?;
    if status == MockAuditStatus::NoMocksFound {
        Output::warning("no mock libraries found to audit");
        return Ok(0);
    }
    Ok(report(&findings, "OK: mock link audit passed"))
}

/// Verify the coverage report against the configured threshold.
pub fn run_check_coverage(
    rules_arg: Option<&Path>,
    project: Option<&str>,
) -> anyhow::Result<i32> {
    let ctx = GateContext::load(rules_arg)?;
    let config = ctx.project(project)?;

    let report_path = ctx.repo_root.join(&config.coverage_rules.report);
    match check_coverage(&report_path, config.coverage_rules.threshold)? {
        CoverageCheck::Passed { percent } => {
            Output::success(&format!("OK: coverage check passed ({:.2}%)", percent));
            Ok(0)
        }
        CoverageCheck::Failed(failure) => {
            Output::error(&failure.render(&report_path));
            Ok(1)
        }
    }
}
