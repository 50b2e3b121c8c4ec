//! CMake build and ctest orchestration
//!
//! Drives a clean CMake configure + build for the unit tests, then runs
//! `ctest` and parses failing test names out of its text output. By default
//! the host toolchain is forced by scrubbing Yocto/SDK environment variables
//! so CMake does not pick up a cross toolchain.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::info;

use crate::util::log_cmd;

/// Errors from the build/test runner
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("required tool not found: {tool}")]
    MissingTool {
        tool: String,
        #[source]
        source: which::Error,
    },

    #[error("project directory does not exist: {0}")]
    MissingProjectDir(PathBuf),

    #[error("{step} failed with exit code {code:?}")]
    StepFailed { step: String, code: Option<i32> },
}

/// Result of a ctest run.
#[derive(Debug, Clone)]
pub struct TestOutcome {
    /// Whether ctest exited successfully
    pub passed: bool,
    /// Names of failing tests parsed from ctest output (may be empty even on
    /// failure when the output was not parseable)
    pub failures: Vec<String>,
    /// Path to ctest's detailed log
    pub log_path: PathBuf,
    /// Raw ctest output
    pub output: String,
}

/// Environment variables removed when forcing the host toolchain.
const SDK_ENV_VARS: [&str; 17] = [
    "CMAKE_TOOLCHAIN_FILE",
    "OECORE_NATIVE_SYSROOT",
    "OECORE_TARGET_SYSROOT",
    "OECORE_BASELIB",
    "OECORE_TARGET_ARCH",
    "OECORE_TARGET_OS",
    "OECORE_TARGET_BITS",
    "OECORE_TARGET_ENDIANNESS",
    "OECORE_TARGET_FPU",
    "OECORE_SDK_VERSION",
    "OECORE_DISTRO_VERSION",
    "OECORE_ENV_VERSION",
    "SDKTARGETSYSROOT",
    "PKG_CONFIG_SYSROOT_DIR",
    "PKG_CONFIG_PATH",
    "PKG_CONFIG_LIBDIR",
    "PKG_CONFIG_DIR",
];

/// Orchestrates clean builds and test runs for one project directory.
pub struct TestRunner {
    project_dir: PathBuf,
    /// Extra environment overrides; None keeps the ambient environment
    env: Option<HashMap<String, String>>,
    jobs: usize,
}

impl TestRunner {
    /// Create a runner for `project_dir`.
    ///
    /// With `use_host_compiler` the Yocto/SDK environment is scrubbed and the
    /// standard `/usr/bin` toolchain pinned for spawned commands.
    pub fn new<P: AsRef<Path>>(project_dir: P, use_host_compiler: bool) -> Result<Self, RunnerError> {
        let project_dir = project_dir.as_ref().to_path_buf();
        if !project_dir.is_dir() {
            return Err(RunnerError::MissingProjectDir(project_dir));
        }

        let env = use_host_compiler.then(host_compiler_env);
        let jobs = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        Ok(Self {
            project_dir,
            env,
            jobs,
        })
    }

    /// The unit test build directory (`build/unitTest`).
    pub fn unit_build_dir(&self) -> PathBuf {
        self.project_dir.join("build").join("unitTest")
    }

    /// Verify the required build tools exist on PATH.
    pub fn preflight(&self) -> Result<(), RunnerError> {
        for tool in ["cmake", "make", "ctest"] {
            which::which(tool).map_err(|e| RunnerError::MissingTool {
                tool: tool.to_string(),
                source: e,
            })?;
        }
        Ok(())
    }

    /// Remove and recreate the build directories.
    pub fn clean_build_dirs(&self) -> Result<PathBuf, RunnerError> {
        let build_dir = self.project_dir.join("build");
        if build_dir.exists() {
            std::fs::remove_dir_all(&build_dir)?;
        }
        let unit_dir = build_dir.join("unitTest");
        let integration_dir = build_dir.join("integration");
        std::fs::create_dir_all(&unit_dir)?;
        std::fs::create_dir_all(&integration_dir)?;
        Ok(unit_dir)
    }

    /// Clean CMake configure + make build of the unit tests.
    pub fn build(&self) -> Result<(), RunnerError> {
        self.preflight()?;
        let unit_dir = self.clean_build_dirs()?;

        info!(project_dir = %self.project_dir.display(), "configuring unit test build");
        self.run_step(
            "cmake configure",
            &unit_dir,
            "cmake",
            &[
                "-DCMAKE_CXX_COMPILER=g++",
                "-DUNIT_TEST=ON",
                &self.project_dir.to_string_lossy(),
            ],
        )?;

        let jobs_flag = format!("-j{}", self.jobs);
        self.run_step("make", &unit_dir, "make", &[&jobs_flag])?;
        Ok(())
    }

    /// Run `ctest --output-on-failure`, capturing output.
    pub fn run_tests(&self) -> Result<TestOutcome, RunnerError> {
        let unit_dir = self.unit_build_dir();
        let log_path = unit_dir
            .join("Testing")
            .join("Temporary")
            .join("LastTest.log");

        let mut cmd = Command::new("ctest");
        cmd.arg("--output-on-failure").current_dir(&unit_dir);
        self.apply_env(&mut cmd);
        log_cmd(&cmd);
        let output = cmd.output()?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let passed = output.status.success();
        let failures = if passed {
            Vec::new()
        } else {
            parse_ctest_failures(&stdout)
        };

        Ok(TestOutcome {
            passed,
            failures,
            log_path,
            output: stdout,
        })
    }

    fn run_step(
        &self,
        step: &str,
        cwd: &Path,
        program: &str,
        args: &[&str],
    ) -> Result<(), RunnerError> {
        let mut cmd = Command::new(program);
        cmd.args(args).current_dir(cwd);
        self.apply_env(&mut cmd);
        log_cmd(&cmd);

        let status = cmd.status()?;
        if !status.success() {
            return Err(RunnerError::StepFailed {
                step: step.to_string(),
                code: status.code(),
            });
        }
        Ok(())
    }

    fn apply_env(&self, cmd: &mut Command) {
        let Some(env) = &self.env else { return };
        for var in SDK_ENV_VARS {
            cmd.env_remove(var);
        }
        for (key, value) in env {
            cmd.env(key, value);
        }
    }
}

/// Toolchain overrides pinning the host compiler.
fn host_compiler_env() -> HashMap<String, String> {
    [
        ("CC", "/usr/bin/gcc"),
        ("CXX", "/usr/bin/g++"),
        ("AR", "/usr/bin/ar"),
        ("RANLIB", "/usr/bin/ranlib"),
        ("STRIP", "/usr/bin/strip"),
        ("NM", "/usr/bin/nm"),
        ("OBJCOPY", "/usr/bin/objcopy"),
        ("OBJDUMP", "/usr/bin/objdump"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Find the project root for `start`: the topmost ancestor directory that
/// contains a `CMakeLists.txt`.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    let start = start.canonicalize().ok()?;
    let mut topmost = None;
    let mut current = Some(start.as_path());
    while let Some(dir) = current {
        if dir.join("CMakeLists.txt").is_file() {
            topmost = Some(dir.to_path_buf());
        }
        current = dir.parent();
    }
    topmost
}

/// Parse failing test names from ctest output.
///
/// ctest prints a trailing block:
/// ```text
/// The following tests FAILED:
///       3 - uart_driver_test (Failed)
/// ```
pub fn parse_ctest_failures(output: &str) -> Vec<String> {
    let mut failures = Vec::new();
    let mut capture = false;
    for line in output.lines() {
        if line.starts_with("The following tests FAILED:") {
            capture = true;
            continue;
        }
        if !capture {
            continue;
        }
        let stripped = line.trim();
        if stripped.is_empty() {
            break;
        }
        if let Some((_, rest)) = stripped.split_once('-') {
            if let Some(name) = rest.trim().split(' ').next() {
                if !name.is_empty() {
                    failures.push(name.to_string());
                }
            }
        }
    }
    failures
}
