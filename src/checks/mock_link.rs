//! Mock library link audit
//!
//! Ensures mock libraries referenced in unit test CMakeLists are transitively
//! reachable from the application target. The link graph is built by
//! recursively following `add_subdirectory()` calls and recording
//! `target_link_libraries()` edges.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::checks::{CheckError, Finding};
use crate::core::rules::MockRules;

static MOCK_LIB_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"zephyr_library_named\s*\(\s*([^\)]+?)\s*\)").expect("valid regex"));
static TARGET_LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)target_link_libraries\s*\(\s*([^\)]+?)\s*\)").expect("valid regex")
});
static ADD_SUBDIR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"add_subdirectory\s*\(\s*([^\)]+?)\s*\)").expect("valid regex"));

/// Link graph: target or library name to the libraries it links.
pub type LinkGraph = BTreeMap<String, Vec<String>>;

fn strip_comments(text: &str) -> String {
    text.lines()
        .map(|line| line.split('#').next().unwrap_or(""))
        .collect::<Vec<_>>()
        .join("\n")
}

fn split_cmake_args(blob: &str) -> Vec<String> {
    blob.split_whitespace().map(str::to_string).collect()
}

/// Parse one CMakeLists.txt into link edges and subdirectory references.
///
/// Unreadable files parse as empty, matching how CMake trees routinely
/// reference directories that only exist in other build configurations.
pub fn parse_cmake_file(path: &Path) -> (LinkGraph, Vec<String>) {
    let Ok(raw) = std::fs::read_to_string(path) else {
        return (LinkGraph::new(), Vec::new());
    };
    let content = strip_comments(&raw);

    let mut target_links = LinkGraph::new();
    for caps in TARGET_LINK_RE.captures_iter(&content) {
        let tokens = split_cmake_args(&caps[1]);
        let Some((target, libs)) = tokens.split_first() else {
            continue;
        };
        let libs: Vec<String> = libs
            .iter()
            .filter(|t| !matches!(t.as_str(), "PRIVATE" | "PUBLIC" | "INTERFACE"))
            .cloned()
            .collect();
        if !libs.is_empty() {
            target_links.entry(target.clone()).or_default().extend(libs);
        }
    }

    let mut subdirs = Vec::new();
    for caps in ADD_SUBDIR_RE.captures_iter(&content) {
        let tokens = split_cmake_args(&caps[1]);
        let Some(first) = tokens.first() else { continue };
        let subdir = first.trim_matches('"');
        // Variable-based directories cannot be resolved statically
        if subdir.contains('$') {
            continue;
        }
        subdirs.push(subdir.to_string());
    }

    (target_links, subdirs)
}

/// Collect mock library names declared via `zephyr_library_named()` in the
/// configured mock CMakeLists.
pub fn collect_mock_libs(repo_root: &Path, rules: &MockRules) -> BTreeSet<String> {
    let path = repo_root.join(&rules.mock_cmake);
    let Ok(raw) = std::fs::read_to_string(&path) else {
        return BTreeSet::new();
    };
    let content = strip_comments(&raw);
    MOCK_LIB_RE
        .captures_iter(&content)
        .map(|caps| caps[1].trim().to_string())
        .collect()
}

fn resolve_subdir(cmake_dir: &Path, subdir: &str) -> Option<PathBuf> {
    let candidate = if Path::new(subdir).is_absolute() {
        PathBuf::from(subdir)
    } else {
        cmake_dir.join(subdir)
    };
    candidate.is_dir().then_some(candidate)
}

/// Build the link graph reachable from an entry CMakeLists by following
/// `add_subdirectory()` calls.
pub fn build_link_graph(entry_cmake: &Path) -> LinkGraph {
    let mut graph = LinkGraph::new();
    let mut visited = BTreeSet::new();
    visit(entry_cmake, &mut graph, &mut visited);
    graph
}

fn visit(cmake_path: &Path, graph: &mut LinkGraph, visited: &mut BTreeSet<PathBuf>) {
    let key = cmake_path
        .canonicalize()
        .unwrap_or_else(|_| cmake_path.to_path_buf());
    if !visited.insert(key) {
        return;
    }

    let cmake_dir = cmake_path.parent().unwrap_or(Path::new("."));
    let (target_links, subdirs) = parse_cmake_file(cmake_path);
    for (target, libs) in target_links {
        graph.entry(target).or_default().extend(libs);
    }

    for subdir in subdirs {
        let Some(resolved) = resolve_subdir(cmake_dir, &subdir) else {
            continue;
        };
        let sub_cmake = resolved.join("CMakeLists.txt");
        if sub_cmake.is_file() {
            visit(&sub_cmake, graph, visited);
        }
    }
}

/// Libraries transitively reachable from `start` in the link graph.
pub fn reachable_libs(graph: &LinkGraph, start: &str) -> BTreeSet<String> {
    let mut reachable = BTreeSet::new();
    let mut stack = vec![start.to_string()];
    while let Some(target) = stack.pop() {
        for lib in graph.get(&target).into_iter().flatten() {
            if reachable.insert(lib.clone()) && graph.contains_key(lib) {
                stack.push(lib.clone());
            }
        }
    }
    reachable
}

/// Audit one unit test CMakeLists: every referenced mock library must be
/// reachable from the app target. Returns the unreachable mocks, sorted.
pub fn audit_unit_test(
    cmake_path: &Path,
    mock_libs: &BTreeSet<String>,
    app_target: &str,
) -> Vec<String> {
    let graph = build_link_graph(cmake_path);

    let referenced: BTreeSet<&String> = graph
        .values()
        .flatten()
        .filter(|lib| mock_libs.contains(*lib))
        .collect();
    if referenced.is_empty() {
        return Vec::new();
    }

    let reachable = reachable_libs(&graph, app_target);
    referenced
        .into_iter()
        .filter(|lib| !reachable.contains(*lib))
        .cloned()
        .collect()
}

fn find_cmakelists(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    let mut entries: Vec<_> = entries.flatten().collect();
    entries.sort_by_key(|e| e.path());
    for entry in entries {
        let path = entry.path();
        if path.is_dir() {
            find_cmakelists(&path, out);
        } else if path.file_name().map(|n| n == "CMakeLists.txt").unwrap_or(false) {
            out.push(path);
        }
    }
}

/// Outcome of the audit when no mock libraries exist to check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockAuditStatus {
    Checked,
    NoMocksFound,
}

/// Audit every unit test CMakeLists under the configured scan directory.
pub fn check_mock_links(
    repo_root: &Path,
    rules: &MockRules,
) -> Result<(MockAuditStatus, Vec<Finding>), CheckError> {
    let mock_libs = collect_mock_libs(repo_root, rules);
    if mock_libs.is_empty() {
        return Ok((MockAuditStatus::NoMocksFound, Vec::new()));
    }

    let mut cmake_files = Vec::new();
    find_cmakelists(&repo_root.join(&rules.scan_dir), &mut cmake_files);

    let mut findings = Vec::new();
    for cmake_path in cmake_files {
        let missing = audit_unit_test(&cmake_path, &mock_libs, &rules.app_target);
        if missing.is_empty() {
            continue;
        }
        let rel = cmake_path
            .strip_prefix(repo_root)
            .unwrap_or(&cmake_path)
            .to_string_lossy()
            .replace('\\', "/");
        findings.push(Finding {
            file: rel,
            line: None,
            rule: missing.join(", "),
            reason: format!("Mock libraries not reachable from '{}'", rules.app_target),
            excerpt: None,
        });
    }

    Ok((MockAuditStatus::Checked, findings))
}
