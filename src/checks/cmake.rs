//! CMakeLists policy checker
//!
//! Scans changed `CMakeLists.txt` files under the allowed paths for
//! disallowed include directories, subdirectories, and linked libraries.
//! This is a single-pass pattern scan with just enough CMake awareness to
//! strip comments, expand simple `set(VAR value)` assignments, and gather
//! multi-line `target_link_libraries()` blocks.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;

use crate::checks::{path_allowed, CheckError, Finding};
use crate::core::rules::{CmakeRules, FileRules};
use crate::git::ChangedFiles;

static SET_VAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*set\s*\(\s*([A-Za-z0-9_]+)\s+([^\)]+)\)").expect("valid regex")
});
static ADD_SUBDIR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\badd_subdirectory\s*\(").expect("valid regex"));
static TARGET_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\btarget_link_libraries\s*\(").expect("valid regex"));
// Prefer showing the actual ../ path token over the bare pattern
static REL_PATH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(\.{2}/(?:\.{2}/)*[^\s',\)"]*)"#).expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuleKind {
    IncludeDir,
    Subdirectory,
    LinkedLib,
}

impl RuleKind {
    fn reason(self) -> &'static str {
        match self {
            RuleKind::IncludeDir => "Not allowed CMake include dir found",
            RuleKind::Subdirectory => "Not allowed CMake subdirectory found",
            RuleKind::LinkedLib => "Not allowed CMake linked library found",
        }
    }
}

struct CompiledRule {
    pattern: String,
    regex: Option<Regex>,
    kind: RuleKind,
}

/// Strip CMake `#` comments from a line, preserving quoted text.
///
/// Stops at the first `#` that is not inside single or double quotes.
pub fn strip_cmake_comments(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut in_sq = false;
    let mut in_dq = false;
    for c in line.chars() {
        match c {
            '\'' if !in_dq => {
                in_sq = !in_sq;
                out.push(c);
            }
            '"' if !in_sq => {
                in_dq = !in_dq;
                out.push(c);
            }
            '#' if !in_sq && !in_dq => break,
            _ => out.push(c),
        }
    }
    out
}

/// Collect simple `set(VAR value)` assignments for basic variable expansion.
fn collect_set_vars(cleaned_lines: &[String]) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    for line in cleaned_lines {
        if let Some(caps) = SET_VAR_RE.captures(line) {
            vars.insert(caps[1].to_string(), caps[2].trim().to_string());
        }
    }
    vars
}

/// Expand `${VAR}` occurrences using collected assignments.
///
/// `${CMAKE_SOURCE_DIR}` inside a value is removed and a leading slash
/// trimmed so relative `../` tokens stay matchable.
fn expand_vars(line: &str, vars: &HashMap<String, String>) -> String {
    let mut expanded = line.to_string();
    for (name, value) in vars {
        let token = format!("${{{}}}", name);
        if expanded.contains(&token) {
            let v = value.replace("${CMAKE_SOURCE_DIR}", "");
            let v = v.trim().trim_start_matches('/');
            expanded = expanded.replace(&token, v);
        }
    }
    expanded
}

fn compile_rules(rules: &CmakeRules) -> Vec<CompiledRule> {
    let mut compiled = Vec::new();

    for (patterns, kind) in [
        (&rules.not_allowed_include_dirs, RuleKind::IncludeDir),
        (&rules.not_allowed_subdirectories, RuleKind::Subdirectory),
    ] {
        for pattern in patterns {
            let regex = if let Some(base) = pattern.strip_suffix('/') {
                // Directory prefix: the base followed by a separator or a
                // word boundary
                Regex::new(&format!(r"{}([/\\]|\b)", regex::escape(base)))
            } else {
                Regex::new(&regex::escape(pattern))
            };
            compiled.push(CompiledRule {
                pattern: pattern.clone(),
                regex: regex.ok(),
                kind,
            });
        }
    }

    // Linked libraries are matched as whole tokens inside
    // target_link_libraries() blocks, without a regex.
    for pattern in &rules.not_allowed_linked_libraries {
        compiled.push(CompiledRule {
            pattern: pattern.clone(),
            regex: None,
            kind: RuleKind::LinkedLib,
        });
    }

    compiled
}

/// Check whether `needle` occurs in `haystack` as a standalone token, not as
/// part of a longer identifier.
fn contains_token(haystack: &str, needle: &str) -> bool {
    let is_ident = |b: u8| b.is_ascii_alphanumeric() || b == b'_';
    let bytes = haystack.as_bytes();
    let mut start = 0;
    while let Some(idx) = haystack[start..].find(needle) {
        let at = start + idx;
        let before_ok = at == 0 || !is_ident(bytes[at - 1]);
        let end = at + needle.len();
        let after_ok = end >= bytes.len() || !is_ident(bytes[end]);
        if before_ok && after_ok {
            return true;
        }
        start = at + 1;
    }
    false
}

/// Scan one CMakeLists.txt for policy violations.
pub fn scan_cmakelists(
    repo_root: &Path,
    rel_path: &str,
    rules: &CmakeRules,
) -> Result<Vec<Finding>, CheckError> {
    let full = repo_root.join(rel_path);
    if !full.is_file() {
        return Ok(Vec::new());
    }

    let content = std::fs::read_to_string(&full)?;
    let lines: Vec<&str> = content.lines().collect();
    let cleaned: Vec<String> = lines.iter().map(|l| strip_cmake_comments(l)).collect();
    let vars = collect_set_vars(&cleaned);
    let compiled = compile_rules(rules);

    let mut findings = Vec::new();

    for (i, line) in cleaned.iter().enumerate() {
        let expanded = expand_vars(line, &vars);

        for rule in &compiled {
            // Subdirectory rules only apply to add_subdirectory() calls
            if rule.kind == RuleKind::Subdirectory && !ADD_SUBDIR_RE.is_match(&expanded) {
                continue;
            }
            // Linked libraries are handled on whole blocks below
            if rule.kind == RuleKind::LinkedLib {
                continue;
            }

            let Some(regex) = &rule.regex else { continue };
            if regex.is_match(&expanded) {
                let display = REL_PATH_RE
                    .captures(&expanded)
                    .map(|caps| caps[1].to_string());
                findings.push(Finding {
                    file: rel_path.to_string(),
                    line: Some(i + 1),
                    rule: rule.pattern.clone(),
                    reason: rule.kind.reason().to_string(),
                    excerpt: display,
                });
            }
        }
    }

    // Gather multi-line target_link_libraries(...) blocks by parenthesis
    // balance and check them for disallowed linked libraries.
    let mut idx = 0;
    while idx < cleaned.len() {
        let line = &cleaned[idx];
        if !TARGET_LINK_RE.is_match(line) {
            idx += 1;
            continue;
        }

        let start_line = idx;
        let mut depth = paren_balance(line);
        let mut parts = vec![line.clone()];
        idx += 1;
        while depth > 0 && idx < cleaned.len() {
            depth += paren_balance(&cleaned[idx]);
            parts.push(cleaned[idx].clone());
            idx += 1;
        }

        let block = expand_vars(&parts.join(" "), &vars);
        for rule in &compiled {
            if rule.kind != RuleKind::LinkedLib {
                continue;
            }
            if contains_token(&block, &rule.pattern) {
                findings.push(Finding {
                    file: rel_path.to_string(),
                    line: Some(start_line + 1),
                    rule: rule.pattern.clone(),
                    reason: rule.kind.reason().to_string(),
                    excerpt: None,
                });
            }
        }
    }

    Ok(findings)
}

fn paren_balance(line: &str) -> i32 {
    let open = line.matches('(').count() as i32;
    let close = line.matches(')').count() as i32;
    open - close
}

/// Check all changed CMakeLists.txt files under the allowed paths.
///
/// Returns no findings when no relevant CMakeLists changed.
pub fn check_cmake(
    repo_root: &Path,
    changed: &ChangedFiles,
    file_rules: &FileRules,
    cmake_rules: &CmakeRules,
) -> Result<Vec<Finding>, CheckError> {
    let relevant: Vec<String> = changed
        .all()
        .into_iter()
        .filter(|p| {
            Path::new(p)
                .file_name()
                .map(|n| n == "CMakeLists.txt")
                .unwrap_or(false)
                && path_allowed(p, &file_rules.allowed_to_modify)
        })
        .collect();

    let mut findings = Vec::new();
    for rel in &relevant {
        findings.extend(scan_cmakelists(repo_root, rel, cmake_rules)?);
    }
    Ok(findings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn rules() -> CmakeRules {
        CmakeRules {
            not_allowed_include_dirs: vec!["../../src/".to_string()],
            not_allowed_subdirectories: vec!["../../drivers/".to_string()],
            not_allowed_linked_libraries: vec!["app_prod".to_string()],
        }
    }

    fn write_cmake(dir: &TempDir, rel: &str, content: &str) {
        let path = dir.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_strip_comments_preserves_quotes() {
        assert_eq!(
            strip_cmake_comments("set(PATH 'a#b') # comment here").trim_end(),
            "set(PATH 'a#b')"
        );
        assert_eq!(strip_cmake_comments("plain line"), "plain line");
    }

    #[test]
    fn test_contains_token() {
        assert!(contains_token("target_link_libraries(app app_prod)", "app_prod"));
        assert!(!contains_token("target_link_libraries(app app_prod_extra)", "app_prod"));
        assert!(!contains_token("target_link_libraries(app my_app_prod)", "app_prod"));
    }

    #[test]
    fn test_detects_include_dir() {
        let temp = TempDir::new().unwrap();
        write_cmake(
            &temp,
            "unit_tests/CMakeLists.txt",
            "include_directories(../../src/foo)\n",
        );
        let findings =
            scan_cmakelists(temp.path(), "unit_tests/CMakeLists.txt", &rules()).unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].line, Some(1));
        assert_eq!(findings[0].excerpt.as_deref(), Some("../../src/foo"));
        assert!(findings[0].reason.contains("include dir"));
    }

    #[test]
    fn test_subdirectory_only_on_add_subdirectory_lines() {
        let temp = TempDir::new().unwrap();
        write_cmake(
            &temp,
            "unit_tests/CMakeLists.txt",
            "# mention of ../../drivers/ in a comment\n\
             message(\"../../drivers/\")\n\
             add_subdirectory(../../drivers/uart build_uart)\n",
        );
        let findings =
            scan_cmakelists(temp.path(), "unit_tests/CMakeLists.txt", &rules()).unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].line, Some(3));
        assert!(findings[0].reason.contains("subdirectory"));
    }

    #[test]
    fn test_variable_expansion() {
        let temp = TempDir::new().unwrap();
        write_cmake(
            &temp,
            "unit_tests/CMakeLists.txt",
            "set(SRC_DIR ${CMAKE_SOURCE_DIR}/../../src/)\n\
             include_directories(${SRC_DIR}core)\n",
        );
        let findings =
            scan_cmakelists(temp.path(), "unit_tests/CMakeLists.txt", &rules()).unwrap();
        assert!(
            findings.iter().any(|f| f.line == Some(2)),
            "expected expanded variable to trigger: {:?}",
            findings
        );
    }

    #[test]
    fn test_linked_library_multiline_block() {
        let temp = TempDir::new().unwrap();
        write_cmake(
            &temp,
            "unit_tests/CMakeLists.txt",
            "target_link_libraries(app\n\
             \tPRIVATE\n\
             \tapp_prod\n\
             )\n",
        );
        let findings =
            scan_cmakelists(temp.path(), "unit_tests/CMakeLists.txt", &rules()).unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].line, Some(1));
        assert_eq!(findings[0].rule, "app_prod");
        assert!(findings[0].reason.contains("linked library"));
    }

    #[test]
    fn test_commented_lines_are_ignored() {
        let temp = TempDir::new().unwrap();
        write_cmake(
            &temp,
            "unit_tests/CMakeLists.txt",
            "# include_directories(../../src/foo)\n",
        );
        let findings =
            scan_cmakelists(temp.path(), "unit_tests/CMakeLists.txt", &rules()).unwrap();
        assert!(findings.is_empty());
    }

    #[test]
    fn test_check_cmake_filters_relevant_files() {
        let temp = TempDir::new().unwrap();
        write_cmake(
            &temp,
            "unit_tests/CMakeLists.txt",
            "include_directories(../../src/foo)\n",
        );
        write_cmake(
            &temp,
            "other/CMakeLists.txt",
            "include_directories(../../src/foo)\n",
        );

        let changed = ChangedFiles {
            created: vec![
                "other/CMakeLists.txt".to_string(),
                "unit_tests/CMakeLists.txt".to_string(),
                "unit_tests/main.c".to_string(),
            ],
            ..Default::default()
        };
        let file_rules = FileRules {
            allowed_to_modify: vec!["unit_tests/".to_string()],
            ..Default::default()
        };

        let findings = check_cmake(temp.path(), &changed, &file_rules, &rules()).unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].file, "unit_tests/CMakeLists.txt");
    }
}
