//! C/C++ include policy checker
//!
//! Scans changed sources under the allowed paths for disallowed `#include`
//! targets and extensions. Includes inside block comments or after `//` on a
//! line are ignored. When no changed files qualify, all files under the
//! allowed prefixes are scanned instead so mock sources are validated on a
//! clean tree as well.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

use crate::checks::{path_allowed, CheckError, Finding, IgnoreList};
use crate::core::rules::{FileRules, IncludeRules};
use crate::git::ChangedFiles;

static INCLUDE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"#\s*include\s*[<"]\s*([^>"]+?)\s*[>"]"#).expect("valid regex")
});
static BLOCK_COMMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("valid regex"));

/// Extensions treated as C/C++ sources for the full-file fragment search.
const C_CPP_EXTENSIONS: [&str; 8] = ["c", "cpp", "cc", "cxx", "h", "hpp", "hh", "inl"];

/// Render a forbidden-include pattern the way it would appear in source.
pub fn humanize_pattern(pattern: &str) -> String {
    if let Some(inner) = pattern.strip_suffix('/') {
        return format!("#include <{}/...>", inner);
    }
    if pattern.ends_with(".h") || pattern.contains('/') {
        return format!("#include <{}>", pattern);
    }
    pattern.to_string()
}

struct CompiledPattern {
    pattern: String,
    /// Per-line regex; path-like patterns (containing '/') have none and are
    /// only checked against include targets and the fragment search.
    regex: Option<Regex>,
}

fn compile_patterns(patterns: &[String]) -> Vec<CompiledPattern> {
    patterns
        .iter()
        .map(|pattern| {
            let regex = if let Some(base) = pattern.strip_suffix('/') {
                // Folder-like: only match inside include lines so fragments
                // in arbitrary text do not trigger
                Regex::new(&format!(
                    r#"#\s*include\s*[<"]\s*{}(?:[/.][^>"]*)?[>"]"#,
                    regex::escape(base)
                ))
                .ok()
            } else if pattern.ends_with(".h") {
                Regex::new(&format!(
                    r#"#\s*include\s*[<"]\s*{}\s*[>"]"#,
                    regex::escape(pattern)
                ))
                .ok()
            } else if pattern.contains('/') {
                None
            } else {
                Regex::new(&regex::escape(pattern)).ok()
            };
            CompiledPattern {
                pattern: pattern.clone(),
                regex,
            }
        })
        .collect()
}

/// 1-based line numbers covered by `/* ... */` block comments.
fn block_commented_lines(text: &str) -> Vec<(usize, usize)> {
    BLOCK_COMMENT_RE
        .find_iter(text)
        .map(|m| {
            let start_line = text[..m.start()].matches('\n').count() + 1;
            let end_line = text[..m.end()].matches('\n').count() + 1;
            (start_line, end_line)
        })
        .collect()
}

fn in_spans(line: usize, spans: &[(usize, usize)]) -> bool {
    spans.iter().any(|(a, b)| *a <= line && line <= *b)
}

fn is_c_cpp_file(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| C_CPP_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Scan one source file for include violations.
pub fn scan_source(
    repo_root: &Path,
    rel_path: &str,
    rules: &IncludeRules,
) -> Result<Vec<Finding>, CheckError> {
    let full = repo_root.join(rel_path);
    if !full.is_file() {
        return Ok(Vec::new());
    }

    let bytes = std::fs::read(&full)?;
    let text = String::from_utf8_lossy(&bytes).into_owned();
    let comment_spans = block_commented_lines(&text);
    let compiled = compile_patterns(&rules.not_allowed_header_includes);

    let mut findings = Vec::new();
    let mut push = |f: Finding| {
        if !findings.contains(&f) {
            findings.push(f);
        }
    };

    for (i, line) in text.lines().enumerate() {
        let lineno = i + 1;
        if in_spans(lineno, &comment_spans) {
            continue;
        }
        let line_comment_pos = line.find("//");
        let after_line_comment =
            |at: usize| line_comment_pos.map(|pos| at >= pos).unwrap_or(false);

        for cp in &compiled {
            let Some(regex) = &cp.regex else { continue };
            let Some(m) = regex.find(line) else { continue };
            if after_line_comment(m.start()) {
                continue;
            }
            push(Finding {
                file: rel_path.to_string(),
                line: Some(lineno),
                rule: humanize_pattern(&cp.pattern),
                reason: "Not allowed include found".into(),
                excerpt: Some(line.to_string()),
            });
        }

        let Some(caps) = INCLUDE_RE.captures(line) else {
            continue;
        };
        let m = caps.get(0).expect("whole match");
        if after_line_comment(m.start()) {
            continue;
        }
        let include_target = caps[1].replace('\\', "/");

        // Folder-like and path-like patterns flagged inside the target
        for cp in &compiled {
            let matches_target = if cp.pattern.ends_with('/') || cp.pattern.contains('/') {
                include_target.contains(&cp.pattern.replace('\\', "/"))
            } else {
                false
            };
            if matches_target {
                push(Finding {
                    file: rel_path.to_string(),
                    line: Some(lineno),
                    rule: humanize_pattern(&cp.pattern),
                    reason: "Not allowed include found".into(),
                    excerpt: Some(line.to_string()),
                });
            }
        }

        // Includes referencing disallowed source-file extensions
        let target_lower = include_target.to_lowercase();
        for ext in &rules.not_allowed_include_extensions {
            let normalized = if ext.starts_with('.') {
                ext.to_lowercase()
            } else {
                format!(".{}", ext.to_lowercase())
            };
            if target_lower.ends_with(&normalized) {
                push(Finding {
                    file: rel_path.to_string(),
                    line: Some(lineno),
                    rule: format!("includes *{} files", normalized),
                    reason: "Not allowed include found".into(),
                    excerpt: Some(line.to_string()),
                });
            }
        }
    }

    // Full-file fragment search for folder-like and path-like patterns, to
    // catch occurrences spanning whitespace or macros. Restricted to C/C++
    // files so the fragments are not matched inside tool scripts.
    if is_c_cpp_file(rel_path) {
        let search_text = text.replace('\\', "/");
        let lines: Vec<&str> = search_text.lines().collect();
        for cp in &compiled {
            if !cp.pattern.ends_with('/') && !cp.pattern.contains('/') {
                continue;
            }
            let needle = cp.pattern.replace('\\', "/");
            for (start, _) in search_text.match_indices(&needle) {
                let lineno = search_text[..start].matches('\n').count() + 1;
                if in_spans(lineno, &comment_spans) {
                    continue;
                }
                let line_start = search_text[..start].rfind('\n').map(|p| p + 1).unwrap_or(0);
                if search_text[line_start..start].contains("//") {
                    continue;
                }
                let excerpt = lines.get(lineno - 1).unwrap_or(&"").to_string();
                push(Finding {
                    file: rel_path.to_string(),
                    line: Some(lineno),
                    rule: humanize_pattern(&cp.pattern),
                    reason: "Not allowed include found".into(),
                    excerpt: Some(excerpt),
                });
            }
        }
    }

    Ok(findings)
}

/// Recursively collect files under `dir`, relative to `repo_root`.
fn walk_files(repo_root: &Path, dir: &Path, out: &mut Vec<String>) -> Result<(), CheckError> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            walk_files(repo_root, &path, out)?;
        } else if let Ok(rel) = path.strip_prefix(repo_root) {
            out.push(rel.to_string_lossy().replace('\\', "/"));
        }
    }
    Ok(())
}

/// Check changed sources (or, on a clean tree, all sources under the allowed
/// prefixes) for include violations.
pub fn check_includes(
    repo_root: &Path,
    changed: &ChangedFiles,
    file_rules: &FileRules,
    include_rules: &IncludeRules,
) -> Result<Vec<Finding>, CheckError> {
    let ignore = IgnoreList::compile(&file_rules.ignored_files)?;

    let mut relevant: Vec<String> = changed
        .all()
        .into_iter()
        .filter(|p| path_allowed(p, &file_rules.allowed_to_modify) && !ignore.is_ignored(p))
        .collect();

    if relevant.is_empty() {
        for prefix in &file_rules.allowed_to_modify {
            let prefix_path = repo_root.join(prefix);
            if prefix_path.is_dir() {
                let mut files = Vec::new();
                walk_files(repo_root, &prefix_path, &mut files)?;
                for rel in files {
                    if !relevant.contains(&rel) && !ignore.is_ignored(&rel) {
                        relevant.push(rel);
                    }
                }
            } else if prefix_path.is_file() {
                let rel = prefix.replace('\\', "/");
                if !relevant.contains(&rel) && !ignore.is_ignored(&rel) {
                    relevant.push(rel);
                }
            }
        }
    }

    let mut findings = Vec::new();
    for rel in &relevant {
        for finding in scan_source(repo_root, rel, include_rules)? {
            if !findings.contains(&finding) {
                findings.push(finding);
            }
        }
    }
    Ok(findings)
}
