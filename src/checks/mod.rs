//! Policy checks over changed files
//!
//! Each check scans changed files (or the tree, for fallback scans) against
//! the rules file and produces findings. Checks never mutate anything; the
//! command layer decides how to report and which exit code to use.

pub mod cmake;
pub mod coverage;
pub mod files;
pub mod includes;
pub mod mock_link;

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use thiserror::Error;

/// Errors shared by the checks
#[derive(Error, Debug)]
pub enum CheckError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("git error: {0}")]
    Git(#[from] crate::git::GitError),

    #[error("invalid ignore pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        source: globset::Error,
    },
}

/// A single policy violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    /// File the violation was found in, relative to the repo root
    pub file: String,
    /// 1-based line number, when known
    pub line: Option<usize>,
    /// The rule pattern that matched
    pub rule: String,
    /// Human-readable reason
    pub reason: String,
    /// Offending source excerpt, when available
    pub excerpt: Option<String>,
}

impl Finding {
    /// Render the finding as a `FAIL:` line.
    pub fn render(&self) -> String {
        let location = match self.line {
            Some(line) => format!("{}:{}", self.file, line),
            None => self.file.clone(),
        };
        match &self.excerpt {
            Some(excerpt) if !excerpt.trim().is_empty() => format!(
                "FAIL: {}: {}: {} -- matched: {}",
                location,
                self.reason,
                self.rule,
                excerpt.trim()
            ),
            _ => format!("FAIL: {}: {}: {}", location, self.reason, self.rule),
        }
    }
}

/// Check whether `path` falls under any of the allowed prefixes.
///
/// Backslashes are normalized to forward slashes on both sides before the
/// prefix comparison.
pub fn path_allowed(path: &str, allowed_prefixes: &[String]) -> bool {
    let normalized = path.replace('\\', "/");
    allowed_prefixes
        .iter()
        .any(|prefix| normalized.starts_with(&prefix.replace('\\', "/")))
}

/// Compiled `ignored_files` patterns.
///
/// A file is ignored when any pattern matches its basename, its path as
/// given, or its slash-normalized path.
#[derive(Debug)]
pub struct IgnoreList {
    set: Option<GlobSet>,
}

impl IgnoreList {
    /// Compile glob patterns into an ignore list.
    pub fn compile(patterns: &[String]) -> Result<Self, CheckError> {
        if patterns.is_empty() {
            return Ok(Self { set: None });
        }
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(pattern).map_err(|e| CheckError::InvalidPattern {
                pattern: pattern.clone(),
                source: e,
            })?;
            builder.add(glob);
        }
        let set = builder.build().map_err(|e| CheckError::InvalidPattern {
            pattern: patterns.join(", "),
            source: e,
        })?;
        Ok(Self { set: Some(set) })
    }

    /// Check whether a path is exempted.
    pub fn is_ignored(&self, path: &str) -> bool {
        let Some(set) = &self.set else {
            return false;
        };
        let normalized = path.replace('\\', "/");
        if set.is_match(path) || set.is_match(&normalized) {
            return true;
        }
        Path::new(&normalized)
            .file_name()
            .map(|name| set.is_match(Path::new(name)))
            .unwrap_or(false)
    }
}
