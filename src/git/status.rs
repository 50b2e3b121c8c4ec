//! Changed-file classification from git porcelain status
//!
//! Groups files under a repository as created/added/modified/deleted the way
//! a CI gate wants to see them: untracked files count as created, staged adds
//! count as both added and created, renames contribute their destination.

use std::collections::BTreeSet;
use std::path::Path;
use std::process::Command;

use super::{repo_root, GitError};
use crate::util::log_cmd;

/// Files changed in a repository, grouped by kind.
///
/// All lists are sorted and deduplicated.
#[derive(Debug, Clone, Default)]
pub struct ChangedFiles {
    /// Untracked files and staged adds
    pub created: Vec<String>,
    /// Files staged as added (index status `A`)
    pub added: Vec<String>,
    /// Files modified, staged or unstaged
    pub modified: Vec<String>,
    /// Files deleted, staged or unstaged
    pub deleted: Vec<String>,
}

impl ChangedFiles {
    /// Collect changed files for the repository containing `path`.
    ///
    /// Outside a git repository every group is empty.
    pub fn collect<P: AsRef<Path>>(path: P) -> Result<Self, GitError> {
        let Some(root) = repo_root(path.as_ref()) else {
            return Ok(Self::default());
        };

        let mut created = BTreeSet::new();
        let mut added = BTreeSet::new();
        let mut modified = BTreeSet::new();
        let mut deleted = BTreeSet::new();

        for line in run_status_porcelain(&root)? {
            let Some((status, file)) = parse_porcelain_entry(&line) else {
                continue;
            };

            if status == "??" {
                created.insert(file);
                continue;
            }

            let mut chars = status.chars();
            let x = chars.next().unwrap_or(' ');
            let y = chars.next().unwrap_or(' ');

            if x == 'A' {
                added.insert(file.clone());
                created.insert(file.clone());
            }
            if x == 'M' || y == 'M' {
                modified.insert(file.clone());
            }
            if x == 'D' || y == 'D' {
                deleted.insert(file);
            }
        }

        // Untracked files from ls-files are merged into created so the gate
        // sees new files even when status output was truncated or filtered.
        for file in run_ls_files_others(&root)? {
            let name = file.strip_prefix("./").unwrap_or(&file);
            if !name.is_empty() {
                created.insert(name.to_string());
            }
        }

        Ok(Self {
            created: created.into_iter().collect(),
            added: added.into_iter().collect(),
            modified: modified.into_iter().collect(),
            deleted: deleted.into_iter().collect(),
        })
    }

    /// All changed paths (created, added, modified, and deleted), deduplicated.
    pub fn all(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for group in [&self.created, &self.added, &self.modified, &self.deleted] {
            for path in group {
                if !out.contains(path) {
                    out.push(path.clone());
                }
            }
        }
        out
    }

    /// Changed paths that still exist (created, added, and modified).
    pub fn touched(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for group in [&self.created, &self.added, &self.modified] {
            for path in group {
                if !out.contains(path) {
                    out.push(path.clone());
                }
            }
        }
        out
    }

    /// True when no changes were found.
    pub fn is_empty(&self) -> bool {
        self.created.is_empty()
            && self.added.is_empty()
            && self.modified.is_empty()
            && self.deleted.is_empty()
    }
}

/// Run `git status --porcelain=v1 -uall` and return non-empty lines.
fn run_status_porcelain(repo_dir: &Path) -> Result<Vec<String>, GitError> {
    let mut cmd = Command::new("git");
    cmd.args(["status", "--porcelain=v1", "-uall"])
        .current_dir(repo_dir);
    log_cmd(&cmd);
    let output = cmd
        .output()
        .map_err(|e| GitError::OperationFailed(e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(GitError::OperationFailed(format!(
            "git status failed: {}",
            stderr.trim()
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout
        .lines()
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

/// Run `git ls-files -o --exclude-standard` and return non-empty lines.
fn run_ls_files_others(repo_dir: &Path) -> Result<Vec<String>, GitError> {
    let mut cmd = Command::new("git");
    cmd.args(["ls-files", "-o", "--exclude-standard"])
        .current_dir(repo_dir);
    log_cmd(&cmd);
    let output = cmd
        .output()
        .map_err(|e| GitError::OperationFailed(e.to_string()))?;

    // ls-files is supplementary; a failure here should not sink the check
    if !output.status.success() {
        return Ok(Vec::new());
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout
        .lines()
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

/// Parse a porcelain v1 entry into (status, filename).
///
/// Handles `?? <file>` and `XY <file>`. Rename entries formatted as
/// `R100 from -> to` yield the destination filename. C-quoted paths are
/// unescaped.
fn parse_porcelain_entry(line: &str) -> Option<(String, String)> {
    if let Some(rest) = line.strip_prefix("?? ") {
        return Some(("??".to_string(), unquote_git_path(rest)));
    }

    if line.len() >= 3 && line.as_bytes().get(2) == Some(&b' ') {
        let status = line[..2].to_string();
        let mut fname = &line[3..];
        if let Some(idx) = fname.find(" -> ") {
            fname = &fname[idx + 4..];
        }
        return Some((status, unquote_git_path(fname)));
    }

    None
}

/// Unescape a C-quoted git porcelain path.
///
/// Git quotes paths containing special characters as `"..."` with backslash
/// escapes (including octal escapes for non-ASCII bytes).
fn unquote_git_path(path: &str) -> String {
    let bytes = path.as_bytes();
    if bytes.len() < 2 || bytes[0] != b'"' || bytes[bytes.len() - 1] != b'"' {
        return path.to_string();
    }

    let inner = &bytes[1..bytes.len() - 1];
    let mut out: Vec<u8> = Vec::with_capacity(inner.len());
    let mut i = 0;
    while i < inner.len() {
        let b = inner[i];
        if b != b'\\' || i + 1 >= inner.len() {
            out.push(b);
            i += 1;
            continue;
        }
        i += 1;
        match inner[i] {
            b'n' => out.push(b'\n'),
            b't' => out.push(b'\t'),
            b'r' => out.push(b'\r'),
            b'\\' => out.push(b'\\'),
            b'"' => out.push(b'"'),
            c if c.is_ascii_digit() => {
                // octal escape, up to three digits
                let mut val: u32 = 0;
                let mut digits = 0;
                while digits < 3 && i < inner.len() && inner[i].is_ascii_digit() {
                    val = val * 8 + (inner[i] - b'0') as u32;
                    i += 1;
                    digits += 1;
                }
                out.push(val as u8);
                continue;
            }
            c => out.push(c),
        }
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}
