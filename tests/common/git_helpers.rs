//! Git helper utilities for integration tests.
//!
//! Thin wrappers over the `git` CLI for setting up repositories offline.

use std::fs;
use std::path::Path;
use std::process::Command;

/// Initialize a non-bare git repository with user config.
pub fn init_repo(path: &Path) {
    fs::create_dir_all(path).unwrap();
    git(path, &["init", "-b", "main"]);
    git(path, &["config", "user.email", "test@example.com"]);
    git(path, &["config", "user.name", "Test User"]);
}

/// Create a file, stage, and commit it.
pub fn commit_file(repo_path: &Path, filename: &str, content: &str, message: &str) {
    let path = repo_path.join(filename);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
    git(repo_path, &["add", filename]);
    git(repo_path, &["commit", "-m", message]);
}

/// Stage everything and commit.
pub fn commit_all(repo_path: &Path, message: &str) {
    git(repo_path, &["add", "-A"]);
    git(repo_path, &["commit", "-m", message]);
}

/// Stage a single path.
pub fn stage(repo_path: &Path, pathspec: &str) {
    git(repo_path, &["add", pathspec]);
}

/// Run a git command, asserting success.
pub fn git(repo_path: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_path)
        .output()
        .expect("failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}
