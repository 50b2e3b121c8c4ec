//! Git change discovery
//!
//! Wraps `git status --porcelain` / `git ls-files` to classify the files an
//! automated contributor touched. Uses git2 (libgit2 bindings) for repository
//! discovery and the git CLI for porcelain output.

pub mod status;

pub use status::*;

use git2::Repository;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during git operations
#[derive(Error, Debug)]
pub enum GitError {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("Not a git repository: {0}")]
    NotARepo(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

/// Find the repository working directory containing `path`, or `None` when
/// the path is not inside a git repository.
pub fn repo_root<P: AsRef<Path>>(path: P) -> Option<PathBuf> {
    let repo = Repository::discover(path.as_ref()).ok()?;
    repo.workdir().map(Path::to_path_buf)
}

/// Check if a path is inside a git repository
pub fn is_git_repo<P: AsRef<Path>>(path: P) -> bool {
    Repository::discover(path.as_ref()).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_is_git_repo() {
        let temp = TempDir::new().unwrap();
        assert!(!is_git_repo(temp.path()));

        Repository::init(temp.path()).unwrap();
        assert!(is_git_repo(temp.path()));
    }

    #[test]
    fn test_repo_root_from_subdir() {
        let temp = TempDir::new().unwrap();
        Repository::init(temp.path()).unwrap();
        let sub = temp.path().join("a").join("b");
        std::fs::create_dir_all(&sub).unwrap();

        let root = repo_root(&sub).expect("should discover repo");
        assert_eq!(
            root.canonicalize().unwrap(),
            temp.path().canonicalize().unwrap()
        );
    }

    #[test]
    fn test_repo_root_outside_repo() {
        let temp = TempDir::new().unwrap();
        assert!(repo_root(temp.path()).is_none());
    }
}
