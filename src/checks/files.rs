//! Changed-file allow-list verification
//!
//! Cross-references the files an automated contributor created, added, or
//! modified against the project's allowed paths and extensions. Deleted files
//! are not policed; a deletion outside the allowed paths is caught by review,
//! not by this gate.

use crate::checks::{path_allowed, CheckError, Finding, IgnoreList};
use crate::core::rules::FileRules;
use crate::git::ChangedFiles;

/// Verify changed files against the allow-list.
///
/// Every created, added, or modified file must fall under an allowed path
/// prefix and carry an allowed extension (when those lists are non-empty).
/// Files matching an `ignored_files` glob are exempt.
pub fn check_files(changed: &ChangedFiles, rules: &FileRules) -> Result<Vec<Finding>, CheckError> {
    let ignore = IgnoreList::compile(&rules.ignored_files)?;
    let mut findings = Vec::new();

    for file in changed.touched() {
        if ignore.is_ignored(&file) {
            continue;
        }

        if !rules.allowed_to_modify.is_empty() && !path_allowed(&file, &rules.allowed_to_modify) {
            findings.push(Finding {
                file: file.clone(),
                line: None,
                rule: rules.allowed_to_modify.join(", "),
                reason: "File is not under any allowed path".into(),
                excerpt: None,
            });
            continue;
        }

        if !rules.allowed_extensions.is_empty()
            && !rules.allowed_extensions.iter().any(|ext| file.ends_with(ext))
        {
            findings.push(Finding {
                file,
                line: None,
                rule: rules.allowed_extensions.join(", "),
                reason: "File does not have an allowed extension".into(),
                excerpt: None,
            });
        }
    }

    Ok(findings)
}
