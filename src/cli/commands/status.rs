//! Status command: show changed files grouped by kind.

use crate::cli::output::{Output, Table};
use crate::git::ChangedFiles;

/// Run the status command.
///
/// Shows a summary table of created/added/modified/deleted files; with
/// `verbose`, lists every file per group.
pub fn run_status(verbose: bool) -> anyhow::Result<i32> {
    let cwd = std::env::current_dir()?;
    let changed = ChangedFiles::collect(&cwd)?;

    if changed.is_empty() {
        Output::info("No changed files");
        return Ok(0);
    }

    let groups: [(&str, &Vec<String>); 4] = [
        ("created", &changed.created),
        ("added", &changed.added),
        ("modified", &changed.modified),
        ("deleted", &changed.deleted),
    ];

    let mut table = Table::new(vec!["Kind", "Count"]);
    for &(kind, files) in &groups {
        let count = files.len().to_string();
        table.add_row(vec![kind, count.as_str()]);
    }
    table.print();

    if verbose {
        for &(kind, files) in &groups {
            if files.is_empty() {
                continue;
            }
            Output::header(kind);
            for file in files {
                Output::list_item(file);
            }
        }
    }

    Ok(0)
}
