//! Unified diff rendering between two snapshots, for audit and debug output.

use crate::snapshot::Snapshot;
use similar::TextDiff;
use std::collections::BTreeSet;

const CONTEXT_RADIUS: usize = 3;

/// Render a unified diff for every path whose content differs.
///
/// Paths are visited in sorted order over the union of both snapshots. A path
/// missing on one side is diffed against `/dev/null`.
pub fn generate_state_diff(before: &Snapshot, after: &Snapshot) -> String {
    let paths: BTreeSet<&str> = before.paths().chain(after.paths()).collect();
    let mut output = String::new();

    for path in paths {
        let old = before.get(path);
        let new = after.get(path);
        if old == new {
            continue;
        }
        output.push_str(&file_diff(path, old, new));
    }

    output
}

/// Unified diff of a single file. `None` marks an absent side.
pub fn file_diff(path: &str, old: Option<&str>, new: Option<&str>) -> String {
    let display = path.trim_start_matches('/');
    let old_header = match old {
        Some(_) => format!("a/{display}"),
        None => "/dev/null".to_string(),
    };
    let new_header = match new {
        Some(_) => format!("b/{display}"),
        None => "/dev/null".to_string(),
    };

    let diff = TextDiff::from_lines(old.unwrap_or(""), new.unwrap_or(""));
    let mut rendered = diff
        .unified_diff()
        .context_radius(CONTEXT_RADIUS)
        .header(&old_header, &new_header)
        .to_string();
    if !rendered.is_empty() && !rendered.ends_with('\n') {
        rendered.push('\n');
    }
    rendered
}
