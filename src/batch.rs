//! Batch orchestrator: applies an ordered list of edits to a snapshot.
//!
//! Edits run strictly in order against an accumulating working copy, so edit
//! *N* sees the output of every earlier edit to the same file. A failing edit
//! is recorded and skipped; it never aborts the rest of the batch.

use crate::apply::{apply_edit_with, planned_hunks, ApplyOptions, ApplyResult, EditError};
use crate::edit::Edit;
use crate::paths;
use crate::snapshot::Snapshot;

/// Outcome of a whole batch.
///
/// `files` holds every successful edit even when other edits failed.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "BatchApplyResult should be checked for errors before committing"]
pub struct BatchApplyResult {
    pub files: Snapshot,
    /// One entry per input edit, in input order.
    pub results: Vec<ApplyResult>,
    pub errors: Vec<EditError>,
}

impl BatchApplyResult {
    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Paths whose content differs between `before` and the batch output.
    pub fn changed_paths<'a>(&'a self, before: &'a Snapshot) -> impl Iterator<Item = &'a str> {
        self.files
            .iter()
            .filter(move |(path, content)| before.get(path) != Some(*content))
            .map(|(path, _)| path)
    }
}

/// Apply `edits` to `snapshot` with default options.
pub fn apply_batch(snapshot: &Snapshot, edits: &[Edit]) -> BatchApplyResult {
    apply_batch_with(snapshot, edits, ApplyOptions::default())
}

/// Apply `edits` to a copy of `snapshot`, in order.
pub fn apply_batch_with(
    snapshot: &Snapshot,
    edits: &[Edit],
    options: ApplyOptions,
) -> BatchApplyResult {
    let mut working = snapshot.clone();
    let mut results = Vec::with_capacity(edits.len());
    let mut errors = Vec::new();

    for (index, edit) in edits.iter().enumerate() {
        let Some(key) = resolve_path(&working, edit.file_path()) else {
            let error = file_not_found(&working, edit.file_path());
            tracing::warn!(index, path = edit.file_path(), "edit target not found");
            errors.push(error.clone());
            results.push(ApplyResult::failed(edit.file_path(), error, planned_hunks(edit)));
            continue;
        };

        let current = working.get(&key).unwrap_or_default();
        let result = apply_edit_with(current, edit, options);

        match &result.outcome {
            Ok(new_content) => working.insert(key, new_content.as_str()),
            Err(error) => {
                tracing::warn!(index, %error, "edit failed");
                errors.push(error.clone());
            }
        }
        results.push(result);
    }

    tracing::debug!(
        edits = edits.len(),
        failed = errors.len(),
        "batch applied"
    );

    BatchApplyResult {
        files: working,
        results,
        errors,
    }
}

/// Snapshot key for `path`: as given first, then with the separator toggled.
fn resolve_path(snapshot: &Snapshot, path: &str) -> Option<String> {
    if snapshot.contains(path) {
        return Some(path.to_string());
    }
    let toggled = paths::toggled(path);
    snapshot.contains(&toggled).then_some(toggled)
}

fn file_not_found(snapshot: &Snapshot, path: &str) -> EditError {
    EditError::FileNotFound {
        path: path.to_string(),
        available: snapshot.paths().map(str::to_string).collect(),
        near_miss: paths::near_miss(path, snapshot.paths()),
    }
}
