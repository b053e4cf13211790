//! Patch applier: turns one located edit into new file content.
//!
//! The applier never touches the filesystem. It takes the current text of a
//! file and an [`Edit`], and returns an [`ApplyResult`] carrying either the
//! new text or a typed [`EditError`].

use crate::edit::Edit;
use crate::matcher::{self, MatchTier};
use diffy::Patch;
use serde::Serialize;
use thiserror::Error;

/// Per-edit failures. Collected into a batch result, never thrown.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EditError {
    #[error("File not found: {path} (available: {})", format_available(.available, .near_miss.as_deref()))]
    FileNotFound {
        path: String,
        available: Vec<String>,
        near_miss: Option<String>,
    },

    #[error("Search text not found in {path}")]
    SearchNotFound { path: String },

    #[error("Search or replace text missing for {path}")]
    SearchOrReplaceMissing { path: String },

    #[error("Failed to parse unified diff for {path}: {message}")]
    DiffParse { path: String, message: String },

    #[error("Unified diff does not apply to {path}: {message}")]
    DiffApply { path: String, message: String },
}

impl EditError {
    pub fn path(&self) -> &str {
        match self {
            EditError::FileNotFound { path, .. }
            | EditError::SearchNotFound { path }
            | EditError::SearchOrReplaceMissing { path }
            | EditError::DiffParse { path, .. }
            | EditError::DiffApply { path, .. } => path,
        }
    }
}

fn format_available(available: &[String], near_miss: Option<&str>) -> String {
    if available.is_empty() {
        return "none".to_string();
    }
    available
        .iter()
        .map(|path| {
            if Some(path.as_str()) == near_miss {
                format!("{path} (did you mean this?)")
            } else {
                path.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Outcome of one edit.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "ApplyResult should be checked for success/failure"]
pub struct ApplyResult {
    pub file_path: String,
    pub outcome: Result<String, EditError>,
    pub hunks_applied: usize,
    pub hunks_total: usize,
    /// Matcher tier that located a search/replace edit.
    pub tier: Option<MatchTier>,
}

impl ApplyResult {
    fn applied(file_path: &str, new_content: String, hunks: usize, tier: Option<MatchTier>) -> Self {
        Self {
            file_path: file_path.to_string(),
            outcome: Ok(new_content),
            hunks_applied: hunks,
            hunks_total: hunks,
            tier,
        }
    }

    pub(crate) fn failed(file_path: &str, error: EditError, hunks_total: usize) -> Self {
        Self {
            file_path: file_path.to_string(),
            outcome: Err(error),
            hunks_applied: 0,
            hunks_total,
            tier: None,
        }
    }

    pub fn success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn new_content(&self) -> Option<&str> {
        self.outcome.as_deref().ok()
    }

    pub fn error(&self) -> Option<&EditError> {
        self.outcome.as_ref().err()
    }
}

/// Knobs for the applier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Enable the whitespace-tolerant matcher tier.
    pub whitespace_tolerant: bool,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            whitespace_tolerant: true,
        }
    }
}

/// Apply `edit` to `content` with default options.
pub fn apply_edit(content: &str, edit: &Edit) -> ApplyResult {
    apply_edit_with(content, edit, ApplyOptions::default())
}

/// Apply `edit` to `content`.
pub fn apply_edit_with(content: &str, edit: &Edit, options: ApplyOptions) -> ApplyResult {
    match edit {
        Edit::SearchReplace {
            file_path,
            search,
            replace,
        } => apply_search_replace(content, file_path, search, replace, options),
        Edit::UnifiedDiff {
            file_path,
            diff_text,
        } => apply_unified_diff(content, file_path, diff_text),
    }
}

fn apply_search_replace(
    content: &str,
    file_path: &str,
    search: &str,
    replace: &str,
    options: ApplyOptions,
) -> ApplyResult {
    if search.is_empty() || replace.is_empty() {
        return ApplyResult::failed(
            file_path,
            EditError::SearchOrReplaceMissing {
                path: file_path.to_string(),
            },
            1,
        );
    }

    let Some(located) = matcher::locate(content, search, options.whitespace_tolerant) else {
        return ApplyResult::failed(
            file_path,
            EditError::SearchNotFound {
                path: file_path.to_string(),
            },
            1,
        );
    };

    let mut new_content =
        String::with_capacity(content.len() - located.span.len() + replace.len());
    new_content.push_str(&content[..located.span.start]);
    new_content.push_str(replace);
    new_content.push_str(&content[located.span.end..]);

    tracing::debug!(path = file_path, tier = ?located.tier, "search/replace applied");
    ApplyResult::applied(file_path, new_content, 1, Some(located.tier))
}

fn apply_unified_diff(content: &str, file_path: &str, diff_text: &str) -> ApplyResult {
    // diffy matches context lines literally, so a CRLF file never matches an
    // LF diff. A file that is CRLF throughout is patched in LF and converted
    // back; a file with mixed endings is patched as is.
    let uniform_crlf = is_uniform_crlf(content);
    let content_lf = if uniform_crlf {
        content.replace("\r\n", "\n")
    } else {
        content.to_string()
    };
    let diff_lf = diff_text.replace("\r\n", "\n");

    let patch = match Patch::from_str(&diff_lf) {
        Ok(patch) => patch,
        Err(err) => {
            return ApplyResult::failed(
                file_path,
                EditError::DiffParse {
                    path: file_path.to_string(),
                    message: err.to_string(),
                },
                0,
            );
        }
    };

    let hunks_total = patch.hunks().len();
    if hunks_total == 0 {
        return ApplyResult::failed(
            file_path,
            EditError::DiffParse {
                path: file_path.to_string(),
                message: "diff contains no hunks".to_string(),
            },
            0,
        );
    }

    match diffy::apply(&content_lf, &patch) {
        Ok(patched) => {
            let patched = if uniform_crlf {
                patched.replace('\n', "\r\n")
            } else {
                patched
            };
            tracing::debug!(path = file_path, hunks = hunks_total, "unified diff applied");
            ApplyResult::applied(file_path, patched, hunks_total, None)
        }
        Err(err) => ApplyResult::failed(
            file_path,
            EditError::DiffApply {
                path: file_path.to_string(),
                message: err.to_string(),
            },
            hunks_total,
        ),
    }
}

/// Every line break is `\r\n`, and there is at least one.
fn is_uniform_crlf(content: &str) -> bool {
    let crlf = content.matches("\r\n").count();
    crlf > 0 && crlf == content.matches('\n').count()
}

/// Hunks an edit would apply: one for search/replace, the parsed hunk count
/// for a unified diff (zero when it does not parse).
pub(crate) fn planned_hunks(edit: &Edit) -> usize {
    match edit {
        Edit::SearchReplace { .. } => 1,
        Edit::UnifiedDiff { diff_text, .. } => {
            let diff_lf = diff_text.replace("\r\n", "\n");
            Patch::from_str(&diff_lf).map_or(0, |patch| patch.hunks().len())
        }
    }
}
