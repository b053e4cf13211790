//! Edit descriptors and the normalizer that validates them.
//!
//! [`RawEdit`] is the loose wire shape produced by the model: every field is
//! optional and the kind is a free-form string. [`Normalizer::normalize`]
//! turns a list of raw descriptors into validated [`Edit`]s with canonical
//! paths. Edits aimed at the protected namespace are dropped silently;
//! malformed ones are skipped and reported, and the rest still run.

use crate::paths;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// One proposed change to one file, as emitted by the model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEdit {
    #[serde(default, alias = "type")]
    pub kind: String,
    #[serde(default, alias = "file_path", alias = "path")]
    pub file_path: String,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub replace: Option<String>,
    #[serde(default, alias = "diff_text", alias = "diff")]
    pub diff_text: Option<String>,
}

impl RawEdit {
    pub fn search_replace(
        file_path: impl Into<String>,
        search: impl Into<String>,
        replace: impl Into<String>,
    ) -> Self {
        Self {
            kind: "search_replace".to_string(),
            file_path: file_path.into(),
            search: Some(search.into()),
            replace: Some(replace.into()),
            diff_text: None,
        }
    }

    pub fn unified_diff(file_path: impl Into<String>, diff_text: impl Into<String>) -> Self {
        Self {
            kind: "unified_diff".to_string(),
            file_path: file_path.into(),
            search: None,
            replace: None,
            diff_text: Some(diff_text.into()),
        }
    }

    /// Wrap raw unified-diff text, taking the target from its file headers.
    ///
    /// The `+++` header wins unless it is `/dev/null`, in which case `---` is
    /// used. `a/` and `b/` prefixes and tab-separated timestamps are stripped.
    pub fn from_diff_text(diff_text: &str) -> Option<Self> {
        let header_path = |marker: &str| {
            diff_text
                .lines()
                .find_map(|line| line.strip_prefix(marker))
                .map(|rest| rest.split('\t').next().unwrap_or(rest).trim())
                .filter(|path| !path.is_empty() && *path != "/dev/null")
        };
        let path = header_path("+++ ").or_else(|| header_path("--- "))?;
        let path = path
            .strip_prefix("b/")
            .or_else(|| path.strip_prefix("a/"))
            .unwrap_or(path);
        Some(Self::unified_diff(path, diff_text))
    }
}

/// Recognised edit kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKind {
    SearchReplace,
    UnifiedDiff,
}

impl EditKind {
    /// Parse a kind string, ignoring case and `_`/`-` separators.
    pub fn parse(kind: &str) -> Option<Self> {
        let folded: String = kind
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();
        match folded.as_str() {
            "searchreplace" => Some(EditKind::SearchReplace),
            "unifieddiff" | "diff" => Some(EditKind::UnifiedDiff),
            _ => None,
        }
    }
}

impl fmt::Display for EditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditKind::SearchReplace => write!(f, "search_replace"),
            EditKind::UnifiedDiff => write!(f, "unified_diff"),
        }
    }
}

/// A validated edit with a canonical target path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Edit {
    SearchReplace {
        file_path: String,
        search: String,
        replace: String,
    },
    UnifiedDiff {
        file_path: String,
        diff_text: String,
    },
}

impl Edit {
    pub fn search_replace(
        file_path: impl Into<String>,
        search: impl Into<String>,
        replace: impl Into<String>,
    ) -> Self {
        Edit::SearchReplace {
            file_path: file_path.into(),
            search: search.into(),
            replace: replace.into(),
        }
    }

    pub fn unified_diff(file_path: impl Into<String>, diff_text: impl Into<String>) -> Self {
        Edit::UnifiedDiff {
            file_path: file_path.into(),
            diff_text: diff_text.into(),
        }
    }

    pub fn file_path(&self) -> &str {
        match self {
            Edit::SearchReplace { file_path, .. } | Edit::UnifiedDiff { file_path, .. } => {
                file_path
            }
        }
    }

    pub fn kind(&self) -> EditKind {
        match self {
            Edit::SearchReplace { .. } => EditKind::SearchReplace,
            Edit::UnifiedDiff { .. } => EditKind::UnifiedDiff,
        }
    }
}

/// A raw edit that could not be turned into an [`Edit`]. The edit is skipped;
/// the rest of the batch still runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum ValidationIssue {
    /// The descriptor's kind is not one this engine can apply.
    UnknownKind { index: usize, kind: String },
    MissingField { index: usize, field: &'static str },
    /// The path climbs out of the project with a `..` segment.
    InvalidPath { index: usize, path: String },
}

impl ValidationIssue {
    /// Position of the offending edit in the raw input.
    pub fn index(&self) -> usize {
        match self {
            ValidationIssue::UnknownKind { index, .. }
            | ValidationIssue::MissingField { index, .. }
            | ValidationIssue::InvalidPath { index, .. } => *index,
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::UnknownKind { index, kind } => {
                write!(f, "edit #{index} has unknown kind '{kind}'")
            }
            ValidationIssue::MissingField { index, field } => {
                write!(f, "edit #{index} missing required field '{field}'")
            }
            ValidationIssue::InvalidPath { index, path } => {
                write!(f, "edit #{index} path '{path}' escapes the project root")
            }
        }
    }
}

/// Edits that survived normalization, plus the ones that were skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub edits: Vec<Edit>,
    pub skipped: Vec<ValidationIssue>,
}

/// The only whole-batch rejection: nothing is left to apply.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("no valid edits remain after filtering{}", format_skipped(.skipped))]
    NoValidEdits { skipped: Vec<ValidationIssue> },
}

fn format_skipped(skipped: &[ValidationIssue]) -> String {
    if skipped.is_empty() {
        return String::new();
    }
    let issues: Vec<String> = skipped.iter().map(ToString::to_string).collect();
    format!(": {}", issues.join("; "))
}

/// Validates raw edits and canonicalizes their paths.
#[derive(Debug, Clone)]
pub struct Normalizer {
    protected_prefix: String,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(paths::DEFAULT_PROTECTED_PREFIX)
    }
}

impl Normalizer {
    pub fn new(protected_prefix: impl Into<String>) -> Self {
        Self {
            protected_prefix: protected_prefix.into(),
        }
    }

    pub fn protected_prefix(&self) -> &str {
        &self.protected_prefix
    }

    /// Validate and canonicalize a batch of raw edits.
    ///
    /// Edits under the protected prefix are dropped silently. Malformed edits
    /// are dropped with a [`ValidationIssue`] each, reported in
    /// [`Normalized::skipped`]. The batch is rejected only when no edit
    /// survives.
    pub fn normalize(&self, raw_edits: &[RawEdit]) -> Result<Normalized, NormalizeError> {
        let mut edits = Vec::with_capacity(raw_edits.len());
        let mut skipped = Vec::new();

        for (index, raw) in raw_edits.iter().enumerate() {
            match self.normalize_one(index, raw) {
                Ok(Some(edit)) => edits.push(edit),
                Ok(None) => {}
                Err(issues) => {
                    for issue in &issues {
                        tracing::warn!(%issue, "skipping malformed edit");
                    }
                    skipped.extend(issues);
                }
            }
        }

        if edits.is_empty() {
            return Err(NormalizeError::NoValidEdits { skipped });
        }
        Ok(Normalized { edits, skipped })
    }

    /// `Ok(None)` means the edit targets the protected namespace.
    fn normalize_one(
        &self,
        index: usize,
        raw: &RawEdit,
    ) -> Result<Option<Edit>, Vec<ValidationIssue>> {
        let mut issues = Vec::new();

        let canonical = if raw.file_path.trim().is_empty() {
            issues.push(ValidationIssue::MissingField {
                index,
                field: "filePath",
            });
            None
        } else {
            match paths::canonicalize(&raw.file_path) {
                Some(path) => Some(path),
                None => {
                    issues.push(ValidationIssue::InvalidPath {
                        index,
                        path: raw.file_path.clone(),
                    });
                    None
                }
            }
        };

        if let Some(path) = &canonical {
            if paths::is_protected(path, &self.protected_prefix) {
                tracing::debug!(index, path = %path, "dropping edit to protected path");
                return Ok(None);
            }
        }

        let edit = match EditKind::parse(&raw.kind) {
            Some(EditKind::SearchReplace) => {
                let search = non_empty(&raw.search);
                let replace = non_empty(&raw.replace);
                if search.is_none() {
                    issues.push(ValidationIssue::MissingField {
                        index,
                        field: "search",
                    });
                }
                if replace.is_none() {
                    issues.push(ValidationIssue::MissingField {
                        index,
                        field: "replace",
                    });
                }
                match (&canonical, search, replace) {
                    (Some(path), Some(search), Some(replace)) => {
                        Some(Edit::search_replace(path.as_str(), search, replace))
                    }
                    _ => None,
                }
            }
            Some(EditKind::UnifiedDiff) => {
                let diff_text = non_empty(&raw.diff_text);
                if diff_text.is_none() {
                    issues.push(ValidationIssue::MissingField {
                        index,
                        field: "diffText",
                    });
                }
                match (&canonical, diff_text) {
                    (Some(path), Some(diff_text)) => {
                        Some(Edit::unified_diff(path.as_str(), diff_text))
                    }
                    _ => None,
                }
            }
            None => {
                issues.push(ValidationIssue::UnknownKind {
                    index,
                    kind: raw.kind.clone(),
                });
                None
            }
        };

        match edit {
            Some(edit) if issues.is_empty() => Ok(Some(edit)),
            _ => Err(issues),
        }
    }
}

/// Normalize with the default protected prefix.
pub fn normalize(raw_edits: &[RawEdit]) -> Result<Normalized, NormalizeError> {
    Normalizer::default().normalize(raw_edits)
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
