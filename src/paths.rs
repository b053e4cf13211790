//! Path conventions for edit targets.
//!
//! Paths arrive from the model with or without a leading `/`. Internally every
//! path carries exactly one leading separator, and lookups fall back to the
//! toggled form before giving up.

/// Reserved namespace that edits may never target.
pub const DEFAULT_PROTECTED_PREFIX: &str = "/.system/";

/// Minimum Jaro-Winkler similarity for a path to be reported as a near miss.
const NEAR_MISS_THRESHOLD: f64 = 0.85;

/// Coerce a path to canonical form: exactly one leading `/`, with empty and
/// `.` segments removed. A path with a `..` segment has no canonical form.
pub fn canonicalize(path: &str) -> Option<String> {
    let mut segments = Vec::new();
    for segment in path.trim().split('/') {
        match segment {
            "" | "." => {}
            ".." => return None,
            segment => segments.push(segment),
        }
    }
    Some(format!("/{}", segments.join("/")))
}

/// The same path with its leading separator removed or added.
pub fn toggled(path: &str) -> String {
    match path.strip_prefix('/') {
        Some(rest) => rest.to_string(),
        None => format!("/{path}"),
    }
}

/// Check whether a canonical path falls under the protected namespace.
///
/// The prefix directory itself is protected too, so `/.system` matches the
/// prefix `/.system/`.
pub fn is_protected(canonical: &str, prefix: &str) -> bool {
    if prefix.is_empty() {
        return false;
    }
    if canonical.starts_with(prefix) {
        return true;
    }
    prefix
        .strip_suffix('/')
        .is_some_and(|dir| canonical == dir)
}

/// Find the available path most similar to `target`, if any is close enough.
pub fn near_miss<'a, I>(target: &str, available: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let comparable = |path: &str| canonicalize(path).unwrap_or_else(|| path.to_string());
    let target = comparable(target);
    available
        .into_iter()
        .map(|candidate| {
            let score = strsim::jaro_winkler(&target, &comparable(candidate));
            (candidate, score)
        })
        .filter(|(_, score)| *score >= NEAR_MISS_THRESHOLD)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(candidate, _)| candidate.to_string())
}
