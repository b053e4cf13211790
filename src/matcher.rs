//! Locating the target region of a search/replace edit.
//!
//! Two tiers, tried in order:
//!
//! 1. **Exact**: first literal occurrence of the search text.
//! 2. **Whitespace-tolerant**: the search text with every whitespace run
//!    collapsed to one space and both ends trimmed, matched against the
//!    content under the same collapsing. The match is mapped back onto the
//!    original content, so a normalized space consumes a whole whitespace
//!    run (spaces, tabs, newlines) there. The returned span starts at the
//!    first non-whitespace character of the match and ends right after its
//!    last one.
//!
//! A search text that is empty, or whitespace only, never matches in tier 2.

use std::ops::Range;

/// Which tier located a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    Exact,
    WhitespaceTolerant,
}

/// Byte span in the original content plus the tier that found it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    pub span: Range<usize>,
    pub tier: MatchTier,
}

/// Locate `search` inside `content`, exact tier first.
pub fn locate(content: &str, search: &str, whitespace_tolerant: bool) -> Option<Located> {
    if let Some(span) = find_exact(content, search) {
        return Some(Located {
            span,
            tier: MatchTier::Exact,
        });
    }
    if !whitespace_tolerant {
        return None;
    }
    find_whitespace_tolerant(content, search).map(|span| Located {
        span,
        tier: MatchTier::WhitespaceTolerant,
    })
}

/// First literal occurrence of `search`.
pub fn find_exact(content: &str, search: &str) -> Option<Range<usize>> {
    if search.is_empty() {
        return None;
    }
    content
        .find(search)
        .map(|start| start..start + search.len())
}

/// Collapse every whitespace run to one space and trim both ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First whitespace-insensitive occurrence of `search`, in original offsets.
pub fn find_whitespace_tolerant(content: &str, search: &str) -> Option<Range<usize>> {
    let pattern = normalize_whitespace(search);
    let first = pattern.chars().next()?;

    content
        .char_indices()
        .filter(|(_, c)| *c == first)
        .find_map(|(start, _)| match_at(content, start, &pattern).map(|end| start..end))
}

/// Walk `pattern` through `content` from byte `start`.
///
/// Returns the end offset on success. A space in the pattern consumes one or
/// more whitespace characters in the content; anything else must be equal.
fn match_at(content: &str, start: usize, pattern: &str) -> Option<usize> {
    let mut haystack = content[start..].char_indices().peekable();
    let mut end = start;

    for expected in pattern.chars() {
        if expected == ' ' {
            let mut consumed = false;
            while let Some((_, c)) = haystack.peek() {
                if !c.is_whitespace() {
                    break;
                }
                haystack.next();
                consumed = true;
            }
            if !consumed {
                return None;
            }
        } else {
            let (offset, actual) = haystack.next()?;
            if actual != expected {
                return None;
            }
            end = start + offset + actual.len_utf8();
        }
    }

    Some(end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_first_occurrence() {
        let content = "fill(0); fill(0);";
        assert_eq!(find_exact(content, "fill(0)"), Some(0..7));
    }

    #[test]
    fn test_exact_empty_search_never_matches() {
        assert_eq!(find_exact("abc", ""), None);
    }

    #[test]
    fn test_locate_prefers_exact() {
        let located = locate("a  b a b", "a b", true).unwrap();
        assert_eq!(located.tier, MatchTier::Exact);
        assert_eq!(located.span, 5..8);
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  a \t\n b  c "), "a b c");
        assert_eq!(normalize_whitespace(" \n "), "");
    }

    #[test]
    fn test_tolerant_maps_to_original_offsets() {
        let content = "function draw() {\n    background(0);\n}\n";
        let search = "draw() { background(0); }";
        let span = find_whitespace_tolerant(content, search).unwrap();
        assert_eq!(&content[span], "draw() {\n    background(0);\n}");
    }

    #[test]
    fn test_tolerant_trims_search_ends() {
        let content = "x = 1;\ny = 2;";
        let span = find_whitespace_tolerant(content, "\n  y   =  2;  \n").unwrap();
        assert_eq!(&content[span], "y = 2;");
    }

    #[test]
    fn test_tolerant_requires_whitespace_where_search_has_it() {
        assert_eq!(find_whitespace_tolerant("ab", "a b"), None);
    }

    #[test]
    fn test_tolerant_does_not_skip_whitespace_absent_from_search() {
        assert_eq!(find_whitespace_tolerant("a b", "ab"), None);
    }

    #[test]
    fn test_tolerant_retries_later_candidates() {
        let content = "let a = 1;\nlet  b =\t2;";
        let span = find_whitespace_tolerant(content, "let b = 2;").unwrap();
        assert_eq!(&content[span], "let  b =\t2;");
    }

    #[test]
    fn test_tolerant_handles_multibyte() {
        let content = "é  → ü";
        let span = find_whitespace_tolerant(content, "é → ü").unwrap();
        assert_eq!(span, 0..content.len());
    }

    #[test]
    fn test_tolerant_whitespace_only_search() {
        assert_eq!(find_whitespace_tolerant("a b", "   "), None);
    }

    #[test]
    fn test_locate_disabled_tolerance() {
        assert_eq!(locate("a  b", "a b", false), None);
        assert!(locate("a  b", "a b", true).is_some());
    }
}
