//! End-to-end workflow tests: raw edits in, snapshots and history out.

use patch_timeline::{
    apply_batch, apply_edit, generate_state_diff, normalize, Edit, EditError, EditSession,
    EngineConfig, HistoryEntry, HistoryTimeline, MatchTier, RawEdit, Snapshot,
};

fn project() -> Snapshot {
    [
        ("/index.html", "<html>\n<script src=\"sketch.js\"></script>\n</html>\n"),
        (
            "/sketch.js",
            "function setup() {\n  createCanvas(400, 400);\n}\n\nfunction draw() {\n  background(0);\n}\n",
        ),
        ("/style.css", "body { margin: 0; }\n"),
    ]
    .into_iter()
    .collect()
}

fn entry(before: &Snapshot, after: &Snapshot, label: &str) -> HistoryEntry {
    HistoryEntry::new(
        vec![Edit::search_replace("/sketch.js", "x", "y")],
        before.clone(),
        after.clone(),
        Some(label.to_string()),
    )
}

#[test]
fn test_scenario_single_search_replace() {
    let content = "function draw(){ background(0); }";
    let edit = Edit::search_replace("/sketch.js", "background(0)", "background(255)");
    let result = apply_edit(content, &edit);

    assert!(result.success());
    assert_eq!(
        result.new_content(),
        Some("function draw(){ background(255); }")
    );
    assert_eq!(result.hunks_applied, 1);
    assert_eq!(result.tier, Some(MatchTier::Exact));
}

#[test]
fn test_scenario_edits_chain_in_order() {
    let before: Snapshot = [("/a.txt", "A")].into_iter().collect();
    let edits = normalize(&[
        RawEdit::search_replace("a.txt", "A", "B"),
        RawEdit::search_replace("a.txt", "B", "C"),
    ])
    .unwrap()
    .edits;

    let result = apply_batch(&before, &edits);
    assert!(result.success());
    assert_eq!(result.files.get("/a.txt"), Some("C"));
}

#[test]
fn test_scenario_eviction_keeps_most_recent() {
    let s0 = project();
    let s1 = s0.with_file("/style.css", "1");
    let s2 = s1.with_file("/style.css", "2");
    let s3 = s2.with_file("/style.css", "3");

    let mut timeline = HistoryTimeline::new(2);
    timeline.push(entry(&s0, &s1, "e1"));
    timeline.push(entry(&s1, &s2, "e2"));
    timeline.push(entry(&s2, &s3, "e3"));

    let labels: Vec<_> = timeline
        .entries()
        .iter()
        .map(|e| e.explanation.as_deref().unwrap_or_default())
        .collect();
    assert_eq!(labels, vec!["e2", "e3"]);
    assert_eq!(timeline.current_index(), Some(1));
}

#[test]
fn test_identical_search_and_replace_is_noop() {
    let content = "let x = 1;\n";
    let result = apply_edit(content, &Edit::search_replace("/a.js", "x = 1", "x = 1"));
    assert!(result.success());
    assert_eq!(result.new_content(), Some(content));
}

#[test]
fn test_missing_files_are_isolated() {
    let before = project();
    let edits = vec![
        Edit::search_replace("/nope.js", "a", "b"),
        Edit::search_replace("/sketch.js", "background(0)", "background(10)"),
        Edit::search_replace("/also-missing.css", "a", "b"),
    ];
    let result = apply_batch(&before, &edits);

    assert_eq!(result.results.len(), 3);
    assert_eq!(result.errors.len(), 2);
    assert!(result
        .errors
        .iter()
        .all(|e| matches!(e, EditError::FileNotFound { .. })));
    assert_eq!(result.files.get("/index.html"), before.get("/index.html"));
    assert_eq!(result.files.get("/style.css"), before.get("/style.css"));
    assert!(result
        .files
        .get("/sketch.js")
        .unwrap()
        .contains("background(10)"));
}

#[test]
fn test_undo_then_redo_restores_current_state() {
    let mut session = EditSession::default();
    let start = project();
    let first = session
        .apply(
            &start,
            &[RawEdit::search_replace("/style.css", "margin: 0", "margin: 4px")],
            None,
        )
        .unwrap();
    let second = session
        .apply(
            &first.batch.files,
            &[RawEdit::search_replace("/style.css", "4px", "8px")],
            None,
        )
        .unwrap();

    let current = session.current_state().cloned();
    assert_eq!(current.as_ref(), Some(&second.batch.files));

    assert_eq!(session.undo(), Some(first.batch.files.clone()));
    assert_eq!(session.redo(), Some(second.batch.files.clone()));
    assert_eq!(session.current_state().cloned(), current);
}

#[test]
fn test_push_after_undo_discards_redo() {
    let mut session = EditSession::default();
    let start = project();
    let first = session
        .apply(
            &start,
            &[RawEdit::search_replace("/style.css", "0", "1px")],
            None,
        )
        .unwrap();
    session.undo();
    assert!(session.can_redo());

    session
        .apply(
            &start,
            &[RawEdit::search_replace("/style.css", "0", "2px")],
            None,
        )
        .unwrap();
    assert!(!session.can_redo());
    assert_eq!(session.timeline().len(), 1);
    assert_ne!(session.current_state(), Some(&first.batch.files));
}

#[test]
fn test_whitespace_tolerant_edit_through_session() {
    let mut session = EditSession::default();
    let raw = vec![RawEdit::search_replace(
        "sketch.js",
        "function draw() { background(0); }",
        "function draw() {\n  background(220);\n}",
    )];
    let outcome = session.apply(&project(), &raw, None).unwrap();

    assert!(outcome.batch.success());
    assert_eq!(
        outcome.batch.results[0].tier,
        Some(MatchTier::WhitespaceTolerant)
    );
    assert!(outcome
        .batch
        .files
        .get("/sketch.js")
        .unwrap()
        .ends_with("function draw() {\n  background(220);\n}\n"));
}

#[test]
fn test_exact_only_config_rejects_reflowed_search() {
    let mut config = EngineConfig::default();
    config.matching.whitespace_tolerant = false;
    let mut session = EditSession::new(&config);

    let raw = vec![RawEdit::search_replace(
        "/sketch.js",
        "function draw() { background(0); }",
        "function draw() {}",
    )];
    let outcome = session.apply(&project(), &raw, None).unwrap();
    assert!(matches!(
        outcome.batch.errors[0],
        EditError::SearchNotFound { .. }
    ));
    assert!(outcome.committed.is_none());
}

#[test]
fn test_mixed_batch_with_unified_diff() {
    let before = project();
    let diff = "--- a/sketch.js\n+++ b/sketch.js\n@@ -5,3 +5,4 @@\n function draw() {\n   background(0);\n+  circle(200, 200, 50);\n }\n";
    let raw = vec![
        RawEdit::search_replace("/sketch.js", "400, 400", "600, 600"),
        RawEdit::unified_diff("/sketch.js", diff),
    ];
    let mut session = EditSession::default();
    let outcome = session.apply(&before, &raw, Some("add a circle".into())).unwrap();

    assert!(outcome.batch.success(), "{:?}", outcome.batch.errors);
    let sketch = outcome.batch.files.get("/sketch.js").unwrap();
    assert!(sketch.contains("createCanvas(600, 600)"));
    assert!(sketch.contains("  circle(200, 200, 50);\n"));
    assert_eq!(outcome.batch.results[1].hunks_applied, 1);

    let entry = session.timeline().current_entry().unwrap();
    assert_eq!(entry.explanation.as_deref(), Some("add a circle"));
    assert_eq!(entry.before_state, before);
    assert_eq!(entry.edits.len(), 2);
}

#[test]
fn test_state_diff_describes_committed_change() {
    let before = project();
    let mut session = EditSession::default();
    let outcome = session
        .apply(
            &before,
            &[RawEdit::search_replace("/style.css", "margin: 0", "margin: 1em")],
            None,
        )
        .unwrap();

    let diff = generate_state_diff(&before, &outcome.batch.files);
    assert!(diff.starts_with("--- a/style.css\n+++ b/style.css\n"));
    assert!(diff.contains("-body { margin: 0; }\n"));
    assert!(diff.contains("+body { margin: 1em; }\n"));
}

#[test]
fn test_history_entries_are_isolated_from_later_edits() {
    let mut session = EditSession::default();
    let start = project();
    let first = session
        .apply(
            &start,
            &[RawEdit::search_replace("/style.css", "0", "1px")],
            None,
        )
        .unwrap();

    let mut mutated = first.batch.files.clone();
    mutated.insert("/style.css", "tampered");

    let committed = &session.timeline().entries()[0];
    assert_eq!(committed.after_state.get("/style.css"), Some("body { margin: 1px; }\n"));
    assert_eq!(committed.before_state, start);
}

#[test]
fn test_malformed_edit_does_not_sink_the_batch() {
    let mut session = EditSession::default();
    let raw = vec![
        RawEdit::search_replace("/style.css", "margin: 0", "margin: 2px"),
        RawEdit::search_replace("/sketch.js", "", "z"),
        RawEdit::search_replace("./.system/runtime.js", "a", "b"),
    ];
    let outcome = session.apply(&project(), &raw, None).unwrap();

    assert!(outcome.batch.success());
    assert_eq!(outcome.batch.results.len(), 1);
    assert_eq!(outcome.skipped.len(), 1);
    assert!(outcome.skipped[0].to_string().contains("edit #1"));
    assert_eq!(
        outcome.batch.files.get("/style.css"),
        Some("body { margin: 2px; }\n")
    );
    assert!(outcome.committed.is_some());
}
