//! Patch Timeline: tolerant edit application with linear undo/redo history
//!
//! Applies loosely specified, model-authored edits to an in-memory project
//! snapshot and records every fully successful batch on a navigable timeline.
//!
//! # Architecture
//!
//! Raw edit descriptors flow through four stages:
//!
//! 1. [`Normalizer`] canonicalizes paths, drops edits aimed at the protected
//!    namespace and skips malformed descriptors.
//! 2. [`apply_batch`] applies the edits in order against a working copy of the
//!    [`Snapshot`], collecting one [`ApplyResult`] per edit.
//! 3. [`apply_edit`] locates each search/replace edit (exact first, then
//!    whitespace-tolerant) or applies a unified diff with context matching.
//! 4. [`EditSession`] pushes fully successful batches onto its
//!    [`HistoryTimeline`] and hands them to an optional [`HistorySink`].
//!
//! [`generate_state_diff`] renders the difference between two snapshots.
//!
//! # Guarantees
//!
//! - Snapshots are immutable values; a history entry never observes later edits
//! - Per-edit failures are collected, never thrown
//! - Edits to one file compose in input order
//! - History is per session; there is no process-wide timeline
//!
//! # Example
//!
//! ```
//! use patch_timeline::{EditSession, RawEdit, Snapshot};
//!
//! let snapshot: Snapshot = [("/sketch.js", "function draw(){ background(0); }")]
//!     .into_iter()
//!     .collect();
//! let edits = vec![RawEdit::search_replace("sketch.js", "background(0)", "background(255)")];
//!
//! let mut session = EditSession::default();
//! let outcome = session.apply(&snapshot, &edits, None).unwrap();
//!
//! assert!(outcome.batch.success());
//! assert_eq!(
//!     outcome.batch.files.get("/sketch.js"),
//!     Some("function draw(){ background(255); }")
//! );
//! assert_eq!(session.undo(), Some(snapshot));
//! ```

pub mod apply;
pub mod batch;
pub mod config;
pub mod diff;
pub mod edit;
pub mod history;
pub mod matcher;
pub mod paths;
pub mod persist;
pub mod session;
pub mod snapshot;

// Re-exports
pub use apply::{apply_edit, apply_edit_with, ApplyOptions, ApplyResult, EditError};
pub use batch::{apply_batch, apply_batch_with, BatchApplyResult};
pub use config::{load_from_path, load_from_str, ConfigError, EngineConfig};
pub use diff::generate_state_diff;
pub use edit::{
    normalize, Edit, EditKind, NormalizeError, Normalized, Normalizer, RawEdit, ValidationIssue,
};
pub use history::{HistoryEntry, HistoryTimeline};
pub use matcher::MatchTier;
pub use persist::{HistorySink, JsonlSink, SinkError};
pub use session::{ApplyOutcome, EditSession, PersistHandle};
pub use snapshot::{Snapshot, SnapshotError};
