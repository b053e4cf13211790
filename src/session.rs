//! Per-session edit context.
//!
//! An [`EditSession`] owns one [`HistoryTimeline`] and drives the full flow:
//! normalize raw edits, apply them as a batch, and commit to history only
//! when every edit succeeded. There is no process-wide timeline; callers that
//! share a session across threads wrap it in their own lock.
//!
//! Committed entries go to the session's [`HistorySink`] through one
//! background writer, so records reach the sink in commit order.

use crate::apply::ApplyOptions;
use crate::batch::{apply_batch_with, BatchApplyResult};
use crate::config::EngineConfig;
use crate::edit::{Edit, NormalizeError, Normalizer, RawEdit, ValidationIssue};
use crate::history::{HistoryEntry, HistoryTimeline};
use crate::persist::HistorySink;
use crate::snapshot::Snapshot;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use uuid::Uuid;

/// Handle to a queued persistence write. Dropping it does not cancel the
/// write.
#[derive(Debug)]
pub struct PersistHandle(Receiver<()>);

impl PersistHandle {
    /// Block until the write attempt has finished, successfully or not.
    pub fn wait(self) {
        if self.0.recv().is_err() {
            tracing::warn!("history writer stopped before the write finished");
        }
    }
}

struct PersistJob {
    entry: HistoryEntry,
    done: Sender<()>,
}

/// Single background thread draining a FIFO of entries into the sink.
struct HistoryWriter {
    jobs: Sender<PersistJob>,
}

impl HistoryWriter {
    fn spawn(sink: Arc<dyn HistorySink>) -> Self {
        let (jobs, queue) = mpsc::channel::<PersistJob>();
        std::thread::spawn(move || {
            for job in queue {
                if let Err(err) = sink.persist(&job.entry) {
                    tracing::warn!(id = %job.entry.id, %err, "failed to persist history entry");
                }
                let _ = job.done.send(());
            }
        });
        Self { jobs }
    }

    fn submit(&self, entry: HistoryEntry) -> PersistHandle {
        let (done, finished) = mpsc::channel();
        let id = entry.id;
        if self.jobs.send(PersistJob { entry, done }).is_err() {
            tracing::warn!(%id, "history writer stopped; entry not persisted");
        }
        PersistHandle(finished)
    }
}

/// Outcome of [`EditSession::apply`].
#[derive(Debug)]
#[must_use = "ApplyOutcome carries the batch result"]
pub struct ApplyOutcome {
    pub batch: BatchApplyResult,
    /// Malformed raw edits that were skipped before applying.
    pub skipped: Vec<ValidationIssue>,
    /// Id of the history entry, when the batch was committed.
    pub committed: Option<Uuid>,
    pub persist: Option<PersistHandle>,
}

pub struct EditSession {
    normalizer: Normalizer,
    options: ApplyOptions,
    timeline: HistoryTimeline,
    writer: Option<HistoryWriter>,
}

impl Default for EditSession {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl std::fmt::Debug for EditSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditSession")
            .field("normalizer", &self.normalizer)
            .field("options", &self.options)
            .field("timeline", &self.timeline)
            .field("sink", &self.writer.is_some())
            .finish()
    }
}

impl EditSession {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            normalizer: Normalizer::new(config.paths.protected_prefix.clone()),
            options: ApplyOptions {
                whitespace_tolerant: config.matching.whitespace_tolerant,
            },
            timeline: HistoryTimeline::new(config.history.max_size),
            writer: None,
        }
    }

    /// Persist committed entries to `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn HistorySink>) -> Self {
        self.writer = Some(HistoryWriter::spawn(sink));
        self
    }

    pub fn timeline(&self) -> &HistoryTimeline {
        &self.timeline
    }

    /// Normalize, apply and, on full success, commit a batch of raw edits.
    ///
    /// Only [`NormalizeError`] is returned as an error; per-edit failures are
    /// reported inside the batch result and skipped raw edits in
    /// [`ApplyOutcome::skipped`]. Skipped edits do not prevent a commit.
    pub fn apply(
        &mut self,
        snapshot: &Snapshot,
        raw_edits: &[RawEdit],
        explanation: Option<String>,
    ) -> Result<ApplyOutcome, NormalizeError> {
        let normalized = self.normalizer.normalize(raw_edits)?;
        let mut outcome = self.apply_edits(snapshot, normalized.edits, explanation);
        outcome.skipped = normalized.skipped;
        Ok(outcome)
    }

    /// Apply already normalized edits, committing on full success.
    pub fn apply_edits(
        &mut self,
        snapshot: &Snapshot,
        edits: Vec<Edit>,
        explanation: Option<String>,
    ) -> ApplyOutcome {
        let batch = apply_batch_with(snapshot, &edits, self.options);
        if !batch.success() {
            tracing::info!(
                errors = batch.errors.len(),
                "batch not committed to history"
            );
            return ApplyOutcome {
                batch,
                skipped: Vec::new(),
                committed: None,
                persist: None,
            };
        }

        let entry = HistoryEntry::new(edits, snapshot.clone(), batch.files.clone(), explanation);
        let (id, persist) = self.commit(entry);
        ApplyOutcome {
            batch,
            skipped: Vec::new(),
            committed: Some(id),
            persist,
        }
    }

    /// Push `entry` onto the timeline and hand it to the sink, if any.
    pub fn commit(&mut self, entry: HistoryEntry) -> (Uuid, Option<PersistHandle>) {
        let id = entry.id;
        let persist = self
            .writer
            .as_ref()
            .map(|writer| writer.submit(entry.clone()));
        self.timeline.push(entry);
        tracing::info!(
            %id,
            cursor = ?self.timeline.current_index(),
            entries = self.timeline.len(),
            "history entry committed"
        );
        (id, persist)
    }

    /// Step back; returns the state to restore.
    pub fn undo(&mut self) -> Option<Snapshot> {
        self.timeline.undo().map(|entry| {
            tracing::info!(id = %entry.id, "undo");
            entry.before_state.clone()
        })
    }

    /// Step forward; returns the state to restore.
    pub fn redo(&mut self) -> Option<Snapshot> {
        self.timeline.redo().map(|entry| {
            tracing::info!(id = %entry.id, "redo");
            entry.after_state.clone()
        })
    }

    pub fn current_state(&self) -> Option<&Snapshot> {
        self.timeline.current_state()
    }

    pub fn can_undo(&self) -> bool {
        self.timeline.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.timeline.can_redo()
    }

    pub fn clear(&mut self) {
        self.timeline.clear();
    }
}
