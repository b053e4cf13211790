//! Linear undo/redo history of committed batches.
//!
//! The timeline is a flat vector plus a cursor. `None` means there is no
//! current state (empty timeline, or everything undone). Pushing after an
//! undo discards the redo branch; pushing past `max_size` evicts the oldest
//! entries and shifts the cursor down with them.

use crate::edit::Edit;
use crate::snapshot::Snapshot;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

pub const DEFAULT_MAX_SIZE: usize = 50;

/// One committed batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub edits: Vec<Edit>,
    pub before_state: Snapshot,
    pub after_state: Snapshot,
    pub explanation: Option<String>,
}

impl HistoryEntry {
    pub fn new(
        edits: Vec<Edit>,
        before_state: Snapshot,
        after_state: Snapshot,
        explanation: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            edits,
            before_state,
            after_state,
            explanation,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HistoryTimeline {
    entries: Vec<HistoryEntry>,
    cursor: Option<usize>,
    max_size: usize,
}

impl Default for HistoryTimeline {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SIZE)
    }
}

impl HistoryTimeline {
    /// Create an empty timeline. A `max_size` of zero is treated as one.
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: Vec::new(),
            cursor: None,
            max_size: max_size.max(1),
        }
    }

    pub fn push(&mut self, entry: HistoryEntry) {
        let keep = self.cursor.map_or(0, |cursor| cursor + 1);
        self.entries.truncate(keep);
        self.entries.push(entry);

        let overflow = self.entries.len().saturating_sub(self.max_size);
        if overflow > 0 {
            self.entries.drain(..overflow);
        }
        self.cursor = Some(self.entries.len() - 1);
    }

    /// Step back one entry. The returned entry's `before_state` is the new
    /// current state.
    pub fn undo(&mut self) -> Option<&HistoryEntry> {
        let cursor = self.cursor?;
        self.cursor = cursor.checked_sub(1);
        self.entries.get(cursor)
    }

    /// Step forward one entry. The returned entry's `after_state` is the new
    /// current state.
    pub fn redo(&mut self) -> Option<&HistoryEntry> {
        if !self.can_redo() {
            return None;
        }
        let next = self.cursor.map_or(0, |cursor| cursor + 1);
        self.cursor = Some(next);
        self.entries.get(next)
    }

    pub fn can_undo(&self) -> bool {
        self.cursor.is_some()
    }

    pub fn can_redo(&self) -> bool {
        let next = self.cursor.map_or(0, |cursor| cursor + 1);
        next < self.entries.len()
    }

    /// `after_state` of the entry under the cursor.
    pub fn current_state(&self) -> Option<&Snapshot> {
        self.current_entry().map(|entry| &entry.after_state)
    }

    pub fn current_entry(&self) -> Option<&HistoryEntry> {
        self.cursor.and_then(|cursor| self.entries.get(cursor))
    }

    pub fn current_index(&self) -> Option<usize> {
        self.cursor
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = None;
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }
}
