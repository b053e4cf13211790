//! Durable sinks for committed history entries.
//!
//! Persistence is best effort. The in-memory timeline stays authoritative, and
//! callers go through [`crate::session::EditSession`], which logs sink
//! failures instead of returning them.

use crate::history::HistoryEntry;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to encode history entry: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("History sink lock poisoned")]
    Poisoned,
}

/// Receiver for fully formed history entries.
pub trait HistorySink: Send + Sync {
    fn persist(&self, entry: &HistoryEntry) -> Result<(), SinkError>;
}

/// One persisted line: the entry plus digests of both states.
#[derive(Serialize)]
struct HistoryRecord<'a> {
    #[serde(flatten)]
    entry: &'a HistoryEntry,
    before_fingerprint: String,
    after_fingerprint: String,
}

/// Appends one JSON object per entry to a file.
#[derive(Debug)]
pub struct JsonlSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonlSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistorySink for JsonlSink {
    fn persist(&self, entry: &HistoryEntry) -> Result<(), SinkError> {
        let record = HistoryRecord {
            entry,
            before_fingerprint: format!("{:016x}", entry.before_state.fingerprint()),
            after_fingerprint: format!("{:016x}", entry.after_state.fingerprint()),
        };
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let io_err = |source| SinkError::Io {
            path: self.path.clone(),
            source,
        };

        let _guard = self.lock.lock().map_err(|_| SinkError::Poisoned)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_err)?;
        file.write_all(line.as_bytes()).map_err(io_err)?;
        file.sync_data().map_err(io_err)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::Edit;
    use crate::snapshot::Snapshot;

    #[test]
    fn test_jsonl_sink_appends_records() {
        let temp_dir = tempfile::tempdir().unwrap();
        let sink = JsonlSink::new(temp_dir.path().join("history/log.jsonl"));

        let before: Snapshot = [("/a.txt", "A")].into_iter().collect();
        let after = before.with_file("/a.txt", "B");
        let entry = HistoryEntry::new(
            vec![Edit::search_replace("/a.txt", "A", "B")],
            before,
            after,
            Some("swap".to_string()),
        );

        sink.persist(&entry).unwrap();
        sink.persist(&entry).unwrap();

        let contents = fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(value["id"], entry.id.to_string());
        assert_eq!(value["explanation"], "swap");
        assert_eq!(value["after_state"]["/a.txt"], "B");
        assert_eq!(value["edits"][0]["kind"], "search_replace");
        assert_eq!(
            value["after_fingerprint"],
            format!("{:016x}", entry.after_state.fingerprint())
        );
    }
}
