//! Immutable, structurally shared file snapshots.
//!
//! A [`Snapshot`] maps a path to the full text of that file. Cloning is an
//! `Arc` bump; mutation through [`Snapshot::insert`] copies the map only when
//! it is shared, and file bodies themselves are never copied. A snapshot held
//! by a history entry therefore cannot observe later edits to a working copy.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use walkdir::WalkDir;
use xxhash_rust::xxh3::Xxh3;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("File I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Snapshot path escapes the target directory: {0}")]
    OutsideRoot(String),
}

#[derive(Clone, Default)]
pub struct Snapshot {
    files: Arc<BTreeMap<String, Arc<str>>>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Content of `path`, looked up exactly as given.
    pub fn get(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(|content| &**content)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// Paths in sorted order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files
            .iter()
            .map(|(path, content)| (path.as_str(), &**content))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Set the content of `path`, copying the path map first if it is shared.
    pub fn insert(&mut self, path: impl Into<String>, content: impl Into<Arc<str>>) {
        Arc::make_mut(&mut self.files).insert(path.into(), content.into());
    }

    /// A new snapshot with `path` set to `content`; `self` is untouched.
    #[must_use]
    pub fn with_file(&self, path: impl Into<String>, content: impl Into<Arc<str>>) -> Self {
        let mut next = self.clone();
        next.insert(path, content);
        next
    }

    /// Whether both snapshots share the same underlying map.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.files, &other.files)
    }

    /// xxh3 digest over the sorted `(path, content)` pairs.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = Xxh3::new();
        for (path, content) in self.iter() {
            hasher.update(&(path.len() as u64).to_le_bytes());
            hasher.update(path.as_bytes());
            hasher.update(&(content.len() as u64).to_le_bytes());
            hasher.update(content.as_bytes());
        }
        hasher.digest()
    }

    /// Load every UTF-8 text file below `root`.
    ///
    /// Keys are root-relative with a leading `/` and `/` separators. Files that
    /// are not valid UTF-8 are skipped, as is any `.git` directory.
    pub fn from_dir(root: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let root = root.as_ref();
        let mut snapshot = Snapshot::new();

        let walker = WalkDir::new(root)
            .into_iter()
            .filter_entry(|entry| entry.file_name() != ".git");

        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(root)
                .map_err(|_| SnapshotError::OutsideRoot(entry.path().display().to_string()))?;
            let key = relative
                .components()
                .filter_map(|component| match component {
                    Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("/");

            let bytes = fs::read(entry.path()).map_err(|source| SnapshotError::Io {
                path: entry.path().to_path_buf(),
                source,
            })?;
            match String::from_utf8(bytes) {
                Ok(text) => snapshot.insert(format!("/{key}"), text),
                Err(_) => {
                    tracing::debug!(path = %entry.path().display(), "skipping non-UTF-8 file");
                }
            }
        }

        Ok(snapshot)
    }

    /// Write every file whose content differs from `baseline` below `root`.
    ///
    /// Returns the snapshot paths that were written.
    pub fn write_changes(
        &self,
        baseline: &Snapshot,
        root: impl AsRef<Path>,
    ) -> Result<Vec<String>, SnapshotError> {
        let root = root.as_ref();
        let mut written = Vec::new();

        for (path, content) in self.iter() {
            if baseline.get(path) == Some(content) {
                continue;
            }
            let target = resolve_under(root, path)?;
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|source| SnapshotError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            atomic_write(&target, content.as_bytes())?;
            written.push(path.to_string());
        }

        Ok(written)
    }
}

/// Map a snapshot key onto a file below `root`, refusing `..` escapes.
fn resolve_under(root: &Path, path: &str) -> Result<PathBuf, SnapshotError> {
    let mut resolved = root.to_path_buf();
    for part in path.split('/').filter(|part| !part.is_empty()) {
        if part == ".." {
            return Err(SnapshotError::OutsideRoot(path.to_string()));
        }
        if part != "." {
            resolved.push(part);
        }
    }
    Ok(resolved)
}

/// Atomic file write: tempfile + fsync + rename.
fn atomic_write(path: &Path, content: &[u8]) -> Result<(), SnapshotError> {
    let io_err = |source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    };
    let parent = path.parent().ok_or_else(|| {
        io_err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "Path has no parent directory",
        ))
    })?;

    let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(io_err)?;
    temp.write_all(content).map_err(io_err)?;
    temp.as_file().sync_all().map_err(io_err)?;
    temp.persist(path).map_err(|e| io_err(e.error))?;

    Ok(())
}

impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.files == other.files
    }
}

impl Eq for Snapshot {}

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V> FromIterator<(K, V)> for Snapshot
where
    K: Into<String>,
    V: Into<Arc<str>>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let files = iter
            .into_iter()
            .map(|(path, content)| (path.into(), content.into()))
            .collect();
        Self {
            files: Arc::new(files),
        }
    }
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

impl<'de> Deserialize<'de> for Snapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let files = BTreeMap::<String, String>::deserialize(deserializer)?;
        Ok(files.into_iter().collect())
    }
}
