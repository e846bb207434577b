//! Running index of every map header produced in a run.
//!
//! The index is a sorted JSON array of header identifiers
//! (`/map/<name>.headers.json`) written to `<public>/maps.json`. It is
//! rewritten on every registration, so the file on disk always holds the
//! full set seen so far. It starts empty each run; earlier runs' files are
//! not read back.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::encoding::to_pretty_json;
use crate::sink::{self, write_best_effort, ArtifactKind, ArtifactSink, WriteStatus};

/// Result of registering a header.
#[derive(Debug)]
pub struct IndexUpdate {
    /// Whether the identifier was new to the index.
    pub inserted: bool,
    /// Outcome of persisting the index.
    pub write: WriteStatus,
}

/// Set of header identifiers, persisted after every registration.
///
/// Thread-safe: registrations are serialized, and each one writes a snapshot
/// that contains every earlier one, so the last write always wins correctly.
pub struct HeaderIndex {
    path: PathBuf,
    sink: Arc<dyn ArtifactSink>,
    entries: Mutex<BTreeSet<String>>,
}

impl HeaderIndex {
    /// Create an empty index persisted to `path` through `sink`.
    pub fn new(path: impl Into<PathBuf>, sink: Arc<dyn ArtifactSink>) -> Self {
        Self {
            path: path.into(),
            sink,
            entries: Mutex::new(BTreeSet::new()),
        }
    }

    /// Add a header identifier and persist the whole index.
    ///
    /// A failed write is logged and reported in the returned update; the
    /// identifier stays registered either way.
    pub fn register(&self, id: impl Into<String>) -> IndexUpdate {
        let id = id.into();
        let mut entries = self.entries.lock();
        let inserted = entries.insert(id.clone());

        let write = match to_pretty_json(&*entries) {
            Ok(json) => write_best_effort(self.sink.as_ref(), ArtifactKind::Index, &self.path, &json),
            Err(e) => sink::failed(ArtifactKind::Index, &self.path, e.into()),
        };

        tracing::debug!(
            header = %id,
            inserted = inserted,
            headers = entries.len(),
            "header registered"
        );

        IndexUpdate { inserted, write }
    }

    /// Sorted copy of the current entries.
    pub fn snapshot(&self) -> Vec<String> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Whether `id` has been registered.
    pub fn contains(&self, id: &str) -> bool {
        self.entries.lock().contains(id)
    }

    /// Number of registered headers.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Where the index is persisted.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for HeaderIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeaderIndex")
            .field("path", &self.path)
            .field("entries", &*self.entries.lock())
            .finish()
    }
}
