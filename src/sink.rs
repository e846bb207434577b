//! Best-effort side-channel writes.
//!
//! Headers and the maps index are written next to the primary artifact but
//! are not part of it: a failed write is logged and reported, never returned
//! as an error, and never changes what the pipeline returns.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

/// Destination for artifact files.
///
/// Implementations must be safe to call from several threads at once.
pub trait ArtifactSink: Send + Sync {
    /// Write `contents` to `path`, replacing any existing file.
    fn write(&self, path: &Path, contents: &str) -> io::Result<()>;
}

/// Writes artifacts to the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsSink {
    create_parents: bool,
}

impl FsSink {
    /// Plain writes; the parent directory must already exist.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create missing parent directories before writing.
    pub fn creating_parents() -> Self {
        Self {
            create_parents: true,
        }
    }
}

impl ArtifactSink for FsSink {
    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        if self.create_parents {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, contents)
    }
}

/// In-memory sink for testing.
///
/// Paths passed to [`MemorySink::reject`] fail with `PermissionDenied`.
#[derive(Debug, Default)]
pub struct MemorySink {
    files: Mutex<BTreeMap<PathBuf, String>>,
    rejected: Mutex<BTreeSet<PathBuf>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write to `path` fail.
    pub fn reject(&self, path: impl Into<PathBuf>) {
        self.rejected.lock().insert(path.into());
    }

    /// Contents last written to `path`.
    pub fn read(&self, path: impl AsRef<Path>) -> Option<String> {
        self.files.lock().get(path.as_ref()).cloned()
    }

    /// Number of files held.
    pub fn len(&self) -> usize {
        self.files.lock().len()
    }

    /// Whether nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.files.lock().is_empty()
    }
}

impl ArtifactSink for MemorySink {
    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        if self.rejected.lock().contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("writes to {} are rejected", path.display()),
            ));
        }
        self.files.lock().insert(path.to_path_buf(), contents.to_string());
        Ok(())
    }
}

/// What kind of artifact a write was for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// A sparse map.
    SparseMap,
    /// A map header.
    Header,
    /// The maps index.
    Index,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SparseMap => write!(f, "sparse map"),
            Self::Header => write!(f, "header"),
            Self::Index => write!(f, "maps index"),
        }
    }
}

/// A side-channel write failed.
#[derive(Debug, thiserror::Error)]
#[error("Failed to write {kind} {}: {source}", .path.display())]
pub struct ArtifactWriteFailure {
    /// What was being written.
    pub kind: ArtifactKind,
    /// Where it was being written.
    pub path: PathBuf,
    /// The underlying I/O error.
    #[source]
    pub source: io::Error,
}

/// Outcome of a best-effort write.
#[derive(Debug)]
pub enum WriteStatus {
    /// The file was written.
    Written,
    /// The write failed and was logged.
    Failed(ArtifactWriteFailure),
}

impl WriteStatus {
    /// Whether the write succeeded.
    pub fn is_written(&self) -> bool {
        matches!(self, Self::Written)
    }

    /// The failure, if any.
    pub fn failure(&self) -> Option<&ArtifactWriteFailure> {
        match self {
            Self::Written => None,
            Self::Failed(failure) => Some(failure),
        }
    }
}

/// Write an artifact, logging instead of propagating failures.
pub fn write_best_effort(
    sink: &dyn ArtifactSink,
    kind: ArtifactKind,
    path: &Path,
    contents: &str,
) -> WriteStatus {
    match sink.write(path, contents) {
        Ok(()) => {
            tracing::debug!(kind = %kind, path = %path.display(), bytes = contents.len(), "artifact written");
            WriteStatus::Written
        }
        Err(source) => failed(kind, path, source),
    }
}

/// Record a failed write.
pub(crate) fn failed(kind: ArtifactKind, path: &Path, source: io::Error) -> WriteStatus {
    let failure = ArtifactWriteFailure {
        kind,
        path: path.to_path_buf(),
        source,
    };
    tracing::error!(
        kind = %kind,
        path = %path.display(),
        error = %failure.source,
        "artifact write failed"
    );
    WriteStatus::Failed(failure)
}
