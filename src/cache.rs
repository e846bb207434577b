//! Staleness cache for sparse maps.
//!
//! ## Contract
//!
//! A previously written sparse map is reused when, and only when, its
//! modification time is strictly newer than the source map's:
//!
//! | derived artifact        | outcome                         |
//! |-------------------------|---------------------------------|
//! | missing                 | stale, recompute                |
//! | mtime > source mtime    | fresh, return contents verbatim |
//! | mtime <= source mtime   | stale, recompute                |
//! | stat/read error         | logged, recompute               |
//!
//! No record is kept beyond the filesystem metadata. Probing never fails:
//! every error falls back to recomputing.

use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};

/// Filesystem error while checking a cached artifact.
#[derive(Debug, thiserror::Error)]
pub enum CacheProbeFailure {
    /// Could not read file metadata.
    #[error("Failed to stat {}: {source}", .path.display())]
    Stat {
        /// The file being probed.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Could not read the cached artifact.
    #[error("Failed to read cached artifact {}: {source}", .path.display())]
    Read {
        /// The cached artifact.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// A reusable sparse map.
#[derive(Debug, Clone)]
pub struct CachedArtifact {
    /// The artifact's contents, unchanged.
    pub contents: String,
    /// Seconds the artifact is newer than its source.
    pub age_secs: f64,
    /// When the artifact was written.
    pub modified: DateTime<Utc>,
}

/// Why a cached artifact cannot be reused.
#[derive(Debug)]
pub enum StaleReason {
    /// Nothing has been written for this source yet.
    Missing,
    /// The source is as new as or newer than the artifact, by `age_secs`.
    SourceNewer {
        /// Seconds the source is newer than the artifact (0 when equal).
        age_secs: f64,
    },
    /// Probing failed; the failure has been logged.
    ProbeFailed(CacheProbeFailure),
}

/// Outcome of probing the cache.
#[derive(Debug)]
pub enum CacheProbe {
    /// The artifact is newer than its source.
    Fresh(CachedArtifact),
    /// The artifact must be recomputed.
    Stale(StaleReason),
}

impl CacheProbe {
    /// Whether the probe found a reusable artifact.
    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh(_))
    }
}

/// Decides whether a derived artifact is still valid for its source.
#[derive(Debug, Clone, Copy, Default)]
pub struct StalenessCache;

impl StalenessCache {
    /// Create a new cache.
    pub fn new() -> Self {
        Self
    }

    /// Whether an artifact modified at `derived` is fresh for a source
    /// modified at `source`. Equal timestamps are stale.
    pub fn is_fresh(source: SystemTime, derived: SystemTime) -> bool {
        derived > source
    }

    /// Probe the cached artifact at `derived` for the map at `source`.
    pub fn probe(&self, source: &Path, derived: &Path) -> CacheProbe {
        match self.try_probe(source, derived) {
            Ok(probe) => probe,
            Err(failure) => {
                tracing::warn!(
                    source = %source.display(),
                    derived = %derived.display(),
                    error = %failure,
                    "cache probe failed, recomputing"
                );
                CacheProbe::Stale(StaleReason::ProbeFailed(failure))
            }
        }
    }

    fn try_probe(&self, source: &Path, derived: &Path) -> Result<CacheProbe, CacheProbeFailure> {
        let derived_mtime = match modified(derived) {
            Ok(mtime) => mtime,
            Err(CacheProbeFailure::Stat { source: e, .. }) if e.kind() == io::ErrorKind::NotFound => {
                tracing::info!(path = %source.display(), "Source file is not yet processed, sparsing");
                return Ok(CacheProbe::Stale(StaleReason::Missing));
            }
            Err(e) => return Err(e),
        };
        let source_mtime = modified(source)?;

        let age_secs = signed_secs(derived_mtime, source_mtime);

        if !Self::is_fresh(source_mtime, derived_mtime) {
            tracing::info!(
                path = %source.display(),
                age_secs = %format!("{:.2}", -age_secs),
                "Source file is newer than sparsed, sparsing"
            );
            return Ok(CacheProbe::Stale(StaleReason::SourceNewer { age_secs: -age_secs }));
        }

        let contents = std::fs::read_to_string(derived).map_err(|source| CacheProbeFailure::Read {
            path: derived.to_path_buf(),
            source,
        })?;

        tracing::info!(
            path = %source.display(),
            age_secs = %format!("{:.2}", age_secs),
            "Sparsed file is newer than source, skipping"
        );

        Ok(CacheProbe::Fresh(CachedArtifact {
            contents,
            age_secs,
            modified: DateTime::<Utc>::from(derived_mtime),
        }))
    }
}

fn modified(path: &Path) -> Result<SystemTime, CacheProbeFailure> {
    std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .map_err(|source| CacheProbeFailure::Stat {
            path: path.to_path_buf(),
            source,
        })
}

/// `a - b` in seconds, negative when `b` is later.
fn signed_secs(a: SystemTime, b: SystemTime) -> f64 {
    match a.duration_since(b) {
        Ok(d) => d.as_secs_f64(),
        Err(e) => -e.duration().as_secs_f64(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::Duration;

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn touch(path: &Path, contents: &str, mtime: SystemTime) {
        std::fs::write(path, contents).unwrap();
        File::options().write(true).open(path).unwrap().set_modified(mtime).unwrap();
    }

    #[test]
    fn test_freshness_requires_strictly_newer() {
        assert!(StalenessCache::is_fresh(at(100), at(200)));
        assert!(!StalenessCache::is_fresh(at(200), at(100)));
        assert!(!StalenessCache::is_fresh(at(100), at(100)));
    }

    #[test]
    fn test_sub_second_precision() {
        let source = at(100);
        let derived = source + Duration::from_millis(5);
        assert!(StalenessCache::is_fresh(source, derived));
    }

    #[test]
    fn test_missing_artifact_is_stale() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("forest.json");
        touch(&source, "{}", at(100));

        let probe = StalenessCache::new().probe(&source, &dir.path().join("out.json"));
        assert!(matches!(probe, CacheProbe::Stale(StaleReason::Missing)));
    }

    #[test]
    fn test_newer_artifact_is_returned_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("forest.json");
        let derived = dir.path().join("forest.sparse.json");
        touch(&source, "{\"layers\":[]}", at(100));
        touch(&derived, "cached bytes", at(200));

        match StalenessCache::new().probe(&source, &derived) {
            CacheProbe::Fresh(cached) => {
                assert_eq!(cached.contents, "cached bytes");
                assert!((cached.age_secs - 100.0).abs() < 1e-6);
                assert_eq!(cached.modified.timestamp(), 200);
            }
            other => panic!("expected a cache hit, got {:?}", other),
        }
    }

    #[test]
    fn test_older_artifact_is_stale() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("forest.json");
        let derived = dir.path().join("forest.sparse.json");
        touch(&source, "{}", at(200));
        touch(&derived, "old", at(100));

        match StalenessCache::new().probe(&source, &derived) {
            CacheProbe::Stale(StaleReason::SourceNewer { age_secs }) => {
                assert!((age_secs - 100.0).abs() < 1e-6)
            }
            other => panic!("expected a cache miss, got {:?}", other),
        }
    }

    #[test]
    fn test_equal_mtimes_are_stale() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("forest.json");
        let derived = dir.path().join("forest.sparse.json");
        touch(&source, "{}", at(150));
        touch(&derived, "same", at(150));

        let probe = StalenessCache::new().probe(&source, &derived);
        assert!(matches!(probe, CacheProbe::Stale(StaleReason::SourceNewer { .. })));
    }

    #[test]
    fn test_missing_source_falls_back_to_recompute() {
        let dir = tempfile::tempdir().unwrap();
        let derived = dir.path().join("forest.sparse.json");
        touch(&derived, "orphan", at(200));

        let probe = StalenessCache::new().probe(&dir.path().join("gone.json"), &derived);
        match probe {
            CacheProbe::Stale(StaleReason::ProbeFailed(CacheProbeFailure::Stat { path, .. })) => {
                assert!(path.ends_with("gone.json"))
            }
            other => panic!("expected a probe failure, got {:?}", other),
        }
    }

    #[test]
    fn test_unreadable_artifact_falls_back_to_recompute() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("forest.json");
        let derived = dir.path().join("forest.sparse");
        touch(&source, "{}", at(100));
        // A directory stats fine but cannot be read as a file.
        std::fs::create_dir(&derived).unwrap();

        let probe = StalenessCache::new().probe(&source, &derived);
        assert!(!probe.is_fresh());
    }
}
