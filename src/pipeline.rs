//! Per-file pipeline: paths, index, cache, filter, sparsify, header.
//!
//! ## Flow (full mode)
//!
//! ```text
//! source ─► derive paths ─► register header id ─► cache probe ──fresh──► cached artifact
//!                                                     │
//!                                                   stale
//!                                                     ▼
//!                        skip ◄──excluded── include/exclude filter
//!                                                     │
//!                                                     ▼
//!            passthrough ◄──no layers── parse ─► sparsify ─► header write ─► artifact
//! ```
//!
//! Simple mode runs only the filter, parse and sparsify steps.
//!
//! Parse and transform errors fail the one file. Header and index writes are
//! best-effort: their failures are logged and reported on the artifact, and
//! never change its data.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cache::{CacheProbe, StalenessCache};
use crate::config::{ConfigError, PathFilter, PipelineMode, SparserConfig};
use crate::encoding::to_compact_json;
use crate::header::extract_header;
use crate::index::HeaderIndex;
use crate::paths::{ArtifactPaths, PathMapper};
use crate::sink::{write_best_effort, ArtifactKind, ArtifactSink, WriteStatus};
use crate::sparsify::{sparsify_map, SparseStats};
use crate::types::{DocumentError, MalformedLayerData, MapDocument};

/// Error processing one file.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The source is not a readable map document.
    #[error("Invalid map document {path}: {source}")]
    InvalidMapDocument {
        /// The source path.
        path: String,
        /// What was wrong with it.
        #[source]
        source: DocumentError,
    },
    /// A layer could not be transformed.
    #[error(transparent)]
    MalformedLayerData(#[from] MalformedLayerData),
    /// The result could not be serialized.
    #[error("Failed to encode {path}: {source}")]
    Encode {
        /// The source path.
        path: String,
        /// The serialization error.
        #[source]
        source: serde_json::Error,
    },
}

/// One input file, as handed over by the build tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Source path.
    pub path: String,
    /// Raw file contents.
    pub data: String,
}

impl SourceFile {
    /// Create a source file.
    pub fn new(path: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            data: data.into(),
        }
    }
}

/// Where an artifact's data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactOrigin {
    /// A fresh sparse map from an earlier run, returned verbatim.
    Cached,
    /// Sparsified in this call.
    Sparsed,
    /// The source had no layers and was returned unchanged.
    Passthrough,
}

/// The header written alongside an artifact.
#[derive(Debug)]
pub struct HeaderOutput {
    /// Where it was written.
    pub path: PathBuf,
    /// Size of the header in bytes.
    pub bytes: usize,
    /// Outcome of the write.
    pub write: WriteStatus,
}

/// A processed file.
#[derive(Debug)]
pub struct Artifact {
    /// The source path the artifact was produced from.
    pub path: String,
    /// Output contents.
    pub data: String,
    /// Where the data came from.
    pub origin: ArtifactOrigin,
    /// Sparsify counts, for sparsified artifacts.
    pub stats: Option<SparseStats>,
    /// The header side-write, in full mode.
    pub header: Option<HeaderOutput>,
}

enum Stage {
    Simple,
    Full {
        cache: StalenessCache,
        index: Arc<HeaderIndex>,
        sink: Arc<dyn ArtifactSink>,
        index_excluded: bool,
    },
}

/// Turns source maps into sparse maps, and in full mode headers and an index.
///
/// Shareable across threads; each call to [`MapPipeline::process`] is
/// independent apart from the shared [`HeaderIndex`].
pub struct MapPipeline {
    filter: PathFilter,
    mapper: PathMapper,
    stage: Stage,
}

impl MapPipeline {
    /// A simple-mode pipeline: no cache, no headers, no index.
    pub fn simple(config: &SparserConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            filter: config.path_filter()?,
            mapper: config.path_mapper(),
            stage: Stage::Simple,
        })
    }

    /// A full-mode pipeline registering headers into `index` and writing
    /// them through `sink`.
    pub fn full(
        config: &SparserConfig,
        index: Arc<HeaderIndex>,
        sink: Arc<dyn ArtifactSink>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            filter: config.path_filter()?,
            mapper: config.path_mapper(),
            stage: Stage::Full {
                cache: StalenessCache::new(),
                index,
                sink,
                index_excluded: config.index_excluded,
            },
        })
    }

    /// A pipeline for `config.mode`, with a fresh index at
    /// [`SparserConfig::index_path`] in full mode.
    pub fn from_config(
        config: &SparserConfig,
        sink: Arc<dyn ArtifactSink>,
    ) -> Result<Self, ConfigError> {
        match config.mode {
            PipelineMode::Simple => Self::simple(config),
            PipelineMode::Full => {
                let index = Arc::new(HeaderIndex::new(config.index_path(), Arc::clone(&sink)));
                Self::full(config, index, sink)
            }
        }
    }

    /// The run's header index, in full mode.
    pub fn index(&self) -> Option<&Arc<HeaderIndex>> {
        match &self.stage {
            Stage::Simple => None,
            Stage::Full { index, .. } => Some(index),
        }
    }

    /// Output paths for a source path.
    pub fn paths(&self, source: &str) -> ArtifactPaths {
        self.mapper.derive(source)
    }

    /// Process one file.
    ///
    /// Returns `Ok(None)` when the file is excluded and produces no output.
    pub fn process(&self, file: &SourceFile) -> Result<Option<Artifact>, PipelineError> {
        let paths = self.mapper.derive(&file.path);
        let admitted = self.filter.admits(&file.path);

        if let Stage::Full {
            cache,
            index,
            index_excluded,
            ..
        } = &self.stage
        {
            if admitted || *index_excluded {
                index.register(paths.header_id.as_str());
            }

            if let CacheProbe::Fresh(cached) = cache.probe(Path::new(&file.path), &paths.sparsed) {
                return Ok(Some(Artifact {
                    path: file.path.clone(),
                    data: cached.contents,
                    origin: ArtifactOrigin::Cached,
                    stats: None,
                    header: None,
                }));
            }

            tracing::info!(path = %file.path, sparsed_path = %paths.sparsed.display(), "Sparsing");
        }

        if !admitted {
            tracing::debug!(path = %file.path, "excluded, skipping");
            return Ok(None);
        }

        let parsed = MapDocument::parse(&file.data).map_err(|source| {
            PipelineError::InvalidMapDocument {
                path: file.path.clone(),
                source,
            }
        })?;
        let Some(mut doc) = parsed else {
            tracing::debug!(path = %file.path, "no layers, passing through");
            return Ok(Some(Artifact {
                path: file.path.clone(),
                data: file.data.clone(),
                origin: ArtifactOrigin::Passthrough,
                stats: None,
                header: None,
            }));
        };

        let stats = sparsify_map(&mut doc)?;
        let data = to_compact_json(&doc).map_err(|source| self.encode_error(file, source))?;

        tracing::info!(
            path = %file.path,
            original_mb = %megabytes(file.data.len()),
            sparsed_mb = %megabytes(data.len()),
            layers = stats.layers_sparsified,
            tiles = stats.tiles_kept,
            "sparsed"
        );

        let header = match &self.stage {
            Stage::Simple => None,
            Stage::Full { sink, .. } => {
                Some(self.write_header(file, doc, &paths, sink.as_ref())?)
            }
        };

        Ok(Some(Artifact {
            path: file.path.clone(),
            data,
            origin: ArtifactOrigin::Sparsed,
            stats: Some(stats),
            header,
        }))
    }

    fn write_header(
        &self,
        file: &SourceFile,
        doc: MapDocument,
        paths: &ArtifactPaths,
        sink: &dyn ArtifactSink,
    ) -> Result<HeaderOutput, PipelineError> {
        let header = extract_header(doc, paths.map_url.as_str())?;
        let json = header.to_json().map_err(|source| self.encode_error(file, source))?;

        tracing::info!(
            path = %file.path,
            original_mb = %megabytes(file.data.len()),
            header_kb = %format!("{:.3}", json.len() as f64 / 1024.0),
            types = header.types().len(),
            "headers"
        );

        let write = write_best_effort(sink, ArtifactKind::Header, &paths.header, &json);

        Ok(HeaderOutput {
            path: paths.header.clone(),
            bytes: json.len(),
            write,
        })
    }

    fn encode_error(&self, file: &SourceFile, source: serde_json::Error) -> PipelineError {
        PipelineError::Encode {
            path: file.path.clone(),
            source,
        }
    }
}

fn megabytes(bytes: usize) -> String {
    format!("{:.3}", bytes as f64 / (1024.0 * 1024.0))
}
