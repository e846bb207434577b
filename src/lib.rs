//! # tilemap-sparser
//!
//! Sparse tile maps, map headers and a maps index for JSON tile maps.
//!
//! Tile maps exported as JSON store every tile layer as a dense grid, one
//! tile id per cell, with 0 for empty cells. Large maps are mostly empty, so
//! this crate rewrites each grid as the flat list of its non-empty
//! `(index, tile)` pairs.
//!
//! ## Core Contract
//!
//! 1. Given a source map, replace every tile layer's `data` grid with `sparsed`
//! 2. Derive a header: the map without its layers, plus the sorted object
//!    `types` and the public `map` path
//! 3. Reuse a sparse map from an earlier run when it is newer than its source
//! 4. Keep `maps.json` listing every header produced in the run
//!
//! ## Architecture
//!
//! ```text
//! SourceFile → MapPipeline → PathMapper → HeaderIndex → StalenessCache
//!                                              ↓               ↓
//!                                          maps.json      cached artifact
//!                  → PathFilter → MapDocument → sparsify_map → extract_header
//!                                                     ↓              ↓
//!                                                 Artifact    NAME.headers.json
//! ```
//!
//! ## Guarantees
//!
//! - A tile layer never holds both `data` and `sparsed` after the transform
//! - `types` is sorted ascending and has no duplicates
//! - The index file always holds the sorted set of all headers registered so far
//! - Header and index write failures never change the returned artifact

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod encoding;
pub mod sparsify;
pub mod header;
pub mod cache;
pub mod index;
pub mod paths;
pub mod sink;
pub mod config;
pub mod pipeline;

// Re-exports
pub use types::{
    Layer, LayerKind, TileLayer, ObjectGroup, MapObject, MapDocument,
    MalformedLayerData, DocumentError,
};
pub use sparsify::{sparsify_map, sparsify_layer, sparsify_grid, SparseStats};
pub use header::{collect_types, extract_header, HeaderDocument};
pub use cache::{StalenessCache, CacheProbe, CachedArtifact, StaleReason, CacheProbeFailure};
pub use index::{HeaderIndex, IndexUpdate};
pub use paths::{PathMapper, ArtifactPaths};
pub use sink::{
    ArtifactSink, FsSink, MemorySink, ArtifactKind, ArtifactWriteFailure, WriteStatus,
    write_best_effort,
};
pub use config::{SparserConfig, PipelineMode, PatternSetting, PathFilter, ConfigError};
pub use pipeline::{
    MapPipeline, SourceFile, Artifact, ArtifactOrigin, HeaderOutput, PipelineError,
};

/// Sources matching this are skipped unless they match `include`.
pub const DEFAULT_EXCLUDE_PATTERN: &str = r"app/assets/map/.+\.sparse\.json$";

/// Files the command-line driver picks up by default.
pub const DEFAULT_INPUT_PATTERN: &str = r"app/assets/map/.*\.json$";

/// Default file name of the maps index under the public root.
pub const DEFAULT_INDEX_FILE: &str = "maps.json";

/// Key of this crate's options in a build tool's `plugins` config.
pub const PLUGIN_CONFIG_KEY: &str = "chilidogsparser";
