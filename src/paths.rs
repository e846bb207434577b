//! Output path derivation.
//!
//! ```text
//! <watched>/assets/map/forest.json
//!   sparse map  -> <public>/map/forest.json
//!   header      -> <public>/map/forest.headers.json
//!   header id   -> /map/forest.headers.json   (maps index entry)
//!   map url     -> /map/forest.json           (header `map` field)
//! ```

use std::path::{Path, PathBuf};

/// Public URL prefix of maps and headers.
pub const MAP_URL_PREFIX: &str = "/map/";

/// Extension of source and sparse maps.
pub const MAP_EXTENSION: &str = ".json";

/// Extension of header documents.
pub const HEADER_EXTENSION: &str = ".headers.json";

/// Subdirectory of the watched root whose contents are published.
pub const ASSETS_DIR: &str = "assets";

/// Everything derived from one source path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    /// Where the sparse map is published.
    pub sparsed: PathBuf,
    /// Where the header is written.
    pub header: PathBuf,
    /// Identifier of the header in the maps index.
    pub header_id: String,
    /// Public path of the sparse map, stored in the header.
    pub map_url: String,
}

impl ArtifactPaths {
    /// Whether publishing the sparse map would replace `source` itself,
    /// as happens for sources outside the watched assets.
    pub fn overwrites_source(&self, source: &str) -> bool {
        self.sparsed == Path::new(source)
    }
}

/// Maps source paths under the watched assets directory to public paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMapper {
    watched_assets: String,
    public_dir: String,
}

impl PathMapper {
    /// Create a mapper from the watched root and the public root.
    pub fn new(watched_dir: &str, public_dir: &str) -> Self {
        Self {
            watched_assets: format!("{}/{}", watched_dir.trim_end_matches('/'), ASSETS_DIR),
            public_dir: public_dir.trim_end_matches('/').to_string(),
        }
    }

    /// Derive all output paths for `source`.
    ///
    /// The first occurrence of `<watched>/assets` is replaced by the public
    /// root. A path outside the watched assets is left as it is.
    pub fn derive(&self, source: &str) -> ArtifactPaths {
        let sparsed = source.replacen(&self.watched_assets, &self.public_dir, 1);
        // Other extensions are kept, so the header never lands on the sparse map.
        let stem = sparsed.strip_suffix(MAP_EXTENSION).unwrap_or(sparsed.as_str());
        let header = format!("{}{}", stem, HEADER_EXTENSION);

        ArtifactPaths {
            header_id: public_url(&header),
            map_url: public_url(source),
            sparsed: PathBuf::from(sparsed),
            header: PathBuf::from(header),
        }
    }
}

/// `/map/<file name>` for a path.
fn public_url(path: &str) -> String {
    let name = Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy())
        .unwrap_or_default();
    format!("{}{}", MAP_URL_PREFIX, name)
}
