//! Configuration surface.
//!
//! ## Sources
//!
//! - A JSON file ([`SparserConfig::from_file`]), either flat or nested the way
//!   a build tool's config carries plugin options:
//!
//!   ```json
//!   {
//!     "paths": { "watched": ["app"], "public": "public" },
//!     "plugins": { "chilidogsparser": { "exclude": "\\.raw\\.json$" } }
//!   }
//!   ```
//!
//! - Environment variables ([`SparserConfig::from_env`]):
//!   `SPARSER_MODE`, `SPARSER_INCLUDE`, `SPARSER_EXCLUDE`,
//!   `SPARSER_WATCHED_DIR`, `SPARSER_PUBLIC_DIR`, `SPARSER_INDEX_FILE`,
//!   `SPARSER_INDEX_EXCLUDED`, `SPARSER_PATTERN`.
//!
//! Patterns are regular expressions matched anywhere in the source path.

use std::path::{Path, PathBuf};

use regex_lite::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::paths::PathMapper;
use crate::{DEFAULT_EXCLUDE_PATTERN, DEFAULT_INDEX_FILE, DEFAULT_INPUT_PATTERN, PLUGIN_CONFIG_KEY};

/// Error loading or compiling configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A pattern is not a valid regular expression.
    #[error("Invalid {name} pattern '{pattern}': {source}")]
    InvalidPattern {
        /// Which setting held the pattern.
        name: &'static str,
        /// The offending pattern.
        pattern: String,
        /// The regex error.
        #[source]
        source: regex_lite::Error,
    },
    /// `true` is not a pattern.
    #[error("Invalid {0} setting: expected a pattern or false")]
    PatternToggle(&'static str),
    /// The config file could not be read.
    #[error("Failed to read config file {}: {source}", .path.display())]
    Io {
        /// The config file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The config file is not valid.
    #[error("Invalid config file {}: {source}", .path.display())]
    Parse {
        /// The config file.
        path: PathBuf,
        /// The parse error.
        #[source]
        source: serde_json::Error,
    },
    /// An environment variable has an unusable value.
    #[error("Invalid value for {name}: '{value}'")]
    InvalidEnv {
        /// The variable.
        name: &'static str,
        /// Its value.
        value: String,
    },
}

/// Which parts of the pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineMode {
    /// Sparsify only: no cache, no headers, no maps index.
    Simple,
    /// Sparsify with the staleness cache, headers and the maps index.
    #[default]
    Full,
}

impl std::str::FromStr for PipelineMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simple" => Ok(Self::Simple),
            "full" => Ok(Self::Full),
            _ => Err(()),
        }
    }
}

/// A pattern setting: a regex string, or `false` to leave it unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PatternSetting {
    /// `false` (or `true`, which is rejected when compiled).
    Toggle(bool),
    /// A regular expression.
    Pattern(String),
}

impl PatternSetting {
    /// A pattern setting from a regex string.
    pub fn pattern(pattern: impl Into<String>) -> Self {
        Self::Pattern(pattern.into())
    }

    fn compile(&self, name: &'static str) -> Result<Option<Regex>, ConfigError> {
        match self {
            Self::Toggle(false) => Ok(None),
            Self::Toggle(true) => Err(ConfigError::PatternToggle(name)),
            Self::Pattern(pattern) if pattern.is_empty() => Ok(None),
            Self::Pattern(pattern) => compile(name, pattern).map(Some),
        }
    }

    fn from_env_value(value: &str) -> Self {
        match value.trim() {
            "" | "false" => Self::Toggle(false),
            pattern => Self::Pattern(pattern.to_string()),
        }
    }
}

/// Pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SparserConfig {
    /// Which parts of the pipeline run.
    pub mode: PipelineMode,
    /// Paths matching this are processed even when they match `exclude`.
    #[serde(deserialize_with = "nullable_pattern")]
    pub include: PatternSetting,
    /// Paths matching this (and not `include`) are skipped. Leaving it unset
    /// (`false`, `null` or empty) falls back to the default pattern.
    #[serde(deserialize_with = "nullable_pattern")]
    pub exclude: PatternSetting,
    /// Watched source root; sources live under `<watched_dir>/assets`.
    pub watched_dir: String,
    /// Public output root.
    pub public_dir: String,
    /// File name of the maps index under `public_dir`.
    pub index_file: String,
    /// Register headers of excluded files in the maps index too.
    pub index_excluded: bool,
    /// Which files the command-line driver picks up.
    pub pattern: String,
}

impl Default for SparserConfig {
    fn default() -> Self {
        Self {
            mode: PipelineMode::Full,
            include: PatternSetting::Toggle(false),
            exclude: PatternSetting::pattern(DEFAULT_EXCLUDE_PATTERN),
            watched_dir: "app".to_string(),
            public_dir: "public".to_string(),
            index_file: DEFAULT_INDEX_FILE.to_string(),
            index_excluded: true,
            pattern: DEFAULT_INPUT_PATTERN.to_string(),
        }
    }
}

/// `null` reads as `false`.
fn nullable_pattern<'de, D: Deserializer<'de>>(deserializer: D) -> Result<PatternSetting, D::Error> {
    Ok(Option::<PatternSetting>::deserialize(deserializer)?.unwrap_or(PatternSetting::Toggle(false)))
}

/// Build-tool style config: shared paths plus per-plugin options.
#[derive(Debug, Default, Deserialize)]
struct BuildConfig {
    #[serde(default)]
    paths: BuildPaths,
    #[serde(default)]
    plugins: serde_json::Map<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
struct BuildPaths {
    #[serde(default)]
    watched: Vec<String>,
    #[serde(default)]
    public: Option<String>,
}

impl SparserConfig {
    /// Load from a JSON file, flat or build-tool style.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse from JSON text, flat or build-tool style.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(text)?;
        if value.get("plugins").is_none() {
            return serde_json::from_value(value);
        }

        let build: BuildConfig = serde_json::from_value(value)?;
        let mut config = match build.plugins.get(PLUGIN_CONFIG_KEY) {
            Some(options) => Self::deserialize(options)?,
            None => Self::default(),
        };
        if let Some(watched) = build.paths.watched.into_iter().next() {
            config.watched_dir = watched;
        }
        if let Some(public) = build.paths.public {
            config.public_dir = public;
        }
        Ok(config)
    }

    /// Load from `SPARSER_*` environment variables over the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Load from variables supplied by `lookup` over the defaults.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = lookup("SPARSER_MODE") {
            config.mode = value.parse().map_err(|_| ConfigError::InvalidEnv {
                name: "SPARSER_MODE",
                value,
            })?;
        }
        if let Some(value) = lookup("SPARSER_INCLUDE") {
            config.include = PatternSetting::from_env_value(&value);
        }
        if let Some(value) = lookup("SPARSER_EXCLUDE") {
            config.exclude = PatternSetting::from_env_value(&value);
        }
        if let Some(value) = lookup("SPARSER_WATCHED_DIR") {
            config.watched_dir = value;
        }
        if let Some(value) = lookup("SPARSER_PUBLIC_DIR") {
            config.public_dir = value;
        }
        if let Some(value) = lookup("SPARSER_INDEX_FILE") {
            config.index_file = value;
        }
        if let Some(value) = lookup("SPARSER_INDEX_EXCLUDED") {
            config.index_excluded = match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        name: "SPARSER_INDEX_EXCLUDED",
                        value,
                    })
                }
            };
        }
        if let Some(value) = lookup("SPARSER_PATTERN") {
            config.pattern = value;
        }

        Ok(config)
    }

    /// Compile the include/exclude filter.
    pub fn path_filter(&self) -> Result<PathFilter, ConfigError> {
        let exclude = match self.exclude.compile("exclude")? {
            Some(exclude) => exclude,
            None => compile("exclude", DEFAULT_EXCLUDE_PATTERN)?,
        };

        Ok(PathFilter {
            include: self.include.compile("include")?,
            exclude: Some(exclude),
        })
    }

    /// Compile the command-line driver's input pattern.
    pub fn input_pattern(&self) -> Result<Regex, ConfigError> {
        compile("input", &self.pattern)
    }

    /// Output path derivation for these roots.
    pub fn path_mapper(&self) -> PathMapper {
        PathMapper::new(&self.watched_dir, &self.public_dir)
    }

    /// Where the maps index is written.
    pub fn index_path(&self) -> PathBuf {
        Path::new(&self.public_dir).join(&self.index_file)
    }
}

fn compile(name: &'static str, pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
        name,
        pattern: pattern.to_string(),
        source,
    })
}

/// Decides which source paths are processed.
#[derive(Debug, Clone)]
pub struct PathFilter {
    include: Option<Regex>,
    exclude: Option<Regex>,
}

impl PathFilter {
    /// A filter from already compiled patterns.
    pub fn new(include: Option<Regex>, exclude: Option<Regex>) -> Self {
        Self { include, exclude }
    }

    /// Whether `path` is processed.
    ///
    /// Paths matching `exclude` are skipped unless they also match `include`.
    pub fn admits(&self, path: &str) -> bool {
        match &self.exclude {
            Some(exclude) if exclude.is_match(path) => self
                .include
                .as_ref()
                .map_or(false, |include| include.is_match(path)),
            _ => true,
        }
    }
}
