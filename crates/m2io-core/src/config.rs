//! Session configuration, loaded from TOML.
//!
//! ```toml
//! use_resolution_cache = true
//!
//! [standards]
//! "Standard1@1.0" = "EBA3iXoZRgnJzu9L1OwR0Ke8bcTQ4B8IeJYFatiXMfh7"
//!
//! [ingest]
//! unknown_attributes = "drop"
//! missing_values = "type_default"
//!
//! [ingest.aliases]
//! "Height (cm)" = "hgt"
//!
//! [transform]
//! unmapped = "null"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use m2io_model::{IngestOptions, TransformOptions};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse TOML config {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid TOML config: {source}")]
    Parse {
        #[source]
        source: toml::de::Error,
    },

    #[error("standard {alias} names an invalid digest {digest:?}")]
    InvalidStandard { alias: String, digest: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Reuse resolved plans for identical `(source, target, spec)` linkages.
    pub use_resolution_cache: bool,
    /// Human aliases for bundles: alias to computed or declared digest.
    pub standards: BTreeMap<String, String>,
    pub ingest: IngestOptions,
    pub transform: TransformOptions,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            use_resolution_cache: true,
            standards: BTreeMap::new(),
            ingest: IngestOptions::default(),
            transform: TransformOptions::default(),
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|source| ConfigError::Parse { source })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }

    #[must_use]
    pub fn with_standard(mut self, alias: impl Into<String>, digest: impl Into<String>) -> Self {
        self.standards.insert(alias.into(), digest.into());
        self
    }

    #[must_use]
    pub fn with_resolution_cache(mut self, enable: bool) -> Self {
        self.use_resolution_cache = enable;
        self
    }

    #[must_use]
    pub fn with_ingest(mut self, options: IngestOptions) -> Self {
        self.ingest = options;
        self
    }

    #[must_use]
    pub fn with_transform(mut self, options: TransformOptions) -> Self {
        self.transform = options;
        self
    }
}
