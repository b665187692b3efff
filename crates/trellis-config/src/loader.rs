//! Layered loading of the base and local configuration sources.

use std::fs;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

use crate::node::{ConfigMergeError, ConfigNode};

/// Errors raised while reading a single configuration source.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    /// The source could not be read from disk.
    #[error("failed to read configuration source '{path}': {source}")]
    Read {
        /// Path of the source.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The source is not a valid TOML document.
    #[error("failed to parse configuration source '{path}': {source}")]
    Parse {
        /// Path of the source.
        path: Utf8PathBuf,
        /// Underlying parser error.
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigLoadError {
    /// Path of the source that failed to load.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        match self {
            Self::Read { path, .. } | Self::Parse { path, .. } => path.as_path(),
        }
    }
}

/// Errors surfaced by [`load`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// One of the sources could not be loaded.
    #[error(transparent)]
    Load(#[from] ConfigLoadError),
    /// The sources could not be merged.
    #[error("failed to merge configuration: {0}")]
    Merge(#[from] ConfigMergeError),
}

/// Pair of configuration sources merged at bootstrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSources {
    /// Base configuration shared by every deployment.
    pub base: Utf8PathBuf,
    /// Local override applied on top of the base.
    pub local: Utf8PathBuf,
}

impl ConfigSources {
    /// Builds a source pair.
    #[must_use]
    pub fn new(base: impl Into<Utf8PathBuf>, local: impl Into<Utf8PathBuf>) -> Self {
        Self {
            base: base.into(),
            local: local.into(),
        }
    }

    /// Loads and merges both sources.
    ///
    /// # Errors
    ///
    /// See [`load`].
    pub fn load(&self) -> Result<ConfigNode, ConfigError> {
        load(&self.base, &self.local)
    }
}

impl Default for ConfigSources {
    fn default() -> Self {
        Self::new(
            crate::defaults::DEFAULT_CONFIG_PATH,
            crate::defaults::DEFAULT_LOCAL_CONFIG_PATH,
        )
    }
}

/// Loads `base` and `local`, then overlays `local` on `base`.
///
/// Both sources must exist and parse; a missing local override is an error
/// like any other unreadable source.
///
/// # Errors
///
/// Returns [`ConfigError::Load`] when either source cannot be read or
/// parsed, and [`ConfigError::Merge`] when the trees disagree structurally.
pub fn load(base: &Utf8Path, local: &Utf8Path) -> Result<ConfigNode, ConfigError> {
    let base_tree = read_source(base)?;
    let local_tree = read_source(local)?;
    Ok(base_tree.merge(&local_tree)?)
}

/// Reads a single TOML source into a tree.
///
/// # Errors
///
/// Returns [`ConfigLoadError`] when the file cannot be read or parsed.
pub fn read_source(path: &Utf8Path) -> Result<ConfigNode, ConfigLoadError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigLoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    ConfigNode::from_toml_str(&text).map_err(|source| ConfigLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
