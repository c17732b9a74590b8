//! Loose object store configuration.

use crate::CompressionLevel;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default prefix for staged object files.
pub const DEFAULT_TEMP_PREFIX: &str = "git-object-";

/// Configuration for a [`LooseObjectStore`](crate::LooseObjectStore).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Objects directory holding the two-character shard directories.
    pub root: PathBuf,
    /// Staging directory for objects being written.
    ///
    /// `None` stages into the OS temp directory. Renames across filesystems
    /// fail, so production setups usually point this next to `root`.
    pub temp_dir: Option<PathBuf>,
    /// Prefix for staged file names.
    pub temp_prefix: String,
    /// Compression level for new objects.
    pub compression: CompressionLevel,
}

impl StoreConfig {
    /// Creates a config for the given objects directory with defaults.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Sets the staging directory.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// Sets the compression level.
    pub fn with_compression(mut self, level: CompressionLevel) -> Self {
        self.compression = level;
        self
    }

    /// Returns the effective staging directory.
    pub fn staging_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Returns the objects directory.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(".git/objects"),
            temp_dir: None,
            temp_prefix: DEFAULT_TEMP_PREFIX.to_string(),
            compression: CompressionLevel::Default,
        }
    }
}
