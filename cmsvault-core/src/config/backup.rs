//! Backup behaviour configuration.

use super::filter::CollectionFilter;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default output root for backup runs
pub const DEFAULT_OUTPUT_DIR: &str = "./backups";

/// Options controlling what a run fetches and how it is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Root directory; each run lands in `<output_dir>/<env>/<timestamp>/`
    pub output_dir: PathBuf,
    /// Relationship population depth forwarded on data queries
    pub depth: Option<u32>,
    /// Sort expression forwarded on data queries
    pub sort: Option<String>,
    /// Glob patterns of collections to skip entirely
    pub exclude_patterns: Vec<String>,
    /// Write data files zstd-compressed (requires the `compression` feature)
    pub compress: bool,
    /// Treat a truncated pagination as a collection failure
    pub strict_pagination: bool,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            depth: Some(0),
            sort: None,
            exclude_patterns: Vec::new(),
            compress: false,
            strict_pagination: false,
        }
    }
}

impl BackupConfig {
    /// Creates a backup config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the output root.
    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    /// Builder method to set the population depth.
    pub fn with_depth(mut self, depth: Option<u32>) -> Self {
        self.depth = depth;
        self
    }

    /// Builder method to set the sort expression.
    pub fn with_sort(mut self, sort: Option<String>) -> Self {
        self.sort = sort.filter(|s| !s.trim().is_empty());
        self
    }

    /// Builder method to add an exclusion pattern.
    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude_patterns.push(pattern.into());
        self
    }

    /// Builder method to enable compression.
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Builder method to enable strict pagination.
    pub fn with_strict_pagination(mut self, strict: bool) -> Self {
        self.strict_pagination = strict;
        self
    }

    /// Compiled exclusion filter
    pub fn collection_filter(&self) -> CollectionFilter {
        CollectionFilter::new(&self.exclude_patterns)
    }

    /// Validates the backup options.
    ///
    /// # Errors
    /// Returns error if the output directory is empty, or compression is
    /// requested without the `compression` feature
    pub fn validate(&self) -> crate::Result<()> {
        if self.output_dir.as_os_str().is_empty() {
            return Err(crate::error::VaultError::configuration(
                "output directory cannot be empty",
            ));
        }

        if self.compress && !cfg!(feature = "compression") {
            return Err(crate::error::VaultError::configuration(
                "compression requested but cmsvault was built without the 'compression' feature",
            ));
        }

        Ok(())
    }
}
