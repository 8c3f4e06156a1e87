//! Merge configuration and validation.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{MergeError, Result};

/// Default path of the merged database file.
pub const DEFAULT_OUTPUT_PATH: &str = "./merged.db";

/// Default minimum number of buffered rows per batched transaction.
pub const DEFAULT_BATCH_THRESHOLD: u64 = 1000;

/// Configuration for a merge run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Paths to the SQLite database files to merge.
    pub input_paths: Vec<PathBuf>,

    /// Path of the merged database file.
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,

    /// Minimum number of buffered rows before a batch commit.
    #[serde(default = "default_batch_threshold")]
    pub batch_threshold: u64,

    /// Keep the `<Model>_id_map` bookkeeping tables after merging.
    #[serde(default)]
    pub keep_id_maps: bool,

    /// Delete the output database first if it already exists.
    #[serde(default)]
    pub remove_existing: bool,
}

fn default_output_path() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_PATH)
}

fn default_batch_threshold() -> u64 {
    DEFAULT_BATCH_THRESHOLD
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            input_paths: Vec::new(),
            output_path: default_output_path(),
            batch_threshold: DEFAULT_BATCH_THRESHOLD,
            keep_id_maps: false,
            remove_existing: false,
        }
    }
}

impl MergeConfig {
    /// Create a configuration for the given inputs with default settings.
    pub fn new(input_paths: Vec<PathBuf>) -> Self {
        Self {
            input_paths,
            ..Self::default()
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.input_paths.is_empty() {
            return Err(MergeError::config("at least one input database is required"));
        }

        if self.batch_threshold == 0 {
            return Err(MergeError::config("batch threshold must be at least 1"));
        }

        // Merging a database into itself would read and rewrite the same file.
        if self.input_paths.contains(&self.output_path) {
            return Err(MergeError::config(
                "the output database cannot be one of the inputs",
            ));
        }

        Ok(())
    }
}
