//! Merge orchestrator - main workflow coordinator.
//!
//! Runs the full merge sequence: validate, open connections, relax
//! destination PRAGMAs, clone the schema from the first source's catalog,
//! merge every model in dependency order, restore safety PRAGMAs, verify
//! referential integrity, drop the bookkeeping tables, and VACUUM.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use crate::config::MergeConfig;
use crate::core::schema::Schema;
use crate::error::{MergeError, Result};
use crate::progress::{NullProgress, ProgressReporter};
use crate::transfer::{MapTable, ModelMerge};
use crate::verify;

/// Merge orchestrator.
pub struct Merger {
    schema: Schema,
    config: MergeConfig,
    progress: Box<dyn ProgressReporter>,
}

impl std::fmt::Debug for Merger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Merger")
            .field("schema", &self.schema)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// A nonzero post-merge foreign key check result for one model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrityWarning {
    /// Model name.
    pub model: String,

    /// Number of rows with dangling foreign keys.
    pub violations: u64,
}

/// Result of a merge run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeReport {
    /// Unique run identifier.
    pub run_id: String,

    /// When the merge started.
    pub started_at: DateTime<Utc>,

    /// When the merge completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Number of models merged.
    pub models_total: usize,

    /// Total source rows processed across all models.
    pub rows_merged: u64,

    /// Average throughput (rows/second).
    pub rows_per_second: u64,

    /// Models whose post-merge foreign key check found problems.
    pub integrity_warnings: Vec<IntegrityWarning>,
}

impl MergeReport {
    /// Convert to a JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Merger {
    /// Create a new merger.
    ///
    /// The schema and configuration are validated up front so that every
    /// violation is reported before any merging begins.
    pub fn new(schema: Schema, config: MergeConfig) -> Result<Self> {
        schema.validate()?;
        config.validate()?;

        Ok(Self {
            schema,
            config,
            progress: Box::new(NullProgress),
        })
    }

    /// Set the progress reporter.
    pub fn with_progress(mut self, progress: Box<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Run the merge.
    pub fn run(mut self) -> Result<MergeReport> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();

        if self.config.remove_existing && self.config.output_path.exists() {
            info!("Removing existing output {:?}", self.config.output_path);
            std::fs::remove_file(&self.config.output_path)?;
        }

        let sources = self.open_sources()?;
        let destination = open(&self.config.output_path)?;

        info!(
            "Merging {} databases into {:?}",
            sources.len(),
            self.config.output_path
        );

        // Durability is deliberately relaxed while bulk-inserting; it is
        // restored before verification.
        destination.execute_batch(
            r#"
                PRAGMA synchronous = OFF;
                PRAGMA journal_mode = OFF;
                PRAGMA temp_store = MEMORY;
                PRAGMA cache_size = -16000;
                PRAGMA foreign_keys = OFF;
            "#,
        )?;

        clone_schema(&sources[0], &destination)?;

        let mut rows_merged: u64 = 0;
        for model in self.schema.sorted() {
            let merge = ModelMerge::new(
                model,
                &self.schema,
                &destination,
                self.config.batch_threshold,
            );
            rows_merged += merge.run(&sources, self.progress.as_mut())?;
        }

        destination.execute_batch(
            r#"
                PRAGMA synchronous = ON;
                PRAGMA journal_mode = DELETE;
                PRAGMA foreign_keys = ON;
            "#,
        )?;

        let mut integrity_warnings: Vec<IntegrityWarning> = Vec::new();
        for model in self.schema.models.values() {
            let violations = verify::foreign_key_violations(&destination, model)?;

            if violations > 0 {
                warn!(
                    "Table {} has {} foreign key integrity problems",
                    model.name, violations
                );
                integrity_warnings.push(IntegrityWarning {
                    model: model.name.clone(),
                    violations,
                });
            }
        }

        if !self.config.keep_id_maps {
            for model in self.schema.models.values() {
                MapTable::new(&model.name).drop(&destination)?;
            }
        }

        // Reclaim space from dropped tables and indices.
        destination.execute("VACUUM", [])?;

        let completed_at = Utc::now();
        let duration_seconds = (completed_at - started_at).num_milliseconds() as f64 / 1000.0;

        let rows_per_second = if duration_seconds > 0.0 {
            (rows_merged as f64 / duration_seconds) as u64
        } else {
            rows_merged
        };

        info!(
            "Merged {} rows across {} models in {:.2}s",
            rows_merged,
            self.schema.models.len(),
            duration_seconds
        );

        Ok(MergeReport {
            run_id,
            started_at,
            completed_at,
            duration_seconds,
            models_total: self.schema.models.len(),
            rows_merged,
            rows_per_second,
            integrity_warnings,
        })
    }

    fn open_sources(&self) -> Result<Vec<Connection>> {
        self.config.input_paths.iter().map(|path| open(path)).collect()
    }
}

fn open(path: &Path) -> Result<Connection> {
    Connection::open(path).map_err(|e| MergeError::open(path.display().to_string(), e))
}

/// Replay the first source's catalog against the destination.
///
/// Each row of `sqlite_master` carries a complete CREATE statement that
/// can be executed verbatim. Auto-created indices have a NULL `sql` and
/// are skipped.
fn clone_schema(source: &Connection, destination: &Connection) -> Result<()> {
    let mut statement = source.prepare("SELECT sql FROM sqlite_master")?;
    let mut rows = statement.query([])?;

    while let Some(row) = rows.next()? {
        let ddl: Option<String> = row.get(0)?;

        if let Some(ddl) = ddl {
            destination.execute(&ddl, [])?;
        }
    }

    Ok(())
}
