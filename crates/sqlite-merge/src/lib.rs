//! # sqlite-merge
//!
//! Merge N SQLite databases that share a declarative schema into a single
//! output database, preserving referential integrity across foreign keys
//! whose values are opaque identifiers (UUID strings).
//!
//! The engine copies every row into the destination while:
//!
//! - **Ordering tables** so parents are merged before children
//! - **Remapping primary keys** from each source to the keys actually
//!   stored in the destination, tracked in per-model identity-map tables
//! - **Rewriting foreign keys** on the fly through those map tables
//! - **Deduplicating rows** against each model's unique constraint
//! - **Batching writes** into bulk transactions for throughput
//!
//! ## Example
//!
//! ```rust,no_run
//! use sqlite_merge::{MergeConfig, Merger, Schema};
//!
//! fn main() -> sqlite_merge::Result<()> {
//!     let schema = Schema::load("schema.json")?;
//!     let config = MergeConfig::new(vec!["first.db".into(), "second.db".into()]);
//!     let report = Merger::new(schema, config)?.run()?;
//!     println!("Merged {} rows", report.rows_merged);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod orchestrator;
pub mod progress;
pub mod transfer;
pub mod verify;

// Re-exports for convenient access
pub use config::MergeConfig;
pub use core::schema::{Column, ColumnType, Model, Relation, Schema, Unique};
pub use error::{MergeError, Result};
pub use orchestrator::{IntegrityWarning, MergeReport, Merger};
pub use progress::{NullProgress, ProgressReporter, TermProgress};
