//! Per-model merge driver and its supporting machinery.
//!
//! - [`ModelMerge`]: copies one model's rows from every source into the
//!   destination, translating foreign keys and deduplicating against the
//!   model's unique constraint
//! - [`batch`]: threshold-batched insert execution
//! - [`map_table`]: per-model `old_id → new_id` bookkeeping tables
//! - [`select`]: source-row streaming with textual quoting
//! - [`probe`]: unique-index existence probe

pub mod batch;
pub mod map_table;
pub mod probe;
pub mod select;

pub use batch::InsertBatcher;
pub use map_table::MapTable;
pub use probe::UniqueProbe;
pub use select::{RowScan, SourceRow};

use rusqlite::Connection;
use tracing::debug;
use uuid::Uuid;

use crate::core::schema::{Column, Model, Schema};
use crate::error::{MergeError, Result};
use crate::progress::ProgressReporter;

/// Merges one model's rows from all sources into the destination.
///
/// The source holding the most rows of the model (the *primary*) is
/// copied first and keeps its original primary keys, which also lets the
/// duplicate check be skipped for the bulk of the data. Every other
/// source (a *secondary*) is probed against the destination's unique
/// constraint, and its fresh rows are inserted under newly minted keys.
pub struct ModelMerge<'a> {
    model: &'a Model,
    schema: &'a Schema,
    destination: &'a Connection,
    threshold: u64,
}

impl<'a> ModelMerge<'a> {
    pub fn new(
        model: &'a Model,
        schema: &'a Schema,
        destination: &'a Connection,
        threshold: u64,
    ) -> Self {
        ModelMerge {
            model,
            schema,
            destination,
            threshold,
        }
    }

    /// Run the merge for this model.
    ///
    /// Returns the number of source rows processed (each contributes one
    /// unit of progress whether it was inserted or remapped onto an
    /// existing row).
    pub fn run(
        &self,
        sources: &[Connection],
        progress: &mut dyn ProgressReporter,
    ) -> Result<u64> {
        let map_table = MapTable::new(&self.model.name);
        map_table.create(self.destination)?;

        let primary_key = self.model.primary_key().ok_or_else(|| {
            MergeError::schema(format!("Model {} has no primary key", self.model.name))
        })?;

        let regulars = self.model.regular_columns(self.schema);
        let scan = RowScan::new(self.model, &regulars)?;
        let probe = UniqueProbe::compile(self.model, &regulars)?;

        // The primary is the source with the most rows; ties favor the
        // earlier source.
        let mut counts: Vec<u64> = Vec::with_capacity(sources.len());
        for source in sources {
            counts.push(scan.count(source)?);
        }

        let total_rows: u64 = counts.iter().sum();
        let mut primary_idx = 0;
        for (idx, count) in counts.iter().enumerate() {
            if *count > counts[primary_idx] {
                primary_idx = idx;
            }
        }

        debug!(
            "Merging {}: {} rows across {} sources, primary is source #{}",
            self.model.name,
            total_rows,
            sources.len(),
            primary_idx
        );

        progress.begin(&self.model.name, total_rows);

        let order: Vec<usize> = std::iter::once(primary_idx)
            .chain((0..sources.len()).filter(|idx| *idx != primary_idx))
            .collect();

        let mut batcher = InsertBatcher::new(self.destination, self.threshold);
        let mut merged: u64 = 0;

        for idx in order {
            let source = &sources[idx];
            let is_primary = idx == primary_idx;

            scan.for_each(source, |row| {
                // Secondaries are checked against the unique constraint;
                // a hit means the row already exists and only needs its
                // key recorded.
                let existing = match (&probe, is_primary) {
                    (Some(probe), false) => probe.lookup(self.destination, &row.values)?,
                    _ => None,
                };

                if let Some(existing_pk) = existing {
                    // The map row stands in for an actual source row, so
                    // it counts toward progress.
                    let committed = batcher.insert(map_table.remap_sql(&row.pk, &existing_pk))?;
                    merged += committed;
                    progress.advance(committed);
                    return Ok(());
                }

                // The primary keeps its original keys; secondary rows get
                // fresh ones so their origin stays distinguishable.
                let new_pk = if is_primary {
                    row.pk.clone()
                } else {
                    Uuid::new_v4().to_string()
                };

                let committed =
                    batcher.insert(self.build_insert(primary_key, &regulars, &row, &new_pk))?;
                merged += committed;
                progress.advance(committed);

                let committed =
                    batcher.insert_supporting(map_table.entry_sql(&row.pk, &new_pk))?;
                merged += committed;
                progress.advance(committed);

                Ok(())
            })?;

            // Drain between sources so the probe sees every row this
            // source contributed.
            let committed = batcher.flush()?;
            merged += committed;
            progress.advance(committed);
        }

        let committed = batcher.flush()?;
        merged += committed;
        progress.advance(committed);

        map_table.create_indices(self.destination)?;
        progress.complete();

        Ok(merged)
    }

    /// Build the INSERT for one source row.
    ///
    /// Regular values are spliced in as pre-quoted literals. Foreign keys
    /// are translated by joining each target model's identity-map table on
    /// the source value; a missing map entry leaves the key NULL and
    /// surfaces in the post-merge integrity check.
    fn build_insert(
        &self,
        primary_key: &Column,
        regulars: &[&Column],
        row: &SourceRow,
        new_pk: &str,
    ) -> String {
        let mut columns: Vec<&str> = vec![primary_key.name.as_str()];
        let mut values: Vec<String> = vec![format!("'{}'", new_pk)];
        let mut joins: Vec<String> = Vec::new();

        for (column, value) in regulars.iter().zip(&row.values) {
            columns.push(column.name.as_str());

            if let Some(related) = column.related_column(self.model) {
                values.push(format!("{}_id_map.new_id", related.ty.name));
                joins.push(format!(
                    "LEFT JOIN {table}_id_map ON {table}_id_map.old_id = {old_id}",
                    table = related.ty.name,
                    old_id = value
                ));
            } else {
                values.push(value.clone());
            }
        }

        format!(
            r#"
                INSERT INTO "{table}" ({columns})
                SELECT {values}
                FROM (SELECT 1) AS dummy
                {joins}
                LIMIT 1
            "#,
            table = self.model.name,
            columns = columns.join(", "),
            values = values.join(", "),
            joins = joins.join("\n")
        )
    }
}
