//! Identity-map tables: per-model `old_id → new_id` bookkeeping.
//!
//! Every merged model gets a companion `<Model>_id_map` table in the
//! destination recording, for each source row, the primary key it was
//! materialized under. Later models resolve their foreign keys by joining
//! through these tables. The maps live in SQL rather than in memory:
//! merges can process tens of millions of rows, and the database's own
//! index structures are good enough.

use rusqlite::Connection;

use crate::error::Result;

/// Handle for one model's identity-map table.
#[derive(Debug, Clone)]
pub struct MapTable {
    name: String,
}

impl MapTable {
    /// The map table for the given model.
    pub fn new(model_name: &str) -> Self {
        MapTable {
            name: format!("{}_id_map", model_name),
        }
    }

    /// The table's name in the destination.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Create the (unindexed) table.
    pub fn create(&self, connection: &Connection) -> Result<()> {
        let sql = format!(
            r#"
                CREATE TABLE "{table}" (
                    old_id TEXT NOT NULL,
                    new_id TEXT NOT NULL
                )
            "#,
            table = self.name
        );

        connection.execute(&sql, [])?;
        Ok(())
    }

    /// Create the lookup indices on the populated table.
    ///
    /// Must run after the model's bulk inserts; refreshing an index on
    /// every buffered INSERT is far slower than building it once.
    pub fn create_indices(&self, connection: &Connection) -> Result<()> {
        let sql = format!(
            r#"
                CREATE INDEX "{table}_old_id" ON "{table}"("old_id");
                CREATE INDEX "{table}_new_id" ON "{table}"("new_id");
                CREATE INDEX "{table}_new_id_old_id" ON "{table}"("new_id", "old_id");
            "#,
            table = self.name
        );

        connection.execute_batch(&sql)?;
        Ok(())
    }

    /// Drop the indices (if present) and the table (if present).
    pub fn drop(&self, connection: &Connection) -> Result<()> {
        let sql = format!(
            r#"
                DROP INDEX IF EXISTS "{table}_old_id";
                DROP INDEX IF EXISTS "{table}_new_id";
                DROP INDEX IF EXISTS "{table}_new_id_old_id";
                DROP TABLE IF EXISTS "{table}";
            "#,
            table = self.name
        );

        connection.execute_batch(&sql)?;
        Ok(())
    }

    /// INSERT recording a freshly materialized row. Both keys are raw
    /// TEXT values.
    pub fn entry_sql(&self, old_id: &str, new_id: &str) -> String {
        format!(
            "INSERT INTO \"{table}\" (old_id, new_id) VALUES ('{old_id}', '{new_id}')",
            table = self.name,
            old_id = old_id,
            new_id = new_id
        )
    }

    /// INSERT recording a deduplicated row. `quoted_new_id` arrives as an
    /// already-quoted SQL literal (the probe selects it through `quote()`)
    /// and is spliced in verbatim.
    pub fn remap_sql(&self, old_id: &str, quoted_new_id: &str) -> String {
        format!(
            "INSERT INTO \"{table}\" (old_id, new_id) VALUES ('{old_id}', {new_id})",
            table = self.name,
            old_id = old_id,
            new_id = quoted_new_id
        )
    }
}
