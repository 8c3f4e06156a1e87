//! Source-row streaming with textual quoting.
//!
//! Rows are read through a SELECT that asks SQLite to pre-quote every
//! value with its `quote()` function. The merge driver can then splice
//! the values straight into destination SQL without knowing their types;
//! quoting or not depending on the type would be tedious, so the source
//! database does the work. The primary key is selected twice: raw (it
//! keys the map-table lookup) and quoted (it is embedded verbatim into
//! remap inserts).

use rusqlite::Connection;

use crate::core::schema::{Column, Model};
use crate::error::{MergeError, Result};

/// One streamed source row.
#[derive(Debug, Clone)]
pub struct SourceRow {
    /// Raw primary key value.
    pub pk: String,

    /// Primary key as a quoted SQL literal.
    pub quoted_pk: String,

    /// Quoted values of the regular columns, in declaration order.
    pub values: Vec<String>,
}

/// Compiled SELECT and COUNT statements for one model.
#[derive(Debug, Clone)]
pub struct RowScan {
    select_sql: String,
    count_sql: String,
    width: usize,
}

impl RowScan {
    /// Compile the scan for `model`, streaming the given regular columns.
    pub fn new(model: &Model, regulars: &[&Column]) -> Result<Self> {
        let primary_key = model
            .primary_key()
            .ok_or_else(|| MergeError::schema(format!("Model {} has no primary key", model.name)))?;

        let quoted_columns = regulars
            .iter()
            .map(|column| format!("{} AS \"{}\"", column.quoted(&model.name), column.name))
            .collect::<Vec<String>>()
            .join(", ");

        let select_sql = if regulars.is_empty() {
            format!(
                "SELECT \"{pk}\" AS unquoted_pk, quote(\"{pk}\") AS \"{pk}\" FROM \"{table}\"",
                pk = primary_key.name,
                table = model.name
            )
        } else {
            format!(
                "SELECT \"{pk}\" AS unquoted_pk, quote(\"{pk}\") AS \"{pk}\", {quoted_columns} FROM \"{table}\"",
                pk = primary_key.name,
                quoted_columns = quoted_columns,
                table = model.name
            )
        };

        let count_sql = format!(
            "SELECT COUNT(\"{pk}\") FROM \"{table}\"",
            pk = primary_key.name,
            table = model.name
        );

        Ok(RowScan {
            select_sql,
            count_sql,
            width: regulars.len(),
        })
    }

    /// Number of rows the model holds in `source`.
    pub fn count(&self, source: &Connection) -> Result<u64> {
        let count: i64 = source.query_row(&self.count_sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Stream every row of the model in `source` to `handler`, one at a
    /// time, without buffering the result set.
    pub fn for_each<F>(&self, source: &Connection, mut handler: F) -> Result<()>
    where
        F: FnMut(SourceRow) -> Result<()>,
    {
        let mut statement = source.prepare(&self.select_sql)?;
        let mut rows = statement.query([])?;

        while let Some(row) = rows.next()? {
            let pk: String = row.get(0)?;
            let quoted_pk: String = row.get(1)?;

            let mut values = Vec::with_capacity(self.width);
            for idx in 0..self.width {
                values.push(row.get::<_, String>(2 + idx)?);
            }

            handler(SourceRow {
                pk,
                quoted_pk,
                values,
            })?;
        }

        Ok(())
    }
}
