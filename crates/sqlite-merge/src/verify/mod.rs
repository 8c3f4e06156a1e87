//! Post-merge referential integrity verification.
//!
//! Relies on SQLite's own per-table foreign key checker rather than a
//! hand-written join: `pragma_foreign_key_check` reports every row whose
//! foreign key points at a missing parent.

use rusqlite::Connection;

use crate::core::schema::Model;
use crate::error::Result;

/// Count of rows in `model` whose foreign keys point at missing parents.
pub fn foreign_key_violations(connection: &Connection, model: &Model) -> Result<u64> {
    let count: i64 = connection.query_row(
        &format!(
            "SELECT COUNT(*) FROM pragma_foreign_key_check('{}')",
            model.name
        ),
        [],
        |row| row.get(0),
    )?;

    Ok(count as u64)
}
