//! Batched insert execution against the destination.
//!
//! The batcher buffers INSERT statements and applies them as a single
//! transaction once a configurable threshold of pending statements is
//! reached. Two kinds of statements are distinguished: regular inserts,
//! which represent source rows and count toward merge progress, and
//! supporting inserts (identity-map rows accompanying an already counted
//! row), which do not.

use rusqlite::Connection;

use crate::error::Result;

/// Buffers insert statements and flushes them in bulk.
pub struct InsertBatcher<'a> {
    connection: &'a Connection,
    threshold: u64,
    statements: Vec<String>,
    count: u64,
}

impl<'a> InsertBatcher<'a> {
    /// Create a batcher flushing after `threshold` pending statements.
    pub fn new(connection: &'a Connection, threshold: u64) -> Self {
        InsertBatcher {
            connection,
            threshold,
            statements: Vec::new(),
            count: 0,
        }
    }

    /// Buffer a progress-contributing insert.
    ///
    /// Returns the number of progress rows committed by this call: 0 when
    /// the threshold was not reached, otherwise the count accumulated
    /// since the previous flush.
    pub fn insert(&mut self, statement: String) -> Result<u64> {
        self.statements.push(statement);
        self.count += 1;
        self.maybe_flush()
    }

    /// Buffer a supporting insert (does not count toward progress).
    pub fn insert_supporting(&mut self, statement: String) -> Result<u64> {
        self.statements.push(statement);
        self.maybe_flush()
    }

    fn maybe_flush(&mut self) -> Result<u64> {
        if self.statements.len() as u64 >= self.threshold {
            return self.flush();
        }

        Ok(0)
    }

    /// Apply all pending statements as one transaction.
    ///
    /// Returns and zeroes the progress count accumulated since the last
    /// flush. An empty buffer returns 0 without touching the database.
    pub fn flush(&mut self) -> Result<u64> {
        if self.statements.is_empty() {
            return Ok(0);
        }

        let batch = format!("BEGIN TRANSACTION; {}; COMMIT;", self.statements.join("; "));
        self.connection.execute_batch(&batch)?;
        self.statements.clear();

        let count = self.count;
        self.count = 0;
        Ok(count)
    }
}
