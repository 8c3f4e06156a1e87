//! Error types for the merge library.

use thiserror::Error;

/// Main error type for merge operations.
#[derive(Error, Debug)]
pub enum MergeError {
    /// Configuration error (no inputs, bad threshold, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Schema violation (missing primary key, unknown unique member, bad document)
    #[error("Schema error: {0}")]
    Schema(String),

    /// Failed to open a database file
    #[error("Failed to open database {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    /// Driver error on DDL, SELECT, batch commit, or probe
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MergeError {
    /// Create a Config error.
    pub fn config(message: impl Into<String>) -> Self {
        MergeError::Config(message.into())
    }

    /// Create a Schema error.
    pub fn schema(message: impl Into<String>) -> Self {
        MergeError::Schema(message.into())
    }

    /// Create an Open error with the offending path.
    pub fn open(path: impl Into<String>, source: rusqlite::Error) -> Self {
        MergeError::Open {
            path: path.into(),
            source,
        }
    }

    /// Process exit code for this error class.
    pub fn exit_code(&self) -> u8 {
        match self {
            MergeError::Config(_) => 1,
            MergeError::Schema(_) => 2,
            MergeError::Open { .. } | MergeError::Database(_) => 3,
            MergeError::Json(_) => 4,
            MergeError::Io(_) => 7,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        // Add error chain for wrapped errors
        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for merge operations.
pub type Result<T> = std::result::Result<T, MergeError>;
