//! Error types for the transfer engine.

use thiserror::Error;

/// Main error type for transfer operations.
#[derive(Error, Debug)]
pub enum TransferError {
    /// Configuration error (bad descriptor fields, un-parseable key material, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Source database connection or query error
    #[error("Source database error: {0}")]
    Source(#[from] tiberius::error::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// Table discovery failed on the source
    #[error("Discovery failed: {0}")]
    Discovery(String),

    /// Warehouse statement failed; carries the offending SQL
    #[error("Warehouse error: {message}\n  Statement: {sql}")]
    Warehouse { sql: String, message: String },

    /// Staging schema, file format, or grant-procedure setup failed
    #[error("Schema setup failed: {message}\n  Statement: {sql}")]
    SchemaSetup { sql: String, message: String },

    /// Per-table pipeline failed
    #[error("Transfer failed for table {table}: {message}")]
    Worker { table: String, message: String },

    /// No formatter registered for a source column type
    #[error("No formatter for db type {0}")]
    UnknownType(String),

    /// A formatter rejected a driver value
    #[error("Format error: {0}")]
    Format(String),

    /// Object-store upload failed
    #[error("Upload failed for key {key}: {message}")]
    Upload { key: String, message: String },

    /// IO error (PEM file reads)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The transfer was cancelled by a peer failure
    #[error("Transfer cancelled")]
    Cancelled,
}

impl TransferError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        TransferError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a Warehouse error tagged with the statement that failed
    pub fn warehouse(sql: impl Into<String>, message: impl ToString) -> Self {
        TransferError::Warehouse {
            sql: sql.into(),
            message: message.to_string(),
        }
    }

    /// Create a SchemaSetup error tagged with the statement that failed
    pub fn schema_setup(sql: impl Into<String>, message: impl ToString) -> Self {
        TransferError::SchemaSetup {
            sql: sql.into(),
            message: message.to_string(),
        }
    }

    /// Create a Worker error for a specific table
    pub fn worker(table: impl Into<String>, message: impl ToString) -> Self {
        TransferError::Worker {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}", self);

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

/// Result type alias for transfer operations.
pub type Result<T> = std::result::Result<T, TransferError>;
