//! Storage error types for fusion-store.
//!
//! [`StoreError`] covers all anticipated failure modes in the table
//! store: engine errors, file I/O during import/export, spreadsheet
//! container parsing, and query preparation.

use thiserror::Error;

/// Errors produced by table store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The embedded engine rejected an operation.
    #[error("engine error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Reading or writing a file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing or serialization failed.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// A spreadsheet container could not be read or written.
    #[error("spreadsheet error: {0}")]
    Spreadsheet(String),

    /// A query failed to prepare against the engine.
    #[error("invalid query: {reason}")]
    InvalidQuery { reason: String },

    /// An export could not be assembled into a buffer.
    #[error("export failed for '{label}': {reason}")]
    ExportFailed { label: String, reason: String },

    /// A referenced table does not exist in the store.
    #[error("table not found: '{label}'")]
    TableNotFound { label: String },

    /// An imported file contained no usable header row.
    #[error("file '{file}' contains no importable data")]
    EmptyImport { file: String },
}
