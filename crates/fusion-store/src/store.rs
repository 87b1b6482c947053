//! TableStore: the adapter over the embedded SQL engine.
//!
//! [`TableStore`] wraps a `rusqlite::Connection` in WAL mode and exposes
//! the handful of operations the pipeline needs: drop/clear a named
//! table, materialize a table from a SELECT, bulk-import a file, export
//! a table to a byte buffer, and run ad hoc queries. Every write is
//! wrapped in a transaction so a failing statement leaves the prior
//! table intact.
//!
//! The store holds exactly one connection. The mutation queue's worker
//! task owns the write-side store; read paths open their own store on
//! the same database file and rely on WAL for concurrent reads.

use std::path::Path;

use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde_json::Value;

use fusion_core::format::FileFormat;

use crate::error::StoreError;
use crate::export;
use crate::import;

/// Result rows of an ad hoc query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutput {
    /// Column names in SELECT order.
    pub columns: Vec<String>,
    /// One entry per row, cells in column order.
    pub rows: Vec<Vec<Value>>,
}

impl QueryOutput {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Adapter over the embedded engine, keyed by table label.
///
/// Labels are assumed to be validated identifiers (the graph enforces
/// this before any job is enqueued); column names come from user files
/// and are always quoted.
pub struct TableStore {
    conn: Connection,
}

impl TableStore {
    /// Opens (or creates) the backing database at `path` with WAL mode.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        // WAL allows the read-side connection to run alongside the
        // single writer; NORMAL synchronous is safe under WAL.
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(TableStore { conn })
    }

    // -----------------------------------------------------------------------
    // Table lifecycle
    // -----------------------------------------------------------------------

    /// Drops a table if it exists. Idempotent.
    pub fn drop_table(&mut self, label: &str) -> Result<(), StoreError> {
        self.conn
            .execute_batch(&format!("DROP TABLE IF EXISTS {label}"))?;
        Ok(())
    }

    /// Resets a table to the empty state.
    ///
    /// The engine cannot hold a zero-column table, so "empty" is
    /// represented as absent; what matters is that no stale rows survive.
    pub fn clear_table(&mut self, label: &str) -> Result<(), StoreError> {
        self.drop_table(label)
    }

    /// Replaces `label` wholesale with the result of `select_sql`.
    ///
    /// No incremental diffing: the previous table is dropped and the new
    /// contents are materialized in one transaction, so readers never see
    /// a half-written table.
    pub fn materialize(&mut self, label: &str, select_sql: &str) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(&format!("DROP TABLE IF EXISTS {label}"))?;
        tx.execute_batch(&format!("CREATE TABLE {label} AS {select_sql}"))?;
        tx.commit()?;
        Ok(())
    }

    /// Imports a file into `label`, replacing any prior contents.
    ///
    /// Returns the number of imported rows. Parsing happens before the
    /// transaction opens; a parse failure leaves the store untouched.
    pub fn import_file(
        &mut self,
        label: &str,
        path: &Path,
        format: FileFormat,
    ) -> Result<usize, StoreError> {
        let data = import::read_file(path, format)?;

        let column_defs: Vec<String> = data
            .columns
            .iter()
            .map(|c| format!("{} TEXT", quote_ident(c)))
            .collect();
        let placeholders: Vec<String> =
            (1..=data.columns.len()).map(|i| format!("?{i}")).collect();

        let tx = self.conn.transaction()?;
        tx.execute_batch(&format!("DROP TABLE IF EXISTS {label}"))?;
        tx.execute_batch(&format!(
            "CREATE TABLE {label} ({})",
            column_defs.join(", ")
        ))?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {label} VALUES ({})",
                placeholders.join(", ")
            ))?;
            for row in &data.rows {
                stmt.execute(rusqlite::params_from_iter(row.iter()))?;
            }
        }
        tx.commit()?;
        Ok(data.rows.len())
    }

    /// Exports a table's rows to a byte buffer in the requested format.
    pub fn export_table(&mut self, label: &str, format: FileFormat) -> Result<Vec<u8>, StoreError> {
        if !self.table_exists(label)? {
            return Err(StoreError::TableNotFound {
                label: label.to_string(),
            });
        }
        let output = self.query(&format!("SELECT * FROM {label}"))?;
        match format {
            FileFormat::Csv | FileFormat::Unknown => export::to_csv(label, &output),
            // No maintained writer exists for the legacy binary format;
            // XLS requests are served as an XLSX workbook buffer.
            FileFormat::Xls | FileFormat::Xlsx => export::to_xlsx(label, &output),
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Runs an arbitrary SELECT and returns its rows as JSON values.
    pub fn query(&self, sql: &str) -> Result<QueryOutput, StoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let column_count = columns.len();

        let mut rows = Vec::new();
        let mut raw = stmt.query([])?;
        while let Some(row) = raw.next()? {
            let mut cells = Vec::with_capacity(column_count);
            for i in 0..column_count {
                cells.push(value_ref_to_json(row.get_ref(i)?));
            }
            rows.push(cells);
        }

        Ok(QueryOutput { columns, rows })
    }

    /// Prepares `sql` without running it.
    ///
    /// This is the query-editing boundary: invalid SQL is surfaced here,
    /// before anything is enqueued against the store.
    pub fn validate_query(&self, sql: &str) -> Result<(), StoreError> {
        self.conn
            .prepare(sql)
            .map(|_| ())
            .map_err(|e| StoreError::InvalidQuery {
                reason: e.to_string(),
            })
    }

    /// Returns `true` if a table named `label` exists.
    pub fn table_exists(&self, label: &str) -> Result<bool, StoreError> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            [label],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Number of rows currently in `label`.
    pub fn row_count(&self, label: &str) -> Result<u64, StoreError> {
        if !self.table_exists(label)? {
            return Err(StoreError::TableNotFound {
                label: label.to_string(),
            });
        }
        let count: u64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {label}"), [], |row| row.get(0))?;
        Ok(count)
    }
}

/// Quotes an identifier that may contain arbitrary characters
/// (column names come straight from file headers).
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn value_ref_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(String::from_utf8_lossy(b).into_owned()),
    }
}
