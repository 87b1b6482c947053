//! Queued units of work against the table store.
//!
//! A [`Job`] names the label it affects and carries a closed
//! [`JobAction`]. The queue's worker runs jobs with one exhaustive
//! match, so adding an action kind is a compile-time-checked change.
//! Jobs for the same label are never deduplicated: they run in
//! submission order and a later job's effects win.

use std::path::PathBuf;

use fusion_core::format::FileFormat;
use fusion_store::{StoreError, TableStore};
use thiserror::Error;

/// What a job does to its label's backing table.
#[derive(Debug, Clone)]
pub enum JobAction {
    /// Bulk-load a file, replacing any prior contents.
    Import { path: PathBuf, format: FileFormat },
    /// Replace the table wholesale with the result of a SELECT.
    Materialize { select_sql: String },
    /// Reset the table to the empty state.
    Clear,
    /// Drop the backing table (node deletion).
    Drop,
    /// Serialize the table into a byte buffer.
    Export { format: FileFormat },
}

/// A unit of queued work.
#[derive(Debug, Clone)]
pub struct Job {
    /// The label of the node this job affects.
    pub label: String,
    pub action: JobAction,
}

impl Job {
    pub fn new(label: impl Into<String>, action: JobAction) -> Self {
        Job {
            label: label.into(),
            action,
        }
    }
}

/// What a completed job produced.
#[derive(Debug)]
pub enum JobOutput {
    /// The table was mutated; nothing to return.
    Done,
    /// An import completed with this many rows.
    Imported { rows: usize },
    /// An export completed with this buffer.
    Bytes(Vec<u8>),
}

/// Failure of a single queued job. Scoped to its label; the queue
/// continues past it.
#[derive(Debug, Clone, Error)]
pub enum JobError {
    #[error("job failed for '{label}': {message}")]
    Failed { label: String, message: String },

    /// The job was removed from the queue by a reset before it started.
    #[error("job cancelled for '{label}'")]
    Cancelled { label: String },
}

/// Executes a job against the worker-owned store.
pub(crate) fn run(store: &mut TableStore, job: &Job) -> Result<JobOutput, StoreError> {
    match &job.action {
        JobAction::Import { path, format } => store
            .import_file(&job.label, path, *format)
            .map(|rows| JobOutput::Imported { rows }),
        JobAction::Materialize { select_sql } => store
            .materialize(&job.label, select_sql)
            .map(|_| JobOutput::Done),
        JobAction::Clear => store.clear_table(&job.label).map(|_| JobOutput::Done),
        JobAction::Drop => store.drop_table(&job.label).map(|_| JobOutput::Done),
        JobAction::Export { format } => store
            .export_table(&job.label, *format)
            .map(JobOutput::Bytes),
    }
}
