//! Session error types.
//!
//! [`SessionError`] is the unified error type at the facade boundary.
//! Lower-layer errors are lifted via `From` conversions; the store's
//! query-preparation failure is routed to the dedicated `InvalidQuery`
//! variant so the query-editing boundary can match on it.

use thiserror::Error;

use fusion_core::CoreError;
use fusion_store::StoreError;

use crate::job::JobError;

/// Errors produced at the session facade.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A graph mutation was rejected (duplicate label, missing node, ...).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// SQL failed to prepare against the engine. Surfaced at the
    /// query-editing boundary, before anything is enqueued.
    #[error("invalid query: {reason}")]
    InvalidQuery { reason: String },

    /// A store operation failed outside the queue (read path, open).
    #[error("store error: {0}")]
    Store(StoreError),

    /// A queued job failed. The queue keeps going; the failure is scoped
    /// to the named label.
    #[error("job failed for '{label}': {message}")]
    JobFailed { label: String, message: String },

    /// A queued job was cancelled by a reset before it started.
    #[error("job cancelled for '{label}'")]
    Cancelled { label: String },

    /// No node carries the given label.
    #[error("unknown table label: '{label}'")]
    UnknownLabel { label: String },
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidQuery { reason } => SessionError::InvalidQuery { reason },
            other => SessionError::Store(other),
        }
    }
}

impl From<JobError> for SessionError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::Failed { label, message } => SessionError::JobFailed { label, message },
            JobError::Cancelled { label } => SessionError::Cancelled { label },
        }
    }
}
