//! Core error types for fusion-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering
//! all anticipated failure modes in the pipeline graph model.

use crate::id::{EdgeId, NodeId};
use thiserror::Error;

/// Core errors produced by the fusion-core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Attempting to insert a node whose label is already taken.
    #[error("duplicate label: '{label}'")]
    DuplicateLabel { label: String },

    /// A label is not a valid engine identifier
    /// (`[A-Za-z_][A-Za-z0-9_]*`).
    #[error("invalid label: '{label}'")]
    InvalidLabel { label: String },

    /// A node index was not found in the graph.
    #[error("node not found: NodeId({id})", id = id.0)]
    NodeNotFound { id: NodeId },

    /// An edge index was not found in the graph.
    #[error("edge not found: EdgeId({id})", id = id.0)]
    EdgeNotFound { id: EdgeId },

    /// An operation requiring a combinator node was applied to a source.
    #[error("node is not a combinator: NodeId({id})", id = id.0)]
    NotCombinator { id: NodeId },
}
