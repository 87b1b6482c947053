//! Edge types for the pipeline graph.
//!
//! An edge is a directed data-flow connection from a node's output into a
//! *labeled* input port of a combinator. Ports are a closed enum rather
//! than free-form strings: combinators are binary, and the port is part
//! of the edge's identity for the one-source-per-port invariant.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A combinator's labeled input port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputPort {
    A,
    B,
}

impl InputPort {
    /// Both ports, in display order.
    pub const ALL: [InputPort; 2] = [InputPort::A, InputPort::B];
}

impl fmt::Display for InputPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputPort::A => write!(f, "A"),
            InputPort::B => write!(f, "B"),
        }
    }
}

/// A data-flow connection into a combinator's input port.
///
/// `seq` is a graph-global insertion stamp. `StableGraph` reuses freed
/// edge slots, so index order says nothing about insertion order; the
/// stamp is what makes `connections_into` (and therefore derived query
/// text) deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataEdge {
    /// Which input port of the target this edge feeds.
    pub port: InputPort,
    /// Graph-global insertion stamp, strictly increasing.
    pub seq: u64,
}
