//! PipelineGraph: the authoritative in-memory pipeline topology.
//!
//! [`PipelineGraph`] holds the session's nodes (table producers) and
//! edges (data-flow connections into labeled ports). It is purely an
//! in-memory structure: operations are synchronous, side-effect-free
//! beyond the graph itself, and never touch the backing table store.
//! Keeping the two consistent is the mutation queue's job.
//!
//! The graph is a `StableGraph` so node and edge identifiers stay valid
//! across unrelated removals. All mutations go through `PipelineGraph`
//! methods, which maintain two invariants:
//! - a `label` is unique across live nodes and a valid engine identifier;
//! - at most one edge occupies a given `(target, port)` pair (inserting
//!   into an occupied port replaces the prior edge).

use std::collections::HashMap;

use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::stable_graph::StableGraph;
use petgraph::visit::EdgeRef;
use petgraph::{Directed, Direction};
use smallvec::SmallVec;

use crate::edge::{DataEdge, InputPort};
use crate::error::CoreError;
use crate::id::{EdgeId, NodeId};
use crate::label::is_valid_label;
use crate::node::{NodeKind, TableNode};

/// An edge feeding a port: the edge's ID and the source node.
pub type Connection = (EdgeId, NodeId);

/// The session's pipeline topology.
#[derive(Debug, Clone, Default)]
pub struct PipelineGraph {
    graph: StableGraph<TableNode, DataEdge, Directed, u32>,
    /// Label -> node lookup; mirrors the graph for O(1) collision checks.
    labels: HashMap<String, NodeId>,
    /// Next edge insertion stamp.
    next_seq: u64,
}

impl PipelineGraph {
    pub fn new() -> Self {
        PipelineGraph::default()
    }

    // -----------------------------------------------------------------------
    // Node methods
    // -----------------------------------------------------------------------

    /// Inserts a node.
    ///
    /// Fails with [`CoreError::InvalidLabel`] if the label is not a valid
    /// engine identifier, or [`CoreError::DuplicateLabel`] if another live
    /// node already carries it.
    pub fn add_node(&mut self, node: TableNode) -> Result<NodeId, CoreError> {
        if !is_valid_label(&node.label) {
            return Err(CoreError::InvalidLabel {
                label: node.label.clone(),
            });
        }
        if self.labels.contains_key(&node.label) {
            return Err(CoreError::DuplicateLabel {
                label: node.label.clone(),
            });
        }
        let label = node.label.clone();
        let idx = self.graph.add_node(node);
        let id = NodeId::from(idx);
        self.labels.insert(label, id);
        Ok(id)
    }

    /// Removes a node and every edge touching it.
    ///
    /// Returns the removed node so callers can schedule backing-table
    /// cleanup.
    pub fn remove_node(&mut self, id: NodeId) -> Result<TableNode, CoreError> {
        let idx: NodeIndex<u32> = id.into();
        match self.graph.remove_node(idx) {
            Some(node) => {
                self.labels.remove(&node.label);
                Ok(node)
            }
            None => Err(CoreError::NodeNotFound { id }),
        }
    }

    /// Looks up a node by ID.
    pub fn get_node(&self, id: NodeId) -> Option<&TableNode> {
        let idx: NodeIndex<u32> = id.into();
        self.graph.node_weight(idx)
    }

    /// Looks up a node by its label.
    pub fn node_by_label(&self, label: &str) -> Option<(NodeId, &TableNode)> {
        let id = *self.labels.get(label)?;
        self.get_node(id).map(|node| (id, node))
    }

    /// Replaces a join node's key-column set, returning the old set.
    ///
    /// Fails with [`CoreError::NotCombinator`] if the node is not a join.
    pub fn set_join_columns(
        &mut self,
        id: NodeId,
        columns: indexmap::IndexSet<String>,
    ) -> Result<indexmap::IndexSet<String>, CoreError> {
        let idx: NodeIndex<u32> = id.into();
        let node = self
            .graph
            .node_weight_mut(idx)
            .ok_or(CoreError::NodeNotFound { id })?;
        match &mut node.kind {
            NodeKind::Join { columns: current } => Ok(std::mem::replace(current, columns)),
            _ => Err(CoreError::NotCombinator { id }),
        }
    }

    // -----------------------------------------------------------------------
    // Edge methods
    // -----------------------------------------------------------------------

    /// Connects `source`'s output into `(target, port)`.
    ///
    /// The target must be a combinator. If an edge already occupies the
    /// port it is replaced (last-write-wins), so a labeled port never
    /// fans in from more than one source.
    pub fn add_edge(
        &mut self,
        source: NodeId,
        target: NodeId,
        port: InputPort,
    ) -> Result<EdgeId, CoreError> {
        let source_idx: NodeIndex<u32> = source.into();
        let target_idx: NodeIndex<u32> = target.into();

        if self.graph.node_weight(source_idx).is_none() {
            return Err(CoreError::NodeNotFound { id: source });
        }
        let target_node = self
            .graph
            .node_weight(target_idx)
            .ok_or(CoreError::NodeNotFound { id: target })?;
        if !target_node.is_combinator() {
            return Err(CoreError::NotCombinator { id: target });
        }

        // Last-write-wins on the port.
        if let Some((occupied, _)) = self.edge_into(target, port) {
            let idx: EdgeIndex<u32> = occupied.into();
            self.graph.remove_edge(idx);
        }

        self.next_seq += 1;
        let edge = DataEdge {
            port,
            seq: self.next_seq,
        };
        let idx = self.graph.add_edge(source_idx, target_idx, edge);
        Ok(EdgeId::from(idx))
    }

    /// Inserts an edge without the port-replacement policy, leaving any
    /// occupying edge in place. Only exists so derivation tests can
    /// exercise fan-in lists the public API never produces.
    #[cfg(test)]
    pub(crate) fn insert_edge_unchecked(
        &mut self,
        source: NodeId,
        target: NodeId,
        port: InputPort,
    ) -> EdgeId {
        self.next_seq += 1;
        let edge = DataEdge {
            port,
            seq: self.next_seq,
        };
        let idx = self.graph.add_edge(source.into(), target.into(), edge);
        EdgeId::from(idx)
    }

    /// Removes an edge, returning its endpoints and payload.
    pub fn remove_edge(
        &mut self,
        id: EdgeId,
    ) -> Result<(NodeId, NodeId, DataEdge), CoreError> {
        let idx: EdgeIndex<u32> = id.into();
        let (source, target) = self
            .graph
            .edge_endpoints(idx)
            .ok_or(CoreError::EdgeNotFound { id })?;
        let edge = self
            .graph
            .remove_edge(idx)
            .ok_or(CoreError::EdgeNotFound { id })?;
        Ok((NodeId::from(source), NodeId::from(target), edge))
    }

    // -----------------------------------------------------------------------
    // Query methods
    // -----------------------------------------------------------------------

    /// Returns the edges feeding `(node, port)`, ordered by insertion.
    ///
    /// The ordering is stable across unrelated mutations, so derived SQL
    /// built from it is deterministic and testable.
    pub fn connections_into(&self, node: NodeId, port: InputPort) -> SmallVec<[Connection; 2]> {
        let idx: NodeIndex<u32> = node.into();
        let mut edges: SmallVec<[(u64, Connection); 2]> = self
            .graph
            .edges_directed(idx, Direction::Incoming)
            .filter(|e| e.weight().port == port)
            .map(|e| {
                (
                    e.weight().seq,
                    (EdgeId::from(e.id()), NodeId::from(e.source())),
                )
            })
            .collect();
        edges.sort_unstable_by_key(|(seq, _)| *seq);
        edges.into_iter().map(|(_, conn)| conn).collect()
    }

    /// Returns the single edge occupying `(node, port)`, if any.
    ///
    /// The port invariant keeps this at most one; `connections_into`
    /// still reports a list because callers derive union text from it.
    pub fn edge_into(&self, node: NodeId, port: InputPort) -> Option<Connection> {
        let conns = self.connections_into(node, port);
        debug_assert!(conns.len() <= 1, "port invariant violated");
        conns.into_iter().next()
    }

    /// Returns the downstream combinators fed by `node`, deduplicated,
    /// ordered by edge insertion.
    pub fn dependents_of(&self, node: NodeId) -> Vec<NodeId> {
        let idx: NodeIndex<u32> = node.into();
        let mut targets: Vec<(u64, NodeId)> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| (e.weight().seq, NodeId::from(e.target())))
            .collect();
        targets.sort_unstable_by_key(|(seq, _)| *seq);
        let mut seen = Vec::new();
        for (_, target) in targets {
            if !seen.contains(&target) {
                seen.push(target);
            }
        }
        seen
    }

    /// Iterates all live nodes.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &TableNode)> {
        self.graph
            .node_indices()
            .filter_map(|idx| self.graph.node_weight(idx).map(|n| (NodeId::from(idx), n)))
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::FileFormat;

    fn source(label: &str) -> TableNode {
        TableNode::source(label, format!("{label}.csv"), FileFormat::Csv)
    }

    #[test]
    fn add_node_rejects_duplicate_label() {
        let mut graph = PipelineGraph::new();
        graph.add_node(source("sales_1")).unwrap();
        let err = graph.add_node(source("sales_1")).unwrap_err();
        assert!(matches!(err, CoreError::DuplicateLabel { label } if label == "sales_1"));
    }

    #[test]
    fn add_node_rejects_invalid_label() {
        let mut graph = PipelineGraph::new();
        for label in ["1sales", "sa les", "sales-1", ""] {
            let err = graph
                .add_node(TableNode::union(label))
                .unwrap_err();
            assert!(matches!(err, CoreError::InvalidLabel { .. }), "{label:?}");
        }
    }

    #[test]
    fn removed_label_becomes_available_again() {
        let mut graph = PipelineGraph::new();
        let id = graph.add_node(source("sales_1")).unwrap();
        graph.remove_node(id).unwrap();
        // The graph no longer holds the label; uniqueness over time is the
        // allocator's job, not the graph's.
        graph.add_node(source("sales_1")).unwrap();
    }

    #[test]
    fn remove_node_returns_node_and_drops_touching_edges() {
        let mut graph = PipelineGraph::new();
        let a = graph.add_node(source("a_1")).unwrap();
        let b = graph.add_node(source("b_2")).unwrap();
        let union = graph.add_node(TableNode::union("tbl_union_3")).unwrap();
        graph.add_edge(a, union, InputPort::A).unwrap();
        graph.add_edge(b, union, InputPort::B).unwrap();

        let removed = graph.remove_node(a).unwrap();
        assert_eq!(removed.label, "a_1");
        assert_eq!(graph.edge_count(), 1);
        assert!(graph.connections_into(union, InputPort::A).is_empty());
        assert_eq!(graph.connections_into(union, InputPort::B).len(), 1);
    }

    #[test]
    fn edges_into_sources_are_rejected() {
        let mut graph = PipelineGraph::new();
        let a = graph.add_node(source("a_1")).unwrap();
        let b = graph.add_node(source("b_2")).unwrap();
        let err = graph.add_edge(a, b, InputPort::A).unwrap_err();
        assert!(matches!(err, CoreError::NotCombinator { .. }));
    }

    #[test]
    fn second_edge_into_occupied_port_replaces_the_first() {
        let mut graph = PipelineGraph::new();
        let a = graph.add_node(source("a_1")).unwrap();
        let b = graph.add_node(source("b_2")).unwrap();
        let union = graph.add_node(TableNode::union("tbl_union_3")).unwrap();

        graph.add_edge(a, union, InputPort::A).unwrap();
        graph.add_edge(b, union, InputPort::A).unwrap();

        // The replaced edge is gone entirely; the port never fans in.
        let conns = graph.connections_into(union, InputPort::A);
        assert_eq!(conns.len(), 1);
        assert_eq!(conns[0].1, b);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn ports_are_independent() {
        let mut graph = PipelineGraph::new();
        let a = graph.add_node(source("a_1")).unwrap();
        let b = graph.add_node(source("b_2")).unwrap();
        let join = graph.add_node(TableNode::join("tbl_join_3")).unwrap();

        graph.add_edge(a, join, InputPort::A).unwrap();
        graph.add_edge(b, join, InputPort::B).unwrap();

        assert_eq!(graph.edge_into(join, InputPort::A).unwrap().1, a);
        assert_eq!(graph.edge_into(join, InputPort::B).unwrap().1, b);
    }

    #[test]
    fn remove_edge_returns_endpoints() {
        let mut graph = PipelineGraph::new();
        let a = graph.add_node(source("a_1")).unwrap();
        let union = graph.add_node(TableNode::union("tbl_union_2")).unwrap();
        let edge = graph.add_edge(a, union, InputPort::A).unwrap();

        let (src, dst, payload) = graph.remove_edge(edge).unwrap();
        assert_eq!(src, a);
        assert_eq!(dst, union);
        assert_eq!(payload.port, InputPort::A);
        assert!(graph.remove_edge(edge).is_err());
    }

    #[test]
    fn dependents_are_unique_and_insertion_ordered() {
        let mut graph = PipelineGraph::new();
        let a = graph.add_node(source("a_1")).unwrap();
        let u1 = graph.add_node(TableNode::union("tbl_union_2")).unwrap();
        let u2 = graph.add_node(TableNode::union("tbl_union_3")).unwrap();

        graph.add_edge(a, u2, InputPort::A).unwrap();
        graph.add_edge(a, u1, InputPort::A).unwrap();
        graph.add_edge(a, u2, InputPort::B).unwrap();

        assert_eq!(graph.dependents_of(a), vec![u2, u1]);
    }

    #[test]
    fn set_join_columns_replaces_and_returns_old() {
        let mut graph = PipelineGraph::new();
        let join = graph.add_node(TableNode::join("tbl_join_1")).unwrap();

        let mut cols = indexmap::IndexSet::new();
        cols.insert("id".to_string());
        let old = graph.set_join_columns(join, cols).unwrap();
        assert!(old.is_empty());

        let union = graph.add_node(TableNode::union("tbl_union_2")).unwrap();
        let err = graph
            .set_join_columns(union, indexmap::IndexSet::new())
            .unwrap_err();
        assert!(matches!(err, CoreError::NotCombinator { .. }));
    }
}
