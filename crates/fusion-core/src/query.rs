//! Query derivation: pure functions from graph topology to SQL text.
//!
//! A combinator's input port is semantically "the concatenation of
//! everything currently feeding it": each feeding edge contributes a
//! `SELECT * FROM <label>` fragment and the fragments are joined with
//! `UNION ALL`, in edge insertion order. The recomputation controller
//! treats query-text equality as its no-op signal, so the output here
//! must be byte-identical for identical edge lists.

use indexmap::IndexSet;

use crate::edge::InputPort;
use crate::graph::PipelineGraph;
use crate::id::NodeId;

/// Derives the SQL text representing all rows reaching `(node, port)`.
///
/// Returns the empty string when nothing feeds the port -- the sentinel
/// for "no input".
pub fn derive_input_query(graph: &PipelineGraph, node: NodeId, port: InputPort) -> String {
    let fragments: Vec<String> = graph
        .connections_into(node, port)
        .into_iter()
        .filter_map(|(_, source)| graph.get_node(source))
        .map(|source| format!("SELECT * FROM {}", source.label))
        .collect();
    fragments.join(" UNION ALL ")
}

/// The SELECT body a union node materializes from.
///
/// Input queries are wrapped as subselects so that each side may itself
/// be a `UNION ALL` chain.
pub fn union_select(query_a: &str, query_b: &str) -> String {
    format!("SELECT * FROM ({query_a}) UNION ALL SELECT * FROM ({query_b})")
}

/// The SELECT body a join node materializes from.
///
/// Joins with `USING` over the key columns, in their configured order,
/// so each key column appears once in the result. Callers must ensure
/// `columns` is non-empty; an empty key set means the node is not yet
/// configured and must not materialize at all.
pub fn join_select(query_a: &str, query_b: &str, columns: &IndexSet<String>) -> String {
    debug_assert!(!columns.is_empty(), "join requires at least one key column");
    let using: Vec<&str> = columns.iter().map(String::as_str).collect();
    format!(
        "SELECT * FROM ({query_a}) AS a INNER JOIN ({query_b}) AS b USING ({})",
        using.join(", ")
    )
}
