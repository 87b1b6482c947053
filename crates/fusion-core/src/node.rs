//! Node types for the pipeline graph.
//!
//! Every node produces a named table in the backing store, identified by
//! its `label`. The kind-specific payload lives in [`NodeKind`], a closed
//! enum so that materialization logic is an exhaustive match and adding a
//! combinator kind is a compile-time-checked change.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::format::FileFormat;

/// Reference to the original file behind a source node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    /// Original file name as presented by the user (extension included).
    pub name: String,
    /// Detected format, used as the default export format for the node.
    pub format: FileFormat,
}

/// Kind-specific payload of a pipeline node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NodeKind {
    /// A table imported from a file.
    Source { file: FileRef },
    /// Stacks the rows reaching port A on top of the rows reaching port B.
    Union,
    /// Joins the rows reaching port A with the rows reaching port B on
    /// equality of the named columns, in the order they were added.
    Join { columns: IndexSet<String> },
}

impl NodeKind {
    /// Returns `true` for union and join nodes.
    pub fn is_combinator(&self) -> bool {
        !matches!(self, NodeKind::Source { .. })
    }
}

/// A node in the pipeline graph.
///
/// `label` is the name of the node's backing table; the graph enforces
/// that it is unique and a valid engine identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableNode {
    /// The backing table's name. Unique across the graph.
    pub label: String,
    /// Kind-specific payload.
    pub kind: NodeKind,
}

impl TableNode {
    /// Creates a source node for an imported file.
    pub fn source(label: impl Into<String>, name: impl Into<String>, format: FileFormat) -> Self {
        TableNode {
            label: label.into(),
            kind: NodeKind::Source {
                file: FileRef {
                    name: name.into(),
                    format,
                },
            },
        }
    }

    /// Creates a union combinator node.
    pub fn union(label: impl Into<String>) -> Self {
        TableNode {
            label: label.into(),
            kind: NodeKind::Union,
        }
    }

    /// Creates a join combinator node with no key columns configured yet.
    pub fn join(label: impl Into<String>) -> Self {
        TableNode {
            label: label.into(),
            kind: NodeKind::Join {
                columns: IndexSet::new(),
            },
        }
    }

    /// Returns `true` for union and join nodes.
    pub fn is_combinator(&self) -> bool {
        self.kind.is_combinator()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_nodes_are_not_combinators() {
        let node = TableNode::source("sales_1", "sales.csv", FileFormat::Csv);
        assert!(!node.is_combinator());
    }

    #[test]
    fn union_and_join_are_combinators() {
        assert!(TableNode::union("tbl_union_1").is_combinator());
        assert!(TableNode::join("tbl_join_1").is_combinator());
    }

    #[test]
    fn join_columns_preserve_insertion_order() {
        let mut node = TableNode::join("tbl_join_1");
        if let NodeKind::Join { columns } = &mut node.kind {
            columns.insert("region".to_string());
            columns.insert("year".to_string());
            columns.insert("region".to_string()); // duplicate is a no-op
            let ordered: Vec<_> = columns.iter().cloned().collect();
            assert_eq!(ordered, vec!["region", "year"]);
        } else {
            panic!("expected join kind");
        }
    }
}
