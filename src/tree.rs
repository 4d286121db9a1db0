//! Decision-tree result decoding.
//!
//! The server ships a tree result as JSON: a strictly binary tree of test
//! nodes and leaves, a symbol list for classification trees, attribute names
//! for the test labels, and pre-seeded per-leaf statistics.

use std::collections::HashMap;
use std::fmt;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::stats::SeedStats;

pub type NodeId = u64;

/// Terminal value of a leaf: a class symbol or a predicted number.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum LeafValue {
    Number(f64),
    Symbol(String),
}

impl fmt::Display for LeafValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LeafValue::Number(n) => write!(f, "{}", n),
            LeafValue::Symbol(s) => write!(f, "{}", s),
        }
    }
}

/// One node of the tree. The `type` tag on the wire selects the variant, so
/// an unknown node type is a decode error rather than a runtime branch.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum TreeNode {
    #[serde(rename = "thresholdTest", rename_all = "camelCase")]
    ThresholdTest {
        id: NodeId,
        input_index: usize,
        threshold: f64,
        true_child: Box<TreeNode>,
        false_child: Box<TreeNode>,
    },
    #[serde(rename = "subsetTest", rename_all = "camelCase")]
    SubsetTest {
        id: NodeId,
        input_index: usize,
        members: Vec<String>,
        true_child: Box<TreeNode>,
        false_child: Box<TreeNode>,
    },
    #[serde(rename = "leaf")]
    Leaf { id: NodeId, value: LeafValue },
}

impl TreeNode {
    pub fn id(&self) -> NodeId {
        match self {
            TreeNode::ThresholdTest { id, .. }
            | TreeNode::SubsetTest { id, .. }
            | TreeNode::Leaf { id, .. } => *id,
        }
    }

    /// True/false children of a test node, `None` for a leaf.
    pub fn children(&self) -> Option<(&TreeNode, &TreeNode)> {
        match self {
            TreeNode::ThresholdTest {
                true_child,
                false_child,
                ..
            }
            | TreeNode::SubsetTest {
                true_child,
                false_child,
                ..
            } => Some((true_child, false_child)),
            TreeNode::Leaf { .. } => None,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, TreeNode::Leaf { .. })
    }

    pub fn node_count(&self) -> usize {
        match self.children() {
            Some((t, f)) => 1 + t.node_count() + f.node_count(),
            None => 1,
        }
    }

    pub fn depth(&self) -> usize {
        match self.children() {
            Some((t, f)) => 1 + t.depth().max(f.depth()),
            None => 1,
        }
    }

    /// Depth-first visit, parents before children.
    pub fn visit<'a>(&'a self, f: &mut impl FnMut(&'a TreeNode)) {
        f(self);
        if let Some((t, fc)) = self.children() {
            t.visit(f);
            fc.visit(f);
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tree {
    /// `classification` or a regression marker.
    #[serde(rename = "type")]
    pub kind: String,
    pub root: TreeNode,
    #[serde(default)]
    pub symbols: Vec<String>,
    #[serde(default)]
    pub attributes: Vec<String>,
}

impl Tree {
    pub fn is_classification(&self) -> bool {
        self.kind == "classification"
    }

    fn attribute(&self, index: usize) -> &str {
        self.attributes.get(index).map(String::as_str).unwrap_or("?")
    }

    /// Human-readable test condition of an internal node, `None` for leaves.
    pub fn test_label(&self, node: &TreeNode) -> Option<String> {
        match node {
            TreeNode::ThresholdTest {
                input_index,
                threshold,
                ..
            } => Some(format!("{} < {}", self.attribute(*input_index), threshold)),
            TreeNode::SubsetTest {
                input_index,
                members,
                ..
            } => Some(format!(
                "{} in ({})",
                self.attribute(*input_index),
                members.join(",")
            )),
            TreeNode::Leaf { .. } => None,
        }
    }

    /// Export the tree as a Lisp `if` expression, the form consumed by the
    /// server's function-attribute task.
    pub fn to_expression(&self) -> String {
        self.node_expression(&self.root, 0)
    }

    fn node_expression(&self, node: &TreeNode, level: usize) -> String {
        match node {
            TreeNode::Leaf { value, .. } => match value {
                LeafValue::Symbol(s) if self.is_classification() => quote_string(s),
                other => other.to_string(),
            },
            TreeNode::ThresholdTest {
                input_index,
                threshold,
                true_child,
                false_child,
                ..
            } => {
                let cond = format!("(< {} {})", self.attribute(*input_index), threshold);
                self.test_expression(&cond, true_child, false_child, level)
            }
            TreeNode::SubsetTest {
                input_index,
                members,
                true_child,
                false_child,
                ..
            } => {
                let quoted: Vec<String> = members.iter().map(|m| quote_string(m)).collect();
                let cond = format!(
                    "(member {} '({}) :test #'string=)",
                    self.attribute(*input_index),
                    quoted.join(" ")
                );
                self.test_expression(&cond, true_child, false_child, level)
            }
        }
    }

    fn test_expression(
        &self,
        cond: &str,
        true_child: &TreeNode,
        false_child: &TreeNode,
        level: usize,
    ) -> String {
        let pad = "   ".repeat(level + 1);
        format!(
            "(if {}\n{}{}\n{}{})",
            cond,
            pad,
            self.node_expression(true_child, level + 1),
            pad,
            self.node_expression(false_child, level + 1)
        )
    }
}

fn quote_string(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\\\""))
}

/// Complete tree result as served for one rendering pass.
#[derive(Debug, Clone, Deserialize)]
pub struct TreeResult {
    pub tree: Tree,
    #[serde(default)]
    pub stats: HashMap<NodeId, SeedStats>,
    #[serde(default, rename = "testStats")]
    pub test_stats: Option<HashMap<NodeId, SeedStats>>,
}

impl TreeResult {
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("decoding tree result")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> &'static str {
        r#"{
            "tree": {
                "type": "classification",
                "symbols": ["yes", "no"],
                "attributes": ["load", "season"],
                "root": {
                    "type": "thresholdTest", "id": 1, "inputIndex": 0, "threshold": 0.5,
                    "trueChild": {"type": "leaf", "id": 2, "value": "yes"},
                    "falseChild": {
                        "type": "subsetTest", "id": 3, "inputIndex": 1, "members": ["winter", "fall"],
                        "trueChild": {"type": "leaf", "id": 4, "value": "no"},
                        "falseChild": {"type": "leaf", "id": 5, "value": "yes"}
                    }
                }
            },
            "stats": {
                "2": {"counts": [3, 1]},
                "4": {"counts": [0, 2]},
                "5": {"counts": [1, 0]}
            }
        }"#
    }

    #[test]
    fn decodes_classification_result() {
        let result = TreeResult::from_json(sample()).unwrap();
        assert!(result.tree.is_classification());
        assert_eq!(result.tree.root.node_count(), 5);
        assert_eq!(result.tree.root.depth(), 3);
        assert_eq!(result.stats.len(), 3);
        assert!(result.test_stats.is_none());
    }

    #[test]
    fn unknown_node_type_is_a_decode_error() {
        let raw = r#"{"tree": {"type": "classification", "root":
            {"type": "ternaryTest", "id": 1}, "attributes": []}}"#;
        assert!(TreeResult::from_json(raw).is_err());
    }

    #[test]
    fn test_labels() {
        let result = TreeResult::from_json(sample()).unwrap();
        let tree = &result.tree;
        assert_eq!(tree.test_label(&tree.root).unwrap(), "load < 0.5");
        let (_, false_child) = tree.root.children().unwrap();
        assert_eq!(
            tree.test_label(false_child).unwrap(),
            "season in (winter,fall)"
        );
        let (leaf, _) = false_child.children().unwrap();
        assert_eq!(tree.test_label(leaf), None);
    }

    #[test]
    fn leaf_value_decodes_numbers_and_symbols() {
        let sym: LeafValue = serde_json::from_str("\"hot\"").unwrap();
        assert_eq!(sym, LeafValue::Symbol("hot".to_string()));
        let num: LeafValue = serde_json::from_str("3.25").unwrap();
        assert_eq!(num, LeafValue::Number(3.25));
    }

    #[test]
    fn expression_export() {
        let result = TreeResult::from_json(sample()).unwrap();
        let expr = result.tree.to_expression();
        assert!(expr.starts_with("(if (< load 0.5)\n   \"yes\"\n   (if (member season"));
        assert!(expr.contains("'(\"winter\" \"fall\") :test #'string="));
        assert_eq!(expr.matches("(if ").count(), 2);
    }

    #[test]
    fn visit_order_is_parent_first() {
        let result = TreeResult::from_json(sample()).unwrap();
        let mut ids = Vec::new();
        result.tree.root.visit(&mut |n| ids.push(n.id()));
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }
}
