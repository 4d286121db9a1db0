//! Per-node statistics, folded bottom-up over a tree result.
//!
//! Leaves carry seeded sample counts from the server; every internal node
//! combines its two children. Classification trees aggregate per-class
//! counts, regression trees combine mean/deviation with the pooled-variance
//! formula. A zero-count node keeps its numeric fields unset so no NaN can
//! leak into labels or popovers.

use std::collections::HashMap;

use serde::Deserialize;

use crate::tree::{LeafValue, NodeId, Tree, TreeNode};

/// Pre-seeded leaf statistics as they appear on the wire. All fields are
/// optional; absent leaves fall back to empty stats.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SeedStats {
    pub counts: Option<Vec<u64>>,
    pub count: Option<u64>,
    pub mu: Option<f64>,
    pub sigma: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeStats {
    Classification {
        /// Per-class sample counts, index-aligned with the tree's symbols.
        counts: Vec<u64>,
        count: u64,
        /// Samples matching the majority/terminal class.
        success_count: u64,
    },
    Regression {
        count: u64,
        mu: Option<f64>,
        sigma: Option<f64>,
        min: Option<f64>,
        max: Option<f64>,
    },
}

impl NodeStats {
    pub fn count(&self) -> u64 {
        match self {
            NodeStats::Classification { count, .. } => *count,
            NodeStats::Regression { count, .. } => *count,
        }
    }

    pub fn success_count(&self) -> u64 {
        match self {
            NodeStats::Classification { success_count, .. } => *success_count,
            NodeStats::Regression { .. } => 0,
        }
    }
}

/// Index of the largest class count.
pub fn majority_index(counts: &[u64]) -> usize {
    let mut max_index = 0;
    let mut max_count = 0;
    for (i, &c) in counts.iter().enumerate() {
        if c > max_count {
            max_count = c;
            max_index = i;
        }
    }
    max_index
}

/// Fold seeded leaf statistics up to every node of the tree.
///
/// Pure over its inputs: re-running on the same tree and seeds reproduces
/// the same map, and the seeds are never mutated.
pub fn compute_stats(tree: &Tree, base: &HashMap<NodeId, SeedStats>) -> HashMap<NodeId, NodeStats> {
    let mut out = HashMap::with_capacity(tree.root.node_count());
    fold(tree, &tree.root, base, &mut out);
    out
}

fn fold(
    tree: &Tree,
    node: &TreeNode,
    base: &HashMap<NodeId, SeedStats>,
    out: &mut HashMap<NodeId, NodeStats>,
) -> NodeStats {
    let stats = match node.children() {
        Some((true_child, false_child)) => {
            let true_stats = fold(tree, true_child, base, out);
            let false_stats = fold(tree, false_child, base, out);
            if tree.is_classification() {
                combine_classification(&true_stats, &false_stats)
            } else {
                combine_regression(&true_stats, &false_stats)
            }
        }
        None => leaf_stats(tree, node, base.get(&node.id())),
    };
    out.insert(node.id(), stats.clone());
    stats
}

fn leaf_stats(tree: &Tree, node: &TreeNode, seed: Option<&SeedStats>) -> NodeStats {
    if tree.is_classification() {
        let mut counts = seed
            .and_then(|s| s.counts.clone())
            .unwrap_or_else(|| vec![0; tree.symbols.len()]);
        counts.resize(tree.symbols.len(), 0);
        let count: u64 = counts.iter().sum();

        // A leaf's success count is the count of its own terminal class.
        let mut success_count = 0;
        if count > 0 {
            if let TreeNode::Leaf {
                value: LeafValue::Symbol(value),
                ..
            } = node
            {
                if let Some(i) = tree.symbols.iter().position(|s| s == value) {
                    success_count = counts[i];
                }
            }
        }
        NodeStats::Classification {
            counts,
            count,
            success_count,
        }
    } else {
        match seed {
            Some(seed) if seed.count.unwrap_or(0) > 0 => NodeStats::Regression {
                count: seed.count.unwrap_or(0),
                mu: Some(seed.mu.unwrap_or(0.0)),
                sigma: Some(seed.sigma.unwrap_or(0.0)),
                min: seed.min,
                max: seed.max,
            },
            _ => NodeStats::Regression {
                count: 0,
                mu: None,
                sigma: None,
                min: None,
                max: None,
            },
        }
    }
}

fn classification_fields(stats: &NodeStats) -> (&[u64], u64, u64) {
    match stats {
        NodeStats::Classification {
            counts,
            count,
            success_count,
        } => (counts, *count, *success_count),
        NodeStats::Regression { .. } => (&[], 0, 0),
    }
}

fn combine_classification(true_stats: &NodeStats, false_stats: &NodeStats) -> NodeStats {
    let (t_counts, t_count, t_success) = classification_fields(true_stats);
    let (f_counts, f_count, f_success) = classification_fields(false_stats);

    let len = t_counts.len().max(f_counts.len());
    let mut counts = vec![0u64; len];
    for (i, slot) in counts.iter_mut().enumerate() {
        *slot = t_counts.get(i).copied().unwrap_or(0) + f_counts.get(i).copied().unwrap_or(0);
    }
    let count: u64 = counts.iter().sum();

    // Success flows up from whichever children actually saw samples.
    let success_count = match (t_count > 0, f_count > 0) {
        (true, true) => t_success + f_success,
        (true, false) => t_success,
        (false, true) => f_success,
        (false, false) => 0,
    };

    NodeStats::Classification {
        counts,
        count,
        success_count,
    }
}

fn combine_regression(true_stats: &NodeStats, false_stats: &NodeStats) -> NodeStats {
    let empty = NodeStats::Regression {
        count: 0,
        mu: None,
        sigma: None,
        min: None,
        max: None,
    };
    let t = match true_stats {
        NodeStats::Regression { .. } => true_stats,
        NodeStats::Classification { .. } => &empty,
    };
    let f = match false_stats {
        NodeStats::Regression { .. } => false_stats,
        NodeStats::Classification { .. } => &empty,
    };

    let count = t.count() + f.count();
    if count == 0 {
        return empty;
    }
    match (t.count() > 0, f.count() > 0) {
        (true, false) => t.clone(),
        (false, true) => f.clone(),
        (false, false) => empty,
        (true, true) => {
            let (mu1, sigma1, min1, max1) = regression_fields(t);
            let (mu2, sigma2, min2, max2) = regression_fields(f);
            let p1 = t.count() as f64 / count as f64;
            let p2 = f.count() as f64 / count as f64;
            let var1 = sigma1 * sigma1;
            let var2 = sigma2 * sigma2;
            let mu = mu1 * p1 + mu2 * p2;
            // Pooled variance: within-group terms plus the between-group
            // spread of the two child means.
            let sigma = (var1 * p1 + var2 * p2 + p1 * p2 * (mu2 - mu1) * (mu2 - mu1)).sqrt();
            NodeStats::Regression {
                count,
                mu: Some(mu),
                sigma: Some(sigma),
                min: opt_min(min1, min2),
                max: opt_max(max1, max2),
            }
        }
    }
}

fn regression_fields(stats: &NodeStats) -> (f64, f64, Option<f64>, Option<f64>) {
    match stats {
        NodeStats::Regression {
            mu, sigma, min, max, ..
        } => (mu.unwrap_or(0.0), sigma.unwrap_or(0.0), *min, *max),
        NodeStats::Classification { .. } => (0.0, 0.0, None, None),
    }
}

fn opt_min(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.min(y)),
        (Some(x), None) | (None, Some(x)) => Some(x),
        (None, None) => None,
    }
}

fn opt_max(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (Some(x), None) | (None, Some(x)) => Some(x),
        (None, None) => None,
    }
}
