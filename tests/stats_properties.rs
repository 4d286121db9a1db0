//! Statistics invariants over whole trees.
//!
//! Checks the aggregate guarantees on a deeper tree than the unit tests
//! use: counts are additive, classification counts always sum to the node
//! count, and regression min/max flow up elementwise.

use gridscope::stats::{compute_stats, NodeStats};
use gridscope::tree::{TreeNode, TreeResult};

fn classification_fixture() -> TreeResult {
    TreeResult::from_json(
        r#"{
            "tree": {
                "type": "classification",
                "symbols": ["yes", "no", "maybe"],
                "attributes": ["load", "season", "temp"],
                "root": {
                    "type": "thresholdTest", "id": 1, "inputIndex": 0, "threshold": 0.5,
                    "trueChild": {
                        "type": "subsetTest", "id": 2, "inputIndex": 1, "members": ["winter"],
                        "trueChild": {"type": "leaf", "id": 4, "value": "yes"},
                        "falseChild": {"type": "leaf", "id": 5, "value": "no"}
                    },
                    "falseChild": {
                        "type": "thresholdTest", "id": 3, "inputIndex": 2, "threshold": 15.0,
                        "trueChild": {"type": "leaf", "id": 6, "value": "maybe"},
                        "falseChild": {"type": "leaf", "id": 7, "value": "yes"}
                    }
                }
            },
            "stats": {
                "4": {"counts": [10, 2, 1]},
                "5": {"counts": [3, 20, 0]},
                "6": {"counts": [0, 1, 7]},
                "7": {"counts": [5, 0, 0]}
            }
        }"#,
    )
    .unwrap()
}

fn regression_fixture() -> TreeResult {
    TreeResult::from_json(
        r#"{
            "tree": {
                "type": "regression",
                "attributes": ["load", "temp"],
                "root": {
                    "type": "thresholdTest", "id": 1, "inputIndex": 0, "threshold": 50,
                    "trueChild": {
                        "type": "thresholdTest", "id": 2, "inputIndex": 1, "threshold": 10,
                        "trueChild": {"type": "leaf", "id": 4, "value": 5.0},
                        "falseChild": {"type": "leaf", "id": 5, "value": 8.0}
                    },
                    "falseChild": {"type": "leaf", "id": 3, "value": 30.0}
                }
            },
            "stats": {
                "4": {"count": 4, "mu": 5.0, "sigma": 1.0, "min": 3.5, "max": 6.5},
                "5": {"count": 6, "mu": 8.0, "sigma": 2.0, "min": 4.0, "max": 12.0},
                "3": {"count": 10, "mu": 30.0, "sigma": 5.0, "min": 20.0, "max": 45.0}
            }
        }"#,
    )
    .unwrap()
}

fn for_each_internal(node: &TreeNode, f: &mut impl FnMut(&TreeNode, &TreeNode, &TreeNode)) {
    if let Some((t, fc)) = node.children() {
        f(node, t, fc);
        for_each_internal(t, f);
        for_each_internal(fc, f);
    }
}

#[test]
fn counts_are_additive_at_every_internal_node() {
    for result in [classification_fixture(), regression_fixture()] {
        let stats = compute_stats(&result.tree, &result.stats);
        for_each_internal(&result.tree.root, &mut |node, t, f| {
            assert_eq!(
                stats[&node.id()].count(),
                stats[&t.id()].count() + stats[&f.id()].count()
            );
        });
    }
}

#[test]
fn classification_counts_sum_to_count_everywhere() {
    let result = classification_fixture();
    let stats = compute_stats(&result.tree, &result.stats);
    result.tree.root.visit(&mut |node| match &stats[&node.id()] {
        NodeStats::Classification { counts, count, .. } => {
            assert_eq!(counts.iter().sum::<u64>(), *count);
            assert_eq!(counts.len(), result.tree.symbols.len());
        }
        other => panic!("expected classification stats, got {:?}", other),
    });
}

#[test]
fn regression_min_max_flow_up_elementwise() {
    let result = regression_fixture();
    let stats = compute_stats(&result.tree, &result.stats);
    for_each_internal(&result.tree.root, &mut |node, t, f| {
        let field = |id, pick: fn(&NodeStats) -> Option<f64>| pick(&stats[&id]);
        let min_of = |s: &NodeStats| match s {
            NodeStats::Regression { min, .. } => *min,
            _ => None,
        };
        let max_of = |s: &NodeStats| match s {
            NodeStats::Regression { max, .. } => *max,
            _ => None,
        };
        let expected_min = field(t.id(), min_of)
            .into_iter()
            .chain(field(f.id(), min_of))
            .fold(f64::INFINITY, f64::min);
        let expected_max = field(t.id(), max_of)
            .into_iter()
            .chain(field(f.id(), max_of))
            .fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(min_of(&stats[&node.id()]), Some(expected_min));
        assert_eq!(max_of(&stats[&node.id()]), Some(expected_max));
    });

    // Root spans the full value range.
    match &stats[&1] {
        NodeStats::Regression { min, max, .. } => {
            assert_eq!(min.unwrap(), 3.5);
            assert_eq!(max.unwrap(), 45.0);
        }
        other => panic!("expected regression stats, got {:?}", other),
    }
}

#[test]
fn regression_mean_is_count_weighted() {
    let result = regression_fixture();
    let stats = compute_stats(&result.tree, &result.stats);
    match &stats[&2] {
        NodeStats::Regression { count, mu, .. } => {
            assert_eq!(*count, 10);
            // 4 samples at 5.0 and 6 at 8.0.
            assert!((mu.unwrap() - 6.8).abs() < 1e-12);
        }
        other => panic!("expected regression stats, got {:?}", other),
    }
}
