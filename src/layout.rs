//! Tree layout: assigns a box to every node of a binary tree.
//!
//! A Reingold-Tilford variant specialized to fixed-size boxes. The
//! horizontal pass walks bottom-up carrying a branch silhouette (one extent
//! per depth level) and shifts each right sibling until the closest approach
//! between the two subtrees equals the configured padding. The vertical pass
//! stacks per-level row heights top-down.

use std::collections::HashMap;

use crate::config::Config;
use crate::tree::{NodeId, TreeNode};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NodeBox {
    pub offset_x: f64,
    pub offset_y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub offset_x: f64,
    pub offset_y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    /// Grow the box by `margin` on every side.
    pub fn expanded(self, margin: f64) -> Bounds {
        Bounds {
            offset_x: self.offset_x - margin,
            offset_y: self.offset_y - margin,
            width: self.width + 2.0 * margin,
            height: self.height + 2.0 * margin,
        }
    }
}

/// Horizontal extent of a branch at one depth level.
#[derive(Debug, Clone, Copy)]
struct Extent {
    offset_x: f64,
    width: f64,
}

#[derive(Debug, Clone)]
pub struct TreeLayout {
    pub node_width: f64,
    pub node_height: f64,
    pub x_padding: f64,
    pub y_padding: f64,
}

impl Default for TreeLayout {
    fn default() -> Self {
        Self {
            node_width: 50.0,
            node_height: 35.0,
            x_padding: 50.0,
            y_padding: 60.0,
        }
    }
}

impl TreeLayout {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            node_width: cfg.node_width,
            node_height: cfg.node_height,
            x_padding: cfg.x_padding,
            y_padding: cfg.y_padding,
        }
    }

    /// Lay out the whole tree. Returns the bounding box and one `NodeBox`
    /// per node id; the tree itself is left untouched.
    pub fn layout(&self, root: &TreeNode) -> (Bounds, HashMap<NodeId, NodeBox>) {
        let mut boxes = HashMap::with_capacity(root.node_count());
        let branch = self.x_arrange(root, &mut boxes);

        let mut x_min = f64::INFINITY;
        let mut x_max = f64::NEG_INFINITY;
        for extent in &branch {
            x_min = x_min.min(extent.offset_x);
            x_max = x_max.max(extent.offset_x + extent.width);
        }

        let mut heights = Vec::new();
        self.fill_level_heights(root, 0, &mut heights);
        let bottom = self.y_move(root, 0.0, &heights, 0, &mut boxes);

        let bounds = Bounds {
            offset_x: x_min,
            offset_y: 0.0,
            width: x_max - x_min,
            height: bottom,
        };
        (bounds, boxes)
    }

    fn x_arrange(&self, node: &TreeNode, boxes: &mut HashMap<NodeId, NodeBox>) -> Vec<Extent> {
        let width = self.node_width;
        match node.children() {
            Some((true_child, false_child)) => {
                let left = self.x_arrange(true_child, boxes);
                let mut right = self.x_arrange(false_child, boxes);

                // Push the right subtree until its closest approach to the
                // left subtree at any shared depth is exactly x_padding.
                let gap = find_branch_gap(&left, &right);
                let shift = self.x_padding - gap;
                move_subtree(false_child, shift, boxes);
                for extent in &mut right {
                    extent.offset_x += shift;
                }

                let mut branch = merge_branches(&left, &right);

                let true_center = center_of(boxes, true_child.id());
                let false_center = center_of(boxes, false_child.id());
                let offset_x = (true_center + false_center) / 2.0 - width / 2.0;
                boxes.insert(
                    node.id(),
                    NodeBox {
                        offset_x,
                        offset_y: 0.0,
                        width,
                        height: self.node_height,
                    },
                );
                branch.insert(0, Extent { offset_x, width });
                branch
            }
            None => {
                boxes.insert(
                    node.id(),
                    NodeBox {
                        offset_x: 0.0,
                        offset_y: 0.0,
                        width,
                        height: self.node_height,
                    },
                );
                vec![Extent {
                    offset_x: 0.0,
                    width,
                }]
            }
        }
    }

    fn fill_level_heights(&self, node: &TreeNode, level: usize, heights: &mut Vec<f64>) {
        if level < heights.len() {
            heights[level] = heights[level].max(self.node_height);
        } else {
            heights.push(self.node_height);
        }
        if let Some((true_child, false_child)) = node.children() {
            self.fill_level_heights(true_child, level + 1, heights);
            self.fill_level_heights(false_child, level + 1, heights);
        }
    }

    fn y_move(
        &self,
        node: &TreeNode,
        offset_y: f64,
        heights: &[f64],
        level: usize,
        boxes: &mut HashMap<NodeId, NodeBox>,
    ) -> f64 {
        if let Some(node_box) = boxes.get_mut(&node.id()) {
            node_box.offset_y = offset_y;
        }
        let bottom = offset_y + heights.get(level).copied().unwrap_or(self.node_height);
        match node.children() {
            Some((true_child, false_child)) => {
                let child_y = bottom + self.y_padding;
                let left = self.y_move(true_child, child_y, heights, level + 1, boxes);
                let right = self.y_move(false_child, child_y, heights, level + 1, boxes);
                left.max(right)
            }
            None => bottom,
        }
    }
}

fn center_of(boxes: &HashMap<NodeId, NodeBox>, id: NodeId) -> f64 {
    boxes
        .get(&id)
        .map(|b| b.offset_x + b.width / 2.0)
        .unwrap_or(0.0)
}

/// Minimum horizontal distance between two silhouettes over their shared
/// depth levels. Negative when they overlap.
fn find_branch_gap(left: &[Extent], right: &[Extent]) -> f64 {
    let mut min_gap = f64::INFINITY;
    for (l, r) in left.iter().zip(right.iter()) {
        let gap = r.offset_x - (l.offset_x + l.width);
        if gap < min_gap {
            min_gap = gap;
        }
    }
    min_gap
}

fn move_subtree(node: &TreeNode, offset: f64, boxes: &mut HashMap<NodeId, NodeBox>) {
    if let Some(node_box) = boxes.get_mut(&node.id()) {
        node_box.offset_x += offset;
    }
    if let Some((true_child, false_child)) = node.children() {
        move_subtree(true_child, offset, boxes);
        move_subtree(false_child, offset, boxes);
    }
}

/// Per level: leftmost offset of either branch, spanning to the rightmost
/// edge of whichever branch is present.
fn merge_branches(left: &[Extent], right: &[Extent]) -> Vec<Extent> {
    let len = left.len().max(right.len());
    let mut branch = Vec::with_capacity(len);
    for i in 0..len {
        let offset_x = match left.get(i) {
            Some(l) => l.offset_x,
            None => right[i].offset_x,
        };
        let width = match right.get(i) {
            Some(r) => r.offset_x + r.width - offset_x,
            None => left[i].width,
        };
        branch.push(Extent { offset_x, width });
    }
    branch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{LeafValue, TreeNode};

    fn leaf(id: NodeId) -> TreeNode {
        TreeNode::Leaf {
            id,
            value: LeafValue::Number(0.0),
        }
    }

    fn test_node(id: NodeId, true_child: TreeNode, false_child: TreeNode) -> TreeNode {
        TreeNode::ThresholdTest {
            id,
            input_index: 0,
            threshold: 0.0,
            true_child: Box::new(true_child),
            false_child: Box::new(false_child),
        }
    }

    #[test]
    fn single_leaf_at_origin_with_default_box() {
        let layout = TreeLayout::default();
        let (bounds, boxes) = layout.layout(&leaf(1));
        let b = boxes[&1];
        assert_eq!(b.offset_x, 0.0);
        assert_eq!(b.offset_y, 0.0);
        assert_eq!(b.width, 50.0);
        assert_eq!(b.height, 35.0);
        assert_eq!(bounds.offset_x, 0.0);
        assert_eq!(bounds.offset_y, 0.0);
        assert_eq!(bounds.width, 50.0);
        assert_eq!(bounds.height, 35.0);
    }

    #[test]
    fn two_leaves_are_separated_by_exactly_the_padding() {
        let layout = TreeLayout::default();
        let root = test_node(1, leaf(2), leaf(3));
        let (bounds, boxes) = layout.layout(&root);

        assert_eq!(boxes[&2].offset_x, 0.0);
        assert_eq!(boxes[&3].offset_x, 100.0);
        // Gap between the leaf boxes is the padding.
        assert_eq!(boxes[&3].offset_x - (boxes[&2].offset_x + boxes[&2].width), 50.0);
        // Parent centered over its children's combined span.
        assert_eq!(boxes[&1].offset_x, 50.0);

        // Children sit one level height plus padding below the root.
        assert_eq!(boxes[&1].offset_y, 0.0);
        assert_eq!(boxes[&2].offset_y, 95.0);
        assert_eq!(bounds.height, 130.0);
        assert_eq!(bounds.width, 150.0);
    }

    #[test]
    fn expanded_bounds_grow_symmetrically() {
        let b = Bounds {
            offset_x: 10.0,
            offset_y: 20.0,
            width: 100.0,
            height: 50.0,
        }
        .expanded(20.0);
        assert_eq!(b.offset_x, -10.0);
        assert_eq!(b.offset_y, 0.0);
        assert_eq!(b.width, 140.0);
        assert_eq!(b.height, 90.0);
    }

    #[test]
    fn merge_keeps_leftmost_offset_and_rightmost_edge() {
        let left = vec![Extent {
            offset_x: 0.0,
            width: 50.0,
        }];
        let right = vec![
            Extent {
                offset_x: 100.0,
                width: 50.0,
            },
            Extent {
                offset_x: 80.0,
                width: 50.0,
            },
        ];
        let merged = merge_branches(&left, &right);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].offset_x, 0.0);
        assert_eq!(merged[0].width, 150.0);
        assert_eq!(merged[1].offset_x, 80.0);
        assert_eq!(merged[1].width, 50.0);
    }
}
