//! Tree renderer: turns a decoded tree result into a scene.
//!
//! Geometry comes from the layout pass, colors from the symbol map, and all
//! numbers shown to the user go through `format_number`. Boxes are snapped to
//! the pixel grid (round plus half a pixel) so 1px and 2px strokes stay crisp
//! at identity zoom.

use std::collections::HashMap;

use crate::color::ColorMap;
use crate::config::Config;
use crate::layout::{NodeBox, TreeLayout};
use crate::logging::{log, obj, v_num, Domain, Level};
use crate::scene::{Overlay, OverlayContent, Placement, Scene, SceneItem, Stroke};
use crate::stats::{compute_stats, majority_index, NodeStats};
use crate::tree::{NodeId, TreeNode, TreeResult};

const BOX_STROKE: &str = "darkgrey";
const LINK_COLOR: &str = "darkgrey";
const BADGE_RADIUS: f64 = 7.0;
const FAIL_STRIP_HEIGHT: f64 = 8.0;
const TEST_LABEL_GAP: f64 = 5.0;

/// Significant-digit formatting with trailing zeros stripped, so labels read
/// "15.5" rather than "15.5000".
pub fn format_number(x: f64, precision: usize) -> String {
    if !x.is_finite() {
        return x.to_string();
    }
    if x == 0.0 {
        return "0".to_string();
    }
    let exp = x.abs().log10().floor() as i32;
    let mut s = if exp < -6 || exp >= precision as i32 {
        format!("{:.*e}", precision.saturating_sub(1), x)
    } else {
        let decimals = (precision as i32 - 1 - exp).max(0) as usize;
        format!("{:.*}", decimals, x)
    };
    if let Some(dot) = s.find('.') {
        let end = match s.find('e') {
            Some(e) => e,
            None => s.len(),
        };
        let mantissa_end = s[dot..end]
            .trim_end_matches('0')
            .trim_end_matches('.')
            .len()
            + dot;
        s.replace_range(mantissa_end..end, "");
    }
    s
}

/// Node box snapped to the pixel grid.
#[derive(Debug, Clone, Copy)]
struct PixelRect {
    x_min: f64,
    y_min: f64,
    x_max: f64,
    y_max: f64,
}

impl PixelRect {
    fn snap(b: &NodeBox) -> Self {
        Self {
            x_min: b.offset_x.round() + 0.5,
            y_min: b.offset_y.round() + 0.5,
            x_max: (b.offset_x + b.width).round() + 0.5,
            y_max: (b.offset_y + b.height).round() + 0.5,
        }
    }

    fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    fn x_center(&self) -> f64 {
        (self.x_min + self.x_max) / 2.0
    }

    fn y_center(&self) -> f64 {
        (self.y_min + self.y_max) / 2.0
    }
}

pub struct TreeRenderer {
    layout: TreeLayout,
    margin: f64,
}

impl Default for TreeRenderer {
    fn default() -> Self {
        Self {
            layout: TreeLayout::default(),
            margin: 20.0,
        }
    }
}

struct RenderPass<'a> {
    result: &'a TreeResult,
    stats: HashMap<NodeId, NodeStats>,
    test_stats: Option<HashMap<NodeId, NodeStats>>,
    boxes: HashMap<NodeId, NodeBox>,
    colors: ColorMap,
    node_width: f64,
}

impl TreeRenderer {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            layout: TreeLayout::from_config(cfg),
            margin: cfg.fit_margin,
        }
    }

    /// Build the scene for one tree result. Bounds include the fit margin.
    pub fn render(&self, result: &TreeResult) -> Scene {
        let stats = compute_stats(&result.tree, &result.stats);
        let test_stats = result
            .test_stats
            .as_ref()
            .map(|seeds| compute_stats(&result.tree, seeds));
        let (bounds, boxes) = self.layout.layout(&result.tree.root);

        log(
            Level::Debug,
            Domain::Render,
            "tree_rendered",
            obj(&[
                ("nodes", v_num(result.tree.root.node_count() as f64)),
                ("depth", v_num(result.tree.root.depth() as f64)),
            ]),
        );

        let mut pass = RenderPass {
            result,
            stats,
            test_stats,
            boxes,
            colors: ColorMap::new(),
            node_width: self.layout.node_width,
        };
        let mut scene = Scene::new(bounds.expanded(self.margin));
        pass.draw_node(&result.tree.root, &mut scene);
        scene
    }
}

impl RenderPass<'_> {
    fn node_stats(&self, id: NodeId) -> NodeStats {
        self.stats.get(&id).cloned().unwrap_or_else(|| {
            NodeStats::Regression {
                count: 0,
                mu: None,
                sigma: None,
                min: None,
                max: None,
            }
        })
    }

    fn rect(&self, node: &TreeNode) -> PixelRect {
        let node_box = self
            .boxes
            .get(&node.id())
            .copied()
            .unwrap_or_default();
        PixelRect::snap(&node_box)
    }

    fn draw_node(&mut self, node: &TreeNode, scene: &mut Scene) {
        let rect = self.rect(node);
        let node_stats = self.node_stats(node.id());
        let root_stats = self.node_stats(self.result.tree.root.id());

        if let Some((true_child, false_child)) = node.children() {
            self.draw_links(node, true_child, false_child, &rect, &root_stats, scene);
        }

        if self.result.tree.is_classification() {
            self.draw_class_slices(node, &rect, &node_stats, scene);
        } else {
            self.draw_regression_body(&rect, &node_stats, &root_stats, scene);
        }

        if let Some(label) = self.node_label(&node_stats) {
            scene.push(SceneItem::Text {
                x: rect.x_center(),
                y: rect.y_center(),
                content: label,
                fill: None,
                centered: true,
            });
        }

        // Outline on top of the slices; it doubles as the popover anchor.
        let (title, body) = self.popover_content(node, &node_stats);
        scene.push(SceneItem::Rect {
            x: rect.x_min,
            y: rect.y_min,
            width: rect.width(),
            height: rect.height(),
            fill: None,
            fill_opacity: Some(0.0),
            stroke: Some(Stroke::new(BOX_STROKE, 2.0)),
            overlay: Some(Overlay {
                placement: Placement::Bottom,
                content: OverlayContent::Popover { title, body },
            }),
        });

        if let Some((true_child, false_child)) = node.children() {
            self.draw_node(true_child, scene);
            self.draw_node(false_child, scene);
        }

        if let Some(test_label) = self.result.tree.test_label(node) {
            scene.push(SceneItem::Text {
                x: rect.x_center(),
                y: rect.y_max + TEST_LABEL_GAP,
                content: test_label,
                fill: None,
                centered: true,
            });
        }
    }

    /// Links to both children, each as thick as the share of samples that
    /// flows through it, with a y/n badge at the midpoint.
    fn draw_links(
        &mut self,
        _node: &TreeNode,
        true_child: &TreeNode,
        false_child: &TreeNode,
        rect: &PixelRect,
        root_stats: &NodeStats,
        scene: &mut Scene,
    ) {
        let root_count = root_stats.count().max(1) as f64;
        let left_width = (self.node_stats(true_child.id()).count() as f64 / root_count
            * self.node_width
            / 2.0)
            .max(1.0);
        let right_width = (self.node_stats(false_child.id()).count() as f64 / root_count
            * self.node_width
            / 2.0)
            .max(1.0);
        let total_width = left_width + right_width;

        let left_rect = self.rect(true_child);
        let right_rect = self.rect(false_child);

        let x1 = (rect.x_min + rect.x_max - total_width + left_width) / 2.0;
        self.draw_link(
            x1,
            rect.y_max,
            left_rect.x_center(),
            left_rect.y_min,
            left_width,
            true,
            scene,
        );

        let x1 = (rect.x_min + rect.x_max + total_width - right_width) / 2.0;
        self.draw_link(
            x1,
            rect.y_max,
            right_rect.x_center(),
            right_rect.y_min,
            right_width,
            false,
            scene,
        );
    }

    fn draw_link(
        &mut self,
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        width: f64,
        outcome: bool,
        scene: &mut Scene,
    ) {
        scene.push(SceneItem::CubicLink {
            x1,
            y1,
            x2,
            y2,
            stroke: Stroke::new(LINK_COLOR, width),
        });
        let xc = (x1 + x2) / 2.0;
        let yc = (y1 + y2) / 2.0;
        scene.push(SceneItem::Circle {
            cx: xc,
            cy: yc,
            r: BADGE_RADIUS,
            fill: LINK_COLOR.to_string(),
        });
        scene.push(SceneItem::Text {
            x: xc,
            y: yc,
            content: if outcome { "y" } else { "n" }.to_string(),
            fill: Some("white".to_string()),
            centered: true,
        });
    }

    /// One slice per class with samples, plus the test fail-rate strip when
    /// test statistics are available.
    fn draw_class_slices(
        &mut self,
        node: &TreeNode,
        rect: &PixelRect,
        node_stats: &NodeStats,
        scene: &mut Scene,
    ) {
        if let NodeStats::Classification { counts, count, .. } = node_stats {
            if *count > 0 {
                let mut x = rect.x_min;
                for (i, &class_count) in counts.iter().enumerate() {
                    if class_count == 0 {
                        continue;
                    }
                    let symbol = self.result.tree.symbols.get(i).map(String::as_str);
                    let fill = self.colors.color(symbol).to_string();
                    let dx = class_count as f64 / *count as f64 * rect.width();
                    scene.push(SceneItem::Rect {
                        x,
                        y: rect.y_min,
                        width: dx,
                        height: rect.height(),
                        fill: Some(fill),
                        fill_opacity: None,
                        stroke: None,
                        overlay: None,
                    });
                    x += dx;
                }
            }
        }

        if let Some(test_stats) = &self.test_stats {
            scene.push(SceneItem::Rect {
                x: rect.x_min,
                y: rect.y_max - FAIL_STRIP_HEIGHT,
                width: rect.width(),
                height: FAIL_STRIP_HEIGHT,
                fill: Some("white".to_string()),
                fill_opacity: None,
                stroke: None,
                overlay: None,
            });
            if let Some(node_test) = test_stats.get(&node.id()) {
                let count = node_test.count();
                let success = node_test.success_count();
                if count > 0 && count > success {
                    let fail_width = (count - success) as f64 / count as f64 * rect.width();
                    scene.push(SceneItem::Rect {
                        x: rect.x_max - fail_width,
                        y: rect.y_max - FAIL_STRIP_HEIGHT,
                        width: fail_width,
                        height: FAIL_STRIP_HEIGHT,
                        fill: Some("red".to_string()),
                        fill_opacity: None,
                        stroke: None,
                        overlay: None,
                    });
                }
            }
        }
    }

    /// White box with the mean marked as a vertical line and one standard
    /// deviation shaded around it, scaled to the root's value range.
    fn draw_regression_body(
        &mut self,
        rect: &PixelRect,
        node_stats: &NodeStats,
        root_stats: &NodeStats,
        scene: &mut Scene,
    ) {
        scene.push(SceneItem::Rect {
            x: rect.x_min,
            y: rect.y_min,
            width: rect.width(),
            height: rect.height(),
            fill: Some("white".to_string()),
            fill_opacity: None,
            stroke: None,
            overlay: None,
        });

        let (mu, sigma) = match node_stats {
            NodeStats::Regression {
                count, mu, sigma, ..
            } if *count > 0 => (mu.unwrap_or(0.0), sigma.unwrap_or(0.0)),
            _ => return,
        };
        let (root_min, root_max) = match root_stats {
            NodeStats::Regression { min, max, .. } => {
                (min.unwrap_or(0.0), max.unwrap_or(0.0))
            }
            _ => (0.0, 0.0),
        };
        let span = root_max - root_min;

        let ratio = if span > 0.0 { (mu - root_min) / span } else { 0.5 };
        let x = (rect.x_min + ratio * rect.width()).round() + 0.5;

        if sigma > 0.0 {
            let sigma_ratio = if span > 0.0 { sigma / span } else { 0.0 };
            let dx = (sigma_ratio * rect.width()).round();
            scene.push(SceneItem::Rect {
                x: x - dx,
                y: rect.y_min,
                width: 2.0 * dx,
                height: rect.height(),
                fill: Some("lightblue".to_string()),
                fill_opacity: None,
                stroke: None,
                overlay: None,
            });
        }

        scene.push(SceneItem::Polyline {
            points: vec![(x, rect.y_min), (x, rect.y_max)],
            stroke: Stroke::new("black", 1.0),
        });
    }

    /// In-box label: regression nodes show "mu (sigma)", classification
    /// nodes have no label (the slices speak for themselves).
    fn node_label(&self, node_stats: &NodeStats) -> Option<String> {
        match node_stats {
            NodeStats::Regression {
                count, mu, sigma, ..
            } if !self.result.tree.is_classification() && *count > 0 => Some(format!(
                "{} ({})",
                format_number(mu.unwrap_or(0.0), 6),
                format_number(sigma.unwrap_or(0.0), 6)
            )),
            _ => None,
        }
    }

    fn popover_content(&self, node: &TreeNode, node_stats: &NodeStats) -> (String, String) {
        let title = match node {
            TreeNode::Leaf { value, .. } => format!("Leaf : {}", value),
            _ => self.result.tree.test_label(node).unwrap_or_default(),
        };

        let count = node_stats.count();
        let mut body = format!("<b>Object count: </b>{}", count);
        if count > 0 {
            match node_stats {
                NodeStats::Classification {
                    counts,
                    success_count,
                    ..
                } => {
                    let symbols = &self.result.tree.symbols;
                    let majority = symbols
                        .get(majority_index(counts))
                        .map(String::as_str)
                        .unwrap_or("?");
                    body.push_str(&format!("<br><b>Majority symbol: </b>{}", majority));
                    body.push_str(&format!(
                        "<br><b>Success rate: </b>{}%",
                        format_number(*success_count as f64 / count as f64 * 100.0, 6)
                    ));
                    body.push_str("<br><b>Distribution </b>");
                    for (i, &class_count) in counts.iter().enumerate() {
                        if class_count > 0 {
                            if let Some(symbol) = symbols.get(i) {
                                body.push_str(&format!("<br>{}: {}", symbol, class_count));
                            }
                        }
                    }
                }
                NodeStats::Regression {
                    mu, sigma, min, max, ..
                } => {
                    body.push_str(&format!("<br><b>Mu: </b>{}", mu.unwrap_or(0.0)));
                    body.push_str(&format!("<br><b>Sigma: </b>{}", sigma.unwrap_or(0.0)));
                    body.push_str(&format!("<br><b>Min: </b>{}", min.unwrap_or(0.0)));
                    body.push_str(&format!("<br><b>Max: </b>{}", max.unwrap_or(0.0)));
                }
            }
        }
        (title, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::TreeResult;

    #[test]
    fn format_number_trims_trailing_zeros() {
        assert_eq!(format_number(15.5, 6), "15.5");
        assert_eq!(format_number(5.0, 6), "5");
        assert_eq!(format_number(0.0, 6), "0");
        assert_eq!(format_number(1.0 / 3.0, 6), "0.333333");
        assert_eq!(format_number(66.666666666 , 6), "66.6667");
    }

    #[test]
    fn pixel_snap_lands_on_half_pixels() {
        let rect = PixelRect::snap(&NodeBox {
            offset_x: 10.3,
            offset_y: 20.7,
            width: 50.0,
            height: 35.0,
        });
        assert_eq!(rect.x_min, 10.5);
        assert_eq!(rect.y_min, 21.5);
        assert_eq!(rect.x_max, 60.5);
        assert_eq!(rect.y_max, 56.5);
    }

    fn classification_result(with_test_stats: bool) -> TreeResult {
        let test_stats = if with_test_stats {
            r#", "testStats": {"2": {"counts": [3, 1]}, "3": {"counts": [0, 4]}}"#
        } else {
            ""
        };
        let raw = format!(
            r#"{{
                "tree": {{
                    "type": "classification",
                    "symbols": ["yes", "no"],
                    "attributes": ["load"],
                    "root": {{
                        "type": "thresholdTest", "id": 1, "inputIndex": 0, "threshold": 0.5,
                        "trueChild": {{"type": "leaf", "id": 2, "value": "yes"}},
                        "falseChild": {{"type": "leaf", "id": 3, "value": "no"}}
                    }}
                }},
                "stats": {{
                    "2": {{"counts": [6, 2]}},
                    "3": {{"counts": [1, 3]}}
                }}{}
            }}"#,
            test_stats
        );
        TreeResult::from_json(&raw).unwrap()
    }

    #[test]
    fn class_slices_partition_the_box() {
        let result = classification_result(false);
        let scene = TreeRenderer::default().render(&result);
        // Root box spans 50px with 7 yes / 5 no: slice widths partition it.
        let slices: Vec<(f64, f64)> = scene
            .items
            .iter()
            .filter_map(|item| match item {
                SceneItem::Rect {
                    x,
                    width,
                    fill: Some(color),
                    ..
                } if color != "white" => Some((*x, *width)),
                _ => None,
            })
            .collect();
        // Three boxes, two slices each (every node saw both classes).
        assert_eq!(slices.len(), 6);
        let total: f64 = slices.iter().take(2).map(|(_, w)| w).sum();
        assert!((total - 50.0).abs() < 1e-9);
    }

    #[test]
    fn fail_strip_appears_only_with_test_stats() {
        let renderer = TreeRenderer::default();
        let without = renderer.render(&classification_result(false));
        let with = renderer.render(&classification_result(true));

        let red = |scene: &Scene| {
            scene
                .items
                .iter()
                .filter(|item| {
                    matches!(item, SceneItem::Rect { fill: Some(c), .. } if c == "red")
                })
                .count()
        };
        assert_eq!(red(&without), 0);
        // Leaf 2 fails 1 of 4 test samples; leaf 3 and the root pass clean
        // or fail partially depending on aggregation.
        assert!(red(&with) >= 1);
    }

    #[test]
    fn links_carry_yes_and_no_badges() {
        let result = classification_result(false);
        let scene = TreeRenderer::default().render(&result);
        let texts: Vec<&str> = scene
            .items
            .iter()
            .filter_map(|item| match item {
                SceneItem::Text { content, .. } => Some(content.as_str()),
                _ => None,
            })
            .collect();
        assert!(texts.contains(&"y"));
        assert!(texts.contains(&"n"));
    }

    #[test]
    fn regression_nodes_get_mu_line_and_sigma_band() {
        let raw = r#"{
            "tree": {
                "type": "regression",
                "attributes": ["load"],
                "root": {
                    "type": "thresholdTest", "id": 1, "inputIndex": 0, "threshold": 100,
                    "trueChild": {"type": "leaf", "id": 2, "value": 10},
                    "falseChild": {"type": "leaf", "id": 3, "value": 20}
                }
            },
            "stats": {
                "2": {"count": 2, "mu": 10, "sigma": 1, "min": 9, "max": 11},
                "3": {"count": 2, "mu": 20, "sigma": 1, "min": 18, "max": 22}
            }
        }"#;
        let result = TreeResult::from_json(raw).unwrap();
        let scene = TreeRenderer::default().render(&result);

        let mu_lines = scene
            .items
            .iter()
            .filter(|item| matches!(item, SceneItem::Polyline { .. }))
            .count();
        assert_eq!(mu_lines, 3);

        let bands = scene
            .items
            .iter()
            .filter(|item| {
                matches!(item, SceneItem::Rect { fill: Some(c), .. } if c == "lightblue")
            })
            .count();
        assert_eq!(bands, 3);

        // Labels show "mu (sigma)".
        let has_label = scene.items.iter().any(|item| {
            matches!(item, SceneItem::Text { content, .. } if content == "10 (1)")
        });
        assert!(has_label);
    }

    #[test]
    fn popover_reports_distribution() {
        let result = classification_result(false);
        let renderer = TreeRenderer::default();
        let scene = renderer.render(&result);
        let body = scene.items.iter().find_map(|item| match item {
            SceneItem::Rect {
                overlay:
                    Some(Overlay {
                        content: OverlayContent::Popover { title, body },
                        ..
                    }),
                ..
            } if title == "load < 0.5" => Some(body.clone()),
            _ => None,
        });
        let body = body.unwrap();
        assert!(body.contains("<b>Object count: </b>12"));
        assert!(body.contains("Majority symbol: </b>yes"));
        assert!(body.contains("yes: 7"));
        assert!(body.contains("no: 5"));
    }

    #[test]
    fn zero_count_node_has_neutral_popover_body() {
        let raw = r#"{
            "tree": {
                "type": "classification",
                "symbols": ["yes", "no"],
                "attributes": ["load"],
                "root": {"type": "leaf", "id": 1, "value": "yes"}
            },
            "stats": {}
        }"#;
        let result = TreeResult::from_json(raw).unwrap();
        let scene = TreeRenderer::default().render(&result);
        let body = scene.items.iter().find_map(|item| match item {
            SceneItem::Rect {
                overlay:
                    Some(Overlay {
                        content: OverlayContent::Popover { body, .. },
                        ..
                    }),
                ..
            } => Some(body.clone()),
            _ => None,
        });
        assert_eq!(body.unwrap(), "<b>Object count: </b>0");
    }
}
