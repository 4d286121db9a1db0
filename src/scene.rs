//! Retained scene graph for the tree view.
//!
//! The renderer emits flat primitive lists; the host shell rasterizes them or
//! serializes the whole scene to SVG. Hover overlays (tooltips and popovers)
//! are part of the scene so every backend places them the same way.

use crate::layout::Bounds;
use crate::transform::Affine2;

#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    pub color: String,
    pub width: f64,
}

impl Stroke {
    pub fn new(color: &str, width: f64) -> Self {
        Self {
            color: color.to_string(),
            width,
        }
    }
}

/// Where an overlay sits relative to its anchor box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Placement {
    Top,
    Bottom,
    Left,
    Right,
}

impl Placement {
    /// Top-left corner of an overlay of the given size, relative to an
    /// anchor rectangle in the same coordinate space.
    pub fn position(
        &self,
        anchor: (f64, f64, f64, f64),
        tip_width: f64,
        tip_height: f64,
    ) -> (f64, f64) {
        let (x, y, width, height) = anchor;
        match self {
            Placement::Bottom => (x + width / 2.0 - tip_width / 2.0, y + height),
            Placement::Top => (x + width / 2.0 - tip_width / 2.0, y - tip_height),
            Placement::Left => (x - tip_width, y + height / 2.0 - tip_height / 2.0),
            Placement::Right => (x + width, y + height / 2.0 - tip_height / 2.0),
        }
    }
}

/// Hover content. Tooltips are a single line; popovers carry a title and a
/// multi-line body.
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayContent {
    Tooltip(String),
    Popover { title: String, body: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    pub placement: Placement,
    pub content: OverlayContent,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SceneItem {
    Rect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        fill: Option<String>,
        fill_opacity: Option<f64>,
        stroke: Option<Stroke>,
        overlay: Option<Overlay>,
    },
    /// Cubic curve from a parent's bottom edge to a child's top edge. The
    /// control points pull the curve through the vertical midpoint.
    CubicLink {
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        stroke: Stroke,
    },
    Circle {
        cx: f64,
        cy: f64,
        r: f64,
        fill: String,
    },
    Polyline {
        points: Vec<(f64, f64)>,
        stroke: Stroke,
    },
    Text {
        x: f64,
        y: f64,
        content: String,
        fill: Option<String>,
        centered: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub bounds: Bounds,
    pub items: Vec<SceneItem>,
}

impl Scene {
    pub fn new(bounds: Bounds) -> Self {
        Self {
            bounds,
            items: Vec::new(),
        }
    }

    pub fn push(&mut self, item: SceneItem) {
        self.items.push(item);
    }

    /// Serialize to a standalone SVG document with the view transform baked
    /// into the scene group. Overlay data rides on `data-*` attributes.
    pub fn to_svg(&self, width: f64, height: f64, view: &Affine2) -> String {
        self.serialize(width, height, view, true)
    }

    /// Export form: a standalone document with an XML declaration and no
    /// `data-*` overlay attributes, which file consumers reject.
    pub fn to_export_svg(&self, width: f64, height: f64, view: &Affine2) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>");
        out.push_str(&self.serialize(width, height, view, false));
        out
    }

    fn serialize(&self, width: f64, height: f64, view: &Affine2, with_overlays: bool) -> String {
        let mut out = String::with_capacity(self.items.len() * 96 + 256);
        out.push_str(&format!(
            "<svg version=\"1.1\" xmlns=\"http://www.w3.org/2000/svg\" width=\"{}\" height=\"{}\">",
            width, height
        ));
        out.push_str(&format!(
            "<g transform=\"{}\" style=\"font:10px sans-serif\">",
            view.to_svg()
        ));
        for item in &self.items {
            item.write_svg(&mut out, with_overlays);
        }
        out.push_str("</g></svg>");
        out
    }
}

impl SceneItem {
    fn write_svg(&self, out: &mut String, with_overlays: bool) {
        match self {
            SceneItem::Rect {
                x,
                y,
                width,
                height,
                fill,
                fill_opacity,
                stroke,
                overlay,
            } => {
                out.push_str(&format!(
                    "<rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\"",
                    x, y, width, height
                ));
                match fill {
                    Some(color) => out.push_str(&format!(" fill=\"{}\"", escape_xml(color))),
                    None => out.push_str(" fill=\"none\""),
                }
                if let Some(opacity) = fill_opacity {
                    out.push_str(&format!(" fill-opacity=\"{}\"", opacity));
                }
                if let Some(stroke) = stroke {
                    out.push_str(&format!(
                        " stroke=\"{}\" stroke-width=\"{}\"",
                        escape_xml(&stroke.color),
                        stroke.width
                    ));
                }
                if let (true, Some(overlay)) = (with_overlays, overlay) {
                    match &overlay.content {
                        OverlayContent::Tooltip(text) => {
                            out.push_str(&format!(
                                " data-original-title=\"{}\"",
                                escape_xml(text)
                            ));
                        }
                        OverlayContent::Popover { title, body } => {
                            out.push_str(&format!(
                                " data-original-title=\"{}\" data-content=\"{}\"",
                                escape_xml(title),
                                escape_xml(body)
                            ));
                        }
                    }
                }
                out.push_str("/>");
            }
            SceneItem::CubicLink {
                x1,
                y1,
                x2,
                y2,
                stroke,
            } => {
                let yc = (y1 + y2) / 2.0;
                out.push_str(&format!(
                    "<path fill=\"none\" stroke=\"{}\" stroke-width=\"{}\" d=\"M{},{} C{},{} {},{} {},{}\"/>",
                    escape_xml(&stroke.color),
                    stroke.width,
                    x1, y1, x1, yc, x2, yc, x2, y2
                ));
            }
            SceneItem::Circle { cx, cy, r, fill } => {
                out.push_str(&format!(
                    "<circle cx=\"{}\" cy=\"{}\" r=\"{}\" fill=\"{}\"/>",
                    cx,
                    cy,
                    r,
                    escape_xml(fill)
                ));
            }
            SceneItem::Polyline { points, stroke } => {
                let points: Vec<String> =
                    points.iter().map(|(x, y)| format!("{},{}", x, y)).collect();
                out.push_str(&format!(
                    "<polyline fill=\"none\" stroke=\"{}\" stroke-width=\"{}\" points=\"{}\"/>",
                    escape_xml(&stroke.color),
                    stroke.width,
                    points.join(" ")
                ));
            }
            SceneItem::Text {
                x,
                y,
                content,
                fill,
                centered,
            } => {
                out.push_str(&format!("<text x=\"{}\" y=\"{}\"", x, y));
                if let Some(color) = fill {
                    out.push_str(&format!(" fill=\"{}\"", escape_xml(color)));
                }
                if *centered {
                    out.push_str(" text-anchor=\"middle\" dominant-baseline=\"central\"");
                }
                out.push_str(&format!(">{}</text>", escape_xml(content)));
            }
        }
    }
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> Bounds {
        Bounds {
            offset_x: 0.0,
            offset_y: 0.0,
            width: 100.0,
            height: 100.0,
        }
    }

    #[test]
    fn cubic_link_control_points_pull_through_midheight() {
        let mut scene = Scene::new(bounds());
        scene.push(SceneItem::CubicLink {
            x1: 10.0,
            y1: 0.0,
            x2: 50.0,
            y2: 40.0,
            stroke: Stroke::new("darkgrey", 2.0),
        });
        let svg = scene.to_svg(200.0, 200.0, &Affine2::identity());
        assert!(svg.contains("d=\"M10,0 C10,20 50,20 50,40\""));
    }

    #[test]
    fn popover_content_is_escaped_into_data_attributes() {
        let mut scene = Scene::new(bounds());
        scene.push(SceneItem::Rect {
            x: 0.0,
            y: 0.0,
            width: 50.0,
            height: 35.0,
            fill: None,
            fill_opacity: Some(0.0),
            stroke: Some(Stroke::new("darkgrey", 2.0)),
            overlay: Some(Overlay {
                placement: Placement::Bottom,
                content: OverlayContent::Popover {
                    title: "load < 0.5".to_string(),
                    body: "<b>Object count: </b>4".to_string(),
                },
            }),
        });
        let svg = scene.to_svg(200.0, 200.0, &Affine2::identity());
        assert!(svg.contains("data-original-title=\"load &lt; 0.5\""));
        assert!(svg.contains("data-content=\"&lt;b&gt;Object count: &lt;/b&gt;4\""));
        assert!(svg.contains("fill=\"none\""));
    }

    #[test]
    fn export_form_drops_overlay_attributes() {
        let mut scene = Scene::new(bounds());
        scene.push(SceneItem::Rect {
            x: 0.0,
            y: 0.0,
            width: 50.0,
            height: 35.0,
            fill: None,
            fill_opacity: None,
            stroke: None,
            overlay: Some(Overlay {
                placement: Placement::Bottom,
                content: OverlayContent::Tooltip("node 4".to_string()),
            }),
        });
        let svg = scene.to_export_svg(200.0, 200.0, &Affine2::identity());
        assert!(svg.starts_with("<?xml version=\"1.0\""));
        assert!(!svg.contains("data-original-title"));
        assert!(svg.contains("<rect"));
    }

    #[test]
    fn view_transform_lands_on_the_scene_group() {
        let scene = Scene::new(bounds());
        let view = Affine2::translation(5.0, 6.0).scale(2.0);
        let svg = scene.to_svg(200.0, 200.0, &view);
        assert!(svg.contains("transform=\"matrix(2,0,0,2,5,6)\""));
    }

    #[test]
    fn placement_math_matches_anchor_edges() {
        let anchor = (100.0, 200.0, 50.0, 35.0);
        assert_eq!(Placement::Bottom.position(anchor, 80.0, 40.0), (85.0, 235.0));
        assert_eq!(Placement::Top.position(anchor, 80.0, 40.0), (85.0, 160.0));
        assert_eq!(Placement::Left.position(anchor, 80.0, 40.0), (20.0, 197.5));
        assert_eq!(Placement::Right.position(anchor, 80.0, 40.0), (150.0, 197.5));
    }
}
