//! View transforms: 2D affine matrices and the pan/zoom/drag pointer tool.
//!
//! The matrix layout matches SVG's `matrix(a,b,c,d,e,f)` so a view transform
//! serializes straight into a `transform` attribute.

use std::collections::HashMap;

use crate::config::Config;
use crate::layout::Bounds;

pub const ZOOM_IN_FACTOR: f64 = 1.618_033_988_7;
pub const ZOOM_OUT_FACTOR: f64 = 0.618_033_988_7;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Column-major 2D affine transform:
///
/// ```text
/// | a c e |
/// | b d f |
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine2 {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Default for Affine2 {
    fn default() -> Self {
        Self::identity()
    }
}

impl Affine2 {
    pub fn identity() -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            e: 0.0,
            f: 0.0,
        }
    }

    pub fn translation(tx: f64, ty: f64) -> Self {
        Self {
            e: tx,
            f: ty,
            ..Self::identity()
        }
    }

    pub fn scaling(s: f64) -> Self {
        Self {
            a: s,
            d: s,
            ..Self::identity()
        }
    }

    /// `self * other`: `other` is applied first.
    pub fn multiply(&self, other: &Affine2) -> Affine2 {
        Affine2 {
            a: self.a * other.a + self.c * other.b,
            b: self.b * other.a + self.d * other.b,
            c: self.a * other.c + self.c * other.d,
            d: self.b * other.c + self.d * other.d,
            e: self.a * other.e + self.c * other.f + self.e,
            f: self.b * other.e + self.d * other.f + self.f,
        }
    }

    /// Append a translation (matches SVG's `matrix.translate`).
    pub fn translate(&self, tx: f64, ty: f64) -> Affine2 {
        self.multiply(&Affine2::translation(tx, ty))
    }

    /// Append a uniform scale.
    pub fn scale(&self, s: f64) -> Affine2 {
        self.multiply(&Affine2::scaling(s))
    }

    pub fn apply(&self, p: Point) -> Point {
        Point {
            x: self.a * p.x + self.c * p.y + self.e,
            y: self.b * p.x + self.d * p.y + self.f,
        }
    }

    /// `None` when the matrix is singular.
    pub fn inverse(&self) -> Option<Affine2> {
        let det = self.a * self.d - self.b * self.c;
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let inv_det = 1.0 / det;
        Some(Affine2 {
            a: self.d * inv_det,
            b: -self.b * inv_det,
            c: -self.c * inv_det,
            d: self.a * inv_det,
            e: (self.c * self.f - self.d * self.e) * inv_det,
            f: (self.b * self.e - self.a * self.f) * inv_det,
        })
    }

    /// `matrix(a,b,c,d,e,f)` attribute value.
    pub fn to_svg(&self) -> String {
        format!(
            "matrix({},{},{},{},{},{})",
            self.a, self.b, self.c, self.d, self.e, self.f
        )
    }
}

// =============================================================================
// Pointer tool
// =============================================================================

/// What the pointer went down on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragTarget {
    Canvas,
    Element(u64),
}

/// Viewport-coordinate pointer events, already normalized by the host shell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Wheel { x: f64, y: f64, delta: f64 },
    Down { x: f64, y: f64, target: DragTarget },
    Move { x: f64, y: f64 },
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum GestureState {
    None,
    Pan,
    Drag(u64),
}

/// Pan/zoom/drag state machine over a scene-group transform.
///
/// The tool owns the view matrix (viewport <- scene) plus one optional local
/// transform per draggable element. It never touches the scene itself.
#[derive(Debug)]
pub struct ViewTool {
    pub enable_pan: bool,
    pub enable_zoom: bool,
    pub enable_drag: bool,
    pub zoom_scale: f64,
    viewport_width: f64,
    viewport_height: f64,
    view: Affine2,
    element_transforms: HashMap<u64, Affine2>,
    state: GestureState,
    // Inverse of the view captured when the gesture started.
    state_tf: Option<Affine2>,
    state_origin: Point,
}

impl ViewTool {
    pub fn new(viewport_width: f64, viewport_height: f64) -> Self {
        Self {
            enable_pan: true,
            enable_zoom: true,
            enable_drag: false,
            zoom_scale: 0.01,
            viewport_width,
            viewport_height,
            view: Affine2::identity(),
            element_transforms: HashMap::new(),
            state: GestureState::None,
            state_tf: None,
            state_origin: Point::new(0.0, 0.0),
        }
    }

    pub fn from_config(cfg: &Config, viewport_width: f64, viewport_height: f64) -> Self {
        Self {
            zoom_scale: cfg.zoom_scale,
            ..Self::new(viewport_width, viewport_height)
        }
    }

    pub fn view(&self) -> Affine2 {
        self.view
    }

    /// Local transform of a dragged element, identity if it never moved.
    pub fn element_transform(&self, id: u64) -> Affine2 {
        self.element_transforms
            .get(&id)
            .copied()
            .unwrap_or_else(Affine2::identity)
    }

    /// Map a viewport point into scene coordinates.
    pub fn to_scene(&self, x: f64, y: f64) -> Point {
        match self.view.inverse() {
            Some(inv) => inv.apply(Point::new(x, y)),
            None => Point::new(x, y),
        }
    }

    pub fn on_event(&mut self, event: PointerEvent) {
        match event {
            PointerEvent::Wheel { x, y, delta } => self.wheel(x, y, delta),
            PointerEvent::Down { x, y, target } => self.down(x, y, target),
            PointerEvent::Move { x, y } => self.pointer_move(x, y),
            PointerEvent::Up => {
                if self.state != GestureState::None {
                    self.state = GestureState::None;
                }
            }
        }
    }

    fn wheel(&mut self, x: f64, y: f64, delta: f64) {
        if !self.enable_zoom {
            return;
        }
        let delta = delta.min(2.0);
        let z = (1.0 + self.zoom_scale).powf(delta);
        let p = self.to_scene(x, y);

        // Scale around the cursor so the point under it stays put.
        let k = Affine2::translation(p.x, p.y)
            .scale(z)
            .translate(-p.x, -p.y);
        self.apply_zoom(&k);
    }

    /// Zoom around the center of the given content bounds.
    pub fn zoom_by_factor(&mut self, factor: f64, bounds: Bounds) {
        let xc = bounds.offset_x + bounds.width / 2.0;
        let yc = bounds.offset_y + bounds.height / 2.0;
        let k = Affine2::translation(xc, yc)
            .scale(factor)
            .translate(-xc, -yc);
        self.apply_zoom(&k);
    }

    pub fn zoom_in(&mut self, bounds: Bounds) {
        self.zoom_by_factor(ZOOM_IN_FACTOR, bounds);
    }

    pub fn zoom_out(&mut self, bounds: Bounds) {
        self.zoom_by_factor(ZOOM_OUT_FACTOR, bounds);
    }

    fn apply_zoom(&mut self, k: &Affine2) {
        self.view = self.view.multiply(k);
        // Keep an in-flight pan gesture consistent with the new view.
        if let Some(k_inv) = k.inverse() {
            let state_tf = match (self.state_tf, self.view.inverse()) {
                (Some(tf), _) => tf,
                (None, Some(inv)) => inv,
                (None, None) => return,
            };
            self.state_tf = Some(state_tf.multiply(&k_inv));
        }
    }

    fn down(&mut self, x: f64, y: f64, target: DragTarget) {
        let inverse = match self.view.inverse() {
            Some(inv) => inv,
            None => return,
        };
        self.state = match target {
            DragTarget::Element(id) if self.enable_drag => GestureState::Drag(id),
            _ => GestureState::Pan,
        };
        self.state_tf = Some(inverse);
        self.state_origin = inverse.apply(Point::new(x, y));
    }

    fn pointer_move(&mut self, x: f64, y: f64) {
        match self.state {
            GestureState::Pan if self.enable_pan => {
                let state_tf = match self.state_tf {
                    Some(tf) => tf,
                    None => return,
                };
                let p = state_tf.apply(Point::new(x, y));
                if let Some(start_view) = state_tf.inverse() {
                    self.view = start_view
                        .translate(p.x - self.state_origin.x, p.y - self.state_origin.y);
                }
            }
            GestureState::Drag(id) if self.enable_drag => {
                let p = self.to_scene(x, y);
                let local = self.element_transform(id);
                let moved = Affine2::translation(
                    p.x - self.state_origin.x,
                    p.y - self.state_origin.y,
                )
                .multiply(&local);
                self.element_transforms.insert(id, moved);
                self.state_origin = p;
            }
            _ => {}
        }
    }

    /// Center the content in the viewport, downscaling when it does not fit.
    /// Never scales up past 1:1.
    pub fn fit_to_bounds(&mut self, bounds: Bounds) {
        let scale = 1.0_f64
            .min(self.viewport_width / bounds.width)
            .min(self.viewport_height / bounds.height);
        self.view = Affine2::translation(self.viewport_width / 2.0, self.viewport_height / 2.0)
            .scale(scale)
            .translate(
                -(bounds.offset_x + bounds.width / 2.0),
                -(bounds.offset_y + bounds.height / 2.0),
            );
        self.state_tf = None;
        self.state = GestureState::None;
    }
}
