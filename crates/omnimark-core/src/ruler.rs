//! Ruler hit-testing, dragging and edge snapping.
//!
//! The ruler is an oriented strip centred on `(x, y)` and rotated by `angle`
//! degrees. Its local frame has the x axis along the strip. Points drawn near
//! one of the two long edges are pulled flush against that edge.

use kurbo::{Point, Size, Vec2};
use serde::{Deserialize, Serialize};

/// Height of the ruler strip in canvas units.
pub const RULER_HEIGHT: f64 = 80.0;
/// Distance from an edge within which points snap onto it.
pub const SNAP_DISTANCE: f64 = 50.0;
/// Wheel rotation increment in degrees.
pub const ROTATION_STEP: f64 = 3.0;
/// Ruler length as a multiple of the image diagonal.
const LENGTH_FACTOR: f64 = 2.0;

/// Persistent ruler state for one document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RulerState {
    pub visible: bool,
    /// Center in canvas space.
    pub x: f64,
    pub y: f64,
    /// Rotation in degrees. Unbounded; see [`RulerState::display_angle`].
    pub angle: f64,
    pub is_dragging: bool,
}

impl Default for RulerState {
    fn default() -> Self {
        Self {
            visible: false,
            x: 0.0,
            y: 0.0,
            angle: 0.0,
            is_dragging: false,
        }
    }
}

impl RulerState {
    pub fn center(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Angle normalized to `[0, 360)`.
    pub fn display_angle(&self) -> f64 {
        let a = self.angle.rem_euclid(360.0);
        // rem_euclid can round up to exactly 360 for tiny negatives.
        if a >= 360.0 { 0.0 } else { a }
    }
}

/// How a ruler drag manipulates the ruler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RulerDragMode {
    /// Move the center with the pointer.
    Translate,
    /// Rotate around the center following the pointer.
    Rotate,
}

/// Ruler drag in progress.
#[derive(Debug, Clone, Copy)]
struct RulerDrag {
    mode: RulerDragMode,
    start_pointer: Point,
    start_center: Point,
    start_angle: f64,
}

/// Result of projecting a point onto the ruler's axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapInfo {
    /// Signed distance along the ruler's normal.
    pub perp_dist: f64,
    /// Signed distance along the ruler.
    pub parallel_dist: f64,
    /// Whether the closer edge is the `+RULER_HEIGHT/2` one.
    pub snap_to_far_side: bool,
    /// Distance to the closer edge.
    pub edge_distance: f64,
    /// Whether the point is within [`SNAP_DISTANCE`] of the closer edge.
    pub in_sticky_zone: bool,
    /// Whether the point projects onto the ruler's length.
    pub within_span: bool,
}

/// Ruler engine: state plus geometry derived from the image.
#[derive(Debug, Clone)]
pub struct Ruler {
    pub state: RulerState,
    length: f64,
    drag: Option<RulerDrag>,
}

impl Default for Ruler {
    fn default() -> Self {
        Self {
            state: RulerState::default(),
            length: 0.0,
            drag: None,
        }
    }
}

impl Ruler {
    /// Create a hidden ruler sized for an image and centered on it.
    pub fn for_image(image: Size) -> Self {
        let mut ruler = Self::default();
        ruler.set_image_size(image);
        ruler.center_on(Point::new(image.width / 2.0, image.height / 2.0));
        ruler
    }

    /// Recompute the length so the strip always spans the canvas.
    pub fn set_image_size(&mut self, image: Size) {
        self.length = image.width.hypot(image.height) * LENGTH_FACTOR;
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn center_on(&mut self, point: Point) {
        self.state.x = point.x;
        self.state.y = point.y;
    }

    pub fn is_visible(&self) -> bool {
        self.state.visible
    }

    /// Show or hide the ruler. Hiding cancels a drag.
    pub fn toggle(&mut self) -> bool {
        self.state.visible = !self.state.visible;
        if !self.state.visible {
            self.end_drag();
        }
        self.state.visible
    }

    fn radians(&self) -> f64 {
        self.state.angle.to_radians()
    }

    /// Unit vector along the ruler.
    fn axis(&self) -> Vec2 {
        let theta = self.radians();
        Vec2::new(theta.cos(), theta.sin())
    }

    /// Unit normal; positive values point toward the far edge.
    fn normal(&self) -> Vec2 {
        let theta = self.radians();
        Vec2::new(theta.sin(), -theta.cos())
    }

    /// Express a canvas point in the ruler's local frame.
    pub fn to_local(&self, point: Point) -> Point {
        let d = point - self.state.center();
        let theta = -self.radians();
        let (sin, cos) = theta.sin_cos();
        Point::new(d.x * cos - d.y * sin, d.x * sin + d.y * cos)
    }

    /// Whether a canvas point lies on the ruler body.
    pub fn is_click_on_ruler(&self, point: Point) -> bool {
        if !self.state.visible {
            return false;
        }
        let local = self.to_local(point);
        local.x.abs() <= self.length / 2.0 && local.y.abs() <= RULER_HEIGHT / 2.0
    }

    /// Project a point onto the ruler's axes and pick the closer edge.
    pub fn snap_info(&self, point: Point) -> SnapInfo {
        let d = point - self.state.center();
        let perp_dist = d.dot(self.normal());
        let parallel_dist = d.dot(self.axis());

        let half = RULER_HEIGHT / 2.0;
        let far = (perp_dist - half).abs();
        let near = (perp_dist + half).abs();
        let snap_to_far_side = far <= near;
        let edge_distance = far.min(near);

        SnapInfo {
            perp_dist,
            parallel_dist,
            snap_to_far_side,
            edge_distance,
            in_sticky_zone: edge_distance < SNAP_DISTANCE,
            within_span: parallel_dist.abs() <= self.length / 2.0,
        }
    }

    /// Half-extent of an axis-aligned marker measured along the ruler normal.
    pub fn perp_extent(&self, marker: Size) -> f64 {
        let theta = self.radians();
        theta.cos().abs() * marker.height / 2.0 + theta.sin().abs() * marker.width / 2.0
    }

    /// Move a point onto the chosen edge, keeping its position along the ruler.
    ///
    /// The marker is pushed outward by its projected half-extent so it sits
    /// flush against the edge.
    pub fn snapped_point(&self, point: Point, snap_to_far_side: bool, marker: Size) -> Point {
        let d = point - self.state.center();
        let parallel = d.dot(self.axis());
        let offset = RULER_HEIGHT / 2.0 + self.perp_extent(marker);
        let perp = if snap_to_far_side { offset } else { -offset };
        self.state.center() + self.axis() * parallel + self.normal() * perp
    }

    /// Snap a point if the ruler is visible and the point is sticky.
    pub fn snap(&self, point: Point, marker: Size) -> Option<Point> {
        if !self.state.visible {
            return None;
        }
        let info = self.snap_info(point);
        (info.in_sticky_zone && info.within_span)
            .then(|| self.snapped_point(point, info.snap_to_far_side, marker))
    }

    /// Begin dragging the ruler from a canvas point.
    pub fn start_drag(&mut self, point: Point, mode: RulerDragMode) {
        self.drag = Some(RulerDrag {
            mode,
            start_pointer: point,
            start_center: self.state.center(),
            start_angle: self.state.angle,
        });
        self.state.is_dragging = true;
    }

    /// Apply the pointer position to the drag in progress.
    pub fn drag(&mut self, point: Point) {
        let Some(drag) = self.drag else {
            return;
        };
        match drag.mode {
            RulerDragMode::Translate => {
                let center = drag.start_center + (point - drag.start_pointer);
                self.center_on(center);
            }
            RulerDragMode::Rotate => {
                let from = drag.start_pointer - drag.start_center;
                let to = point - drag.start_center;
                if from.hypot2() < f64::EPSILON || to.hypot2() < f64::EPSILON {
                    return;
                }
                let delta = to.atan2() - from.atan2();
                self.state.angle = drag.start_angle + delta.to_degrees();
            }
        }
    }

    pub fn end_drag(&mut self) {
        self.drag = None;
        self.state.is_dragging = false;
    }

    /// Rotate by one wheel step; `direction` is the sign of the wheel delta.
    pub fn rotate_step(&mut self, direction: f64) {
        if direction > 0.0 {
            self.state.angle += ROTATION_STEP;
        } else if direction < 0.0 {
            self.state.angle -= ROTATION_STEP;
        }
    }

    /// Whether every value can be rendered.
    pub fn is_valid(&self) -> bool {
        self.state.x.is_finite()
            && self.state.y.is_finite()
            && self.state.angle.is_finite()
            && self.length.is_finite()
            && self.length >= 0.0
    }
}
