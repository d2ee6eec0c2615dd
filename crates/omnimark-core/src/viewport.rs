//! Viewport module for zoom/pan transforms.
//!
//! All screen <-> canvas arithmetic lives here.

use kurbo::{Affine, Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};

/// Minimum allowed zoom level.
pub const MIN_ZOOM: f64 = 0.1;
/// Maximum allowed zoom level.
pub const MAX_ZOOM: f64 = 5.0;
/// Default padding around a fitted image, in screen pixels.
pub const DEFAULT_FIT_PADDING: f64 = 40.0;

/// Viewport maps between screen space and canvas (image) space.
///
/// `offset` is the canvas-space point shown at the container origin, so
/// panning moves the camera rather than the content.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// Current zoom level, in `[MIN_ZOOM, MAX_ZOOM]`.
    pub zoom: f64,
    /// Canvas point aligned with the container's top-left corner.
    pub offset: Point,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            offset: Point::ZERO,
        }
    }
}

impl Viewport {
    /// Create a viewport at 100% with no offset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clamp a zoom level to the allowed range.
    pub fn clamp_zoom(zoom: f64) -> f64 {
        zoom.clamp(MIN_ZOOM, MAX_ZOOM)
    }

    /// Affine transform from canvas space to container-relative screen space.
    pub fn transform(&self) -> Affine {
        Affine::scale(self.zoom) * Affine::translate(-self.offset.to_vec2())
    }

    /// Convert a screen point to canvas coordinates.
    pub fn screen_to_canvas(&self, screen: Point, rect: Rect) -> Point {
        Point::new(
            (screen.x - rect.x0) / self.zoom + self.offset.x,
            (screen.y - rect.y0) / self.zoom + self.offset.y,
        )
    }

    /// Convert a canvas point to screen coordinates.
    pub fn canvas_to_screen(&self, canvas: Point, rect: Rect) -> Point {
        Point::new(
            (canvas.x - self.offset.x) * self.zoom + rect.x0,
            (canvas.y - self.offset.y) * self.zoom + rect.y0,
        )
    }

    /// Set the zoom level without moving the offset.
    pub fn set_zoom(&mut self, zoom: f64) {
        if !zoom.is_finite() {
            log::warn!("Ignoring non-finite zoom request: {}", zoom);
            return;
        }
        self.zoom = Self::clamp_zoom(zoom);
    }

    /// Zoom so the canvas point under `anchor` stays under it.
    pub fn zoom_toward(&mut self, new_zoom: f64, anchor: Point, rect: Rect) {
        if !new_zoom.is_finite() {
            log::warn!("Ignoring non-finite zoom request: {}", new_zoom);
            return;
        }
        let new_zoom = Self::clamp_zoom(new_zoom);
        let under_anchor = self.screen_to_canvas(anchor, rect);
        let rel = Vec2::new(anchor.x - rect.x0, anchor.y - rect.y0);

        self.zoom = new_zoom;
        self.offset = under_anchor - rel / new_zoom;
    }

    /// Multiply the zoom by `factor`, anchored when a screen point is given.
    pub fn zoom_by(&mut self, factor: f64, anchor: Option<Point>, rect: Rect) {
        let target = self.zoom * factor;
        match anchor {
            Some(anchor) => self.zoom_toward(target, anchor, rect),
            None => self.set_zoom(target),
        }
    }

    /// Pan the camera by a delta in screen coordinates.
    pub fn pan(&mut self, screen_delta: Vec2) {
        self.offset -= screen_delta / self.zoom;
    }

    /// Pan so that `anchor` (canvas space) sits under `screen` again.
    pub fn pan_to_anchor(&mut self, anchor: Point, screen: Point, rect: Rect) {
        let drift = self.screen_to_canvas(screen, rect) - anchor;
        self.pan(drift * self.zoom);
    }

    /// Fit an image inside a container with padding, never upscaling.
    pub fn fit_to_window(&mut self, container: Size, image: Size, padding: f64) {
        if image.width <= 0.0 || image.height <= 0.0 {
            *self = Self::default();
            return;
        }

        let fit = ((container.width - 2.0 * padding) / image.width)
            .min((container.height - 2.0 * padding) / image.height)
            .min(1.0);
        self.zoom = if fit.is_finite() { fit.max(MIN_ZOOM) } else { 1.0 };

        // Screen-space margin that centers the scaled image, turned into a
        // camera offset.
        let margin = Vec2::new(
            (container.width - image.width * self.zoom) / 2.0,
            (container.height - image.height * self.zoom) / 2.0,
        );
        self.offset = (-(margin / self.zoom)).to_point();
    }

    /// Canvas-space rectangle currently visible in the container.
    pub fn visible_canvas_rect(&self, rect: Rect) -> Rect {
        Rect::from_points(
            self.screen_to_canvas(Point::new(rect.x0, rect.y0), rect),
            self.screen_to_canvas(Point::new(rect.x1, rect.y1), rect),
        )
    }

    /// Whether the viewport can be rendered.
    pub fn is_valid(&self) -> bool {
        self.zoom.is_finite()
            && (MIN_ZOOM..=MAX_ZOOM).contains(&self.zoom)
            && self.offset.x.is_finite()
            && self.offset.y.is_finite()
    }
}
