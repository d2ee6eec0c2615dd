//! Renderer trait abstraction.

use crate::overlay::OverlayStyle;
use kurbo::{Rect, Size};
use omnimark_core::{Ruler, Viewport};
use peniko::Color;
use thiserror::Error;

/// Renderer errors.
#[derive(Debug, Error)]
pub enum RendererError {
    #[error("Invalid layer: {0}")]
    InvalidLayer(String),
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),
    #[error("Render failed: {0}")]
    RenderFailed(String),
}

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RendererError>;

/// Context for a single render frame.
pub struct RenderContext<'a> {
    /// Camera of the document being shown.
    pub viewport: &'a Viewport,
    /// Ruler overlay; hidden rulers are skipped.
    pub ruler: &'a Ruler,
    /// Display size in physical pixels.
    pub viewport_size: Size,
    /// Colour outside the image.
    pub background_color: Color,
    /// Rubber band of an area stroke in progress, in canvas coordinates.
    pub area_preview: Option<Rect>,
    pub overlay_style: OverlayStyle,
}

impl<'a> RenderContext<'a> {
    /// Create a new render context.
    pub fn new(viewport: &'a Viewport, ruler: &'a Ruler, viewport_size: Size) -> Self {
        Self {
            viewport,
            ruler,
            viewport_size,
            background_color: Color::from_rgba8(250, 250, 250, 255),
            area_preview: None,
            overlay_style: OverlayStyle::default(),
        }
    }

    /// Set the background color.
    pub fn with_background(mut self, color: Color) -> Self {
        self.background_color = color;
        self
    }

    /// Set the area rubber band.
    pub fn with_area_preview(mut self, rect: Option<Rect>) -> Self {
        self.area_preview = rect;
        self
    }

    pub fn with_overlay_style(mut self, style: OverlayStyle) -> Self {
        self.overlay_style = style;
        self
    }

    /// Container rectangle, anchored at the origin.
    pub fn container(&self) -> Rect {
        Rect::from_origin_size((0.0, 0.0), self.viewport_size)
    }

    /// Check that every value feeding the frame is renderable.
    pub fn validate(&self) -> RenderResult<()> {
        if !self.viewport.is_valid() {
            return Err(RendererError::InvalidFrame(format!(
                "viewport zoom={} offset={:?}",
                self.viewport.zoom, self.viewport.offset
            )));
        }
        if !self.ruler.is_valid() {
            return Err(RendererError::InvalidFrame(format!(
                "ruler {:?} length={}",
                self.ruler.state,
                self.ruler.length()
            )));
        }
        let Size { width, height } = self.viewport_size;
        if !width.is_finite() || !height.is_finite() || width < 1.0 || height < 1.0 {
            return Err(RendererError::InvalidFrame(format!(
                "display size {}x{}",
                width, height
            )));
        }
        if let Some(rect) = self.area_preview {
            if !rect.is_finite() {
                return Err(RendererError::InvalidFrame(format!("area preview {:?}", rect)));
            }
        }
        Ok(())
    }
}

/// Trait for rendering backends.
pub trait Renderer {
    /// Render one frame into the backend's display buffer.
    fn render_frame(&mut self, ctx: &RenderContext) -> RenderResult<()>;

    /// Get the background color (for clearing).
    fn background_color(&self, ctx: &RenderContext) -> Color {
        ctx.background_color
    }
}
