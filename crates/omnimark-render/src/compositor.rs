//! Layered compositor for the active document.
//!
//! Three layers: the decoded image (never mutated), a transparent draw layer
//! holding annotations, and a screen-sized display buffer rebuilt every frame.

use crate::layer::{Layer, over};
use crate::overlay::{draw_rubber_band, draw_ruler, rgba};
use crate::raster::{StrokeRasterizer, replay};
use crate::renderer::{RenderContext, RenderResult, Renderer, RendererError};
use image::RgbaImage;
use kurbo::{Rect, Size};
use omnimark_core::{History, InteractionEffect, ToolKind};
use std::sync::Arc;

/// Live layers of the document currently on screen.
pub struct Compositor {
    base: Arc<RgbaImage>,
    draw: Layer,
    display: RgbaImage,
    /// Rasterizer of the stroke being captured.
    active: Option<StrokeRasterizer>,
    area_preview: Option<Rect>,
}

impl Compositor {
    /// Build layers for a decoded image.
    pub fn new(base: Arc<RgbaImage>) -> RenderResult<Self> {
        let draw = Layer::new(base.width(), base.height())?;
        Ok(Self {
            base,
            draw,
            display: RgbaImage::new(0, 0),
            active: None,
            area_preview: None,
        })
    }

    pub fn base(&self) -> &Arc<RgbaImage> {
        &self.base
    }

    pub fn image_size(&self) -> Size {
        Size::new(f64::from(self.base.width()), f64::from(self.base.height()))
    }

    pub fn draw_layer(&self) -> &Layer {
        &self.draw
    }

    pub fn area_preview(&self) -> Option<Rect> {
        self.area_preview
    }

    /// Last rendered display buffer.
    pub fn display(&self) -> &RgbaImage {
        &self.display
    }

    /// Apply interaction effects to the layers. Returns whether a redraw is needed.
    pub fn apply_effects(&mut self, effects: &[InteractionEffect], history: &History) -> bool {
        effects
            .iter()
            .fold(false, |redraw, effect| self.apply(effect, history) || redraw)
    }

    fn apply(&mut self, effect: &InteractionEffect, history: &History) -> bool {
        match effect {
            InteractionEffect::StrokeStarted => {
                let Some(stroke) = history.open_stroke() else {
                    log::warn!("Stroke started without an open stroke");
                    return false;
                };
                let mut rasterizer = StrokeRasterizer::new(stroke.brush.clone());
                rasterizer.begin(&mut self.draw, &self.base, stroke.first_point());
                self.active = Some(rasterizer);
                true
            }
            InteractionEffect::StrokeExtended { from, to } => match self.active.as_mut() {
                Some(rasterizer) => {
                    rasterizer.segment(&mut self.draw, &self.base, *from, *to);
                    true
                }
                None => {
                    log::warn!("Segment received with no active stroke");
                    false
                }
            },
            InteractionEffect::AreaPreview(rect) => {
                self.area_preview = *rect;
                true
            }
            InteractionEffect::StrokeFinished(stroke) => {
                let mut rasterizer = self
                    .active
                    .take()
                    .unwrap_or_else(|| StrokeRasterizer::new(stroke.brush.clone()));
                match stroke.tool {
                    // Freehand strokes were drawn segment by segment.
                    ToolKind::Pen | ToolKind::Highlighter => {}
                    ToolKind::Area => rasterizer.draw_stroke(&mut self.draw, &self.base, stroke),
                }
                true
            }
            InteractionEffect::GroupCommitted(_) | InteractionEffect::GroupDiscarded => {
                self.active = None;
                false
            }
            InteractionEffect::ViewportChanged | InteractionEffect::RulerChanged => true,
        }
    }

    /// Rebuild the draw layer from the applied history.
    pub fn replay(&mut self, history: &History) {
        self.active = None;
        self.area_preview = None;
        replay(&mut self.draw, &self.base, history.active_groups());
        log::debug!(
            "Replayed {} group(s), {} point(s)",
            history.active_groups().len(),
            history.active_point_count()
        );
    }

    /// Base and draw layers merged at image resolution, without overlays.
    pub fn composite(&self) -> RgbaImage {
        let mut out = (*self.base).clone();
        for (dst, src) in out.pixels_mut().zip(self.draw.image().pixels()) {
            *dst = over(*dst, *src);
        }
        out
    }
}

impl Renderer for Compositor {
    fn render_frame(&mut self, ctx: &RenderContext) -> RenderResult<()> {
        ctx.validate()?;
        let width = ctx.viewport_size.width.round() as u32;
        let height = ctx.viewport_size.height.round() as u32;
        if width > crate::layer::MAX_LAYER_DIMENSION || height > crate::layer::MAX_LAYER_DIMENSION {
            return Err(RendererError::InvalidFrame(format!(
                "display size {}x{}",
                width, height
            )));
        }
        if self.display.width() != width || self.display.height() != height {
            self.display = RgbaImage::new(width, height);
        }

        let background = rgba(self.background_color(ctx));
        let viewport = ctx.viewport;
        let (img_w, img_h) = (self.base.width() as i64, self.base.height() as i64);

        // Canvas column for each screen column, computed once per frame.
        let columns: Vec<i64> = (0..width)
            .map(|sx| ((f64::from(sx) + 0.5) / viewport.zoom + viewport.offset.x).floor() as i64)
            .collect();
        for sy in 0..height {
            let cy = ((f64::from(sy) + 0.5) / viewport.zoom + viewport.offset.y).floor() as i64;
            for (sx, &cx) in columns.iter().enumerate() {
                let pixel = if cx >= 0 && cy >= 0 && cx < img_w && cy < img_h {
                    let (cx, cy) = (cx as u32, cy as u32);
                    let visible = over(*self.base.get_pixel(cx, cy), self.draw.pixel(cx, cy));
                    over(background, visible)
                } else {
                    background
                };
                self.display.put_pixel(sx as u32, sy, pixel);
            }
        }

        let container = ctx.container();
        if let Some(rect) = ctx.area_preview.or(self.area_preview) {
            draw_rubber_band(&mut self.display, rect, viewport, container, &ctx.overlay_style);
        }
        draw_ruler(&mut self.display, ctx.ruler, viewport, container, &ctx.overlay_style);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use kurbo::Point;
    use omnimark_core::{
        DocumentState, Modifiers, MouseButton, PointerEvent, Ruler, SerializableColor, ToolConfig,
        Viewport,
    };

    fn container() -> Rect {
        Rect::new(0.0, 0.0, 200.0, 200.0)
    }

    fn setup(w: u32, h: u32) -> (Compositor, DocumentState, ToolConfig) {
        let base = Arc::new(RgbaImage::from_pixel(w, h, Rgba([200, 200, 200, 255])));
        let compositor = Compositor::new(base).unwrap();
        let doc = DocumentState::new("test.png", Size::new(f64::from(w), f64::from(h)));
        (compositor, doc, ToolConfig::default())
    }

    fn drag(
        compositor: &mut Compositor,
        doc: &mut DocumentState,
        tools: &ToolConfig,
        points: &[(f64, f64)],
    ) {
        let mut send = |event| {
            let effects = doc.handle_pointer(event, tools, container());
            compositor.apply_effects(&effects, &doc.history);
        };
        let (x, y) = points[0];
        send(PointerEvent::Down {
            position: Point::new(x, y),
            button: MouseButton::Left,
            modifiers: Modifiers::NONE,
        });
        for &(x, y) in &points[1..] {
            send(PointerEvent::Move {
                position: Point::new(x, y),
                modifiers: Modifiers::NONE,
            });
        }
        let (x, y) = points[points.len() - 1];
        send(PointerEvent::Up {
            position: Point::new(x, y),
            button: MouseButton::Left,
        });
    }

    #[test]
    fn test_zero_sized_base_rejected() {
        let base = Arc::new(RgbaImage::new(0, 0));
        assert!(matches!(Compositor::new(base), Err(RendererError::InvalidLayer(_))));
    }

    #[test]
    fn test_undo_redo_restores_composites() {
        let (mut compositor, mut doc, tools) = setup(32, 32);
        let blank = compositor.composite();

        drag(&mut compositor, &mut doc, &tools, &[(0.0, 0.0), (10.0, 10.0)]);
        let drawn = compositor.composite();
        assert_ne!(drawn, blank);

        assert!(doc.undo());
        compositor.replay(&doc.history);
        assert_eq!(compositor.composite(), blank);

        assert!(doc.redo());
        compositor.replay(&doc.history);
        assert_eq!(compositor.composite(), drawn);
    }

    #[test]
    fn test_live_drawing_matches_replay() {
        let (mut compositor, mut doc, mut tools) = setup(120, 120);
        drag(&mut compositor, &mut doc, &tools, &[(5.0, 5.0), (60.0, 40.0), (100.0, 110.0)]);

        tools.set_tool(ToolKind::Highlighter);
        tools.set_blend(omnimark_core::BlendMode::Color);
        drag(&mut compositor, &mut doc, &tools, &[(10.0, 60.0), (110.0, 60.0), (15.0, 62.0)]);

        tools.set_tool(ToolKind::Area);
        tools.set_color(SerializableColor::new(0, 120, 255, 255));
        drag(&mut compositor, &mut doc, &tools, &[(20.0, 20.0), (50.0, 30.0), (90.0, 80.0)]);

        let live = compositor.draw_layer().clone();
        compositor.replay(&doc.history);
        assert_eq!(compositor.draw_layer(), &live);
        compositor.replay(&doc.history);
        assert_eq!(compositor.draw_layer(), &live);
    }

    #[test]
    fn test_highlighter_stroke_opacity_uniform() {
        let (mut compositor, mut doc, mut tools) = setup(100, 100);
        tools.set_tool(ToolKind::Highlighter);
        drag(
            &mut compositor,
            &mut doc,
            &tools,
            &[(10.0, 50.0), (90.0, 50.0), (10.0, 51.0), (90.0, 49.0)],
        );
        let expected = (tools.current_brush().opacity * 255.0).round() as u8;
        assert!(
            compositor
                .draw_layer()
                .image()
                .pixels()
                .filter(|p| p[3] > 0)
                .all(|p| p[3] == expected)
        );
    }

    #[test]
    fn test_area_preview_tracks_drag() {
        let (mut compositor, mut doc, mut tools) = setup(100, 100);
        tools.set_tool(ToolKind::Area);
        let effects = doc.handle_pointer(
            PointerEvent::Down {
                position: Point::new(10.0, 10.0),
                button: MouseButton::Left,
                modifiers: Modifiers::NONE,
            },
            &tools,
            container(),
        );
        compositor.apply_effects(&effects, &doc.history);
        assert!(compositor.area_preview().is_some());

        let effects = doc.handle_pointer(
            PointerEvent::Up {
                position: Point::new(10.0, 10.0),
                button: MouseButton::Left,
            },
            &tools,
            container(),
        );
        compositor.apply_effects(&effects, &doc.history);
        assert!(compositor.area_preview().is_none());
    }

    #[test]
    fn test_render_frame_samples_through_viewport() {
        let (mut compositor, _, _) = setup(10, 10);
        let viewport = Viewport {
            zoom: 2.0,
            offset: Point::new(-5.0, -5.0),
        };
        let ruler = Ruler::default();
        let ctx = RenderContext::new(&viewport, &ruler, Size::new(40.0, 40.0));
        compositor.render_frame(&ctx).unwrap();

        let display = compositor.display();
        assert_eq!(display.dimensions(), (40, 40));
        assert_eq!(*display.get_pixel(0, 0), Rgba([250, 250, 250, 255]));
        // Screen 10 maps to canvas 0.
        assert_eq!(*display.get_pixel(10, 10), Rgba([200, 200, 200, 255]));
        assert_eq!(*display.get_pixel(29, 29), Rgba([200, 200, 200, 255]));
        assert_eq!(*display.get_pixel(30, 30), Rgba([250, 250, 250, 255]));
    }

    #[test]
    fn test_invalid_frame_leaves_display() {
        let (mut compositor, _, _) = setup(10, 10);
        let viewport = Viewport {
            zoom: 0.0,
            offset: Point::ZERO,
        };
        let ruler = Ruler::default();
        let ctx = RenderContext::new(&viewport, &ruler, Size::new(40.0, 40.0));
        assert!(compositor.render_frame(&ctx).is_err());
        assert_eq!(compositor.display().dimensions(), (0, 0));
    }
}
