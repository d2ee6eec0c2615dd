//! Stroke rasterization onto the draw layer.
//!
//! Live drawing and replay share this code: a [`StrokeRasterizer`] is fed the
//! same segments in both cases, so the pixels they produce are identical.

use crate::layer::{Layer, over, tint_with_luminosity};
use image::{Rgba, RgbaImage};
use kurbo::{Point, Rect, RoundedRect, Shape, Vec2};
use omnimark_core::{BlendMode, BrushSettings, Stroke, StrokeGroup, ToolKind};
use std::collections::HashSet;

/// Distance between interpolated stamps along a segment, in canvas units.
pub const STAMP_STEP: f64 = 2.0;

/// Rasterizes one stroke, compositing each pixel at most once.
///
/// The stamped set is what keeps a self-overlapping highlighter stroke at its
/// nominal opacity.
#[derive(Debug, Clone)]
pub struct StrokeRasterizer {
    brush: BrushSettings,
    src: Rgba<u8>,
    stamped: HashSet<(i32, i32)>,
}

impl StrokeRasterizer {
    pub fn new(brush: BrushSettings) -> Self {
        let c = brush.color;
        Self {
            src: Rgba([c.r, c.g, c.b, c.a]),
            brush,
            stamped: HashSet::new(),
        }
    }

    pub fn tool(&self) -> ToolKind {
        self.brush.tool
    }

    /// Number of distinct pixels composited so far.
    pub fn stamped_count(&self) -> usize {
        self.stamped.len()
    }

    /// Stamp the first point of a freehand stroke.
    pub fn begin(&mut self, draw: &mut Layer, base: &RgbaImage, point: Point) {
        if self.brush.tool.is_freehand() {
            self.stamp(draw, base, point);
        }
    }

    /// Stamp every `STAMP_STEP` units from `from`, then at `to`.
    pub fn segment(&mut self, draw: &mut Layer, base: &RgbaImage, from: Point, to: Point) {
        if !self.brush.tool.is_freehand() {
            return;
        }
        let delta: Vec2 = to - from;
        let len = delta.hypot();
        if len.is_finite() && len > 0.0 {
            let dir = delta / len;
            let steps = (len / STAMP_STEP).floor() as usize;
            for i in 0..=steps {
                self.stamp(draw, base, from + dir * (i as f64 * STAMP_STEP));
            }
        } else {
            self.stamp(draw, base, from);
        }
        self.stamp(draw, base, to);
    }

    /// Draw a whole stroke from its recorded points.
    pub fn draw_stroke(&mut self, draw: &mut Layer, base: &RgbaImage, stroke: &Stroke) {
        match stroke.tool {
            ToolKind::Pen | ToolKind::Highlighter => {
                self.begin(draw, base, stroke.first_point());
                for pair in stroke.points.windows(2) {
                    self.segment(draw, base, pair[0], pair[1]);
                }
            }
            ToolKind::Area => {
                self.area(draw, base, Rect::from_points(stroke.first_point(), stroke.last_point()));
            }
        }
    }

    fn stamp(&mut self, draw: &mut Layer, base: &RgbaImage, center: Point) {
        if !center.x.is_finite() || !center.y.is_finite() {
            return;
        }
        let marker = self.brush.marker_size();
        let half = Vec2::new(marker.width / 2.0, marker.height / 2.0);
        let footprint =
            Rect::new(center.x - half.x, center.y - half.y, center.x + half.x, center.y + half.y);

        let mut hit_any = false;
        if let Some((x0, y0, x1, y1)) = clip_to_layer(draw, footprint) {
            for y in y0..y1 {
                for x in x0..x1 {
                    if self.covers(center, x, y) {
                        hit_any = true;
                        self.composite_once(draw, base, x, y, self.brush.effective_blend(), self.src);
                    }
                }
            }
        }
        // Brushes thinner than a pixel still leave a mark.
        if !hit_any {
            let (x, y) = (center.x.floor() as i32, center.y.floor() as i32);
            self.composite_once(draw, base, x, y, self.brush.effective_blend(), self.src);
        }
    }

    /// Whether the footprint centred at `center` covers the pixel's centre.
    fn covers(&self, center: Point, x: i32, y: i32) -> bool {
        let p = Point::new(x as f64 + 0.5, y as f64 + 0.5);
        match self.brush.tool {
            ToolKind::Pen => {
                let r = self.brush.size / 2.0;
                (p - center).hypot2() <= r * r
            }
            ToolKind::Highlighter => {
                let m = self.brush.marker_size();
                (p.x - center.x).abs() <= m.width / 2.0 && (p.y - center.y).abs() <= m.height / 2.0
            }
            ToolKind::Area => false,
        }
    }

    fn composite_once(
        &mut self,
        draw: &mut Layer,
        base: &RgbaImage,
        x: i32,
        y: i32,
        mode: BlendMode,
        src: Rgba<u8>,
    ) {
        if !draw.contains(x, y) || !self.stamped.insert((x, y)) {
            return;
        }
        let opacity = self.brush.clamped_opacity() as f32;
        let src = match mode {
            BlendMode::Color => {
                let (ux, uy) = (x as u32, y as u32);
                let visible = if ux < base.width() && uy < base.height() {
                    over(*base.get_pixel(ux, uy), draw.pixel(ux, uy))
                } else {
                    draw.pixel(ux, uy)
                };
                tint_with_luminosity(src, visible)
            }
            BlendMode::Normal | BlendMode::Multiply => src,
        };
        draw.blend(x, y, src, mode, opacity);
    }

    /// Fill a rounded rectangle with an optional opaque border.
    pub fn area(&mut self, draw: &mut Layer, base: &RgbaImage, rect: Rect) {
        let rect = rect.abs();
        if rect.width() < 1.0 || rect.height() < 1.0 || !rect.is_finite() {
            log::debug!("Skipping degenerate area {:?}", rect);
            return;
        }
        let max_radius = rect.width().min(rect.height()) / 2.0;
        let radius = self.brush.border_radius.unwrap_or(0.0).clamp(0.0, max_radius);
        let outer = RoundedRect::from_rect(rect, radius);

        let border = self.brush.area_border();
        let inner = border.and_then(|w| {
            let inset = Rect::new(rect.x0 + w, rect.y0 + w, rect.x1 - w, rect.y1 - w);
            (inset.width() > 0.0 && inset.height() > 0.0)
                .then(|| RoundedRect::from_rect(inset, (radius - w).max(0.0)))
        });
        let border_src = Rgba([self.src[0], self.src[1], self.src[2], 255]);
        let fill_mode = self.brush.effective_blend();

        let Some((x0, y0, x1, y1)) = clip_to_layer(draw, rect) else {
            return;
        };
        for y in y0..y1 {
            for x in x0..x1 {
                let p = Point::new(x as f64 + 0.5, y as f64 + 0.5);
                if !outer.contains(p) {
                    continue;
                }
                let in_border = match (&border, &inner) {
                    (Some(_), Some(inner)) => !inner.contains(p),
                    (Some(_), None) => true,
                    (None, _) => false,
                };
                if in_border {
                    self.composite_border(draw, x, y, border_src);
                } else {
                    self.composite_once(draw, base, x, y, fill_mode, self.src);
                }
            }
        }
    }

    fn composite_border(&mut self, draw: &mut Layer, x: i32, y: i32, src: Rgba<u8>) {
        if draw.contains(x, y) && self.stamped.insert((x, y)) {
            draw.blend(x, y, src, BlendMode::Normal, 1.0);
        }
    }
}

/// Pixel range `[x0, x1) x [y0, y1)` covering `bounds`, clipped to the layer.
/// `None` when nothing of it lies on the layer.
fn clip_to_layer(draw: &Layer, bounds: Rect) -> Option<(i32, i32, i32, i32)> {
    if !bounds.is_finite() {
        return None;
    }
    let bounds = bounds.expand();
    let x0 = bounds.x0.max(0.0) as i32;
    let y0 = bounds.y0.max(0.0) as i32;
    let x1 = bounds.x1.min(draw.width() as f64) as i32;
    let y1 = bounds.y1.min(draw.height() as f64) as i32;
    (x0 < x1 && y0 < y1).then_some((x0, y0, x1, y1))
}

/// Replay groups onto a cleared draw layer, oldest first.
pub fn replay(draw: &mut Layer, base: &RgbaImage, groups: &[StrokeGroup]) {
    draw.clear();
    for stroke in groups.iter().flat_map(|g| g.strokes.iter()) {
        StrokeRasterizer::new(stroke.brush.clone()).draw_stroke(draw, base, stroke);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use omnimark_core::SerializableColor;

    fn white_base(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba([255, 255, 255, 255]))
    }

    fn highlighter() -> BrushSettings {
        BrushSettings::new(ToolKind::Highlighter, 20.0, SerializableColor::new(255, 221, 0, 255))
            .with_opacity(0.4)
    }

    #[test]
    fn test_highlighter_self_overlap_keeps_opacity() {
        let base = white_base(100, 100);
        let mut draw = Layer::new(100, 100).unwrap();
        let mut stroke = Stroke::new(highlighter(), Point::new(20.0, 50.0));
        for p in [(80.0, 50.0), (20.0, 52.0), (80.0, 48.0), (50.0, 50.0)] {
            stroke.add_point(Point::new(p.0, p.1));
        }
        StrokeRasterizer::new(stroke.brush.clone()).draw_stroke(&mut draw, &base, &stroke);

        let alphas: HashSet<u8> = draw.image().pixels().map(|p| p[3]).filter(|a| *a > 0).collect();
        assert_eq!(alphas, HashSet::from([102]));
    }

    #[test]
    fn test_highlighter_footprint_is_narrow_rect() {
        let base = white_base(64, 64);
        let mut draw = Layer::new(64, 64).unwrap();
        let mut r = StrokeRasterizer::new(highlighter());
        r.begin(&mut draw, &base, Point::new(32.0, 32.0));
        // 0.3 * 20 = 6 wide, 20 tall.
        assert_eq!(r.stamped_count(), 6 * 20);
    }

    #[test]
    fn test_pen_disc_footprint() {
        let base = white_base(32, 32);
        let mut draw = Layer::new(32, 32).unwrap();
        let brush = BrushSettings::new(ToolKind::Pen, 10.0, SerializableColor::black());
        let mut r = StrokeRasterizer::new(brush);
        r.begin(&mut draw, &base, Point::new(16.0, 16.0));
        assert_eq!(draw.pixel(16, 16), Rgba([0, 0, 0, 255]));
        assert_eq!(draw.pixel(11, 16)[3], 255);
        assert_eq!(draw.pixel(11, 11)[3], 0);
    }

    #[test]
    fn test_thin_pen_still_marks() {
        let base = white_base(8, 8);
        let mut draw = Layer::new(8, 8).unwrap();
        let brush = BrushSettings::new(ToolKind::Pen, 0.2, SerializableColor::black());
        StrokeRasterizer::new(brush).begin(&mut draw, &base, Point::new(3.2, 4.9));
        assert_eq!(draw.pixel(3, 4)[3], 255);
    }

    #[test]
    fn test_zero_size_pen_on_pixel_corner_marks() {
        let base = white_base(8, 8);
        let mut draw = Layer::new(8, 8).unwrap();
        let brush = BrushSettings::new(ToolKind::Pen, 0.0, SerializableColor::black());
        StrokeRasterizer::new(brush).begin(&mut draw, &base, Point::new(3.0, 5.0));
        assert_eq!(draw.pixel(3, 5)[3], 255);
    }

    #[test]
    fn test_segment_is_continuous() {
        let base = white_base(200, 20);
        let mut draw = Layer::new(200, 20).unwrap();
        let brush = BrushSettings::new(ToolKind::Pen, 3.0, SerializableColor::black());
        let mut r = StrokeRasterizer::new(brush);
        r.segment(&mut draw, &base, Point::new(5.0, 10.0), Point::new(195.0, 10.0));
        for x in 5..195 {
            assert_eq!(draw.pixel(x, 10)[3], 255, "gap at x={x}");
        }
    }

    #[test]
    fn test_area_fill_and_border() {
        let base = white_base(100, 100);
        let mut draw = Layer::new(100, 100).unwrap();
        let brush = BrushSettings::new(ToolKind::Area, 0.0, SerializableColor::new(0, 0, 255, 255))
            .with_opacity(0.3)
            .with_border(0.0, 2.0, true);
        let mut stroke = Stroke::new(brush.clone(), Point::new(10.0, 10.0));
        stroke.add_point(Point::new(60.0, 40.0));
        StrokeRasterizer::new(brush).draw_stroke(&mut draw, &base, &stroke);

        // Border is opaque brush colour, fill keeps its opacity.
        assert_eq!(draw.pixel(10, 20), Rgba([0, 0, 255, 255]));
        assert_eq!(draw.pixel(11, 20), Rgba([0, 0, 255, 255]));
        assert_eq!(draw.pixel(30, 25)[3], 77);
        assert_eq!(draw.pixel(5, 5)[3], 0);
        assert_eq!(draw.pixel(61, 25)[3], 0);
    }

    #[test]
    fn test_area_rounded_corners_left_clear() {
        let base = white_base(100, 100);
        let mut draw = Layer::new(100, 100).unwrap();
        let brush = BrushSettings::new(ToolKind::Area, 0.0, SerializableColor::black())
            .with_border(12.0, 1.0, false);
        let mut r = StrokeRasterizer::new(brush);
        r.area(&mut draw, &base, Rect::new(10.0, 10.0, 90.0, 90.0));
        assert_eq!(draw.pixel(10, 10)[3], 0);
        assert_eq!(draw.pixel(50, 10)[3], 255);
    }

    #[test]
    fn test_degenerate_area_draws_nothing() {
        let base = white_base(10, 10);
        let mut draw = Layer::new(10, 10).unwrap();
        let brush = BrushSettings::new(ToolKind::Area, 0.0, SerializableColor::black());
        StrokeRasterizer::new(brush).area(&mut draw, &base, Rect::new(3.0, 3.0, 3.0, 3.0));
        assert!(draw.image().pixels().all(|p| p[3] == 0));
    }

    #[test]
    fn test_color_blend_uses_base_luminosity() {
        let base = RgbaImage::from_pixel(16, 16, Rgba([40, 40, 40, 255]));
        let mut draw = Layer::new(16, 16).unwrap();
        let brush = highlighter().with_opacity(1.0).with_blend(BlendMode::Color);
        StrokeRasterizer::new(brush).begin(&mut draw, &base, Point::new(8.0, 8.0));
        let p = draw.pixel(8, 8);
        // Dark base keeps the tinted pixel dark.
        assert!(p[0] < 120 && p[3] == 255);
    }

    #[test]
    fn test_replay_clears_first() {
        let base = white_base(20, 20);
        let mut draw = Layer::new(20, 20).unwrap();
        draw.put_pixel(0, 0, Rgba([1, 2, 3, 255]));
        replay(&mut draw, &base, &[]);
        assert_eq!(draw.pixel(0, 0)[3], 0);
    }

    #[test]
    fn test_huge_brush_replay_is_clipped() {
        let base = white_base(8, 8);
        let mut draw = Layer::new(8, 8).unwrap();
        let brush = BrushSettings::new(ToolKind::Pen, 30_000.0, SerializableColor::black());
        let mut stroke = Stroke::new(brush, Point::new(4.0, 4.0));
        stroke.add_point(Point::new(104.0, 4.0));
        let mut group = StrokeGroup::new();
        group.strokes.push(stroke);

        let started = std::time::Instant::now();
        replay(&mut draw, &base, &[group]);
        assert!(started.elapsed() < std::time::Duration::from_secs(1));
        assert!(draw.image().pixels().all(|p| p[3] == 255));
    }

    #[test]
    fn test_area_far_off_layer_is_clipped() {
        let base = white_base(16, 16);
        let mut draw = Layer::new(16, 16).unwrap();
        let brush = BrushSettings::new(ToolKind::Area, 0.0, SerializableColor::black());
        let mut r = StrokeRasterizer::new(brush);
        r.area(&mut draw, &base, Rect::new(-1e7, -1e7, 1e7, 8.0));
        assert_eq!(r.stamped_count(), 16 * 8);
        assert_eq!(draw.pixel(3, 9)[3], 0);
    }

    #[test]
    fn test_segment_stamps_at_fixed_step() {
        let base = white_base(40, 8);
        let mut draw = Layer::new(40, 8).unwrap();
        let brush = BrushSettings::new(ToolKind::Pen, 0.5, SerializableColor::black());
        let mut r = StrokeRasterizer::new(brush);
        // 0, 2, 4, 6 and the endpoint 7 along x.
        r.segment(&mut draw, &base, Point::new(10.5, 4.5), Point::new(17.5, 4.5));
        let marked: Vec<u32> = (0..40).filter(|x| draw.pixel(*x, 4)[3] > 0).collect();
        assert_eq!(marked, vec![10, 12, 14, 16, 17]);
    }
}
