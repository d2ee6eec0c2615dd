//! Screen-space overlays drawn on top of the composited display.
//!
//! Overlay geometry lives in canvas space but line widths and glyph sizes are
//! constant on screen, i.e. canvas sizes divided by the current zoom.

use crate::layer::over;
use image::{Rgba, RgbaImage};
use kurbo::{Point, Rect, Vec2};
use omnimark_core::{RULER_HEIGHT, Ruler, Viewport};
use peniko::Color;

/// Spacing of minor ruler ticks, in canvas units.
pub const TICK_SPACING: f64 = 10.0;
/// Radius of the centre compass, in screen pixels.
pub const COMPASS_RADIUS: f64 = 14.0;
/// Height of the angle readout digits, in screen pixels.
pub const GLYPH_HEIGHT: f64 = 14.0;

/// Colours used for overlays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayStyle {
    pub ruler_fill: Color,
    pub ruler_edge: Color,
    pub ruler_tick: Color,
    pub readout: Color,
    pub rubber_band: Color,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            ruler_fill: Color::from_rgba8(235, 240, 248, 200),
            ruler_edge: Color::from_rgba8(59, 130, 246, 255),
            ruler_tick: Color::from_rgba8(55, 65, 81, 255),
            readout: Color::from_rgba8(17, 24, 39, 255),
            rubber_band: Color::from_rgba8(59, 130, 246, 255),
        }
    }
}

pub(crate) fn rgba(color: Color) -> Rgba<u8> {
    let c = color.to_rgba8();
    Rgba([c.r, c.g, c.b, c.a])
}

fn blend_at(img: &mut RgbaImage, x: i64, y: i64, src: Rgba<u8>) {
    if x < 0 || y < 0 || x >= i64::from(img.width()) || y >= i64::from(img.height()) {
        return;
    }
    let (x, y) = (x as u32, y as u32);
    let dst = *img.get_pixel(x, y);
    img.put_pixel(x, y, over(dst, src));
}

/// Pixel range covering `bounds`, clipped to the image.
fn clipped(img: &RgbaImage, bounds: Rect) -> Option<(i64, i64, i64, i64)> {
    if !bounds.is_finite() {
        return None;
    }
    let x0 = bounds.x0.floor().max(0.0) as i64;
    let y0 = bounds.y0.floor().max(0.0) as i64;
    let x1 = bounds.x1.ceil().min(f64::from(img.width())) as i64;
    let y1 = bounds.y1.ceil().min(f64::from(img.height())) as i64;
    (x0 < x1 && y0 < y1).then_some((x0, y0, x1, y1))
}

/// Stroke a screen-space segment with a given width.
pub fn stroke_segment(img: &mut RgbaImage, a: Point, b: Point, width: f64, color: Rgba<u8>) {
    let half = (width / 2.0).max(0.5);
    let bounds = Rect::from_points(a, b).inflate(half + 1.0, half + 1.0);
    let Some((x0, y0, x1, y1)) = clipped(img, bounds) else {
        return;
    };
    let ab = b - a;
    let len2 = ab.hypot2();
    for y in y0..y1 {
        for x in x0..x1 {
            let p = Point::new(x as f64 + 0.5, y as f64 + 0.5);
            let t = if len2 > 0.0 {
                ((p - a).dot(ab) / len2).clamp(0.0, 1.0)
            } else {
                0.0
            };
            if (p - (a + ab * t)).hypot() <= half {
                blend_at(img, x, y, color);
            }
        }
    }
}

/// Outline a screen-space rectangle.
pub fn stroke_rect(img: &mut RgbaImage, rect: Rect, width: f64, color: Rgba<u8>) {
    let corners = [
        Point::new(rect.x0, rect.y0),
        Point::new(rect.x1, rect.y0),
        Point::new(rect.x1, rect.y1),
        Point::new(rect.x0, rect.y1),
    ];
    for i in 0..4 {
        stroke_segment(img, corners[i], corners[(i + 1) % 4], width, color);
    }
}

/// Outline a circle.
pub fn stroke_circle(img: &mut RgbaImage, center: Point, radius: f64, width: f64, color: Rgba<u8>) {
    let half = (width / 2.0).max(0.5);
    let bounds = Rect::from_center_size(center, (2.0 * (radius + half + 1.0), 2.0 * (radius + half + 1.0)));
    let Some((x0, y0, x1, y1)) = clipped(img, bounds) else {
        return;
    };
    for y in y0..y1 {
        for x in x0..x1 {
            let d = (Point::new(x as f64 + 0.5, y as f64 + 0.5) - center).hypot();
            if (d - radius).abs() <= half {
                blend_at(img, x, y, color);
            }
        }
    }
}

// Segment order: top, top-right, bottom-right, bottom, bottom-left, top-left, middle.
const SEGMENTS: [(char, u8); 12] = [
    ('0', 0b0111111),
    ('1', 0b0000110),
    ('2', 0b1011011),
    ('3', 0b1001111),
    ('4', 0b1100110),
    ('5', 0b1101101),
    ('6', 0b1111101),
    ('7', 0b0000111),
    ('8', 0b1111111),
    ('9', 0b1101111),
    ('-', 0b1000000),
    ('°', 0b1100011),
];

/// Advance between glyphs, as a fraction of the glyph height.
const GLYPH_ADVANCE: f64 = 0.75;

/// Screen width of a seven-segment string.
pub fn text_width(text: &str, height: f64) -> f64 {
    text.chars().count() as f64 * height * GLYPH_ADVANCE
}

/// Draw digits as seven-segment glyphs; unknown characters leave a gap.
pub fn draw_seven_segment(img: &mut RgbaImage, text: &str, origin: Point, height: f64, color: Rgba<u8>) {
    let w = height * 0.5;
    let h = height / 2.0;
    let stroke = (height / 8.0).max(1.0);
    for (i, ch) in text.chars().enumerate() {
        let Some(&(_, mask)) = SEGMENTS.iter().find(|(c, _)| *c == ch) else {
            continue;
        };
        let o = origin + Vec2::new(i as f64 * height * GLYPH_ADVANCE, 0.0);
        let (tl, tr) = (o, o + Vec2::new(w, 0.0));
        let (ml, mr) = (o + Vec2::new(0.0, h), o + Vec2::new(w, h));
        let (bl, br) = (o + Vec2::new(0.0, height), o + Vec2::new(w, height));
        // A degree sign is a small box in the upper half.
        let (ml, mr, tl, tr) = if ch == '°' {
            let s = 0.6;
            (
                o + Vec2::new(0.0, h * s),
                o + Vec2::new(w * s, h * s),
                tl,
                o + Vec2::new(w * s, 0.0),
            )
        } else {
            (ml, mr, tl, tr)
        };
        let segments = [(tl, tr), (tr, mr), (mr, br), (bl, br), (ml, bl), (tl, ml), (ml, mr)];
        for (bit, (a, b)) in segments.iter().enumerate() {
            if mask & (1 << bit) != 0 {
                stroke_segment(img, *a, *b, stroke, color);
            }
        }
    }
}

/// Draw the rubber band of an area in progress. `rect` is in canvas space.
pub fn draw_rubber_band(img: &mut RgbaImage, rect: Rect, viewport: &Viewport, container: Rect, style: &OverlayStyle) {
    let a = viewport.canvas_to_screen(Point::new(rect.x0, rect.y0), container);
    let b = viewport.canvas_to_screen(Point::new(rect.x1, rect.y1), container);
    let screen = Rect::from_points(a, b);
    let mut fill = rgba(style.rubber_band);
    fill[3] = 32;
    if let Some((x0, y0, x1, y1)) = clipped(img, screen) {
        for y in y0..y1 {
            for x in x0..x1 {
                blend_at(img, x, y, fill);
            }
        }
    }
    stroke_rect(img, screen, 1.0, rgba(style.rubber_band));
}

/// Draw the ruler strip, edges, ticks, compass and angle readout.
pub fn draw_ruler(img: &mut RgbaImage, ruler: &Ruler, viewport: &Viewport, container: Rect, style: &OverlayStyle) {
    if !ruler.is_visible() {
        return;
    }
    let center = ruler.state.center();
    let theta = ruler.state.angle.to_radians();
    let axis = Vec2::new(theta.cos(), theta.sin());
    let normal = Vec2::new(theta.sin(), -theta.cos());
    let half_len = ruler.length() / 2.0;
    let half_h = RULER_HEIGHT / 2.0;
    let to_screen = |p: Point| viewport.canvas_to_screen(p, container);

    // Strip body: inverse-map every pixel in the screen bounding box.
    let corners = [
        center - axis * half_len - normal * half_h,
        center + axis * half_len - normal * half_h,
        center + axis * half_len + normal * half_h,
        center - axis * half_len + normal * half_h,
    ]
    .map(to_screen);
    let bounds = corners
        .iter()
        .fold(Rect::from_points(corners[0], corners[0]), |r, p| r.union_pt(*p));
    let fill = rgba(style.ruler_fill);
    if let Some((x0, y0, x1, y1)) = clipped(img, bounds) {
        for y in y0..y1 {
            for x in x0..x1 {
                let canvas = viewport.screen_to_canvas(Point::new(x as f64 + 0.5, y as f64 + 0.5), container);
                if ruler.is_click_on_ruler(canvas) {
                    blend_at(img, x, y, fill);
                }
            }
        }
    }

    let edge = rgba(style.ruler_edge);
    stroke_segment(img, corners[0], corners[1], 2.0, edge);
    stroke_segment(img, corners[3], corners[2], 2.0, edge);

    draw_ticks(img, ruler, viewport, container, style);

    // Compass: a ring with a needle along the ruler axis.
    let c = to_screen(center);
    let needle = Vec2::new(theta.cos(), theta.sin()) * COMPASS_RADIUS;
    stroke_circle(img, c, COMPASS_RADIUS, 1.5, edge);
    stroke_segment(img, c - needle, c + needle, 1.5, edge);

    let text = format!("{}°", ruler.state.display_angle().round() as i64 % 360);
    let origin = Point::new(
        c.x - text_width(&text, GLYPH_HEIGHT) / 2.0,
        c.y - COMPASS_RADIUS - GLYPH_HEIGHT - 4.0,
    );
    draw_seven_segment(img, &text, origin, GLYPH_HEIGHT, rgba(style.readout));
}

/// Ticks along both long edges: minor every 10, mid every 50, major every 100.
fn draw_ticks(img: &mut RgbaImage, ruler: &Ruler, viewport: &Viewport, container: Rect, style: &OverlayStyle) {
    let center = ruler.state.center();
    let theta = ruler.state.angle.to_radians();
    let axis = Vec2::new(theta.cos(), theta.sin());
    let normal = Vec2::new(theta.sin(), -theta.cos());
    let half_h = RULER_HEIGHT / 2.0;
    let tick = rgba(style.ruler_tick);

    // Skip minor ticks once they would crowd together on screen.
    let stride = if TICK_SPACING * viewport.zoom < 4.0 { 5 } else { 1 };
    let count = (ruler.length() / 2.0 / TICK_SPACING).floor() as i64;
    for i in (-count..=count).filter(|i| i % stride == 0) {
        let along = i as f64 * TICK_SPACING;
        let len = if i % 10 == 0 {
            RULER_HEIGHT * 0.3
        } else if i % 5 == 0 {
            RULER_HEIGHT * 0.2
        } else {
            RULER_HEIGHT * 0.1
        };
        let base = center + axis * along;
        for side in [1.0, -1.0] {
            let edge = base + normal * (half_h * side);
            let inner = base + normal * ((half_h - len) * side);
            let a = viewport.canvas_to_screen(edge, container);
            let b = viewport.canvas_to_screen(inner, container);
            if !container.inflate(1.0, 1.0).contains(a) && !container.inflate(1.0, 1.0).contains(b) {
                continue;
            }
            stroke_segment(img, a, b, 1.0, tick);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Size;

    fn canvas(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba([255, 255, 255, 255]))
    }

    #[test]
    fn test_segment_width_constant_on_screen() {
        let mut img = canvas(40, 40);
        stroke_segment(&mut img, Point::new(5.0, 20.0), Point::new(35.0, 20.0), 2.0, Rgba([0, 0, 0, 255]));
        assert_eq!(img.get_pixel(20, 19)[0], 0);
        assert_eq!(img.get_pixel(20, 20)[0], 0);
        assert_eq!(img.get_pixel(20, 22)[0], 255);
    }

    #[test]
    fn test_segment_clipped_to_image() {
        let mut img = canvas(10, 10);
        stroke_segment(&mut img, Point::new(-50.0, -50.0), Point::new(500.0, 500.0), 3.0, Rgba([0, 0, 0, 255]));
        assert_eq!(img.get_pixel(5, 5)[0], 0);
    }

    #[test]
    fn test_seven_segment_one_lights_right_side() {
        let mut img = canvas(20, 30);
        draw_seven_segment(&mut img, "1", Point::new(2.0, 2.0), 16.0, Rgba([0, 0, 0, 255]));
        // Right column lit, left column untouched.
        assert_eq!(img.get_pixel(10, 6)[0], 0);
        assert_eq!(img.get_pixel(2, 6)[0], 255);
    }

    #[test]
    fn test_hidden_ruler_draws_nothing() {
        let mut img = canvas(50, 50);
        let ruler = Ruler::for_image(Size::new(50.0, 50.0));
        draw_ruler(&mut img, &ruler, &Viewport::new(), Rect::new(0.0, 0.0, 50.0, 50.0), &OverlayStyle::default());
        assert!(img.pixels().all(|p| *p == Rgba([255, 255, 255, 255])));
    }

    #[test]
    fn test_visible_ruler_tints_strip_only() {
        let mut img = canvas(200, 200);
        let mut ruler = Ruler::for_image(Size::new(200.0, 200.0));
        ruler.toggle();
        draw_ruler(&mut img, &ruler, &Viewport::new(), Rect::new(0.0, 0.0, 200.0, 200.0), &OverlayStyle::default());
        // Strip spans y in [60, 140] around the centre (100, 100).
        assert_ne!(*img.get_pixel(30, 75), Rgba([255, 255, 255, 255]));
        assert_eq!(*img.get_pixel(30, 20), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_rubber_band_outline() {
        let mut img = canvas(100, 100);
        let viewport = Viewport { zoom: 2.0, offset: Point::ZERO };
        draw_rubber_band(
            &mut img,
            Rect::new(10.0, 10.0, 20.0, 20.0),
            &viewport,
            Rect::new(0.0, 0.0, 100.0, 100.0),
            &OverlayStyle::default(),
        );
        // Canvas (10..20) maps to screen (20..40).
        assert_ne!(*img.get_pixel(30, 20), Rgba([255, 255, 255, 255]));
        assert_eq!(*img.get_pixel(50, 50), Rgba([255, 255, 255, 255]));
    }
}
