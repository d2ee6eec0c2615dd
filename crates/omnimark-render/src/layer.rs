//! RGBA raster layers and per-pixel blending.
//!
//! Channels are straight (non-premultiplied) RGBA8. Blending follows the
//! W3C compositing model: the blend function mixes source and backdrop
//! colour, then the result is composited source-over.

use crate::renderer::{RenderResult, RendererError};
use image::{Rgba, RgbaImage};
use omnimark_core::BlendMode;

/// Largest edge accepted for a layer.
pub const MAX_LAYER_DIMENSION: u32 = 16_384;

/// A transparent RGBA buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pixels: RgbaImage,
}

impl Layer {
    /// Create a fully transparent layer.
    pub fn new(width: u32, height: u32) -> RenderResult<Self> {
        check_dimensions(width, height)?;
        Ok(Self {
            pixels: RgbaImage::new(width, height),
        })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width() && (y as u32) < self.height()
    }

    /// Reset every pixel to transparent.
    pub fn clear(&mut self) {
        for pixel in self.pixels.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 0]);
        }
    }

    /// Reallocate to a new size, discarding the contents.
    pub fn resize(&mut self, width: u32, height: u32) -> RenderResult<()> {
        check_dimensions(width, height)?;
        if self.width() != width || self.height() != height {
            self.pixels = RgbaImage::new(width, height);
        } else {
            self.clear();
        }
        Ok(())
    }

    pub fn pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        *self.pixels.get_pixel(x, y)
    }

    pub fn put_pixel(&mut self, x: u32, y: u32, pixel: Rgba<u8>) {
        self.pixels.put_pixel(x, y, pixel);
    }

    /// Blend `src` into the pixel at `(x, y)`. Out-of-bounds writes are ignored.
    pub fn blend(&mut self, x: i32, y: i32, src: Rgba<u8>, mode: BlendMode, opacity: f32) {
        if !self.contains(x, y) {
            return;
        }
        let (x, y) = (x as u32, y as u32);
        let backdrop = *self.pixels.get_pixel(x, y);
        self.pixels.put_pixel(x, y, blend_pixel(backdrop, src, mode, opacity));
    }

    pub fn image(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn image_mut(&mut self) -> &mut RgbaImage {
        &mut self.pixels
    }

    pub fn into_image(self) -> RgbaImage {
        self.pixels
    }
}

fn check_dimensions(width: u32, height: u32) -> RenderResult<()> {
    if width == 0 || height == 0 {
        return Err(RendererError::InvalidLayer(format!(
            "zero-sized layer {}x{}",
            width, height
        )));
    }
    if width > MAX_LAYER_DIMENSION || height > MAX_LAYER_DIMENSION {
        return Err(RendererError::InvalidLayer(format!(
            "layer {}x{} exceeds {} pixels per edge",
            width, height, MAX_LAYER_DIMENSION
        )));
    }
    Ok(())
}

/// Blend a source pixel onto a backdrop pixel.
///
/// `Color` is not a separable mode: callers tint the source with
/// [`tint_with_luminosity`] first, after which it composites like `Normal`.
pub fn blend_pixel(backdrop: Rgba<u8>, src: Rgba<u8>, mode: BlendMode, opacity: f32) -> Rgba<u8> {
    let opacity = opacity.clamp(0.0, 1.0);
    if src[3] == 0 || opacity == 0.0 {
        return backdrop;
    }
    if matches!(mode, BlendMode::Normal | BlendMode::Color) && opacity >= 1.0 && src[3] == 255 {
        return src;
    }

    let cb = channels(backdrop);
    let cs = channels(src);
    let ab = backdrop[3] as f32 / 255.0;
    let as_ = (src[3] as f32 / 255.0) * opacity;

    let mixed = match mode {
        BlendMode::Normal | BlendMode::Color => cs,
        BlendMode::Multiply => [cb[0] * cs[0], cb[1] * cs[1], cb[2] * cs[2]],
    };

    let ao = as_ + ab * (1.0 - as_);
    if ao <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }
    let mut out = [0u8; 4];
    for i in 0..3 {
        // Source colour is replaced by the blend result where the backdrop is opaque.
        let src_term = as_ * ((1.0 - ab) * cs[i] + ab * mixed[i]);
        let backdrop_term = (1.0 - as_) * ab * cb[i];
        out[i] = to_u8((src_term + backdrop_term) / ao);
    }
    out[3] = to_u8(ao);
    Rgba(out)
}

/// Plain source-over of `top` onto `bottom`.
pub fn over(bottom: Rgba<u8>, top: Rgba<u8>) -> Rgba<u8> {
    blend_pixel(bottom, top, BlendMode::Normal, 1.0)
}

/// Keep the hue and saturation of `src`, take the luminosity of `visible`.
pub fn tint_with_luminosity(src: Rgba<u8>, visible: Rgba<u8>) -> Rgba<u8> {
    let [r, g, b] = set_lum(channels(src), lum(channels(visible)));
    Rgba([to_u8(r), to_u8(g), to_u8(b), src[3]])
}

fn channels(p: Rgba<u8>) -> [f32; 3] {
    [p[0] as f32 / 255.0, p[1] as f32 / 255.0, p[2] as f32 / 255.0]
}

fn to_u8(v: f32) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}

fn lum(c: [f32; 3]) -> f32 {
    0.3 * c[0] + 0.59 * c[1] + 0.11 * c[2]
}

fn set_lum(c: [f32; 3], l: f32) -> [f32; 3] {
    let d = l - lum(c);
    clip_color([c[0] + d, c[1] + d, c[2] + d])
}

fn clip_color(c: [f32; 3]) -> [f32; 3] {
    let l = lum(c);
    let n = c[0].min(c[1]).min(c[2]);
    let x = c[0].max(c[1]).max(c[2]);
    let mut out = c;
    if n < 0.0 && l - n > f32::EPSILON {
        for v in &mut out {
            *v = l + (*v - l) * l / (l - n);
        }
    }
    if x > 1.0 && x - l > f32::EPSILON {
        for v in &mut out {
            *v = l + (*v - l) * (1.0 - l) / (x - l);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

    #[test]
    fn test_zero_sized_layer_rejected() {
        assert!(matches!(Layer::new(0, 10), Err(RendererError::InvalidLayer(_))));
        assert!(Layer::new(MAX_LAYER_DIMENSION + 1, 1).is_err());
        assert!(Layer::new(4, 4).is_ok());
    }

    #[test]
    fn test_normal_over_transparent_keeps_opacity() {
        let out = blend_pixel(TRANSPARENT, Rgba([255, 221, 0, 255]), BlendMode::Normal, 0.4);
        assert_eq!(out, Rgba([255, 221, 0, 102]));
    }

    #[test]
    fn test_multiply_over_transparent_is_source() {
        let out = blend_pixel(TRANSPARENT, Rgba([255, 221, 0, 255]), BlendMode::Multiply, 0.4);
        assert_eq!(out, Rgba([255, 221, 0, 102]));
    }

    #[test]
    fn test_multiply_darkens_opaque_backdrop() {
        let backdrop = Rgba([200, 100, 50, 255]);
        let out = blend_pixel(backdrop, Rgba([128, 255, 0, 255]), BlendMode::Multiply, 1.0);
        assert_eq!(out[3], 255);
        assert_eq!(out[0], 100);
        assert_eq!(out[1], 100);
        assert_eq!(out[2], 0);
    }

    #[test]
    fn test_opaque_normal_overwrites() {
        let src = Rgba([1, 2, 3, 255]);
        assert_eq!(blend_pixel(Rgba([9, 9, 9, 255]), src, BlendMode::Normal, 1.0), src);
    }

    #[test]
    fn test_zero_opacity_is_noop() {
        let backdrop = Rgba([10, 20, 30, 40]);
        assert_eq!(
            blend_pixel(backdrop, Rgba([255, 0, 0, 255]), BlendMode::Multiply, 0.0),
            backdrop
        );
    }

    #[test]
    fn test_tint_keeps_luminosity() {
        let gray = Rgba([128, 128, 128, 255]);
        let tinted = tint_with_luminosity(Rgba([255, 0, 0, 255]), gray);
        let l = |p: Rgba<u8>| lum(channels(p));
        assert!((l(tinted) - l(gray)).abs() < 0.01);
        assert!(tinted[0] > tinted[1] && tinted[0] > tinted[2]);
    }

    #[test]
    fn test_tint_of_white_stays_white() {
        let tinted = tint_with_luminosity(Rgba([0, 0, 255, 200]), Rgba([255, 255, 255, 255]));
        assert_eq!(tinted, Rgba([255, 255, 255, 200]));
    }

    #[test]
    fn test_blend_out_of_bounds_ignored() {
        let mut layer = Layer::new(2, 2).unwrap();
        layer.blend(-1, 0, Rgba([255, 0, 0, 255]), BlendMode::Normal, 1.0);
        layer.blend(2, 2, Rgba([255, 0, 0, 255]), BlendMode::Normal, 1.0);
        assert!(layer.image().pixels().all(|p| p[3] == 0));
    }
}
