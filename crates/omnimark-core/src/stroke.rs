//! Stroke data model: tools, brush snapshots, strokes and stroke groups.

use kurbo::{Point, Size};
use peniko::Color;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Unique identifier for a stroke.
pub type StrokeId = Uuid;

/// Unique identifier for a stroke group.
pub type GroupId = Uuid;

/// Width of the highlighter footprint relative to the brush size.
pub const HIGHLIGHTER_WIDTH_RATIO: f64 = 0.3;

/// Largest brush size, border width or corner radius accepted from config or
/// a stroke log.
pub const MAX_BRUSH_SIZE: f64 = 1024.0;

/// Stroke points are clamped to `[-MAX_COORDINATE, MAX_COORDINATE]`.
pub const MAX_COORDINATE: f64 = 65_536.0;

/// Annotation tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    /// Freehand ink.
    #[default]
    Pen,
    /// Block highlighter stamping a rectangular footprint.
    Highlighter,
    /// Rectangular highlight region.
    Area,
}

impl ToolKind {
    /// All tools, in toolbar order.
    pub const ALL: [ToolKind; 3] = [ToolKind::Pen, ToolKind::Highlighter, ToolKind::Area];

    /// Display name of the tool.
    pub fn name(self) -> &'static str {
        match self {
            ToolKind::Pen => "Pen",
            ToolKind::Highlighter => "Highlighter",
            ToolKind::Area => "Area",
        }
    }

    /// Whether the tool records every pointer position (as opposed to only
    /// its first and last corner).
    pub fn is_freehand(self) -> bool {
        match self {
            ToolKind::Pen | ToolKind::Highlighter => true,
            ToolKind::Area => false,
        }
    }

    /// Whether the tool supports the given blend mode.
    ///
    /// `Color` needs per-pixel readback of the base layer, which only the
    /// highlighter's pixel stamping does.
    pub fn supports_blend(self, mode: BlendMode) -> bool {
        match mode {
            BlendMode::Normal | BlendMode::Multiply => true,
            BlendMode::Color => self == ToolKind::Highlighter,
        }
    }
}

/// Per-stroke compositing rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BlendMode {
    /// Standard source-over alpha compositing.
    #[default]
    Normal,
    /// Darken-under compositing.
    Multiply,
    /// Brush hue and saturation with the underlying pixel's luminosity.
    Color,
}

/// Serializable color representation (RGBA8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializableColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl SerializableColor {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn black() -> Self {
        Self::new(0, 0, 0, 255)
    }

    pub const fn white() -> Self {
        Self::new(255, 255, 255, 255)
    }

    pub const fn transparent() -> Self {
        Self::new(0, 0, 0, 0)
    }

    /// Channels as an `[r, g, b, a]` array.
    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Parse `#rrggbb` or `#rrggbbaa`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        match hex.len() {
            6 => Some(Self::new(channel(0)?, channel(2)?, channel(4)?, 255)),
            8 => Some(Self::new(channel(0)?, channel(2)?, channel(4)?, channel(6)?)),
            _ => None,
        }
    }
}

impl From<Color> for SerializableColor {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self {
            r: rgba.r,
            g: rgba.g,
            b: rgba.b,
            a: rgba.a,
        }
    }
}

impl From<SerializableColor> for Color {
    fn from(color: SerializableColor) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}

/// Brush configuration captured when a stroke starts.
///
/// Strokes own their snapshot, so editing the live tool configuration never
/// changes how committed strokes replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrushSettings {
    pub tool: ToolKind,
    /// Brush size in canvas units.
    pub size: f64,
    pub color: SerializableColor,
    /// Stroke opacity in `[0, 1]`.
    pub opacity: f64,
    #[serde(default)]
    pub blend_mode: BlendMode,
    /// Corner radius of area rectangles.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_radius: Option<f64>,
    /// Border width of area rectangles, in canvas units.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_enabled: Option<bool>,
}

impl BrushSettings {
    /// Create a brush for a tool with a size and color, fully opaque.
    pub fn new(tool: ToolKind, size: f64, color: SerializableColor) -> Self {
        Self {
            tool,
            size,
            color,
            opacity: 1.0,
            blend_mode: BlendMode::Normal,
            border_radius: None,
            border_width: None,
            border_enabled: None,
        }
    }

    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn with_blend(mut self, mode: BlendMode) -> Self {
        self.blend_mode = mode;
        self
    }

    pub fn with_border(mut self, radius: f64, width: f64, enabled: bool) -> Self {
        self.border_radius = Some(radius);
        self.border_width = Some(width);
        self.border_enabled = Some(enabled);
        self
    }

    /// Blend mode actually applied by the rasterizer.
    pub fn effective_blend(&self) -> BlendMode {
        if self.tool.supports_blend(self.blend_mode) {
            self.blend_mode
        } else {
            BlendMode::Normal
        }
    }

    /// Opacity clamped to `[0, 1]`; non-finite values count as opaque.
    pub fn clamped_opacity(&self) -> f64 {
        if self.opacity.is_finite() {
            self.opacity.clamp(0.0, 1.0)
        } else {
            1.0
        }
    }

    /// Extent of the brush marker in canvas units (width, height).
    pub fn marker_size(&self) -> Size {
        match self.tool {
            ToolKind::Pen => Size::new(self.size, self.size),
            ToolKind::Highlighter => Size::new(self.size * HIGHLIGHTER_WIDTH_RATIO, self.size),
            ToolKind::Area => Size::ZERO,
        }
    }

    /// Copy with size, opacity and border values forced into usable ranges.
    pub fn sanitized(mut self) -> Self {
        self.size = clamp_extent(self.size).unwrap_or(1.0);
        self.opacity = self.clamped_opacity();
        self.border_radius = self.border_radius.and_then(clamp_extent);
        self.border_width = self.border_width.and_then(clamp_extent);
        self
    }

    /// Width of the area border, or `None` when borders are off.
    pub fn area_border(&self) -> Option<f64> {
        match (self.border_enabled, self.border_width) {
            (Some(true), Some(width)) if width > 0.0 => Some(width),
            _ => None,
        }
    }
}

impl Default for BrushSettings {
    fn default() -> Self {
        Self::new(ToolKind::Pen, 4.0, SerializableColor::new(230, 57, 70, 255))
    }
}

fn clamp_extent(value: f64) -> Option<f64> {
    value.is_finite().then(|| value.clamp(0.0, MAX_BRUSH_SIZE))
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// One continuous drag's recorded points plus the brush used to draw it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub id: StrokeId,
    pub tool: ToolKind,
    /// Points in canvas space, in capture order. Never empty.
    pub points: Vec<Point>,
    pub brush: BrushSettings,
    pub timestamp: u64,
}

impl Stroke {
    /// Start a stroke at a point. The tool is taken from the brush snapshot.
    pub fn new(brush: BrushSettings, start: Point) -> Self {
        Self {
            id: Uuid::new_v4(),
            tool: brush.tool,
            points: vec![start],
            brush,
            timestamp: now_millis(),
        }
    }

    pub fn add_point(&mut self, point: Point) {
        self.points.push(point);
    }

    pub fn first_point(&self) -> Point {
        self.points.first().copied().unwrap_or(Point::ZERO)
    }

    pub fn last_point(&self) -> Point {
        self.points.last().copied().unwrap_or(Point::ZERO)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Copy safe to rasterize: sanitized brush, non-finite points dropped and
    /// the rest clamped to `MAX_COORDINATE`. `None` when no point survives.
    pub fn sanitized(mut self) -> Option<Self> {
        self.brush = self.brush.sanitized();
        self.tool = self.brush.tool;
        self.points.retain(|p| p.x.is_finite() && p.y.is_finite());
        for p in &mut self.points {
            p.x = p.x.clamp(-MAX_COORDINATE, MAX_COORDINATE);
            p.y = p.y.clamp(-MAX_COORDINATE, MAX_COORDINATE);
        }
        (!self.points.is_empty()).then_some(self)
    }
}

/// The atomic undo unit: every stroke drawn between pointer-down and pointer-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrokeGroup {
    pub id: GroupId,
    pub strokes: Vec<Stroke>,
    pub timestamp: u64,
}

impl StrokeGroup {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            strokes: Vec::new(),
            timestamp: now_millis(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }

    /// Copy with every stroke sanitized; strokes without points are dropped.
    pub fn sanitized(mut self) -> Self {
        self.strokes = self.strokes.into_iter().filter_map(Stroke::sanitized).collect();
        self
    }

    /// Total number of points across all strokes.
    pub fn point_count(&self) -> usize {
        self.strokes.iter().map(Stroke::len).sum()
    }
}

impl Default for StrokeGroup {
    fn default() -> Self {
        Self::new()
    }
}
