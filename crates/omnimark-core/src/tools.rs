//! Live tool configuration.

use crate::stroke::{BlendMode, BrushSettings, MAX_BRUSH_SIZE, SerializableColor, ToolKind};
use serde::{Deserialize, Serialize};

/// Default brush for each tool, as supplied by the settings collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolDefaults {
    pub pen: BrushSettings,
    pub highlighter: BrushSettings,
    pub area: BrushSettings,
}

impl Default for ToolDefaults {
    fn default() -> Self {
        Self {
            pen: BrushSettings::new(ToolKind::Pen, 4.0, SerializableColor::new(230, 57, 70, 255)),
            highlighter: BrushSettings::new(
                ToolKind::Highlighter,
                24.0,
                SerializableColor::new(255, 221, 0, 255),
            )
            .with_opacity(0.4)
            .with_blend(BlendMode::Multiply),
            area: BrushSettings::new(ToolKind::Area, 0.0, SerializableColor::new(255, 221, 0, 255))
                .with_opacity(0.3)
                .with_blend(BlendMode::Multiply)
                .with_border(8.0, 2.0, true),
        }
    }
}

impl ToolDefaults {
    /// Force each brush's `tool` to match its slot and its values into range.
    pub fn normalized(mut self) -> Self {
        self.pen.tool = ToolKind::Pen;
        self.highlighter.tool = ToolKind::Highlighter;
        self.area.tool = ToolKind::Area;
        Self {
            pen: self.pen.sanitized(),
            highlighter: self.highlighter.sanitized(),
            area: self.area.sanitized(),
        }
    }
}

/// The live, mutable tool configuration shown in the toolbar.
///
/// Strokes never hold a reference to this; they receive a
/// [`ToolConfig::snapshot`] when they start.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolConfig {
    current: ToolKind,
    brushes: ToolDefaults,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self::new(ToolDefaults::default())
    }
}

impl ToolConfig {
    pub fn new(defaults: ToolDefaults) -> Self {
        Self {
            current: ToolKind::Pen,
            brushes: defaults.normalized(),
        }
    }

    pub fn current_tool(&self) -> ToolKind {
        self.current
    }

    pub fn set_tool(&mut self, tool: ToolKind) {
        if self.current != tool {
            log::debug!("Tool changed: {} -> {}", self.current.name(), tool.name());
        }
        self.current = tool;
    }

    pub fn brush(&self, tool: ToolKind) -> &BrushSettings {
        match tool {
            ToolKind::Pen => &self.brushes.pen,
            ToolKind::Highlighter => &self.brushes.highlighter,
            ToolKind::Area => &self.brushes.area,
        }
    }

    fn brush_mut(&mut self, tool: ToolKind) -> &mut BrushSettings {
        match tool {
            ToolKind::Pen => &mut self.brushes.pen,
            ToolKind::Highlighter => &mut self.brushes.highlighter,
            ToolKind::Area => &mut self.brushes.area,
        }
    }

    /// Brush of the current tool.
    pub fn current_brush(&self) -> &BrushSettings {
        self.brush(self.current)
    }

    /// Immutable copy of the current brush for a new stroke.
    pub fn snapshot(&self) -> BrushSettings {
        self.current_brush().clone()
    }

    pub fn set_size(&mut self, size: f64) {
        if size.is_finite() && size >= 0.0 {
            self.brush_mut(self.current).size = size.min(MAX_BRUSH_SIZE);
        }
    }

    pub fn set_color(&mut self, color: SerializableColor) {
        self.brush_mut(self.current).color = color;
    }

    pub fn set_opacity(&mut self, opacity: f64) {
        if opacity.is_finite() {
            self.brush_mut(self.current).opacity = opacity.clamp(0.0, 1.0);
        }
    }

    /// Set the blend mode of the current tool. Returns `false` when the tool
    /// does not support the mode.
    pub fn set_blend(&mut self, mode: BlendMode) -> bool {
        if !self.current.supports_blend(mode) {
            log::warn!("{} does not support {:?} blending", self.current.name(), mode);
            return false;
        }
        self.brush_mut(self.current).blend_mode = mode;
        true
    }

    pub fn defaults(&self) -> &ToolDefaults {
        &self.brushes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_selection() {
        let mut tools = ToolConfig::default();
        assert_eq!(tools.current_tool(), ToolKind::Pen);
        tools.set_tool(ToolKind::Highlighter);
        assert_eq!(tools.current_tool(), ToolKind::Highlighter);
        assert_eq!(tools.snapshot().tool, ToolKind::Highlighter);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut tools = ToolConfig::default();
        let snapshot = tools.snapshot();
        tools.set_size(50.0);
        tools.set_color(SerializableColor::black());
        assert_ne!(snapshot.size, 50.0);
        assert_ne!(snapshot.color, SerializableColor::black());
        assert_eq!(tools.current_brush().size, 50.0);
    }

    #[test]
    fn test_settings_are_per_tool() {
        let mut tools = ToolConfig::default();
        tools.set_size(11.0);
        tools.set_tool(ToolKind::Highlighter);
        assert_ne!(tools.current_brush().size, 11.0);
        tools.set_tool(ToolKind::Pen);
        assert_eq!(tools.current_brush().size, 11.0);
    }

    #[test]
    fn test_color_blend_rejected_for_pen() {
        let mut tools = ToolConfig::default();
        assert!(!tools.set_blend(BlendMode::Color));
        tools.set_tool(ToolKind::Highlighter);
        assert!(tools.set_blend(BlendMode::Color));
        assert_eq!(tools.current_brush().blend_mode, BlendMode::Color);
    }

    #[test]
    fn test_opacity_clamped() {
        let mut tools = ToolConfig::default();
        tools.set_opacity(3.0);
        assert_eq!(tools.current_brush().opacity, 1.0);
        tools.set_opacity(f64::NAN);
        assert_eq!(tools.current_brush().opacity, 1.0);
    }

    #[test]
    fn test_defaults_normalized() {
        let mut defaults = ToolDefaults::default();
        defaults.area.tool = ToolKind::Pen;
        let tools = ToolConfig::new(defaults);
        assert_eq!(tools.brush(ToolKind::Area).tool, ToolKind::Area);
    }

    #[test]
    fn test_oversized_brushes_capped() {
        let mut defaults = ToolDefaults::default();
        defaults.highlighter.size = 30_000.0;
        let mut tools = ToolConfig::new(defaults);
        assert_eq!(tools.brush(ToolKind::Highlighter).size, MAX_BRUSH_SIZE);

        tools.set_size(1e9);
        assert_eq!(tools.current_brush().size, MAX_BRUSH_SIZE);
    }

    #[test]
    fn test_defaults_from_partial_json() {
        let json = r#"{"pen":{"tool":"pen","size":9.0,"color":{"r":0,"g":0,"b":255,"a":255},"opacity":1.0}}"#;
        let defaults: ToolDefaults = serde_json::from_str(json).unwrap();
        assert_eq!(defaults.pen.size, 9.0);
        assert_eq!(defaults.highlighter, ToolDefaults::default().highlighter);
    }
}
