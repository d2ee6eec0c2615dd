//! Per-tab document state.

use crate::history::History;
use crate::input::{PointerEvent, WheelEvent};
use crate::interaction::{Interaction, InteractionContext, InteractionEffect};
use crate::ruler::Ruler;
use crate::storage::{StorageResult, StrokeLog};
use crate::stroke::ToolKind;
use crate::tools::ToolConfig;
use crate::viewport::Viewport;
use kurbo::{Rect, Size};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an open document.
pub type DocumentId = Uuid;

/// Snapshot published to the toolbar and status bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DocumentStatus {
    pub can_undo: bool,
    pub can_redo: bool,
    pub tool: ToolKind,
    pub zoom: f64,
    /// Ruler angle in `[0, 360)`.
    pub ruler_angle: f64,
    pub ruler_visible: bool,
}

/// Everything one open image owns: its history, camera and ruler.
///
/// Nothing here is shared between tabs.
#[derive(Debug, Clone)]
pub struct DocumentState {
    id: DocumentId,
    pub name: String,
    image_size: Size,
    pub history: History,
    pub viewport: Viewport,
    pub ruler: Ruler,
    interaction: Interaction,
}

impl DocumentState {
    /// Create a document for a freshly opened image.
    pub fn new(name: impl Into<String>, image_size: Size) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            image_size,
            history: History::new(),
            viewport: Viewport::new(),
            ruler: Ruler::for_image(image_size),
            interaction: Interaction::new(),
        }
    }

    /// Create a document whose history is restored from a stroke log.
    pub fn from_log(name: impl Into<String>, log: &StrokeLog) -> StorageResult<Self> {
        let size = Size::new(f64::from(log.image_width), f64::from(log.image_height));
        let mut doc = Self::new(name, size);
        doc.history = log.to_history()?;
        Ok(doc)
    }

    /// Capture the committed history as a stroke log.
    pub fn to_log(&self) -> StrokeLog {
        StrokeLog::from_history(
            &self.history,
            self.image_size.width.max(0.0) as u32,
            self.image_size.height.max(0.0) as u32,
        )
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn image_size(&self) -> Size {
        self.image_size
    }

    pub fn interaction(&self) -> &Interaction {
        &self.interaction
    }

    pub fn is_drawing(&self) -> bool {
        self.interaction.is_drawing()
    }

    fn context<'a>(
        history: &'a mut History,
        viewport: &'a mut Viewport,
        ruler: &'a mut Ruler,
        tools: &'a ToolConfig,
        container: Rect,
    ) -> InteractionContext<'a> {
        InteractionContext {
            history,
            viewport,
            ruler,
            tools,
            container,
        }
    }

    /// Feed a pointer event through the interaction state machine.
    pub fn handle_pointer(
        &mut self,
        event: PointerEvent,
        tools: &ToolConfig,
        container: Rect,
    ) -> Vec<InteractionEffect> {
        let mut ctx = Self::context(
            &mut self.history,
            &mut self.viewport,
            &mut self.ruler,
            tools,
            container,
        );
        self.interaction.handle_pointer(&mut ctx, event)
    }

    pub fn handle_wheel(
        &mut self,
        event: WheelEvent,
        tools: &ToolConfig,
        container: Rect,
    ) -> Vec<InteractionEffect> {
        let mut ctx = Self::context(
            &mut self.history,
            &mut self.viewport,
            &mut self.ruler,
            tools,
            container,
        );
        self.interaction.handle_wheel(&mut ctx, event)
    }

    /// Finish any interaction in progress, e.g. before the tab is hidden.
    pub fn cancel_interaction(&mut self, tools: &ToolConfig, container: Rect) -> Vec<InteractionEffect> {
        let mut ctx = Self::context(
            &mut self.history,
            &mut self.viewport,
            &mut self.ruler,
            tools,
            container,
        );
        self.interaction.cancel(&mut ctx)
    }

    /// Step back one group. Returns whether the applied set changed, so the
    /// caller knows to replay. Refused while a stroke is being captured.
    pub fn undo(&mut self) -> bool {
        if self.is_drawing() {
            log::debug!("Undo ignored while drawing");
            return false;
        }
        let before = self.history.current_index();
        self.history.undo() != before
    }

    /// Step forward one group. Same contract as [`DocumentState::undo`].
    pub fn redo(&mut self) -> bool {
        if self.is_drawing() {
            log::debug!("Redo ignored while drawing");
            return false;
        }
        let before = self.history.current_index();
        self.history.redo() != before
    }

    /// Drop every stroke. Returns `false` while drawing.
    pub fn clear(&mut self) -> bool {
        if self.is_drawing() {
            return false;
        }
        self.history.clear();
        log::info!("Cleared annotations on '{}'", self.name);
        true
    }

    pub fn fit_to_window(&mut self, container: Size, padding: f64) {
        self.viewport.fit_to_window(container, self.image_size, padding);
    }

    /// Keyboard zoom, anchored at the container centre.
    pub fn zoom_by(&mut self, factor: f64, container: Rect) {
        self.viewport.zoom_by(factor, Some(container.center()), container);
    }

    /// Show or hide the ruler. A ruler that was never placed starts centred
    /// on the part of the image currently in view.
    pub fn toggle_ruler(&mut self, container: Rect) -> bool {
        let visible = self.ruler.toggle();
        if visible && !self.ruler.is_valid() {
            self.ruler = Ruler::for_image(self.image_size);
            self.ruler.toggle();
        }
        if visible {
            let view = self.viewport.visible_canvas_rect(container);
            let image = Rect::from_origin_size((0.0, 0.0), self.image_size);
            if !image.contains(self.ruler.state.center()) || view.intersect(image).area() <= 0.0 {
                self.ruler.center_on(view.center());
            }
        }
        visible
    }

    pub fn status(&self, tools: &ToolConfig) -> DocumentStatus {
        DocumentStatus {
            can_undo: self.history.can_undo(),
            can_redo: self.history.can_redo(),
            tool: tools.current_tool(),
            zoom: self.viewport.zoom,
            ruler_angle: self.ruler.state.display_angle(),
            ruler_visible: self.ruler.is_visible(),
        }
    }

    /// Whether viewport and ruler hold renderable values.
    pub fn is_valid(&self) -> bool {
        self.viewport.is_valid() && self.ruler.is_valid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{Modifiers, MouseButton};
    use kurbo::Point;

    fn container() -> Rect {
        Rect::new(0.0, 0.0, 1000.0, 800.0)
    }

    fn draw(doc: &mut DocumentState, tools: &ToolConfig, from: Point, to: Point) {
        doc.handle_pointer(
            PointerEvent::Down {
                position: from,
                button: MouseButton::Left,
                modifiers: Modifiers::NONE,
            },
            tools,
            container(),
        );
        doc.handle_pointer(
            PointerEvent::Move {
                position: to,
                modifiers: Modifiers::NONE,
            },
            tools,
            container(),
        );
        doc.handle_pointer(
            PointerEvent::Up {
                position: to,
                button: MouseButton::Left,
            },
            tools,
            container(),
        );
    }

    #[test]
    fn test_documents_have_distinct_ids() {
        let a = DocumentState::new("a.png", Size::new(10.0, 10.0));
        let b = DocumentState::new("b.png", Size::new(10.0, 10.0));
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_undo_redo_and_status() {
        let tools = ToolConfig::default();
        let mut doc = DocumentState::new("shot.png", Size::new(800.0, 600.0));
        draw(&mut doc, &tools, Point::new(10.0, 10.0), Point::new(50.0, 50.0));

        let status = doc.status(&tools);
        assert!(status.can_undo);
        assert!(!status.can_redo);
        assert_eq!(status.tool, ToolKind::Pen);

        assert!(doc.undo());
        assert!(!doc.undo());
        assert!(doc.status(&tools).can_redo);
        assert!(doc.redo());
        assert!(!doc.redo());
        assert_eq!(doc.history.current_index(), Some(0));
    }

    #[test]
    fn test_undo_refused_while_drawing() {
        let tools = ToolConfig::default();
        let mut doc = DocumentState::new("shot.png", Size::new(800.0, 600.0));
        draw(&mut doc, &tools, Point::new(10.0, 10.0), Point::new(50.0, 50.0));
        doc.handle_pointer(
            PointerEvent::Down {
                position: Point::new(100.0, 100.0),
                button: MouseButton::Left,
                modifiers: Modifiers::NONE,
            },
            &tools,
            container(),
        );
        assert!(doc.is_drawing());
        assert!(!doc.undo());
        assert!(doc.history.can_undo());
        assert!(!doc.clear());

        doc.cancel_interaction(&tools, container());
        assert_eq!(doc.history.len(), 2);
    }

    #[test]
    fn test_log_roundtrip() {
        let tools = ToolConfig::default();
        let mut doc = DocumentState::new("shot.png", Size::new(320.0, 240.0));
        draw(&mut doc, &tools, Point::new(1.0, 1.0), Point::new(9.0, 9.0));
        let log = doc.to_log();
        assert_eq!((log.image_width, log.image_height), (320, 240));

        let restored = DocumentState::from_log("shot.png", &log).unwrap();
        assert_eq!(restored.history.groups(), doc.history.groups());
        assert_eq!(restored.image_size(), Size::new(320.0, 240.0));
    }

    #[test]
    fn test_toggle_ruler_recenters_into_view() {
        let mut doc = DocumentState::new("shot.png", Size::new(4000.0, 4000.0));
        doc.viewport.offset = Point::new(3000.0, 3000.0);
        doc.ruler.center_on(Point::new(-10.0, -10.0));
        assert!(doc.toggle_ruler(container()));
        let center = doc.ruler.state.center();
        assert!((center.x - 3500.0).abs() < 1e-9);
        assert!((center.y - 3400.0).abs() < 1e-9);
        assert!(doc.status(&ToolConfig::default()).ruler_visible);
    }

    #[test]
    fn test_keyboard_zoom_keeps_center() {
        let mut doc = DocumentState::new("shot.png", Size::new(800.0, 600.0));
        let rect = container();
        let before = doc.viewport.screen_to_canvas(rect.center(), rect);
        doc.zoom_by(1.25, rect);
        let after = doc.viewport.screen_to_canvas(rect.center(), rect);
        assert!((before - after).hypot() < 1e-9);
        assert!((doc.viewport.zoom - 1.25).abs() < 1e-12);
    }
}
