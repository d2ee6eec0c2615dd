//! Pointer interaction state machine.
//!
//! Translates pointer and wheel events into history, viewport and ruler
//! mutations. Pixel work is left to the caller, which receives a list of
//! [`InteractionEffect`]s describing what changed.

use crate::history::{GroupOutcome, History};
use crate::input::{Modifiers, MouseButton, PointerEvent, WheelEvent};
use crate::ruler::{Ruler, RulerDragMode};
use crate::stroke::{Stroke, ToolKind};
use crate::tools::ToolConfig;
use crate::viewport::Viewport;
use kurbo::{Point, Rect};

/// Zoom factor applied per wheel notch.
pub const WHEEL_ZOOM_FACTOR: f64 = 1.1;

/// Current interaction.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum InteractionState {
    #[default]
    Idle,
    /// Recording a stroke group.
    Drawing {
        tool: ToolKind,
        /// Last accepted (possibly snapped) canvas point.
        last_point: Point,
    },
    /// Dragging the camera; `anchor` is the grabbed canvas point.
    Panning { anchor: Point },
    RulerDragging,
}

/// Something the renderer or shell must react to.
#[derive(Debug, Clone, PartialEq)]
pub enum InteractionEffect {
    /// A stroke was opened; read it from `History::open_stroke`.
    StrokeStarted,
    /// The open stroke gained a segment, in canvas space.
    StrokeExtended { from: Point, to: Point },
    /// Rubber band for the area tool; `None` clears it.
    AreaPreview(Option<Rect>),
    /// The open stroke is complete and about to be committed.
    StrokeFinished(Stroke),
    GroupCommitted(usize),
    GroupDiscarded,
    ViewportChanged,
    RulerChanged,
}

/// Mutable document pieces an interaction works on.
pub struct InteractionContext<'a> {
    pub history: &'a mut History,
    pub viewport: &'a mut Viewport,
    pub ruler: &'a mut Ruler,
    pub tools: &'a ToolConfig,
    /// Container rectangle in screen space.
    pub container: Rect,
}

impl InteractionContext<'_> {
    fn to_canvas(&self, screen: Point) -> Point {
        self.viewport.screen_to_canvas(screen, self.container)
    }
}

/// Whether a button press starts a pan.
fn is_pan_trigger(button: MouseButton, modifiers: Modifiers) -> bool {
    match button {
        MouseButton::Middle => true,
        MouseButton::Left => modifiers.alt,
        MouseButton::Right => false,
    }
}

/// Interaction state machine for one document.
#[derive(Debug, Clone, Default)]
pub struct Interaction {
    state: InteractionState,
}

impl Interaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> InteractionState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == InteractionState::Idle
    }

    pub fn is_drawing(&self) -> bool {
        matches!(self.state, InteractionState::Drawing { .. })
    }

    /// Dispatch a pointer event.
    pub fn handle_pointer(
        &mut self,
        ctx: &mut InteractionContext<'_>,
        event: PointerEvent,
    ) -> Vec<InteractionEffect> {
        match event {
            PointerEvent::Down {
                position,
                button,
                modifiers,
            } => self.pointer_down(ctx, position, button, modifiers),
            PointerEvent::Move { position, .. } => self.pointer_move(ctx, position),
            PointerEvent::Up { .. } | PointerEvent::Leave { .. } => self.pointer_release(ctx),
        }
    }

    /// Begin panning, ruler dragging or drawing.
    pub fn pointer_down(
        &mut self,
        ctx: &mut InteractionContext<'_>,
        screen: Point,
        button: MouseButton,
        modifiers: Modifiers,
    ) -> Vec<InteractionEffect> {
        if !self.is_idle() {
            return Vec::new();
        }
        let point = ctx.to_canvas(screen);

        if is_pan_trigger(button, modifiers) {
            self.state = InteractionState::Panning { anchor: point };
            return Vec::new();
        }
        if button != MouseButton::Left {
            return Vec::new();
        }

        if ctx.ruler.is_click_on_ruler(point) {
            let mode = if modifiers.shift {
                RulerDragMode::Rotate
            } else {
                RulerDragMode::Translate
            };
            ctx.ruler.start_drag(point, mode);
            self.state = InteractionState::RulerDragging;
            return vec![InteractionEffect::RulerChanged];
        }

        self.start_drawing(ctx, point)
    }

    fn start_drawing(&mut self, ctx: &mut InteractionContext<'_>, point: Point) -> Vec<InteractionEffect> {
        let brush = ctx.tools.snapshot();
        let tool = brush.tool;
        let point = ctx.ruler.snap(point, brush.marker_size()).unwrap_or(point);

        if ctx.history.is_recording() {
            log::warn!("Stroke group left open by a previous interaction; closing it");
            ctx.history.end_group();
        }
        if let Err(e) = ctx
            .history
            .start_group()
            .and_then(|()| ctx.history.start_stroke(brush, point))
        {
            log::error!("Failed to start stroke: {}", e);
            return Vec::new();
        }

        self.state = InteractionState::Drawing {
            tool,
            last_point: point,
        };
        let mut effects = vec![InteractionEffect::StrokeStarted];
        if tool == ToolKind::Area {
            effects.push(InteractionEffect::AreaPreview(Some(Rect::from_points(point, point))));
        }
        effects
    }

    /// Continue the current interaction.
    pub fn pointer_move(&mut self, ctx: &mut InteractionContext<'_>, screen: Point) -> Vec<InteractionEffect> {
        let point = ctx.to_canvas(screen);
        match self.state {
            InteractionState::Idle => Vec::new(),
            InteractionState::Panning { anchor } => {
                ctx.viewport.pan_to_anchor(anchor, screen, ctx.container);
                vec![InteractionEffect::ViewportChanged]
            }
            InteractionState::RulerDragging => {
                ctx.ruler.drag(point);
                vec![InteractionEffect::RulerChanged]
            }
            InteractionState::Drawing { tool, last_point } => {
                if !point.x.is_finite() || !point.y.is_finite() {
                    return Vec::new();
                }
                let marker = ctx
                    .history
                    .open_stroke()
                    .map_or_else(|| ctx.tools.brush(tool).marker_size(), |s| s.brush.marker_size());
                let point = ctx.ruler.snap(point, marker).unwrap_or(point);
                self.state = InteractionState::Drawing {
                    tool,
                    last_point: point,
                };

                match tool {
                    ToolKind::Pen | ToolKind::Highlighter => {
                        ctx.history.add_point(point);
                        vec![InteractionEffect::StrokeExtended {
                            from: last_point,
                            to: point,
                        }]
                    }
                    ToolKind::Area => {
                        let start = ctx.history.open_stroke().map_or(point, Stroke::first_point);
                        vec![InteractionEffect::AreaPreview(Some(Rect::from_points(start, point)))]
                    }
                }
            }
        }
    }

    /// Pointer released or left the canvas: finish whatever is in progress.
    pub fn pointer_release(&mut self, ctx: &mut InteractionContext<'_>) -> Vec<InteractionEffect> {
        let state = std::mem::take(&mut self.state);
        match state {
            InteractionState::Idle => Vec::new(),
            InteractionState::Panning { .. } => Vec::new(),
            InteractionState::RulerDragging => {
                ctx.ruler.end_drag();
                vec![InteractionEffect::RulerChanged]
            }
            InteractionState::Drawing { tool, last_point } => {
                let mut effects = Vec::new();
                if tool == ToolKind::Area {
                    // The terminal corner comes from the last valid point,
                    // including when the pointer left the canvas.
                    ctx.history.add_point(last_point);
                    effects.push(InteractionEffect::AreaPreview(None));
                }
                if let Some(stroke) = ctx.history.open_stroke() {
                    effects.push(InteractionEffect::StrokeFinished(stroke.clone()));
                }
                effects.push(match ctx.history.end_group() {
                    GroupOutcome::Committed(index) => InteractionEffect::GroupCommitted(index),
                    GroupOutcome::Discarded | GroupOutcome::NothingOpen => {
                        InteractionEffect::GroupDiscarded
                    }
                });
                effects
            }
        }
    }

    /// Wheel: zoom with the command modifier, otherwise rotate a visible ruler.
    pub fn handle_wheel(&mut self, ctx: &mut InteractionContext<'_>, event: WheelEvent) -> Vec<InteractionEffect> {
        if event.delta.y == 0.0 || !event.delta.y.is_finite() {
            return Vec::new();
        }
        if event.modifiers.command() {
            let factor = if event.delta.y < 0.0 {
                WHEEL_ZOOM_FACTOR
            } else {
                1.0 / WHEEL_ZOOM_FACTOR
            };
            ctx.viewport.zoom_by(factor, Some(event.position), ctx.container);
            return vec![InteractionEffect::ViewportChanged];
        }
        if ctx.ruler.is_visible() {
            ctx.ruler.rotate_step(event.delta.y);
            return vec![InteractionEffect::RulerChanged];
        }
        Vec::new()
    }

    /// Abort the current interaction, committing any stroke in progress.
    pub fn cancel(&mut self, ctx: &mut InteractionContext<'_>) -> Vec<InteractionEffect> {
        self.pointer_release(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::{Size, Vec2};

    struct Fixture {
        history: History,
        viewport: Viewport,
        ruler: Ruler,
        tools: ToolConfig,
        interaction: Interaction,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                history: History::new(),
                viewport: Viewport::new(),
                ruler: Ruler::for_image(Size::new(800.0, 600.0)),
                tools: ToolConfig::default(),
                interaction: Interaction::new(),
            }
        }

        fn pointer(&mut self, event: PointerEvent) -> Vec<InteractionEffect> {
            let mut ctx = InteractionContext {
                history: &mut self.history,
                viewport: &mut self.viewport,
                ruler: &mut self.ruler,
                tools: &self.tools,
                container: Rect::new(0.0, 0.0, 1000.0, 800.0),
            };
            self.interaction.handle_pointer(&mut ctx, event)
        }

        fn wheel(&mut self, event: WheelEvent) -> Vec<InteractionEffect> {
            let mut ctx = InteractionContext {
                history: &mut self.history,
                viewport: &mut self.viewport,
                ruler: &mut self.ruler,
                tools: &self.tools,
                container: Rect::new(0.0, 0.0, 1000.0, 800.0),
            };
            self.interaction.handle_wheel(&mut ctx, event)
        }

        fn down(&mut self, x: f64, y: f64, button: MouseButton, modifiers: Modifiers) -> Vec<InteractionEffect> {
            self.pointer(PointerEvent::Down {
                position: Point::new(x, y),
                button,
                modifiers,
            })
        }

        fn mv(&mut self, x: f64, y: f64) -> Vec<InteractionEffect> {
            self.pointer(PointerEvent::Move {
                position: Point::new(x, y),
                modifiers: Modifiers::NONE,
            })
        }

        fn up(&mut self, x: f64, y: f64) -> Vec<InteractionEffect> {
            self.pointer(PointerEvent::Up {
                position: Point::new(x, y),
                button: MouseButton::Left,
            })
        }
    }

    #[test]
    fn test_pen_stroke_commits_group() {
        let mut f = Fixture::new();
        let effects = f.down(10.0, 10.0, MouseButton::Left, Modifiers::NONE);
        assert_eq!(effects, vec![InteractionEffect::StrokeStarted]);
        assert!(f.interaction.is_drawing());

        let effects = f.mv(20.0, 15.0);
        assert_eq!(
            effects,
            vec![InteractionEffect::StrokeExtended {
                from: Point::new(10.0, 10.0),
                to: Point::new(20.0, 15.0),
            }]
        );

        let effects = f.up(20.0, 15.0);
        assert!(matches!(effects.last(), Some(InteractionEffect::GroupCommitted(0))));
        assert!(f.interaction.is_idle());
        assert_eq!(f.history.groups()[0].strokes[0].points.len(), 2);
    }

    #[test]
    fn test_click_without_drag_still_records_dot() {
        let mut f = Fixture::new();
        f.down(10.0, 10.0, MouseButton::Left, Modifiers::NONE);
        f.up(10.0, 10.0);
        assert_eq!(f.history.len(), 1);
    }

    #[test]
    fn test_area_records_terminal_corner_on_leave() {
        let mut f = Fixture::new();
        f.tools.set_tool(ToolKind::Area);
        f.down(10.0, 10.0, MouseButton::Left, Modifiers::NONE);
        let effects = f.mv(110.0, 60.0);
        assert_eq!(
            effects,
            vec![InteractionEffect::AreaPreview(Some(Rect::new(10.0, 10.0, 110.0, 60.0)))]
        );
        let effects = f.pointer(PointerEvent::Leave {
            position: Point::new(-50.0, -50.0),
        });
        assert!(effects.contains(&InteractionEffect::AreaPreview(None)));
        let stroke = &f.history.groups()[0].strokes[0];
        assert_eq!(stroke.points, vec![Point::new(10.0, 10.0), Point::new(110.0, 60.0)]);
    }

    #[test]
    fn test_area_ignores_intermediate_points() {
        let mut f = Fixture::new();
        f.tools.set_tool(ToolKind::Area);
        f.down(0.0, 0.0, MouseButton::Left, Modifiers::NONE);
        f.mv(5.0, 5.0);
        f.mv(50.0, 40.0);
        f.up(50.0, 40.0);
        assert_eq!(f.history.groups()[0].strokes[0].points.len(), 2);
    }

    #[test]
    fn test_middle_button_pans() {
        let mut f = Fixture::new();
        f.down(100.0, 100.0, MouseButton::Middle, Modifiers::NONE);
        assert!(matches!(f.interaction.state(), InteractionState::Panning { .. }));
        let effects = f.mv(130.0, 80.0);
        assert_eq!(effects, vec![InteractionEffect::ViewportChanged]);
        assert_eq!(f.viewport.offset, Point::new(-30.0, 20.0));
        f.up(130.0, 80.0);
        assert!(f.interaction.is_idle());
        assert!(f.history.is_empty());
    }

    #[test]
    fn test_alt_left_pans() {
        let mut f = Fixture::new();
        f.down(0.0, 0.0, MouseButton::Left, Modifiers::NONE.with_alt());
        assert!(matches!(f.interaction.state(), InteractionState::Panning { .. }));
    }

    #[test]
    fn test_ruler_drag() {
        let mut f = Fixture::new();
        f.ruler.toggle();
        f.down(400.0, 300.0, MouseButton::Left, Modifiers::NONE);
        assert_eq!(f.interaction.state(), InteractionState::RulerDragging);
        f.mv(450.0, 320.0);
        assert_eq!(f.ruler.state.center(), Point::new(450.0, 320.0));
        f.up(450.0, 320.0);
        assert!(!f.ruler.state.is_dragging);
        assert!(f.history.is_empty());
    }

    #[test]
    fn test_drawing_snaps_to_ruler() {
        let mut f = Fixture::new();
        f.ruler.toggle();
        // Ruler centered at (400, 300), horizontal; lower edge at y = 340.
        f.down(100.0, 350.0, MouseButton::Left, Modifiers::NONE);
        let pen_half = f.tools.current_brush().size / 2.0;
        let start = f.history.open_stroke().unwrap().points[0];
        assert!((start.y - (340.0 + pen_half)).abs() < 1e-9);
        assert!((start.x - 100.0).abs() < 1e-9);

        f.mv(200.0, 500.0);
        let far = f.history.open_stroke().unwrap().last_point();
        assert_eq!(far, Point::new(200.0, 500.0));
    }

    #[test]
    fn test_wheel_zoom_and_rotate() {
        let mut f = Fixture::new();
        let effects = f.wheel(WheelEvent {
            position: Point::new(500.0, 400.0),
            delta: Vec2::new(0.0, -1.0),
            modifiers: Modifiers::NONE.with_ctrl(),
        });
        assert_eq!(effects, vec![InteractionEffect::ViewportChanged]);
        assert!((f.viewport.zoom - WHEEL_ZOOM_FACTOR).abs() < 1e-12);

        // Hidden ruler ignores plain wheel.
        let plain = WheelEvent {
            position: Point::ZERO,
            delta: Vec2::new(0.0, 1.0),
            modifiers: Modifiers::NONE,
        };
        assert!(f.wheel(plain).is_empty());
        f.ruler.toggle();
        assert_eq!(f.wheel(plain), vec![InteractionEffect::RulerChanged]);
        assert!((f.ruler.state.angle - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_second_down_while_drawing_ignored() {
        let mut f = Fixture::new();
        f.down(0.0, 0.0, MouseButton::Left, Modifiers::NONE);
        assert!(f.down(5.0, 5.0, MouseButton::Middle, Modifiers::NONE).is_empty());
        assert!(f.interaction.is_drawing());
    }

    #[test]
    fn test_right_button_ignored() {
        let mut f = Fixture::new();
        assert!(f.down(0.0, 0.0, MouseButton::Right, Modifiers::NONE).is_empty());
        assert!(f.interaction.is_idle());
    }
}
