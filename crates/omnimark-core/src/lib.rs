//! OmniMark core: stroke model, replay history, viewport, ruler and the
//! pointer interaction state machine.

pub mod document;
pub mod history;
pub mod input;
pub mod interaction;
pub mod ruler;
pub mod storage;
pub mod stroke;
pub mod tools;
pub mod viewport;

pub use document::{DocumentId, DocumentState, DocumentStatus};
pub use history::{GroupOutcome, History, HistoryError, MAX_HISTORY};
pub use input::{Modifiers, MouseButton, PointerEvent, WheelEvent};
pub use interaction::{Interaction, InteractionContext, InteractionEffect, InteractionState};
pub use ruler::{Ruler, RulerDragMode, RulerState, SnapInfo, RULER_HEIGHT, SNAP_DISTANCE};
pub use storage::{FileStorage, MemoryStorage, Storage, StorageError, StorageResult, StrokeLog};
pub use stroke::{
    BlendMode, BrushSettings, SerializableColor, Stroke, StrokeGroup, ToolKind, MAX_BRUSH_SIZE,
    MAX_COORDINATE,
};
pub use tools::{ToolConfig, ToolDefaults};
pub use viewport::{Viewport, MAX_ZOOM, MIN_ZOOM};

// Re-export kurbo for convenience
pub use kurbo;
