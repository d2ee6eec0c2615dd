//! OmniMark Render Library
//!
//! CPU raster compositor for OmniMark: layers, blend modes, stroke
//! rasterization, overlays and the frame scheduler.

mod compositor;
pub mod layer;
pub mod overlay;
pub mod raster;
mod renderer;
mod scheduler;

pub use compositor::Compositor;
pub use layer::{Layer, blend_pixel};
pub use overlay::OverlayStyle;
pub use raster::StrokeRasterizer;
pub use renderer::{RenderContext, RenderResult, Renderer, RendererError};
pub use scheduler::{DEFAULT_FRAME_INTERVAL, FrameScheduler};
