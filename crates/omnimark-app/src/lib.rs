//! OmniMark Application
//!
//! The application shell: open documents, keyboard shortcuts, configuration,
//! background image loading and export.

mod app;
pub mod config;
pub mod export;
mod shortcuts;
pub mod workspace;

pub use app::{App, AppError, KEY_ZOOM_FACTOR, sidecar_path};
pub use config::{AppConfig, ConfigError};
pub use export::{ExportError, ExportOutcome, ExportTarget, ExportWorker};
pub use shortcuts::{Command, Shortcut, ShortcutRegistry};
pub use workspace::{ImageLoader, LoadError, Workspace};
