//! Application shell: wires documents, tools, layers and background workers.

use crate::config::AppConfig;
use crate::export::{ExportError, ExportOutcome, ExportTarget, ExportWorker};
use crate::shortcuts::{Command, ShortcutRegistry};
use crate::workspace::{ImageLoader, LoadError, Workspace};
use image::RgbaImage;
use kurbo::{Rect, Size};
use omnimark_core::{
    DocumentId, DocumentStatus, FileStorage, Modifiers, PointerEvent, Storage, StorageError,
    StrokeLog, ToolConfig, WheelEvent,
};
use omnimark_render::{Compositor, FrameScheduler, RenderContext, Renderer, RendererError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Zoom factor for the keyboard zoom commands.
pub const KEY_ZOOM_FACTOR: f64 = 1.25;

/// Errors surfaced to the shell.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("No document is open")]
    NoDocument,
    #[error("Document has no source file to save beside")]
    NoSource,
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Render(#[from] RendererError),
    #[error(transparent)]
    Export(#[from] ExportError),
}

/// The OmniMark application state.
pub struct App {
    config: AppConfig,
    tools: ToolConfig,
    workspace: Workspace,
    /// Layers of the active document. Inactive tabs keep only their history.
    compositor: Option<Compositor>,
    scheduler: FrameScheduler,
    loader: ImageLoader,
    exporter: ExportWorker,
    /// Canvas element rectangle in screen space.
    container: Rect,
}

impl App {
    pub fn new(config: AppConfig) -> Self {
        let container = Rect::new(0.0, 0.0, f64::from(config.width), f64::from(config.height));
        Self {
            tools: ToolConfig::new(config.tools.clone()),
            scheduler: FrameScheduler::new(config.frame_interval()),
            workspace: Workspace::new(),
            compositor: None,
            loader: ImageLoader::new(),
            exporter: ExportWorker::new(),
            container,
            config,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn tools(&self) -> &ToolConfig {
        &self.tools
    }

    pub fn tools_mut(&mut self) -> &mut ToolConfig {
        &mut self.tools
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn compositor(&self) -> Option<&Compositor> {
        self.compositor.as_ref()
    }

    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    pub fn container(&self) -> Rect {
        self.container
    }

    /// Open a decoded image in a new tab and make it active.
    ///
    /// When the image came from a file with a saved stroke log beside it,
    /// the log is restored.
    pub fn open_image(
        &mut self,
        name: impl Into<String>,
        image: RgbaImage,
        source: Option<PathBuf>,
    ) -> Result<DocumentId, AppError> {
        let image = Arc::new(image);
        // Building the layers first rejects unusable images before a tab exists.
        let compositor = Compositor::new(Arc::clone(&image))?;
        let id = self.workspace.open(name, image, source.clone());
        if let Some(tab) = self.workspace.get_mut(id) {
            tab.document
                .fit_to_window(self.container.size(), self.config.fit_padding);
            if let Some(source) = &source {
                match read_sidecar(source) {
                    Ok(Some(log)) => match log.to_history() {
                        Ok(history) => tab.document.history = history,
                        Err(e) => log::warn!("Ignoring stroke log for {}: {}", source.display(), e),
                    },
                    Ok(None) => {}
                    Err(e) => log::warn!("Ignoring stroke log for {}: {}", source.display(), e),
                }
            }
        }
        self.switch_to(id, compositor);
        Ok(id)
    }

    /// Decode a file in the background; see [`App::poll_loads`].
    pub fn request_open(&mut self, path: PathBuf) -> u64 {
        log::info!("Loading {}", path.display());
        self.loader.request(path)
    }

    /// Open the latest finished decode, if any. A failed decode leaves every
    /// open document untouched.
    pub fn poll_loads(&mut self) -> Option<Result<DocumentId, AppError>> {
        let loaded = self.loader.poll()?;
        Some(self.finish_load(loaded))
    }

    /// Block until the pending decode finishes and open it.
    pub fn wait_for_load(&mut self) -> Option<Result<DocumentId, AppError>> {
        let loaded = self.loader.wait()?;
        Some(self.finish_load(loaded))
    }

    fn finish_load(&mut self, loaded: crate::workspace::LoadedImage) -> Result<DocumentId, AppError> {
        let image = loaded.result.inspect_err(|e| {
            log::error!("Failed to load {}: {}", loaded.path.display(), e);
        })?;
        let name = loaded
            .path
            .file_name()
            .map_or_else(|| "untitled".to_string(), |n| n.to_string_lossy().into_owned());
        self.open_image(name, image, Some(loaded.path))
    }

    /// Switch the active tab, rebuilding its layers by replay.
    pub fn activate(&mut self, id: DocumentId) -> Result<(), AppError> {
        if self.workspace.active_id() == Some(id) {
            return Ok(());
        }
        let tab = self.workspace.get(id).ok_or(AppError::NoDocument)?;
        let compositor = Compositor::new(Arc::clone(&tab.image))?;
        self.switch_to(id, compositor);
        Ok(())
    }

    fn switch_to(&mut self, id: DocumentId, mut compositor: Compositor) {
        // A stroke in progress on the old tab is committed, not lost.
        if let Some(tab) = self.workspace.active_mut() {
            if tab.document.id() != id {
                tab.document.cancel_interaction(&self.tools, self.container);
            }
        }
        if let Some(tab) = self.workspace.get(id) {
            compositor.replay(&tab.document.history);
        }
        self.workspace.activate(id);
        self.compositor = Some(compositor);
        self.scheduler.start();
    }

    /// Close a tab; the next tab becomes active.
    pub fn close(&mut self, id: DocumentId) -> Result<(), AppError> {
        let was_active = self.workspace.active_id() == Some(id);
        self.workspace.close(id).ok_or(AppError::NoDocument)?;
        if !was_active {
            return Ok(());
        }
        self.compositor = None;
        match self.workspace.active_id() {
            Some(next) => {
                let tab = self.workspace.get(next).ok_or(AppError::NoDocument)?;
                let compositor = Compositor::new(Arc::clone(&tab.image))?;
                self.switch_to(next, compositor);
            }
            None => self.scheduler.stop(),
        }
        Ok(())
    }

    /// Tie rendering to visibility of the canvas.
    pub fn set_visible(&mut self, visible: bool) {
        if visible && self.compositor.is_some() {
            self.scheduler.start();
        } else {
            self.scheduler.stop();
        }
    }

    pub fn resize(&mut self, size: Size) {
        self.container = Rect::from_origin_size(self.container.origin(), size);
        self.scheduler.request_redraw();
    }

    pub fn handle_pointer(&mut self, event: PointerEvent) {
        let (Some(tab), Some(compositor)) = (self.workspace.active_mut(), self.compositor.as_mut()) else {
            return;
        };
        let effects = tab.document.handle_pointer(event, &self.tools, self.container);
        if compositor.apply_effects(&effects, &tab.document.history) {
            self.scheduler.request_redraw();
        }
    }

    pub fn handle_wheel(&mut self, event: WheelEvent) {
        let (Some(tab), Some(compositor)) = (self.workspace.active_mut(), self.compositor.as_mut()) else {
            return;
        };
        let effects = tab.document.handle_wheel(event, &self.tools, self.container);
        if compositor.apply_effects(&effects, &tab.document.history) {
            self.scheduler.request_redraw();
        }
    }

    /// Handle a key press. Returns whether it mapped to a command.
    pub fn handle_key(&mut self, key: &str, modifiers: Modifiers) -> bool {
        let Some(command) = ShortcutRegistry::lookup(key, modifiers) else {
            return false;
        };
        if let Err(e) = self.execute(command) {
            log::error!("{:?} failed: {}", command, e);
        }
        true
    }

    pub fn execute(&mut self, command: Command) -> Result<(), AppError> {
        log::debug!("Command: {:?}", command);
        if let Command::SelectTool(tool) = command {
            self.tools.set_tool(tool);
            return Ok(());
        }
        match command {
            Command::CopyToClipboard => {
                self.copy_to_clipboard()?;
                return Ok(());
            }
            Command::SaveStrokeLog => return self.save_stroke_log().map(|_| ()),
            _ => {}
        }

        let container = self.container;
        let padding = self.config.fit_padding;
        let (Some(tab), Some(compositor)) = (self.workspace.active_mut(), self.compositor.as_mut()) else {
            return Err(AppError::NoDocument);
        };
        let doc = &mut tab.document;
        let replay = match command {
            Command::ZoomIn => {
                doc.zoom_by(KEY_ZOOM_FACTOR, container);
                false
            }
            Command::ZoomOut => {
                doc.zoom_by(1.0 / KEY_ZOOM_FACTOR, container);
                false
            }
            Command::FitToWindow => {
                doc.fit_to_window(container.size(), padding);
                false
            }
            Command::Undo => doc.undo(),
            Command::Redo => doc.redo(),
            Command::ToggleRuler => {
                doc.toggle_ruler(container);
                false
            }
            Command::ClearAnnotations => doc.clear(),
            Command::SelectTool(_) | Command::CopyToClipboard | Command::SaveStrokeLog => false,
        };
        if replay {
            compositor.replay(&doc.history);
        }
        self.scheduler.request_redraw();
        Ok(())
    }

    /// Toolbar/status snapshot for the active document.
    pub fn status(&self) -> Option<DocumentStatus> {
        self.workspace
            .active()
            .map(|tab| tab.document.status(&self.tools))
    }

    /// Render a frame if one is due. Invalid frames are skipped with a warning.
    pub fn tick(&mut self, now: Instant) -> Option<&RgbaImage> {
        if !self.scheduler.frame_due(now) {
            return None;
        }
        let (Some(tab), Some(compositor)) = (self.workspace.active(), self.compositor.as_mut()) else {
            return None;
        };
        let ctx = RenderContext::new(&tab.document.viewport, &tab.document.ruler, self.container.size())
            .with_background(self.config.background());
        let rendered = compositor.render_frame(&ctx);
        self.scheduler.frame_rendered(now);
        match rendered {
            Ok(()) => self.compositor.as_ref().map(Compositor::display),
            Err(e) => {
                log::warn!("Skipping frame: {}", e);
                None
            }
        }
    }

    /// Image plus annotations, without overlays.
    pub fn composite(&self) -> Option<RgbaImage> {
        self.compositor.as_ref().map(Compositor::composite)
    }

    /// Copy the composite to the clipboard in the background.
    pub fn copy_to_clipboard(&mut self) -> Result<u64, AppError> {
        let image = self.composite().ok_or(AppError::NoDocument)?;
        Ok(self.exporter.submit(image, ExportTarget::Clipboard))
    }

    /// Write the composite as PNG in the background.
    pub fn export_png(&mut self, path: PathBuf) -> Result<u64, AppError> {
        let image = self.composite().ok_or(AppError::NoDocument)?;
        Ok(self.exporter.submit(image, ExportTarget::File(path)))
    }

    pub fn poll_exports(&mut self) -> Option<ExportOutcome> {
        self.exporter.poll()
    }

    pub fn wait_for_export(&mut self) -> Option<ExportOutcome> {
        self.exporter.wait()
    }

    /// Save the active document's stroke log beside its image.
    pub fn save_stroke_log(&self) -> Result<PathBuf, AppError> {
        let tab = self.workspace.active().ok_or(AppError::NoDocument)?;
        let source = tab.source.as_deref().ok_or(AppError::NoSource)?;
        let (storage, id) = FileStorage::beside(source)?;
        storage.save(&id, &tab.document.to_log())?;
        Ok(sidecar_path(source))
    }

    /// Replace the active document's history with a stroke log and replay it.
    pub fn load_stroke_log(&mut self, log: &StrokeLog) -> Result<(), AppError> {
        let (Some(tab), Some(compositor)) = (self.workspace.active_mut(), self.compositor.as_mut()) else {
            return Err(AppError::NoDocument);
        };
        if (log.image_width, log.image_height) != tab.image.dimensions() {
            log::warn!(
                "Stroke log was recorded on a {}x{} image, current image is {}x{}",
                log.image_width,
                log.image_height,
                tab.image.width(),
                tab.image.height()
            );
        }
        tab.document.history = log.to_history()?;
        compositor.replay(&tab.document.history);
        self.scheduler.request_redraw();
        Ok(())
    }
}

/// Path of the stroke log saved beside an image.
pub fn sidecar_path(image: &Path) -> PathBuf {
    let mut name = image.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(omnimark_core::storage::LOG_EXTENSION);
    image.with_file_name(name)
}

fn read_sidecar(source: &Path) -> Result<Option<StrokeLog>, StorageError> {
    let (storage, id) = FileStorage::beside(source)?;
    if !storage.exists(&id)? {
        return Ok(None);
    }
    storage.load(&id).map(Some)
}
