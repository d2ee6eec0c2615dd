//! Open documents and image loading.
//!
//! Every tab owns a [`DocumentState`] plus its decoded image; the workspace
//! keeps them in an arena keyed by [`DocumentId`] and tracks which one is
//! active.

use image::RgbaImage;
use kurbo::Size;
use omnimark_core::{DocumentId, DocumentState};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, channel};
use thiserror::Error;

/// Image loading errors.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to read {path}: {message}")]
    Io { path: String, message: String },
    #[error("Failed to decode image: {0}")]
    Decode(String),
    #[error("Image has no pixels")]
    Empty,
    #[error("Image {width}x{height} is too large")]
    TooLarge { width: u32, height: u32 },
}

/// One open tab.
pub struct Tab {
    pub document: DocumentState,
    pub image: Arc<RgbaImage>,
    /// File the image was opened from, if any.
    pub source: Option<PathBuf>,
}

/// Arena of open documents.
#[derive(Default)]
pub struct Workspace {
    tabs: HashMap<DocumentId, Tab>,
    /// Tab order as shown in the tab bar.
    order: Vec<DocumentId>,
    active: Option<DocumentId>,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tab for a decoded image. The new tab does not become active.
    pub fn open(&mut self, name: impl Into<String>, image: Arc<RgbaImage>, source: Option<PathBuf>) -> DocumentId {
        let size = Size::new(f64::from(image.width()), f64::from(image.height()));
        let document = DocumentState::new(name, size);
        let id = document.id();
        log::info!("Opened '{}' ({}x{})", document.name, image.width(), image.height());
        self.tabs.insert(
            id,
            Tab {
                document,
                image,
                source,
            },
        );
        self.order.push(id);
        id
    }

    /// Close a tab. Returns it, and moves activation to a neighbour if needed.
    pub fn close(&mut self, id: DocumentId) -> Option<Tab> {
        let tab = self.tabs.remove(&id)?;
        let position = self.order.iter().position(|t| *t == id);
        self.order.retain(|t| *t != id);
        if self.active == Some(id) {
            self.active = position
                .and_then(|p| self.order.get(p.min(self.order.len().saturating_sub(1))))
                .copied();
        }
        Some(tab)
    }

    /// Make a tab active. Returns `false` for unknown ids.
    pub fn activate(&mut self, id: DocumentId) -> bool {
        if !self.tabs.contains_key(&id) {
            return false;
        }
        self.active = Some(id);
        true
    }

    pub fn active_id(&self) -> Option<DocumentId> {
        self.active
    }

    pub fn active(&self) -> Option<&Tab> {
        self.active.and_then(|id| self.tabs.get(&id))
    }

    pub fn active_mut(&mut self) -> Option<&mut Tab> {
        self.active.and_then(|id| self.tabs.get_mut(&id))
    }

    pub fn get(&self, id: DocumentId) -> Option<&Tab> {
        self.tabs.get(&id)
    }

    pub fn get_mut(&mut self, id: DocumentId) -> Option<&mut Tab> {
        self.tabs.get_mut(&id)
    }

    /// Tab ids in display order.
    pub fn ids(&self) -> &[DocumentId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }
}

/// Decode an image from encoded bytes.
pub fn decode_image(bytes: &[u8]) -> Result<RgbaImage, LoadError> {
    let image = image::load_from_memory(bytes)
        .map_err(|e| LoadError::Decode(e.to_string()))?
        .to_rgba8();
    if image.width() == 0 || image.height() == 0 {
        return Err(LoadError::Empty);
    }
    if image.width() > omnimark_render::layer::MAX_LAYER_DIMENSION
        || image.height() > omnimark_render::layer::MAX_LAYER_DIMENSION
    {
        return Err(LoadError::TooLarge {
            width: image.width(),
            height: image.height(),
        });
    }
    Ok(image)
}

/// Read and decode an image file.
pub fn decode_file(path: &Path) -> Result<RgbaImage, LoadError> {
    let bytes = std::fs::read(path).map_err(|e| LoadError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    decode_image(&bytes)
}

/// A finished background decode.
pub struct LoadedImage {
    pub generation: u64,
    pub path: PathBuf,
    pub result: Result<RgbaImage, LoadError>,
}

/// Decodes images off the UI thread.
///
/// Every request bumps a generation counter; results from older generations
/// are dropped on arrival, so a slow decode can never replace a newer one.
pub struct ImageLoader {
    generation: u64,
    /// Whether the latest request has not reported back yet.
    pending: bool,
    tx: Sender<LoadedImage>,
    rx: Receiver<LoadedImage>,
}

impl Default for ImageLoader {
    fn default() -> Self {
        let (tx, rx) = channel();
        Self {
            generation: 0,
            pending: false,
            tx,
            rx,
        }
    }
}

impl ImageLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Start decoding a file on a background thread.
    pub fn request(&mut self, path: PathBuf) -> u64 {
        self.generation += 1;
        self.pending = true;
        let generation = self.generation;
        let tx = self.tx.clone();
        std::thread::spawn(move || {
            let result = decode_file(&path);
            // The loader may have been dropped; nothing to report to then.
            let _ = tx.send(LoadedImage {
                generation,
                path,
                result,
            });
        });
        generation
    }

    /// Invalidate every pending request.
    pub fn cancel(&mut self) {
        self.generation += 1;
        self.pending = false;
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Whether a result belongs to the latest request.
    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.generation
    }

    /// Collect the result of the latest request, if it has arrived.
    ///
    /// Superseded results are discarded. A failed decode is returned as an
    /// error and leaves the workspace untouched.
    pub fn poll(&mut self) -> Option<LoadedImage> {
        let mut latest = None;
        while let Ok(loaded) = self.rx.try_recv() {
            if self.is_current(loaded.generation) {
                self.pending = false;
                latest = Some(loaded);
            } else {
                log::debug!(
                    "Dropping superseded decode of {} (generation {})",
                    loaded.path.display(),
                    loaded.generation
                );
            }
        }
        latest
    }

    /// Block until the latest request finishes. Returns `None` when nothing
    /// is pending.
    pub fn wait(&mut self) -> Option<LoadedImage> {
        while self.pending {
            let Ok(loaded) = self.rx.recv() else {
                break;
            };
            if self.is_current(loaded.generation) {
                self.pending = false;
                return Some(loaded);
            }
        }
        None
    }
}
