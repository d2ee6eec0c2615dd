//! PNG encoding, file export and clipboard copy.
//!
//! Encoding a large composite is slow, so jobs run on a background thread and
//! report back over a channel. Each job carries a version; only the newest
//! job's outcome is surfaced.

use image::RgbaImage;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::mpsc::{Receiver, Sender, channel};
use thiserror::Error;

/// Export errors.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("PNG encoding failed: {0}")]
    Encode(String),
    #[error("Failed to write {path}: {message}")]
    Io { path: String, message: String },
    #[error("Clipboard unavailable: {0}")]
    Clipboard(String),
}

/// Where an exported image goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportTarget {
    Clipboard,
    File(PathBuf),
}

/// Result of one export job.
#[derive(Debug)]
pub struct ExportOutcome {
    pub version: u64,
    pub target: ExportTarget,
    pub result: Result<usize, ExportError>,
}

/// Encode RGBA pixel data to PNG bytes.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, ExportError> {
    let mut png_data = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut png_data, image.width(), image.height());
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);

        let mut writer = encoder
            .write_header()
            .map_err(|e| ExportError::Encode(e.to_string()))?;
        writer
            .write_image_data(image.as_raw())
            .map_err(|e| ExportError::Encode(e.to_string()))?;
    }
    Ok(png_data)
}

/// Encode and write a PNG file. Returns the encoded size.
pub fn write_png(image: &RgbaImage, path: &std::path::Path) -> Result<usize, ExportError> {
    let png_data = encode_png(image)?;
    std::fs::write(path, &png_data).map_err(|e| ExportError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    log::info!("Exported PNG to {} ({} bytes)", path.display(), png_data.len());
    Ok(png_data.len())
}

/// Command-line clipboard used when arboard cannot reach the clipboard,
/// typically under Wayland.
pub const WAYLAND_COPY_COMMAND: &str = "wl-copy";

/// Copy the image to the system clipboard.
///
/// arboard is tried first; on failure the PNG is piped to `wl-copy`. The
/// error reports both attempts.
pub fn copy_to_clipboard(image: &RgbaImage) -> Result<usize, ExportError> {
    match copy_with_arboard(image) {
        Ok(bytes) => Ok(bytes),
        Err(e) => {
            log::warn!("{}, trying {} fallback", e, WAYLAND_COPY_COMMAND);
            copy_with_command(image, WAYLAND_COPY_COMMAND, &e)
        }
    }
}

fn copy_with_command(
    image: &RgbaImage,
    program: &str,
    primary: &ExportError,
) -> Result<usize, ExportError> {
    let png_data = encode_png(image)?;
    pipe_png(program, &png_data)
        .map_err(|e| ExportError::Clipboard(format!("{}; {} fallback: {}", primary, program, e)))?;
    log::info!("Image copied to clipboard via {} ({} bytes)", program, png_data.len());
    Ok(png_data.len())
}

fn pipe_png(program: &str, png_data: &[u8]) -> Result<(), String> {
    let mut child = Command::new(program)
        .args(["--type", "image/png"])
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| format!("failed to spawn: {}", e))?;
    if let Some(stdin) = child.stdin.as_mut() {
        stdin
            .write_all(png_data)
            .map_err(|e| format!("failed to write: {}", e))?;
    }
    let output = child
        .wait_with_output()
        .map_err(|e| format!("failed to wait: {}", e))?;
    if !output.status.success() {
        return Err(format!(
            "exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }
    Ok(())
}

#[cfg(feature = "native")]
fn copy_with_arboard(image: &RgbaImage) -> Result<usize, ExportError> {
    // arboard expects RGBA pixel data, not PNG encoded data
    let image_data = arboard::ImageData {
        width: image.width() as usize,
        height: image.height() as usize,
        bytes: std::borrow::Cow::Borrowed(image.as_raw()),
    };
    let mut clipboard =
        arboard::Clipboard::new().map_err(|e| ExportError::Clipboard(e.to_string()))?;
    clipboard
        .set_image(image_data)
        .map_err(|e| ExportError::Clipboard(e.to_string()))?;
    log::info!("Image copied to clipboard ({}x{})", image.width(), image.height());
    Ok(image.as_raw().len())
}

#[cfg(not(feature = "native"))]
fn copy_with_arboard(_image: &RgbaImage) -> Result<usize, ExportError> {
    Err(ExportError::Clipboard("built without the native feature".to_string()))
}

fn run_job(image: &RgbaImage, target: &ExportTarget) -> Result<usize, ExportError> {
    match target {
        ExportTarget::Clipboard => copy_to_clipboard(image),
        ExportTarget::File(path) => write_png(image, path),
    }
}

/// Runs export jobs off the calling thread.
pub struct ExportWorker {
    version: u64,
    /// Whether the newest job has not reported back yet.
    pending: bool,
    tx: Sender<ExportOutcome>,
    rx: Receiver<ExportOutcome>,
}

impl Default for ExportWorker {
    fn default() -> Self {
        let (tx, rx) = channel();
        Self {
            version: 0,
            pending: false,
            tx,
            rx,
        }
    }
}

impl ExportWorker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Version of the most recent job.
    pub fn latest_version(&self) -> u64 {
        self.version
    }

    /// Queue an export of `image`. Returns the job's version.
    pub fn submit(&mut self, image: RgbaImage, target: ExportTarget) -> u64 {
        self.version += 1;
        self.pending = true;
        let version = self.version;
        let tx = self.tx.clone();
        std::thread::spawn(move || {
            let result = run_job(&image, &target);
            if let Err(e) = &result {
                log::error!("Export {} failed: {}", version, e);
            }
            let _ = tx.send(ExportOutcome {
                version,
                target,
                result,
            });
        });
        version
    }

    /// Drain finished jobs, keeping only the newest job's outcome.
    pub fn poll(&mut self) -> Option<ExportOutcome> {
        let mut latest = None;
        while let Ok(outcome) = self.rx.try_recv() {
            if outcome.version == self.version {
                self.pending = false;
                latest = Some(outcome);
            } else {
                log::debug!("Ignoring stale export outcome {}", outcome.version);
            }
        }
        latest
    }

    /// Block until the newest job reports.
    pub fn wait(&mut self) -> Option<ExportOutcome> {
        while self.pending {
            let Ok(outcome) = self.rx.recv() else {
                break;
            };
            if outcome.version == self.version {
                self.pending = false;
                return Some(outcome);
            }
        }
        None
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }
}
