//! Frame scheduling.
//!
//! Rendering is pulled, not pushed: while the scheduler runs, a frame is due
//! every interval whether or not anything reported a change. A redraw request
//! only lets the next frame skip the remaining wait.

use std::time::{Duration, Instant};

/// Default minimum time between frames (~60 fps).
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Owns the render loop's lifecycle.
#[derive(Debug, Clone)]
pub struct FrameScheduler {
    interval: Duration,
    running: bool,
    urgent: bool,
    last_frame: Option<Instant>,
    frames: u64,
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_INTERVAL)
    }
}

impl FrameScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            running: false,
            urgent: false,
            last_frame: None,
            frames: 0,
        }
    }

    /// Start producing frames. The first frame is due immediately.
    pub fn start(&mut self) {
        if !self.running {
            log::debug!("Frame scheduler started");
        }
        self.running = true;
        self.last_frame = None;
    }

    /// Stop producing frames, e.g. when the document is hidden.
    pub fn stop(&mut self) {
        if self.running {
            log::debug!("Frame scheduler stopped after {} frames", self.frames);
        }
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Render the next frame as soon as possible instead of waiting out the
    /// interval. Frames keep coming without this.
    pub fn request_redraw(&mut self) {
        self.urgent = true;
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }

    /// Whether a frame should be rendered at `now`.
    pub fn frame_due(&self, now: Instant) -> bool {
        self.running
            && (self.urgent
                || self
                    .last_frame
                    .is_none_or(|last| now.saturating_duration_since(last) >= self.interval))
    }

    /// Record that a frame was rendered (or skipped as invalid) at `now`.
    pub fn frame_rendered(&mut self, now: Instant) {
        self.urgent = false;
        self.last_frame = Some(now);
        self.frames += 1;
    }
}
