//! Counters for sessions and the capture loop

use std::time::{Duration, Instant};

/// Per-session statistics
#[derive(Debug, Clone)]
pub struct SessionStats {
    /// Parts (frames) delivered
    pub parts_sent: u64,
    /// Body bytes delivered, headers excluded
    pub bytes_sent: u64,
    /// Session start
    pub started_at: Instant,
}

impl SessionStats {
    pub fn new() -> Self {
        Self {
            parts_sent: 0,
            bytes_sent: 0,
            started_at: Instant::now(),
        }
    }

    /// Record one delivered part
    pub fn on_part(&mut self, bytes: u64) {
        self.parts_sent += 1;
        self.bytes_sent += bytes;
    }

    pub fn duration(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Average delivered frame rate
    pub fn framerate(&self) -> f64 {
        let secs = self.duration().as_secs_f64();
        if secs > 0.0 {
            self.parts_sent as f64 / secs
        } else {
            0.0
        }
    }
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Capture loop statistics
#[derive(Debug, Clone, Default)]
pub struct CaptureStats {
    /// Acquisitions completed by the source
    pub frames_captured: u64,
    /// Frames renamed into place
    pub frames_published: u64,
    /// Times acquisition was stopped for lack of readers
    pub pauses: u64,
    /// Bytes published
    pub bytes_published: u64,
}

impl CaptureStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_published(&mut self, bytes: usize) {
        self.frames_published += 1;
        self.bytes_published += bytes as u64;
    }

    /// Mean published frame size
    pub fn average_frame_size(&self) -> u64 {
        if self.frames_published > 0 {
            self.bytes_published / self.frames_published
        } else {
            0
        }
    }
}
