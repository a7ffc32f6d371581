//! Relay (consumer) configuration

use std::path::PathBuf;

use crate::error::StartupError;
use crate::pipe::DEFAULT_PIPE_CAPACITY;
use crate::publish::{FrameLayout, DEFAULT_FILENAME, DEFAULT_WORKING_FILENAME};
use crate::session::{SnapshotPolicy, DEFAULT_BOUNDARY};

/// Socket send buffer applied to activated sockets
pub const DEFAULT_SEND_BUFFER: usize = 16384;

/// Relay configuration options
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Directory the producer publishes into
    pub work_dir: PathBuf,

    /// Canonical frame file name
    pub filename: String,

    /// Multipart boundary token
    pub boundary: String,

    /// Ring buffer capacity per session
    pub pipe_capacity: usize,

    /// Which frame a single-frame session delivers
    pub snapshot: SnapshotPolicy,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,

    /// TCP send buffer size (0 = OS default)
    pub tcp_send_buffer: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("."),
            filename: DEFAULT_FILENAME.to_string(),
            boundary: DEFAULT_BOUNDARY.to_string(),
            pipe_capacity: DEFAULT_PIPE_CAPACITY,
            snapshot: SnapshotPolicy::Current,
            tcp_nodelay: true,
            tcp_send_buffer: DEFAULT_SEND_BUFFER,
        }
    }
}

impl RelayConfig {
    /// Create a config for the given working directory
    pub fn with_work_dir(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            ..Default::default()
        }
    }

    /// Set the canonical file name
    pub fn filename(mut self, name: impl Into<String>) -> Self {
        self.filename = name.into();
        self
    }

    /// Set the multipart boundary token
    pub fn boundary(mut self, boundary: impl Into<String>) -> Self {
        self.boundary = boundary.into();
        self
    }

    /// Set the per-session ring capacity
    pub fn pipe_capacity(mut self, capacity: usize) -> Self {
        self.pipe_capacity = capacity.max(2);
        self
    }

    /// Set the snapshot policy
    pub fn snapshot(mut self, policy: SnapshotPolicy) -> Self {
        self.snapshot = policy;
        self
    }

    /// Set the socket send buffer size (0 = OS default)
    pub fn tcp_send_buffer(mut self, size: usize) -> Self {
        self.tcp_send_buffer = size;
        self
    }

    /// File layout in the working directory
    pub fn layout(&self) -> FrameLayout {
        FrameLayout::new(&self.work_dir, &self.filename, DEFAULT_WORKING_FILENAME)
    }

    /// The working directory may come and go, but its parent must exist
    pub fn validate(&self) -> Result<(), StartupError> {
        let layout = self.layout();
        if !layout.parent().is_dir() {
            return Err(StartupError::InvalidWorkDir(
                layout.work_dir().display().to_string(),
            ));
        }
        if self.boundary.is_empty() || self.boundary.contains(['\r', '\n', '"']) {
            return Err(StartupError::InvalidConstraints(format!(
                "invalid boundary token {:?}",
                self.boundary
            )));
        }
        Ok(())
    }
}
