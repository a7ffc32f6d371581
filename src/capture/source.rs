//! Frame Source seam
//!
//! A frame source owns the acquisition device and a fixed set of buffers,
//! one per slot. The capture loop queues slots and waits for them to
//! complete; it never touches the device any other way.

use std::fmt;
use std::time::Duration;

use bytes::Bytes;

use crate::error::Result;

/// Frame dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Acquisition settings handed to the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSettings {
    pub size: Resolution,
    /// Number of slots (buffers) to allocate
    pub buffer_count: usize,
    /// Minimum interval between frames, enforced by the source itself
    pub frame_duration: Duration,
}

/// One plane inside a frame buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plane {
    pub offset: usize,
    pub length: usize,
}

/// Memory of one acquisition slot
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    /// Identity of the underlying allocation; changes when the source
    /// reallocates the slot
    pub buffer_id: u64,
    pub size: Resolution,
    pub planes: Vec<Plane>,
    pub data: Bytes,
}

impl FrameBuffer {
    /// Bytes of plane `index`
    pub fn plane(&self, index: usize) -> Option<&[u8]> {
        let plane = self.planes.get(index)?;
        let end = plane.offset.checked_add(plane.length)?;
        self.data.get(plane.offset..end)
    }
}

/// A device that fills slots on request
#[allow(async_fn_in_trait)]
pub trait FrameSource {
    /// Sizes the device can deliver, ascending
    fn resolutions(&self) -> Vec<Resolution>;

    /// Apply settings; must precede [`FrameSource::start`]
    fn configure(&mut self, settings: &StreamSettings) -> Result<()>;

    /// Resolve once the device acknowledged its configuration
    async fn ready(&mut self) -> Result<()>;

    fn start(&mut self) -> Result<()>;

    /// Stop acquisition, cancelling queued requests
    fn stop(&mut self) -> Result<()>;

    /// Queue `slot` for acquisition
    fn queue(&mut self, slot: usize) -> Result<()>;

    /// Wait for the next completed slot
    ///
    /// Must be cancel-safe: a completion is never lost if the returned
    /// future is dropped before it resolves.
    async fn completed(&mut self) -> Result<usize>;

    /// Buffer backing `slot`
    fn buffer(&self, slot: usize) -> &FrameBuffer;
}
