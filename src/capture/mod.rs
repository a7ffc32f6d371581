//! Producer side: acquisition, encoding and the capture/publish loop
//!
//! ```text
//! ┌─────────────┐ completed(slot) ┌───────────┐ encode ┌───────────────┐
//! │ FrameSource │ ──────────────► │ FrameSlot │ ─────► │   Publisher   │
//! │  (device)   │ ◄────────────── │  (N ≥ 2)  │        │ (rename+guard)│
//! └─────────────┘ queue(slot + 1) └───────────┘        └───────────────┘
//! ```
//!
//! The device and the compressor are seams ([`FrameSource`],
//! [`ImageEncoder`]); [`ReplaySource`] and [`PassthroughEncoder`] are the
//! implementations shipped here.

pub mod config;
pub mod encoder;
pub mod replay;
pub mod resolution;
pub mod runner;
pub mod slot;
pub mod source;

pub use config::{CaptureConfig, DEFAULT_MAX_FPS, DEFAULT_SLOT_COUNT, STARTUP_WAIT};
pub use encoder::{ImageEncoder, PassthroughEncoder};
pub use replay::{jpeg_dimensions, ReplaySource};
pub use resolution::ResolutionFilter;
pub use runner::{configure_source, CaptureLoop};
pub use slot::FrameSlot;
pub use source::{FrameBuffer, FrameSource, Plane, Resolution, StreamSettings};
