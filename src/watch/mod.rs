//! Filesystem change notification
//!
//! The only wake-up mechanism between producer and consumer. The producer
//! learns that a reader opened its last frame; the consumer learns that a
//! new frame was renamed into place or that the working directory came back.

pub mod event;
pub mod watcher;

pub use event::WatchEvent;
pub use watcher::DirWatch;
