//! Session and capture statistics

pub mod metrics;

pub use metrics::{CaptureStats, SessionStats};
