//! Producer configuration

use std::path::PathBuf;
use std::time::Duration;

use super::resolution::ResolutionFilter;
use crate::error::StartupError;
use crate::publish::{FrameLayout, DEFAULT_FILENAME, DEFAULT_WORKING_FILENAME};

/// Default frame rate ceiling
pub const DEFAULT_MAX_FPS: f64 = 30.0;

/// Default number of alternating acquisition slots
pub const DEFAULT_SLOT_COUNT: usize = 2;

/// Upper bound on the wait for the device's startup acknowledgment
pub const STARTUP_WAIT: Duration = Duration::from_secs(2);

/// Capture/publish configuration options
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Directory holding the canonical and staging files
    pub work_dir: PathBuf,

    /// Canonical frame file name
    pub filename: String,

    /// Staging file name
    pub working_filename: String,

    /// Frame rate ceiling, enforced by the source
    pub max_fps: f64,

    /// Number of alternating slots
    pub slot_count: usize,

    /// Acceptable frame sizes
    pub resolution: ResolutionFilter,

    /// Accepted for compatibility; the overwrite guard is always on
    pub overwrite_existing_temp_file: bool,

    /// Log capture counters every this many published frames (0 = never)
    pub stats_every: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("."),
            filename: DEFAULT_FILENAME.to_string(),
            working_filename: DEFAULT_WORKING_FILENAME.to_string(),
            max_fps: DEFAULT_MAX_FPS,
            slot_count: DEFAULT_SLOT_COUNT,
            resolution: ResolutionFilter::default(),
            overwrite_existing_temp_file: false,
            stats_every: 100,
        }
    }
}

impl CaptureConfig {
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

    /// Set the staging file name
    pub fn working_filename(mut self, name: impl Into<String>) -> Self {
        self.working_filename = name.into();
        self
    }

    /// Set the frame rate ceiling
    pub fn max_fps(mut self, fps: f64) -> Self {
        self.max_fps = fps;
        self
    }

    /// Set the number of slots (at least 2)
    pub fn slot_count(mut self, count: usize) -> Self {
        self.slot_count = count.max(2);
        self
    }

    /// Set the resolution bounds
    pub fn resolution(mut self, filter: ResolutionFilter) -> Self {
        self.resolution = filter;
        self
    }

    /// File layout in the working directory
    pub fn layout(&self) -> FrameLayout {
        FrameLayout::new(&self.work_dir, &self.filename, &self.working_filename)
    }

    /// Minimum interval between frames
    pub fn frame_duration(&self) -> Result<Duration, StartupError> {
        if !self.max_fps.is_finite() || self.max_fps <= 0.0 {
            return Err(StartupError::InvalidFrameRate(self.max_fps));
        }
        Ok(Duration::from_micros((1_000_000.0 / self.max_fps) as u64))
    }

    /// Check everything that can be checked before touching the device
    pub fn validate(&self) -> Result<(), StartupError> {
        if !self.work_dir.is_dir() {
            return Err(StartupError::InvalidWorkDir(self.work_dir.display().to_string()));
        }
        self.frame_duration()?;
        self.resolution.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CaptureConfig::default();

        assert_eq!(config.filename, "current.jpg");
        assert_eq!(config.working_filename, "saving.jpg");
        assert_eq!(config.max_fps, 30.0);
        assert_eq!(config.slot_count, 2);
        assert!(!config.overwrite_existing_temp_file);
    }

    #[test]
    fn test_frame_duration() {
        let config = CaptureConfig::default().max_fps(30.0);
        assert_eq!(config.frame_duration().unwrap(), Duration::from_micros(33_333));

        let config = CaptureConfig::default().max_fps(0.5);
        assert_eq!(config.frame_duration().unwrap(), Duration::from_secs(2));
    }

    #[test]
    fn test_invalid_frame_rate() {
        for fps in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let config = CaptureConfig::default().max_fps(fps);
            assert!(matches!(config.frame_duration(), Err(StartupError::InvalidFrameRate(_))));
        }
    }

    #[test]
    fn test_slot_count_floor() {
        assert_eq!(CaptureConfig::default().slot_count(1).slot_count, 2);
        assert_eq!(CaptureConfig::default().slot_count(3).slot_count, 3);
    }

    #[test]
    fn test_validate_missing_dir() {
        let config = CaptureConfig::with_work_dir("/nonexistent/framerelay/dir");
        assert!(matches!(config.validate(), Err(StartupError::InvalidWorkDir(_))));
    }

    #[test]
    fn test_builder_chaining() {
        let dir = tempfile::tempdir().unwrap();
        let config = CaptureConfig::with_work_dir(dir.path())
            .filename("live.jpg")
            .working_filename("next.jpg")
            .max_fps(10.0)
            .resolution(ResolutionFilter {
                max_width: Some(1280),
                ..Default::default()
            });

        config.validate().unwrap();
        assert_eq!(config.layout().canonical_path(), dir.path().join("live.jpg"));
        assert_eq!(config.layout().staging_path(), dir.path().join("next.jpg"));
        assert_eq!(config.resolution.max_width, Some(1280));
    }
}
