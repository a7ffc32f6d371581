//! Working-directory layout shared by producer and consumer

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

/// Default canonical frame name
pub const DEFAULT_FILENAME: &str = "current.jpg";

/// Default staging name
pub const DEFAULT_WORKING_FILENAME: &str = "saving.jpg";

/// Paths of the canonical frame and its staging file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameLayout {
    work_dir: PathBuf,
    parent: PathBuf,
    dir_name: OsString,
    filename: OsString,
    working_filename: OsString,
}

impl FrameLayout {
    /// Build a layout inside `work_dir`
    ///
    /// Only the base name of each file name is used, so both files always
    /// live directly in the working directory. A relative `work_dir` is
    /// resolved against the current directory.
    pub fn new(work_dir: impl AsRef<Path>, filename: &str, working_filename: &str) -> Self {
        let work_dir = absolute(work_dir.as_ref());
        let parent = work_dir
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("/"));
        let dir_name = work_dir.file_name().map(OsStr::to_os_string).unwrap_or_default();

        Self {
            work_dir,
            parent,
            dir_name,
            filename: base_name(filename),
            working_filename: base_name(working_filename),
        }
    }

    pub fn with_defaults(work_dir: impl AsRef<Path>) -> Self {
        Self::new(work_dir, DEFAULT_FILENAME, DEFAULT_WORKING_FILENAME)
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Directory that holds the working directory
    pub fn parent(&self) -> &Path {
        &self.parent
    }

    pub fn dir_name(&self) -> &OsStr {
        &self.dir_name
    }

    pub fn filename(&self) -> &OsStr {
        &self.filename
    }

    /// `<work_dir>/<filename>`
    pub fn canonical_path(&self) -> PathBuf {
        self.work_dir.join(&self.filename)
    }

    /// `<work_dir>/<working_filename>`
    pub fn staging_path(&self) -> PathBuf {
        self.work_dir.join(&self.working_filename)
    }
}

fn base_name(name: &str) -> OsString {
    Path::new(name)
        .file_name()
        .map(OsStr::to_os_string)
        .unwrap_or_else(|| OsString::from(name))
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        let layout = FrameLayout::with_defaults("/run/webcam");

        assert_eq!(layout.work_dir(), Path::new("/run/webcam"));
        assert_eq!(layout.parent(), Path::new("/run"));
        assert_eq!(layout.dir_name(), "webcam");
        assert_eq!(layout.canonical_path(), PathBuf::from("/run/webcam/current.jpg"));
        assert_eq!(layout.staging_path(), PathBuf::from("/run/webcam/saving.jpg"));
    }

    #[test]
    fn test_file_names_reduced_to_base_name() {
        let layout = FrameLayout::new("/run/webcam", "../../etc/frame.jpg", "tmp/next.jpg");

        assert_eq!(layout.canonical_path(), PathBuf::from("/run/webcam/frame.jpg"));
        assert_eq!(layout.staging_path(), PathBuf::from("/run/webcam/next.jpg"));
    }

    #[test]
    fn test_relative_work_dir_resolved() {
        let layout = FrameLayout::with_defaults("frames");
        assert!(layout.work_dir().is_absolute());
        assert_eq!(layout.dir_name(), "frames");
    }
}
