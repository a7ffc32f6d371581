//! Tagged filesystem events
//!
//! Backend events are reduced to the handful of variants the publish and
//! subscribe protocols branch on. Everything else is dropped here.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use notify::event::{AccessKind, ModifyKind, RenameMode};
use notify::{Event, EventKind};

/// A filesystem change relevant to frame hand-off
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// A file or directory appeared
    Created(PathBuf),
    /// A file was renamed onto a path in a watched directory
    MovedIn(PathBuf),
    /// A watched file was opened
    Opened(PathBuf),
    /// A file or directory went away
    Removed(PathBuf),
}

impl WatchEvent {
    /// Reduce a backend event to zero or more tagged events
    ///
    /// A rename inside one watched directory is reported by the backend
    /// several times (source side, destination side, and a paired event);
    /// only the destination side becomes [`WatchEvent::MovedIn`], so one
    /// rename yields exactly one arrival.
    pub fn from_notify(event: &Event) -> Vec<WatchEvent> {
        let wrap: fn(PathBuf) -> WatchEvent = match event.kind {
            EventKind::Create(_) => WatchEvent::Created,
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => WatchEvent::MovedIn,
            EventKind::Access(AccessKind::Open(_)) => WatchEvent::Opened,
            EventKind::Remove(_) => WatchEvent::Removed,
            _ => return Vec::new(),
        };
        event.paths.iter().cloned().map(wrap).collect()
    }

    pub fn path(&self) -> &Path {
        match self {
            WatchEvent::Created(p)
            | WatchEvent::MovedIn(p)
            | WatchEvent::Opened(p)
            | WatchEvent::Removed(p) => p,
        }
    }

    /// Final path component
    pub fn name(&self) -> Option<&OsStr> {
        self.path().file_name()
    }

    /// Whether the event concerns `name` directly inside `dir`
    pub fn is_entry(&self, dir: &Path, name: &OsStr) -> bool {
        let path = self.path();
        path.file_name() == Some(name) && path.parent() == Some(dir)
    }
}
