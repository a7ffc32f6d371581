//! Change-notification watch
//!
//! Wraps the platform watcher (inotify on Linux) and forwards tagged events
//! into a tokio channel, so waiting for a filesystem change is an ordinary
//! `.await` that can sit in a `select!` next to other readiness sources.

use std::path::{Path, PathBuf};

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use super::event::WatchEvent;
use crate::error::{Error, Result};

/// A set of armed watches feeding one event queue
pub struct DirWatch {
    watcher: RecommendedWatcher,
    events: mpsc::UnboundedReceiver<WatchEvent>,
    armed: Vec<PathBuf>,
}

impl DirWatch {
    /// Create a watch with nothing armed yet
    pub fn new() -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();

        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for ev in WatchEvent::from_notify(&event) {
                    // Receiver gone means the watch is being torn down
                    let _ = tx.send(ev);
                }
            }
            Err(e) => tracing::warn!(error = %e, "Watch backend error"),
        })?;

        Ok(Self {
            watcher,
            events: rx,
            armed: Vec::new(),
        })
    }

    /// Start watching `path` (directory entries, or the file itself)
    pub fn arm(&mut self, path: &Path) -> Result<()> {
        self.watcher.watch(path, RecursiveMode::NonRecursive)?;
        if !self.is_armed(path) {
            self.armed.push(path.to_path_buf());
        }
        tracing::trace!(path = %path.display(), "Watch armed");
        Ok(())
    }

    /// Stop watching `path`
    ///
    /// The kernel drops watches on deleted paths by itself, so a failure
    /// here only means there was nothing left to remove.
    pub fn disarm(&mut self, path: &Path) {
        if let Err(e) = self.watcher.unwatch(path) {
            tracing::trace!(path = %path.display(), error = %e, "Watch already gone");
        }
        self.armed.retain(|p| p != path);
    }

    /// Drop and re-add the watch on `path`
    pub fn rearm(&mut self, path: &Path) -> Result<()> {
        self.disarm(path);
        self.arm(path)
    }

    pub fn is_armed(&self, path: &Path) -> bool {
        self.armed.iter().any(|p| p == path)
    }

    /// Wait for the next event
    pub async fn next(&mut self) -> Result<WatchEvent> {
        self.events
            .recv()
            .await
            .ok_or_else(|| Error::Watch(notify::Error::generic("watch event channel closed")))
    }

    /// Take an already-queued event without waiting
    pub fn try_next(&mut self) -> Option<WatchEvent> {
        self.events.try_recv().ok()
    }

    /// Discard queued events, returning how many were dropped
    pub fn drain(&mut self) -> usize {
        let mut dropped = 0;
        while self.events.try_recv().is_ok() {
            dropped += 1;
        }
        dropped
    }
}

impl std::fmt::Debug for DirWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirWatch").field("armed", &self.armed).finish()
    }
}
