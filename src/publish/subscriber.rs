//! Consumer side of the hand-off
//!
//! ```text
//!                 Created(work_dir)               MovedIn(canonical)
//!  WaitingForDir ─────────────────► WaitingForFile ──────────────────► Streaming
//!        ▲                             │   ▲                              │
//!        │  Removed(work_dir)          │   │  part delivered              │
//!        └─────────────────────────────┘   └──────────────────────────────┘
//!        ▲                                                                │
//!        └──────────────── open: not found, directory gone ───────────────┘
//! ```
//!
//! Watches are armed before anything is checked, so a publish that lands
//! between "check" and "wait" is still seen as an event. Rename events
//! already queued when a frame is about to be opened are merged into that
//! one open: the canonical path only ever names the latest frame.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tokio::fs::{self, File};

use super::layout::FrameLayout;
use crate::error::Result;
use crate::watch::{DirWatch, WatchEvent};

/// Subscriber position in the hand-off protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeState {
    /// Working directory is absent
    WaitingForDir,
    /// Directory is watched; waiting for the next rename onto the canonical path
    WaitingForFile,
    /// A frame should be opened now
    Streaming,
}

/// Side effect requested by a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchAction {
    None,
    /// (Re)arm the watch on the working directory
    ArmDir,
}

impl SubscribeState {
    /// Transition table
    pub fn on_event(self, event: &WatchEvent, layout: &FrameLayout) -> (SubscribeState, WatchAction) {
        use SubscribeState::*;

        let is_dir = |ev: &WatchEvent| ev.is_entry(layout.parent(), layout.dir_name());
        let is_frame = |ev: &WatchEvent| ev.is_entry(layout.work_dir(), layout.filename());

        match (self, event) {
            (_, WatchEvent::Created(_)) if is_dir(event) => (WaitingForFile, WatchAction::ArmDir),
            (WaitingForFile | Streaming, WatchEvent::MovedIn(_)) if is_frame(event) => {
                (Streaming, WatchAction::None)
            }
            (WaitingForFile | Streaming, WatchEvent::Removed(_)) if is_dir(event) => {
                (WaitingForDir, WatchAction::None)
            }
            (state, _) => (state, WatchAction::None),
        }
    }
}

/// A canonical frame opened for one transfer
#[derive(Debug)]
pub struct OpenedFrame {
    pub file: File,
    /// Size at open time; the file is never mutated in place
    pub len: u64,
    /// Creation time, or modification time where creation is unavailable
    pub captured_at: SystemTime,
}

/// Waits for published frames and opens them
#[derive(Debug)]
pub struct Subscriber {
    layout: FrameLayout,
    watch: DirWatch,
    state: SubscribeState,
}

impl Subscriber {
    /// Arm watches and decide the starting state
    ///
    /// If a frame is already published the first [`Subscriber::next_frame`]
    /// opens it directly.
    pub async fn new(layout: FrameLayout) -> Result<Self> {
        let mut watch = DirWatch::new()?;
        tracing::debug!(parent = %layout.parent().display(), "Watching for working directory");
        watch.arm(layout.parent())?;

        let mut subscriber = Self {
            layout,
            watch,
            state: SubscribeState::WaitingForDir,
        };
        if is_dir(subscriber.layout.work_dir()).await {
            subscriber.arm_dir().await?;
        }
        Ok(subscriber)
    }

    pub fn state(&self) -> SubscribeState {
        self.state
    }

    pub fn layout(&self) -> &FrameLayout {
        &self.layout
    }

    /// Open the next frame
    ///
    /// Blocks until a frame is available. A missing directory or a frame
    /// that vanished between event and open is not an error; the
    /// subscriber re-arms and keeps waiting.
    pub async fn next_frame(&mut self) -> Result<OpenedFrame> {
        loop {
            match self.state {
                SubscribeState::Streaming => {
                    self.merge_queued().await?;
                    if self.state != SubscribeState::Streaming {
                        continue;
                    }
                    if let Some(frame) = self.open_canonical().await? {
                        self.state = SubscribeState::WaitingForFile;
                        return Ok(frame);
                    }
                }
                SubscribeState::WaitingForDir if is_dir(self.layout.work_dir()).await => {
                    self.arm_dir().await?;
                }
                _ => {
                    let event = self.watch.next().await?;
                    self.apply(&event).await?;
                }
            }
        }
    }

    /// Open the current frame without returning it, then wait for a newer one
    ///
    /// Opening is what tells a paused producer that somebody is watching.
    pub async fn skip_current(&mut self) -> Result<()> {
        if self.state == SubscribeState::Streaming {
            self.merge_queued().await?;
        }
        if self.state == SubscribeState::Streaming {
            if let Some(frame) = self.open_canonical().await? {
                drop(frame);
                self.state = SubscribeState::WaitingForFile;
            }
        }
        Ok(())
    }

    /// Apply every event already queued without waiting
    ///
    /// Renames onto the canonical path collapse into the pending open.
    /// Directory events still take effect.
    async fn merge_queued(&mut self) -> Result<()> {
        let mut merged = 0u32;
        while let Some(event) = self.watch.try_next() {
            if self.state == SubscribeState::Streaming
                && matches!(event, WatchEvent::MovedIn(_))
                && event.is_entry(self.layout.work_dir(), self.layout.filename())
            {
                merged += 1;
            }
            self.apply(&event).await?;
        }
        if merged > 0 {
            tracing::trace!(merged, "Queued publishes merged into one open");
        }
        Ok(())
    }

    async fn apply(&mut self, event: &WatchEvent) -> Result<()> {
        let (next, action) = self.state.on_event(event, &self.layout);
        if next != self.state {
            tracing::trace!(from = ?self.state, to = ?next, event = ?event, "Subscriber transition");
        }
        self.state = next;
        if action == WatchAction::ArmDir {
            self.arm_dir().await?;
        }
        Ok(())
    }

    /// Watch the working directory, then look for a frame that arrived
    /// before the watch existed
    async fn arm_dir(&mut self) -> Result<()> {
        let dir = self.layout.work_dir().to_path_buf();
        if let Err(e) = self.watch.rearm(&dir) {
            if is_dir(&dir).await {
                return Err(e);
            }
            tracing::debug!(dir = %dir.display(), "Working directory vanished before watch");
            self.state = SubscribeState::WaitingForDir;
            return Ok(());
        }

        self.state = if fs::try_exists(self.layout.canonical_path()).await? {
            SubscribeState::Streaming
        } else {
            SubscribeState::WaitingForFile
        };
        Ok(())
    }

    async fn open_canonical(&mut self) -> Result<Option<OpenedFrame>> {
        let path: PathBuf = self.layout.canonical_path();
        match File::open(&path).await {
            Ok(file) => {
                let meta = file.metadata().await?;
                let captured_at = meta
                    .created()
                    .or_else(|_| meta.modified())
                    .unwrap_or_else(|_| SystemTime::now());
                Ok(Some(OpenedFrame {
                    file,
                    len: meta.len(),
                    captured_at,
                }))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.state = if is_dir(self.layout.work_dir()).await {
                    SubscribeState::WaitingForFile
                } else {
                    SubscribeState::WaitingForDir
                };
                tracing::debug!(path = %path.display(), state = ?self.state, "Frame not found, waiting");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

async fn is_dir(path: &Path) -> bool {
    fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false)
}
