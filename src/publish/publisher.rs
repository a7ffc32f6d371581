//! Producer side of the hand-off
//!
//! A frame is written to the staging path, sized exactly, synced, and then
//! renamed onto the canonical path. Readers holding the previous canonical
//! file keep seeing complete old contents because rename never touches an
//! open inode.
//!
//! Overwrite guard: before the next staging write the producer wants proof
//! that somebody opened the frame it just published. The staging file is
//! watched for "opened" right before the rename; that watch fires once a
//! reader holds a descriptor, after which truncating and rewriting the
//! staging path cannot hurt that reader.

use std::path::PathBuf;

use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use super::layout::FrameLayout;
use crate::error::Result;
use crate::watch::{DirWatch, WatchEvent};

/// Result of a publish attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The frame is now the canonical frame
    Published { generation: u64, bytes: usize },
    /// Nobody has opened the previous frame yet; nothing was written
    Skipped,
}

/// Atomic-rename frame publisher
#[derive(Debug)]
pub struct Publisher {
    staging: PathBuf,
    canonical: PathBuf,
    watch: DirWatch,
    guard_pending: bool,
    generation: u64,
}

impl Publisher {
    pub fn new(layout: &FrameLayout) -> Result<Self> {
        Ok(Self {
            staging: layout.staging_path(),
            canonical: layout.canonical_path(),
            watch: DirWatch::new()?,
            guard_pending: false,
            generation: 0,
        })
    }

    /// Number of frames published so far
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the last published frame has not been opened yet
    pub fn guard_pending(&self) -> bool {
        self.guard_pending
    }

    /// Publish `frame` unless the overwrite guard is still pending
    pub async fn publish(&mut self, frame: &[u8]) -> Result<PublishOutcome> {
        if !self.check_cleared() {
            tracing::debug!(generation = self.generation, "Previous frame not yet opened, skipping");
            return Ok(PublishOutcome::Skipped);
        }

        self.write_staging(frame).await?;

        // Armed after our own write so only readers trip it
        self.watch.arm(&self.staging)?;
        self.guard_pending = true;

        fs::rename(&self.staging, &self.canonical).await?;
        self.generation += 1;

        tracing::trace!(
            generation = self.generation,
            bytes = frame.len(),
            path = %self.canonical.display(),
            "Frame published"
        );

        Ok(PublishOutcome::Published {
            generation: self.generation,
            bytes: frame.len(),
        })
    }

    /// Wait until a reader has opened the last published frame
    ///
    /// Returns immediately when nothing is pending. Cancel-safe: dropping
    /// the future leaves the guard pending and no event is lost.
    pub async fn reader_opened(&mut self) -> Result<()> {
        while self.guard_pending {
            let event = self.watch.next().await?;
            self.apply(event);
        }
        Ok(())
    }

    /// Consume already-queued events and report whether the guard is clear
    pub fn check_cleared(&mut self) -> bool {
        while self.guard_pending {
            match self.watch.try_next() {
                Some(event) => self.apply(event),
                None => break,
            }
        }
        !self.guard_pending
    }

    fn apply(&mut self, event: WatchEvent) {
        if let WatchEvent::Opened(_) = event {
            self.watch.disarm(&self.staging);
            // Further opens of the same frame say nothing new
            self.watch.drain();
            self.guard_pending = false;
            tracing::trace!(generation = self.generation, "Frame opened by reader");
        }
    }

    async fn write_staging(&self, frame: &[u8]) -> Result<()> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.staging)
            .await?;
        file.set_len(frame.len() as u64).await?;
        file.write_all(frame).await?;
        file.flush().await?;
        file.sync_all().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn layout(dir: &tempfile::TempDir) -> FrameLayout {
        FrameLayout::with_defaults(dir.path().canonicalize().unwrap())
    }

    #[tokio::test]
    async fn test_publish_renames_into_place() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout(&dir);
        let mut publisher = Publisher::new(&layout).unwrap();

        let outcome = publisher.publish(b"first frame").await.unwrap();

        assert_eq!(outcome, PublishOutcome::Published { generation: 1, bytes: 11 });
        assert!(!layout.staging_path().exists());
        assert_eq!(std::fs::read(layout.canonical_path()).unwrap(), b"first frame");
        assert!(publisher.guard_pending());
    }

    #[tokio::test]
    async fn test_skips_until_opened() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout(&dir);
        let mut publisher = Publisher::new(&layout).unwrap();

        publisher.publish(b"first").await.unwrap();
        assert_eq!(publisher.publish(b"second").await.unwrap(), PublishOutcome::Skipped);
        assert_eq!(std::fs::read(layout.canonical_path()).unwrap(), b"first");

        let _reader = std::fs::File::open(layout.canonical_path()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), publisher.reader_opened())
            .await
            .expect("open was not observed")
            .unwrap();

        let outcome = publisher.publish(b"second frame").await.unwrap();
        assert_eq!(outcome, PublishOutcome::Published { generation: 2, bytes: 12 });
        assert_eq!(std::fs::read(layout.canonical_path()).unwrap(), b"second frame");
    }

    #[tokio::test]
    async fn test_open_reader_keeps_old_contents() {
        use std::io::Read;

        let dir = tempfile::tempdir().unwrap();
        let layout = layout(&dir);
        let mut publisher = Publisher::new(&layout).unwrap();

        publisher.publish(b"old frame contents").await.unwrap();
        let mut reader = std::fs::File::open(layout.canonical_path()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), publisher.reader_opened())
            .await
            .unwrap()
            .unwrap();

        publisher.publish(b"new").await.unwrap();

        let mut seen = Vec::new();
        reader.read_to_end(&mut seen).unwrap();
        assert_eq!(seen, b"old frame contents");
        assert_eq!(std::fs::read(layout.canonical_path()).unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_reader_opened_without_pending_returns() {
        let dir = tempfile::tempdir().unwrap();
        let mut publisher = Publisher::new(&layout(&dir)).unwrap();
        publisher.reader_opened().await.unwrap();
        assert!(publisher.check_cleared());
    }
}
