//! Replay Frame Source
//!
//! Plays back a directory of pre-encoded JPEG files as if they were coming
//! off a camera. Every file is one frame; frames are grouped by the
//! dimensions in their SOF header, and the configured size picks a group.
//! Paired with [`PassthroughEncoder`](super::PassthroughEncoder) this drives
//! the full producer without hardware.

use std::collections::{BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use tokio::time::{Interval, MissedTickBehavior};

use super::source::{FrameBuffer, FrameSource, Plane, Resolution, StreamSettings};
use crate::error::{Error, Result};

/// Read width and height from the first SOF segment of a JPEG
pub fn jpeg_dimensions(data: &[u8]) -> Option<Resolution> {
    if data.get(..2)? != [0xFF, 0xD8] {
        return None;
    }

    let mut pos = 2;
    loop {
        // Skip fill bytes up to the marker
        while *data.get(pos)? != 0xFF {
            pos += 1;
        }
        while *data.get(pos)? == 0xFF {
            pos += 1;
        }
        let marker = *data.get(pos)?;
        pos += 1;

        match marker {
            // Standalone markers carry no length
            0x01 | 0xD0..=0xD7 => continue,
            0xD9 | 0xDA => return None,
            _ => {}
        }

        let len = u16::from_be_bytes([*data.get(pos)?, *data.get(pos + 1)?]) as usize;
        let is_sof = matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_sof {
            let seg = data.get(pos..pos + 7)?;
            let height = u16::from_be_bytes([seg[3], seg[4]]) as u32;
            let width = u16::from_be_bytes([seg[5], seg[6]]) as u32;
            return Some(Resolution::new(width, height));
        }
        if len < 2 {
            return None;
        }
        pos += len;
    }
}

fn is_jpeg_name(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"))
        .unwrap_or(false)
}

/// Directory-backed frame source
#[derive(Debug)]
pub struct ReplaySource {
    dir: PathBuf,
    frames: Vec<(Resolution, Bytes)>,
    playlist: Vec<Bytes>,
    buffers: Vec<FrameBuffer>,
    pending: VecDeque<usize>,
    frame_duration: Duration,
    ticker: Option<Interval>,
    cursor: usize,
    next_buffer_id: u64,
    started_once: bool,
}

impl ReplaySource {
    /// Load every JPEG in `dir`, in file name order
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let mut paths = Vec::new();
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if is_jpeg_name(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut frames = Vec::with_capacity(paths.len());
        for path in paths {
            let data = tokio::fs::read(&path).await?;
            match jpeg_dimensions(&data) {
                Some(size) => frames.push((size, Bytes::from(data))),
                None => tracing::warn!(path = %path.display(), "Skipping file without JPEG frame header"),
            }
        }

        if frames.is_empty() {
            return Err(Error::Source(format!(
                "no JPEG frames in {}",
                dir.display()
            )));
        }

        tracing::info!(dir = %dir.display(), frames = frames.len(), "Replay source loaded");

        Ok(Self {
            dir,
            frames,
            playlist: Vec::new(),
            buffers: Vec::new(),
            pending: VecDeque::new(),
            frame_duration: Duration::from_millis(33),
            ticker: None,
            cursor: 0,
            next_buffer_id: 1,
            started_once: false,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn is_running(&self) -> bool {
        self.ticker.is_some()
    }

    fn fresh_buffer_id(&mut self) -> u64 {
        let id = self.next_buffer_id;
        self.next_buffer_id += 1;
        id
    }
}

impl FrameSource for ReplaySource {
    fn resolutions(&self) -> Vec<Resolution> {
        let sizes: BTreeSet<Resolution> = self.frames.iter().map(|(size, _)| *size).collect();
        sizes.into_iter().collect()
    }

    fn configure(&mut self, settings: &StreamSettings) -> Result<()> {
        if self.is_running() {
            return Err(Error::Source("cannot configure while running".into()));
        }

        self.playlist = self
            .frames
            .iter()
            .filter(|(size, _)| *size == settings.size)
            .map(|(_, data)| data.clone())
            .collect();
        if self.playlist.is_empty() {
            return Err(Error::Source(format!("no frames of size {}", settings.size)));
        }

        self.buffers = (0..settings.buffer_count)
            .map(|_| FrameBuffer {
                buffer_id: 0,
                size: settings.size,
                planes: vec![Plane { offset: 0, length: 0 }],
                data: Bytes::new(),
            })
            .collect();
        for i in 0..self.buffers.len() {
            self.buffers[i].buffer_id = self.fresh_buffer_id();
        }

        self.frame_duration = settings.frame_duration.max(Duration::from_micros(1));
        self.cursor = 0;
        self.started_once = false;
        Ok(())
    }

    async fn ready(&mut self) -> Result<()> {
        if self.buffers.is_empty() {
            return Err(Error::Source("not configured".into()));
        }
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        if self.buffers.is_empty() {
            return Err(Error::Source("not configured".into()));
        }

        // A restart hands out new allocations, like a camera would
        if self.started_once {
            for i in 0..self.buffers.len() {
                self.buffers[i].buffer_id = self.fresh_buffer_id();
            }
        }
        self.started_once = true;

        let mut ticker = tokio::time::interval(self.frame_duration);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.ticker = Some(ticker);
        tracing::debug!(frame_us = self.frame_duration.as_micros() as u64, "Replay started");
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.ticker = None;
        self.pending.clear();
        tracing::debug!("Replay stopped");
        Ok(())
    }

    fn queue(&mut self, slot: usize) -> Result<()> {
        if !self.is_running() {
            return Err(Error::Source("queue on stopped source".into()));
        }
        if slot >= self.buffers.len() {
            return Err(Error::Source(format!("no such slot {}", slot)));
        }
        self.pending.push_back(slot);
        Ok(())
    }

    async fn completed(&mut self) -> Result<usize> {
        if self.pending.is_empty() {
            return Err(Error::Source("no slot queued".into()));
        }
        let ticker = self
            .ticker
            .as_mut()
            .ok_or_else(|| Error::Source("source not started".into()))?;
        ticker.tick().await;

        let slot = self
            .pending
            .pop_front()
            .ok_or_else(|| Error::Source("no slot queued".into()))?;
        let data = self.playlist[self.cursor % self.playlist.len()].clone();
        self.cursor += 1;

        let buffer = &mut self.buffers[slot];
        buffer.planes = vec![Plane { offset: 0, length: data.len() }];
        buffer.data = data;
        Ok(slot)
    }

    fn buffer(&self, slot: usize) -> &FrameBuffer {
        &self.buffers[slot]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Smallest byte sequence the SOF parser accepts, tagged with `tag`
    fn fake_jpeg(width: u16, height: u16, tag: &[u8]) -> Vec<u8> {
        let mut out = vec![0xFF, 0xD8];
        // APP0 with two bytes of payload
        out.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x04, 0x00, 0x00]);
        out.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x0B, 0x08]);
        out.extend_from_slice(&height.to_be_bytes());
        out.extend_from_slice(&width.to_be_bytes());
        out.extend_from_slice(&[0x01, 0x01, 0x11, 0x00]);
        let len = (tag.len() + 2) as u16;
        out.extend_from_slice(&[0xFF, 0xFE]);
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(tag);
        out.extend_from_slice(&[0xFF, 0xD9]);
        out
    }

    fn settings(size: Resolution) -> StreamSettings {
        StreamSettings {
            size,
            buffer_count: 2,
            frame_duration: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_jpeg_dimensions() {
        assert_eq!(
            jpeg_dimensions(&fake_jpeg(640, 480, b"x")),
            Some(Resolution::new(640, 480))
        );
        assert_eq!(jpeg_dimensions(b"not a jpeg"), None);
        assert_eq!(jpeg_dimensions(&[0xFF, 0xD8, 0xFF, 0xD9]), None);
        assert_eq!(jpeg_dimensions(&[0xFF, 0xD8, 0xFF, 0xC0, 0x00]), None);
    }

    #[tokio::test]
    async fn test_open_groups_by_size() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.jpg"), fake_jpeg(640, 480, b"a")).unwrap();
        std::fs::write(dir.path().join("b.JPEG"), fake_jpeg(1280, 720, b"b")).unwrap();
        std::fs::write(dir.path().join("c.jpg"), fake_jpeg(640, 480, b"c")).unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();
        std::fs::write(dir.path().join("broken.jpg"), b"garbage").unwrap();

        let source = ReplaySource::open(dir.path()).await.unwrap();
        assert_eq!(
            source.resolutions(),
            vec![Resolution::new(640, 480), Resolution::new(1280, 720)]
        );
    }

    #[tokio::test]
    async fn test_open_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(ReplaySource::open(dir.path()).await, Err(Error::Source(_))));
    }

    #[tokio::test]
    async fn test_cycles_through_frames_in_slot_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = fake_jpeg(640, 480, b"first");
        let c = fake_jpeg(640, 480, b"second");
        std::fs::write(dir.path().join("a.jpg"), &a).unwrap();
        std::fs::write(dir.path().join("b.jpg"), fake_jpeg(1280, 720, b"big")).unwrap();
        std::fs::write(dir.path().join("c.jpg"), &c).unwrap();

        let mut source = ReplaySource::open(dir.path()).await.unwrap();
        source.configure(&settings(Resolution::new(640, 480))).unwrap();
        source.ready().await.unwrap();
        source.start().unwrap();

        source.queue(0).unwrap();
        source.queue(1).unwrap();
        assert_eq!(source.completed().await.unwrap(), 0);
        assert_eq!(source.buffer(0).plane(0).unwrap(), &a[..]);

        source.queue(0).unwrap();
        assert_eq!(source.completed().await.unwrap(), 1);
        assert_eq!(source.buffer(1).plane(0).unwrap(), &c[..]);

        assert_eq!(source.completed().await.unwrap(), 0);
        assert_eq!(source.buffer(0).plane(0).unwrap(), &a[..]);

        assert!(matches!(source.completed().await, Err(Error::Source(_))));
    }

    #[tokio::test]
    async fn test_restart_changes_buffer_identity() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.jpg"), fake_jpeg(320, 240, b"a")).unwrap();

        let mut source = ReplaySource::open(dir.path()).await.unwrap();
        source.configure(&settings(Resolution::new(320, 240))).unwrap();
        source.start().unwrap();
        let first = source.buffer(0).buffer_id;

        source.stop().unwrap();
        assert!(source.queue(0).is_err());
        source.start().unwrap();
        assert_ne!(source.buffer(0).buffer_id, first);
    }

    #[tokio::test]
    async fn test_configure_unknown_size() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.jpg"), fake_jpeg(320, 240, b"a")).unwrap();

        let mut source = ReplaySource::open(dir.path()).await.unwrap();
        assert!(source.configure(&settings(Resolution::new(640, 480))).is_err());
        assert!(source.start().is_err());
    }
}
