//! Double-buffered capture/publish loop
//!
//! ```text
//!   slot 0: ──acquire──┐           ┌──acquire──┐
//!   slot 1:            └─encode────┘ publish   └─encode── ...
//!                        ▲ slot 1 queued before slot 0 is touched
//! ```
//!
//! The moment a slot completes, the next slot goes back to the source, and
//! only then is the completed slot encoded and published. Pacing is left to
//! the source (minimum frame duration), not to timers here.
//!
//! After every publish the loop waits for either a reader opening the frame
//! or the next acquisition. If the acquisition wins, nobody is watching:
//! acquisition stops until a reader shows up.

use std::future::Future;

use super::config::{CaptureConfig, STARTUP_WAIT};
use super::encoder::ImageEncoder;
use super::slot::FrameSlot;
use super::source::{FrameSource, StreamSettings};
use crate::error::Result;
use crate::publish::{PublishOutcome, Publisher};
use crate::stats::CaptureStats;

/// Select a size, configure the source and wait (bounded) for it to settle
pub async fn configure_source<S: FrameSource>(
    source: &mut S,
    config: &CaptureConfig,
) -> Result<StreamSettings> {
    config.validate()?;

    let available = source.resolutions();
    let size = config.resolution.select(&available)?;
    let settings = StreamSettings {
        size,
        buffer_count: config.slot_count,
        frame_duration: config.frame_duration()?,
    };

    tracing::info!(
        size = %size,
        frame_us = settings.frame_duration.as_micros() as u64,
        slots = settings.buffer_count,
        "Configuring frame source"
    );
    source.configure(&settings)?;

    match tokio::time::timeout(STARTUP_WAIT, source.ready()).await {
        Ok(res) => res?,
        Err(_) => tracing::warn!(
            wait_ms = STARTUP_WAIT.as_millis() as u64,
            "Frame source did not acknowledge startup in time, continuing"
        ),
    }

    Ok(settings)
}

/// Producer loop driving a frame source into the publisher
pub struct CaptureLoop<'a, S: FrameSource, E: ImageEncoder> {
    source: &'a mut S,
    encoder: E,
    publisher: Publisher,
    slots: Vec<FrameSlot<E::Bound>>,
    running: bool,
    last_submitted: Option<usize>,
    stats: CaptureStats,
    stats_every: u64,
}

impl<'a, S: FrameSource, E: ImageEncoder> CaptureLoop<'a, S, E> {
    /// Create a loop over `slot_count` slots (at least 2)
    pub fn new(source: &'a mut S, encoder: E, publisher: Publisher, slot_count: usize) -> Self {
        let slot_count = slot_count.max(2);
        Self {
            source,
            encoder,
            publisher,
            slots: (0..slot_count).map(FrameSlot::new).collect(),
            running: false,
            last_submitted: None,
            stats: CaptureStats::new(),
            stats_every: 100,
        }
    }

    /// Log counters every `n` published frames (0 disables)
    pub fn stats_every(mut self, n: u64) -> Self {
        self.stats_every = n;
        self
    }

    pub fn stats(&self) -> &CaptureStats {
        &self.stats
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn slots(&self) -> &[FrameSlot<E::Bound>] {
        &self.slots
    }

    /// Run until an error occurs
    pub async fn run(&mut self) -> Result<()> {
        loop {
            self.cycle().await?;
        }
    }

    /// Run until `shutdown` resolves, then stop the source
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let result = tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.run() => result,
        };

        let stopped = self.halt();
        tracing::info!(
            captured = self.stats.frames_captured,
            published = self.stats.frames_published,
            pauses = self.stats.pauses,
            "Capture loop finished"
        );
        result.and(stopped)
    }

    /// One acquisition, encode and publish
    pub async fn cycle(&mut self) -> Result<()> {
        if !self.running {
            self.resume()?;
        }

        let slot = self.source.completed().await?;
        self.stats.frames_captured += 1;

        // Keep the source fed before doing any work on the finished slot
        self.submit((slot + 1) % self.slots.len())?;

        let encoded = self.slots[slot].encode(&self.encoder, self.source.buffer(slot))?;

        match self.publisher.publish(&encoded).await? {
            PublishOutcome::Published { generation, bytes } => {
                self.stats.on_published(bytes);
                tracing::debug!(slot, generation, bytes, "Frame published");
                if self.stats_every > 0 && generation % self.stats_every == 0 {
                    tracing::info!(
                        captured = self.stats.frames_captured,
                        published = self.stats.frames_published,
                                    pauses = self.stats.pauses,
                        avg_bytes = self.stats.average_frame_size(),
                        "Capture stats"
                    );
                }
            }
            // await_reader clears the guard before every cycle
            PublishOutcome::Skipped => {
                tracing::warn!(slot, "Publish skipped with the overwrite guard pending");
            }
        }

        self.await_reader().await
    }

    /// Wait until the last published frame was opened, pausing acquisition
    /// if another frame completes first
    async fn await_reader(&mut self) -> Result<()> {
        if self.publisher.check_cleared() {
            return Ok(());
        }

        if self.running {
            tokio::select! {
                biased;
                res = self.publisher.reader_opened() => return res,
                res = self.source.completed() => {
                    let slot = res?;
                    self.stats.frames_captured += 1;
                    self.pause()?;
                    tracing::info!(slot, "No reader for last frame, pausing capture");
                }
            }
        }

        self.publisher.reader_opened().await
    }

    fn submit(&mut self, slot: usize) -> Result<()> {
        self.source.queue(slot)?;
        self.last_submitted = Some(slot);
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        self.source.start()?;
        self.running = true;
        let next = self
            .last_submitted
            .map_or(0, |last| (last + 1) % self.slots.len());
        if self.last_submitted.is_some() {
            tracing::info!(slot = next, "Reader present, resuming capture");
        }
        self.submit(next)
    }

    fn pause(&mut self) -> Result<()> {
        self.stats.pauses += 1;
        self.halt()
    }

    fn halt(&mut self) -> Result<()> {
        if self.running {
            self.running = false;
            self.source.stop()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{FrameBuffer, PassthroughEncoder, Plane, Resolution, ResolutionFilter};
    use crate::error::{Error, StartupError};
    use crate::publish::{FrameLayout, Subscriber};

    use bytes::Bytes;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::io::AsyncReadExt;
    use tokio::sync::mpsc;

    #[derive(Debug, Default)]
    struct MockLog {
        submissions: Vec<usize>,
        starts: u32,
        stops: u32,
        configured: Option<StreamSettings>,
    }

    /// Completes one queued slot per message on `gate`
    struct MockSource {
        log: Arc<Mutex<MockLog>>,
        gate: mpsc::UnboundedReceiver<()>,
        queued: VecDeque<usize>,
        buffers: Vec<FrameBuffer>,
        running: bool,
        frames: u32,
    }

    impl MockSource {
        fn new(slots: usize) -> (Self, mpsc::UnboundedSender<()>, Arc<Mutex<MockLog>>) {
            let (tx, rx) = mpsc::unbounded_channel();
            let log = Arc::new(Mutex::new(MockLog::default()));
            let buffers = (0..slots)
                .map(|i| FrameBuffer {
                    buffer_id: i as u64,
                    size: Resolution::new(640, 480),
                    planes: vec![Plane { offset: 0, length: 0 }],
                    data: Bytes::new(),
                })
                .collect();
            let source = Self {
                log: Arc::clone(&log),
                gate: rx,
                queued: VecDeque::new(),
                buffers,
                running: false,
                frames: 0,
            };
            (source, tx, log)
        }
    }

    impl FrameSource for MockSource {
        fn resolutions(&self) -> Vec<Resolution> {
            vec![Resolution::new(640, 480), Resolution::new(1280, 720)]
        }

        fn configure(&mut self, settings: &StreamSettings) -> Result<()> {
            self.log.lock().unwrap().configured = Some(settings.clone());
            Ok(())
        }

        async fn ready(&mut self) -> Result<()> {
            Ok(())
        }

        fn start(&mut self) -> Result<()> {
            self.running = true;
            self.log.lock().unwrap().starts += 1;
            Ok(())
        }

        fn stop(&mut self) -> Result<()> {
            self.running = false;
            self.queued.clear();
            self.log.lock().unwrap().stops += 1;
            Ok(())
        }

        fn queue(&mut self, slot: usize) -> Result<()> {
            if !self.running {
                return Err(Error::Source("queue while stopped".into()));
            }
            self.queued.push_back(slot);
            self.log.lock().unwrap().submissions.push(slot);
            Ok(())
        }

        async fn completed(&mut self) -> Result<usize> {
            if self.gate.recv().await.is_none() {
                std::future::pending::<()>().await;
            }
            let slot = self
                .queued
                .pop_front()
                .ok_or_else(|| Error::Source("nothing queued".into()))?;
            self.frames += 1;
            let data = Bytes::from(format!("frame-{:04}", self.frames));
            let buffer = &mut self.buffers[slot];
            buffer.planes = vec![Plane { offset: 0, length: data.len() }];
            buffer.data = data;
            Ok(slot)
        }

        fn buffer(&self, slot: usize) -> &FrameBuffer {
            &self.buffers[slot]
        }
    }

    fn frame_number(bytes: &[u8]) -> u32 {
        std::str::from_utf8(bytes).unwrap()["frame-".len()..].parse().unwrap()
    }

    fn assert_alternates(submissions: &[usize]) {
        for pair in submissions.windows(2) {
            assert_ne!(pair[0], pair[1], "slot resubmitted twice in a row: {:?}", submissions);
        }
    }

    async fn read_all(subscriber: &mut Subscriber) -> Vec<u8> {
        let mut frame = tokio::time::timeout(Duration::from_secs(5), subscriber.next_frame())
            .await
            .expect("no frame published")
            .unwrap();
        let mut out = Vec::new();
        frame.file.read_to_end(&mut out).await.unwrap();
        out
    }

    #[tokio::test]
    async fn test_configure_source_picks_size_and_pacing() {
        let dir = tempfile::tempdir().unwrap();
        let (mut source, _gate, log) = MockSource::new(2);
        let config = CaptureConfig::with_work_dir(dir.path()).max_fps(10.0).resolution(
            ResolutionFilter {
                smallest: true,
                ..Default::default()
            },
        );

        let settings = configure_source(&mut source, &config).await.unwrap();

        assert_eq!(settings.size, Resolution::new(640, 480));
        assert_eq!(settings.frame_duration, Duration::from_millis(100));
        assert_eq!(settings.buffer_count, 2);
        assert_eq!(log.lock().unwrap().configured, Some(settings));
    }

    #[tokio::test]
    async fn test_configure_source_no_match() {
        let dir = tempfile::tempdir().unwrap();
        let (mut source, _gate, _log) = MockSource::new(2);
        let config = CaptureConfig::with_work_dir(dir.path()).resolution(ResolutionFilter {
            min_width: Some(4000),
            ..Default::default()
        });

        let err = configure_source(&mut source, &config).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Startup(StartupError::NoMatchingResolution { .. })
        ));
    }

    #[tokio::test]
    async fn test_slots_alternate_and_frames_arrive_in_order() {
        let root = tempfile::tempdir().unwrap();
        let layout = FrameLayout::with_defaults(root.path().canonicalize().unwrap());
        let (mut source, gate, log) = MockSource::new(2);
        let publisher = Publisher::new(&layout).unwrap();
        let mut subscriber = Subscriber::new(layout.clone()).await.unwrap();
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

        let mut capture = CaptureLoop::new(&mut source, PassthroughEncoder, publisher, 2);

        let script = async {
            let mut seen = Vec::new();
            for _ in 0..6 {
                gate.send(()).unwrap();
                seen.push(frame_number(&read_all(&mut subscriber).await));
                // let the open notification reach the producer
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            stop_tx.send(()).unwrap();
            seen
        };

        let (result, seen) = tokio::join!(
            capture.run_until(async {
                let _ = stop_rx.await;
            }),
            script
        );
        result.unwrap();
        assert!(capture.stats().frames_published >= 1);
        drop(capture);

        assert!(seen.windows(2).all(|w| w[0] < w[1]), "out of order: {:?}", seen);
        let log = log.lock().unwrap();
        assert_alternates(&log.submissions);
        assert!(log.submissions.len() >= 6);
        assert_eq!(log.starts, log.stops);
    }

    #[tokio::test]
    async fn test_pauses_without_reader_and_resumes() {
        let root = tempfile::tempdir().unwrap();
        let layout = FrameLayout::with_defaults(root.path().canonicalize().unwrap());
        let (mut source, gate, log) = MockSource::new(2);
        let publisher = Publisher::new(&layout).unwrap();
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

        let mut capture = CaptureLoop::new(&mut source, PassthroughEncoder, publisher, 2);

        let script = async {
            // Two completions, nobody reading: the second one pauses capture
            gate.send(()).unwrap();
            gate.send(()).unwrap();
            tokio::time::sleep(Duration::from_millis(200)).await;
            {
                let log = log.lock().unwrap();
                assert_eq!(log.starts, 1);
                assert_eq!(log.stops, 1);
                assert_eq!(log.submissions, vec![0, 1]);
            }

            // A reader shows up and takes the frame that is there
            let mut subscriber = Subscriber::new(layout.clone()).await.unwrap();
            let first = frame_number(&read_all(&mut subscriber).await);
            assert_eq!(first, 1);

            // Capture resumes with the slot after the last one submitted
            gate.send(()).unwrap();
            let next = frame_number(&read_all(&mut subscriber).await);
            assert_eq!(next, 3);

            stop_tx.send(()).unwrap();
        };

        let (result, ()) = tokio::join!(
            capture.run_until(async {
                let _ = stop_rx.await;
            }),
            script
        );
        result.unwrap();
        let stats = capture.stats().clone();
        assert_eq!(stats.pauses, 1);
        // Every acquisition is either published or dropped by the pause
        assert_eq!(stats.frames_captured, stats.frames_published + stats.pauses);
        assert!(!capture.is_running());
        drop(capture);

        let log = log.lock().unwrap();
        assert_eq!(log.starts, 2);
        assert_eq!(log.stops, 2);
        assert_eq!(&log.submissions[..3], &[0, 1, 0]);
        assert_alternates(&log.submissions);
    }
}
