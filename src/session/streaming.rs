//! Streaming session
//!
//! One session serves one connection: response head, then one part per
//! published frame. Header bytes are held back in the pipe and leave
//! together with the body, so a part reaches the peer as few writes as the
//! sink allows.

use tokio::io::{AsyncReadExt, AsyncWrite};

use super::request::SessionMode;
use super::response::ResponseHeaders;
use crate::error::{Error, Result};
use crate::pipe::{FlushPolicy, MemorySource, Pipe, StreamSource};
use crate::publish::Subscriber;
use crate::server::RelayConfig;
use crate::stats::SessionStats;

/// Which frame a single-frame session delivers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnapshotPolicy {
    /// The frame already published, if any
    #[default]
    Current,
    /// The next frame published after the request; the current one is
    /// only opened to wake a paused producer
    Fresh,
}

/// Per-connection session
#[derive(Debug)]
pub struct StreamingSession {
    id: u64,
    headers: ResponseHeaders,
    snapshot: SnapshotPolicy,
    subscriber: Subscriber,
    pipe: Pipe,
    stats: SessionStats,
}

impl StreamingSession {
    /// Subscribe to the working directory and prepare the response
    ///
    /// The subscription starts here, so a frame published after this call
    /// is never missed.
    pub async fn new(id: u64, mode: SessionMode, config: &RelayConfig) -> Result<Self> {
        Ok(Self {
            id,
            headers: ResponseHeaders::new(mode, config.boundary.clone()),
            snapshot: config.snapshot,
            subscriber: Subscriber::new(config.layout()).await?,
            pipe: Pipe::with_capacity(config.pipe_capacity),
            stats: SessionStats::new(),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn mode(&self) -> SessionMode {
        self.headers.mode()
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Deliver the response to `sink`
    ///
    /// Single mode returns after one part. Continuous mode returns only
    /// with an error; a departed peer is [`Error::Disconnected`].
    pub async fn run<W: AsyncWrite + Unpin>(&mut self, sink: &mut W) -> Result<()> {
        let head = self.headers.head();
        self.pipe
            .copy(&mut MemorySource::new(&head), sink, FlushPolicy::Deferred)
            .await?;

        if self.mode() == SessionMode::Single && self.snapshot == SnapshotPolicy::Fresh {
            self.subscriber.skip_current().await?;
        }

        let body_policy = match self.mode() {
            SessionMode::Single => FlushPolicy::Bulk,
            SessionMode::Continuous => FlushPolicy::Immediate,
        };

        loop {
            let prefix = self.headers.part_prefix();
            self.pipe
                .copy(&mut MemorySource::new(&prefix), sink, FlushPolicy::Deferred)
                .await?;

            let frame = self.subscriber.next_frame().await?;
            let fields = self.headers.part_fields(frame.len, frame.captured_at);
            self.pipe
                .copy(&mut MemorySource::new(&fields), sink, FlushPolicy::Deferred)
                .await?;

            // Never send more than the advertised length
            let mut body = StreamSource::new(frame.file.take(frame.len));
            let sent = self.pipe.copy(&mut body, sink, body_policy).await?;
            if sent != frame.len {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("frame shrank from {} to {} bytes", frame.len, sent),
                )));
            }

            self.stats.on_part(sent);
            tracing::trace!(session_id = self.id, bytes = sent, "Part delivered");

            if self.mode() == SessionMode::Single {
                return Ok(());
            }
        }
    }

    /// Run to completion, treating a departed peer as a normal end
    pub async fn serve<W: AsyncWrite + Unpin>(mut self, sink: &mut W) -> Result<SessionStats> {
        tracing::debug!(session_id = self.id, mode = %self.mode(), "Session started");

        let result = self.run(sink).await;
        let stats = self.stats.clone();

        match result {
            Ok(()) => {}
            Err(Error::Disconnected) => {
                tracing::info!(session_id = self.id, "Client disconnected");
            }
            Err(e) => return Err(e),
        }

        tracing::info!(
            session_id = self.id,
            parts = stats.parts_sent,
            bytes = stats.bytes_sent,
            secs = stats.duration().as_secs_f64(),
            fps = stats.framerate(),
            "Session finished"
        );
        Ok(stats)
    }
}
