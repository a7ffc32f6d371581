//! Ring-buffer copy engine
//!
//! Moves bytes from a [`PipeSource`] to an `AsyncWrite` sink through a
//! [`RingBuffer`]. Each step waits on a single readiness point covering only
//! the operations that currently make sense: a read when there is free space
//! and the source is not exhausted, a write when the flush policy says the
//! buffered bytes should go out. Nothing spins and nothing blocks on an
//! operation that is not ready.

use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::ring::RingBuffer;
use super::source::PipeSource;
use crate::error::{Error, Result};

/// Default ring capacity (4 MiB)
pub const DEFAULT_PIPE_CAPACITY: usize = 2 << 21;

/// When buffered bytes are written to the sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushPolicy {
    /// Write as soon as anything is buffered (live frames)
    Immediate,
    /// Write only when the buffer is full or the source is exhausted, then
    /// drain completely
    Bulk,
    /// Write only when the buffer is full; whatever is left stays buffered
    /// and goes out with the next copy (response headers)
    Deferred,
}

enum Step {
    Read(std::io::Result<usize>),
    Wrote(std::io::Result<usize>),
}

/// Copy engine owning one ring buffer for the lifetime of a session
#[derive(Debug)]
pub struct Pipe {
    ring: RingBuffer,
    writes: u64,
}

impl Pipe {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_PIPE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ring: RingBuffer::with_capacity(capacity),
            writes: 0,
        }
    }

    /// Bytes waiting to be written
    pub fn buffered(&self) -> usize {
        self.ring.used()
    }

    /// Number of successful sink writes so far
    pub fn write_calls(&self) -> u64 {
        self.writes
    }

    pub fn ring(&self) -> &RingBuffer {
        &self.ring
    }

    /// One bounded read into the contiguous free region
    ///
    /// Returns `Ok(0)` when the source is exhausted. Read faults are not
    /// session-local and come back as [`Error::Io`].
    pub async fn read_into<S: PipeSource>(&mut self, source: &mut S) -> Result<usize> {
        let region = self.ring.free_region_mut();
        if region.is_empty() {
            return Ok(0);
        }
        let n = source.read_into(region).await?;
        self.ring.commit(n);
        Ok(n)
    }

    /// One bounded write of the contiguous buffered region
    pub async fn write_from<W: AsyncWrite + Unpin>(&mut self, sink: &mut W) -> Result<usize> {
        let data = self.ring.data_region();
        if data.is_empty() {
            return Ok(0);
        }
        let n = sink.write(data).await.map_err(Error::from_sink)?;
        self.wrote(n)
    }

    /// Write out everything still buffered
    pub async fn drain<W: AsyncWrite + Unpin>(&mut self, sink: &mut W) -> Result<()> {
        while !self.ring.is_empty() {
            self.write_from(sink).await?;
        }
        sink.flush().await.map_err(Error::from_sink)
    }

    /// Copy `source` into `sink` until the source is exhausted
    ///
    /// With [`FlushPolicy::Immediate`] and [`FlushPolicy::Bulk`] the copy
    /// returns with the buffer empty; with [`FlushPolicy::Deferred`] it
    /// returns as soon as the source is exhausted. Returns the number of
    /// bytes read from the source.
    pub async fn copy<S, W>(&mut self, source: &mut S, sink: &mut W, policy: FlushPolicy) -> Result<u64>
    where
        S: PipeSource,
        W: AsyncWrite + Unpin,
    {
        let mut exhausted = false;
        let mut total = 0u64;

        loop {
            let has_free = self.ring.has_free();
            let has_data = !self.ring.is_empty();

            // Memory blocks never need a readiness wait
            if source.is_immediate() && has_free && !exhausted {
                let n = self.read_into(source).await?;
                exhausted = n == 0;
                total += n as u64;
                continue;
            }

            let want_read = has_free && !exhausted;
            let want_write = has_data
                && match policy {
                    FlushPolicy::Immediate => true,
                    FlushPolicy::Bulk => !has_free || exhausted,
                    FlushPolicy::Deferred => !has_free && !exhausted,
                };

            if !want_read && !want_write {
                break;
            }

            let step = {
                let (free, data) = self.ring.regions_mut();
                tokio::select! {
                    biased;
                    res = sink.write(data), if want_write => Step::Wrote(res),
                    res = source.read_into(free), if want_read => Step::Read(res),
                }
            };

            match step {
                Step::Read(res) => {
                    let n = res?;
                    if n == 0 {
                        exhausted = true;
                    } else {
                        self.ring.commit(n);
                        total += n as u64;
                    }
                }
                Step::Wrote(res) => {
                    let n = res.map_err(Error::from_sink)?;
                    self.wrote(n)?;
                }
            }
        }

        if policy != FlushPolicy::Deferred {
            sink.flush().await.map_err(Error::from_sink)?;
        }

        Ok(total)
    }

    fn wrote(&mut self, n: usize) -> Result<usize> {
        if n == 0 {
            return Err(Error::Disconnected);
        }
        self.ring.consume(n);
        self.writes += 1;
        Ok(n)
    }
}

impl Default for Pipe {
    fn default() -> Self {
        Self::new()
    }
}
