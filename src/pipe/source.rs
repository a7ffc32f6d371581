//! Read strategies for the pipe engine
//!
//! The engine never decides how bytes are obtained. A [`PipeSource`] is
//! chosen once per call site: a descriptor-backed stream that must wait for
//! readiness, or an in-memory block that is always ready.

use std::future::{self, Future};
use std::io;

use tokio::io::{AsyncRead, AsyncReadExt};

/// A byte source the pipe engine can drain
pub trait PipeSource {
    /// Read into `buf`, returning the number of bytes read
    ///
    /// `Ok(0)` means the source is exhausted.
    fn read_into<'a>(
        &'a mut self,
        buf: &'a mut [u8],
    ) -> impl Future<Output = io::Result<usize>> + Send + 'a;

    /// Whether reads complete without waiting for readiness
    fn is_immediate(&self) -> bool {
        false
    }
}

/// In-memory block, consumed front to back
#[derive(Debug)]
pub struct MemorySource<'a> {
    remaining: &'a [u8],
}

impl<'a> MemorySource<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { remaining: data }
    }

    /// Bytes not yet handed to the pipe
    pub fn remaining(&self) -> usize {
        self.remaining.len()
    }
}

impl PipeSource for MemorySource<'_> {
    fn read_into<'a>(
        &'a mut self,
        buf: &'a mut [u8],
    ) -> impl Future<Output = io::Result<usize>> + Send + 'a {
        let n = buf.len().min(self.remaining.len());
        buf[..n].copy_from_slice(&self.remaining[..n]);
        self.remaining = &self.remaining[n..];
        future::ready(Ok(n))
    }

    fn is_immediate(&self) -> bool {
        true
    }
}

/// Descriptor-backed stream (file, socket, pipe)
#[derive(Debug)]
pub struct StreamSource<R> {
    inner: R,
}

impl<R> StreamSource<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: AsyncRead + Unpin + Send> PipeSource for StreamSource<R> {
    fn read_into<'a>(
        &'a mut self,
        buf: &'a mut [u8],
    ) -> impl Future<Output = io::Result<usize>> + Send + 'a {
        self.inner.read(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_source_drains_in_chunks() {
        let mut source = MemorySource::new(b"hello world");
        let mut buf = [0u8; 4];

        assert_eq!(source.read_into(&mut buf).await.unwrap(), 4);
        assert_eq!(&buf, b"hell");
        assert_eq!(source.remaining(), 7);

        assert_eq!(source.read_into(&mut buf).await.unwrap(), 4);
        assert_eq!(source.read_into(&mut buf).await.unwrap(), 3);
        assert_eq!(&buf[..3], b"rld");
        assert_eq!(source.read_into(&mut buf).await.unwrap(), 0);
        assert!(source.is_immediate());
    }

    #[tokio::test]
    async fn test_stream_source_reports_eof() {
        let mock = tokio_test::io::Builder::new().read(b"abc").build();
        let mut source = StreamSource::new(mock);
        let mut buf = [0u8; 8];

        assert!(!source.is_immediate());
        assert_eq!(source.read_into(&mut buf).await.unwrap(), 3);
        assert_eq!(source.read_into(&mut buf).await.unwrap(), 0);
    }
}
