//! Request-line matching
//!
//! There is no HTTP parser here. The first bytes of the request are compared
//! against a fixed set of prefixes; each prefix selects a session mode.

use std::fmt;
use std::str::FromStr;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Error, ProtocolError, Result};

/// Upper bound on how much of the request is buffered
pub const MAX_REQUEST_LEN: usize = 1024;

/// How many parts a session delivers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionMode {
    /// One frame, then the connection closes
    Single,
    /// A multipart stream, one part per published frame
    Continuous,
}

/// Recognized request prefixes
pub const REQUEST_PREFIXES: &[(&[u8], SessionMode)] = &[
    (b"GET /?action=stream", SessionMode::Continuous),
    (b"GET /?action=snapshot", SessionMode::Single),
];

/// Bytes that must be buffered before matching
pub fn min_request_len() -> usize {
    REQUEST_PREFIXES
        .iter()
        .map(|(prefix, _)| prefix.len())
        .max()
        .unwrap_or(0)
}

impl SessionMode {
    /// Match the start of a request against the known prefixes
    pub fn from_request(request: &[u8]) -> std::result::Result<Self, ProtocolError> {
        REQUEST_PREFIXES
            .iter()
            .find(|(prefix, _)| request.starts_with(prefix))
            .map(|(_, mode)| *mode)
            .ok_or_else(|| ProtocolError::UnknownRequest(first_line(request)))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionMode::Single => "single",
            SessionMode::Continuous => "continuous",
        }
    }
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "single" | "snapshot" => Ok(SessionMode::Single),
            "continuous" | "stream" => Ok(SessionMode::Continuous),
            other => Err(format!("unknown session mode: {}", other)),
        }
    }
}

fn first_line(request: &[u8]) -> String {
    let end = request
        .iter()
        .position(|&b| b == b'\r' || b == b'\n')
        .unwrap_or(request.len());
    String::from_utf8_lossy(&request[..end]).into_owned()
}

/// Read the start of a request and decide the session mode
///
/// Reads until at least the longest prefix is buffered. Anything after the
/// matched prefix is ignored.
pub async fn read_request<R: AsyncRead + Unpin>(reader: &mut R) -> Result<SessionMode> {
    let needed = min_request_len();
    let mut buf = [0u8; MAX_REQUEST_LEN];
    let mut len = 0;

    while len < needed {
        let n = reader.read(&mut buf[len..]).await?;
        if n == 0 {
            return Err(Error::Protocol(ProtocolError::ShortRequest(len)));
        }
        len += n;
    }

    let mode = SessionMode::from_request(&buf[..len])?;
    tracing::debug!(mode = %mode, bytes = len, "Request matched");
    Ok(mode)
}
