//! Error types
//!
//! Faults fall into two groups. Session-local faults (a viewer hanging up)
//! end one session and are never propagated further. Everything else is
//! fatal for the process role that hit it.

use std::fmt;
use std::io;

use crate::capture::Resolution;

/// Result type for relay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Crate-level error
#[derive(Debug)]
pub enum Error {
    /// I/O fault on a source, sink or the working directory
    Io(io::Error),
    /// The peer went away while we were writing to it
    Disconnected,
    /// Request line did not match any recognized prefix
    Protocol(ProtocolError),
    /// Startup could not complete
    Startup(StartupError),
    /// Change-notification watch failure
    Watch(notify::Error),
    /// The frame source reported a failure
    Source(String),
    /// The image encoder reported a failure
    Encode(String),
}

impl Error {
    /// Whether this error only ends the current session
    pub fn is_session_local(&self) -> bool {
        matches!(self, Error::Disconnected)
    }

    /// Process exit status for a fault that ended a process role
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Disconnected => 0,
            Error::Startup(_) => 2,
            _ => 1,
        }
    }

    /// Classify a sink-side I/O error
    ///
    /// A peer hanging up surfaces as one of a handful of error kinds; those
    /// become [`Error::Disconnected`], anything else stays an I/O fault.
    pub fn from_sink(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::WriteZero => Error::Disconnected,
            _ => Error::Io(err),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Disconnected => write!(f, "Client disconnected"),
            Error::Protocol(e) => write!(f, "Protocol error: {}", e),
            Error::Startup(e) => write!(f, "Startup error: {}", e),
            Error::Watch(e) => write!(f, "Watch error: {}", e),
            Error::Source(msg) => write!(f, "Frame source error: {}", msg),
            Error::Encode(msg) => write!(f, "Encoder error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Protocol(e) => Some(e),
            Error::Startup(e) => Some(e),
            Error::Watch(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<notify::Error> for Error {
    fn from(err: notify::Error) -> Self {
        Error::Watch(err)
    }
}

impl From<ProtocolError> for Error {
    fn from(err: ProtocolError) -> Self {
        Error::Protocol(err)
    }
}

impl From<StartupError> for Error {
    fn from(err: StartupError) -> Self {
        Error::Startup(err)
    }
}

/// Request-line errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Connection closed before enough of the request line arrived
    ShortRequest(usize),
    /// The request line matched none of the recognized prefixes
    UnknownRequest(String),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::ShortRequest(n) => {
                write!(f, "Not enough headers ({} bytes received)", n)
            }
            ProtocolError::UnknownRequest(line) => write!(f, "Invalid headers: {}", line),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Fatal startup conditions
#[derive(Debug, Clone, PartialEq)]
pub enum StartupError {
    /// Working directory does not exist or is not a directory
    InvalidWorkDir(String),
    /// Resolution bounds contradict each other
    InvalidConstraints(String),
    /// No available resolution satisfies the configured bounds
    NoMatchingResolution { available: Vec<Resolution> },
    /// Frame rate ceiling is not a positive finite number
    InvalidFrameRate(f64),
    /// Socket activation was requested but no descriptor was passed
    NoActivationSocket,
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartupError::InvalidWorkDir(dir) => write!(f, "Invalid workdir: {}", dir),
            StartupError::InvalidConstraints(msg) => {
                write!(f, "Invalid resolution constraints: {}", msg)
            }
            StartupError::NoMatchingResolution { available } => {
                write!(f, "No matching stream sizes found. Available sizes: ")?;
                write_sizes(f, available)
            }
            StartupError::InvalidFrameRate(fps) => write!(f, "Invalid frame rate: {}", fps),
            StartupError::NoActivationSocket => {
                write!(f, "No socket passed via LISTEN_FDS; start this with systemd")
            }
        }
    }
}

impl std::error::Error for StartupError {}

/// Format sizes as `WxH, WxH, ...`
pub fn write_sizes(f: &mut impl fmt::Write, sizes: &[Resolution]) -> fmt::Result {
    for (i, size) in sizes.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", size)?;
    }
    Ok(())
}

/// The `--list-resolutions` line
pub fn available_sizes_line(sizes: &[Resolution]) -> String {
    let mut line = String::from("Available sizes: ");
    // Writing into a String cannot fail
    let _ = write_sizes(&mut line, sizes);
    line
}
