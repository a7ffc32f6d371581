//! Socket activation
//!
//! The service manager passes sockets starting at descriptor 3 and says how
//! many in `LISTEN_FDS`. Depending on the unit, descriptor 3 is either a
//! listening socket (one process serves every connection) or an already
//! accepted connection (one process per connection).

use std::io;
use std::net::{TcpListener, TcpStream};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};

use crate::error::{Result, StartupError};

/// First passed descriptor
pub const LISTEN_FDS_START: RawFd = 3;

/// Environment variable holding the number of passed descriptors
pub const LISTEN_FDS_VAR: &str = "LISTEN_FDS";

/// The socket handed over by the service manager
#[derive(Debug)]
pub enum ActivatedSocket {
    /// Accept connections ourselves
    Listener(TcpListener),
    /// A single connection, already accepted
    Connection(TcpStream),
}

impl ActivatedSocket {
    /// Take ownership of the first passed descriptor
    pub fn from_environment() -> Result<Self> {
        let count = parse_listen_fds(std::env::var(LISTEN_FDS_VAR).ok().as_deref())?;
        if count > 1 {
            tracing::warn!(count, "Only the first activated socket is used");
        }

        // SAFETY: LISTEN_FDS >= 1 means descriptor 3 was passed to us and
        // nothing else in this process has claimed it
        let fd = unsafe { OwnedFd::from_raw_fd(LISTEN_FDS_START) };
        Ok(Self::from_fd(fd)?)
    }

    /// Classify a socket descriptor
    pub fn from_fd(fd: OwnedFd) -> io::Result<Self> {
        if is_listening(fd.as_fd())? {
            Ok(ActivatedSocket::Listener(TcpListener::from(fd)))
        } else {
            Ok(ActivatedSocket::Connection(TcpStream::from(fd)))
        }
    }
}

/// Validate the `LISTEN_FDS` value
pub fn parse_listen_fds(value: Option<&str>) -> std::result::Result<usize, StartupError> {
    match value.and_then(|v| v.trim().parse::<usize>().ok()) {
        Some(count) if count >= 1 => Ok(count),
        _ => Err(StartupError::NoActivationSocket),
    }
}

/// Whether `fd` is a listening socket
pub fn is_listening(fd: BorrowedFd<'_>) -> io::Result<bool> {
    Ok(getsockopt_int(fd, libc::SOL_SOCKET, libc::SO_ACCEPTCONN)? != 0)
}

/// Set the kernel send buffer size
pub fn set_send_buffer(fd: BorrowedFd<'_>, size: usize) -> io::Result<()> {
    let value = libc::c_int::try_from(size)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "send buffer too large"))?;

    // SAFETY: fd is a live descriptor and value outlives the call
    let ret = unsafe {
        libc::setsockopt(
            fd.as_raw_fd(),
            libc::SOL_SOCKET,
            libc::SO_SNDBUF,
            &value as *const libc::c_int as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Current kernel send buffer size
pub fn send_buffer(fd: BorrowedFd<'_>) -> io::Result<usize> {
    Ok(getsockopt_int(fd, libc::SOL_SOCKET, libc::SO_SNDBUF)?.max(0) as usize)
}

fn getsockopt_int(fd: BorrowedFd<'_>, level: libc::c_int, name: libc::c_int) -> io::Result<libc::c_int> {
    let mut value: libc::c_int = 0;
    let mut len = std::mem::size_of::<libc::c_int>() as libc::socklen_t;

    // SAFETY: fd is a live descriptor, value and len are valid for writes
    let ret = unsafe {
        libc::getsockopt(
            fd.as_raw_fd(),
            level,
            name,
            &mut value as *mut libc::c_int as *mut libc::c_void,
            &mut len,
        )
    };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(value)
}
