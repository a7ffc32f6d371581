//! Relay server
//!
//! Turns connections into streaming sessions. Under a listening socket every
//! accepted connection gets its own task; under an accepted socket or stdio
//! exactly one session runs.
//!
//! A departed peer or a rejected request ends only its own session. Any
//! other fault on the frame file or the socket ends the whole relay.

use std::future::Future;
use std::net::SocketAddr;
use std::os::fd::AsFd;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use super::activation::{self, ActivatedSocket};
use super::config::RelayConfig;
use crate::error::{Error, Result};
use crate::session::{read_request, SessionMode, StreamingSession};
use crate::stats::SessionStats;

/// Frame relay server
#[derive(Debug)]
pub struct RelayServer {
    config: RelayConfig,
    next_session_id: AtomicU64,
}

impl RelayServer {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            config,
            next_session_id: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Serve the socket passed by the service manager
    pub async fn serve_activated<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        match ActivatedSocket::from_environment()? {
            ActivatedSocket::Listener(listener) => {
                listener.set_nonblocking(true)?;
                let listener = TcpListener::from_std(listener)?;
                if let Ok(addr) = listener.local_addr() {
                    tracing::info!(addr = %addr, "Relay listening on activated socket");
                }
                self.run_until(&listener, shutdown).await
            }
            ActivatedSocket::Connection(stream) => {
                stream.set_nonblocking(true)?;
                let stream = TcpStream::from_std(stream)?;
                tokio::select! {
                    _ = shutdown => {
                        tracing::info!("Shutdown signal received");
                        Ok(())
                    }
                    result = self.serve_connection(stream) => result.map(|_| ()),
                }
            }
        }
    }

    /// Accept connections until `shutdown` resolves or a session fails
    pub async fn run_until<F>(&self, listener: &TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(listener) => result,
        }
    }

    async fn accept_loop(&self, listener: &TcpListener) -> Result<()> {
        let (fault_tx, mut fault_rx) = mpsc::unbounded_channel();

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((socket, peer_addr)) => {
                        self.handle_connection(socket, peer_addr, fault_tx.clone())
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to accept connection");
                    }
                },
                Some(e) = fault_rx.recv() => return Err(e),
            }
        }
    }

    fn handle_connection(
        &self,
        socket: TcpStream,
        peer_addr: SocketAddr,
        faults: mpsc::UnboundedSender<Error>,
    ) {
        let session_id = self.next_session_id();

        tracing::debug!(session_id = session_id, peer = %peer_addr, "New connection");

        if let Err(e) = configure_socket(&socket, &self.config) {
            tracing::error!(error = %e, "Failed to configure socket");
            return;
        }

        let config = self.config.clone();

        tokio::spawn(async move {
            match serve_socket(session_id, socket, &config).await {
                Ok(_) => {}
                Err(e @ Error::Protocol(_)) => {
                    tracing::warn!(session_id = session_id, error = %e, "Rejected request");
                }
                Err(e) if e.is_session_local() => {
                    tracing::debug!(session_id = session_id, "Client went away");
                }
                Err(e) => {
                    tracing::error!(session_id = session_id, error = %e, "Session failed, stopping relay");
                    let _ = faults.send(e);
                }
            }

            tracing::debug!(session_id = session_id, "Connection closed");
        });
    }

    /// Serve one already-accepted connection on the current task
    pub async fn serve_connection(&self, socket: TcpStream) -> Result<SessionStats> {
        configure_socket(&socket, &self.config)?;
        serve_socket(self.next_session_id(), socket, &self.config).await
    }

    /// Serve one session of a fixed mode on standard output
    pub async fn serve_stdio(&self, mode: SessionMode) -> Result<SessionStats> {
        let session = StreamingSession::new(self.next_session_id(), mode, &self.config).await?;
        let mut stdout = tokio::io::stdout();
        session.serve(&mut stdout).await
    }

    fn next_session_id(&self) -> u64 {
        self.next_session_id.fetch_add(1, Ordering::Relaxed)
    }
}

async fn serve_socket(id: u64, mut socket: TcpStream, config: &RelayConfig) -> Result<SessionStats> {
    let mode = read_request(&mut socket).await?;
    let session = StreamingSession::new(id, mode, config).await?;
    session.serve(&mut socket).await
}

fn configure_socket(socket: &TcpStream, config: &RelayConfig) -> std::io::Result<()> {
    if config.tcp_nodelay {
        socket.set_nodelay(true)?;
    }
    if config.tcp_send_buffer > 0 {
        activation::set_send_buffer(socket.as_fd(), config.tcp_send_buffer)?;
    }
    Ok(())
}
