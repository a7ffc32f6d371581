//! Consumer process
//!
//! Serves the latest published frame, either on a socket passed by the
//! service manager or on standard output.
//!
//! Run with:
//!   framerelay-serve --socket stdio --mode single /run/camera > frame.http
//!   systemd-socket-activate -l 8080 framerelay-serve --socket systemd /run/camera

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use framerelay::publish::DEFAULT_FILENAME;
use framerelay::session::DEFAULT_BOUNDARY;
use framerelay::{Error, RelayConfig, RelayServer, Result, SessionMode, SnapshotPolicy};

/// Where the response goes
#[derive(Clone, Copy, Debug, ValueEnum)]
enum SocketKind {
    /// Socket passed via LISTEN_FDS
    Systemd,
    /// Standard output
    Stdio,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
    Single,
    Continuous,
}

impl From<Mode> for SessionMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Single => SessionMode::Single,
            Mode::Continuous => SessionMode::Continuous,
        }
    }
}

/// Serve the latest published frame as a snapshot or a multipart stream.
#[derive(Parser, Debug)]
#[command(name = "framerelay-serve", version)]
struct Cli {
    /// Working directory the producer publishes into
    work_dir: PathBuf,

    /// Canonical frame file name
    #[arg(short, long, default_value = DEFAULT_FILENAME)]
    filename: String,

    /// Multipart boundary token
    #[arg(long, default_value = DEFAULT_BOUNDARY)]
    boundary: String,

    #[arg(long, value_enum, default_value = "stdio")]
    socket: SocketKind,

    /// Session mode on stdio; activated sockets take it from the request
    #[arg(long, value_enum, default_value = "single")]
    mode: Mode,

    /// Snapshots wait for the next frame instead of sending the current one
    #[arg(long)]
    fresh_snapshot: bool,
}

impl Cli {
    fn config(&self) -> RelayConfig {
        let snapshot = if self.fresh_snapshot {
            SnapshotPolicy::Fresh
        } else {
            SnapshotPolicy::Current
        };
        RelayConfig::with_work_dir(&self.work_dir)
            .filename(&self.filename)
            .boundary(&self.boundary)
            .snapshot(snapshot)
    }
}

async fn shutdown_signal() {
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate => {}
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.config();
    config.validate()?;

    tracing::info!(
        parent = %config.layout().parent().display(),
        work_dir = %config.work_dir.display(),
        "Watching for published frames"
    );

    let relay = RelayServer::new(config);
    match cli.socket {
        SocketKind::Systemd => relay.serve_activated(shutdown_signal()).await,
        SocketKind::Stdio => {
            tokio::select! {
                _ = shutdown_signal() => Ok(()),
                result = relay.serve_stdio(cli.mode.into()) => result.map(|_| ()),
            }
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(Error::Disconnected) => {
            tracing::info!("Client disconnected");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Relay failed");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}
