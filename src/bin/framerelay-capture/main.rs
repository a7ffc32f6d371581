//! Producer process
//!
//! Plays frames from a source into the working directory, publishing each
//! one by atomic rename and pausing whenever nobody reads them.
//!
//! Run with:
//!   framerelay-capture --replay ./frames --max-fps 10 /run/camera

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use framerelay::capture::{
    configure_source, CaptureConfig, CaptureLoop, FrameSource, PassthroughEncoder, ReplaySource,
    ResolutionFilter, DEFAULT_MAX_FPS,
};
use framerelay::publish::{Publisher, DEFAULT_FILENAME, DEFAULT_WORKING_FILENAME};
use framerelay::error::available_sizes_line;
use framerelay::{Error, Result};

/// Capture frames and publish the latest one into a working directory.
#[derive(Parser, Debug)]
#[command(name = "framerelay-capture", version)]
struct Cli {
    /// Working directory that receives published frames
    work_dir: PathBuf,

    /// Canonical frame file name
    #[arg(short, long, default_value = DEFAULT_FILENAME)]
    filename: String,

    /// Staging file name
    #[arg(long, default_value = DEFAULT_WORKING_FILENAME)]
    working_filename: String,

    /// Frame rate ceiling
    #[arg(long, default_value_t = DEFAULT_MAX_FPS)]
    max_fps: f64,

    #[arg(long)]
    max_width: Option<u32>,

    #[arg(long)]
    max_height: Option<u32>,

    #[arg(long)]
    min_width: Option<u32>,

    #[arg(long)]
    min_height: Option<u32>,

    /// Pick the smallest matching size instead of the largest
    #[arg(long)]
    smallest_resolution: bool,

    /// Print the available sizes and exit
    #[arg(long)]
    list_resolutions: bool,

    /// Accepted for compatibility; frames are never overwritten before
    /// a reader opened them
    #[arg(long)]
    overwrite_existing_temp_file: bool,

    /// Directory of JPEG files played back as the frame source
    #[arg(long, value_name = "DIR")]
    replay: PathBuf,
}

impl Cli {
    fn config(&self) -> CaptureConfig {
        let mut config = CaptureConfig::with_work_dir(&self.work_dir)
            .filename(&self.filename)
            .working_filename(&self.working_filename)
            .max_fps(self.max_fps)
            .resolution(ResolutionFilter {
                min_width: self.min_width,
                min_height: self.min_height,
                max_width: self.max_width,
                max_height: self.max_height,
                smallest: self.smallest_resolution,
            });
        config.overwrite_existing_temp_file = self.overwrite_existing_temp_file;
        config
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
    if config.overwrite_existing_temp_file {
        tracing::warn!("--overwrite-existing-temp-file has no effect; the overwrite guard is always on");
    }

    // Owned here and released on every exit path when it drops
    let mut source = ReplaySource::open(&cli.replay).await?;

    if cli.list_resolutions {
        println!("{}", available_sizes_line(&source.resolutions()));
        return Ok(());
    }

    let settings = configure_source(&mut source, &config).await?;
    let publisher = Publisher::new(&config.layout())?;

    tracing::info!(
        work_dir = %config.work_dir.display(),
        size = %settings.size,
        max_fps = config.max_fps,
        "Capture started"
    );

    let mut capture = CaptureLoop::new(&mut source, PassthroughEncoder, publisher, config.slot_count)
        .stats_every(config.stats_every);
    capture.run_until(shutdown_signal()).await
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
        Err(e @ Error::Startup(_)) => {
            tracing::error!(error = %e, "Cannot start capture");
            ExitCode::from(e.exit_code() as u8)
        }
        Err(e) => {
            tracing::error!(error = %e, "Capture failed");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}
