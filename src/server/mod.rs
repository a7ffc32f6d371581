//! Consumer process plumbing: configuration, socket activation and the
//! connection loop

pub mod activation;
pub mod config;
pub mod relay;

pub use activation::{ActivatedSocket, LISTEN_FDS_START};
pub use config::{RelayConfig, DEFAULT_SEND_BUFFER};
pub use relay::RelayServer;
