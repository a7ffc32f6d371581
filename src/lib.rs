//! Latest-frame relay
//!
//! A producer captures frames and publishes each one by renaming it onto a
//! fixed path. Consumers watch that path and hand every new frame to a
//! network client, either once (snapshot) or as a multipart stream.
//!
//! ```text
//! FrameSource ─► CaptureLoop ─► ImageEncoder ─► Publisher
//!                                                   │ rename
//!                                                   ▼
//!            client ◄─ Pipe ◄─ StreamingSession ◄─ Subscriber
//! ```
//!
//! Producer and consumers never share memory. The atomic rename is the only
//! consistency boundary and change notifications are the only wake-up.

pub mod capture;
pub mod error;
pub mod pipe;
pub mod publish;
pub mod server;
pub mod session;
pub mod stats;
pub mod watch;

pub use capture::{CaptureConfig, CaptureLoop, FrameSource, ImageEncoder, ReplaySource};
pub use error::{Error, ProtocolError, Result, StartupError};
pub use publish::{FrameLayout, Publisher, Subscriber};
pub use server::{RelayConfig, RelayServer};
pub use session::{SessionMode, SnapshotPolicy, StreamingSession};
