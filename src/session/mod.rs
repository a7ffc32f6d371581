//! Consumer side: one request, one response
//!
//! ```text
//! request line ──► SessionMode ──► head ──► [prefix ─► next_frame ─► fields ─► body]*
//!                                            └──────── continuous repeats ───────┘
//! ```

pub mod request;
pub mod response;
pub mod streaming;

pub use request::{read_request, SessionMode, MAX_REQUEST_LEN, REQUEST_PREFIXES};
pub use response::{ResponseHeaders, DEFAULT_BOUNDARY};
pub use streaming::{SnapshotPolicy, StreamingSession};
