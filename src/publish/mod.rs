//! Filesystem publish/subscribe
//!
//! Producer and consumer never share memory or locks. The producer writes
//! `<work_dir>/<working_filename>` and renames it onto
//! `<work_dir>/<filename>`; the rename is the consistency boundary and the
//! change-notification watch is the wake-up.
//!
//! ```text
//!   Publisher                      filesystem                   Subscriber
//!   write staging ──► fsync ──► rename ──► MovedIn event ──► open canonical
//!        ▲                                                         │
//!        └──────────────── Opened event (overwrite guard) ◄────────┘
//! ```

pub mod layout;
pub mod publisher;
pub mod subscriber;

pub use layout::{FrameLayout, DEFAULT_FILENAME, DEFAULT_WORKING_FILENAME};
pub use publisher::{PublishOutcome, Publisher};
pub use subscriber::{OpenedFrame, SubscribeState, Subscriber, WatchAction};
