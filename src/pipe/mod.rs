//! Non-blocking byte relay
//!
//! ```text
//!   PipeSource ──read_into──► RingBuffer ──write_from──► AsyncWrite sink
//!   (file, socket,            (fixed C,                  (client socket,
//!    memory block)             one slot reserved)         stdout)
//! ```
//!
//! [`Pipe::copy`] multiplexes source readiness and sink readiness in a single
//! wait. The [`FlushPolicy`] decides when buffered bytes are worth a write:
//! immediately for live frames, in full buffers for bulk bodies, or not at
//! all until the next copy for small header blocks.

pub mod engine;
pub mod ring;
pub mod source;

pub use engine::{FlushPolicy, Pipe, DEFAULT_PIPE_CAPACITY};
pub use ring::RingBuffer;
pub use source::{MemorySource, PipeSource, StreamSource};
