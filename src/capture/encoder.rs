//! Image Encoder seam

use bytes::Bytes;

use super::source::FrameBuffer;
use crate::error::{Error, Result};

/// Turns raw frame planes into a compressed blob
///
/// Encoding happens in two steps: [`ImageEncoder::bind`] builds whatever
/// per-buffer state is needed (a mapping, plane views), and
/// [`ImageEncoder::encode`] reuses it for every frame that lands in that
/// buffer.
pub trait ImageEncoder {
    /// Per-buffer state
    type Bound;

    fn bind(&self, buffer: &FrameBuffer) -> Result<Self::Bound>;

    fn encode(&self, bound: &mut Self::Bound, buffer: &FrameBuffer) -> Result<Bytes>;
}

/// Hands through buffers that already hold an encoded image
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughEncoder;

impl ImageEncoder for PassthroughEncoder {
    type Bound = ();

    fn bind(&self, buffer: &FrameBuffer) -> Result<()> {
        if buffer.planes.len() != 1 {
            return Err(Error::Encode(format!(
                "passthrough expects one plane, got {}",
                buffer.planes.len()
            )));
        }
        Ok(())
    }

    fn encode(&self, _bound: &mut (), buffer: &FrameBuffer) -> Result<Bytes> {
        // The layout may change under the same buffer id
        let plane = buffer
            .plane(0)
            .ok_or_else(|| Error::Encode("plane 0 missing or out of bounds".into()))?;
        Ok(buffer.data.slice_ref(plane))
    }
}
