//! Acquisition slots

use bytes::Bytes;

use super::encoder::ImageEncoder;
use super::source::FrameBuffer;
use crate::error::Result;

/// One reusable acquisition slot and its lazily built encoder state
#[derive(Debug)]
pub struct FrameSlot<B> {
    index: usize,
    buffer_id: Option<u64>,
    bound: Option<B>,
    rebuilds: u64,
}

impl<B> FrameSlot<B> {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            buffer_id: None,
            bound: None,
            rebuilds: 0,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// How many times encoder state was (re)built for this slot
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }

    /// Encode the frame currently held in `buffer`
    ///
    /// Encoder state is rebuilt when the source swapped the allocation
    /// behind this slot.
    pub fn encode<E>(&mut self, encoder: &E, buffer: &FrameBuffer) -> Result<Bytes>
    where
        E: ImageEncoder<Bound = B>,
    {
        if self.buffer_id != Some(buffer.buffer_id) {
            if self.bound.take().is_some() {
                tracing::debug!(
                    slot = self.index,
                    buffer_id = buffer.buffer_id,
                    "Slot buffer changed, rebuilding encoder"
                );
            }
            self.buffer_id = None;
        }

        let bound = match self.bound.take() {
            Some(bound) => bound,
            None => {
                let bound = encoder.bind(buffer)?;
                self.buffer_id = Some(buffer.buffer_id);
                self.rebuilds += 1;
                bound
            }
        };

        encoder.encode(self.bound.insert(bound), buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{Plane, Resolution};
    use std::cell::Cell;

    /// Counts binds; encodes as the buffer id
    struct CountingEncoder {
        binds: Cell<u32>,
    }

    impl ImageEncoder for CountingEncoder {
        type Bound = u64;

        fn bind(&self, buffer: &FrameBuffer) -> Result<u64> {
            self.binds.set(self.binds.get() + 1);
            Ok(buffer.buffer_id)
        }

        fn encode(&self, bound: &mut u64, _buffer: &FrameBuffer) -> Result<Bytes> {
            Ok(Bytes::from(bound.to_string()))
        }
    }

    fn buffer(id: u64) -> FrameBuffer {
        FrameBuffer {
            buffer_id: id,
            size: Resolution::new(4, 4),
            planes: vec![Plane { offset: 0, length: 0 }],
            data: Bytes::new(),
        }
    }

    #[test]
    fn test_encoder_built_once_per_buffer() {
        let encoder = CountingEncoder { binds: Cell::new(0) };
        let mut slot = FrameSlot::new(0);

        assert_eq!(slot.encode(&encoder, &buffer(7)).unwrap(), "7");
        assert_eq!(slot.encode(&encoder, &buffer(7)).unwrap(), "7");
        assert_eq!(encoder.binds.get(), 1);
        assert_eq!(slot.rebuilds(), 1);
    }

    #[test]
    fn test_encoder_rebuilt_on_new_buffer() {
        let encoder = CountingEncoder { binds: Cell::new(0) };
        let mut slot = FrameSlot::new(1);

        slot.encode(&encoder, &buffer(7)).unwrap();
        assert_eq!(slot.encode(&encoder, &buffer(9)).unwrap(), "9");
        assert_eq!(encoder.binds.get(), 2);
        assert_eq!(slot.rebuilds(), 2);
        assert_eq!(slot.index(), 1);
    }
}
