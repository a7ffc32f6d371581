//! Fixed-capacity circular byte store
//!
//! ```text
//!   0        start            end          capacity
//!   |  free  |#### buffered ####|   free   |
//! ```
//!
//! One slot is always left unused so that `start == end` can only mean
//! "empty". The buffer knows nothing about I/O: callers fill the free region,
//! drain the data region, and report how much moved.

/// Circular byte buffer with one reserved slot
#[derive(Debug)]
pub struct RingBuffer {
    buf: Box<[u8]>,
    start: usize,
    end: usize,
}

impl RingBuffer {
    /// Create a buffer of `capacity` bytes (usable: `capacity - 1`)
    ///
    /// # Panics
    ///
    /// Panics if `capacity < 2`.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity >= 2, "ring buffer needs at least two slots");
        Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            start: 0,
            end: 0,
        }
    }

    /// Total size of the circular region
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Bytes currently buffered
    pub fn used(&self) -> usize {
        let cap = self.capacity();
        (self.end + cap - self.start) % cap
    }

    /// Bytes that can still be buffered
    pub fn free(&self) -> usize {
        self.capacity() - self.used() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn has_free(&self) -> bool {
        (self.end + 1) % self.capacity() != self.start
    }

    /// Contiguous free region following `end`
    pub fn free_region_mut(&mut self) -> &mut [u8] {
        let (lo, hi) = self.free_bounds();
        &mut self.buf[lo..hi]
    }

    /// Contiguous buffered region starting at `start`
    pub fn data_region(&self) -> &[u8] {
        let (lo, hi) = self.data_bounds();
        &self.buf[lo..hi]
    }

    /// Both regions at once: `(free, data)`
    ///
    /// The two never overlap, so a read into the free region and a write
    /// from the data region can be in flight together.
    pub fn regions_mut(&mut self) -> (&mut [u8], &[u8]) {
        let (free_lo, free_hi) = self.free_bounds();
        let (data_lo, data_hi) = self.data_bounds();

        if free_lo >= data_hi {
            let (left, right) = self.buf.split_at_mut(free_lo);
            (&mut right[..free_hi - free_lo], &left[data_lo..data_hi])
        } else {
            let (left, right) = self.buf.split_at_mut(data_lo);
            (&mut left[free_lo..free_hi], &right[..data_hi - data_lo])
        }
    }

    /// Record `n` bytes written into the free region
    pub fn commit(&mut self, n: usize) {
        debug_assert!(n <= self.free_bounds().1 - self.free_bounds().0);
        self.end = (self.end + n) % self.capacity();
    }

    /// Record `n` bytes drained from the data region
    pub fn consume(&mut self, n: usize) {
        debug_assert!(n <= self.data_region().len());
        self.start = (self.start + n) % self.capacity();
        if self.start == self.end {
            // Rewind so the next fill gets the whole buffer as one region
            self.start = 0;
            self.end = 0;
        }
    }

    fn free_bounds(&self) -> (usize, usize) {
        let cap = self.capacity();
        if self.end >= self.start {
            let hi = if self.start == 0 { cap - 1 } else { cap };
            (self.end, hi)
        } else {
            (self.end, self.start - 1)
        }
    }

    fn data_bounds(&self) -> (usize, usize) {
        if self.start <= self.end {
            (self.start, self.end)
        } else {
            (self.start, self.capacity())
        }
    }
}
