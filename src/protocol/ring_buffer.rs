//! Fixed-capacity byte ring for the incremental frame parser
//!
//! Consuming from the front is O(1) pointer arithmetic rather than a
//! `Vec::drain` shift, which matters when resynchronization discards one
//! byte at a time through garbage.

use super::frame::MAX_FRAME_SIZE;

/// Staging area for slice access that spans the wraparound point.
/// Must hold at least one maximum-size frame.
const STAGING_SIZE: usize = 2 * MAX_FRAME_SIZE;

/// Byte ring with O(1) front consumption
///
/// Const parameter `N` sets the capacity. Bytes that would overflow the
/// capacity are dropped; the checksum on the mangled frame then fails and
/// the parser resynchronizes.
pub struct RingBuffer<const N: usize> {
    data: [u8; N],
    head: usize, // Write position (next empty slot)
    tail: usize, // Read position (first valid byte)
    len: usize,
    staging: [u8; STAGING_SIZE],
}

impl<const N: usize> RingBuffer<N> {
    pub const fn new() -> Self {
        Self {
            data: [0u8; N],
            head: 0,
            tail: 0,
            len: 0,
            staging: [0u8; STAGING_SIZE],
        }
    }

    /// Append bytes, dropping any that exceed capacity
    #[inline]
    pub fn extend(&mut self, bytes: &[u8]) {
        for &b in bytes {
            if self.len < N {
                self.data[self.head] = b;
                self.head = (self.head + 1) % N;
                self.len += 1;
            }
        }
    }

    /// Consume n bytes from the front
    #[inline]
    pub fn advance(&mut self, n: usize) {
        let n = n.min(self.len);
        self.tail = (self.tail + n) % N;
        self.len -= n;
    }

    /// Number of bytes available to read
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Read byte at logical index from the front (handles wraparound)
    #[inline]
    pub fn get(&self, index: usize) -> Option<u8> {
        if index < self.len {
            Some(self.data[(self.tail + index) % N])
        } else {
            None
        }
    }

    /// Find the first occurrence of a 2-byte pattern, as an offset from the front
    pub fn find_pair(&self, b1: u8, b2: u8) -> Option<usize> {
        if self.len < 2 {
            return None;
        }
        (0..self.len - 1).find(|&i| {
            self.data[(self.tail + i) % N] == b1 && self.data[(self.tail + i + 1) % N] == b2
        })
    }

    /// Get a contiguous view of `len` bytes starting at logical `start`
    ///
    /// Returns a slice into the main buffer when the range is contiguous,
    /// or into the staging buffer when it spans the wraparound point.
    /// Ranges longer than the staging buffer are refused.
    pub fn get_slice(&mut self, start: usize, len: usize) -> Option<&[u8]> {
        if start + len > self.len || len > STAGING_SIZE {
            return None;
        }

        let real_start = (self.tail + start) % N;

        if real_start + len <= N {
            Some(&self.data[real_start..real_start + len])
        } else {
            for i in 0..len {
                self.staging[i] = self.data[(real_start + i) % N];
            }
            Some(&self.staging[..len])
        }
    }
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_operations() {
        let mut rb: RingBuffer<16> = RingBuffer::new();
        assert_eq!(rb.len(), 0);

        rb.extend(&[1, 2, 3, 4, 5]);
        assert_eq!(rb.len(), 5);
        assert_eq!(rb.get(0), Some(1));
        assert_eq!(rb.get(4), Some(5));
        assert_eq!(rb.get(5), None);
    }

    #[test]
    fn test_advance() {
        let mut rb: RingBuffer<16> = RingBuffer::new();
        rb.extend(&[1, 2, 3, 4, 5]);

        rb.advance(2);
        assert_eq!(rb.len(), 3);
        assert_eq!(rb.get(0), Some(3));
        assert_eq!(rb.get(2), Some(5));
    }

    #[test]
    fn test_overflow_drops_excess() {
        let mut rb: RingBuffer<4> = RingBuffer::new();
        rb.extend(&[1, 2, 3, 4, 5, 6]);
        assert_eq!(rb.len(), 4);
        assert_eq!(rb.get(3), Some(4));
    }

    #[test]
    fn test_wraparound() {
        let mut rb: RingBuffer<8> = RingBuffer::new();

        rb.extend(&[1, 2, 3, 4, 5]);
        rb.advance(3);
        assert_eq!(rb.len(), 2);
        assert_eq!(rb.get(0), Some(4));

        rb.extend(&[6, 7, 8, 9]);
        assert_eq!(rb.len(), 6);
        assert_eq!(rb.get(0), Some(4));
        assert_eq!(rb.get(2), Some(6));
        assert_eq!(rb.get(5), Some(9));
    }

    #[test]
    fn test_find_pair() {
        let mut rb: RingBuffer<32> = RingBuffer::new();
        rb.extend(&[0x00, 0xFF, 0xA5, 0x5A, 0x01, 0x02]);

        assert_eq!(rb.find_pair(0xA5, 0x5A), Some(2));
        assert_eq!(rb.find_pair(0x00, 0xFF), Some(0));
        assert_eq!(rb.find_pair(0xAA, 0xBB), None);
    }

    #[test]
    fn test_find_pair_across_wraparound() {
        let mut rb: RingBuffer<8> = RingBuffer::new();
        rb.extend(&[0, 0, 0, 0, 0, 0, 0]);
        rb.advance(7); // tail near the end
        rb.extend(&[0xA5, 0x5A, 0x01]); // pattern spans the wrap point
        assert_eq!(rb.find_pair(0xA5, 0x5A), Some(0));
    }

    #[test]
    fn test_get_slice_contiguous() {
        let mut rb: RingBuffer<32> = RingBuffer::new();
        rb.extend(&[0xA5, 0x5A, 0x03, 0x06, 0x00, 0x06]);

        let slice = rb.get_slice(2, 2).unwrap();
        assert_eq!(slice, &[0x03, 0x06]);
    }

    #[test]
    fn test_get_slice_wrapped() {
        let mut rb: RingBuffer<8> = RingBuffer::new();

        rb.extend(&[1, 2, 3, 4, 5, 6]);
        rb.advance(5); // tail=5
        rb.extend(&[7, 8, 9]); // head wraps

        // Logical view: [6, 7, 8, 9]
        assert_eq!(rb.len(), 4);

        let slice = rb.get_slice(0, 4).unwrap();
        assert_eq!(slice, &[6, 7, 8, 9]);
    }

    #[test]
    fn test_get_slice_out_of_range() {
        let mut rb: RingBuffer<16> = RingBuffer::new();
        rb.extend(&[1, 2, 3]);
        assert!(rb.get_slice(0, 4).is_none());
        assert!(rb.get_slice(2, 2).is_none());
    }
}
