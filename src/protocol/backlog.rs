//! Per-source byte backlog with O(1) consume
//!
//! Fixed-capacity ring so a stalled consumer cannot grow memory without
//! bound. Consuming from the front advances a pointer instead of shifting
//! the remaining bytes.

/// Fixed-capacity byte accumulator
///
/// Generic const parameter `N` sets capacity. Bytes are appended at the
/// back and consumed from the front; within the backlog they are never
/// reordered or duplicated.
pub struct Backlog<const N: usize = 1024> {
    data: [u8; N],
    head: usize, // write position (next empty slot)
    tail: usize, // read position (first valid byte)
    len: usize,
    dropped: u64,
}

impl<const N: usize> Backlog<N> {
    /// Create a new empty backlog
    pub const fn new() -> Self {
        Self {
            data: [0u8; N],
            head: 0,
            tail: 0,
            len: 0,
            dropped: 0,
        }
    }

    /// Append bytes to the backlog
    ///
    /// Bytes that would overflow the capacity are dropped and counted;
    /// see [`Backlog::dropped`].
    #[inline]
    pub fn extend(&mut self, bytes: &[u8]) {
        for &b in bytes {
            if self.len < N {
                self.data[self.head] = b;
                self.head = (self.head + 1) % N;
                self.len += 1;
            } else {
                self.dropped += 1;
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

    /// Number of bytes available
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when no bytes are buffered
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Byte at logical index from the front (handles wraparound)
    #[inline]
    pub fn get(&self, index: usize) -> Option<u8> {
        if index < self.len {
            Some(self.data[(self.tail + index) % N])
        } else {
            None
        }
    }

    /// Total bytes dropped to overflow since creation
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl<const N: usize> Default for Backlog<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extend_and_get() {
        let mut b: Backlog<16> = Backlog::new();
        assert!(b.is_empty());

        b.extend(&[1, 2, 3, 4, 5]);
        assert_eq!(b.len(), 5);
        assert_eq!(b.get(0), Some(1));
        assert_eq!(b.get(4), Some(5));
        assert_eq!(b.get(5), None);
    }

    #[test]
    fn test_advance() {
        let mut b: Backlog<16> = Backlog::new();
        b.extend(&[1, 2, 3, 4, 5]);

        b.advance(2);
        assert_eq!(b.len(), 3);
        assert_eq!(b.get(0), Some(3));
    }

    #[test]
    fn test_wraparound_preserves_order() {
        let mut b: Backlog<8> = Backlog::new();
        b.extend(&[1, 2, 3, 4, 5, 6]);
        b.advance(5);
        b.extend(&[7, 8, 9]);

        assert_eq!(b.len(), 4);
        assert_eq!(b.get(0), Some(6));
        assert_eq!(b.get(1), Some(7));
        assert_eq!(b.get(2), Some(8));
        assert_eq!(b.get(3), Some(9));
    }

    #[test]
    fn test_overflow_drops_and_counts() {
        let mut b: Backlog<4> = Backlog::new();
        b.extend(&[1, 2, 3, 4, 5, 6]);

        assert_eq!(b.len(), 4);
        assert_eq!(b.dropped(), 2);
        // Oldest bytes are kept
        assert_eq!(b.get(0), Some(1));
        assert_eq!(b.get(3), Some(4));
    }
}
