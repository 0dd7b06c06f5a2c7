//! Response frame reassembly
//!
//! The sensor emits an undelimited stream of 4-byte response frames; the
//! only framing signal is that every response byte carries bit7 set. The
//! reassembler buffers arbitrary chunks and extracts frames at the fixed
//! 4-byte boundary.
//!
//! Because there is no sync word, a single lost byte would shift every
//! later frame boundary. When the leading 4 bytes fail the bit7 check the
//! reassembler therefore advances one byte at a time until four
//! consecutive bit7-set bytes line up again, rather than discarding a
//! whole block.

use super::backlog::Backlog;

/// Response frame size in bytes
pub const FRAME_SIZE: usize = 4;

/// One candidate 4-byte response frame
///
/// Constructing a frame does not validate it; `is_valid` checks the bit7
/// invariant. Invalid frames are a normal occurrence while the stream is
/// resynchronizing, not a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolFrame([u8; FRAME_SIZE]);

impl ProtocolFrame {
    /// Wrap raw bytes as a candidate frame
    pub const fn new(bytes: [u8; FRAME_SIZE]) -> Self {
        ProtocolFrame(bytes)
    }

    /// True when every byte has bit7 set (protocol invariant)
    pub fn is_valid(&self) -> bool {
        self.0.iter().all(|b| b & 0x80 != 0)
    }

    /// Nibble-packed 16-bit raw value
    ///
    /// Each byte contributes its low nibble: d0..d3 from bytes 0..3,
    /// raw = ((d3<<4 | d2) << 8) | (d1<<4 | d0).
    pub fn raw_value(&self) -> u16 {
        let d0 = (self.0[0] & 0x0F) as u16;
        let d1 = (self.0[1] & 0x0F) as u16;
        let d2 = (self.0[2] & 0x0F) as u16;
        let d3 = (self.0[3] & 0x0F) as u16;
        (((d3 << 4) | d2) << 8) | ((d1 << 4) | d0)
    }

    /// Raw frame bytes
    pub fn bytes(&self) -> [u8; FRAME_SIZE] {
        self.0
    }
}

/// Backlog capacity. Must hold a full poll-cycle read (1024 bytes) plus
/// a pending partial frame, or a large read would overflow the backlog
/// and drop valid bytes.
const BACKLOG_CAPACITY: usize = 2048;

/// Chunk-boundary-agnostic frame extractor
///
/// Holds one backlog per source. Bytes fed in are never reordered,
/// duplicated, or split mid-frame; the only bytes ever skipped are single
/// resynchronization steps, which are counted.
pub struct FrameReassembler {
    backlog: Backlog<BACKLOG_CAPACITY>,
    resynced: u64,
}

impl FrameReassembler {
    pub fn new() -> Self {
        FrameReassembler {
            backlog: Backlog::new(),
            resynced: 0,
        }
    }

    /// Append a chunk of incoming bytes
    ///
    /// Chunk boundaries are invisible: feeding a frame one byte at a time
    /// yields the same frames as feeding it whole.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.backlog.extend(bytes);
    }

    /// Extract the next complete frame, if any
    ///
    /// Returns frames whose four bytes all pass the bit7 check; leading
    /// bytes that cannot start such a frame are consumed one at a time
    /// (resynchronization). State persists across calls.
    pub fn next_frame(&mut self) -> Option<ProtocolFrame> {
        while self.backlog.len() >= FRAME_SIZE {
            let candidate = ProtocolFrame::new([
                self.backlog.get(0)?,
                self.backlog.get(1)?,
                self.backlog.get(2)?,
                self.backlog.get(3)?,
            ]);
            if candidate.is_valid() {
                self.backlog.advance(FRAME_SIZE);
                return Some(candidate);
            }
            self.backlog.advance(1);
            self.resynced += 1;
        }
        None
    }

    /// Bytes buffered but not yet assembled into a frame
    pub fn pending(&self) -> usize {
        self.backlog.len()
    }

    /// Bytes skipped while resynchronizing since creation
    pub fn resynced_bytes(&self) -> u64 {
        self.resynced
    }

    /// Bytes dropped to backlog overflow since creation
    pub fn dropped_bytes(&self) -> u64 {
        self.backlog.dropped()
    }
}

impl Default for FrameReassembler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME_A: [u8; 4] = [0x81, 0x82, 0x83, 0x84];
    const FRAME_B: [u8; 4] = [0x8F, 0x8F, 0x8F, 0x83];

    #[test]
    fn test_whole_frame() {
        let mut r = FrameReassembler::new();
        r.feed(&FRAME_A);

        assert_eq!(r.next_frame(), Some(ProtocolFrame::new(FRAME_A)));
        assert_eq!(r.next_frame(), None);
        assert_eq!(r.pending(), 0);
    }

    #[test]
    fn test_chunk_boundaries_are_invisible() {
        let mut stream = Vec::new();
        stream.extend_from_slice(&FRAME_A);
        stream.extend_from_slice(&FRAME_B);

        // 1-byte, 2-byte, and all-at-once feeds must agree
        for chunk_size in [1usize, 2, 8] {
            let mut r = FrameReassembler::new();
            let mut frames = Vec::new();
            for chunk in stream.chunks(chunk_size) {
                r.feed(chunk);
                while let Some(f) = r.next_frame() {
                    frames.push(f);
                }
            }
            assert_eq!(
                frames,
                vec![ProtocolFrame::new(FRAME_A), ProtocolFrame::new(FRAME_B)],
                "chunk_size={}",
                chunk_size
            );
        }
    }

    #[test]
    fn test_partial_frame_held_back() {
        let mut r = FrameReassembler::new();
        r.feed(&FRAME_A[..3]);
        assert_eq!(r.next_frame(), None);
        assert_eq!(r.pending(), 3);

        r.feed(&FRAME_A[3..]);
        assert_eq!(r.next_frame(), Some(ProtocolFrame::new(FRAME_A)));
    }

    #[test]
    fn test_resync_one_byte_at_a_time() {
        // A lost byte shifts the boundary: [x81 x82 x83] x84 ...
        // The reassembler must skip exactly the 3 orphan bytes, not a
        // whole 4-byte block, so FRAME_B survives.
        let mut r = FrameReassembler::new();
        r.feed(&[0x81, 0x82, 0x03]); // 0x03 breaks the bit7 run
        r.feed(&FRAME_B);

        assert_eq!(r.next_frame(), Some(ProtocolFrame::new(FRAME_B)));
        assert_eq!(r.resynced_bytes(), 3);
    }

    #[test]
    fn test_no_bytes_lost_across_calls() {
        let mut r = FrameReassembler::new();
        r.feed(&[0x81]);
        r.feed(&[0x82]);
        r.feed(&[0x83]);
        assert_eq!(r.next_frame(), None);
        r.feed(&[0x84, 0x8F]);

        assert_eq!(r.next_frame(), Some(ProtocolFrame::new(FRAME_A)));
        assert_eq!(r.pending(), 1);
        assert_eq!(r.resynced_bytes(), 0);
    }

    #[test]
    fn test_full_read_chunk_with_pending_partial() {
        // A partial frame left over from the previous poll cycle must not
        // make a subsequent full-sized read overflow the backlog.
        let mut r = FrameReassembler::new();
        r.feed(&FRAME_A[..3]);

        let mut chunk = vec![FRAME_A[3]];
        for _ in 0..255 {
            chunk.extend_from_slice(&FRAME_B);
        }
        chunk.extend_from_slice(&FRAME_A[..3]);
        assert_eq!(chunk.len(), 1024);
        r.feed(&chunk);

        let mut frames = Vec::new();
        while let Some(f) = r.next_frame() {
            frames.push(f);
        }

        assert_eq!(r.dropped_bytes(), 0);
        assert_eq!(frames.len(), 256);
        assert_eq!(frames[0], ProtocolFrame::new(FRAME_A));
        assert_eq!(frames[255], ProtocolFrame::new(FRAME_B));
        assert_eq!(r.pending(), 3);
    }

    #[test]
    fn test_raw_value_nibble_packing() {
        let f = ProtocolFrame::new([0x81, 0x82, 0x83, 0x84]);
        // d0=1 d1=2 d2=3 d3=4 -> low=0x21, high=0x43 -> 0x4321
        assert_eq!(f.raw_value(), 0x4321);
    }

    #[test]
    fn test_validity() {
        assert!(ProtocolFrame::new([0x80, 0xFF, 0x81, 0x8A]).is_valid());
        assert!(!ProtocolFrame::new([0x80, 0x7F, 0x81, 0x8A]).is_valid());
    }
}
