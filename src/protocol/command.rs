//! RF60x command frames
//!
//! Request format (2 bytes):
//! - byte0 = device address, bit7 always 0
//! - byte1 = bit7 always 1, low nibble = command code
//!
//! Known codes: 06h single measurement, 07h start stream, 08h stop stream.

use crate::error::{Error, Result};

/// Request one measurement (code 06h)
pub const CODE_SINGLE_MEASUREMENT: u8 = 0x06;
/// Start the measurement stream (code 07h)
pub const CODE_START_STREAM: u8 = 0x07;
/// Stop the measurement stream (code 08h)
pub const CODE_STOP_STREAM: u8 = 0x08;

/// Highest addressable device
pub const MAX_ADDRESS: u8 = 0x7F;
/// Highest command code
pub const MAX_CODE: u8 = 0x0F;

/// Two-byte command frame addressed to one sensor
///
/// Immutable value; construction validates both fields, encoding cannot
/// fail afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandFrame {
    address: u8,
    code: u8,
}

impl CommandFrame {
    /// Build a command frame, rejecting out-of-range fields.
    ///
    /// Values are never clamped: an address above 127 or a code above 15
    /// is a programmer error and fails fast.
    pub fn new(address: u8, code: u8) -> Result<Self> {
        if address > MAX_ADDRESS {
            return Err(Error::InvalidAddress(address));
        }
        if code > MAX_CODE {
            return Err(Error::InvalidCode(code));
        }
        Ok(CommandFrame { address, code })
    }

    /// Single measurement request (06h)
    pub fn single_measurement(address: u8) -> Result<Self> {
        Self::new(address, CODE_SINGLE_MEASUREMENT)
    }

    /// Start-stream request (07h)
    pub fn start_stream(address: u8) -> Result<Self> {
        Self::new(address, CODE_START_STREAM)
    }

    /// Stop-stream request (08h)
    pub fn stop_stream(address: u8) -> Result<Self> {
        Self::new(address, CODE_STOP_STREAM)
    }

    /// Encode to wire bytes: [address, 0x80 | code]
    pub fn encode(&self) -> [u8; 2] {
        [self.address, 0x80 | self.code]
    }

    /// Decode wire bytes back into a command frame
    ///
    /// Returns None when the bit7 pattern does not match a command frame
    /// (byte0 must have bit7 clear, byte1 must have it set).
    pub fn decode(bytes: [u8; 2]) -> Option<Self> {
        if bytes[0] & 0x80 != 0 || bytes[1] & 0x80 == 0 {
            return None;
        }
        Some(CommandFrame {
            address: bytes[0],
            code: bytes[1] & MAX_CODE,
        })
    }

    /// Device address
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Command code
    pub fn code(&self) -> u8 {
        self.code
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_stream_encoding() {
        let cmd = CommandFrame::start_stream(1).unwrap();
        assert_eq!(cmd.encode(), [0x01, 0x87]);
    }

    #[test]
    fn test_known_codes() {
        assert_eq!(
            CommandFrame::single_measurement(1).unwrap().encode(),
            [0x01, 0x86]
        );
        assert_eq!(CommandFrame::stop_stream(1).unwrap().encode(), [0x01, 0x88]);
    }

    #[test]
    fn test_round_trip_all_values() {
        for address in 0..=MAX_ADDRESS {
            for code in 0..=MAX_CODE {
                let cmd = CommandFrame::new(address, code).unwrap();
                let decoded = CommandFrame::decode(cmd.encode()).unwrap();
                assert_eq!(decoded.address(), address);
                assert_eq!(decoded.code(), code);
            }
        }
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert!(matches!(
            CommandFrame::new(128, 0x07),
            Err(Error::InvalidAddress(128))
        ));
        assert!(matches!(
            CommandFrame::new(1, 0x10),
            Err(Error::InvalidCode(0x10))
        ));
    }

    #[test]
    fn test_decode_rejects_bad_bit7_pattern() {
        // byte0 with bit7 set is not a command frame
        assert!(CommandFrame::decode([0x81, 0x87]).is_none());
        // byte1 without bit7 set is not a command frame
        assert!(CommandFrame::decode([0x01, 0x07]).is_none());
    }
}
