//! RF60x wire protocol
//!
//! Two frame shapes:
//! - Command: 2 bytes, [address (bit7=0), 0x80 | code]
//! - Response: 4 bytes, every byte bit7=1, low nibbles pack a 16-bit raw
//!   distance value
//!
//! The stream carries no delimiters; `FrameReassembler` recovers the
//! 4-byte boundaries from arbitrary read chunks.

mod backlog;
mod command;
mod frame;
mod measurement;

pub use command::{
    CommandFrame, CODE_SINGLE_MEASUREMENT, CODE_START_STREAM, CODE_STOP_STREAM, MAX_ADDRESS,
    MAX_CODE,
};
pub use frame::{FrameReassembler, ProtocolFrame, FRAME_SIZE};
pub use measurement::{MeasurementDecoder, MeasurementSample, FULL_SCALE};
