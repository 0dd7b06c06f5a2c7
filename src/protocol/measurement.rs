//! Distance decoding for response frames
//!
//! The datasheet formula is X = D * S / 4000h, where D is the 16-bit raw
//! value packed into the frame's nibbles and S the sensor's measuring
//! range in millimetres.

use super::frame::ProtocolFrame;
use std::time::SystemTime;

/// Full-scale raw value (4000h) from the datasheet formula
pub const FULL_SCALE: u16 = 0x4000;

/// One decoded measurement
///
/// Created only from a valid frame; carries the raw bytes alongside the
/// physical value so sinks can persist both.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurementSample {
    pub captured_at: SystemTime,
    pub raw_frame: [u8; 4],
    pub distance_mm: f64,
}

/// Frame-to-distance converter for one sensor range
#[derive(Debug, Clone, Copy)]
pub struct MeasurementDecoder {
    range_mm: f64,
}

impl MeasurementDecoder {
    pub fn new(range_mm: f64) -> Self {
        MeasurementDecoder { range_mm }
    }

    /// Configured measuring range in millimetres
    pub fn range_mm(&self) -> f64 {
        self.range_mm
    }

    /// Decode a frame into millimetres
    ///
    /// Returns None when the bit7 invariant is violated; invalid frames
    /// are expected while the stream resynchronizes and are not an error.
    /// Values outside the nominal 0..range band are returned unclamped —
    /// silently discarding them would conceal a resynchronization failure.
    pub fn decode(&self, frame: &ProtocolFrame) -> Option<f64> {
        if !frame.is_valid() {
            return None;
        }
        Some(frame.raw_value() as f64 * self.range_mm / FULL_SCALE as f64)
    }

    /// Decode a frame into a timestamped sample
    pub fn sample(&self, frame: &ProtocolFrame) -> Option<MeasurementSample> {
        let distance_mm = self.decode(frame)?;
        Some(MeasurementSample {
            captured_at: SystemTime::now(),
            raw_frame: frame.bytes(),
            distance_mm,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datasheet_example() {
        // d0=1 d1=2 d2=3 d3=4 -> raw = 0x4321 = 17185
        // 17185 * 250 / 16384 ~= 262.2 mm: above the nominal range and
        // still returned (no clamping).
        let decoder = MeasurementDecoder::new(250.0);
        let frame = ProtocolFrame::new([0x81, 0x82, 0x83, 0x84]);

        let mm = decoder.decode(&frame).unwrap();
        assert_eq!(mm, 17185.0 * 250.0 / 16384.0);
        assert!(mm > 250.0);
    }

    #[test]
    fn test_exact_scaling() {
        let decoder = MeasurementDecoder::new(250.0);
        // raw = 0 -> 0 mm
        assert_eq!(
            decoder.decode(&ProtocolFrame::new([0x80, 0x80, 0x80, 0x80])),
            Some(0.0)
        );
        // raw = 0x3FFF (all nibbles F except d3=3) -> just under full range
        let frame = ProtocolFrame::new([0x8F, 0x8F, 0x8F, 0x83]);
        assert_eq!(frame.raw_value(), 0x3FFF);
        let mm = decoder.decode(&frame).unwrap();
        assert_eq!(mm, 0x3FFF as f64 * 250.0 / 16384.0);
    }

    #[test]
    fn test_invalid_frame_is_none_not_error() {
        let decoder = MeasurementDecoder::new(250.0);
        let frame = ProtocolFrame::new([0x81, 0x02, 0x83, 0x84]);
        assert_eq!(decoder.decode(&frame), None);
        assert!(decoder.sample(&frame).is_none());
    }

    #[test]
    fn test_sample_keeps_raw_bytes() {
        let decoder = MeasurementDecoder::new(100.0);
        let frame = ProtocolFrame::new([0x85, 0x80, 0x80, 0x80]);
        let sample = decoder.sample(&frame).unwrap();

        assert_eq!(sample.raw_frame, [0x85, 0x80, 0x80, 0x80]);
        assert_eq!(sample.distance_mm, 5.0 * 100.0 / 16384.0);
    }
}
