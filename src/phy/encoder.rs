use std::fmt::Write as _;
use std::io::{self, Write};

use super::crc::Crc16;
use super::frame::{Frame, Payload};
use crate::utils::consts::FRAME_TERMINATOR;
use tracing::trace;

/// Firmware-side frame writer
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameEncoder {
    crc: Crc16,
}

impl FrameEncoder {
    pub fn new(crc: Crc16) -> Self {
        Self { crc }
    }

    /// Encode a frame into one CRLF terminated line.
    /// The CRC covers the native binary buffer, not the text.
    pub fn encode(&self, frame: &Frame) -> String {
        let crc = self.crc.checksum(&frame.payload.to_native_bytes());
        let mut line = String::with_capacity(frame.payload.len() * 7 + 16);

        let _ = write!(line, "{} {} ", frame.frame_type.tag(), frame.declared_length());
        match &frame.payload {
            Payload::Millimeters(values) => {
                for v in values {
                    let _ = write!(line, "{} ", v);
                }
            }
            Payload::Celsius(values) => {
                for v in values {
                    let _ = write!(line, "{:.2} ", v);
                }
            }
        }
        let _ = write!(line, "{:04X} {}\r\n", crc, FRAME_TERMINATOR);

        trace!(
            "Encoded {:?}: {} samples, crc={:04X}, {} bytes",
            frame.frame_type,
            frame.payload.len(),
            crc,
            line.len()
        );
        line
    }

    /// Encode and write a frame to the transmit stream
    pub fn write_frame<W: Write>(&self, out: &mut W, frame: &Frame) -> io::Result<()> {
        out.write_all(self.encode(frame).as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phy::FrameType;
    use crate::phy::crc::calculate_crc16;

    #[test]
    fn test_encode_distance_layout() {
        let encoder = FrameEncoder::default();
        let samples: Vec<i16> = (1..=64).map(|i| i * 10).collect();
        let frame = Frame::distance(FrameType::Distance1, samples.clone());
        let line = encoder.encode(&frame);

        assert!(line.starts_with("X 134 10 20 30 "));
        assert!(line.ends_with(" Y\r\n"));

        let tokens: Vec<&str> = line.trim_end().split(' ').collect();
        assert_eq!(tokens.len(), 68);
        assert_eq!(tokens[65], "640");

        let expected = calculate_crc16(&frame.payload.to_native_bytes());
        assert_eq!(tokens[66], format!("{:04X}", expected));
        assert_eq!(tokens[66], "6B49");
    }

    #[test]
    fn test_encode_thermal_two_decimals() {
        let encoder = FrameEncoder::default();
        let frame = Frame::thermal(FrameType::ThermalA, vec![21.5; 64]);
        let line = encoder.encode(&frame);

        assert!(line.starts_with("P 262 21.50 21.50 "));
        let tokens: Vec<&str> = line.trim_end().split(' ').collect();
        assert_eq!(tokens.len(), 68);
        assert_eq!(tokens[66], "3816");
    }

    #[test]
    fn test_crc_is_four_uppercase_hex_digits() {
        let encoder = FrameEncoder::default();
        let frame = Frame::distance(FrameType::Distance2, vec![0; 64]);
        let line = encoder.encode(&frame);
        assert!(line.ends_with(" 0000 Y\r\n"));
    }

    #[test]
    fn test_write_frame() {
        let encoder = FrameEncoder::default();
        let frame = Frame::thermal(FrameType::ThermalB, vec![0.25; 768]);
        let mut out = Vec::new();
        encoder.write_frame(&mut out, &frame).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("L 3078 0.25 "));
        assert_eq!(text.matches('\n').count(), 1);
    }
}
