// Frame format: <Type> <Len> <s0> ... <s(n-1)> <CRC4HEX> Y\r\n

use byteorder::{LittleEndian, WriteBytesExt};
use serde::Serialize;

use crate::utils::consts::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FrameType {
    Distance1,
    Distance2,
    ThermalA,
    ThermalB,
}

/// How samples of a frame type are represented on the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    Millimeters,
    Celsius,
}

impl FrameType {
    pub const ALL: [FrameType; 4] = [
        FrameType::Distance1,
        FrameType::Distance2,
        FrameType::ThermalA,
        FrameType::ThermalB,
    ];

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "X" => Some(FrameType::Distance1),
            "Z" => Some(FrameType::Distance2),
            "P" => Some(FrameType::ThermalA),
            "L" => Some(FrameType::ThermalB),
            _ => None,
        }
    }

    pub fn tag(self) -> char {
        match self {
            FrameType::Distance1 => 'X',
            FrameType::Distance2 => 'Z',
            FrameType::ThermalA => 'P',
            FrameType::ThermalB => 'L',
        }
    }

    pub fn sample_count(self) -> usize {
        match self {
            FrameType::Distance1 | FrameType::Distance2 => DISTANCE_ZONES,
            FrameType::ThermalA => AMG_PIXELS,
            FrameType::ThermalB => MLX_PIXELS,
        }
    }

    pub fn sample_kind(self) -> SampleKind {
        match self {
            FrameType::Distance1 | FrameType::Distance2 => SampleKind::Millimeters,
            FrameType::ThermalA | FrameType::ThermalB => SampleKind::Celsius,
        }
    }

    /// Width of one sample in the device's native buffer
    pub fn sample_width(self) -> usize {
        match self.sample_kind() {
            SampleKind::Millimeters => size_of::<i16>(),
            SampleKind::Celsius => size_of::<f32>(),
        }
    }

    /// Value of the length field the firmware emits for this type
    pub fn declared_length(self) -> usize {
        self.sample_count() * self.sample_width() + FRAME_LENGTH_OVERHEAD
    }

    /// Token count of a complete line of this type
    pub fn token_count(self) -> usize {
        self.sample_count() + FRAME_FIXED_TOKENS
    }

    /// Printed grid width
    pub fn grid_width(self) -> usize {
        match self {
            FrameType::ThermalB => LARGE_GRID_WIDTH,
            _ => SMALL_GRID_WIDTH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Millimeters(Vec<i16>),
    Celsius(Vec<f32>),
}

impl Payload {
    pub fn len(&self) -> usize {
        match self {
            Payload::Millimeters(v) => v.len(),
            Payload::Celsius(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Native little-endian layout of the sample buffer, as the firmware
    /// hands it to the CRC
    pub fn to_native_bytes(&self) -> Vec<u8> {
        match self {
            Payload::Millimeters(values) => {
                let mut bytes = Vec::with_capacity(values.len() * 2);
                for &v in values {
                    // Writing into a Vec cannot fail
                    let _ = bytes.write_i16::<LittleEndian>(v);
                }
                bytes
            }
            Payload::Celsius(values) => {
                let mut bytes = Vec::with_capacity(values.len() * 4);
                for &v in values {
                    let _ = bytes.write_f32::<LittleEndian>(v);
                }
                bytes
            }
        }
    }

    /// Values widened to f64, for statistics and logging
    pub fn as_f64(&self) -> Vec<f64> {
        match self {
            Payload::Millimeters(v) => v.iter().map(|&x| x as f64).collect(),
            Payload::Celsius(v) => v.iter().map(|&x| x as f64).collect(),
        }
    }
}

/// One frame as produced by a sensor read
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub frame_type: FrameType,
    pub payload: Payload,
}

impl Frame {
    pub fn distance(frame_type: FrameType, samples: Vec<i16>) -> Self {
        debug_assert_eq!(frame_type.sample_kind(), SampleKind::Millimeters);
        Self {
            frame_type,
            payload: Payload::Millimeters(samples),
        }
    }

    pub fn thermal(frame_type: FrameType, samples: Vec<f32>) -> Self {
        debug_assert_eq!(frame_type.sample_kind(), SampleKind::Celsius);
        Self {
            frame_type,
            payload: Payload::Celsius(samples),
        }
    }

    pub fn declared_length(&self) -> usize {
        self.payload.len() * self.frame_type.sample_width() + FRAME_LENGTH_OVERHEAD
    }
}

/// Parse a token the way the host parses unsigned integers: anything that
/// is not a plain unsigned decimal yields 0, the result is cut to 16 bits.
pub fn parse_token_u16(token: &str) -> u16 {
    token.trim().parse::<u32>().unwrap_or(0) as u16
}

/// Host-side CRC input: each token parsed with `parse_token_u16` and
/// packed little-endian
pub fn pack_tokens<'a>(tokens: impl IntoIterator<Item = &'a str>) -> Vec<u8> {
    let mut bytes = Vec::new();
    for token in tokens {
        let _ = bytes.write_u16::<LittleEndian>(parse_token_u16(token));
    }
    bytes
}
