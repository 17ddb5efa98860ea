// Wire layer shared by firmware and host
// One ASCII line per frame, CRC-16 protected

pub mod crc;
pub mod decoder;
pub mod encoder;
pub mod frame;

pub use crc::Crc16;
pub use decoder::{CrcCheck, DecodedFrame, DecoderStats, FrameDecoder, FrameReport};
pub use encoder::FrameEncoder;
pub use frame::{Frame, FrameType, Payload, SampleKind};
