use serde::Serialize;
use tracing::{debug, trace, warn};

use super::crc::Crc16;
use super::frame::{FrameType, Payload, SampleKind, pack_tokens};
use crate::error::FrameError;
use crate::host::SensorReadings;
use crate::utils::consts::MAX_LINE_BYTES;

/// Received CRC next to the one recomputed from the payload tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CrcCheck {
    pub received: u16,
    pub computed: u16,
}

impl CrcCheck {
    pub fn is_valid(&self) -> bool {
        self.received == self.computed
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedFrame {
    pub frame_type: FrameType,
    pub declared_length: usize,
    /// Samples in wire order
    pub payload: Payload,
    pub crc: CrcCheck,
}

impl DecodedFrame {
    pub fn is_valid(&self) -> bool {
        self.crc.is_valid()
    }
}

/// What happened to one complete frame line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameReport {
    pub frame_type: FrameType,
    pub crc_valid: bool,
    pub dispatched: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DecoderStats {
    pub valid: u64,
    pub invalid: u64,
    pub unknown: u64,
    pub malformed: u64,
    pub overflowed: u64,
}

impl DecoderStats {
    pub fn frames(&self) -> u64 {
        self.valid + self.invalid
    }
}

/// Host-side line accumulator, parser and validator
pub struct FrameDecoder {
    crc: Crc16,
    dispatch_regardless_of_crc: bool,
    accumulator: Vec<u8>,
    stats: DecoderStats,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(Crc16::default())
    }
}

impl FrameDecoder {
    pub fn new(crc: Crc16) -> Self {
        Self {
            crc,
            dispatch_regardless_of_crc: true,
            accumulator: Vec::new(),
            stats: DecoderStats::default(),
        }
    }

    /// When false, frames failing the CRC check are not dispatched
    pub fn with_dispatch_regardless_of_crc(mut self, enabled: bool) -> Self {
        self.dispatch_regardless_of_crc = enabled;
        self
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Bytes of an unfinished line still waiting for its terminator
    pub fn pending(&self) -> usize {
        self.accumulator.len()
    }

    // entry point for raw serial chunks
    pub fn push_bytes(&mut self, chunk: &[u8]) -> Vec<Result<DecodedFrame, FrameError>> {
        self.accumulator.extend_from_slice(chunk);

        let mut results = Vec::new();
        while let Some(end) = self.accumulator.iter().position(|&b| b == b'\n') {
            let line_bytes: Vec<u8> = self.accumulator.drain(..=end).collect();
            let line = String::from_utf8_lossy(&line_bytes);

            match self.decode_line(&line) {
                Err(FrameError::Empty) => {}
                Ok(frame) => {
                    if frame.is_valid() {
                        self.stats.valid += 1;
                    } else {
                        self.stats.invalid += 1;
                    }
                    results.push(Ok(frame));
                }
                Err(err) => {
                    match err {
                        FrameError::UnknownType(_) => self.stats.unknown += 1,
                        _ => self.stats.malformed += 1,
                    }
                    results.push(Err(err));
                }
            }
        }

        if self.accumulator.len() > MAX_LINE_BYTES {
            warn!(
                "No line terminator within {} bytes, dropping accumulated data",
                self.accumulator.len()
            );
            self.stats.overflowed += 1;
            self.accumulator.clear();
        }

        results
    }

    /// Parse and validate one line. The trailing line ending is optional.
    pub fn decode_line(&self, line: &str) -> Result<DecodedFrame, FrameError> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return Err(FrameError::Empty);
        }

        let tokens: Vec<&str> = line.split(' ').collect();
        let Some(frame_type) = FrameType::from_tag(tokens[0]) else {
            debug!("Discarding line with unknown tag {:?}", tokens[0]);
            return Err(FrameError::UnknownType(tokens[0].to_string()));
        };

        let expected = frame_type.token_count();
        if tokens.len() < expected {
            warn!(
                "Malformed {:?} frame: {} tokens, expected {}",
                frame_type,
                tokens.len(),
                expected
            );
            return Err(FrameError::TooFewTokens {
                frame_type,
                expected,
                found: tokens.len(),
            });
        }

        let size = tokens.len();
        let declared_length = tokens[1].trim().parse::<usize>().unwrap_or(0);
        let received = u32::from_str_radix(tokens[size - 2].trim(), 16).unwrap_or(0) as u16;

        // Every token between the length and the CRC is packed as u16,
        // including temperatures
        let computed = self
            .crc
            .checksum(&pack_tokens(tokens[2..size - 2].iter().copied()));
        let crc = CrcCheck { received, computed };

        if crc.is_valid() {
            debug!("CRC match for {:?}: {:04X}", frame_type, computed);
        } else {
            warn!(
                "CRC mismatch for {:?}: computed={:04X} received={:04X}",
                frame_type, computed, received
            );
        }

        let samples = &tokens[2..2 + frame_type.sample_count()];
        let payload = match frame_type.sample_kind() {
            SampleKind::Millimeters => Payload::Millimeters(
                samples
                    .iter()
                    .map(|t| t.trim().parse::<i16>().unwrap_or(0))
                    .collect(),
            ),
            SampleKind::Celsius => Payload::Celsius(
                samples
                    .iter()
                    .map(|t| t.trim().parse::<f32>().unwrap_or(0.0))
                    .collect(),
            ),
        };

        Ok(DecodedFrame {
            frame_type,
            declared_length,
            payload,
            crc,
        })
    }

    /// Write a decoded frame into its sensor grid, subject to the
    /// dispatch policy. Returns whether the grid was updated.
    pub fn dispatch(&self, frame: &DecodedFrame, readings: &mut SensorReadings) -> bool {
        if !frame.is_valid() && !self.dispatch_regardless_of_crc {
            trace!("Not dispatching {:?}: CRC check failed", frame.frame_type);
            return false;
        }
        readings.store(frame.frame_type, &frame.payload)
    }

    /// Accumulate a chunk, then decode and dispatch every completed frame
    pub fn process(&mut self, chunk: &[u8], readings: &mut SensorReadings) -> Vec<FrameReport> {
        let mut reports = Vec::new();
        for result in self.push_bytes(chunk) {
            let Ok(frame) = result else {
                continue;
            };
            let dispatched = self.dispatch(&frame, readings);
            reports.push(FrameReport {
                frame_type: frame.frame_type,
                crc_valid: frame.is_valid(),
                dispatched,
            });
        }
        reports
    }
}
