use thiserror::Error;

use crate::phy::FrameType;

/// Reasons a received line cannot be turned into a frame.
/// A CRC mismatch is not one of them: mismatched frames still decode and
/// carry their check result.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FrameError {
    #[error("empty line")]
    Empty,
    #[error("unknown frame type {0:?}")]
    UnknownType(String),
    #[error("{frame_type:?} frame needs {expected} tokens, found {found}")]
    TooFewTokens {
        frame_type: FrameType,
        expected: usize,
        found: usize,
    },
}

#[derive(Error, Debug)]
pub enum LinkError {
    #[error("serial port: {0}")]
    Serial(#[from] serialport::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported command {0:?}")]
    InvalidCommand(char),
    #[error("configuration: {0}")]
    Config(String),
}
