use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::LinkError;
use crate::firmware::Mode;
use crate::phy::crc::Crc16;
use crate::utils::consts::*;

/// Runtime settings shared by the host monitor and the firmware simulator.
/// Every field falls back to the value in `utils::consts` when missing
/// from the JSON file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    pub port: String,
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub crc_polynomial: u16,
    pub crc_init: u16,
    /// Dispatch samples even when the CRC check fails
    pub dispatch_regardless_of_crc: bool,
    pub initial_mode: char,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT.to_string(),
            baud_rate: BAUD_RATE,
            read_timeout_ms: READ_TIMEOUT_MS,
            poll_interval_ms: POLL_INTERVAL_MS,
            crc_polynomial: CRC16_POLYNOMIAL,
            crc_init: CRC16_INIT,
            dispatch_regardless_of_crc: true,
            initial_mode: DEFAULT_MODE_CODE as char,
        }
    }
}

impl LinkConfig {
    pub fn load(path: &Path) -> Result<Self, LinkError> {
        let text = fs::read_to_string(path)?;
        let config: LinkConfig = serde_json::from_str(&text)?;
        config.validate()?;
        info!("Loaded link configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), LinkError> {
        if self.port.is_empty() {
            return Err(LinkError::Config("serial port path is empty".into()));
        }
        if self.baud_rate == 0 {
            return Err(LinkError::Config("baud rate must be non-zero".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(LinkError::Config(
                "poll interval must be non-zero".into(),
            ));
        }
        if !self.initial_mode.is_ascii() {
            return Err(LinkError::InvalidCommand(self.initial_mode));
        }
        Mode::from_code(self.initial_mode as u8)
            .ok_or(LinkError::InvalidCommand(self.initial_mode))?;
        Ok(())
    }

    /// Mode requested at startup when none is given on the command line
    pub fn default_mode(&self) -> Mode {
        u8::try_from(self.initial_mode)
            .ok()
            .and_then(Mode::from_code)
            .unwrap_or_default()
    }

    /// Mode letter given on the command line, or the configured one
    pub fn mode_or_default(&self, code: Option<char>) -> Result<Mode, LinkError> {
        match code {
            Some(code) => u8::try_from(code)
                .ok()
                .and_then(Mode::from_code)
                .ok_or(LinkError::InvalidCommand(code)),
            None => Ok(self.default_mode()),
        }
    }

    pub fn crc(&self) -> Crc16 {
        Crc16::new(self.crc_polynomial, self.crc_init)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
