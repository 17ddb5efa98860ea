use std::fmt::{Display, Write as _};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::{debug, info};

use super::readings::{SensorGrid, SensorReadings};
use crate::error::LinkError;
use crate::firmware::Mode;
use crate::phy::FrameType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Whitespace separated grids, one row per line
    Grid,
    /// One JSON object per snapshot
    JsonLines,
}

#[derive(Serialize)]
struct Snapshot<'a> {
    timestamp_ms: u64,
    mode: char,
    #[serde(skip_serializing_if = "Option::is_none")]
    distance1: Option<&'a [i16]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    distance2: Option<&'a [i16]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thermal_a: Option<&'a [f32]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thermal_b: Option<&'a [f32]>,
}

/// Sensors written for a mode, in file order
pub fn logged_sensors(mode: Mode) -> Vec<FrameType> {
    [
        FrameType::Distance1,
        FrameType::Distance2,
        FrameType::ThermalA,
        FrameType::ThermalB,
    ]
    .into_iter()
    .filter(|ft| mode.frame_types().contains(ft))
    .collect()
}

/// Grid section: a blank line, rows of `width` values each followed by a
/// space, CRLF line endings
pub fn format_grid<T: Copy + Default + Display>(grid: &SensorGrid<T>) -> String {
    let mut out = String::from("\r\n");
    for row in grid.rows() {
        for value in row {
            let _ = write!(out, "{} ", value);
        }
        out.push_str("\r\n");
    }
    out
}

/// Append-only measurement file
pub struct MeasurementLog {
    writer: BufWriter<File>,
    format: LogFormat,
    entries: u64,
}

impl MeasurementLog {
    pub fn open(path: &Path, format: LogFormat) -> Result<Self, LinkError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        info!("Logging measurements to {} ({:?})", path.display(), format);
        Ok(Self {
            writer: BufWriter::new(file),
            format,
            entries: 0,
        })
    }

    pub fn entries(&self) -> u64 {
        self.entries
    }

    /// Append the grids belonging to `mode`
    pub fn append(&mut self, mode: Mode, readings: &SensorReadings) -> Result<(), LinkError> {
        let sensors = logged_sensors(mode);
        if sensors.is_empty() {
            return Ok(());
        }

        match self.format {
            LogFormat::Grid => {
                let mut text = String::new();
                for sensor in &sensors {
                    text.push_str(&match sensor {
                        FrameType::Distance1 => format_grid(&readings.distance1),
                        FrameType::Distance2 => format_grid(&readings.distance2),
                        FrameType::ThermalA => format_grid(&readings.thermal_a),
                        FrameType::ThermalB => format_grid(&readings.thermal_b),
                    });
                }
                self.writer.write_all(text.as_bytes())?;
            }
            LogFormat::JsonLines => {
                let timestamp_ms = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_millis() as u64)
                    .unwrap_or_default();
                let pick = |ft: FrameType| sensors.contains(&ft);
                let snapshot = Snapshot {
                    timestamp_ms,
                    mode: mode.code() as char,
                    distance1: pick(FrameType::Distance1).then(|| readings.distance1.values()),
                    distance2: pick(FrameType::Distance2).then(|| readings.distance2.values()),
                    thermal_a: pick(FrameType::ThermalA).then(|| readings.thermal_a.values()),
                    thermal_b: pick(FrameType::ThermalB).then(|| readings.thermal_b.values()),
                };
                serde_json::to_writer(&mut self.writer, &snapshot)?;
                self.writer.write_all(b"\n")?;
            }
        }
        self.writer.flush()?;
        self.entries += 1;
        debug!("Logged snapshot #{} for mode {}", self.entries, mode.code() as char);
        Ok(())
    }
}
