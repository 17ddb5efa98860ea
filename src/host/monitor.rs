use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use tracing::{debug, info, warn};

use super::readings::SensorReadings;
use super::record::MeasurementLog;
use super::serial::CommandSink;
use super::series::{ErrorMetric, MeasurementSeries};
use crate::error::LinkError;
use crate::firmware::Mode;
use crate::phy::{DecodedFrame, DecoderStats, FrameDecoder, FrameReport, FrameType};
use crate::ui::progress::ProgressManager;

/// Error table finished by a measurement series
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesResult {
    pub frame_type: FrameType,
    pub errors: Vec<f64>,
}

/// Host pipeline: decode chunks, keep the latest readings, and feed the
/// optional measurement log and series
pub struct Monitor {
    decoder: FrameDecoder,
    readings: SensorReadings,
    mode: Mode,
    log: Option<(MeasurementLog, Duration)>,
    last_log: Option<Instant>,
    series: HashMap<FrameType, MeasurementSeries>,
    progress: Option<ProgressManager>,
    commands: Option<(Box<dyn CommandSink>, Receiver<Mode>)>,
}

impl Monitor {
    pub fn new(decoder: FrameDecoder, mode: Mode) -> Self {
        Self {
            decoder,
            readings: SensorReadings::new(),
            mode,
            log: None,
            last_log: None,
            series: HashMap::new(),
            progress: None,
            commands: None,
        }
    }

    /// Snapshot the readings to `log` every `interval`
    pub fn with_log(mut self, log: MeasurementLog, interval: Duration) -> Self {
        self.log = Some((log, interval));
        self
    }

    /// Start a series of `length` frames for every sensor of the mode
    pub fn with_series(mut self, length: usize, metric: ErrorMetric) -> Self {
        for &frame_type in self.mode.frame_types() {
            self.series.insert(
                frame_type,
                MeasurementSeries::new(frame_type.sample_count(), length, metric),
            );
        }
        self
    }

    pub fn with_progress(mut self, progress: ProgressManager) -> Self {
        for &frame_type in self.mode.frame_types() {
            if let Some(series) = self.series.get(&frame_type) {
                if let Err(e) = progress.add_series(frame_type, series.target() as u64) {
                    warn!("{}", e);
                }
            }
        }
        self.progress = Some(progress);
        self
    }

    /// Mode requests arriving on `requests` are written to `sink` while
    /// the monitor runs
    pub fn with_commands(mut self, sink: Box<dyn CommandSink>, requests: Receiver<Mode>) -> Self {
        self.commands = Some((sink, requests));
        self
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Send every pending mode request to the device. The monitor follows
    /// a mode only once the command is written. Returns the number of
    /// switches.
    pub fn apply_commands(&mut self) -> Result<usize, LinkError> {
        let Some((sink, requests)) = self.commands.as_mut() else {
            return Ok(0);
        };
        let mut switched = 0;
        while let Ok(mode) = requests.try_recv() {
            sink.send_mode(mode)?;
            info!("Mode switched from {} to {}", self.mode, mode);
            self.mode = mode;
            switched += 1;
        }
        Ok(switched)
    }

    pub fn readings(&self) -> &SensorReadings {
        &self.readings
    }

    pub fn stats(&self) -> DecoderStats {
        self.decoder.stats()
    }

    pub fn series_complete(&self) -> bool {
        !self.series.is_empty() && self.series.values().all(|s| s.is_complete())
    }

    /// Decode one chunk. Returns the frame reports and any series that
    /// completed with it.
    pub fn handle_chunk(&mut self, chunk: &[u8]) -> (Vec<FrameReport>, Vec<SeriesResult>) {
        let mut reports = Vec::new();
        let mut finished = Vec::new();

        for result in self.decoder.push_bytes(chunk) {
            let Ok(frame) = result else {
                continue;
            };
            let dispatched = self.decoder.dispatch(&frame, &mut self.readings);
            reports.push(FrameReport {
                frame_type: frame.frame_type,
                crc_valid: frame.is_valid(),
                dispatched,
            });
            if dispatched {
                finished.extend(self.record_series(&frame));
            }
        }
        (reports, finished)
    }

    /// Feed one dispatched frame to its series, in grid order
    fn record_series(&mut self, frame: &DecodedFrame) -> Option<SeriesResult> {
        let series = self.series.get_mut(&frame.frame_type)?;
        if series.is_complete() {
            return None;
        }
        let mut values = frame.payload.as_f64();
        values.reverse();
        let errors = series.record(&values);
        if let Some(progress) = &self.progress {
            if let Err(e) = progress.advance(frame.frame_type) {
                warn!("{}", e);
            }
        }

        let errors = errors?;
        info!("Measurement series for {:?} complete", frame.frame_type);
        Some(SeriesResult {
            frame_type: frame.frame_type,
            errors,
        })
    }

    /// Append a snapshot when the log interval has elapsed
    pub fn poll_log(&mut self, now: Instant) -> Result<bool, LinkError> {
        let Some((log, interval)) = self.log.as_mut() else {
            return Ok(false);
        };
        if self.last_log.is_some_and(|last| now.duration_since(last) < *interval) {
            return Ok(false);
        }
        log.append(self.mode, &self.readings)?;
        self.last_log = Some(now);
        Ok(true)
    }

    /// Consume chunks until `running` clears or every sender is gone.
    /// `on_series` sees each finished error table.
    pub fn run(
        &mut self,
        rx: &Receiver<Vec<u8>>,
        running: &AtomicBool,
        mut on_series: impl FnMut(&SeriesResult),
    ) -> Result<DecoderStats, LinkError> {
        while running.load(Ordering::SeqCst) {
            match rx.recv_timeout(Duration::from_millis(100)) {
                Ok(chunk) => {
                    let (reports, finished) = self.handle_chunk(&chunk);
                    for report in &reports {
                        debug!(
                            "{:?} frame: crc_valid={} dispatched={}",
                            report.frame_type, report.crc_valid, report.dispatched
                        );
                    }
                    finished.iter().for_each(&mut on_series);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    debug!("Chunk source closed");
                    break;
                }
            }
            if let Err(e) = self.apply_commands() {
                warn!("Mode command failed: {}", e);
            }
            if let Err(e) = self.poll_log(Instant::now()) {
                warn!("Measurement log write failed: {}", e);
            }
        }

        if let Some(progress) = &self.progress {
            progress.finish_all();
        }
        let stats = self.decoder.stats();
        info!(
            "Monitor stopped: {} valid, {} invalid frames",
            stats.valid, stats.invalid
        );
        Ok(stats)
    }
}
