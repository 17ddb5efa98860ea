use std::collections::HashMap;
use std::sync::Mutex;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use crate::phy::FrameType;

/// One bar per sensor while a measurement series fills up
pub struct ProgressManager {
    mp: MultiProgress,
    bars: Mutex<HashMap<FrameType, ProgressBar>>,
}

impl ProgressManager {
    pub fn new() -> Self {
        Self {
            mp: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
        }
    }

    /// Add the bar for `frame_type`, `total` frames long
    pub fn add_series(&self, frame_type: FrameType, total: u64) -> Result<(), String> {
        let mut bars = self
            .bars
            .lock()
            .map_err(|e| format!("Lock error: {}", e))?;
        if bars.contains_key(&frame_type) {
            return Err(format!("{:?} series already has a bar", frame_type));
        }

        let style = ProgressStyle::default_bar()
            .template(templates::SERIES)
            .map_err(|e| format!("Bad template: {}", e))?
            .progress_chars("█▉▊▋▌▍▎▏ ");
        let pb = self.mp.add(ProgressBar::new(total));
        pb.set_style(style);
        pb.set_prefix(frame_type.tag().to_string());
        pb.set_message(format!("{:?}", frame_type));
        bars.insert(frame_type, pb);
        Ok(())
    }

    /// One more frame collected. Finishes the bar on its last step.
    pub fn advance(&self, frame_type: FrameType) -> Result<(), String> {
        let bars = self
            .bars
            .lock()
            .map_err(|e| format!("Lock error: {}", e))?;
        let pb = bars
            .get(&frame_type)
            .ok_or_else(|| format!("No bar for {:?}", frame_type))?;
        pb.inc(1);
        if pb.length().is_some_and(|len| pb.position() >= len) {
            pb.finish_with_message("complete");
        }
        Ok(())
    }

    pub fn is_finished(&self, frame_type: FrameType) -> bool {
        self.bars
            .lock()
            .ok()
            .and_then(|bars| bars.get(&frame_type).map(|pb| pb.is_finished()))
            .unwrap_or(false)
    }

    pub fn finish_all(&self) {
        if let Ok(mut bars) = self.bars.lock() {
            for (_, pb) in bars.drain() {
                if !pb.is_finished() {
                    pb.abandon();
                }
            }
        }
    }
}

impl Default for ProgressManager {
    fn default() -> Self {
        Self::new()
    }
}

pub mod templates {
    pub const SERIES: &str = "{prefix} [{bar:30.cyan}] {pos}/{len} frames {msg}";
}
