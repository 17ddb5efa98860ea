use serde::{Deserialize, Serialize};

/// Per-cell spread over a series of measurements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum ErrorMetric {
    /// Mean squared deviation from the cell's mean
    MeanSquared,
    /// Largest minus smallest value
    Range,
}

impl ErrorMetric {
    pub fn evaluate(self, values: &[f64]) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        match self {
            ErrorMetric::MeanSquared => {
                let mean = values.iter().sum::<f64>() / values.len() as f64;
                values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64
            }
            ErrorMetric::Range => {
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                max - min
            }
        }
    }
}

/// Collects `target` grids from one sensor, then reports the error of
/// every cell once
#[derive(Debug, Clone)]
pub struct MeasurementSeries {
    target: usize,
    metric: ErrorMetric,
    cells: Vec<Vec<f64>>,
    collected: usize,
}

impl MeasurementSeries {
    pub fn new(cells: usize, target: usize, metric: ErrorMetric) -> Self {
        Self {
            target: target.max(1),
            metric,
            cells: vec![Vec::with_capacity(target); cells],
            collected: 0,
        }
    }

    pub fn target(&self) -> usize {
        self.target
    }

    pub fn collected(&self) -> usize {
        self.collected
    }

    pub fn is_complete(&self) -> bool {
        self.collected >= self.target
    }

    /// Add one grid. Returns the error table on the measurement that
    /// completes the series, `None` before and after.
    pub fn record(&mut self, grid: &[f64]) -> Option<Vec<f64>> {
        if self.is_complete() {
            return None;
        }
        for (cell, &value) in self.cells.iter_mut().zip(grid) {
            cell.push(value);
        }
        self.collected += 1;

        if self.is_complete() {
            Some(self.cells.iter().map(|c| self.metric.evaluate(c)).collect())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics() {
        let values = [10.0, 12.0, 14.0, 16.0, 18.0];
        assert_eq!(ErrorMetric::Range.evaluate(&values), 8.0);
        assert_eq!(ErrorMetric::MeanSquared.evaluate(&values), 8.0);
        assert_eq!(ErrorMetric::MeanSquared.evaluate(&[3.0; 4]), 0.0);
        assert_eq!(ErrorMetric::Range.evaluate(&[]), 0.0);
    }

    #[test]
    fn test_series_completes_once() {
        let mut series = MeasurementSeries::new(2, 3, ErrorMetric::Range);
        assert!(series.record(&[1.0, 100.0]).is_none());
        assert!(series.record(&[4.0, 100.0]).is_none());
        let table = series.record(&[2.0, 100.0]).unwrap();
        assert_eq!(table, vec![3.0, 0.0]);

        assert!(series.is_complete());
        assert!(series.record(&[50.0, 0.0]).is_none());
        assert_eq!(series.collected(), 3);
    }
}
