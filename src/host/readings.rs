use serde::Serialize;

use crate::phy::{FrameType, Payload};
use crate::utils::consts::*;

/// Fixed-size grid of the most recent values from one sensor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorGrid<T> {
    width: usize,
    values: Vec<T>,
}

impl<T: Copy + Default> SensorGrid<T> {
    pub fn new(len: usize, width: usize) -> Self {
        Self {
            width,
            values: vec![T::default(); len],
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<T> {
        self.values.get(index).copied()
    }

    pub fn at(&self, row: usize, col: usize) -> Option<T> {
        if col >= self.width {
            return None;
        }
        self.get(row * self.width + col)
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn rows(&self) -> impl Iterator<Item = &[T]> {
        self.values.chunks(self.width)
    }

    /// Writes `samples[i]` to index `len - 1 - i`; extra samples are ignored
    pub fn store_reversed(&mut self, samples: &[T]) {
        let len = self.values.len();
        for (i, &sample) in samples.iter().take(len).enumerate() {
            self.values[len - 1 - i] = sample;
        }
    }
}

/// Last dispatched values of every sensor. Each new frame of a type
/// overwrites the previous one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorReadings {
    pub distance1: SensorGrid<i16>,
    pub distance2: SensorGrid<i16>,
    pub thermal_a: SensorGrid<f32>,
    pub thermal_b: SensorGrid<f32>,
}

impl Default for SensorReadings {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorReadings {
    pub fn new() -> Self {
        Self {
            distance1: SensorGrid::new(DISTANCE_ZONES, SMALL_GRID_WIDTH),
            distance2: SensorGrid::new(DISTANCE_ZONES, SMALL_GRID_WIDTH),
            thermal_a: SensorGrid::new(AMG_PIXELS, SMALL_GRID_WIDTH),
            thermal_b: SensorGrid::new(MLX_PIXELS, LARGE_GRID_WIDTH),
        }
    }

    /// Store a payload in the grid matching its frame type, reversed.
    /// Returns false when the payload kind does not fit the frame type.
    pub fn store(&mut self, frame_type: FrameType, payload: &Payload) -> bool {
        match (frame_type, payload) {
            (FrameType::Distance1, Payload::Millimeters(v)) => self.distance1.store_reversed(v),
            (FrameType::Distance2, Payload::Millimeters(v)) => self.distance2.store_reversed(v),
            (FrameType::ThermalA, Payload::Celsius(v)) => self.thermal_a.store_reversed(v),
            (FrameType::ThermalB, Payload::Celsius(v)) => self.thermal_b.store_reversed(v),
            _ => return false,
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_reversed() {
        let mut grid = SensorGrid::<i16>::new(4, 2);
        grid.store_reversed(&[1, 2, 3, 4]);
        assert_eq!(grid.values(), &[4, 3, 2, 1]);
        assert_eq!(grid.at(0, 1), Some(3));
        assert_eq!(grid.at(0, 2), None);
    }

    #[test]
    fn test_short_payload_fills_tail() {
        let mut grid = SensorGrid::<i16>::new(4, 2);
        grid.store_reversed(&[9]);
        assert_eq!(grid.values(), &[0, 0, 0, 9]);
    }

    #[test]
    fn test_rows() {
        let readings = SensorReadings::new();
        assert_eq!(readings.distance1.rows().count(), 8);
        assert_eq!(readings.thermal_b.rows().count(), 24);
        assert!(readings.thermal_b.rows().all(|row| row.len() == 32));
    }

    #[test]
    fn test_store_rejects_kind_mismatch() {
        let mut readings = SensorReadings::new();
        let payload = Payload::Celsius(vec![1.0; 64]);
        assert!(!readings.store(FrameType::Distance1, &payload));
        assert!(readings.store(FrameType::ThermalA, &payload));
        assert_eq!(readings.thermal_a.get(0), Some(1.0));
    }
}
