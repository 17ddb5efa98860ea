use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::debug;

use crate::utils::consts::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceSensor {
    First,
    Second,
}

impl DistanceSensor {
    pub fn index(self) -> usize {
        match self {
            DistanceSensor::First => 0,
            DistanceSensor::Second => 1,
        }
    }
}

/// Hardware read primitives used by the polling loop
pub trait SensorBank {
    fn start_ranging(&mut self, sensor: DistanceSensor);
    fn stop_ranging(&mut self, sensor: DistanceSensor);
    /// `None` while the sensor has no data ready
    fn read_distance(&mut self, sensor: DistanceSensor) -> Option<Vec<i16>>;
    /// AMG8833, 64 pixels
    fn read_thermal_a(&mut self) -> Vec<f32>;
    /// MLX90640, 768 pixels
    fn read_thermal_b(&mut self) -> Vec<f32>;
}

/// Host-side stand-in for the sensor drivers: a slanted wall in front of
/// each distance sensor and a warm blob over ambient for the thermal
/// arrays, with noise on top
pub struct SimulatedSensors {
    rng: StdRng,
    ranging: [bool; 2],
    starts: [u32; 2],
    stops: [u32; 2],
}

impl SimulatedSensors {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            ranging: [false; 2],
            starts: [0; 2],
            stops: [0; 2],
        }
    }

    pub fn is_ranging(&self, sensor: DistanceSensor) -> bool {
        self.ranging[sensor.index()]
    }

    /// Number of start commands the sensor has received
    pub fn start_count(&self, sensor: DistanceSensor) -> u32 {
        self.starts[sensor.index()]
    }

    pub fn stop_count(&self, sensor: DistanceSensor) -> u32 {
        self.stops[sensor.index()]
    }

    fn thermal_frame(&mut self, width: usize, len: usize) -> Vec<f32> {
        let height = len / width;
        let (cx, cy) = (
            self.rng.random_range(0..width) as f32,
            self.rng.random_range(0..height) as f32,
        );
        let ambient = self.rng.random_range(SIM_TEMP_MIN_C..SIM_TEMP_MIN_C + 4.0);
        let peak = SIM_TEMP_MAX_C - ambient;
        let radius = width as f32 / 4.0;

        (0..len)
            .map(|i| {
                let (x, y) = ((i % width) as f32, (i / width) as f32);
                let d2 = (x - cx).powi(2) + (y - cy).powi(2);
                let t = ambient + peak * (-d2 / (2.0 * radius * radius)).exp();
                t + self.rng.random_range(-0.25..0.25)
            })
            .collect()
    }
}

impl SensorBank for SimulatedSensors {
    fn start_ranging(&mut self, sensor: DistanceSensor) {
        debug!("Start ranging {:?}", sensor);
        self.ranging[sensor.index()] = true;
        self.starts[sensor.index()] += 1;
    }

    fn stop_ranging(&mut self, sensor: DistanceSensor) {
        debug!("Stop ranging {:?}", sensor);
        self.ranging[sensor.index()] = false;
        self.stops[sensor.index()] += 1;
    }

    fn read_distance(&mut self, sensor: DistanceSensor) -> Option<Vec<i16>> {
        if !self.is_ranging(sensor) {
            return None;
        }
        let base = self.rng.random_range(SIM_DISTANCE_MIN_MM..SIM_DISTANCE_MAX_MM / 2);
        let slope = self.rng.random_range(0..20i16);
        Some(
            (0..DISTANCE_ZONES)
                .map(|i| {
                    let col = (i % SMALL_GRID_WIDTH) as i16;
                    let noise = self.rng.random_range(-5..=5i16);
                    (base + col * slope + noise).clamp(0, SIM_DISTANCE_MAX_MM)
                })
                .collect(),
        )
    }

    fn read_thermal_a(&mut self) -> Vec<f32> {
        self.thermal_frame(SMALL_GRID_WIDTH, AMG_PIXELS)
    }

    fn read_thermal_b(&mut self) -> Vec<f32> {
        self.thermal_frame(LARGE_GRID_WIDTH, MLX_PIXELS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_needs_ranging() {
        let mut sensors = SimulatedSensors::new(1);
        assert!(sensors.read_distance(DistanceSensor::First).is_none());

        sensors.start_ranging(DistanceSensor::First);
        let zones = sensors.read_distance(DistanceSensor::First).unwrap();
        assert_eq!(zones.len(), DISTANCE_ZONES);
        assert!(zones.iter().all(|&d| (0..=SIM_DISTANCE_MAX_MM).contains(&d)));
        assert!(sensors.read_distance(DistanceSensor::Second).is_none());
    }

    #[test]
    fn test_thermal_sizes_and_range() {
        let mut sensors = SimulatedSensors::new(2);
        let a = sensors.read_thermal_a();
        let b = sensors.read_thermal_b();
        assert_eq!(a.len(), AMG_PIXELS);
        assert_eq!(b.len(), MLX_PIXELS);
        assert!(b.iter().all(|&t| t > SIM_TEMP_MIN_C - 1.0 && t < SIM_TEMP_MAX_C + 1.0));
    }

    #[test]
    fn test_seeded_is_reproducible() {
        let mut a = SimulatedSensors::new(9);
        let mut b = SimulatedSensors::new(9);
        assert_eq!(a.read_thermal_a(), b.read_thermal_a());
    }

    #[test]
    fn test_counts() {
        let mut sensors = SimulatedSensors::new(3);
        sensors.start_ranging(DistanceSensor::Second);
        sensors.stop_ranging(DistanceSensor::Second);
        assert_eq!(sensors.start_count(DistanceSensor::Second), 1);
        assert_eq!(sensors.stop_count(DistanceSensor::Second), 1);
        assert!(!sensors.is_ranging(DistanceSensor::Second));
    }
}
