// Device side of the link: mode register, sensor polling, frame emission

pub mod mode;
pub mod sensors;

pub use mode::{Mode, ModeRegister, RangingPlan};
pub use sensors::{DistanceSensor, SensorBank, SimulatedSensors};

use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::phy::{Frame, FrameEncoder, FrameType};
use tracing::{debug, info, trace};

/// Locally tracked ranging flags, so drivers are only told to start or
/// stop on an actual change
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RangingState {
    started: [bool; 2],
}

impl RangingState {
    pub fn is_started(&self, sensor: DistanceSensor) -> bool {
        self.started[sensor.index()]
    }

    pub fn apply<S: SensorBank>(&mut self, plan: RangingPlan, sensors: &mut S) {
        for (sensor, wanted) in [
            (DistanceSensor::First, plan.distance1),
            (DistanceSensor::Second, plan.distance2),
        ] {
            let started = &mut self.started[sensor.index()];
            if wanted && !*started {
                sensors.start_ranging(sensor);
                *started = true;
            } else if !wanted && *started {
                sensors.stop_ranging(sensor);
                *started = false;
            }
        }
    }
}

/// Cooperative polling loop of the microcontroller
pub struct Firmware<S: SensorBank, W: Write> {
    sensors: S,
    out: W,
    encoder: FrameEncoder,
    register: Arc<ModeRegister>,
    ranging: RangingState,
}

impl<S: SensorBank, W: Write> Firmware<S, W> {
    pub fn new(sensors: S, out: W, encoder: FrameEncoder, register: Arc<ModeRegister>) -> Self {
        Self {
            sensors,
            out,
            encoder,
            register,
            ranging: RangingState::default(),
        }
    }

    /// Handle for the receive interrupt
    pub fn register(&self) -> Arc<ModeRegister> {
        self.register.clone()
    }

    pub fn sensors(&self) -> &S {
        &self.sensors
    }

    pub fn ranging(&self) -> RangingState {
        self.ranging
    }

    pub fn into_parts(self) -> (S, W) {
        (self.sensors, self.out)
    }

    /// Print the option menu, one line per command
    pub fn boot(&mut self) -> io::Result<()> {
        info!("Firmware boot, mode {}", self.register.current());
        for mode in Mode::ALL {
            write!(self.out, "{}\r\n", mode.menu_line())?;
        }
        self.out.flush()
    }

    /// One polling iteration. Returns the frame types actually written.
    pub fn tick(&mut self) -> io::Result<Vec<FrameType>> {
        let mode = self.register.current();
        if let Some(byte) = self.register.take_received() {
            self.acknowledge(byte, mode)?;
        }
        self.ranging.apply(mode.ranging(), &mut self.sensors);

        let mut emitted = Vec::with_capacity(mode.frame_types().len());
        for &frame_type in mode.frame_types() {
            match self.get_result(frame_type) {
                Some(frame) => {
                    self.encoder.write_frame(&mut self.out, &frame)?;
                    emitted.push(frame_type);
                }
                None => trace!("{:?}: no data ready", frame_type),
            }
        }
        self.out.flush()?;
        debug!("Tick in mode {}: emitted {:?}", mode.code() as char, emitted);
        Ok(emitted)
    }

    /// Report a received command byte: a notice for unsupported bytes,
    /// the active flag, then the byte itself
    fn acknowledge(&mut self, byte: u8, mode: Mode) -> io::Result<()> {
        if Mode::from_code(byte).is_none() {
            write!(self.out, "Unsupported command\r\n")?;
        }
        write!(self.out, "Flag: {}\r\n{}\r\n", mode.code() as char, byte as char)
    }

    fn get_result(&mut self, frame_type: FrameType) -> Option<Frame> {
        match frame_type {
            FrameType::Distance1 => self
                .sensors
                .read_distance(DistanceSensor::First)
                .map(|zones| Frame::distance(frame_type, zones)),
            FrameType::Distance2 => self
                .sensors
                .read_distance(DistanceSensor::Second)
                .map(|zones| Frame::distance(frame_type, zones)),
            FrameType::ThermalA => Some(Frame::thermal(frame_type, self.sensors.read_thermal_a())),
            FrameType::ThermalB => Some(Frame::thermal(frame_type, self.sensors.read_thermal_b())),
        }
    }

    /// Tick every `interval` until `running` clears or `max_ticks` is reached
    pub fn run(
        &mut self,
        interval: Duration,
        running: &AtomicBool,
        max_ticks: Option<u64>,
    ) -> io::Result<u64> {
        let mut ticks = 0u64;
        while running.load(Ordering::SeqCst) {
            if max_ticks.is_some_and(|max| ticks >= max) {
                break;
            }
            self.tick()?;
            ticks += 1;
            std::thread::sleep(interval);
        }
        info!("Firmware loop stopped after {} ticks", ticks);
        Ok(ticks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn firmware(mode: Mode) -> Firmware<SimulatedSensors, Vec<u8>> {
        Firmware::new(
            SimulatedSensors::new(11),
            Vec::new(),
            FrameEncoder::default(),
            Arc::new(ModeRegister::new(mode)),
        )
    }

    #[test]
    fn test_b_then_c_switches_sensors() {
        let mut fw = firmware(Mode::All);
        fw.tick().unwrap();
        assert!(fw.ranging().is_started(DistanceSensor::First));
        assert!(fw.ranging().is_started(DistanceSensor::Second));

        fw.register().on_receive(b'B');
        assert_eq!(fw.tick().unwrap(), vec![FrameType::Distance1]);
        assert!(fw.ranging().is_started(DistanceSensor::First));
        assert!(!fw.ranging().is_started(DistanceSensor::Second));
        assert_eq!(fw.sensors().stop_count(DistanceSensor::Second), 1);

        fw.register().on_receive(b'C');
        assert_eq!(fw.tick().unwrap(), vec![FrameType::Distance2]);
        assert!(!fw.ranging().is_started(DistanceSensor::First));
        assert!(fw.ranging().is_started(DistanceSensor::Second));
        assert_eq!(fw.sensors().stop_count(DistanceSensor::First), 1);
        assert_eq!(fw.sensors().start_count(DistanceSensor::Second), 2);
    }

    #[test]
    fn test_repeated_command_does_not_restart() {
        let mut fw = firmware(Mode::ThermalA);
        fw.register().on_receive(b'B');
        fw.tick().unwrap();
        fw.register().on_receive(b'B');
        fw.tick().unwrap();
        fw.tick().unwrap();

        assert_eq!(fw.sensors().start_count(DistanceSensor::First), 1);
        assert_eq!(fw.sensors().stop_count(DistanceSensor::Second), 0);
    }

    #[test]
    fn test_thermal_modes_never_start_ranging() {
        for mode in [Mode::ThermalA, Mode::ThermalB, Mode::ThermalBoth] {
            let mut fw = firmware(mode);
            let emitted = fw.tick().unwrap();
            assert_eq!(emitted, mode.frame_types());
            assert_eq!(fw.sensors().start_count(DistanceSensor::First), 0);
            assert_eq!(fw.sensors().start_count(DistanceSensor::Second), 0);
        }
    }

    #[test]
    fn test_all_mode_emission_order() {
        let mut fw = firmware(Mode::All);
        fw.tick().unwrap();
        let (_, out) = fw.into_parts();
        let text = String::from_utf8(out).unwrap();
        let tags: Vec<char> = text
            .lines()
            .filter_map(|l| l.chars().next())
            .collect();
        assert_eq!(tags, vec!['X', 'Z', 'L', 'P']);
    }

    #[test]
    fn test_command_is_acknowledged_once() {
        let mut fw = firmware(Mode::Distance1);
        fw.register().on_receive(b'C');
        fw.tick().unwrap();
        fw.register().on_receive(b'Q');
        fw.tick().unwrap();
        fw.tick().unwrap();

        let (_, out) = fw.into_parts();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Flag: C");
        assert_eq!(lines[1], "C");
        assert!(lines[2].starts_with("Z 134 "));
        assert_eq!(lines[3], "Unsupported command");
        assert_eq!(lines[4], "Flag: C");
        assert_eq!(lines[5], "Q");
        assert!(lines[6].starts_with("Z 134 "));
        assert!(lines[7].starts_with("Z 134 "));
        assert_eq!(lines.len(), 8);
    }

    #[test]
    fn test_boot_prints_menu() {
        let mut fw = firmware(Mode::Distance1);
        fw.boot().unwrap();
        let (_, out) = fw.into_parts();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 9);
        assert!(text.starts_with("A - all sensors\r\n"));
    }

    #[test]
    fn test_run_stops_at_max_ticks() {
        let mut fw = firmware(Mode::ThermalA);
        let running = AtomicBool::new(true);
        let ticks = fw.run(Duration::ZERO, &running, Some(3)).unwrap();
        assert_eq!(ticks, 3);

        let (_, out) = fw.into_parts();
        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 3);
    }

    #[test]
    fn test_run_honours_stop_flag() {
        let mut fw = firmware(Mode::ThermalA);
        let running = AtomicBool::new(false);
        assert_eq!(fw.run(Duration::ZERO, &running, None).unwrap(), 0);
    }
}
