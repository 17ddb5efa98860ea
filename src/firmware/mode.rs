use std::sync::atomic::{AtomicU8, AtomicU16, Ordering};

use serde::Serialize;
use tracing::{info, warn};

use crate::phy::FrameType;
use crate::utils::consts::DEFAULT_MODE_CODE;

/// Operating mode selected by a single command letter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum Mode {
    /// `A`
    All,
    /// `B`
    #[default]
    Distance1,
    /// `C`
    Distance2,
    /// `D`, MLX90640 only
    ThermalB,
    /// `E`, AMG8833 only
    ThermalA,
    /// `F`
    DistanceAndThermalA,
    /// `G`
    DistanceAndThermalB,
    /// `H`
    DistanceOnly,
    /// `I`
    ThermalBoth,
}

/// Which distance sensors must be ranging in a mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangingPlan {
    pub distance1: bool,
    pub distance2: bool,
}

impl Mode {
    pub const ALL: [Mode; 9] = [
        Mode::All,
        Mode::Distance1,
        Mode::Distance2,
        Mode::ThermalB,
        Mode::ThermalA,
        Mode::DistanceAndThermalA,
        Mode::DistanceAndThermalB,
        Mode::DistanceOnly,
        Mode::ThermalBoth,
    ];

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            b'A' => Some(Mode::All),
            b'B' => Some(Mode::Distance1),
            b'C' => Some(Mode::Distance2),
            b'D' => Some(Mode::ThermalB),
            b'E' => Some(Mode::ThermalA),
            b'F' => Some(Mode::DistanceAndThermalA),
            b'G' => Some(Mode::DistanceAndThermalB),
            b'H' => Some(Mode::DistanceOnly),
            b'I' => Some(Mode::ThermalBoth),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Mode::All => b'A',
            Mode::Distance1 => b'B',
            Mode::Distance2 => b'C',
            Mode::ThermalB => b'D',
            Mode::ThermalA => b'E',
            Mode::DistanceAndThermalA => b'F',
            Mode::DistanceAndThermalB => b'G',
            Mode::DistanceOnly => b'H',
            Mode::ThermalBoth => b'I',
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Mode::All => "all sensors",
            Mode::Distance1 => "first VL53L5CX distance sensor",
            Mode::Distance2 => "second VL53L5CX distance sensor",
            Mode::ThermalB => "MLX90640 thermal sensor",
            Mode::ThermalA => "AMG8833 thermal sensor",
            Mode::DistanceAndThermalA => "AMG8833 and both distance sensors",
            Mode::DistanceAndThermalB => "MLX90640 and both distance sensors",
            Mode::DistanceOnly => "both distance sensors",
            Mode::ThermalBoth => "both thermal sensors",
        }
    }

    /// Frames emitted each tick, in emission order
    pub fn frame_types(self) -> &'static [FrameType] {
        use FrameType::*;
        match self {
            Mode::All => &[Distance1, Distance2, ThermalB, ThermalA],
            Mode::Distance1 => &[Distance1],
            Mode::Distance2 => &[Distance2],
            Mode::ThermalB => &[ThermalB],
            Mode::ThermalA => &[ThermalA],
            Mode::DistanceAndThermalA => &[Distance1, Distance2, ThermalA],
            Mode::DistanceAndThermalB => &[Distance1, Distance2, ThermalB],
            Mode::DistanceOnly => &[Distance1, Distance2],
            Mode::ThermalBoth => &[ThermalB, ThermalA],
        }
    }

    pub fn ranging(self) -> RangingPlan {
        let frames = self.frame_types();
        RangingPlan {
            distance1: frames.contains(&FrameType::Distance1),
            distance2: frames.contains(&FrameType::Distance2),
        }
    }

    /// One menu line, as printed by the firmware at boot
    pub fn menu_line(self) -> String {
        format!("{} - {}", self.code() as char, self.description())
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code() as char, self.description())
    }
}

/// One-byte mode cell. The receive handler is the only writer, the
/// polling loop the only reader; a newer byte replaces an unread one.
#[derive(Debug)]
pub struct ModeRegister {
    code: AtomicU8,
    /// Last raw byte awaiting its echo, tagged with bit 8
    received: AtomicU16,
}

impl Default for ModeRegister {
    fn default() -> Self {
        Self {
            code: AtomicU8::new(DEFAULT_MODE_CODE),
            received: AtomicU16::new(0),
        }
    }
}

impl ModeRegister {
    pub fn new(mode: Mode) -> Self {
        Self {
            code: AtomicU8::new(mode.code()),
            received: AtomicU16::new(0),
        }
    }

    /// Receive-complete handler: store a recognised command, ignore the rest
    pub fn on_receive(&self, byte: u8) -> Option<Mode> {
        self.received.store(0x100 | byte as u16, Ordering::Release);
        match Mode::from_code(byte) {
            Some(mode) => {
                self.code.store(byte, Ordering::Release);
                info!("Mode command {}", byte as char);
                Some(mode)
            }
            None => {
                warn!("Unsupported command byte 0x{:02X}", byte);
                None
            }
        }
    }

    /// Byte received since the last call, if any
    pub fn take_received(&self) -> Option<u8> {
        let tagged = self.received.swap(0, Ordering::AcqRel);
        (tagged & 0x100 != 0).then_some(tagged as u8)
    }

    pub fn current(&self) -> Mode {
        Mode::from_code(self.code.load(Ordering::Acquire)).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip() {
        for mode in Mode::ALL {
            assert_eq!(Mode::from_code(mode.code()), Some(mode));
        }
        let letters: Vec<u8> = Mode::ALL.iter().map(|m| m.code()).collect();
        assert_eq!(letters, b"ABCDEFGHI".to_vec());
    }

    #[test]
    fn test_received_byte_taken_once() {
        let register = ModeRegister::default();
        assert_eq!(register.take_received(), None);

        assert_eq!(register.on_receive(b'Q'), None);
        assert_eq!(register.take_received(), Some(b'Q'));
        assert_eq!(register.take_received(), None);

        register.on_receive(0);
        register.on_receive(b'G');
        assert_eq!(register.take_received(), Some(b'G'));
        assert_eq!(register.current(), Mode::DistanceAndThermalB);
    }

    #[test]
    fn test_default_is_first_distance_sensor() {
        assert_eq!(Mode::default(), Mode::Distance1);
        assert_eq!(ModeRegister::default().current(), Mode::Distance1);
    }

    #[test]
    fn test_ranging_plans() {
        assert_eq!(
            Mode::Distance1.ranging(),
            RangingPlan { distance1: true, distance2: false }
        );
        assert_eq!(
            Mode::Distance2.ranging(),
            RangingPlan { distance1: false, distance2: true }
        );
        for mode in [Mode::All, Mode::DistanceAndThermalA, Mode::DistanceAndThermalB, Mode::DistanceOnly] {
            assert_eq!(mode.ranging(), RangingPlan { distance1: true, distance2: true });
        }
        for mode in [Mode::ThermalA, Mode::ThermalB, Mode::ThermalBoth] {
            assert_eq!(mode.ranging(), RangingPlan { distance1: false, distance2: false });
        }
    }

    #[test]
    fn test_thermal_letters() {
        assert_eq!(Mode::from_code(b'D').unwrap().frame_types(), &[FrameType::ThermalB]);
        assert_eq!(Mode::from_code(b'E').unwrap().frame_types(), &[FrameType::ThermalA]);
    }

    #[test]
    fn test_register_last_write_wins() {
        let register = ModeRegister::new(Mode::Distance1);
        register.on_receive(b'C');
        register.on_receive(b'G');
        assert_eq!(register.current(), Mode::DistanceAndThermalB);
    }

    #[test]
    fn test_register_ignores_unknown_bytes() {
        let register = ModeRegister::new(Mode::ThermalA);
        assert_eq!(register.on_receive(b'Z'), None);
        assert_eq!(register.on_receive(b'a'), None);
        assert_eq!(register.on_receive(b'\n'), None);
        assert_eq!(register.current(), Mode::ThermalA);
    }

    #[test]
    fn test_menu_line() {
        assert_eq!(Mode::All.menu_line(), "A - all sensors");
    }
}
