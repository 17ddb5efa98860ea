/// Default log level, RUST_LOG overrides it
pub const LOG_LEVEL: &str = "info";

// ============================================================================
// Serial Link Parameters
// ============================================================================

/// Default serial device the firmware enumerates as
pub const DEFAULT_PORT: &str = "/dev/ttyACM0";

/// UART baud rate (8N1, no flow control)
pub const BAUD_RATE: u32 = 115_200;

/// Serial read timeout (ms)
pub const READ_TIMEOUT_MS: u64 = 200;

/// Size of a single read from the serial port
pub const READ_CHUNK_BYTES: usize = 512;

/// Firmware polling interval (ms)
pub const POLL_INTERVAL_MS: u64 = 1000;

/// Firmware mode after reset
pub const DEFAULT_MODE_CODE: u8 = b'B';

// ============================================================================
// Frame Parameters
// ============================================================================

/// CRC-16 polynomial shared by firmware and host
pub const CRC16_POLYNOMIAL: u16 = 0x8005;

/// CRC-16 initial register value
pub const CRC16_INIT: u16 = 0;

/// Tag + spaces + CRC + terminator overhead added to the declared length
pub const FRAME_LENGTH_OVERHEAD: usize = 6;

/// Accumulator bound; a line longer than this is dropped unread
pub const MAX_LINE_BYTES: usize = 16 * 1024;

/// Literal terminator token closing every frame
pub const FRAME_TERMINATOR: &str = "Y";

/// Tokens around the samples: type, length, CRC, terminator
pub const FRAME_FIXED_TOKENS: usize = 4;

/// Zones reported by one VL53L5CX in 8x8 mode
pub const DISTANCE_ZONES: usize = 64;

/// AMG8833 pixel count (8x8)
pub const AMG_PIXELS: usize = 64;

/// MLX90640 pixel count (32x24)
pub const MLX_PIXELS: usize = 768;

/// Row width when printing 64-sample grids
pub const SMALL_GRID_WIDTH: usize = 8;

/// Row width when printing the MLX90640 grid
pub const LARGE_GRID_WIDTH: usize = 32;

// ============================================================================
// Simulator Parameters
// ============================================================================

/// Simulated distance range (mm)
pub const SIM_DISTANCE_MIN_MM: i16 = 20;
pub const SIM_DISTANCE_MAX_MM: i16 = 4000;

/// Simulated ambient temperature band (°C)
pub const SIM_TEMP_MIN_C: f32 = 19.0;
pub const SIM_TEMP_MAX_C: f32 = 36.0;

/// Largest chunk the loopback transport hands to the host at once
pub const SIM_MAX_CHUNK_BYTES: usize = 97;

// ============================================================================
// Measurement Series
// ============================================================================

/// Frames collected per sensor before computing the error table
pub const DEFAULT_SERIES_LENGTH: usize = 5;

/// Interval between measurement log snapshots (ms)
pub const LOG_INTERVAL_MS: u64 = 1100;
