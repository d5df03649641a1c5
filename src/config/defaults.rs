//! System-wide default constants.
//!
//! Every tunable here has a matching field in [`ScanConfig`](super::ScanConfig);
//! these values apply when no `pipe_scan.toml` is present.

// ============================================================================
// Scan geometry & detection
// ============================================================================

/// Position advance per accepted analysis reading (cm).
pub const SENSOR_STEP_CM: u32 = 1;

/// Nominal pipe length (cm). Informational only.
pub const PIPE_LENGTH_CM: u32 = 30;

/// Deviation a live reading must exceed (strictly) to raise a blockage (cm).
pub const DEVIATION_THRESHOLD_CM: f64 = 5.0;

// ============================================================================
// Acquisition
// ============================================================================

/// Acquisition poll period (ms). 2 Hz matches the sensor firmware's output rate.
pub const POLL_INTERVAL_MS: u64 = 500;

// ============================================================================
// Serial transport
// ============================================================================

/// Serial baud rate used by the distance sensor firmware.
pub const SERIAL_BAUD_RATE: u32 = 9600;

/// Serial driver read timeout (ms).
pub const SERIAL_READ_TIMEOUT_MS: u64 = 1_000;

/// Delay after opening the port before input is trusted (ms).
///
/// Opening the port resets most microcontroller boards; the first lines
/// after reset are bootloader noise.
pub const SERIAL_SETTLE_MS: u64 = 2_000;

/// Retry period while the serial port is absent (seconds).
pub const SERIAL_RECONNECT_INTERVAL_SECS: u64 = 5;

// ============================================================================
// TCP transport
// ============================================================================

/// Per-poll read timeout for TCP line sources (ms).
pub const TCP_READ_TIMEOUT_MS: u64 = 50;

/// TCP connect timeout (seconds).
pub const TCP_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Initial reconnection delay (seconds). Doubles on each failed attempt.
pub const TCP_INITIAL_RECONNECT_DELAY_SECS: u64 = 2;

/// Reconnection delay cap (seconds).
pub const TCP_MAX_RECONNECT_DELAY_SECS: u64 = 60;

// ============================================================================
// Event log & server
// ============================================================================

/// Event log retention cap (entries). 0 disables the cap.
pub const LOG_MAX_ENTRIES: usize = 10_000;

/// HTTP command surface bind address.
pub const SERVER_ADDR: &str = "127.0.0.1:8080";
