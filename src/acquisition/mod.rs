//! Sensor data acquisition module
//!
//! Handles line-oriented data ingestion from the distance sensor. Every
//! transport implements [`LineSource`]: a poll returns the next complete,
//! trimmed text line, nothing when no data is waiting, or a non-fatal
//! [`TransportFault`].
//!
//! ## Sources
//!
//! - [`SerialLineSource`]: the sensor board on a serial port
//! - [`TcpLineSource`]: a serial-to-network bridge
//! - [`StdinLineSource`]: piped input (e.g. from `sensor-sim`)
//! - [`ReplaySource`]: scripted or recorded lines
//! - [`SimulatedSensor`]: synthetic pipe sweeps
//! - [`DisconnectedSource`]: no hardware at all

pub mod parser;
pub mod replay;
pub mod serial;
pub mod simulated;
pub mod stdin_source;
pub mod tcp;

pub use parser::{format_reading, ParseError, ReadingParser};
pub use replay::{DisconnectedSource, ReplayItem, ReplaySource};
pub use serial::SerialLineSource;
pub use simulated::{SimulatedBlockage, SimulatedPipe, SimulatedSensor, SimulationProfile};
pub use stdin_source::StdinLineSource;
pub use tcp::TcpLineSource;

use async_trait::async_trait;
use thiserror::Error;

/// Longest line accepted before the buffered bytes are discarded.
pub const MAX_LINE_BYTES: usize = 4096;

// ============================================================================
// Error Types
// ============================================================================

/// Non-fatal transport errors. The acquisition loop logs these and keeps polling.
#[derive(Error, Debug)]
pub enum TransportFault {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Timeout waiting for connection")]
    Timeout,
}

// ============================================================================
// Line Source
// ============================================================================

/// Trait abstracting where sensor lines come from.
///
/// `poll` must return promptly: either a line that is already available, or
/// `Ok(None)` after at most a short read timeout. Implementations own their
/// connection and handle reconnection internally; a source with no connection
/// simply keeps returning `Ok(None)`.
#[async_trait]
pub trait LineSource: Send + 'static {
    /// Next available line, trimmed of surrounding whitespace.
    async fn poll(&mut self) -> Result<Option<String>, TransportFault>;

    /// Human-readable name for logging (e.g. "serial:COM10", "stdin").
    fn source_name(&self) -> &str;

    /// Whether the underlying connection is currently open.
    fn is_connected(&self) -> bool {
        true
    }
}

/// Decode raw bytes into a trimmed line. Blank lines count as no data.
pub(crate) fn decode_line(raw: &[u8]) -> Result<Option<String>, TransportFault> {
    let text = std::str::from_utf8(raw).map_err(|e| TransportFault::Decode(e.to_string()))?;
    let line = text.trim();
    if line.is_empty() {
        Ok(None)
    } else {
        Ok(Some(line.to_string()))
    }
}

/// Byte accumulator that hands out newline-terminated lines.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    bytes: Vec<u8>,
}

impl LineBuffer {
    pub(crate) fn extend(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);
    }

    /// Remove and return the first complete line (without the `\n`).
    pub(crate) fn next_line(&mut self) -> Option<Vec<u8>> {
        let end = self.bytes.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.bytes.drain(..=end).collect();
        line.pop();
        Some(line)
    }

    /// Whether the buffered partial line has grown past [`MAX_LINE_BYTES`].
    pub(crate) fn is_overflowing(&self) -> bool {
        self.bytes.len() > MAX_LINE_BYTES
    }

    pub(crate) fn clear(&mut self) {
        self.bytes.clear();
    }
}
