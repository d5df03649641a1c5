//! Serial Line Source
//!
//! Reads the sensor board's text output from a serial port. The port is
//! optional at runtime: if it cannot be opened (unplugged board, wrong
//! device name) every poll returns no data and a reopen is attempted every
//! `reconnect_interval_secs`.

use super::{decode_line, LineBuffer, LineSource, TransportFault};
use crate::config::SerialConfig;
use async_trait::async_trait;
use serialport::{ClearBuffer, SerialPort};
use std::io::Read;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Serial sensor link with settle delay and periodic reopen.
pub struct SerialLineSource {
    port_name: String,
    name: String,
    baud_rate: u32,
    read_timeout: Duration,
    settle: Duration,
    reconnect_interval: Duration,
    port: Option<Box<dyn SerialPort>>,
    /// Input is discarded until this instant after (re)opening
    ready_at: Option<Instant>,
    /// Earliest time for the next open attempt while disconnected
    next_attempt: Instant,
    buffer: LineBuffer,
    /// Total successful opens since creation
    connections: u64,
}

impl SerialLineSource {
    /// Create a source for `port_name`. Nothing is opened until [`connect`](Self::connect)
    /// or the first poll.
    pub fn new(port_name: &str, config: &SerialConfig) -> Self {
        Self {
            port_name: port_name.to_string(),
            name: format!("serial:{port_name}"),
            baud_rate: config.baud_rate,
            read_timeout: Duration::from_millis(config.read_timeout_ms),
            settle: Duration::from_millis(config.settle_ms),
            reconnect_interval: Duration::from_secs(config.reconnect_interval_secs),
            port: None,
            ready_at: None,
            next_attempt: Instant::now(),
            buffer: LineBuffer::default(),
            connections: 0,
        }
    }

    /// Open the port. Input read during the settle window is thrown away.
    pub fn connect(&mut self) -> Result<(), TransportFault> {
        if self.port.is_some() {
            return Ok(());
        }

        info!(port = %self.port_name, baud = self.baud_rate, "Opening serial port");
        let port = serialport::new(&self.port_name, self.baud_rate)
            .timeout(self.read_timeout)
            .open()
            .map_err(|e| TransportFault::ConnectionFailed(format!("{}: {}", self.port_name, e)))?;

        self.port = Some(port);
        self.ready_at = Some(Instant::now() + self.settle);
        self.buffer.clear();
        self.connections += 1;
        info!(
            port = %self.port_name,
            settle_ms = self.settle.as_millis() as u64,
            "Serial port open, waiting for sensor to settle"
        );
        Ok(())
    }

    /// Total number of successful opens.
    pub fn connections(&self) -> u64 {
        self.connections
    }

    fn drop_port(&mut self) {
        if self.port.take().is_some() {
            warn!(port = %self.port_name, "Serial port lost");
        }
        self.ready_at = None;
        self.buffer.clear();
        self.next_attempt = Instant::now() + self.reconnect_interval;
    }

    fn next_buffered_line(&mut self) -> Result<Option<String>, TransportFault> {
        while let Some(raw) = self.buffer.next_line() {
            if let Some(line) = decode_line(&raw)? {
                return Ok(Some(line));
            }
        }
        if self.buffer.is_overflowing() {
            self.buffer.clear();
            return Err(TransportFault::Decode(format!(
                "no line terminator within {} bytes",
                super::MAX_LINE_BYTES
            )));
        }
        Ok(None)
    }
}

#[async_trait]
impl LineSource for SerialLineSource {
    async fn poll(&mut self) -> Result<Option<String>, TransportFault> {
        let now = Instant::now();

        if self.port.is_none() {
            if now < self.next_attempt {
                return Ok(None);
            }
            self.next_attempt = now + self.reconnect_interval;
            if let Err(e) = self.connect() {
                debug!(error = %e, "Serial port unavailable");
                return Ok(None);
            }
        }

        if let Some(ready_at) = self.ready_at {
            if now < ready_at {
                return Ok(None);
            }
            self.ready_at = None;
            if let Some(port) = self.port.as_mut() {
                if let Err(e) = port.clear(ClearBuffer::Input) {
                    debug!(error = %e, "Could not clear serial input buffer");
                }
            }
            info!(port = %self.port_name, "Serial sensor ready");
        }

        // Hand out lines already buffered before touching the port again
        if let Some(line) = self.next_buffered_line()? {
            return Ok(Some(line));
        }

        let Some(port) = self.port.as_mut() else {
            return Ok(None);
        };

        // Only read what the driver already holds, so this never waits for the port timeout
        let available = match port.bytes_to_read() {
            Ok(n) => n as usize,
            Err(e) => {
                self.drop_port();
                return Err(TransportFault::ConnectionFailed(e.to_string()));
            }
        };
        if available == 0 {
            return Ok(None);
        }

        let mut chunk = vec![0u8; available];
        match port.read(&mut chunk) {
            Ok(n) => self.buffer.extend(&chunk[..n]),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
            Err(e) => {
                self.drop_port();
                return Err(TransportFault::Io(e));
            }
        }

        self.next_buffered_line()
    }

    fn source_name(&self) -> &str {
        &self.name
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }
}
