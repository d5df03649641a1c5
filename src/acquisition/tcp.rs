//! TCP Line Source
//!
//! Reads sensor lines from a serial-to-network bridge (ser2net, an ESP32
//! bridge, or `sensor-sim` behind `nc -l`). Each poll waits at most
//! `read_timeout_ms` for a complete line; partial lines are kept across
//! polls. A dropped connection is reported once as a fault and then retried
//! with exponential backoff, without ever blocking a poll on the backoff.

use super::{decode_line, LineSource, TransportFault, MAX_LINE_BYTES};
use crate::config::{defaults, TcpConfig};
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;

/// TCP line client with reconnection and timeout resilience
pub struct TcpLineSource {
    host: String,
    port: u16,
    name: String,
    stream: Option<BufReader<TcpStream>>,
    /// Bytes of the line currently being received
    pending: Vec<u8>,
    read_timeout: Duration,
    connect_timeout: Duration,
    max_reconnect_delay: Duration,
    /// Earliest time for the next connect attempt while disconnected
    next_attempt: Option<Instant>,
    /// Consecutive failed connection attempts (resets on success)
    reconnect_attempts: u32,
    /// Total lines received since creation
    lines_received: u64,
    /// Total successful reconnections
    reconnections: u64,
}

impl TcpLineSource {
    pub fn new(host: &str, port: u16, config: &TcpConfig) -> Self {
        Self {
            host: host.to_string(),
            port,
            name: format!("tcp:{host}:{port}"),
            stream: None,
            pending: Vec::with_capacity(64),
            read_timeout: Duration::from_millis(config.read_timeout_ms),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            max_reconnect_delay: Duration::from_secs(config.max_reconnect_delay_secs),
            next_attempt: None,
            reconnect_attempts: 0,
            lines_received: 0,
            reconnections: 0,
        }
    }

    /// Build from a `HOST:PORT` string.
    pub fn from_addr(addr: &str, config: &TcpConfig) -> Result<Self, TransportFault> {
        let (host, port) = addr.rsplit_once(':').ok_or_else(|| {
            TransportFault::ConnectionFailed(format!("invalid address {addr:?}, expected HOST:PORT"))
        })?;
        let port: u16 = port
            .parse()
            .map_err(|_| TransportFault::ConnectionFailed(format!("invalid port in {addr:?}")))?;
        if host.is_empty() {
            return Err(TransportFault::ConnectionFailed(format!(
                "missing host in {addr:?}"
            )));
        }
        Ok(Self::new(host, port, config))
    }

    /// Connect with timeout and TCP keepalive.
    pub async fn connect(&mut self) -> Result<(), TransportFault> {
        if self.stream.is_some() {
            return Ok(());
        }

        let addr = format!("{}:{}", self.host, self.port);
        tracing::info!(address = %addr, "Connecting to sensor bridge");

        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| TransportFault::Timeout)?
            .map_err(|e| TransportFault::ConnectionFailed(e.to_string()))?;

        // Enable TCP keepalive to detect dead bridges
        let sock_ref = socket2::SockRef::from(&stream);
        let keepalive = socket2::TcpKeepalive::new()
            .with_time(Duration::from_secs(30))
            .with_interval(Duration::from_secs(10));
        let _ = sock_ref.set_tcp_keepalive(&keepalive);

        if self.reconnect_attempts > 0 {
            self.reconnections += 1;
            tracing::info!(
                attempts = self.reconnect_attempts,
                total_reconnections = self.reconnections,
                "Sensor bridge reconnection successful"
            );
        }

        self.stream = Some(BufReader::new(stream));
        self.pending.clear();
        self.next_attempt = None;
        self.reconnect_attempts = 0;

        tracing::info!("Sensor bridge connection established");
        Ok(())
    }

    pub fn lines_received(&self) -> u64 {
        self.lines_received
    }

    /// Drop the connection and schedule the next attempt with exponential backoff.
    fn schedule_reconnect(&mut self) {
        self.stream = None;
        self.pending.clear();
        self.reconnect_attempts = self.reconnect_attempts.saturating_add(1);

        let delay_secs = defaults::TCP_INITIAL_RECONNECT_DELAY_SECS
            .saturating_mul(2u64.saturating_pow(self.reconnect_attempts - 1))
            .min(self.max_reconnect_delay.as_secs());
        self.next_attempt = Some(Instant::now() + Duration::from_secs(delay_secs));

        tracing::warn!(
            attempt = self.reconnect_attempts,
            delay_secs,
            "Sensor bridge unavailable, will retry"
        );
    }
}

#[async_trait]
impl LineSource for TcpLineSource {
    async fn poll(&mut self) -> Result<Option<String>, TransportFault> {
        if self.stream.is_none() {
            if matches!(self.next_attempt, Some(at) if Instant::now() < at) {
                return Ok(None);
            }
            if let Err(e) = self.connect().await {
                self.schedule_reconnect();
                return Err(e);
            }
        }

        let Some(reader) = self.stream.as_mut() else {
            return Ok(None);
        };

        // read_until keeps partial bytes in `pending` if the timeout fires first
        let read_result =
            tokio::time::timeout(self.read_timeout, reader.read_until(b'\n', &mut self.pending)).await;

        match read_result {
            Err(_) => {
                if self.pending.len() > MAX_LINE_BYTES {
                    self.pending.clear();
                    return Err(TransportFault::Decode(format!(
                        "no line terminator within {MAX_LINE_BYTES} bytes"
                    )));
                }
                Ok(None)
            }
            Ok(Ok(0)) => {
                tracing::warn!("Sensor bridge closed the connection");
                self.schedule_reconnect();
                Err(TransportFault::ConnectionClosed)
            }
            Ok(Ok(_)) => {
                if self.pending.last() != Some(&b'\n') {
                    // EOF in the middle of a line; the next read reports the close
                    return Ok(None);
                }
                let raw = std::mem::take(&mut self.pending);
                let line = decode_line(&raw)?;
                if line.is_some() {
                    self.lines_received += 1;
                }
                Ok(line)
            }
            Ok(Err(e)) => {
                self.schedule_reconnect();
                Err(TransportFault::Io(e))
            }
        }
    }

    fn source_name(&self) -> &str {
        &self.name
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}
