//! Stdin Line Source
//!
//! Reads sensor lines from stdin for integration testing and demos:
//! `sensor-sim --blockage-at 14 | pipe-scan --stdin`

use super::{decode_line, LineSource, TransportFault};
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader, Stdin};

/// How long one poll waits for a complete line before reporting no data.
const STDIN_POLL_TIMEOUT: Duration = Duration::from_millis(50);

/// Line source that reads from stdin
pub struct StdinLineSource {
    reader: BufReader<Stdin>,
    /// Bytes of the line currently being received
    pending: Vec<u8>,
    eof: bool,
    lines_received: u64,
}

impl StdinLineSource {
    pub fn new() -> Self {
        Self {
            reader: BufReader::new(tokio::io::stdin()),
            pending: Vec::with_capacity(64),
            eof: false,
            lines_received: 0,
        }
    }
}

impl Default for StdinLineSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LineSource for StdinLineSource {
    async fn poll(&mut self) -> Result<Option<String>, TransportFault> {
        if self.eof {
            return Ok(None);
        }

        let read = tokio::time::timeout(
            STDIN_POLL_TIMEOUT,
            self.reader.read_until(b'\n', &mut self.pending),
        )
        .await;

        match read {
            Err(_) => Ok(None),
            Ok(Ok(0)) => {
                // A final line without a newline still counts; EOF is reported on the next poll
                if !self.pending.is_empty() {
                    let raw = std::mem::take(&mut self.pending);
                    if let Some(line) = decode_line(&raw)? {
                        self.lines_received += 1;
                        return Ok(Some(line));
                    }
                }
                self.eof = true;
                tracing::info!(lines = self.lines_received, "Stdin reached end of input");
                Err(TransportFault::ConnectionClosed)
            }
            Ok(Ok(_)) => {
                if self.pending.last() != Some(&b'\n') {
                    return Ok(None);
                }
                let raw = std::mem::take(&mut self.pending);
                let line = decode_line(&raw)?;
                if line.is_some() {
                    self.lines_received += 1;
                }
                Ok(line)
            }
            Ok(Err(e)) => Err(TransportFault::Io(e)),
        }
    }

    fn source_name(&self) -> &str {
        "stdin"
    }

    fn is_connected(&self) -> bool {
        !self.eof
    }
}
