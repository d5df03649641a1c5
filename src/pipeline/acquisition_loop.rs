//! Periodic acquisition loop shared across all input modes.
//!
//! One tick = one poll of the [`LineSource`]. A line is parsed, the reading
//! is routed through the [`ScanHandle`], and a detected blockage is written to
//! the session log. Parse rejects and transport faults never stop the loop;
//! only the cancellation token does.

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::handle::{AcquisitionStats, ScanHandle, MSG_SENSOR_LINK_LOST, MSG_SENSOR_LINK_RESTORED};
use crate::acquisition::{LineSource, ReadingParser};
use crate::scan::IngestOutcome;

/// What a single poll did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PollOutcome {
    /// The source had nothing waiting
    NoData,
    /// A line arrived but was not a distance reading
    Rejected,
    /// The transport reported a fault
    Fault,
    /// A reading was routed through the state machine
    Ingested(IngestOutcome),
}

/// Owns the source and drives it until cancelled.
pub struct AcquisitionLoop<S: LineSource> {
    source: S,
    handle: ScanHandle,
    poll_interval: Duration,
    cancel_token: CancellationToken,
    /// True while consecutive polls are failing
    in_fault: bool,
}

impl<S: LineSource> AcquisitionLoop<S> {
    pub fn new(
        source: S,
        handle: ScanHandle,
        poll_interval: Duration,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            source,
            handle,
            poll_interval,
            cancel_token,
            in_fault: false,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Poll the source once and process whatever it returned.
    pub async fn poll_once(&mut self) -> PollOutcome {
        let polled = self.source.poll().await;
        let counters = self.handle.counters();
        counters.set_connected(self.source.is_connected());

        let line = match polled {
            Ok(Some(line)) => line,
            Ok(None) => return PollOutcome::NoData,
            Err(e) => {
                counters.record_fault();
                warn!(source = self.source.source_name(), error = %e, "Transport fault");
                if !self.in_fault {
                    self.in_fault = true;
                    self.handle
                        .log()
                        .append(format!("{MSG_SENSOR_LINK_LOST}: {e}"));
                }
                return PollOutcome::Fault;
            }
        };

        counters.record_line();
        if self.in_fault {
            self.in_fault = false;
            info!(source = self.source.source_name(), "Sensor link restored");
            self.handle.log().append(MSG_SENSOR_LINK_RESTORED);
        }

        let reading = match ReadingParser::parse(&line) {
            Ok(reading) => reading,
            Err(e) => {
                counters.record_parse_reject();
                debug!(line = %line, error = %e, "Discarding non-reading line");
                return PollOutcome::Rejected;
            }
        };

        counters.record_reading();
        let outcome = self.handle.ingest(reading);

        if let Some(event) = outcome.blockage() {
            counters.record_blockage();
            warn!(
                position_cm = event.position,
                deviation_cm = event.deviation,
                index = event.index,
                "Blockage detected"
            );
            self.handle.log().append(event.to_string());
        }

        PollOutcome::Ingested(outcome)
    }

    /// Run until the cancellation token fires. Returns the final statistics.
    pub async fn run(mut self) -> AcquisitionStats {
        info!(
            source = self.source.source_name(),
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Acquisition loop started"
        );

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let cancel = self.cancel_token.clone();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("[AcquisitionLoop] Shutdown signal received");
                    break;
                }
                _ = ticker.tick() => {}
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("[AcquisitionLoop] Shutdown signal received");
                    break;
                }
                _ = self.poll_once() => {}
            }
        }

        let stats = self.handle.stats();
        info!(
            lines_received = stats.lines_received,
            readings_accepted = stats.readings_accepted,
            parse_rejects = stats.parse_rejects,
            transport_faults = stats.transport_faults,
            blockages_detected = stats.blockages_detected,
            "Acquisition loop stopped"
        );
        stats
    }
}
