//! Shared engine handle
//!
//! [`ScanHandle`] is cloned into the acquisition loop and every command
//! surface. The scan state sits behind one `RwLock` so each transition,
//! ingest or snapshot is a single critical section; the event log and the
//! acquisition counters carry their own synchronization.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::{ScanConfig, ScanSettings};
use crate::event_log::{EventLog, LogEntry};
use crate::scan::{IngestOutcome, Phase, PipeScanState, ScanError, ScanSnapshot};

/// Session messages shown to the operator.
pub const MSG_LEARNING_STARTED: &str = "Learning started";
pub const MSG_LEARNING_FINISHED: &str = "Learning finished";
pub const MSG_ANALYSIS_STARTED: &str = "Pipe analysis started";
pub const MSG_SENSOR_LINK_LOST: &str = "Sensor link lost";
pub const MSG_SENSOR_LINK_RESTORED: &str = "Sensor link restored";

// ============================================================================
// Acquisition Counters
// ============================================================================

/// Lock-free counters updated by the acquisition loop.
#[derive(Debug, Default)]
pub struct AcquisitionCounters {
    lines_received: AtomicU64,
    readings_accepted: AtomicU64,
    parse_rejects: AtomicU64,
    transport_faults: AtomicU64,
    blockages_detected: AtomicU64,
    connected: AtomicBool,
}

impl AcquisitionCounters {
    pub(crate) fn record_line(&self) {
        self.lines_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reading(&self) {
        self.readings_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_parse_reject(&self) {
        self.parse_rejects.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_fault(&self) {
        self.transport_faults.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_blockage(&self) {
        self.blockages_detected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Relaxed);
    }

    pub fn stats(&self) -> AcquisitionStats {
        AcquisitionStats {
            lines_received: self.lines_received.load(Ordering::Relaxed),
            readings_accepted: self.readings_accepted.load(Ordering::Relaxed),
            parse_rejects: self.parse_rejects.load(Ordering::Relaxed),
            transport_faults: self.transport_faults.load(Ordering::Relaxed),
            blockages_detected: self.blockages_detected.load(Ordering::Relaxed),
            source_connected: self.connected.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the acquisition counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquisitionStats {
    pub lines_received: u64,
    pub readings_accepted: u64,
    pub parse_rejects: u64,
    pub transport_faults: u64,
    pub blockages_detected: u64,
    pub source_connected: bool,
}

// ============================================================================
// Scan Handle
// ============================================================================

/// Result of a phase command: the phase it left behind and whether it changed anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub phase: Phase,
    pub changed: bool,
}

/// Consistent view of the scan state for status reporting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanStatus {
    pub phase: Phase,
    pub baseline_len: usize,
    pub live_len: usize,
    pub settings: ScanSettings,
}

/// Cloneable access to the scan engine: state, session log and counters.
#[derive(Debug, Clone)]
pub struct ScanHandle {
    state: Arc<RwLock<PipeScanState>>,
    log: Arc<EventLog>,
    counters: Arc<AcquisitionCounters>,
}

impl ScanHandle {
    pub fn new(settings: ScanSettings, log: EventLog) -> Self {
        Self {
            state: Arc::new(RwLock::new(PipeScanState::new(settings))),
            log: Arc::new(log),
            counters: Arc::new(AcquisitionCounters::default()),
        }
    }

    pub fn from_config(config: &ScanConfig) -> Self {
        Self::new(config.scan, EventLog::new(config.log.max_entries))
    }

    fn read(&self) -> RwLockReadGuard<'_, PipeScanState> {
        self.state.read().unwrap_or_else(|e| {
            warn!("RwLock poisoned on PipeScanState (read), recovering");
            e.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, PipeScanState> {
        self.state.write().unwrap_or_else(|e| {
            warn!("RwLock poisoned on PipeScanState (write), recovering");
            e.into_inner()
        })
    }

    /// Begin a learning pass. Always succeeds.
    pub fn start_learning(&self) -> Phase {
        let mut state = self.write();
        state.start_learning();
        self.log.append(MSG_LEARNING_STARTED);
        state.phase()
    }

    /// Finish the learning pass. `changed` is false (and nothing is logged)
    /// outside `Learning`.
    pub fn end_learning(&self) -> Transition {
        let mut state = self.write();
        let changed = state.end_learning();
        if changed {
            self.log.append(MSG_LEARNING_FINISHED);
        }
        Transition {
            phase: state.phase(),
            changed,
        }
    }

    /// Begin an analysis pass. On an empty baseline the rejection is written to
    /// the session log and returned; the state is unchanged.
    ///
    /// The session message is appended before the write guard is released, so
    /// it always precedes any blockage found in the new pass.
    pub fn start_analysis(&self) -> Result<Phase, ScanError> {
        let mut state = self.write();
        match state.start_analysis() {
            Ok(()) => {
                self.log.append(MSG_ANALYSIS_STARTED);
                Ok(state.phase())
            }
            Err(e) => {
                self.log.append(e.to_string());
                Err(e)
            }
        }
    }

    /// Route one parsed reading through the state machine.
    pub fn ingest(&self, reading: f64) -> IngestOutcome {
        self.write().ingest(reading)
    }

    pub fn snapshot(&self) -> ScanSnapshot {
        self.read().snapshot()
    }

    pub fn phase(&self) -> Phase {
        self.read().phase()
    }

    pub fn settings(&self) -> ScanSettings {
        *self.read().settings()
    }

    /// Phase, buffer sizes and settings taken under one read guard, without
    /// copying the buffers.
    pub fn status(&self) -> ScanStatus {
        let state = self.read();
        ScanStatus {
            phase: state.phase(),
            baseline_len: state.baseline().len(),
            live_len: state.live_distances().len(),
            settings: *state.settings(),
        }
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn get_log(&self) -> Vec<LogEntry> {
        self.log.entries()
    }

    pub fn clear_log(&self) {
        self.log.clear();
    }

    pub fn counters(&self) -> &AcquisitionCounters {
        &self.counters
    }

    pub fn stats(&self) -> AcquisitionStats {
        self.counters.stats()
    }
}

impl Default for ScanHandle {
    fn default() -> Self {
        Self::new(ScanSettings::default(), EventLog::default())
    }
}
