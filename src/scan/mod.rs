//! Pipe Scan State Machine - learning pass, analysis pass, blockage detection
//!
//! `PipeScanState` is the single owner of the scan buffers:
//!
//! - **Baseline profile**: distances captured while `Learning` (the clean pipe)
//! - **Live scan**: distances and positions captured while `Analyzing`
//!
//! ## Phases
//!
//! ```text
//!            start_learning              end_learning
//!   Idle ─────────────────────▶ Learning ─────────────▶ Idle
//!     │                            │
//!     │ start_analysis             │ start_analysis
//!     │ (baseline non-empty)       │ (baseline non-empty)
//!     ▼                            ▼
//!   Analyzing ◀────────────────────┘
//! ```
//!
//! `start_learning` is accepted from every phase. Every reading ingested while
//! `Analyzing` runs the [`detector`] over a consistent view of both buffers.

pub mod detector;

pub use detector::{detect, BlockageEvent};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::ScanSettings;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error("Error: finish a learning pass before starting analysis (baseline is empty)")]
    EmptyBaseline,
}

// ============================================================================
// Phase
// ============================================================================

/// Operating mode of the scan engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    /// Readings are discarded
    #[default]
    Idle,
    /// Readings build the clean-pipe baseline
    Learning,
    /// Readings build the live scan and are checked for blockages
    Analyzing,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Idle => write!(f, "IDLE"),
            Phase::Learning => write!(f, "LEARNING"),
            Phase::Analyzing => write!(f, "ANALYZING"),
        }
    }
}

// ============================================================================
// Snapshot & Ingest Results
// ============================================================================

/// Read-only copy of the buffers for display refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanSnapshot {
    pub phase: Phase,
    pub baseline: Vec<f64>,
    pub live_distances: Vec<f64>,
    pub live_positions: Vec<u32>,
}

/// Where an ingested reading went.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IngestOutcome {
    /// Phase was `Idle`; the reading was dropped
    Discarded,
    /// Appended to the baseline profile
    Baseline { index: usize },
    /// Appended to the live scan at `position`, with the detection result
    Live {
        position: u32,
        blockage: Option<BlockageEvent>,
    },
}

impl IngestOutcome {
    pub fn blockage(&self) -> Option<BlockageEvent> {
        match self {
            IngestOutcome::Live { blockage, .. } => *blockage,
            _ => None,
        }
    }
}

// ============================================================================
// Pipe Scan State
// ============================================================================

/// Phase state machine and the buffers it gates.
///
/// Not synchronized itself; share it behind one lock (see
/// [`ScanHandle`](crate::pipeline::ScanHandle)) so that each transition,
/// ingest or snapshot is atomic.
#[derive(Debug, Clone)]
pub struct PipeScanState {
    phase: Phase,
    baseline: Vec<f64>,
    live_distances: Vec<f64>,
    live_positions: Vec<u32>,
    /// Position assigned to the next analysis reading (cm)
    next_position: u32,
    settings: ScanSettings,
    /// Set once the baseline outgrows the nominal pipe length in this pass
    overlength_warned: bool,
}

impl PipeScanState {
    pub fn new(settings: ScanSettings) -> Self {
        Self {
            phase: Phase::Idle,
            baseline: Vec::new(),
            live_distances: Vec::new(),
            live_positions: Vec::new(),
            next_position: 0,
            settings,
            overlength_warned: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    pub fn baseline(&self) -> &[f64] {
        &self.baseline
    }

    pub fn live_distances(&self) -> &[f64] {
        &self.live_distances
    }

    pub fn live_positions(&self) -> &[u32] {
        &self.live_positions
    }

    /// Position the next analysis reading will be recorded at (cm).
    pub fn next_position(&self) -> u32 {
        self.next_position
    }

    /// Begin a learning pass from any phase.
    ///
    /// Clears the baseline and the live scan and rewinds the position counter.
    pub fn start_learning(&mut self) {
        info!(from = %self.phase, "Starting learning pass");
        self.phase = Phase::Learning;
        self.baseline.clear();
        self.clear_live();
        self.overlength_warned = false;
    }

    /// Finish the learning pass. Returns `true` if a transition happened;
    /// outside `Learning` this is a no-op.
    pub fn end_learning(&mut self) -> bool {
        if self.phase != Phase::Learning {
            debug!(phase = %self.phase, "end_learning ignored outside learning pass");
            return false;
        }
        self.phase = Phase::Idle;
        info!(baseline_len = self.baseline.len(), "Learning pass finished");
        true
    }

    /// Begin an analysis pass.
    ///
    /// Fails without touching any state when no baseline has been learned.
    /// Calling it while already `Analyzing` restarts the pass.
    pub fn start_analysis(&mut self) -> Result<(), ScanError> {
        if self.baseline.is_empty() {
            warn!(phase = %self.phase, "Analysis rejected: baseline is empty");
            return Err(ScanError::EmptyBaseline);
        }
        info!(
            from = %self.phase,
            baseline_len = self.baseline.len(),
            "Starting analysis pass"
        );
        self.phase = Phase::Analyzing;
        self.clear_live();
        Ok(())
    }

    /// Route one reading according to the current phase.
    pub fn ingest(&mut self, reading: f64) -> IngestOutcome {
        match self.phase {
            Phase::Idle => IngestOutcome::Discarded,
            Phase::Learning => {
                self.baseline.push(reading);
                let expected = self.settings.expected_readings();
                if !self.overlength_warned && self.baseline.len() > expected {
                    self.overlength_warned = true;
                    warn!(
                        baseline_len = self.baseline.len(),
                        expected,
                        pipe_length_cm = self.settings.pipe_length_cm,
                        "Baseline is longer than the nominal pipe length"
                    );
                }
                IngestOutcome::Baseline {
                    index: self.baseline.len() - 1,
                }
            }
            Phase::Analyzing => {
                let position = self.next_position;
                self.live_distances.push(reading);
                self.live_positions.push(position);
                self.next_position = self.next_position.saturating_add(self.settings.sensor_step_cm);

                let blockage = detect(
                    &self.baseline,
                    &self.live_distances,
                    &self.live_positions,
                    self.settings.deviation_threshold_cm,
                );
                IngestOutcome::Live { position, blockage }
            }
        }
    }

    /// Copy the buffers for display.
    pub fn snapshot(&self) -> ScanSnapshot {
        ScanSnapshot {
            phase: self.phase,
            baseline: self.baseline.clone(),
            live_distances: self.live_distances.clone(),
            live_positions: self.live_positions.clone(),
        }
    }

    fn clear_live(&mut self) {
        self.live_distances.clear();
        self.live_positions.clear();
        self.next_position = 0;
    }
}

impl Default for PipeScanState {
    fn default() -> Self {
        Self::new(ScanSettings::default())
    }
}
