//! Blockage detection - pointwise deviation against the clean-pipe baseline
//!
//! The live scan is compared index-by-index with the baseline profile. The
//! largest absolute deviation wins; if it exceeds the threshold the blockage
//! is reported at the physical position recorded for that index.

use serde::{Deserialize, Serialize};

/// A detected obstruction. Transient: only ever logged, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlockageEvent {
    /// Offset along the pipe (cm) where the maximum deviation was observed
    pub position: u32,
    /// Absolute difference between live and baseline distance (cm)
    pub deviation: f64,
    /// Buffer index of the maximum deviation
    pub index: usize,
}

impl std::fmt::Display for BlockageEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Blockage detected at {} cm (deviation {:.1} cm)",
            self.position, self.deviation
        )
    }
}

/// Compare a live scan against the baseline profile.
///
/// Returns `None` while the live scan is shorter than the baseline (not
/// enough data to compare yet) and when the maximum deviation does not
/// strictly exceed `threshold`. Only indices `0..baseline.len()` take part;
/// live readings past the end of the baseline are ignored. On ties the lowest
/// index wins.
///
/// If the winning index has no recorded position the event is reported at
/// position 0.
pub fn detect(
    baseline: &[f64],
    live: &[f64],
    positions: &[u32],
    threshold: f64,
) -> Option<BlockageEvent> {
    if baseline.is_empty() || live.len() < baseline.len() {
        return None;
    }

    let (index, deviation) = baseline
        .iter()
        .zip(live)
        .map(|(expected, actual)| (actual - expected).abs())
        .enumerate()
        .fold((0usize, f64::NEG_INFINITY), |best, (i, dev)| {
            // Strict comparison keeps the first occurrence on ties
            if dev > best.1 {
                (i, dev)
            } else {
                best
            }
        });

    if deviation > threshold {
        Some(BlockageEvent {
            position: positions.get(index).copied().unwrap_or(0),
            deviation,
            index,
        })
    } else {
        None
    }
}
