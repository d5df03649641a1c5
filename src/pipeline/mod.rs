//! Scan Pipeline Module
//!
//! ```text
//! LineSource ──poll──▶ ReadingParser ──reading──▶ ScanHandle.ingest
//!                                                     │
//!                                  BlockageEvent ─────┴──▶ EventLog
//! ```
//!
//! The [`AcquisitionLoop`] is the only writer of readings. Commands (learning,
//! analysis, log access) come through clones of the same [`ScanHandle`] from
//! the HTTP surface or tests.

mod handle;
pub mod acquisition_loop;

pub use acquisition_loop::{AcquisitionLoop, PollOutcome};
pub use handle::*;
