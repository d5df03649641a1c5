//! pipe-scan: Sewer Pipe Blockage Scanner
//!
//! A distance sensor is pulled through a pipe and reports one reading per
//! step. A learning pass over a clean pipe records the baseline profile; an
//! analysis pass compares each new sweep against it and reports the position
//! of the largest deviation once it exceeds the threshold.
//!
//! ## Architecture
//!
//! - **Acquisition**: line sources (serial, TCP bridge, stdin, replay, simulated) and the reading parser
//! - **Scan**: phase state machine and blockage detector
//! - **Event Log**: timestamped session messages for the operator
//! - **Pipeline**: shared engine handle and the periodic acquisition loop
//! - **API**: HTTP command surface

pub mod acquisition;
pub mod api;
pub mod config;
pub mod event_log;
pub mod pipeline;
pub mod scan;

// Re-export configuration
pub use config::{ConfigError, ScanConfig, ScanSettings};

// Re-export commonly used types
pub use acquisition::{LineSource, ParseError, ReadingParser, TransportFault};
pub use event_log::{EventLog, LogEntry};
pub use pipeline::{AcquisitionLoop, AcquisitionStats, ScanHandle};
pub use scan::{BlockageEvent, IngestOutcome, Phase, PipeScanState, ScanError, ScanSnapshot};
