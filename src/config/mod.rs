//! Scan Configuration Module
//!
//! Provides the scanner configuration loaded from TOML files, replacing
//! hardcoded geometry, thresholds and transport settings with
//! operator-tunable values.
//!
//! ## Loading Order
//!
//! 1. `PIPE_SCAN_CONFIG` environment variable (path to TOML file)
//! 2. `pipe_scan.toml` in the current working directory
//! 3. Built-in defaults (see [`defaults`])
//!
//! The loaded [`ScanConfig`] is passed explicitly to the components that
//! need it; there is no process-wide config singleton.

mod scan_config;
pub mod defaults;

pub use scan_config::*;
