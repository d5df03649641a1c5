//! Scan Configuration - operator-tunable TOML values
//!
//! Every tunable the engine uses lives in one of these sections. Each struct
//! implements `Default` with the values from [`defaults`](super::defaults), so
//! a missing file or a partial file behaves exactly like the built-in setup.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use super::defaults;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "PIPE_SCAN_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "pipe_scan.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for a scanner deployment.
///
/// Load with `ScanConfig::load()` which searches:
/// 1. `$PIPE_SCAN_CONFIG` env var
/// 2. `./pipe_scan.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Scan geometry and detection threshold
    #[serde(default)]
    pub scan: ScanSettings,

    /// Acquisition loop cadence
    #[serde(default)]
    pub acquisition: AcquisitionConfig,

    /// Serial sensor link
    #[serde(default)]
    pub serial: SerialConfig,

    /// TCP line source (serial-to-network bridges)
    #[serde(default)]
    pub tcp: TcpConfig,

    /// Session event log
    #[serde(default)]
    pub log: LogConfig,

    /// HTTP command surface
    #[serde(default)]
    pub server: ServerConfig,
}

impl ScanConfig {
    /// Load configuration using the standard search order:
    /// 1. `$PIPE_SCAN_CONFIG` environment variable
    /// 2. `./pipe_scan.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded scan config from {}", CONFIG_ENV_VAR);
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {}, falling back", CONFIG_ENV_VAR);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", CONFIG_ENV_VAR);
            }
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded scan config from ./{}", LOCAL_CONFIG_FILE);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", LOCAL_CONFIG_FILE);
                }
            }
        }

        info!("No {} found, using built-in defaults", LOCAL_CONFIG_FILE);
        Self::default()
    }

    /// Load from a specific TOML file path and validate it.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config: Self = toml::from_str(&contents)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Save config to a file (the shell's "save settings" action).
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = self.to_toml()?;
        std::fs::write(path, contents).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        info!(path = %path.display(), "Scan config saved");
        Ok(())
    }

    /// Validate every section, collecting all problems before failing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        let s = &self.scan;
        if s.sensor_step_cm == 0 {
            errors.push("scan.sensor_step_cm must be > 0".to_string());
        }
        if s.pipe_length_cm == 0 {
            errors.push("scan.pipe_length_cm must be > 0".to_string());
        }
        if !s.deviation_threshold_cm.is_finite() || s.deviation_threshold_cm < 0.0 {
            errors.push(format!(
                "scan.deviation_threshold_cm must be a finite value >= 0 (got {})",
                s.deviation_threshold_cm
            ));
        }

        if self.acquisition.poll_interval_ms == 0 {
            errors.push("acquisition.poll_interval_ms must be > 0".to_string());
        }

        if self.serial.baud_rate == 0 {
            errors.push("serial.baud_rate must be > 0".to_string());
        }
        if matches!(self.serial.port.as_deref(), Some(p) if p.trim().is_empty()) {
            errors.push("serial.port must not be empty when set".to_string());
        }

        if self.tcp.read_timeout_ms == 0 {
            errors.push("tcp.read_timeout_ms must be > 0".to_string());
        }
        if self.tcp.connect_timeout_secs == 0 {
            errors.push("tcp.connect_timeout_secs must be > 0".to_string());
        }

        if self.server.addr.parse::<SocketAddr>().is_err() {
            errors.push(format!(
                "server.addr must be a socket address like 127.0.0.1:8080 (got {:?})",
                self.server.addr
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {}", e),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Scan Settings
// ============================================================================

/// Geometry and detection parameters handed to the scan state machine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanSettings {
    /// Position advance per accepted analysis reading (cm).
    #[serde(default = "default_sensor_step")]
    pub sensor_step_cm: u32,

    /// Nominal pipe length (cm). Not enforced by detection.
    #[serde(default = "default_pipe_length")]
    pub pipe_length_cm: u32,

    /// A deviation must be strictly greater than this to raise a blockage (cm).
    #[serde(default = "default_deviation_threshold")]
    pub deviation_threshold_cm: f64,
}

fn default_sensor_step() -> u32 {
    defaults::SENSOR_STEP_CM
}

fn default_pipe_length() -> u32 {
    defaults::PIPE_LENGTH_CM
}

fn default_deviation_threshold() -> f64 {
    defaults::DEVIATION_THRESHOLD_CM
}

impl ScanSettings {
    /// Number of readings one pass over the nominal pipe length produces.
    pub fn expected_readings(&self) -> usize {
        (self.pipe_length_cm / self.sensor_step_cm.max(1)) as usize
    }
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            sensor_step_cm: default_sensor_step(),
            pipe_length_cm: default_pipe_length(),
            deviation_threshold_cm: default_deviation_threshold(),
        }
    }
}

// ============================================================================
// Acquisition Config
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Period between source polls (ms).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval() -> u64 {
    defaults::POLL_INTERVAL_MS
}

impl AcquisitionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
        }
    }
}

// ============================================================================
// Serial Config
// ============================================================================

/// Serial link to the sensor board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Device name, e.g. `COM10` or `/dev/ttyUSB0`. Unset means no serial link.
    ///
    /// Can be overridden by the `--serial` CLI flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_serial_read_timeout")]
    pub read_timeout_ms: u64,

    /// Wait after opening before input is trusted (ms).
    #[serde(default = "default_settle")]
    pub settle_ms: u64,

    #[serde(default = "default_serial_reconnect")]
    pub reconnect_interval_secs: u64,
}

fn default_baud_rate() -> u32 {
    defaults::SERIAL_BAUD_RATE
}

fn default_serial_read_timeout() -> u64 {
    defaults::SERIAL_READ_TIMEOUT_MS
}

fn default_settle() -> u64 {
    defaults::SERIAL_SETTLE_MS
}

fn default_serial_reconnect() -> u64 {
    defaults::SERIAL_RECONNECT_INTERVAL_SECS
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: default_baud_rate(),
            read_timeout_ms: default_serial_read_timeout(),
            settle_ms: default_settle(),
            reconnect_interval_secs: default_serial_reconnect(),
        }
    }
}

// ============================================================================
// TCP Config
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TcpConfig {
    #[serde(default = "default_tcp_read_timeout")]
    pub read_timeout_ms: u64,

    #[serde(default = "default_tcp_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_tcp_max_reconnect_delay")]
    pub max_reconnect_delay_secs: u64,
}

fn default_tcp_read_timeout() -> u64 {
    defaults::TCP_READ_TIMEOUT_MS
}

fn default_tcp_connect_timeout() -> u64 {
    defaults::TCP_CONNECT_TIMEOUT_SECS
}

fn default_tcp_max_reconnect_delay() -> u64 {
    defaults::TCP_MAX_RECONNECT_DELAY_SECS
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: default_tcp_read_timeout(),
            connect_timeout_secs: default_tcp_connect_timeout(),
            max_reconnect_delay_secs: default_tcp_max_reconnect_delay(),
        }
    }
}

// ============================================================================
// Log Config
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Oldest entries are dropped past this count. 0 keeps everything.
    #[serde(default = "default_log_max_entries")]
    pub max_entries: usize,
}

fn default_log_max_entries() -> usize {
    defaults::LOG_MAX_ENTRIES
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            max_entries: default_log_max_entries(),
        }
    }
}

// ============================================================================
// Server Config
// ============================================================================

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server bind address.
    ///
    /// Can be overridden by the `--addr` CLI flag.
    #[serde(default = "default_server_addr")]
    pub addr: String,
}

fn default_server_addr() -> String {
    defaults::SERVER_ADDR.to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_server_addr(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
