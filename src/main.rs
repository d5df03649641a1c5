//! pipe-scan - Sewer Pipe Blockage Scanner
//!
//! Runs the acquisition loop against the configured sensor link and serves
//! the command surface over HTTP.
//!
//! # Usage
//!
//! ```bash
//! # Sensor board on a serial port
//! pipe-scan --serial /dev/ttyUSB0
//!
//! # Serial-to-network bridge
//! pipe-scan --tcp 192.168.4.1:23
//!
//! # Piped simulator output
//! sensor-sim --blockage-at 14 | pipe-scan --stdin
//!
//! # Built-in simulated sensor
//! pipe-scan --simulate --blockage-at 14
//! ```
//!
//! # Environment Variables
//!
//! - `PIPE_SCAN_CONFIG`: Path to the TOML configuration file
//! - `PIPE_SCAN_SERVER_ADDR`: HTTP server bind address
//! - `PIPE_SCAN_LOG_FORMAT`: Set to `json` for JSON log output
//! - `PIPE_SCAN_CORS_ORIGINS`: Comma-separated origins allowed to call the API
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use pipe_scan::acquisition::{
    DisconnectedSource, LineSource, ReplaySource, SerialLineSource, SimulatedBlockage,
    SimulatedSensor, SimulationProfile, StdinLineSource, TcpLineSource,
};
use pipe_scan::api::{create_app, ApiState};
use pipe_scan::config::ScanConfig;
use pipe_scan::pipeline::{AcquisitionLoop, ScanHandle};

/// Environment variable selecting the log output format.
const LOG_FORMAT_ENV_VAR: &str = "PIPE_SCAN_LOG_FORMAT";

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "pipe-scan")]
#[command(about = "Sewer pipe blockage scanner")]
#[command(version)]
#[command(group(
    ArgGroup::new("source")
        .args(["serial", "tcp", "stdin", "replay", "simulate"])
        .multiple(false)
))]
struct CliArgs {
    /// Path to a TOML configuration file (overrides the standard search order)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Read the sensor from a serial port (e.g. COM10, /dev/ttyUSB0)
    #[arg(long, value_name = "PORT")]
    serial: Option<String>,

    /// Serial baud rate (overrides serial.baud_rate)
    #[arg(long)]
    baud: Option<u32>,

    /// Read the sensor through a serial-to-network bridge
    #[arg(long, value_name = "HOST:PORT")]
    tcp: Option<String>,

    /// Read sensor lines from stdin
    /// Use with the simulator: sensor-sim | pipe-scan --stdin
    #[arg(long)]
    stdin: bool,

    /// Replay a recorded capture, one line per poll
    #[arg(long, value_name = "FILE")]
    replay: Option<PathBuf>,

    /// Use the built-in simulated sensor
    #[arg(long)]
    simulate: bool,

    /// Simulated blockage position in cm (only with --simulate)
    #[arg(long, value_name = "CM", requires = "simulate")]
    blockage_at: Option<u32>,

    /// Simulator random seed (only with --simulate)
    #[arg(long, requires = "simulate")]
    seed: Option<u64>,

    /// Override the HTTP server address (default: server.addr)
    #[arg(short, long, env = "PIPE_SCAN_SERVER_ADDR")]
    addr: Option<String>,

    /// Run the acquisition loop without the HTTP server
    #[arg(long)]
    no_server: bool,
}

// ============================================================================
// Task Names for Supervisor Logging
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum TaskName {
    HttpServer,
    Acquisition,
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskName::HttpServer => write!(f, "HttpServer"),
            TaskName::Acquisition => write!(f, "Acquisition"),
        }
    }
}

// ============================================================================
// Startup Helpers
// ============================================================================

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = std::env::var(LOG_FORMAT_ENV_VAR)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

/// Load the configuration file and apply command-line overrides.
fn load_config(args: &CliArgs) -> Result<ScanConfig> {
    let mut config = match &args.config {
        Some(path) => ScanConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ScanConfig::load(),
    };

    if let Some(port) = &args.serial {
        config.serial.port = Some(port.clone());
    }
    if let Some(baud) = args.baud {
        config.serial.baud_rate = baud;
    }
    if let Some(addr) = &args.addr {
        config.server.addr = addr.clone();
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

// ============================================================================
// Supervisor
// ============================================================================

/// Spawn the HTTP server task into the JoinSet.
fn spawn_http_server(
    task_set: &mut JoinSet<Result<TaskName>>,
    listener: tokio::net::TcpListener,
    app: axum::Router,
    cancel_token: CancellationToken,
) {
    task_set.spawn(async move {
        info!("[HttpServer] Task starting");

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                info!("[HttpServer] Received shutdown signal");
            })
            .await;

        match result {
            Ok(()) => {
                info!("[HttpServer] Graceful shutdown complete");
                Ok(TaskName::HttpServer)
            }
            Err(e) => {
                error!("[HttpServer] Server error: {}", e);
                Err(anyhow::anyhow!("HTTP server error: {}", e))
            }
        }
    });
}

/// Run the supervisor loop: monitor tasks, cancel everything on failure.
async fn run_supervisor(
    task_set: &mut JoinSet<Result<TaskName>>,
    cancel_token: CancellationToken,
) -> Result<()> {
    info!("Supervisor: all tasks spawned, monitoring...");

    while let Some(result) = task_set.join_next().await {
        match result {
            Ok(Ok(task_name)) => {
                info!("Supervisor: task {} completed", task_name);
            }
            Ok(Err(e)) => {
                error!("Supervisor: task failed with error: {}", e);
                cancel_token.cancel();
                return Err(e);
            }
            Err(e) => {
                error!("Supervisor: task panicked: {}", e);
                cancel_token.cancel();
                return Err(anyhow::anyhow!("Task panicked: {}", e));
            }
        }
    }

    info!("Supervisor: all tasks completed");
    Ok(())
}

/// Run the engine with any line source.
///
/// Every input mode flows through here: the acquisition loop and the HTTP
/// server share one `ScanHandle` and one cancellation token.
async fn run_engine<S: LineSource>(
    source: S,
    config: &ScanConfig,
    serve_http: bool,
    cancel_token: CancellationToken,
) -> Result<()> {
    let handle = ScanHandle::from_config(config);
    let source_name = source.source_name().to_string();
    let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();

    if serve_http {
        let addr: SocketAddr = config
            .server
            .addr
            .parse()
            .with_context(|| format!("Invalid server address {}", config.server.addr))?;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind HTTP server to {}", addr))?;
        info!("HTTP command surface listening on http://{}/api/v1", addr);

        let app = create_app(ApiState::new(handle.clone(), source_name.clone()));
        spawn_http_server(&mut task_set, listener, app, cancel_token.clone());
    }

    let acquisition = AcquisitionLoop::new(
        source,
        handle,
        config.acquisition.poll_interval(),
        cancel_token.clone(),
    );
    task_set.spawn(async move {
        info!("[Acquisition] Task starting");
        let _stats = acquisition.run().await;
        Ok(TaskName::Acquisition)
    });

    run_supervisor(&mut task_set, cancel_token).await
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = CliArgs::parse();
    let config = load_config(&args)?;
    let serve_http = !args.no_server;

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  pipe-scan - Sewer Pipe Blockage Scanner");
    info!(
        "  Step: {} cm | Pipe: {} cm | Threshold: {:.1} cm | Poll: {} ms",
        config.scan.sensor_step_cm,
        config.scan.pipe_length_cm,
        config.scan.deviation_threshold_cm,
        config.acquisition.poll_interval_ms
    );
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    if let Some(addr) = &args.tcp {
        info!("Input: TCP bridge at {}", addr);
        let source = TcpLineSource::from_addr(addr, &config.tcp)
            .with_context(|| format!("Invalid bridge address {}", addr))?;
        run_engine(source, &config, serve_http, cancel_token).await?;
    } else if args.stdin {
        info!("Input: stdin");
        run_engine(StdinLineSource::new(), &config, serve_http, cancel_token).await?;
    } else if let Some(path) = &args.replay {
        info!("Input: replay of {}", path.display());
        let source = ReplaySource::from_file(path)
            .with_context(|| format!("Failed to read capture {}", path.display()))?;
        run_engine(source, &config, serve_http, cancel_token).await?;
    } else if args.simulate {
        let profile = SimulationProfile {
            pipe_length_cm: config.scan.pipe_length_cm,
            sensor_step_cm: config.scan.sensor_step_cm,
            blockage: args.blockage_at.map(|position_cm| SimulatedBlockage {
                position_cm,
                width_cm: 2,
                depth_cm: 7.0,
            }),
            seed: args.seed,
            ..SimulationProfile::default()
        };
        info!(blockage = ?profile.blockage, "Input: simulated sensor");
        let source = SimulatedSensor::new(profile).context("Invalid simulation profile")?;
        run_engine(source, &config, serve_http, cancel_token).await?;
    } else if let Some(port) = config.serial.port.clone() {
        info!("Input: serial port {} @ {} baud", port, config.serial.baud_rate);
        let mut source = SerialLineSource::new(&port, &config.serial);
        if let Err(e) = source.connect() {
            warn!(error = %e, "Serial port not available yet, will keep retrying");
        }
        run_engine(source, &config, serve_http, cancel_token).await?;
    } else {
        warn!("No sensor configured (use --serial, --tcp, --stdin, --replay or --simulate); running disconnected");
        run_engine(DisconnectedSource, &config, serve_http, cancel_token).await?;
    }

    info!("pipe-scan shutdown complete");
    Ok(())
}
