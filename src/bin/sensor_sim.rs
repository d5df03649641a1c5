//! Pipe Sensor Simulation
//!
//! Prints the lines a distance sensor board would send while being pulled
//! through a pipe, at the board's output rate. The first sweeps show a clean
//! pipe (for the learning pass); later sweeps can carry a blockage.
//!
//! # Usage
//! ```bash
//! ./sensor-sim --blockage-at 14 | ./pipe-scan --stdin
//! ./sensor-sim --sweeps 3 --speed 0 --seed 7 > capture.txt
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, Write};
use std::time::{Duration, Instant};

use pipe_scan::acquisition::{SimulatedBlockage, SimulatedPipe, SimulationProfile};
use pipe_scan::config::defaults;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "sensor-sim")]
#[command(about = "Simulated pipe distance sensor for pipe-scan testing")]
#[command(version)]
struct Args {
    /// Pipe length in cm
    #[arg(long, default_value_t = defaults::PIPE_LENGTH_CM, value_parser = clap::value_parser!(u32).range(1..))]
    pipe_length: u32,

    /// Distance between readings in cm
    #[arg(long, default_value_t = defaults::SENSOR_STEP_CM, value_parser = clap::value_parser!(u32).range(1..))]
    step: u32,

    /// Distance to a clean pipe wall in cm
    #[arg(long, default_value = "12.0")]
    wall_distance: f64,

    /// Gaussian noise standard deviation in cm
    #[arg(long, default_value = "0.4")]
    noise: f64,

    /// Blockage start position in cm (no blockage if omitted)
    #[arg(long, value_name = "CM")]
    blockage_at: Option<u32>,

    /// Blockage length along the pipe in cm
    #[arg(long, default_value = "2")]
    blockage_width: u32,

    /// How far the blockage reaches into the pipe in cm
    #[arg(long, default_value = "7.0")]
    blockage_depth: f64,

    /// Clean sweeps before the blockage appears
    #[arg(long, default_value = "1")]
    clean_sweeps: u32,

    /// Number of sweeps to generate (0 = run forever)
    #[arg(long, default_value = "0")]
    sweeps: u32,

    /// Milliseconds between lines (0 = as fast as possible)
    #[arg(short, long, default_value_t = defaults::POLL_INTERVAL_MS)]
    speed: u64,

    /// Print a sensor boot banner first (exercises the parser's reject path)
    #[arg(long)]
    banner: bool,

    /// Suppress mission log (only output sensor lines)
    #[arg(short, long)]
    quiet: bool,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,
}

// ============================================================================
// Logging Utilities
// ============================================================================

fn log_mission(elapsed: Duration, message: &str, quiet: bool) {
    if !quiet {
        let secs = elapsed.as_secs();
        eprintln!("[{:02}:{:02}:{:02}] {}", secs / 3600, (secs % 3600) / 60, secs % 60, message);
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> Result<()> {
    let args = Args::parse();

    let profile = SimulationProfile {
        pipe_length_cm: args.pipe_length,
        sensor_step_cm: args.step,
        base_distance_cm: args.wall_distance,
        noise_std_cm: args.noise,
        blockage: args.blockage_at.map(|position_cm| SimulatedBlockage {
            position_cm,
            width_cm: args.blockage_width,
            depth_cm: args.blockage_depth,
        }),
        clean_sweeps: args.clean_sweeps,
        seed: args.seed,
    };
    let mut pipe = SimulatedPipe::new(profile).context("Invalid simulation parameters")?;

    let start = Instant::now();
    let interval = Duration::from_millis(args.speed);
    let q = args.quiet;

    log_mission(start.elapsed(), &"=".repeat(60), q);
    log_mission(start.elapsed(), "PIPE SENSOR SIMULATION", q);
    log_mission(start.elapsed(), &"=".repeat(60), q);
    log_mission(
        start.elapsed(),
        &format!(
            "  Pipe: {} cm | Step: {} cm | {} readings per sweep",
            args.pipe_length,
            args.step,
            pipe.readings_per_sweep()
        ),
        q,
    );
    log_mission(
        start.elapsed(),
        &format!("  Wall distance: {:.1} cm | Noise: {:.2} cm", args.wall_distance, args.noise),
        q,
    );
    match args.blockage_at {
        Some(at) => log_mission(
            start.elapsed(),
            &format!(
                "  Blockage: {} cm (+{} cm), {:.1} cm deep, after {} clean sweep(s)",
                at, args.blockage_width, args.blockage_depth, args.clean_sweeps
            ),
            q,
        ),
        None => log_mission(start.elapsed(), "  Blockage: none", q),
    }
    if let Some(seed) = args.seed {
        log_mission(start.elapsed(), &format!("  Random seed: {}", seed), q);
    }
    log_mission(start.elapsed(), &"=".repeat(60), q);

    let stdout = io::stdout();
    let mut out = stdout.lock();

    if args.banner {
        writeln!(out, "Ultrasonic sensor ready")?;
    }

    let mut last_sweep = 0;
    loop {
        if args.sweeps > 0 && pipe.sweep() >= args.sweeps {
            break;
        }
        let tick = Instant::now();

        let line = pipe.next_line();
        if writeln!(out, "{}", line).and_then(|_| out.flush()).is_err() {
            // Reader went away (e.g. pipe-scan exited)
            break;
        }

        if pipe.sweep() != last_sweep {
            last_sweep = pipe.sweep();
            let note = if pipe.blockage_active() { "next sweep shows the blockage" } else { "clean" };
            log_mission(start.elapsed(), &format!(">>> Sweep {} complete ({})", last_sweep, note), q);
        }

        if !interval.is_zero() {
            let elapsed = tick.elapsed();
            if elapsed < interval {
                std::thread::sleep(interval - elapsed);
            }
        }
    }

    log_mission(start.elapsed(), &"=".repeat(60), q);
    log_mission(start.elapsed(), &format!("Total readings: {}", pipe.generated()), q);
    log_mission(start.elapsed(), &"=".repeat(60), q);

    Ok(())
}
