//! Simulated pipe sensor
//!
//! Generates the readings a sensor would report while being pulled through a
//! pipe at a constant step: a clean pipe reads the wall distance plus noise,
//! and an optional blockage shortens the distance over a span of positions.
//! The first `clean_sweeps` passes never show the blockage, so a learning
//! pass can capture a clean baseline before the deposit "appears".

use super::{format_reading, LineSource, TransportFault};
use crate::config::defaults;
use async_trait::async_trait;
use rand::prelude::*;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("invalid noise standard deviation: {0}")]
    InvalidNoise(String),

    #[error("invalid pipe geometry: {0}")]
    InvalidGeometry(String),
}

/// A deposit that narrows the pipe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulatedBlockage {
    /// Start of the blockage along the pipe (cm)
    pub position_cm: u32,
    /// Length of the blockage along the pipe (cm)
    pub width_cm: u32,
    /// How much closer the obstruction is than the wall (cm)
    pub depth_cm: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationProfile {
    pub pipe_length_cm: u32,
    pub sensor_step_cm: u32,
    /// Distance to a clean wall (cm)
    pub base_distance_cm: f64,
    pub noise_std_cm: f64,
    pub blockage: Option<SimulatedBlockage>,
    /// Sweeps generated before the blockage shows up
    pub clean_sweeps: u32,
    pub seed: Option<u64>,
}

impl Default for SimulationProfile {
    fn default() -> Self {
        Self {
            pipe_length_cm: defaults::PIPE_LENGTH_CM,
            sensor_step_cm: defaults::SENSOR_STEP_CM,
            base_distance_cm: 12.0,
            noise_std_cm: 0.4,
            blockage: None,
            clean_sweeps: 1,
            seed: None,
        }
    }
}

/// Reading generator for one simulated pipe.
pub struct SimulatedPipe {
    profile: SimulationProfile,
    rng: StdRng,
    noise: Normal<f64>,
    /// Readings per sweep
    readings_per_sweep: u32,
    /// Index of the next reading within the current sweep
    index: u32,
    sweep: u32,
    generated: u64,
}

impl SimulatedPipe {
    pub fn new(profile: SimulationProfile) -> Result<Self, SimulationError> {
        if profile.sensor_step_cm == 0 {
            return Err(SimulationError::InvalidGeometry(
                "sensor_step_cm must be > 0".to_string(),
            ));
        }
        if profile.pipe_length_cm < profile.sensor_step_cm {
            return Err(SimulationError::InvalidGeometry(format!(
                "pipe_length_cm ({}) is shorter than one step ({})",
                profile.pipe_length_cm, profile.sensor_step_cm
            )));
        }
        if !profile.noise_std_cm.is_finite() || profile.noise_std_cm < 0.0 {
            return Err(SimulationError::InvalidNoise(format!(
                "noise_std_cm must be a finite value >= 0, got {}",
                profile.noise_std_cm
            )));
        }
        let noise = Normal::new(0.0, profile.noise_std_cm)
            .map_err(|e| SimulationError::InvalidNoise(e.to_string()))?;
        let rng = match profile.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            readings_per_sweep: profile.pipe_length_cm / profile.sensor_step_cm,
            profile,
            rng,
            noise,
            index: 0,
            sweep: 0,
            generated: 0,
        })
    }

    /// Completed sweeps so far.
    pub fn sweep(&self) -> u32 {
        self.sweep
    }

    pub fn readings_per_sweep(&self) -> u32 {
        self.readings_per_sweep
    }

    pub fn generated(&self) -> u64 {
        self.generated
    }

    /// Whether the blockage is visible in the current sweep.
    pub fn blockage_active(&self) -> bool {
        self.profile.blockage.is_some() && self.sweep >= self.profile.clean_sweeps
    }

    /// Position (cm) of the next reading.
    pub fn next_position(&self) -> u32 {
        self.index * self.profile.sensor_step_cm
    }

    /// Generate the next distance reading (cm), advancing along the pipe.
    pub fn next_distance(&mut self) -> u32 {
        let position = self.next_position();
        let mut distance = self.profile.base_distance_cm + self.noise.sample(&mut self.rng);

        if self.blockage_active() {
            if let Some(b) = self.profile.blockage {
                if position >= b.position_cm && position < b.position_cm + b.width_cm.max(1) {
                    distance -= b.depth_cm;
                }
            }
        }

        self.generated += 1;
        self.index += 1;
        if self.index >= self.readings_per_sweep {
            self.index = 0;
            self.sweep += 1;
        }

        distance.round().max(0.0) as u32
    }

    /// Next reading formatted as a sensor line.
    pub fn next_line(&mut self) -> String {
        format_reading(self.next_distance())
    }
}

/// [`LineSource`] backed by a [`SimulatedPipe`]. Every poll yields one line.
pub struct SimulatedSensor {
    pipe: SimulatedPipe,
}

impl SimulatedSensor {
    pub fn new(profile: SimulationProfile) -> Result<Self, SimulationError> {
        Ok(Self {
            pipe: SimulatedPipe::new(profile)?,
        })
    }

    pub fn pipe(&self) -> &SimulatedPipe {
        &self.pipe
    }
}

#[async_trait]
impl LineSource for SimulatedSensor {
    async fn poll(&mut self) -> Result<Option<String>, TransportFault> {
        Ok(Some(self.pipe.next_line()))
    }

    fn source_name(&self) -> &str {
        "simulated"
    }
}
