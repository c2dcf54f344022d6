//! Engine configuration.
//!
//! Every option carries a documented default and a valid range. Out-of-range
//! values fail fast with `EchoError::Config` at construction — nothing is
//! silently clamped.

use serde::{Deserialize, Serialize};

use crate::character::TRAIT_COUNT;
use crate::errors::{EchoError, Result};

/// Configuration for building a [`DeepTreeEcho`](crate::engine::DeepTreeEcho) engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeepTreeEchoConfig {
    /// Number of reservoir units (default: 64, range: 2..=4096)
    pub reservoir_size: usize,
    /// Input embedding dimension (default: 16, range: 1..=1024)
    pub input_dim: usize,
    /// Children per node in the reservoir tree (default: 3, range: 1..=16)
    pub branching_factor: usize,
    /// Leak rate α in the state update (default: 0.3, range: [0, 1))
    pub leak_rate: f64,
    /// Spectral-radius ceiling for the tree weight matrix (default: 0.95, range: (0, 1.0])
    pub spectral_radius: f64,
    /// Ridge regularization λ for readout training (default: 1e-3, range: [0, 1e3])
    pub ridge_lambda: f64,
    /// Training window capacity, FIFO (default: 128, range: 1..=65536)
    pub training_window: usize,
    /// Interaction log retention horizon (default: 256, range: 1..=1_000_000)
    pub interaction_retention: usize,
    /// Per-interaction relaxation rate toward trait defaults / neutral mood
    /// (default: 0.02, range: [0, 1))
    pub trait_decay: f64,
    /// Initial trait weights, one per trait in enumeration order
    /// (default: 0.95/0.85/0.90/0.92/0.88/0.93, each in [0, 1])
    pub trait_defaults: [f64; TRAIT_COUNT],
    /// Random seed for reproducibility; mixed with the registry's seed
    /// material before any weight draw (default: 42)
    pub seed: u64,
}

impl Default for DeepTreeEchoConfig {
    fn default() -> Self {
        Self {
            reservoir_size: 64,
            input_dim: 16,
            branching_factor: 3,
            leak_rate: 0.3,
            spectral_radius: 0.95,
            ridge_lambda: 1e-3,
            training_window: 128,
            interaction_retention: 256,
            trait_decay: 0.02,
            trait_defaults: [0.95, 0.85, 0.90, 0.92, 0.88, 0.93],
            seed: 42,
        }
    }
}

impl DeepTreeEchoConfig {
    /// Validate every option against its documented range.
    pub fn validate(&self) -> Result<()> {
        if !(2..=4096).contains(&self.reservoir_size) {
            return Err(EchoError::Config(format!(
                "reservoir_size {} outside 2..=4096",
                self.reservoir_size
            )));
        }
        if !(1..=1024).contains(&self.input_dim) {
            return Err(EchoError::Config(format!(
                "input_dim {} outside 1..=1024",
                self.input_dim
            )));
        }
        if !(1..=16).contains(&self.branching_factor) {
            return Err(EchoError::Config(format!(
                "branching_factor {} outside 1..=16",
                self.branching_factor
            )));
        }
        if !self.leak_rate.is_finite() || !(0.0..1.0).contains(&self.leak_rate) {
            return Err(EchoError::Config(format!(
                "leak_rate {} outside [0, 1)",
                self.leak_rate
            )));
        }
        if !self.spectral_radius.is_finite()
            || self.spectral_radius <= 0.0
            || self.spectral_radius > 1.0
        {
            return Err(EchoError::Config(format!(
                "spectral_radius {} outside (0, 1.0]",
                self.spectral_radius
            )));
        }
        if !self.ridge_lambda.is_finite() || !(0.0..=1e3).contains(&self.ridge_lambda) {
            return Err(EchoError::Config(format!(
                "ridge_lambda {} outside [0, 1e3]",
                self.ridge_lambda
            )));
        }
        if !(1..=65536).contains(&self.training_window) {
            return Err(EchoError::Config(format!(
                "training_window {} outside 1..=65536",
                self.training_window
            )));
        }
        if !(1..=1_000_000).contains(&self.interaction_retention) {
            return Err(EchoError::Config(format!(
                "interaction_retention {} outside 1..=1_000_000",
                self.interaction_retention
            )));
        }
        if !self.trait_decay.is_finite() || !(0.0..1.0).contains(&self.trait_decay) {
            return Err(EchoError::Config(format!(
                "trait_decay {} outside [0, 1)",
                self.trait_decay
            )));
        }
        for (i, &w) in self.trait_defaults.iter().enumerate() {
            if !w.is_finite() || !(0.0..=1.0).contains(&w) {
                return Err(EchoError::Config(format!(
                    "trait_defaults[{i}] = {w} outside [0, 1]"
                )));
            }
        }
        Ok(())
    }
}
