//! Hyperparameters for a training run.
//!
//! Presets mirror the classic Atari settings; `catch` is sized for the
//! bundled toy game. Files are JSON, validated on load.

use std::path::Path;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{DqnError, Result};

/// Seed used when none is configured.
pub const DEFAULT_SEED: u64 = 123;

/// Default Bellman unroll length.
pub const DEFAULT_N_STEPS: usize = 4;

/// Where the estimator's arithmetic should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    #[default]
    Cpu,
    Cuda,
}

impl Device {
    pub fn from_flag(cuda: bool) -> Self {
        if cuda {
            Device::Cuda
        } else {
            Device::Cpu
        }
    }

    /// The device actually used. The ndarray backend only runs on the CPU.
    pub fn resolve(self) -> Device {
        if self == Device::Cuda {
            warn!("CUDA requested but the ndarray backend is CPU-only, falling back to CPU");
        }
        Device::Cpu
    }
}

/// Loss applied to the n-step TD error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LossKind {
    #[default]
    Mse,
    Huber,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hyperparams {
    pub env_name: String,
    pub run_name: String,
    /// Mean reward over the last 100 episodes that counts as solved.
    pub stop_reward: f32,
    pub replay_size: usize,
    pub replay_initial: usize,
    pub target_net_sync: usize,
    pub epsilon_frames: usize,
    pub epsilon_start: f32,
    pub epsilon_final: f32,
    pub learning_rate: f32,
    pub gamma: f32,
    pub batch_size: usize,
    pub n_steps: usize,
    pub seed: u64,
    pub device: Device,
    pub hidden_layers: Vec<usize>,
    pub loss: LossKind,
}

impl Default for Hyperparams {
    fn default() -> Self {
        Self::pong()
    }
}

impl Hyperparams {
    pub fn pong() -> Self {
        Hyperparams {
            env_name: "PongNoFrameskip-v4".to_string(),
            run_name: "pong".to_string(),
            stop_reward: 18.0,
            replay_size: 100_000,
            replay_initial: 10_000,
            target_net_sync: 1000,
            epsilon_frames: 100_000,
            epsilon_start: 1.0,
            epsilon_final: 0.02,
            learning_rate: 0.0001,
            gamma: 0.99,
            batch_size: 32,
            n_steps: DEFAULT_N_STEPS,
            seed: DEFAULT_SEED,
            device: Device::Cpu,
            hidden_layers: vec![256, 128],
            loss: LossKind::Mse,
        }
    }

    pub fn breakout_small() -> Self {
        Hyperparams {
            env_name: "BreakoutNoFrameskip-v4".to_string(),
            run_name: "breakout-small".to_string(),
            stop_reward: 500.0,
            replay_size: 300_000,
            replay_initial: 20_000,
            target_net_sync: 1000,
            epsilon_frames: 1_000_000,
            epsilon_final: 0.1,
            batch_size: 64,
            ..Self::pong()
        }
    }

    pub fn breakout() -> Self {
        Hyperparams {
            env_name: "BreakoutNoFrameskip-v4".to_string(),
            run_name: "breakout".to_string(),
            stop_reward: 500.0,
            replay_size: 1_000_000,
            replay_initial: 50_000,
            target_net_sync: 10_000,
            epsilon_frames: 1_000_000,
            epsilon_final: 0.1,
            learning_rate: 0.00025,
            ..Self::pong()
        }
    }

    pub fn invaders() -> Self {
        Hyperparams {
            env_name: "SpaceInvadersNoFrameskip-v4".to_string(),
            run_name: "invaders".to_string(),
            ..Self::breakout()
        }
    }

    /// Small settings for the bundled catch game.
    pub fn catch() -> Self {
        Hyperparams {
            env_name: "catch".to_string(),
            run_name: "catch".to_string(),
            stop_reward: 0.8,
            replay_size: 10_000,
            replay_initial: 500,
            target_net_sync: 200,
            epsilon_frames: 5_000,
            epsilon_final: 0.02,
            learning_rate: 0.001,
            gamma: 0.9,
            hidden_layers: vec![64],
            ..Self::pong()
        }
    }

    /// Look up a preset by name.
    pub fn preset(name: &str) -> Result<Self> {
        match name {
            "pong" => Ok(Self::pong()),
            "breakout-small" => Ok(Self::breakout_small()),
            "breakout" => Ok(Self::breakout()),
            "invaders" => Ok(Self::invaders()),
            "catch" => Ok(Self::catch()),
            other => Err(DqnError::invalid_configuration(
                "preset",
                format!("unknown preset '{}' (expected pong, breakout-small, breakout, invaders or catch)", other),
            )),
        }
    }

    /// Load and validate hyperparameters from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let params: Hyperparams = serde_json::from_str(&content)?;
        params.validate()?;
        Ok(params)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let serialized = serde_json::to_string_pretty(self)?;
        std::fs::write(path, serialized)?;
        Ok(())
    }

    /// Discount applied to the bootstrap value after an n-step window.
    pub fn gamma_n(&self) -> f32 {
        self.gamma.powi(self.n_steps as i32)
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("n_steps", self.n_steps),
            ("batch_size", self.batch_size),
            ("replay_size", self.replay_size),
            ("target_net_sync", self.target_net_sync),
            ("epsilon_frames", self.epsilon_frames),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(DqnError::invalid_configuration(name, "must be > 0"));
            }
        }
        if self.replay_initial < self.batch_size {
            return Err(DqnError::invalid_configuration(
                "replay_initial",
                format!("must be >= batch_size ({})", self.batch_size),
            ));
        }
        if self.replay_initial > self.replay_size {
            return Err(DqnError::invalid_configuration(
                "replay_initial",
                format!("must be <= replay_size ({})", self.replay_size),
            ));
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(DqnError::invalid_configuration("gamma", "must be in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.epsilon_start) {
            return Err(DqnError::invalid_configuration("epsilon_start", "must be in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.epsilon_final) {
            return Err(DqnError::invalid_configuration("epsilon_final", "must be in [0, 1]"));
        }
        if self.epsilon_final > self.epsilon_start {
            return Err(DqnError::invalid_configuration("epsilon_final", "must be <= epsilon_start"));
        }
        if !(self.learning_rate > 0.0) {
            return Err(DqnError::invalid_configuration("learning_rate", "must be > 0"));
        }
        if self.hidden_layers.iter().any(|&units| units == 0) {
            return Err(DqnError::invalid_configuration("hidden_layers", "every layer needs at least one unit"));
        }
        Ok(())
    }
}
