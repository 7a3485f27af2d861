//! # nstep-dqn - N-step Deep Q-Learning
//!
//! A single-environment DQN training pipeline with n-step Bellman unrolling.
//! An agent plays an [`env::Environment`], an [`experience::ExperienceSource`]
//! folds every `n` consecutive steps into one discounted experience, a
//! [`replay_buffer::ReplayBuffer`] stores them, and the
//! [`trainer::Trainer`] fits a Q-network against a periodically synced
//! target network.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nstep_dqn::config::Hyperparams;
//! use nstep_dqn::env::CatchEnv;
//! use nstep_dqn::metrics::LogSink;
//! use nstep_dqn::trainer::TrainerBuilder;
//!
//! let params = Hyperparams::catch();
//! let mut trainer = TrainerBuilder::new(params)
//!     .n_steps(4)
//!     .build(CatchEnv::new(123))
//!     .unwrap();
//!
//! let mut sink = LogSink::new(1000);
//! let state = trainer.run(Some(50_000), &mut sink).unwrap();
//! println!("stopped: {:?}", state.stop_reason);
//! ```
//!
//! ## Module Organization
//!
//! - [`actions`] - Argmax and epsilon-greedy action selection, epsilon decay
//! - [`agent`] - Observation batch to action mapping
//! - [`config`] - Hyperparameters, presets and validation
//! - [`env`] - Environment trait and bundled adapters
//! - [`error`] - Error types and result handling
//! - [`experience`] - N-step experience generation
//! - [`loss`] - N-step TD loss
//! - [`metrics`] - Progress reporting sinks
//! - [`network`] - Q-value estimators
//! - [`optimizer`] - Gradient descent optimizers
//! - [`replay_buffer`] - Bounded uniform replay
//! - [`target`] - Target network copy
//! - [`trainer`] - The training loop

pub mod actions;
pub mod agent;
pub mod config;
pub mod env;
pub mod error;
pub mod experience;
pub mod loss;
pub mod metrics;
pub mod network;
pub mod optimizer;
pub mod replay_buffer;
pub mod target;
pub mod trainer;

pub use env::{Action, State};
pub use error::{DqnError, Result};

#[cfg(test)]
mod tests;
