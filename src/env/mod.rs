//! # Environment Adapters
//!
//! The simulator is an external collaborator. The pipeline only needs
//! [`Environment::reset`] and [`Environment::step`]; everything else about
//! the game (rendering, frame skipping, reward shaping) stays behind the
//! adapter.
//!
//! Two adapters ship with the crate:
//!
//! - [`ScriptedEnv`]: replays a fixed reward sequence. Deterministic, used to
//!   pin the n-step aggregation down exactly.
//! - [`CatchEnv`]: a small pixel game with a three-action paddle, enough to
//!   train an agent end to end.

mod catch;
mod scripted;

pub use catch::CatchEnv;
pub use scripted::ScriptedEnv;

use ndarray::Array1;

use crate::error::Result;

/// A flattened observation.
pub type State = Array1<f32>;

/// Index into the discrete action space.
pub type Action = usize;

/// Outcome of a single environment step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    pub state: State,
    pub reward: f32,
    pub done: bool,
}

/// The environment interface consumed by the experience source.
///
/// Implementations take their seed at construction so that a run can be
/// replayed exactly.
pub trait Environment {
    /// Start a new episode and return its first observation.
    fn reset(&mut self) -> Result<State>;

    /// Apply `action` and advance one step.
    fn step(&mut self, action: Action) -> Result<StepResult>;

    fn num_actions(&self) -> usize;

    /// Length of the flattened observation vector.
    fn observation_size(&self) -> usize;
}

impl<E: Environment + ?Sized> Environment for Box<E> {
    fn reset(&mut self) -> Result<State> {
        (**self).reset()
    }

    fn step(&mut self, action: Action) -> Result<StepResult> {
        (**self).step(action)
    }

    fn num_actions(&self) -> usize {
        (**self).num_actions()
    }

    fn observation_size(&self) -> usize {
        (**self).observation_size()
    }
}

/// Build a bundled environment by name.
pub fn make(name: &str, seed: u64) -> Result<Box<dyn Environment>> {
    match name {
        "catch" => Ok(Box::new(CatchEnv::new(seed))),
        other => Err(crate::error::DqnError::invalid_configuration(
            "env_name",
            format!("no bundled adapter for '{}' (available: catch)", other),
        )),
    }
}
