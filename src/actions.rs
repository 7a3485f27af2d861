//! Action selection from per-action value estimates.

use ndarray::{ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::env::Action;
use crate::error::{DqnError, Result};

/// Turns a batch of action values (one row per observation) into actions.
pub trait ActionSelector {
    fn select(&mut self, q_values: ArrayView2<f32>) -> Result<Vec<Action>>;
}

/// Index of the largest value, first occurrence on ties. NaN never wins.
pub fn argmax(values: ArrayView1<f32>) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (idx, &value) in values.iter().enumerate() {
        match best {
            Some((_, current)) if !(value > current) => {}
            _ if value.is_nan() => {}
            _ => best = Some((idx, value)),
        }
    }
    best.map(|(idx, _)| idx)
}

fn check_actions(q_values: &ArrayView2<f32>) -> Result<()> {
    if q_values.ncols() == 0 {
        return Err(DqnError::dimension_mismatch("at least one action value", "0 action values"));
    }
    Ok(())
}

/// Always picks the greedy action.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArgmaxActionSelector;

impl ActionSelector for ArgmaxActionSelector {
    fn select(&mut self, q_values: ArrayView2<f32>) -> Result<Vec<Action>> {
        check_actions(&q_values)?;
        q_values
            .rows()
            .into_iter()
            .map(|row| argmax(row).ok_or_else(|| DqnError::NumericalError("all action values are NaN".to_string())))
            .collect()
    }
}

/// Epsilon-greedy exploration.
///
/// `epsilon` is plain state read at every call; scheduling it is the job of
/// [`EpsilonTracker`].
#[derive(Debug, Clone)]
pub struct EpsilonGreedyActionSelector {
    epsilon: f32,
    greedy: ArgmaxActionSelector,
    rng: StdRng,
}

impl EpsilonGreedyActionSelector {
    pub fn new(epsilon: f32, seed: u64) -> Self {
        EpsilonGreedyActionSelector {
            epsilon: epsilon.clamp(0.0, 1.0),
            greedy: ArgmaxActionSelector,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn epsilon(&self) -> f32 {
        self.epsilon
    }

    pub fn set_epsilon(&mut self, epsilon: f32) {
        self.epsilon = epsilon.clamp(0.0, 1.0);
    }
}

impl ActionSelector for EpsilonGreedyActionSelector {
    fn select(&mut self, q_values: ArrayView2<f32>) -> Result<Vec<Action>> {
        let num_actions = q_values.ncols();
        let mut actions = self.greedy.select(q_values)?;
        for action in actions.iter_mut() {
            if self.rng.gen::<f32>() < self.epsilon {
                *action = self.rng.gen_range(0..num_actions);
            }
        }
        Ok(actions)
    }
}

/// Linear epsilon decay: `max(final, start - frame / frames)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpsilonTracker {
    pub epsilon_start: f32,
    pub epsilon_final: f32,
    pub epsilon_frames: usize,
}

impl EpsilonTracker {
    pub fn new(epsilon_start: f32, epsilon_final: f32, epsilon_frames: usize) -> Result<Self> {
        if epsilon_frames == 0 {
            return Err(DqnError::invalid_configuration("epsilon_frames", "must be > 0"));
        }
        if epsilon_final > epsilon_start {
            return Err(DqnError::invalid_configuration("epsilon_final", "must be <= epsilon_start"));
        }
        Ok(EpsilonTracker { epsilon_start, epsilon_final, epsilon_frames })
    }

    pub fn epsilon_at(&self, frame: usize) -> f32 {
        let eps = self.epsilon_start - frame as f32 / self.epsilon_frames as f32;
        eps.max(self.epsilon_final)
    }

    /// Set the selector's epsilon for `frame`.
    pub fn frame(&self, selector: &mut EpsilonGreedyActionSelector, frame: usize) {
        selector.set_epsilon(self.epsilon_at(frame));
    }
}
