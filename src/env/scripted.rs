use ndarray::array;

use super::{Action, Environment, State, StepResult};
use crate::error::{DqnError, Result};

/// Deterministic environment that pays out a fixed reward sequence.
///
/// Every episode lasts `rewards.len()` steps regardless of the actions taken.
/// The observation at step `i` of episode `e` is `[i, e]`, so experiences can
/// be traced back to the step that produced them.
#[derive(Debug, Clone)]
pub struct ScriptedEnv {
    rewards: Vec<f32>,
    num_actions: usize,
    step_in_episode: usize,
    episode: usize,
    total_steps: usize,
    fail_on_step: Option<usize>,
    fail_on_reset: Option<usize>,
    resets: usize,
    actions: Vec<Action>,
}

impl ScriptedEnv {
    pub fn new(rewards: Vec<f32>, num_actions: usize) -> Self {
        assert!(!rewards.is_empty(), "episodes need at least one step");
        assert!(num_actions > 0);
        ScriptedEnv {
            rewards,
            num_actions,
            step_in_episode: 0,
            episode: 0,
            total_steps: 0,
            fail_on_step: None,
            fail_on_reset: None,
            resets: 0,
            actions: Vec::new(),
        }
    }

    /// Make the `n`th call to `step` (counting from zero across episodes) fail.
    pub fn fail_on_step(mut self, n: usize) -> Self {
        self.fail_on_step = Some(n);
        self
    }

    /// Make the `n`th call to `reset` (counting from zero) and every later one fail.
    pub fn fail_on_reset(mut self, n: usize) -> Self {
        self.fail_on_reset = Some(n);
        self
    }

    /// The observation for `step` of `episode`.
    pub fn observation(step: usize, episode: usize) -> State {
        array![step as f32, episode as f32]
    }

    /// Actions received so far, in order.
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn episode(&self) -> usize {
        self.episode
    }
}

impl Environment for ScriptedEnv {
    fn reset(&mut self) -> Result<State> {
        let reset = self.resets;
        self.resets += 1;
        if self.fail_on_reset.map_or(false, |n| reset >= n) {
            return Err(DqnError::environment("scripted reset failure"));
        }
        if self.step_in_episode > 0 {
            self.episode += 1;
        }
        self.step_in_episode = 0;
        Ok(Self::observation(0, self.episode))
    }

    fn step(&mut self, action: Action) -> Result<StepResult> {
        if self.fail_on_step == Some(self.total_steps) {
            return Err(DqnError::environment(format!("scripted failure at step {}", self.total_steps)));
        }
        if action >= self.num_actions {
            return Err(DqnError::InvalidAction { action, num_actions: self.num_actions });
        }
        if self.step_in_episode >= self.rewards.len() {
            return Err(DqnError::environment("step called on a finished episode"));
        }

        self.actions.push(action);
        let reward = self.rewards[self.step_in_episode];
        self.step_in_episode += 1;
        self.total_steps += 1;

        Ok(StepResult {
            state: Self::observation(self.step_in_episode, self.episode),
            reward,
            done: self.step_in_episode == self.rewards.len(),
        })
    }

    fn num_actions(&self) -> usize {
        self.num_actions
    }

    fn observation_size(&self) -> usize {
        2
    }
}
