//! # Experience Generation
//!
//! [`ExperienceSource`] plays the environment with an [`Agent`] and turns the
//! resulting trajectory into n-step [`ExperienceFirstLast`] items:
//!
//! ```text
//! state_t, action_t, r_t + g*r_{t+1} + ... + g^(n-1)*r_{t+n-1}, state_{t+n}
//! ```
//!
//! Internally it keeps a window of up to `n + 1` raw [`Transition`]s. A full
//! window yields one experience whose `last_state` is the state of the
//! window's newest transition. When an episode ends the window is drained
//! from the front, and every remaining tail is emitted with
//! `last_state = None` and the discounted sum of all of its rewards. An
//! episode of length `L` therefore produces exactly `L` experiences.
//!
//! For rewards `[1, 1, 1, 0]`, `n = 2`, `gamma = 0.5`:
//!
//! | first state | reward | last state |
//! |-------------|--------|------------|
//! | s0          | 1.5    | s2         |
//! | s1          | 1.5    | s3         |
//! | s2          | 1.0    | none       |
//! | s3          | 0.0    | none       |

use std::collections::VecDeque;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::agent::Agent;
use crate::env::{Action, Environment, State, StepResult};
use crate::error::{DqnError, Result};

/// One raw environment step.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    /// Observation the action was taken in.
    pub state: State,
    pub action: Action,
    pub reward: f32,
    /// Whether this step ended the episode.
    pub done: bool,
}

/// An n-step experience: first state and action, discounted reward over the
/// window, and the state to bootstrap from (`None` if the episode ended
/// inside the window).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExperienceFirstLast {
    pub state: State,
    pub action: Action,
    pub reward: f32,
    pub last_state: Option<State>,
}

impl ExperienceFirstLast {
    pub fn is_terminal(&self) -> bool {
        self.last_state.is_none()
    }
}

/// Summary of a finished episode.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EpisodeSummary {
    /// Undiscounted sum of rewards.
    pub reward: f32,
    pub steps: usize,
}

/// Discounted reward over `window`, converted to a first/last experience.
fn first_last(window: &VecDeque<Transition>, steps_count: usize, gamma: f32) -> Option<ExperienceFirstLast> {
    let first = window.front()?;
    let last = window.back()?;

    let (last_state, elems) = if last.done && window.len() <= steps_count {
        (None, window.len())
    } else {
        (Some(last.state.clone()), window.len() - 1)
    };

    let reward = window
        .iter()
        .take(elems)
        .rev()
        .fold(0.0, |total, t| total * gamma + t.reward);

    Some(ExperienceFirstLast {
        state: first.state.clone(),
        action: first.action,
        reward,
        last_state,
    })
}

/// Pull-based n-step experience generator over a single environment.
pub struct ExperienceSource<Env: Environment> {
    env: Env,
    gamma: f32,
    steps_count: usize,
    state: Option<State>,
    history: VecDeque<Transition>,
    pending: VecDeque<ExperienceFirstLast>,
    episode_reward: f32,
    episode_steps: usize,
    finished: Vec<EpisodeSummary>,
    failed: bool,
}

impl<Env: Environment> ExperienceSource<Env> {
    /// `steps_count` is the number of rewards summed before bootstrapping.
    pub fn new(env: Env, gamma: f32, steps_count: usize) -> Result<Self> {
        if steps_count == 0 {
            return Err(DqnError::invalid_configuration("steps_count", "must be > 0"));
        }
        if !(0.0..=1.0).contains(&gamma) {
            return Err(DqnError::invalid_configuration("gamma", "must be in [0, 1]"));
        }
        Ok(ExperienceSource {
            env,
            gamma,
            steps_count,
            state: None,
            history: VecDeque::with_capacity(steps_count + 1),
            pending: VecDeque::new(),
            episode_reward: 0.0,
            episode_steps: 0,
            finished: Vec::new(),
            failed: false,
        })
    }

    pub fn gamma(&self) -> f32 {
        self.gamma
    }

    pub fn steps_count(&self) -> usize {
        self.steps_count
    }

    pub fn env(&self) -> &Env {
        &self.env
    }

    pub fn into_env(self) -> Env {
        self.env
    }

    /// Produce the next experience, stepping the environment as often as needed.
    ///
    /// Environment errors are fatal: the source refuses to continue afterwards.
    pub fn next_experience<A: Agent + ?Sized>(&mut self, agent: &mut A) -> Result<ExperienceFirstLast> {
        loop {
            if let Some(experience) = self.pending.pop_front() {
                return Ok(experience);
            }
            if self.failed {
                return Err(DqnError::environment("experience source stopped after an environment failure"));
            }
            if let Err(err) = self.play_step(agent) {
                self.failed = true;
                self.pending.clear();
                return Err(err);
            }
        }
    }

    /// Infinite iterator over experiences. Yields one `Err` and then stops if
    /// the environment fails.
    pub fn iter<'a, A: Agent + ?Sized>(&'a mut self, agent: &'a mut A) -> ExperienceIter<'a, Env, A> {
        ExperienceIter { source: self, agent, done: false }
    }

    /// Finished episodes since the last call.
    pub fn pop_rewards_steps(&mut self) -> Vec<EpisodeSummary> {
        std::mem::take(&mut self.finished)
    }

    /// Undiscounted rewards of finished episodes since the last call.
    pub fn pop_total_rewards(&mut self) -> Vec<f32> {
        self.pop_rewards_steps().into_iter().map(|e| e.reward).collect()
    }

    fn play_step<A: Agent + ?Sized>(&mut self, agent: &mut A) -> Result<()> {
        let state = match self.state.take() {
            Some(state) => state,
            None => self.env.reset().map_err(environment_failure)?,
        };
        let action = agent.act_one(&state)?;
        let StepResult { state: next_state, reward, done } = self.env.step(action).map_err(environment_failure)?;

        self.episode_reward += reward;
        self.episode_steps += 1;

        if self.history.len() == self.steps_count + 1 {
            self.history.pop_front();
        }
        self.history.push_back(Transition { state, action, reward, done });

        if self.history.len() == self.steps_count + 1 {
            self.emit();
        }

        if done {
            if self.history.len() < self.steps_count + 1 {
                self.emit();
            }
            while self.history.len() > 1 {
                self.history.pop_front();
                self.emit();
            }
            self.history.clear();

            let summary = EpisodeSummary { reward: self.episode_reward, steps: self.episode_steps };
            debug!("episode finished: reward={}, steps={}", summary.reward, summary.steps);
            self.finished.push(summary);
            self.episode_reward = 0.0;
            self.episode_steps = 0;
            // the next call resets, after the drained tails have been handed out
            self.state = None;
        } else {
            self.state = Some(next_state);
        }
        Ok(())
    }

    fn emit(&mut self) {
        if let Some(experience) = first_last(&self.history, self.steps_count, self.gamma) {
            self.pending.push_back(experience);
        }
    }
}

fn environment_failure(err: DqnError) -> DqnError {
    match err {
        DqnError::EnvironmentFailure(_) => err,
        other => DqnError::EnvironmentFailure(other.to_string()),
    }
}

/// Iterator returned by [`ExperienceSource::iter`].
pub struct ExperienceIter<'a, Env: Environment, A: Agent + ?Sized> {
    source: &'a mut ExperienceSource<Env>,
    agent: &'a mut A,
    done: bool,
}

impl<'a, Env: Environment, A: Agent + ?Sized> Iterator for ExperienceIter<'a, Env, A> {
    type Item = Result<ExperienceFirstLast>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.source.next_experience(self.agent);
        if item.is_err() {
            self.done = true;
        }
        Some(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn transition(step: f32, reward: f32, done: bool) -> Transition {
        Transition { state: array![step], action: 0, reward, done }
    }

    #[test]
    fn test_full_window_bootstraps_from_newest_state() {
        let window: VecDeque<_> = vec![transition(0.0, 1.0, false), transition(1.0, 1.0, false), transition(2.0, 5.0, false)].into();
        let exp = first_last(&window, 2, 0.5).unwrap();
        assert_eq!(exp.reward, 1.5);
        assert_eq!(exp.last_state, Some(array![2.0]));
    }

    #[test]
    fn test_terminal_tail_has_no_last_state() {
        let window: VecDeque<_> = vec![transition(2.0, 1.0, false), transition(3.0, 0.0, true)].into();
        let exp = first_last(&window, 2, 0.5).unwrap();
        assert_eq!(exp.reward, 1.0);
        assert!(exp.is_terminal());
    }
}
