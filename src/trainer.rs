//! # Training Loop
//!
//! The [`Trainer`] owns every moving part of an n-step DQN run and drives
//! them in a single explicit loop:
//!
//! ```text
//! WARMUP      pull experiences until the buffer holds replay_initial
//! TRAINING    pull 1 experience -> sample batch -> loss -> zero_grad
//!             -> backward -> optimizer step -> epsilon decay
//!             -> every target_net_sync iterations: target sync
//! TERMINATED  iteration limit reached, environment failed, or the mean
//!             reward of the last 100 episodes exceeded stop_reward
//! ```
//!
//! All mutable training state lives in [`TrainerState`]; progress goes out
//! through a [`MetricsSink`].

use std::collections::VecDeque;

use log::{debug, error, info};
use serde::{Deserialize, Serialize};

use crate::actions::{EpsilonGreedyActionSelector, EpsilonTracker};
use crate::agent::DqnAgent;
use crate::config::{Device, Hyperparams};
use crate::env::Environment;
use crate::error::{DqnError, Result};
use crate::experience::ExperienceSource;
use crate::loss::{calc_loss_dqn, loss_for, Loss};
use crate::metrics::{EpisodeEvent, IterationMetrics, MetricsSink};
use crate::network::{QNetwork, TrainableEstimator};
use crate::optimizer::{Adam, Optimizer, OptimizerWrapper};
use crate::replay_buffer::ReplayBuffer;
use crate::target::TargetNet;

/// Number of finished episodes averaged for the solved check.
pub const REWARD_WINDOW: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Warmup,
    Training,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    Solved,
    IterationLimit,
    Failed,
}

/// Everything that changes while training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerState {
    pub phase: Phase,
    /// Completed training iterations.
    pub iteration: usize,
    /// Experiences pulled from the environment.
    pub frames: usize,
    pub epsilon: f32,
    pub episodes: usize,
    pub last_loss: Option<f32>,
    pub mean_reward: Option<f32>,
    pub best_mean_reward: Option<f32>,
    pub stop_reason: Option<StopReason>,
}

impl TrainerState {
    fn new(epsilon: f32) -> Self {
        TrainerState {
            phase: Phase::Warmup,
            iteration: 0,
            frames: 0,
            epsilon,
            episodes: 0,
            last_loss: None,
            mean_reward: None,
            best_mean_reward: None,
            stop_reason: None,
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.phase == Phase::Terminated
    }

    fn terminate(&mut self, reason: StopReason) {
        self.phase = Phase::Terminated;
        self.stop_reason = Some(reason);
    }
}

/// N-step DQN training driver.
pub struct Trainer<Env: Environment, E: TrainableEstimator> {
    params: Hyperparams,
    device: Device,
    net: E,
    tgt_net: TargetNet<E>,
    selector: EpsilonGreedyActionSelector,
    epsilon_tracker: EpsilonTracker,
    source: ExperienceSource<Env>,
    buffer: ReplayBuffer,
    optimizer: OptimizerWrapper,
    loss_fn: Box<dyn Loss>,
    gamma_n: f32,
    recent_rewards: VecDeque<f32>,
    state: TrainerState,
}

impl<Env: Environment, E: TrainableEstimator> Trainer<Env, E> {
    /// Assemble a trainer. Fails fast on invalid hyperparameters or when the
    /// network's action count does not match the environment's.
    pub fn new(params: Hyperparams, env: Env, net: E) -> Result<Self> {
        params.validate()?;
        if net.num_actions() != env.num_actions() {
            return Err(DqnError::dimension_mismatch(
                format!("{} network outputs", env.num_actions()),
                format!("{} network outputs", net.num_actions()),
            ));
        }

        let device = params.device.resolve();
        let selector = EpsilonGreedyActionSelector::new(params.epsilon_start, params.seed);
        let epsilon_tracker = EpsilonTracker::new(params.epsilon_start, params.epsilon_final, params.epsilon_frames)?;
        let source = ExperienceSource::new(env, params.gamma, params.n_steps)?;
        let buffer = ReplayBuffer::new(params.replay_size, params.replay_initial, params.seed.wrapping_add(1))?;
        let tgt_net = TargetNet::new(&net);
        let optimizer = OptimizerWrapper::Adam(Adam::with_learning_rate(params.learning_rate));
        let loss_fn = loss_for(params.loss);
        let gamma_n = params.gamma_n();

        info!(
            "{}: n_steps={}, gamma={}, gamma_n={:.4}, device={:?}",
            params.run_name, params.n_steps, params.gamma, gamma_n, device
        );

        Ok(Trainer {
            state: TrainerState::new(selector.epsilon()),
            params,
            device,
            net,
            tgt_net,
            selector,
            epsilon_tracker,
            source,
            buffer,
            optimizer,
            loss_fn,
            gamma_n,
            recent_rewards: VecDeque::with_capacity(REWARD_WINDOW),
        })
    }

    /// Replace the default Adam optimizer.
    pub fn with_optimizer(mut self, optimizer: OptimizerWrapper) -> Self {
        self.optimizer = optimizer;
        self
    }

    pub fn state(&self) -> &TrainerState {
        &self.state
    }

    pub fn params(&self) -> &Hyperparams {
        &self.params
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn net(&self) -> &E {
        &self.net
    }

    pub fn target_net(&self) -> &TargetNet<E> {
        &self.tgt_net
    }

    pub fn buffer(&self) -> &ReplayBuffer {
        &self.buffer
    }

    pub fn selector(&self) -> &EpsilonGreedyActionSelector {
        &self.selector
    }

    pub fn optimizer(&self) -> &OptimizerWrapper {
        &self.optimizer
    }

    pub fn into_net(self) -> E {
        self.net
    }

    /// Train until solved or until `max_iterations` iterations have run.
    ///
    /// Environment failures stop training and are returned; the state is
    /// left `Terminated` with [`StopReason::Failed`].
    pub fn run<M: MetricsSink + ?Sized>(&mut self, max_iterations: Option<usize>, sink: &mut M) -> Result<TrainerState> {
        let outcome = self.run_inner(max_iterations, sink);
        if let Err(err) = &outcome {
            error!("training stopped: {}", err);
            self.state.terminate(StopReason::Failed);
        }
        sink.on_finish(self.state.stop_reason == Some(StopReason::Solved));
        outcome.map(|_| self.state.clone())
    }

    fn run_inner<M: MetricsSink + ?Sized>(&mut self, max_iterations: Option<usize>, sink: &mut M) -> Result<()> {
        self.warm_up(sink)?;
        while !self.state.is_terminated() {
            if let Some(max) = max_iterations {
                if self.state.iteration >= max {
                    info!("iteration limit {} reached", max);
                    self.state.terminate(StopReason::IterationLimit);
                    break;
                }
            }
            self.step_iteration(sink)?;
        }
        Ok(())
    }

    /// Fill the replay buffer up to `replay_initial` and enter `Training`.
    pub fn warm_up<M: MetricsSink + ?Sized>(&mut self, sink: &mut M) -> Result<()> {
        if self.state.phase != Phase::Warmup {
            return Ok(());
        }
        let missing = self.params.replay_initial.saturating_sub(self.buffer.len());
        self.pull(missing, sink)?;
        if self.state.phase == Phase::Warmup {
            info!("replay buffer warmed up with {} experiences", self.buffer.len());
            self.state.phase = Phase::Training;
        }
        Ok(())
    }

    /// One training iteration. Warms up first if that has not happened yet.
    ///
    /// Fails with [`DqnError::TrainingTerminated`] once the trainer has stopped.
    pub fn step_iteration<M: MetricsSink + ?Sized>(&mut self, sink: &mut M) -> Result<IterationMetrics> {
        if self.state.is_terminated() {
            return Err(DqnError::TrainingTerminated(format!("{:?}", self.state.stop_reason)));
        }
        self.warm_up(sink)?;
        self.pull(1, sink)?;

        let iteration = self.state.iteration + 1;
        self.optimizer.zero_grad(&mut self.net);

        let batch = self.buffer.sample(self.params.batch_size)?;
        let output = calc_loss_dqn(
            &batch,
            &mut self.net,
            self.tgt_net.target_model(),
            self.gamma_n,
            self.loss_fn.as_ref(),
        )?;
        self.net.backward(output.grad.view())?;
        self.optimizer.step(&mut self.net);

        self.epsilon_tracker.frame(&mut self.selector, iteration);
        if iteration % self.params.target_net_sync == 0 {
            self.tgt_net.sync(&self.net)?;
            debug!("target network synced at iteration {}", iteration);
        }

        self.state.iteration = iteration;
        self.state.epsilon = self.selector.epsilon();
        self.state.last_loss = Some(output.loss);

        let metrics = IterationMetrics { iteration, loss: output.loss, epsilon: self.state.epsilon };
        sink.on_iteration(&metrics);
        Ok(metrics)
    }

    // Pull `count` experiences into the buffer, then report finished episodes.
    fn pull<M: MetricsSink + ?Sized>(&mut self, count: usize, sink: &mut M) -> Result<()> {
        if count > 0 {
            let mut agent = DqnAgent::new(&self.net, &mut self.selector);
            let mut experiences = self.source.iter(&mut agent);
            self.buffer.populate(&mut experiences, count)?;
            self.state.frames += count;
        }
        self.report_episodes(sink);
        Ok(())
    }

    fn report_episodes<M: MetricsSink + ?Sized>(&mut self, sink: &mut M) {
        for summary in self.source.pop_rewards_steps() {
            if self.recent_rewards.len() == REWARD_WINDOW {
                self.recent_rewards.pop_front();
            }
            self.recent_rewards.push_back(summary.reward);
            let mean_reward = self.recent_rewards.iter().sum::<f32>() / self.recent_rewards.len() as f32;

            self.state.episodes += 1;
            self.state.mean_reward = Some(mean_reward);
            if self.state.best_mean_reward.map_or(true, |best| mean_reward > best) {
                self.state.best_mean_reward = Some(mean_reward);
            }

            sink.on_episode(&EpisodeEvent {
                episode: self.state.episodes,
                reward: summary.reward,
                steps: summary.steps,
                mean_reward,
                iteration: self.state.iteration,
            });

            if !self.state.is_terminated() && mean_reward > self.params.stop_reward {
                info!(
                    "Game solved after {} episodes and {} iterations (mean reward {:.2})",
                    self.state.episodes, self.state.iteration, mean_reward
                );
                self.state.terminate(StopReason::Solved);
            }
        }
    }
}

/// Builds a [`Trainer`] around a [`QNetwork`] sized for the environment.
///
/// # Example
///
/// ```rust
/// use nstep_dqn::config::Hyperparams;
/// use nstep_dqn::env::CatchEnv;
/// use nstep_dqn::trainer::TrainerBuilder;
///
/// let trainer = TrainerBuilder::new(Hyperparams::catch())
///     .n_steps(2)
///     .build(CatchEnv::new(1))
///     .unwrap();
/// assert_eq!(trainer.params().n_steps, 2);
/// ```
pub struct TrainerBuilder {
    params: Hyperparams,
    optimizer: Option<OptimizerWrapper>,
    network: Option<QNetwork>,
}

impl TrainerBuilder {
    pub fn new(params: Hyperparams) -> Self {
        TrainerBuilder { params, optimizer: None, network: None }
    }

    pub fn n_steps(mut self, n_steps: usize) -> Self {
        self.params.n_steps = n_steps;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.params.seed = seed;
        self
    }

    pub fn device(mut self, device: Device) -> Self {
        self.params.device = device;
        self
    }

    pub fn optimizer(mut self, optimizer: OptimizerWrapper) -> Self {
        self.optimizer = Some(optimizer);
        self
    }

    /// Use an existing network instead of building one from `hidden_layers`.
    pub fn network(mut self, network: QNetwork) -> Self {
        self.network = Some(network);
        self
    }

    pub fn build<Env: Environment>(self, env: Env) -> Result<Trainer<Env, QNetwork>> {
        self.params.validate()?;
        let network = match self.network {
            Some(network) => {
                if network.input_size() != env.observation_size() {
                    return Err(DqnError::dimension_mismatch(
                        format!("{} inputs", env.observation_size()),
                        format!("{} inputs", network.input_size()),
                    ));
                }
                network
            }
            None => {
                let mut sizes = Vec::with_capacity(self.params.hidden_layers.len() + 2);
                sizes.push(env.observation_size());
                sizes.extend_from_slice(&self.params.hidden_layers);
                sizes.push(env.num_actions());
                QNetwork::new(&sizes, self.params.seed)?
            }
        };

        let trainer = Trainer::new(self.params, env, network)?;
        Ok(match self.optimizer {
            Some(optimizer) => trainer.with_optimizer(optimizer),
            None => trainer,
        })
    }
}
