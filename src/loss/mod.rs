//! # N-step TD Loss
//!
//! For every sampled experience the target is
//!
//! ```text
//! y = reward + gamma_n * max_a target(last_state)[a]    if last_state is present
//! y = reward                                            otherwise
//! ```
//!
//! with `gamma_n = gamma^n`, since `reward` already holds the discounted sum
//! of `n` steps. The target network path is a constant: only the current
//! network's prediction for the taken action receives a gradient.

pub mod functions;

pub use functions::{loss_for, HuberLoss, Loss, MSE};

use ndarray::{stack, Array1, Array2, ArrayView1, Axis};

use crate::actions::argmax;
use crate::env::Action;
use crate::error::{DqnError, Result};
use crate::experience::ExperienceFirstLast;
use crate::network::{TrainableEstimator, ValueEstimator};

/// A sampled batch laid out as arrays.
#[derive(Debug, Clone)]
pub struct Batch {
    pub states: Array2<f32>,
    pub actions: Vec<Action>,
    pub rewards: Array1<f32>,
    /// `true` where the experience has no last state.
    pub dones: Vec<bool>,
    /// Last states, with the first state standing in where there is none.
    /// Those rows are masked out by `dones`.
    pub last_states: Array2<f32>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

pub fn unpack_batch(batch: &[&ExperienceFirstLast]) -> Result<Batch> {
    if batch.is_empty() {
        return Err(DqnError::InsufficientData { requested: 1, available: 0 });
    }

    let states: Vec<_> = batch.iter().map(|exp| exp.state.view()).collect();
    let last_states: Vec<_> = batch
        .iter()
        .map(|exp| exp.last_state.as_ref().unwrap_or(&exp.state).view())
        .collect();

    let to_matrix = |rows: &[ArrayView1<f32>]| {
        stack(Axis(0), rows).map_err(|e| DqnError::dimension_mismatch("equally sized observations".to_string(), e.to_string()))
    };

    Ok(Batch {
        states: to_matrix(&states)?,
        actions: batch.iter().map(|exp| exp.action).collect(),
        rewards: batch.iter().map(|exp| exp.reward).collect(),
        dones: batch.iter().map(|exp| exp.last_state.is_none()).collect(),
        last_states: to_matrix(&last_states)?,
    })
}

/// Bellman targets for `batch`, evaluated with `tgt_net`.
pub fn bellman_targets<E: ValueEstimator>(batch: &Batch, tgt_net: &E, gamma_n: f32) -> Result<Array1<f32>> {
    let next_q_values = tgt_net.forward(batch.last_states.view())?;
    let mut targets = batch.rewards.clone();
    for (i, target) in targets.iter_mut().enumerate() {
        if batch.dones[i] {
            continue;
        }
        let row = next_q_values.row(i);
        let best = argmax(row).ok_or_else(|| DqnError::NumericalError("target network produced no finite values".to_string()))?;
        *target += gamma_n * row[best];
    }
    Ok(targets)
}

/// Loss value plus the gradient with respect to the current network's output.
#[derive(Debug, Clone)]
pub struct LossOutput {
    pub loss: f32,
    /// dL/dQ, shaped like the network output. Non-zero only in the column of
    /// the action taken.
    pub grad: Array2<f32>,
    pub predicted: Array1<f32>,
    pub targets: Array1<f32>,
}

/// Compute the n-step DQN loss for `batch`.
///
/// Runs a training forward pass on `net`, so a following
/// [`TrainableEstimator::backward`] with `grad` backpropagates this loss.
pub fn calc_loss_dqn<E: TrainableEstimator>(
    batch: &[&ExperienceFirstLast],
    net: &mut E,
    tgt_net: &E,
    gamma_n: f32,
    loss_fn: &dyn Loss,
) -> Result<LossOutput> {
    let batch = unpack_batch(batch)?;
    let targets = bellman_targets(&batch, tgt_net, gamma_n)?;

    let q_values = net.forward_train(batch.states.view())?;
    let num_actions = q_values.ncols();
    let mut predicted = Array1::zeros(batch.len());
    for (i, &action) in batch.actions.iter().enumerate() {
        if action >= num_actions {
            return Err(DqnError::InvalidAction { action, num_actions });
        }
        predicted[i] = q_values[[i, action]];
    }

    let loss = loss_fn.compute(predicted.view(), targets.view());
    if !loss.is_finite() {
        return Err(DqnError::NumericalError(format!("loss is not finite: {}", loss)));
    }

    let per_sample = loss_fn.gradient(predicted.view(), targets.view());
    let mut grad = Array2::zeros(q_values.dim());
    for (i, &action) in batch.actions.iter().enumerate() {
        grad[[i, action]] = per_sample[i];
    }

    Ok(LossOutput { loss, grad, predicted, targets })
}
