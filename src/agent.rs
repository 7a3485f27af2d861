use ndarray::{Array2, ArrayView2, Axis};

use crate::actions::ActionSelector;
use crate::env::{Action, State};
use crate::error::{DqnError, Result};
use crate::network::ValueEstimator;

/// Maps a batch of observations to a batch of actions.
pub trait Agent {
    fn act(&mut self, observations: ArrayView2<f32>) -> Result<Vec<Action>>;

    /// Convenience for a single observation.
    fn act_one(&mut self, observation: &State) -> Result<Action> {
        let batch = observation.view().insert_axis(Axis(0));
        self.act(batch)?
            .pop()
            .ok_or_else(|| DqnError::NumericalError("agent returned no action".to_string()))
    }
}

/// Deep Q-Network agent: evaluate the estimator, then let the selector pick.
///
/// The agent only borrows the estimator and the selector, so the training
/// loop can update the network and epsilon between environment steps without
/// rebuilding anything expensive.
///
/// # Example
///
/// ```rust
/// use nstep_dqn::actions::ArgmaxActionSelector;
/// use nstep_dqn::agent::{Agent, DqnAgent};
/// use nstep_dqn::network::QNetwork;
/// use ndarray::array;
///
/// let net = QNetwork::new(&[2, 16, 3], 0).unwrap();
/// let mut selector = ArgmaxActionSelector;
/// let mut agent = DqnAgent::new(&net, &mut selector);
///
/// let actions = agent.act(array![[0.1, 0.2], [0.3, -0.4]].view()).unwrap();
/// assert_eq!(actions.len(), 2);
/// assert!(actions.iter().all(|&a| a < 3));
/// ```
pub struct DqnAgent<'a, E: ValueEstimator, S: ActionSelector> {
    model: &'a E,
    selector: &'a mut S,
}

impl<'a, E: ValueEstimator, S: ActionSelector> DqnAgent<'a, E, S> {
    pub fn new(model: &'a E, selector: &'a mut S) -> Self {
        DqnAgent { model, selector }
    }

    /// Raw action values for `observations`.
    pub fn q_values(&self, observations: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.model.forward(observations)
    }
}

impl<'a, E: ValueEstimator, S: ActionSelector> Agent for DqnAgent<'a, E, S> {
    fn act(&mut self, observations: ArrayView2<f32>) -> Result<Vec<Action>> {
        let q_values = self.model.forward(observations)?;
        if q_values.nrows() != observations.nrows() {
            return Err(DqnError::dimension_mismatch(
                format!("{} rows", observations.nrows()),
                format!("{} rows", q_values.nrows()),
            ));
        }
        self.selector.select(q_values.view())
    }
}
