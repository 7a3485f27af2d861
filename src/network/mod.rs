//! # Value Estimation Module
//!
//! The training pipeline never looks inside the estimator. It only needs to
//! evaluate a batch of observations and, for the trainable copy, to push a
//! loss gradient back into parameter gradients:
//!
//! - [`ValueEstimator`]: `forward(batch) -> q_values`, parameter access for
//!   snapshot copies (target network sync).
//! - [`TrainableEstimator`]: training forward pass, `backward(dL/dQ)`,
//!   `zero_grad`, and parameter/gradient pairs for the optimizer.
//!
//! [`QNetwork`] is the bundled implementation, a dense MLP with ReLU hidden
//! layers and a linear head, one output per action.

pub mod layers;

pub use layers::{Activation, DenseLayer};

use ndarray::{Array2, ArrayView2, ArrayViewD, ArrayViewMutD, Zip};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::{DqnError, Result};

/// Anything that maps a batch of observations to per-action values.
pub trait ValueEstimator: Clone {
    /// Evaluate `states` (one observation per row), returning one row of
    /// action values per observation.
    fn forward(&self, states: ArrayView2<f32>) -> Result<Array2<f32>>;

    /// Number of outputs per row.
    fn num_actions(&self) -> usize;

    /// All parameters, in a stable order.
    fn parameters(&self) -> Vec<ArrayViewD<'_, f32>>;

    /// All parameters, mutably, in the same order as [`parameters`](Self::parameters).
    fn parameters_mut(&mut self) -> Vec<ArrayViewMutD<'_, f32>>;

    /// Overwrite every parameter with the corresponding value from `other`.
    fn copy_parameters_from(&mut self, other: &Self) -> Result<()> {
        self.blend_parameters_from(other, 0.0)
    }

    /// `self = alpha * self + (1 - alpha) * other`, parameter by parameter.
    fn blend_parameters_from(&mut self, other: &Self, alpha: f32) -> Result<()> {
        let source = other.parameters();
        let mut destination = self.parameters_mut();
        if source.len() != destination.len() {
            return Err(DqnError::dimension_mismatch(
                format!("{} parameters", destination.len()),
                format!("{} parameters", source.len()),
            ));
        }
        for (dst, src) in destination.iter_mut().zip(source.iter()) {
            if dst.shape() != src.shape() {
                return Err(DqnError::dimension_mismatch(
                    format!("{:?}", dst.shape()),
                    format!("{:?}", src.shape()),
                ));
            }
            if alpha == 0.0 {
                dst.assign(src);
            } else {
                Zip::from(dst.view_mut()).and(src).for_each(|d, &s| *d = alpha * *d + (1.0 - alpha) * s);
            }
        }
        Ok(())
    }
}

/// An estimator whose parameters can be trained from an output gradient.
pub trait TrainableEstimator: ValueEstimator {
    /// Forward pass that keeps whatever `backward` needs.
    fn forward_train(&mut self, states: ArrayView2<f32>) -> Result<Array2<f32>>;

    /// Accumulate parameter gradients given dL/d(output) for the last
    /// `forward_train` batch.
    fn backward(&mut self, output_grad: ArrayView2<f32>) -> Result<()>;

    /// Reset accumulated gradients to zero.
    fn zero_grad(&mut self);

    /// `(parameter, gradient)` pairs in the order of [`ValueEstimator::parameters`].
    fn params_and_grads(&mut self) -> Vec<(ArrayViewMutD<'_, f32>, ArrayViewD<'_, f32>)>;
}

/// Dense Q-network: ReLU hidden layers, linear output layer.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct QNetwork {
    pub layers: Vec<DenseLayer>,
}

impl QNetwork {
    /// Build a network with the given layer sizes (input first, actions last).
    pub fn new(layer_sizes: &[usize], seed: u64) -> Result<Self> {
        if layer_sizes.len() < 2 {
            return Err(DqnError::invalid_configuration(
                "layer_sizes",
                "must have at least input and output layers",
            ));
        }
        if layer_sizes.iter().any(|&size| size == 0) {
            return Err(DqnError::invalid_configuration("layer_sizes", "every layer needs at least one unit"));
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let last = layer_sizes.len() - 2;
        let layers = layer_sizes
            .windows(2)
            .enumerate()
            .map(|(i, window)| {
                let activation = if i == last { Activation::Linear } else { Activation::Relu };
                DenseLayer::new(window[0], window[1], activation, &mut rng)
            })
            .collect();

        Ok(QNetwork { layers })
    }

    pub fn with_layers(layers: Vec<DenseLayer>) -> Result<Self> {
        if layers.is_empty() {
            return Err(DqnError::invalid_configuration("layers", "network needs at least one layer"));
        }
        for pair in layers.windows(2) {
            if pair[0].output_size() != pair[1].input_size() {
                return Err(DqnError::dimension_mismatch(
                    format!("layer input {}", pair[0].output_size()),
                    format!("layer input {}", pair[1].input_size()),
                ));
            }
        }
        Ok(QNetwork { layers })
    }

    pub fn input_size(&self) -> usize {
        self.layers.first().map(|l| l.input_size()).unwrap_or(0)
    }

    fn check_input(&self, states: &ArrayView2<f32>) -> Result<()> {
        if states.ncols() != self.input_size() {
            return Err(DqnError::dimension_mismatch(
                format!("{} features", self.input_size()),
                format!("{} features", states.ncols()),
            ));
        }
        Ok(())
    }

    /// Write the network to `path` with bincode.
    pub fn save(&self, path: &str) -> Result<()> {
        let serialized = bincode::serialize(self)?;
        std::fs::write(path, serialized)?;
        Ok(())
    }

    /// Read a network previously written by [`save`](Self::save).
    pub fn load(path: &str) -> Result<Self> {
        let data = std::fs::read(path)?;
        let network: Self = bincode::deserialize(&data)?;
        Ok(network)
    }
}

impl ValueEstimator for QNetwork {
    fn forward(&self, states: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.check_input(&states)?;
        let mut current = states.to_owned();
        for layer in &self.layers {
            current = layer.forward(current.view());
        }
        Ok(current)
    }

    fn num_actions(&self) -> usize {
        self.layers.last().map(|l| l.output_size()).unwrap_or(0)
    }

    fn parameters(&self) -> Vec<ArrayViewD<'_, f32>> {
        self.layers
            .iter()
            .flat_map(|layer| [layer.weights.view().into_dyn(), layer.biases.view().into_dyn()])
            .collect()
    }

    fn parameters_mut(&mut self) -> Vec<ArrayViewMutD<'_, f32>> {
        self.layers
            .iter_mut()
            .flat_map(|layer| [layer.weights.view_mut().into_dyn(), layer.biases.view_mut().into_dyn()])
            .collect()
    }
}

impl TrainableEstimator for QNetwork {
    fn forward_train(&mut self, states: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.check_input(&states)?;
        let mut current = states.to_owned();
        for layer in &mut self.layers {
            current = layer.forward_train(current.view());
        }
        Ok(current)
    }

    fn backward(&mut self, output_grad: ArrayView2<f32>) -> Result<()> {
        if output_grad.ncols() != self.num_actions() {
            return Err(DqnError::dimension_mismatch(
                format!("{} outputs", self.num_actions()),
                format!("{} outputs", output_grad.ncols()),
            ));
        }
        let mut error = output_grad.to_owned();
        for layer in self.layers.iter_mut().rev() {
            error = layer.backward(error.view()).ok_or_else(|| {
                DqnError::NumericalError("backward called before forward_train".to_string())
            })?;
        }
        Ok(())
    }

    fn zero_grad(&mut self) {
        for layer in &mut self.layers {
            layer.zero_grad();
        }
    }

    fn params_and_grads(&mut self) -> Vec<(ArrayViewMutD<'_, f32>, ArrayViewD<'_, f32>)> {
        self.layers
            .iter_mut()
            .flat_map(|layer| {
                let DenseLayer { weights, biases, grad_weights, grad_biases, .. } = layer;
                [
                    (weights.view_mut().into_dyn(), grad_weights.view().into_dyn()),
                    (biases.view_mut().into_dyn(), grad_biases.view().into_dyn()),
                ]
            })
            .collect()
    }
}
