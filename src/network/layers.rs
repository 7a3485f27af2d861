use ndarray::{Array1, Array2, ArrayView2, Axis};
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand_distr::Uniform;
use serde::{Deserialize, Serialize};

use crate::error::{DqnError, Result};

/// Activation applied after the affine part of a [`DenseLayer`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, Default)]
pub enum Activation {
    #[default]
    Relu,
    Linear,
    Tanh,
    LeakyRelu { alpha: f32 },
}

impl Activation {
    /// Apply the activation to a batch in place.
    pub fn apply_batch(&self, inputs: &mut Array2<f32>) {
        match self {
            Activation::Relu => inputs.mapv_inplace(|v| v.max(0.0)),
            Activation::Linear => {}
            Activation::Tanh => inputs.mapv_inplace(|v| v.tanh()),
            Activation::LeakyRelu { alpha } => {
                let a = *alpha;
                inputs.mapv_inplace(|v| if v > 0.0 { v } else { a * v });
            }
        }
    }

    /// Derivative of the activation, evaluated at the pre-activation values.
    pub fn derivative_batch(&self, inputs: ArrayView2<f32>) -> Array2<f32> {
        match self {
            Activation::Relu => inputs.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 }),
            Activation::Linear => Array2::ones(inputs.dim()),
            Activation::Tanh => inputs.mapv(|v| {
                let t = v.tanh();
                1.0 - t * t
            }),
            Activation::LeakyRelu { alpha } => {
                let a = *alpha;
                inputs.mapv(|v| if v > 0.0 { 1.0 } else { a })
            }
        }
    }
}

/// A fully connected layer with gradient accumulators.
///
/// `forward_train` caches the inputs and pre-activations of the last batch so
/// that `backward` can compute parameter gradients. Gradients are summed into
/// `grad_weights`/`grad_biases` until `zero_grad` is called.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DenseLayer {
    pub weights: Array2<f32>,
    pub biases: Array1<f32>,
    pub activation: Activation,
    #[serde(skip)]
    pub(crate) grad_weights: Array2<f32>,
    #[serde(skip)]
    pub(crate) grad_biases: Array1<f32>,
    #[serde(skip)]
    pre_activation_output: Option<Array2<f32>>,
    #[serde(skip)]
    inputs: Option<Array2<f32>>,
}

impl DenseLayer {
    /// Create a layer with He-uniform weights and zero biases.
    pub fn new(input_size: usize, output_size: usize, activation: Activation, rng: &mut StdRng) -> Self {
        let bound = (6.0 / input_size.max(1) as f32).sqrt();
        let weights = Array2::random_using((input_size, output_size), Uniform::new(-bound, bound), rng);
        Self::assemble(weights, Array1::zeros(output_size), activation)
    }

    /// Wrap existing parameters. `weights` is `(inputs, outputs)` and needs one bias per output.
    pub fn from_parameters(weights: Array2<f32>, biases: Array1<f32>, activation: Activation) -> Result<Self> {
        if weights.shape()[1] != biases.len() {
            return Err(DqnError::dimension_mismatch(
                format!("{} biases", weights.shape()[1]),
                format!("{} biases", biases.len()),
            ));
        }
        Ok(Self::assemble(weights, biases, activation))
    }

    fn assemble(weights: Array2<f32>, biases: Array1<f32>, activation: Activation) -> Self {
        DenseLayer {
            grad_weights: Array2::zeros(weights.dim()),
            grad_biases: Array1::zeros(biases.dim()),
            weights,
            biases,
            activation,
            pre_activation_output: None,
            inputs: None,
        }
    }

    pub fn input_size(&self) -> usize {
        self.weights.shape()[0]
    }

    pub fn output_size(&self) -> usize {
        self.weights.shape()[1]
    }

    /// Forward pass without touching the cache.
    pub fn forward(&self, inputs: ArrayView2<f32>) -> Array2<f32> {
        let mut outputs = inputs.dot(&self.weights) + &self.biases.view().insert_axis(Axis(0));
        self.activation.apply_batch(&mut outputs);
        outputs
    }

    /// Forward pass that remembers what `backward` needs.
    pub fn forward_train(&mut self, inputs: ArrayView2<f32>) -> Array2<f32> {
        self.inputs = Some(inputs.to_owned());
        let mut outputs = inputs.dot(&self.weights) + &self.biases.view().insert_axis(Axis(0));
        self.pre_activation_output = Some(outputs.clone());
        self.activation.apply_batch(&mut outputs);
        outputs
    }

    /// Accumulate parameter gradients and return the error for the previous layer.
    ///
    /// Returns `None` when no training forward pass preceded this call.
    pub fn backward(&mut self, output_errors: ArrayView2<f32>) -> Option<Array2<f32>> {
        self.ensure_grad_shapes();
        let pre_activation_output = self.pre_activation_output.as_ref()?;
        let inputs = self.inputs.as_ref()?;

        let adjusted_error = output_errors.to_owned() * &self.activation.derivative_batch(pre_activation_output.view());
        self.grad_weights += &inputs.t().dot(&adjusted_error);
        self.grad_biases += &adjusted_error.sum_axis(Axis(0));

        Some(adjusted_error.dot(&self.weights.t()))
    }

    pub fn zero_grad(&mut self) {
        self.ensure_grad_shapes();
        self.grad_weights.fill(0.0);
        self.grad_biases.fill(0.0);
    }

    // Deserialized layers start with empty accumulators.
    fn ensure_grad_shapes(&mut self) {
        if self.grad_weights.dim() != self.weights.dim() {
            self.grad_weights = Array2::zeros(self.weights.dim());
        }
        if self.grad_biases.dim() != self.biases.dim() {
            self.grad_biases = Array1::zeros(self.biases.dim());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;

    #[test]
    fn test_backward_without_forward_is_none() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut layer = DenseLayer::new(3, 2, Activation::Relu, &mut rng);
        assert!(layer.backward(array![[1.0, 1.0]].view()).is_none());
    }

    #[test]
    fn test_linear_layer_gradients() {
        let layer_weights = array![[1.0, 0.0], [0.0, 1.0]];
        let mut layer = DenseLayer::from_parameters(layer_weights, array![0.0, 0.0], Activation::Linear).unwrap();

        let out = layer.forward_train(array![[2.0, 3.0]].view());
        assert_eq!(out, array![[2.0, 3.0]]);

        let upstream = layer.backward(array![[1.0, 0.0]].view()).unwrap();
        assert_eq!(upstream, array![[1.0, 0.0]]);
        assert_eq!(layer.grad_weights, array![[2.0, 0.0], [3.0, 0.0]]);
        assert_eq!(layer.grad_biases, array![1.0, 0.0]);

        layer.zero_grad();
        assert!(layer.grad_weights.iter().all(|&g| g == 0.0));
    }

    #[test]
    fn test_from_parameters_rejects_bias_mismatch() {
        let result = DenseLayer::from_parameters(Array2::zeros((2, 3)), array![0.0, 0.0], Activation::Relu);
        assert!(matches!(result, Err(DqnError::DimensionMismatch { .. })));
    }
}
