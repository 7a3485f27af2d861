use ndarray::{Array1, ArrayView1};

use crate::config::LossKind;

/// A regression loss between predicted and target values.
pub trait Loss: Send + Sync {
    /// Mean loss over the batch.
    fn compute(&self, predictions: ArrayView1<f32>, targets: ArrayView1<f32>) -> f32;

    /// Gradient of [`compute`](Loss::compute) with respect to `predictions`.
    fn gradient(&self, predictions: ArrayView1<f32>, targets: ArrayView1<f32>) -> Array1<f32>;
}

/// Mean squared error: `mean((p - t)^2)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MSE;

impl Loss for MSE {
    fn compute(&self, predictions: ArrayView1<f32>, targets: ArrayView1<f32>) -> f32 {
        if predictions.is_empty() {
            return 0.0;
        }
        let diff = &predictions - &targets;
        diff.mapv(|x| x * x).sum() / predictions.len() as f32
    }

    fn gradient(&self, predictions: ArrayView1<f32>, targets: ArrayView1<f32>) -> Array1<f32> {
        let n = predictions.len().max(1) as f32;
        (&predictions - &targets).mapv(|x| 2.0 * x / n)
    }
}

/// Huber loss (smooth L1)
#[derive(Debug, Clone, Copy)]
pub struct HuberLoss {
    pub delta: f32,
}

impl HuberLoss {
    pub fn new(delta: f32) -> Self {
        HuberLoss { delta }
    }
}

impl Default for HuberLoss {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl Loss for HuberLoss {
    fn compute(&self, predictions: ArrayView1<f32>, targets: ArrayView1<f32>) -> f32 {
        if predictions.is_empty() {
            return 0.0;
        }
        let delta = self.delta;
        let diff = &predictions - &targets;
        diff.mapv(|x| {
            let abs_x = x.abs();
            if abs_x <= delta {
                0.5 * x * x
            } else {
                delta * abs_x - 0.5 * delta * delta
            }
        })
        .sum()
            / predictions.len() as f32
    }

    fn gradient(&self, predictions: ArrayView1<f32>, targets: ArrayView1<f32>) -> Array1<f32> {
        let delta = self.delta;
        let n = predictions.len().max(1) as f32;
        (&predictions - &targets).mapv(|x| x.clamp(-delta, delta) / n)
    }
}

/// The loss selected by configuration.
pub fn loss_for(kind: LossKind) -> Box<dyn Loss> {
    match kind {
        LossKind::Mse => Box::new(MSE),
        LossKind::Huber => Box::new(HuberLoss::default()),
    }
}
