use ndarray::{ArrayD, ArrayViewD, ArrayViewMutD, Zip};
use serde::{Deserialize, Serialize};

use crate::network::TrainableEstimator;

/// Gradient-based parameter update rule.
///
/// The optimizer owns its learning rate and any per-parameter state. It works
/// on the `(parameter, gradient)` pairs exposed by a [`TrainableEstimator`],
/// identified by their position in that list.
pub trait Optimizer {
    /// Apply one update to the parameter at `index`.
    fn update(&mut self, index: usize, param: ArrayViewMutD<f32>, grad: ArrayViewD<f32>);

    fn learning_rate(&self) -> f32;

    /// Clear the model's accumulated gradients.
    fn zero_grad<E: TrainableEstimator>(&mut self, model: &mut E) {
        model.zero_grad();
    }

    /// Update every parameter of `model` from its accumulated gradients.
    fn step<E: TrainableEstimator>(&mut self, model: &mut E) {
        for (index, (param, grad)) in model.params_and_grads().into_iter().enumerate() {
            self.update(index, param, grad);
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub enum OptimizerWrapper {
    SGD(SGD),
    Adam(Adam),
    RMSProp(RMSProp),
}

impl Optimizer for OptimizerWrapper {
    fn update(&mut self, index: usize, param: ArrayViewMutD<f32>, grad: ArrayViewD<f32>) {
        match self {
            OptimizerWrapper::SGD(optimizer) => optimizer.update(index, param, grad),
            OptimizerWrapper::Adam(optimizer) => optimizer.update(index, param, grad),
            OptimizerWrapper::RMSProp(optimizer) => optimizer.update(index, param, grad),
        }
    }

    fn learning_rate(&self) -> f32 {
        match self {
            OptimizerWrapper::SGD(optimizer) => optimizer.learning_rate(),
            OptimizerWrapper::Adam(optimizer) => optimizer.learning_rate(),
            OptimizerWrapper::RMSProp(optimizer) => optimizer.learning_rate(),
        }
    }

    fn step<E: TrainableEstimator>(&mut self, model: &mut E) {
        match self {
            OptimizerWrapper::SGD(optimizer) => optimizer.step(model),
            OptimizerWrapper::Adam(optimizer) => optimizer.step(model),
            OptimizerWrapper::RMSProp(optimizer) => optimizer.step(model),
        }
    }
}

// Lazily sized per-parameter state slot.
fn state_slot(states: &mut Vec<ArrayD<f32>>, index: usize, shape: &[usize]) -> usize {
    if states.len() <= index {
        states.resize_with(index + 1, || ArrayD::zeros(vec![0]));
    }
    if states[index].shape() != shape {
        states[index] = ArrayD::zeros(shape.to_vec());
    }
    index
}

/// Plain stochastic gradient descent.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SGD {
    pub learning_rate: f32,
}

impl SGD {
    pub fn new(learning_rate: f32) -> SGD {
        SGD { learning_rate }
    }
}

impl Optimizer for SGD {
    fn update(&mut self, _index: usize, mut param: ArrayViewMutD<f32>, grad: ArrayViewD<f32>) {
        let lr = self.learning_rate;
        Zip::from(&mut param).and(&grad).for_each(|p, &g| *p -= lr * g);
    }

    fn learning_rate(&self) -> f32 {
        self.learning_rate
    }
}

/// Adam with bias correction. The step counter advances once per
/// [`Optimizer::step`], not once per parameter.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Adam {
    pub learning_rate: f32,
    pub beta1: f32,
    pub beta2: f32,
    pub epsilon: f32,
    m: Vec<ArrayD<f32>>,
    v: Vec<ArrayD<f32>>,
    pub t: usize,
}

impl Adam {
    pub fn new(learning_rate: f32, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Adam {
            learning_rate,
            beta1,
            beta2,
            epsilon,
            m: Vec::new(),
            v: Vec::new(),
            t: 0,
        }
    }

    pub fn with_learning_rate(learning_rate: f32) -> Self {
        Self::new(learning_rate, 0.9, 0.999, 1e-8)
    }
}

impl Optimizer for Adam {
    fn update(&mut self, index: usize, mut param: ArrayViewMutD<f32>, grad: ArrayViewD<f32>) {
        let t = self.t.max(1) as i32;
        let (beta1, beta2, eps, lr) = (self.beta1, self.beta2, self.epsilon, self.learning_rate);
        let bias1 = 1.0 - beta1.powi(t);
        let bias2 = 1.0 - beta2.powi(t);

        let i = state_slot(&mut self.m, index, param.shape());
        state_slot(&mut self.v, index, param.shape());
        let (m, v) = (&mut self.m[i], &mut self.v[i]);

        Zip::from(&mut param).and(m).and(v).and(&grad).for_each(|p, m, v, &g| {
            *m = beta1 * *m + (1.0 - beta1) * g;
            *v = beta2 * *v + (1.0 - beta2) * g * g;
            let m_hat = *m / bias1;
            let v_hat = *v / bias2;
            *p -= lr * m_hat / (v_hat.sqrt() + eps);
        });
    }

    fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    fn step<E: TrainableEstimator>(&mut self, model: &mut E) {
        self.t += 1;
        for (index, (param, grad)) in model.params_and_grads().into_iter().enumerate() {
            self.update(index, param, grad);
        }
    }
}

/// RMSProp optimizer
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RMSProp {
    pub learning_rate: f32,
    pub beta: f32,
    pub epsilon: f32,
    v: Vec<ArrayD<f32>>,
}

impl RMSProp {
    pub fn new(learning_rate: f32, beta: f32, epsilon: f32) -> Self {
        RMSProp {
            learning_rate,
            beta,
            epsilon,
            v: Vec::new(),
        }
    }
}

impl Optimizer for RMSProp {
    fn update(&mut self, index: usize, mut param: ArrayViewMutD<f32>, grad: ArrayViewD<f32>) {
        let (beta, eps, lr) = (self.beta, self.epsilon, self.learning_rate);
        let i = state_slot(&mut self.v, index, param.shape());

        Zip::from(&mut param).and(&mut self.v[i]).and(&grad).for_each(|p, v, &g| {
            *v = beta * *v + (1.0 - beta) * g * g;
            *p -= lr * g / (v.sqrt() + eps);
        });
    }

    fn learning_rate(&self) -> f32 {
        self.learning_rate
    }
}
