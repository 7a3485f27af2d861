use crate::error::{DqnError, Result};
use crate::network::ValueEstimator;

/// A frozen copy of the value estimator used for bootstrap targets.
///
/// The copy owns its parameters: training the source model never changes the
/// target until the next [`sync`](TargetNet::sync).
#[derive(Clone, Debug)]
pub struct TargetNet<E: ValueEstimator> {
    target_model: E,
    syncs: usize,
}

impl<E: ValueEstimator> TargetNet<E> {
    pub fn new(model: &E) -> Self {
        TargetNet { target_model: model.clone(), syncs: 0 }
    }

    /// Overwrite every target parameter with the model's current value.
    pub fn sync(&mut self, model: &E) -> Result<()> {
        self.target_model.copy_parameters_from(model)?;
        self.syncs += 1;
        Ok(())
    }

    /// Soft update: `target = alpha * target + (1 - alpha) * model`.
    pub fn alpha_sync(&mut self, model: &E, alpha: f32) -> Result<()> {
        if !(0.0..=1.0).contains(&alpha) {
            return Err(DqnError::invalid_configuration("alpha", "must be in [0, 1]"));
        }
        self.target_model.blend_parameters_from(model, alpha)?;
        self.syncs += 1;
        Ok(())
    }

    pub fn target_model(&self) -> &E {
        &self.target_model
    }

    /// Number of syncs performed so far.
    pub fn syncs(&self) -> usize {
        self.syncs
    }
}
