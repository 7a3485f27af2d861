// Test modules for all components
pub mod test_agent;
pub mod test_trainer;

use ndarray::ArrayView2;

use crate::agent::Agent;
use crate::env::Action;
use crate::error::Result;

/// Agent that always answers with the same action.
pub struct ConstantAgent(pub Action);

impl Agent for ConstantAgent {
    fn act(&mut self, observations: ArrayView2<f32>) -> Result<Vec<Action>> {
        Ok(vec![self.0; observations.nrows()])
    }
}
