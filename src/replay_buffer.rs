use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{DqnError, Result};
use crate::experience::ExperienceFirstLast;

/// Fixed-capacity FIFO store of n-step experiences.
///
/// Appending to a full buffer evicts the oldest entry. Sampling is uniform
/// with replacement and only allowed once the buffer holds at least
/// `replay_initial` entries (and at least one batch).
///
/// # Example
///
/// ```rust
/// use nstep_dqn::replay_buffer::ReplayBuffer;
/// use nstep_dqn::experience::ExperienceFirstLast;
/// use ndarray::array;
///
/// let mut buffer = ReplayBuffer::new(100, 2, 42).unwrap();
/// for i in 0..3 {
///     buffer.append(ExperienceFirstLast {
///         state: array![i as f32],
///         action: 0,
///         reward: 1.0,
///         last_state: None,
///     });
/// }
/// assert!(buffer.is_ready(2));
/// assert_eq!(buffer.sample(2).unwrap().len(), 2);
/// ```
#[derive(Clone, Debug)]
pub struct ReplayBuffer {
    buffer: VecDeque<ExperienceFirstLast>,
    capacity: usize,
    replay_initial: usize,
    rng: StdRng,
}

impl ReplayBuffer {
    pub fn new(capacity: usize, replay_initial: usize, seed: u64) -> Result<Self> {
        if capacity == 0 {
            return Err(DqnError::invalid_configuration("replay_size", "must be > 0"));
        }
        if replay_initial > capacity {
            return Err(DqnError::invalid_configuration(
                "replay_initial",
                format!("must be <= replay_size ({})", capacity),
            ));
        }
        Ok(ReplayBuffer {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
            replay_initial,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    pub fn append(&mut self, experience: ExperienceFirstLast) {
        if self.buffer.len() == self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(experience);
    }

    /// Pull `count` experiences from `source` into the buffer.
    pub fn populate<I>(&mut self, source: &mut I, count: usize) -> Result<()>
    where
        I: Iterator<Item = Result<ExperienceFirstLast>> + ?Sized,
    {
        for _ in 0..count {
            let experience = source
                .next()
                .ok_or_else(|| DqnError::environment("experience source is exhausted"))??;
            self.append(experience);
        }
        Ok(())
    }

    /// Whether `sample(batch_size)` would succeed.
    pub fn is_ready(&self, batch_size: usize) -> bool {
        batch_size > 0 && self.buffer.len() >= self.required(batch_size)
    }

    /// Draw `batch_size` experiences uniformly at random, with replacement.
    pub fn sample(&mut self, batch_size: usize) -> Result<Vec<&ExperienceFirstLast>> {
        if batch_size == 0 {
            return Err(DqnError::invalid_configuration("batch_size", "must be > 0"));
        }
        let required = self.required(batch_size);
        if self.buffer.len() < required {
            return Err(DqnError::InsufficientData { requested: required, available: self.buffer.len() });
        }
        let len = self.buffer.len();
        let indices: Vec<usize> = (0..batch_size).map(|_| self.rng.gen_range(0..len)).collect();
        Ok(indices.into_iter().map(|i| &self.buffer[i]).collect())
    }

    fn required(&self, batch_size: usize) -> usize {
        batch_size.max(self.replay_initial)
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn replay_initial(&self) -> usize {
        self.replay_initial
    }

    /// Contents, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &ExperienceFirstLast> {
        self.buffer.iter()
    }
}
