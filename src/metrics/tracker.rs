use std::collections::VecDeque;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{EpisodeEvent, IterationMetrics, MetricsSink};

/// Bounded history of training metrics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingMetrics {
    /// Loss per iteration
    pub losses: VecDeque<f32>,

    /// Epsilon per iteration
    pub epsilons: VecDeque<f32>,

    /// Undiscounted reward per finished episode
    pub episode_rewards: VecDeque<f32>,

    /// Step count per finished episode
    pub episode_lengths: VecDeque<usize>,
}

fn push_bounded<T>(queue: &mut VecDeque<T>, value: T, limit: usize) {
    if queue.len() >= limit {
        queue.pop_front();
    }
    queue.push_back(value);
}

fn mean_of_last(values: &VecDeque<f32>, window: usize) -> Option<f32> {
    if values.is_empty() || window == 0 {
        return None;
    }
    let n = window.min(values.len());
    let sum: f32 = values.iter().rev().take(n).sum();
    Some(sum / n as f32)
}

/// Records what the trainer reports, keeping at most `history_size` entries
/// per series.
pub struct MetricsTracker {
    metrics: TrainingMetrics,
    history_size: usize,
    episode_count: usize,
    total_steps: usize,
    iterations: usize,
}

impl MetricsTracker {
    pub fn new(history_size: usize) -> Self {
        MetricsTracker {
            metrics: TrainingMetrics::default(),
            history_size: history_size.max(1),
            episode_count: 0,
            total_steps: 0,
            iterations: 0,
        }
    }

    pub fn metrics(&self) -> &TrainingMetrics {
        &self.metrics
    }

    pub fn episode_count(&self) -> usize {
        self.episode_count
    }

    /// Environment steps over all recorded episodes.
    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Mean loss over the last `window` iterations.
    pub fn avg_loss(&self, window: usize) -> Option<f32> {
        mean_of_last(&self.metrics.losses, window)
    }

    /// Mean reward over the last `window` episodes.
    pub fn avg_episode_reward(&self, window: usize) -> Option<f32> {
        mean_of_last(&self.metrics.episode_rewards, window)
    }

    pub fn clear(&mut self) {
        self.metrics = TrainingMetrics::default();
        self.episode_count = 0;
        self.total_steps = 0;
        self.iterations = 0;
    }

    /// Save metrics to a JSON file
    pub fn save(&self, path: &Path) -> crate::error::Result<()> {
        let serialized = serde_json::to_string_pretty(&self.metrics)?;
        std::fs::write(path, serialized)?;
        Ok(())
    }

    /// Replace the current history with one read from a JSON file
    pub fn load(&mut self, path: &Path) -> crate::error::Result<()> {
        let data = std::fs::read_to_string(path)?;
        self.metrics = serde_json::from_str(&data)?;
        Ok(())
    }
}

impl Default for MetricsTracker {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl MetricsSink for MetricsTracker {
    fn on_iteration(&mut self, metrics: &IterationMetrics) {
        push_bounded(&mut self.metrics.losses, metrics.loss, self.history_size);
        push_bounded(&mut self.metrics.epsilons, metrics.epsilon, self.history_size);
        self.iterations += 1;
    }

    fn on_episode(&mut self, event: &EpisodeEvent) {
        push_bounded(&mut self.metrics.episode_rewards, event.reward, self.history_size);
        push_bounded(&mut self.metrics.episode_lengths, event.steps, self.history_size);
        self.episode_count += 1;
        self.total_steps += event.steps;
    }
}
