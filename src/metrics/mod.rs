//! # Training Metrics
//!
//! The trainer reports through [`MetricsSink`], fire-and-forget: one
//! [`IterationMetrics`] per training iteration and one [`EpisodeEvent`] per
//! finished episode. Sinks provided here:
//!
//! - [`LogSink`]: writes progress through the `log` facade
//! - [`MetricsTracker`]: keeps a bounded history in memory, saves to JSON
//! - [`ScalarWriter`]: appends scalars to a CSV file per run
//!
//! Several sinks can be combined with a `Vec<Box<dyn MetricsSink>>`.

pub mod tracker;
pub mod writer;

pub use tracker::{MetricsTracker, TrainingMetrics};
pub use writer::ScalarWriter;

use std::time::{Duration, Instant};

use log::info;
use serde::{Deserialize, Serialize};

/// Reported once per training iteration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IterationMetrics {
    pub iteration: usize,
    pub loss: f32,
    pub epsilon: f32,
}

/// Reported once per finished episode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpisodeEvent {
    pub episode: usize,
    /// Undiscounted episode reward.
    pub reward: f32,
    pub steps: usize,
    /// Mean reward over the most recent episodes, this one included.
    pub mean_reward: f32,
    /// Training iteration at which the episode finished.
    pub iteration: usize,
}

/// Receives training progress. Implementations must not fail the run.
pub trait MetricsSink {
    fn on_iteration(&mut self, metrics: &IterationMetrics);

    fn on_episode(&mut self, event: &EpisodeEvent);

    /// Called once when training stops.
    fn on_finish(&mut self, _solved: bool) {}
}

impl<S: MetricsSink + ?Sized> MetricsSink for Box<S> {
    fn on_iteration(&mut self, metrics: &IterationMetrics) {
        (**self).on_iteration(metrics)
    }

    fn on_episode(&mut self, event: &EpisodeEvent) {
        (**self).on_episode(event)
    }

    fn on_finish(&mut self, solved: bool) {
        (**self).on_finish(solved)
    }
}

impl<S: MetricsSink> MetricsSink for Vec<S> {
    fn on_iteration(&mut self, metrics: &IterationMetrics) {
        for sink in self.iter_mut() {
            sink.on_iteration(metrics);
        }
    }

    fn on_episode(&mut self, event: &EpisodeEvent) {
        for sink in self.iter_mut() {
            sink.on_episode(event);
        }
    }

    fn on_finish(&mut self, solved: bool) {
        for sink in self.iter_mut() {
            sink.on_finish(solved);
        }
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl MetricsSink for NullSink {
    fn on_iteration(&mut self, _metrics: &IterationMetrics) {}

    fn on_episode(&mut self, _event: &EpisodeEvent) {}
}

/// Exponentially smoothed average, seeded with the first value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunningAverage {
    alpha: f32,
    value: Option<f32>,
}

impl RunningAverage {
    pub fn new(alpha: f32) -> Self {
        RunningAverage { alpha: alpha.clamp(0.0, 1.0), value: None }
    }

    pub fn update(&mut self, x: f32) -> f32 {
        let next = match self.value {
            Some(v) => self.alpha * v + (1.0 - self.alpha) * x,
            None => x,
        };
        self.value = Some(next);
        next
    }

    pub fn value(&self) -> Option<f32> {
        self.value
    }
}

impl Default for RunningAverage {
    fn default() -> Self {
        Self::new(0.98)
    }
}

/// Logs finished episodes with the frame rate since the previous one, and a
/// smoothed loss every `log_every` iterations.
pub struct LogSink {
    avg_loss: RunningAverage,
    log_every: usize,
    started: Instant,
    last_episode_at: Instant,
    last_episode_iteration: usize,
    frames_since_episode: usize,
}

impl LogSink {
    pub fn new(log_every: usize) -> Self {
        let now = Instant::now();
        LogSink {
            avg_loss: RunningAverage::default(),
            log_every: log_every.max(1),
            started: now,
            last_episode_at: now,
            last_episode_iteration: 0,
            frames_since_episode: 0,
        }
    }

    pub fn avg_loss(&self) -> Option<f32> {
        self.avg_loss.value()
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl MetricsSink for LogSink {
    fn on_iteration(&mut self, metrics: &IterationMetrics) {
        let avg = self.avg_loss.update(metrics.loss);
        if metrics.iteration % self.log_every == 0 {
            info!(
                "Iteration {}: avg_loss={:.4}, epsilon={:.3}",
                metrics.iteration, avg, metrics.epsilon
            );
        }
    }

    fn on_episode(&mut self, event: &EpisodeEvent) {
        self.frames_since_episode += event.steps;
        let secs = self.last_episode_at.elapsed().as_secs_f32();
        let speed = if secs > 0.0 { self.frames_since_episode as f32 / secs } else { 0.0 };
        info!(
            "Episode {}: reward={:.0}, mean_reward={:.2}, steps={}, speed={:.1} f/s, elapsed={:.0?}",
            event.episode,
            event.reward,
            event.mean_reward,
            event.steps,
            speed,
            self.started.elapsed()
        );
        self.last_episode_at = Instant::now();
        self.last_episode_iteration = event.iteration;
        self.frames_since_episode = 0;
    }

    fn on_finish(&mut self, solved: bool) {
        if solved {
            info!(
                "Game solved in {:.0?}, after {} iterations",
                self.started.elapsed(),
                self.last_episode_iteration
            );
        } else {
            info!("Training stopped after {:.0?}", self.started.elapsed());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_average_smoothing() {
        let mut avg = RunningAverage::new(0.5);
        assert_eq!(avg.value(), None);
        assert_eq!(avg.update(4.0), 4.0);
        assert_eq!(avg.update(2.0), 3.0);
        assert_eq!(avg.value(), Some(3.0));
    }
}
