use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use log::warn;

use super::{EpisodeEvent, IterationMetrics, MetricsSink, RunningAverage};

/// Appends scalars to `<log_dir>/<run_name>/scalars.csv` as
/// `step,tag,value,wall_time`, in a layout TensorBoard-style tooling can
/// import.
///
/// Iterations log `loss`, `avg_loss` and `epsilon`; episodes log `reward`,
/// `mean_reward` and `steps` at the iteration they finished. Write errors are
/// logged and swallowed so they never stop training.
pub struct ScalarWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    avg_loss: RunningAverage,
    flush_every: usize,
    rows: usize,
}

impl ScalarWriter {
    pub fn new(log_dir: &Path, run_name: &str) -> std::io::Result<Self> {
        let run_dir = log_dir.join(run_name);
        create_dir_all(&run_dir)?;
        let path = run_dir.join("scalars.csv");

        let mut writer = BufWriter::new(File::create(&path)?);
        writeln!(writer, "step,tag,value,wall_time")?;

        Ok(ScalarWriter {
            path,
            writer,
            avg_loss: RunningAverage::default(),
            flush_every: 100,
            rows: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one scalar row.
    pub fn add_scalar(&mut self, step: usize, tag: &str, value: f32) -> std::io::Result<()> {
        writeln!(self.writer, "{},{},{},{:.3}", step, tag, value, wall_time())?;
        self.rows += 1;
        if self.rows % self.flush_every == 0 {
            self.writer.flush()?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }

    fn add_all(&mut self, step: usize, scalars: &[(&str, f32)]) {
        for (tag, value) in scalars {
            if let Err(err) = self.add_scalar(step, tag, *value) {
                warn!("failed to write scalar '{}' to {}: {}", tag, self.path.display(), err);
                return;
            }
        }
    }
}

fn wall_time() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

impl MetricsSink for ScalarWriter {
    fn on_iteration(&mut self, metrics: &IterationMetrics) {
        let avg = self.avg_loss.update(metrics.loss);
        self.add_all(
            metrics.iteration,
            &[("loss", metrics.loss), ("avg_loss", avg), ("epsilon", metrics.epsilon)],
        );
    }

    fn on_episode(&mut self, event: &EpisodeEvent) {
        self.add_all(
            event.iteration,
            &[
                ("reward", event.reward),
                ("mean_reward", event.mean_reward),
                ("steps", event.steps as f32),
            ],
        );
    }

    fn on_finish(&mut self, _solved: bool) {
        if let Err(err) = self.flush() {
            warn!("failed to flush {}: {}", self.path.display(), err);
        }
    }
}

impl Drop for ScalarWriter {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}
