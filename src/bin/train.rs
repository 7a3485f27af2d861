use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use nstep_dqn::config::{Device, Hyperparams, DEFAULT_N_STEPS};
use nstep_dqn::env;
use nstep_dqn::metrics::{LogSink, MetricsSink, ScalarWriter};
use nstep_dqn::trainer::{StopReason, TrainerBuilder};

/// Train an n-step DQN agent.
#[derive(Parser)]
#[command(name = "train", about = "Train an n-step DQN agent")]
struct Cli {
    /// Hyperparameter preset: pong, breakout-small, breakout, invaders or catch
    #[arg(long, default_value = "catch")]
    preset: String,

    /// JSON hyperparameter file, used instead of the preset
    #[arg(long)]
    config: Option<PathBuf>,

    /// Count of steps to unroll the Bellman equation
    #[arg(short = 'n', default_value_t = DEFAULT_N_STEPS)]
    n: usize,

    /// Request CUDA
    #[arg(long)]
    cuda: bool,

    /// Stop after this many training iterations
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Write the trained network here (bincode)
    #[arg(long)]
    save: Option<PathBuf>,

    /// Append scalar metrics as CSV under this directory
    #[arg(long)]
    metrics_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut params = match &cli.config {
        Some(path) => Hyperparams::load(path).with_context(|| format!("loading config from {}", path.display()))?,
        None => Hyperparams::preset(&cli.preset)?,
    };
    params.run_name = format!("{}-{}-steps", params.run_name, cli.n);

    let environment = env::make(&params.env_name, params.seed)?;
    let mut trainer = TrainerBuilder::new(params)
        .n_steps(cli.n)
        .device(Device::from_flag(cli.cuda))
        .build(environment)?;

    let mut sinks: Vec<Box<dyn MetricsSink>> = vec![Box::new(LogSink::default())];
    if let Some(dir) = &cli.metrics_dir {
        let writer = ScalarWriter::new(dir, &trainer.params().run_name)
            .with_context(|| format!("creating metrics log in {}", dir.display()))?;
        info!("writing scalars to {}", writer.path().display());
        sinks.push(Box::new(writer));
    }

    let state = trainer.run(cli.max_iterations, &mut sinks)?;
    // Flushes the CSV writer before the summary line.
    drop(sinks);

    match state.stop_reason {
        Some(StopReason::Solved) => info!(
            "solved after {} iterations, {} episodes, {} frames",
            state.iteration, state.episodes, state.frames
        ),
        _ => info!(
            "stopped after {} iterations without solving, best mean reward {:.2}",
            state.iteration,
            state.best_mean_reward.unwrap_or(f32::NAN)
        ),
    }

    if let Some(path) = &cli.save {
        let path_str = path.to_str().context("model path is not valid UTF-8")?;
        trainer.net().save(path_str)?;
        info!("network saved to {}", path.display());
    }
    Ok(())
}
