use ndarray::{array, Array1};
use tempfile::tempdir;

use nstep_dqn::actions::ArgmaxActionSelector;
use nstep_dqn::agent::{Agent, DqnAgent};
use nstep_dqn::config::Hyperparams;
use nstep_dqn::env::{CatchEnv, Environment, StepResult};
use nstep_dqn::metrics::{MetricsSink, MetricsTracker, ScalarWriter};
use nstep_dqn::network::{QNetwork, ValueEstimator};
use nstep_dqn::trainer::{StopReason, TrainerBuilder};
use nstep_dqn::{Action, Result, State};

/// Two-position chain: any action moves from the start to the end, where
/// action 0 pays 1 and ends the episode.
struct Chain {
    position: usize,
}

impl Chain {
    fn new() -> Self {
        Chain { position: 0 }
    }

    fn observation(position: usize) -> State {
        let mut obs = Array1::zeros(2);
        obs[position] = 1.0;
        obs
    }
}

impl Environment for Chain {
    fn reset(&mut self) -> Result<State> {
        self.position = 0;
        Ok(Self::observation(0))
    }

    fn step(&mut self, action: Action) -> Result<StepResult> {
        if self.position == 0 {
            self.position = 1;
            return Ok(StepResult { state: Self::observation(1), reward: 0.0, done: false });
        }
        let reward = if action == 0 { 1.0 } else { 0.0 };
        Ok(StepResult { state: Self::observation(1), reward, done: true })
    }

    fn num_actions(&self) -> usize {
        2
    }

    fn observation_size(&self) -> usize {
        2
    }
}

fn chain_params(n_steps: usize) -> Hyperparams {
    Hyperparams {
        stop_reward: 10.0,
        replay_size: 1000,
        replay_initial: 64,
        batch_size: 16,
        target_net_sync: 50,
        epsilon_frames: 500,
        epsilon_final: 0.1,
        learning_rate: 0.005,
        gamma: 0.5,
        n_steps,
        hidden_layers: vec![16],
        ..Hyperparams::catch()
    }
}

#[test]
fn test_chain_values_converge() {
    let mut trainer = TrainerBuilder::new(chain_params(1)).build(Chain::new()).unwrap();
    let state = trainer.run(Some(3000), &mut MetricsTracker::default()).unwrap();
    assert_eq!(state.stop_reason, Some(StopReason::IterationLimit));

    let q = trainer.net().forward(array![[1.0, 0.0], [0.0, 1.0]].view()).unwrap();
    // end: Q = [1, 0]; start: Q = gamma * max Q(end) for either action
    assert!((q[[1, 0]] - 1.0).abs() < 0.15, "Q(end, 0) = {}", q[[1, 0]]);
    assert!(q[[1, 1]].abs() < 0.15, "Q(end, 1) = {}", q[[1, 1]]);
    assert!((q[[0, 0]] - 0.5).abs() < 0.15, "Q(start, 0) = {}", q[[0, 0]]);
    assert!((q[[0, 1]] - 0.5).abs() < 0.15, "Q(start, 1) = {}", q[[0, 1]]);

    let mut selector = ArgmaxActionSelector;
    let mut agent = DqnAgent::new(trainer.net(), &mut selector);
    assert_eq!(agent.act_one(&Chain::observation(1)).unwrap(), 0);
}

#[test]
fn test_two_step_unroll_folds_reward_into_start() {
    let mut trainer = TrainerBuilder::new(chain_params(2)).build(Chain::new()).unwrap();
    trainer.run(Some(3000), &mut MetricsTracker::default()).unwrap();

    // Start experiences carry 0 + gamma * r directly, no bootstrap.
    let q = trainer.net().forward(array![[1.0, 0.0]].view()).unwrap();
    assert!(q[[0, 0]] > 0.2 && q[[0, 0]] < 0.6, "Q(start, 0) = {}", q[[0, 0]]);
    assert!(trainer.buffer().iter().filter(|e| e.state[0] == 1.0).all(|e| e.is_terminal()));
}

#[test]
fn test_catch_pipeline_end_to_end() {
    let dir = tempdir().unwrap();
    let params = Hyperparams {
        replay_initial: 200,
        batch_size: 16,
        target_net_sync: 100,
        epsilon_frames: 500,
        ..Hyperparams::catch()
    };

    let mut trainer = TrainerBuilder::new(params).n_steps(4).build(CatchEnv::new(5)).unwrap();
    let mut sinks: Vec<Box<dyn MetricsSink>> = vec![
        Box::new(MetricsTracker::default()),
        Box::new(ScalarWriter::new(dir.path(), "catch-4-steps").unwrap()),
    ];
    let state = trainer.run(Some(400), &mut sinks).unwrap();
    drop(sinks);

    assert_eq!(state.iteration, 400);
    assert_eq!(state.frames, 600);
    assert_eq!(trainer.target_net().syncs(), 4);
    assert!(state.last_loss.map_or(false, f32::is_finite));
    // every catch episode is seven steps long
    assert_eq!(state.episodes, 600 / 7 + usize::from(600 % 7 != 0));

    let csv = std::fs::read_to_string(dir.path().join("catch-4-steps").join("scalars.csv")).unwrap();
    assert!(csv.lines().any(|line| line.contains(",mean_reward,")));

    let model_path = dir.path().join("net.bin");
    let model_path = model_path.to_str().unwrap();
    trainer.net().save(model_path).unwrap();
    let loaded = QNetwork::load(model_path).unwrap();
    let obs = CatchEnv::new(1).reset().unwrap().insert_axis(ndarray::Axis(0));
    assert_eq!(loaded.forward(obs.view()).unwrap(), trainer.net().forward(obs.view()).unwrap());
}
