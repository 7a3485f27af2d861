use crate::config::Hyperparams;
use crate::env::{Environment, ScriptedEnv};
use crate::error::DqnError;
use crate::metrics::{MetricsTracker, NullSink};
use crate::network::{QNetwork, ValueEstimator};
use crate::optimizer::{OptimizerWrapper, SGD};
use crate::trainer::{Phase, StopReason, Trainer, TrainerBuilder};

fn small_params() -> Hyperparams {
    Hyperparams {
        stop_reward: 100.0,
        replay_size: 100,
        replay_initial: 8,
        batch_size: 4,
        target_net_sync: 5,
        epsilon_frames: 10,
        n_steps: 2,
        hidden_layers: vec![8],
        ..Hyperparams::catch()
    }
}

fn scripted() -> ScriptedEnv {
    ScriptedEnv::new(vec![0.0, 0.0, 1.0], 2)
}

#[test]
fn test_warm_up_fills_buffer() {
    let mut trainer = TrainerBuilder::new(small_params()).build(scripted()).unwrap();
    assert_eq!(trainer.state().phase, Phase::Warmup);

    trainer.warm_up(&mut NullSink).unwrap();

    assert_eq!(trainer.state().phase, Phase::Training);
    assert_eq!(trainer.buffer().len(), 8);
    assert_eq!(trainer.state().frames, 8);
    assert_eq!(trainer.state().iteration, 0);
    // the seventh experience needs the whole third episode
    assert_eq!(trainer.state().episodes, 3);
}

#[test]
fn test_run_until_iteration_limit() {
    let mut trainer = TrainerBuilder::new(small_params()).build(scripted()).unwrap();
    let mut tracker = MetricsTracker::new(100);

    let state = trainer.run(Some(12), &mut tracker).unwrap();

    assert_eq!(state.phase, Phase::Terminated);
    assert_eq!(state.stop_reason, Some(StopReason::IterationLimit));
    assert_eq!(state.iteration, 12);
    assert_eq!(state.frames, 20);
    assert_eq!(trainer.buffer().len(), 20);
    assert_eq!(trainer.target_net().syncs(), 2);
    assert_eq!(state.epsilon, 0.02);
    assert!(state.last_loss.is_some());
    assert_eq!(state.mean_reward, Some(1.0));

    assert_eq!(tracker.iterations(), 12);
    assert_eq!(tracker.episode_count(), state.episodes);
}

#[test]
fn test_epsilon_follows_iterations() {
    let mut trainer = TrainerBuilder::new(small_params()).build(scripted()).unwrap();
    let metrics = trainer.step_iteration(&mut NullSink).unwrap();
    assert_eq!(metrics.iteration, 1);
    assert!((metrics.epsilon - 0.9).abs() < 1e-6);
    assert!((trainer.selector().epsilon() - 0.9).abs() < 1e-6);
}

#[test]
fn test_step_iteration_changes_network_not_target() {
    let mut trainer = TrainerBuilder::new(small_params()).build(scripted()).unwrap();
    let initial = trainer.net().clone();
    for _ in 0..4 {
        trainer.step_iteration(&mut NullSink).unwrap();
    }
    assert_ne!(trainer.net().parameters(), initial.parameters());
    assert_eq!(trainer.target_net().target_model().parameters(), initial.parameters());

    trainer.step_iteration(&mut NullSink).unwrap();
    assert_eq!(trainer.target_net().target_model().parameters(), trainer.net().parameters());
}

#[test]
fn test_solved_stops_training() {
    let params = Hyperparams { stop_reward: 0.5, ..small_params() };
    let mut trainer = TrainerBuilder::new(params).build(scripted()).unwrap();

    let state = trainer.run(None, &mut NullSink).unwrap();

    assert_eq!(state.stop_reason, Some(StopReason::Solved));
    assert_eq!(state.best_mean_reward, Some(1.0));
    assert!(state.episodes >= 1);
}

#[test]
fn test_no_iterations_after_termination() {
    let params = Hyperparams { stop_reward: 0.5, ..small_params() };
    let mut trainer = TrainerBuilder::new(params).build(scripted()).unwrap();
    let state = trainer.run(None, &mut NullSink).unwrap();
    let parameters = trainer.net().parameters().iter().map(|p| p.to_owned()).collect::<Vec<_>>();

    let err = trainer.step_iteration(&mut NullSink).unwrap_err();

    assert!(matches!(err, DqnError::TrainingTerminated(_)));
    assert_eq!(trainer.state().iteration, state.iteration);
    assert_eq!(trainer.state().frames, state.frames);
    assert_eq!(trainer.state().phase, Phase::Terminated);
    let after = trainer.net().parameters().iter().map(|p| p.to_owned()).collect::<Vec<_>>();
    assert_eq!(after, parameters);
}

#[test]
fn test_environment_failure_terminates() {
    let env = scripted().fail_on_step(15);
    let mut trainer = TrainerBuilder::new(small_params()).build(env).unwrap();

    let err = trainer.run(Some(100), &mut NullSink).unwrap_err();

    assert!(matches!(err, DqnError::EnvironmentFailure(_)));
    assert_eq!(trainer.state().phase, Phase::Terminated);
    assert_eq!(trainer.state().stop_reason, Some(StopReason::Failed));
    assert!(matches!(trainer.step_iteration(&mut NullSink), Err(DqnError::TrainingTerminated(_))));
}

#[test]
fn test_action_count_mismatch_is_rejected() {
    let net = QNetwork::new(&[2, 4, 3], 0).unwrap();
    let result = Trainer::new(small_params(), scripted(), net);
    assert!(matches!(result, Err(DqnError::DimensionMismatch { .. })));
}

#[test]
fn test_builder_checks_network_input() {
    let net = QNetwork::new(&[5, 4, 2], 0).unwrap();
    let result = TrainerBuilder::new(small_params()).network(net).build(scripted());
    assert!(matches!(result, Err(DqnError::DimensionMismatch { .. })));
}

#[test]
fn test_builder_sizes_network_from_environment() {
    let env = scripted();
    let trainer = TrainerBuilder::new(small_params())
        .n_steps(3)
        .seed(9)
        .optimizer(OptimizerWrapper::SGD(SGD::new(0.01)))
        .build(env.clone())
        .unwrap();

    assert_eq!(trainer.net().input_size(), env.observation_size());
    assert_eq!(trainer.net().num_actions(), env.num_actions());
    assert_eq!(trainer.net().layers.len(), 2);
    assert_eq!(trainer.params().n_steps, 3);
    assert_eq!(trainer.params().seed, 9);
    assert!(matches!(trainer.optimizer(), OptimizerWrapper::SGD(_)));
}

#[test]
fn test_invalid_params_are_rejected() {
    let params = Hyperparams { batch_size: 0, ..small_params() };
    assert!(TrainerBuilder::new(params).build(scripted()).is_err());
}
