use ndarray::{array, Array2};

use crate::actions::{
    ActionSelector, ArgmaxActionSelector, EpsilonGreedyActionSelector, EpsilonTracker,
};
use crate::agent::{Agent, DqnAgent};
use crate::network::{Activation, DenseLayer, QNetwork};

// Q(s) = [s, -s, 0]
fn signed_net() -> QNetwork {
    let layer = DenseLayer::from_parameters(array![[1.0, -1.0, 0.0]], array![0.0, 0.0, 0.0], Activation::Linear).unwrap();
    QNetwork::with_layers(vec![layer]).unwrap()
}

#[test]
fn test_argmax_selector_picks_best_per_row() {
    let mut selector = ArgmaxActionSelector;
    let q_values = array![[0.1, 0.9, 0.3], [2.0, -1.0, 2.0], [-3.0, -2.0, -1.0]];
    assert_eq!(selector.select(q_values.view()).unwrap(), vec![1, 0, 2]);
}

#[test]
fn test_selector_rejects_empty_action_space() {
    let mut selector = ArgmaxActionSelector;
    assert!(selector.select(Array2::<f32>::zeros((2, 0)).view()).is_err());
}

#[test]
fn test_epsilon_zero_is_greedy() {
    let mut selector = EpsilonGreedyActionSelector::new(0.0, 3);
    let q_values = Array2::from_shape_fn((50, 3), |(_, j)| [0.0, 5.0, 1.0][j]);
    assert!(selector.select(q_values.view()).unwrap().iter().all(|&a| a == 1));
}

#[test]
fn test_epsilon_one_is_uniform() {
    let mut selector = EpsilonGreedyActionSelector::new(1.0, 3);
    let q_values = Array2::from_elem((3000, 3), 0.0);
    let actions = selector.select(q_values.view()).unwrap();

    let mut counts = [0usize; 3];
    for a in actions {
        counts[a] += 1;
    }
    for count in counts {
        assert!(count > 850 && count < 1150, "count {} far from 1000", count);
    }
}

#[test]
fn test_set_epsilon_is_clamped() {
    let mut selector = EpsilonGreedyActionSelector::new(0.5, 0);
    selector.set_epsilon(1.5);
    assert_eq!(selector.epsilon(), 1.0);
    selector.set_epsilon(-0.2);
    assert_eq!(selector.epsilon(), 0.0);
}

#[test]
fn test_tracker_drives_selector() {
    let tracker = EpsilonTracker::new(1.0, 0.1, 10).unwrap();
    let mut selector = EpsilonGreedyActionSelector::new(1.0, 0);

    tracker.frame(&mut selector, 5);
    assert!((selector.epsilon() - 0.5).abs() < 1e-6);
    tracker.frame(&mut selector, 20);
    assert_eq!(selector.epsilon(), 0.1);

    assert!(EpsilonTracker::new(0.1, 0.5, 10).is_err());
    assert!(EpsilonTracker::new(1.0, 0.1, 0).is_err());
}

#[test]
fn test_dqn_agent_acts_greedily() {
    let net = signed_net();
    let mut selector = ArgmaxActionSelector;
    let mut agent = DqnAgent::new(&net, &mut selector);

    let actions = agent.act(array![[2.0], [-2.0], [0.0]].view()).unwrap();
    assert_eq!(actions, vec![0, 1, 0]);
    assert_eq!(agent.q_values(array![[1.0]].view()).unwrap(), array![[1.0, -1.0, 0.0]]);
}

#[test]
fn test_act_one() {
    let net = signed_net();
    let mut selector = ArgmaxActionSelector;
    let mut agent = DqnAgent::new(&net, &mut selector);
    assert_eq!(agent.act_one(&array![-4.0]).unwrap(), 1);
}

#[test]
fn test_agent_sees_updated_epsilon() {
    let net = signed_net();
    let mut selector = EpsilonGreedyActionSelector::new(1.0, 11);
    let tracker = EpsilonTracker::new(1.0, 0.0, 1).unwrap();
    tracker.frame(&mut selector, 1);

    let mut agent = DqnAgent::new(&net, &mut selector);
    let actions = agent.act(Array2::from_elem((20, 1), 3.0).view()).unwrap();
    assert!(actions.iter().all(|&a| a == 0));
}

#[test]
fn test_agent_rejects_wrong_observation_width() {
    let net = signed_net();
    let mut selector = ArgmaxActionSelector;
    let mut agent = DqnAgent::new(&net, &mut selector);
    assert!(agent.act(array![[1.0, 2.0]].view()).is_err());
}
