#[cfg(test)]
mod property_tests {
    use ndarray::{array, ArrayView2};
    use proptest::prelude::*;

    use nstep_dqn::agent::Agent;
    use nstep_dqn::env::ScriptedEnv;
    use nstep_dqn::experience::{ExperienceFirstLast, ExperienceSource};
    use nstep_dqn::replay_buffer::ReplayBuffer;
    use nstep_dqn::{Action, Result};

    struct FirstAction;

    impl Agent for FirstAction {
        fn act(&mut self, observations: ArrayView2<f32>) -> Result<Vec<Action>> {
            Ok(vec![0; observations.nrows()])
        }
    }

    fn rewards_strategy() -> impl Strategy<Value = Vec<f32>> {
        prop::collection::vec(-5.0f32..5.0, 1..=12)
    }

    fn discounted(rewards: &[f32], gamma: f32) -> f32 {
        rewards.iter().rev().fold(0.0, |total, r| total * gamma + r)
    }

    fn episode(rewards: &[f32], gamma: f32, n: usize) -> Vec<ExperienceFirstLast> {
        let env = ScriptedEnv::new(rewards.to_vec(), 2);
        let mut source = ExperienceSource::new(env, gamma, n).unwrap();
        (0..rewards.len()).map(|_| source.next_experience(&mut FirstAction).unwrap()).collect()
    }

    proptest! {
        #[test]
        fn test_constant_reward_closed_form(r in -2.0f32..2.0, gamma in 0.1f32..0.99, n in 1usize..6) {
            // long enough for every start before the tail to see a full window
            let rewards = vec![r; n + 3];
            let experiences = episode(&rewards, gamma, n);
            let expected = r * (1.0 - gamma.powi(n as i32)) / (1.0 - gamma);
            for exp in experiences.iter().filter(|e| !e.is_terminal()) {
                prop_assert!((exp.reward - expected).abs() < 1e-4, "{} vs {}", exp.reward, expected);
            }
        }

        #[test]
        fn test_episode_emits_one_experience_per_step(rewards in rewards_strategy(), n in 1usize..6) {
            let experiences = episode(&rewards, 0.9, n);
            let len = rewards.len();

            for (step, exp) in experiences.iter().enumerate() {
                prop_assert_eq!(&exp.state, &ScriptedEnv::observation(step, 0));
                let bootstrap = step + n < len;
                prop_assert_eq!(!exp.is_terminal(), bootstrap);
                if bootstrap {
                    prop_assert_eq!(exp.last_state.as_ref().unwrap(), &ScriptedEnv::observation(step + n, 0));
                }
            }
            let terminal = experiences.iter().filter(|e| e.is_terminal()).count();
            prop_assert_eq!(terminal, n.min(len));
        }

        #[test]
        fn test_rewards_match_discounted_windows(rewards in rewards_strategy(), gamma in 0.0f32..1.0, n in 1usize..6) {
            let experiences = episode(&rewards, gamma, n);
            for (step, exp) in experiences.iter().enumerate() {
                let end = (step + n).min(rewards.len());
                let expected = discounted(&rewards[step..end], gamma);
                prop_assert!((exp.reward - expected).abs() < 1e-4, "step {}: {} vs {}", step, exp.reward, expected);
            }
        }

        #[test]
        fn test_buffer_never_exceeds_capacity(capacity in 1usize..50, appends in 0usize..200) {
            let mut buffer = ReplayBuffer::new(capacity, 0, 0).unwrap();
            for i in 0..appends {
                buffer.append(ExperienceFirstLast { state: array![i as f32], action: 0, reward: 0.0, last_state: None });
                prop_assert!(buffer.len() <= capacity);
            }
            prop_assert_eq!(buffer.len(), appends.min(capacity));
            // the newest entries survive
            if appends > 0 {
                let newest = buffer.iter().last().unwrap().state[0];
                prop_assert_eq!(newest, (appends - 1) as f32);
            }
        }

        #[test]
        fn test_samples_come_from_buffer(capacity in 4usize..30, batch in 1usize..8) {
            let mut buffer = ReplayBuffer::new(capacity, 0, 3).unwrap();
            for i in 0..capacity {
                buffer.append(ExperienceFirstLast { state: array![i as f32], action: i % 3, reward: 0.0, last_state: None });
            }
            let size = batch.min(capacity);
            let sample = buffer.sample(size).unwrap();
            prop_assert_eq!(sample.len(), size);
            for exp in sample {
                prop_assert!((exp.state[0] as usize) < capacity);
            }
        }
    }
}
