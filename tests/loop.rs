use {
    anyhow::Result,
    candle_core::{
        Device,
        Tensor,
    },
    vector_rl::{
        agents::{
            ActionSpec,
            Policy,
            A2C,
            DDQN,
            TD3,
        },
        configs::{
            A2C_Config,
            DDQN_Config,
            TD3_Config,
            TrainConfig,
        },
        engines::{
            evaluate,
            no_op,
            train,
        },
        envs::{
            EnvStep,
            Environment,
            Space,
        },
    },
};

/// A deterministic two-instance environment: every step yields reward 1,
/// observations count the steps since the instance's last reset, and
/// instances terminate after a fixed number of steps (or never).
struct ToyEnv {
    n: usize,
    steps: Vec<usize>,
    done_at: Option<usize>,
    last_dones: Vec<usize>,
    discrete: bool,
}

impl ToyEnv {
    fn continuous(done_at: Option<usize>) -> Self {
        Self {
            n: 2,
            steps: vec![0; 2],
            done_at,
            last_dones: Vec::new(),
            discrete: false,
        }
    }

    fn discrete(done_at: Option<usize>) -> Self {
        Self {
            n: 2,
            steps: vec![0; 2],
            done_at,
            last_dones: Vec::new(),
            discrete: true,
        }
    }

    fn observe(
        &self,
        instances: &[usize],
    ) -> Result<Tensor> {
        if self.discrete {
            let obs = instances
                .iter()
                .map(|&i| (self.steps[i] % 3) as u32)
                .collect::<Vec<_>>();
            Ok(Tensor::from_vec(obs, (instances.len(), 1), &Device::Cpu)?)
        } else {
            let obs = instances
                .iter()
                .flat_map(|&i| vec![self.steps[i] as f64; 3])
                .collect::<Vec<_>>();
            Ok(Tensor::from_vec(obs, (instances.len(), 3), &Device::Cpu)?)
        }
    }
}

impl Environment for ToyEnv {
    fn n(&self) -> usize {
        self.n
    }

    fn reset(&mut self) -> Result<Tensor> {
        self.steps = vec![0; self.n];
        self.last_dones.clear();
        self.observe(&(0..self.n).collect::<Vec<_>>())
    }

    fn step(
        &mut self,
        action: &Tensor,
    ) -> Result<EnvStep> {
        assert_eq!(action.dim(0)?, self.n);

        let mut done = vec![false; self.n];
        self.last_dones.clear();
        for i in 0..self.n {
            self.steps[i] += 1;
            if let Some(done_at) = self.done_at {
                if self.steps[i] >= done_at {
                    done[i] = true;
                    self.last_dones.push(i);
                }
            }
        }

        Ok(EnvStep {
            obs: self.observe(&(0..self.n).collect::<Vec<_>>())?,
            reward: vec![1.0; self.n],
            done,
        })
    }

    fn dones_index(&self) -> Vec<usize> {
        self.last_dones.clone()
    }

    fn partial_reset(&mut self) -> Result<Tensor> {
        let indices = self.last_dones.clone();
        for &i in &indices {
            self.steps[i] = 0;
        }
        self.observe(&indices)
    }

    fn observation_space(&self) -> Space {
        if self.discrete {
            Space::Discrete {
                branches: vec![3],
            }
        } else {
            Space::Continuous {
                shape: vec![3],
                low: vec![f64::MIN; 3],
                high: vec![f64::MAX; 3],
            }
        }
    }

    fn action_space(&self) -> Space {
        if self.discrete {
            Space::Discrete {
                branches: vec![2],
            }
        } else {
            Space::Continuous {
                shape: vec![1],
                low: vec![-2.0],
                high: vec![2.0],
            }
        }
    }

    fn sample_action(&mut self) -> Result<Tensor> {
        if self.discrete {
            Ok(Tensor::from_vec(vec![0u32; self.n], (self.n, 1), &Device::Cpu)?)
        } else {
            Ok(Tensor::zeros(
                (self.n, 1),
                candle_core::DType::F64,
                &Device::Cpu,
            )?)
        }
    }
}

fn small_td3_config() -> TD3_Config {
    TD3_Config {
        max_episode: 10,
        batch_size: 4,
        buffer_size: 64,
        hidden_1_size: 8,
        hidden_2_size: 8,
        ..Default::default()
    }
}

fn one_episode(max_step: usize) -> TrainConfig {
    TrainConfig {
        begin_episode: 0,
        max_episode: 1,
        max_step,
        save_frequency: 100,
        eval_while_train: false,
        max_eval_episode: 4,
    }
}

#[test]
fn off_policy_episode_stores_n_times_max_step_transitions() -> Result<()> {
    let mut env = ToyEnv::continuous(None);
    let mut model = TD3::new(
        &Device::Cpu,
        &small_td3_config(),
        3,
        ActionSpec::Continuous { dim: 1 },
    )?;

    let report = train(&mut env, &mut model, &one_episode(4))?;

    // 2 instances x 4 steps, no early termination
    assert_eq!(model.replay_buffer().len(), 8);
    // learn(episode, step) ran step inner updates, once the buffer could
    // serve the batch size
    assert_eq!(model.global_step(), 4);
    // every step paid reward 1 per instance
    assert_eq!(report.mean_returns, vec![4.0]);
    assert_eq!(report.last_done_steps, vec![-1]);
    Ok(())
}

#[test]
fn off_policy_episode_breaks_once_every_instance_is_done() -> Result<()> {
    let mut env = ToyEnv::continuous(Some(2));
    let mut model = TD3::new(
        &Device::Cpu,
        &small_td3_config(),
        3,
        ActionSpec::Continuous { dim: 1 },
    )?;

    let report = train(&mut env, &mut model, &one_episode(4))?;

    assert_eq!(model.replay_buffer().len(), 4);
    assert_eq!(report.last_done_steps, vec![2]);
    assert_eq!(report.mean_returns, vec![2.0]);
    Ok(())
}

#[test]
fn on_policy_episode_always_runs_to_the_step_cap() -> Result<()> {
    let mut env = ToyEnv::continuous(Some(2));
    let config = A2C_Config {
        max_episode: 10,
        batch_size: 2,
        epoch: 1,
        hidden_1_size: 8,
        hidden_2_size: 8,
        ..Default::default()
    };
    let mut model = A2C::new(
        &Device::Cpu,
        &config,
        3,
        ActionSpec::Continuous { dim: 1 },
    )?;

    let report = train(&mut env, &mut model, &one_episode(4))?;

    // all instances were done at step 2, but the on-policy loop kept
    // collecting until max_step, partial-resetting the finished instances
    assert_eq!(report.last_done_steps, vec![2]);
    assert_eq!(report.mean_returns, vec![2.0]);
    // one learn call per episode, and the rollout is gone afterwards
    assert_eq!(model.global_step(), 1);
    assert!(model.rollout_buffer().is_empty());
    Ok(())
}

#[test]
fn on_policy_learn_rejects_batches_larger_than_the_rollout() -> Result<()> {
    let mut env = ToyEnv::continuous(None);
    let config = A2C_Config {
        max_episode: 10,
        batch_size: 64,
        epoch: 1,
        hidden_1_size: 8,
        hidden_2_size: 8,
        ..Default::default()
    };
    let mut model = A2C::new(
        &Device::Cpu,
        &config,
        3,
        ActionSpec::Continuous { dim: 1 },
    )?;

    // 4-step episodes can never fill a 64-step batch
    assert!(train(&mut env, &mut model, &one_episode(4)).is_err());
    Ok(())
}

#[test]
fn discrete_control_runs_end_to_end() -> Result<()> {
    let mut env = ToyEnv::discrete(None);
    let config = DDQN_Config {
        max_episode: 10,
        batch_size: 2,
        buffer_size: 64,
        hidden_1_size: 8,
        hidden_2_size: 8,
        ..Default::default()
    };
    // the one-hot encoded observation space has width 3
    let mut model = DDQN::new(
        &Device::Cpu,
        &config,
        3,
        ActionSpec::Discrete {
            branches: vec![2],
        },
    )?;

    train(&mut env, &mut model, &one_episode(3))?;

    assert_eq!(model.replay_buffer().len(), 6);
    assert_eq!(model.global_step(), 3);
    Ok(())
}

#[test]
fn ddqn_rejects_continuous_action_spaces() {
    let result = DDQN::new(
        &Device::Cpu,
        &DDQN_Config::default(),
        3,
        ActionSpec::Continuous { dim: 1 },
    );
    assert!(result.is_err());
}

#[test]
fn prioritized_replay_trains_end_to_end() -> Result<()> {
    let mut env = ToyEnv::continuous(None);
    let config = TD3_Config {
        use_priority: true,
        ..small_td3_config()
    };
    let mut model = TD3::new(
        &Device::Cpu,
        &config,
        3,
        ActionSpec::Continuous { dim: 1 },
    )?;

    train(&mut env, &mut model, &one_episode(4))?;
    assert_eq!(model.global_step(), 4);
    Ok(())
}

#[test]
fn no_op_prefills_the_replay_buffer() -> Result<()> {
    let mut env = ToyEnv::continuous(None);
    let mut model = TD3::new(
        &Device::Cpu,
        &small_td3_config(),
        3,
        ActionSpec::Continuous { dim: 1 },
    )?;

    no_op(&mut env, &mut model, 5, false)?;

    // 5 requested steps round up to 3 vectorized steps of 2 instances
    assert_eq!(model.replay_buffer().len(), 6);
    assert_eq!(model.global_step(), 0);
    Ok(())
}

#[test]
fn evaluation_reports_average_return_and_steps() -> Result<()> {
    let mut env = ToyEnv::continuous(Some(2));
    let mut model = TD3::new(
        &Device::Cpu,
        &small_td3_config(),
        3,
        ActionSpec::Continuous { dim: 1 },
    )?;

    let (average_reward, average_step) = evaluate(&mut env, &mut model, 4, 2)?;
    assert!((average_reward - 2.0).abs() < 1e-12);
    assert_eq!(average_step, 2);
    Ok(())
}
