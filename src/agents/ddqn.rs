use {
    super::{
        update_target_net_weights,
        ActionSpec,
        AlgorithmKind,
        Base,
        Policy,
        PolicyMode,
    },
    crate::{
        components::{
            critic_q_all,
            one_hot_rows,
            BetaAnneal,
            Mlp,
            PolynomialDecay,
            ReplayBatch,
            ReplayBuffer,
            Transition,
        },
        configs::DDQN_Config,
        envs::ObsBatch,
    },
    candle_core::{
        Device,
        Result,
        Tensor,
    },
    candle_nn::{
        AdamW,
        Optimizer,
        ParamsAdamW,
    },
    rand::{
        thread_rng,
        Rng,
    },
};

/// Double DQN: epsilon-greedy control over a Q(s, ·) network, with the
/// next action chosen by the online network but valued by a periodically
/// hard-synced target copy.
#[allow(clippy::upper_case_acronyms)]
pub struct DDQN {
    base: Base,
    gamma: f64,
    epsilon: f64,
    assign_interval: u64,
    batch_size: usize,
    use_priority: bool,

    q_net: Mlp,
    q_target_net: Mlp,
    optimizer: AdamW,
    lr: PolynomialDecay,

    data: ReplayBuffer,
}

impl DDQN {
    pub fn new(
        device: &Device,
        config: &DDQN_Config,
        obs_dim: usize,
        action: ActionSpec,
    ) -> Result<Self> {
        if !action.is_discrete() {
            candle_core::bail!("double dqn only supports discrete action spaces")
        }
        let hidden = (config.hidden_1_size, config.hidden_2_size);
        let counts = action.counts();

        let q_net = critic_q_all(device, obs_dim, hidden, counts)?;
        let q_target_net = critic_q_all(device, obs_dim, hidden, counts)?;
        update_target_net_weights(&q_target_net.vars(), &q_net.vars(), None)?;

        let lr = PolynomialDecay::new(config.learning_rate, config.max_episode);
        let optimizer = AdamW::new(
            q_net.vars(),
            ParamsAdamW {
                lr: lr.rate(0),
                ..Default::default()
            },
        )?;

        let data = if config.use_priority {
            ReplayBuffer::prioritized(
                config.buffer_size,
                config.priority_alpha,
                BetaAnneal::new(config.priority_beta, config.max_episode),
            )
        } else {
            ReplayBuffer::new(config.buffer_size)
        };

        Ok(Self {
            base: Base::new(device, action, config.base_dir.clone(), "ddqn"),
            gamma: config.gamma,
            epsilon: config.epsilon,
            assign_interval: config.assign_interval,
            batch_size: config.batch_size,
            use_priority: config.use_priority,
            q_net,
            q_target_net,
            optimizer,
            lr,
            data,
        })
    }

    pub fn replay_buffer(&self) -> &ReplayBuffer {
        &self.data
    }

    fn train(
        &mut self,
        batch: &ReplayBatch,
    ) -> Result<(f64, Tensor)> {
        let features = batch.obs.features()?;
        let next_features = batch.next_obs.features()?;
        let is_weights = batch.importance_weights()?;
        let counts = self.base.action.counts();

        let q = self.q_net.forward(&features)?;
        let q_next = self.q_net.forward(&next_features)?;
        let next_max_one_hot = one_hot_rows(&q_next.argmax(1)?, counts)?;
        let q_target_next = self.q_target_net.forward(&next_features)?;

        let q_eval = q.mul(&batch.action)?.sum_keepdim(1)?;
        let q_target_next_max = q_target_next.mul(&next_max_one_hot)?.sum_keepdim(1)?;
        let continuation = batch.done.affine(-1.0, 1.0)?;
        let q_target = (&batch.reward
            + (self.gamma * continuation.mul(&q_target_next_max)?)?)?
            .detach();

        let td_error = q_eval.sub(&q_target)?;
        let q_loss = td_error.sqr()?.mul(&is_weights)?.mean_all()?;
        self.optimizer.backward_step(&q_loss)?;

        self.base.global_step += 1;
        Ok((q_loss.to_scalar::<f64>()?, td_error))
    }
}

impl Policy for DDQN {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::DDQN
    }

    fn mode(&self) -> PolicyMode {
        PolicyMode::OffPolicy
    }

    fn global_step(&self) -> u64 {
        self.base.global_step
    }

    fn choose_action(
        &mut self,
        obs: &ObsBatch,
    ) -> Result<Tensor> {
        let features = obs.features()?;
        let n = features.dim(0)?;
        let counts = self.base.action.counts();

        let flat = if thread_rng().gen::<f64>() < self.epsilon {
            let random = (0..n)
                .map(|_| thread_rng().gen_range(0..counts) as u32)
                .collect::<Vec<_>>();
            Tensor::from_vec(random, n, &self.base.device)?
        } else {
            self.q_net.forward(&features)?.argmax(1)?
        };
        self.base.decode_action(&flat)
    }

    fn choose_inference_action(
        &mut self,
        obs: &ObsBatch,
    ) -> Result<Tensor> {
        let flat = self.q_net.forward(&obs.features()?)?.argmax(1)?;
        self.base.decode_action(&flat)
    }

    fn store_data(
        &mut self,
        obs: &ObsBatch,
        action: &Tensor,
        reward: &[f64],
        next_obs: &ObsBatch,
        done: &[bool],
    ) -> Result<()> {
        let n = action.dim(0)?;
        let (reward, done) = self.base.reward_done_tensors(reward, done, n)?;
        let action = self.base.encode_action(action)?;

        for i in 0..n {
            self.data.add(Transition {
                obs: obs.row(i)?,
                action: action.narrow(0, i, 1)?,
                log_prob: None,
                reward: reward.narrow(0, i, 1)?,
                next_obs: next_obs.row(i)?,
                done: done.narrow(0, i, 1)?,
            });
        }
        Ok(())
    }

    fn learn(
        &mut self,
        episode: usize,
        step: usize,
    ) -> Result<()> {
        self.optimizer.set_learning_rate(self.lr.rate(episode));

        for _ in 0..step {
            if !self.data.is_lg_batch_size(self.batch_size) {
                continue;
            }
            let batch = self.data.sample(self.batch_size, episode)?;
            let (q_loss, td_error) = self.train(&batch)?;
            if self.use_priority {
                self.data.update_priorities(&batch.indices, &td_error)?;
            }
            if self.base.global_step % self.assign_interval == 0 {
                update_target_net_weights(&self.q_target_net.vars(), &self.q_net.vars(), None)?;
            }

            let global_step = self.base.global_step;
            self.base.recorder.log_scalar("LOSS/loss", q_loss, global_step);
            self.base
                .recorder
                .log_scalar("LEARNING_RATE/lr", self.lr.rate(episode), global_step);
            self.base.recorder.flush();
        }
        Ok(())
    }

    fn writer_summary(
        &mut self,
        episode: usize,
        total_reward: f64,
        last_done_step: i64,
    ) {
        self.base.write_summary(episode, total_reward, last_done_step);
    }

    fn save_checkpoint(
        &self,
        episode: usize,
    ) -> Result<()> {
        if let Some(path) = self.base.checkpoint_path("q", episode) {
            self.q_net.save(&path)?;
        }
        Ok(())
    }
}
