use {
    super::{
        ActionSpec,
        AlgorithmKind,
        Base,
        Policy,
        PolicyMode,
    },
    crate::{
        components::{
            actor_continuous,
            actor_logits,
            categorical_sample,
            critic_q,
            gumbel_softmax,
            one_hot_rows,
            BetaAnneal,
            Mlp,
            OuNoise,
            QNetwork,
            ReplayBatch,
            ReplayBuffer,
            Transition,
        },
        configs::DPG_Config,
        envs::ObsBatch,
    },
    candle_core::{
        Device,
        Result,
        Tensor,
    },
    candle_nn::{
        ops::log_softmax,
        AdamW,
        Optimizer,
        ParamsAdamW,
    },
};

// Gumbel-softmax temperature of the discrete policy relaxation.
const DISCRETE_TAU: f64 = 0.1;

/// Deterministic policy gradient with a single Q critic and no target
/// networks. Continuous actions explore through Ornstein-Uhlenbeck noise;
/// discrete actions train through a Gumbel-softmax relaxation.
#[allow(clippy::upper_case_acronyms)]
pub struct DPG {
    base: Base,
    gamma: f64,
    learning_rate: f64,
    batch_size: usize,
    use_priority: bool,

    actor_net: Mlp,
    q_net: QNetwork,
    action_noise: Option<OuNoise>,
    optimizer_actor: AdamW,
    optimizer_critic: AdamW,

    data: ReplayBuffer,
}

impl DPG {
    pub fn new(
        device: &Device,
        config: &DPG_Config,
        obs_dim: usize,
        action: ActionSpec,
    ) -> Result<Self> {
        let hidden = (config.hidden_1_size, config.hidden_2_size);
        let counts = action.counts();

        let (actor_net, action_noise) = match &action {
            ActionSpec::Continuous { .. } => (
                actor_continuous(device, obs_dim, hidden, counts)?,
                Some(OuNoise::new(
                    0.0,
                    config.ou_theta,
                    config.ou_sigma,
                    config.ou_dt,
                    counts,
                    device,
                )?),
            ),
            ActionSpec::Discrete { .. } => {
                (actor_logits(device, obs_dim, hidden, counts)?, None)
            }
        };
        let q_net = critic_q(device, obs_dim, counts, hidden)?;

        let optimizer_actor = AdamW::new(
            actor_net.vars(),
            ParamsAdamW {
                lr: config.learning_rate,
                ..Default::default()
            },
        )?;
        let optimizer_critic = AdamW::new(
            q_net.vars(),
            ParamsAdamW {
                lr: config.learning_rate,
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
            base: Base::new(device, action, config.base_dir.clone(), "dpg"),
            gamma: config.gamma,
            learning_rate: config.learning_rate,
            batch_size: config.batch_size,
            use_priority: config.use_priority,
            actor_net,
            q_net,
            action_noise,
            optimizer_actor,
            optimizer_critic,
            data,
        })
    }

    fn noise(&mut self) -> Result<&mut OuNoise> {
        match &mut self.action_noise {
            Some(noise) => Ok(noise),
            None => candle_core::bail!("exploration noise requested on a discrete policy"),
        }
    }

    pub fn replay_buffer(&self) -> &ReplayBuffer {
        &self.data
    }

    fn train(
        &mut self,
        batch: &ReplayBatch,
    ) -> Result<(f64, f64, Tensor)> {
        let features = batch.obs.features()?;
        let next_features = batch.next_obs.features()?;
        let is_weights = batch.importance_weights()?;
        let counts = self.base.action.counts();

        // critic: 1-step TD against the policy's own next action
        let action_target = if self.base.action.is_discrete() {
            let target_logits = self.actor_net.forward(&next_features)?;
            one_hot_rows(&categorical_sample(&target_logits)?, counts)?
        } else {
            let target_mu = self.actor_net.forward(&next_features)?;
            let noise = self.noise()?.sample()?;
            target_mu.broadcast_add(&noise)?.clamp(-1.0, 1.0)?
        };
        let q_target = self.q_net.forward(&next_features, &action_target)?;
        let continuation = batch.done.affine(-1.0, 1.0)?;
        let dc_r = (&batch.reward + (self.gamma * q_target.mul(&continuation)?)?)?.detach();

        let q = self.q_net.forward(&features, &batch.action)?;
        let td_error = q.sub(&dc_r)?;
        let q_loss = (td_error.sqr()?.mul(&is_weights)?.mean_all()? * 0.5)?;
        self.optimizer_critic.backward_step(&q_loss)?;

        // actor: ascend Q along the deterministic (or relaxed) policy
        let mu = if self.base.action.is_discrete() {
            let logits = self.actor_net.forward(&features)?;
            gumbel_softmax(&log_softmax(&logits, 1)?, DISCRETE_TAU)?
        } else {
            self.actor_net.forward(&features)?
        };
        let q_actor = self.q_net.forward(&features, &mu)?;
        let actor_loss = q_actor.mean_all()?.neg()?;
        self.optimizer_actor.backward_step(&actor_loss)?;

        self.base.global_step += 1;
        Ok((
            actor_loss.to_scalar::<f64>()?,
            q_loss.to_scalar::<f64>()?,
            td_error,
        ))
    }
}

impl Policy for DPG {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::DPG
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
        if self.base.action.is_discrete() {
            let logits = self.actor_net.forward(&features)?;
            let flat = categorical_sample(&logits)?;
            self.base.decode_action(&flat)
        } else {
            let mu = self.actor_net.forward(&features)?;
            let noise = self.noise()?.sample()?;
            mu.broadcast_add(&noise)?.clamp(-1.0, 1.0)
        }
    }

    fn choose_inference_action(
        &mut self,
        obs: &ObsBatch,
    ) -> Result<Tensor> {
        let features = obs.features()?;
        if self.base.action.is_discrete() {
            let logits = self.actor_net.forward(&features)?;
            self.base.decode_action(&logits.argmax(1)?)
        } else {
            self.actor_net.forward(&features)
        }
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

    /// One gradient update per episode, however long the episode ran.
    fn learn(
        &mut self,
        episode: usize,
        _step: usize,
    ) -> Result<()> {
        if !self.data.is_lg_batch_size(self.batch_size) {
            return Ok(());
        }
        let batch = self.data.sample(self.batch_size, episode)?;
        let (actor_loss, q_loss, td_error) = self.train(&batch)?;
        if self.use_priority {
            self.data.update_priorities(&batch.indices, &td_error)?;
        }

        let global_step = self.base.global_step;
        self.base.recorder.log_scalar("LOSS/actor_loss", actor_loss, global_step);
        self.base.recorder.log_scalar("LOSS/critic_loss", q_loss, global_step);
        self.base
            .recorder
            .log_scalar("LEARNING_RATE/lr", self.learning_rate, global_step);
        self.base.recorder.flush();
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
        if let Some(path) = self.base.checkpoint_path("actor", episode) {
            self.actor_net.save(&path)?;
        }
        if let Some(path) = self.base.checkpoint_path("q", episode) {
            self.q_net.save(&path)?;
        }
        Ok(())
    }
}
