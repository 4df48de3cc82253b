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
            actor_continuous,
            actor_logits,
            categorical_sample,
            critic_q,
            gumbel_softmax,
            one_hot_rows,
            straight_through,
            BetaAnneal,
            Mlp,
            OuNoise,
            PolynomialDecay,
            QNetwork,
            ReplayBatch,
            ReplayBuffer,
            Transition,
        },
        configs::TD3_Config,
        envs::ObsBatch,
    },
    candle_core::{
        Device,
        Result,
        Tensor,
        Var,
    },
    candle_nn::{
        ops::log_softmax,
        AdamW,
        Optimizer,
        ParamsAdamW,
    },
};

/// Twin-delayed deep deterministic policy gradient: clipped double-Q
/// targets over twin critics, two critic updates per actor update, and
/// Polyak-averaged target copies of the actor and both critics. Discrete
/// actions train through a straight-through Gumbel-softmax estimator.
#[allow(clippy::upper_case_acronyms)]
pub struct TD3 {
    base: Base,
    gamma: f64,
    ployak: f64,
    discrete_tau: f64,
    batch_size: usize,
    use_priority: bool,

    actor_net: Mlp,
    actor_target_net: Mlp,
    q1_net: QNetwork,
    q1_target_net: QNetwork,
    q2_net: QNetwork,
    q2_target_net: QNetwork,
    action_noise: Option<OuNoise>,
    optimizer_actor: AdamW,
    optimizer_critic: AdamW,
    actor_lr: PolynomialDecay,
    critic_lr: PolynomialDecay,

    data: ReplayBuffer,
}

impl TD3 {
    pub fn new(
        device: &Device,
        config: &TD3_Config,
        obs_dim: usize,
        action: ActionSpec,
    ) -> Result<Self> {
        let hidden = (config.hidden_1_size, config.hidden_2_size);
        let counts = action.counts();

        let (actor_net, actor_target_net, action_noise) = match &action {
            ActionSpec::Continuous { .. } => (
                actor_continuous(device, obs_dim, hidden, counts)?,
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
            ActionSpec::Discrete { .. } => (
                actor_logits(device, obs_dim, hidden, counts)?,
                actor_logits(device, obs_dim, hidden, counts)?,
                None,
            ),
        };
        let q1_net = critic_q(device, obs_dim, counts, hidden)?;
        let q1_target_net = critic_q(device, obs_dim, counts, hidden)?;
        let q2_net = critic_q(device, obs_dim, counts, hidden)?;
        let q2_target_net = critic_q(device, obs_dim, counts, hidden)?;

        update_target_net_weights(
            &Self::target_vars_of(&actor_target_net, &q1_target_net, &q2_target_net),
            &Self::target_vars_of(&actor_net, &q1_net, &q2_net),
            None,
        )?;

        let actor_lr = PolynomialDecay::new(config.actor_learning_rate, config.max_episode);
        let critic_lr = PolynomialDecay::new(config.critic_learning_rate, config.max_episode);

        let optimizer_actor = AdamW::new(
            actor_net.vars(),
            ParamsAdamW {
                lr: actor_lr.rate(0),
                ..Default::default()
            },
        )?;
        let mut critic_vars = q1_net.vars();
        critic_vars.extend(q2_net.vars());
        let optimizer_critic = AdamW::new(
            critic_vars,
            ParamsAdamW {
                lr: critic_lr.rate(0),
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
            base: Base::new(device, action, config.base_dir.clone(), "td3"),
            gamma: config.gamma,
            ployak: config.ployak,
            discrete_tau: config.discrete_tau,
            batch_size: config.batch_size,
            use_priority: config.use_priority,
            actor_net,
            actor_target_net,
            q1_net,
            q1_target_net,
            q2_net,
            q2_target_net,
            action_noise,
            optimizer_actor,
            optimizer_critic,
            actor_lr,
            critic_lr,
            data,
        })
    }

    fn target_vars_of(
        actor: &Mlp,
        q1: &QNetwork,
        q2: &QNetwork,
    ) -> Vec<Var> {
        let mut vars = actor.vars();
        vars.extend(q1.vars());
        vars.extend(q2.vars());
        vars
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

    /// The target policy's action for the bootstrap: noised-and-clipped for
    /// continuous actions, a sampled hard one-hot for discrete ones.
    fn target_action(
        &mut self,
        next_features: &Tensor,
    ) -> Result<Tensor> {
        if self.base.action.is_discrete() {
            let target_logits = self.actor_target_net.forward(next_features)?;
            one_hot_rows(
                &categorical_sample(&target_logits)?,
                self.base.action.counts(),
            )
        } else {
            let target_mu = self.actor_target_net.forward(next_features)?;
            let noise = self.noise()?.sample()?;
            target_mu.broadcast_add(&noise)?.clamp(-1.0, 1.0)
        }
    }

    fn train(
        &mut self,
        batch: &ReplayBatch,
    ) -> Result<(f64, f64, Tensor)> {
        let features = batch.obs.features()?;
        let next_features = batch.next_obs.features()?;
        let is_weights = batch.importance_weights()?;
        let continuation = batch.done.affine(-1.0, 1.0)?;

        // the twin critics take two steps against the clipped double-Q
        // target for every actor step
        let mut td_mean = batch.reward.zeros_like()?;
        let mut critic_loss_value = 0.0;
        for _ in 0..2 {
            let action_target = self.target_action(&next_features)?;
            let q1 = self.q1_net.forward(&features, &batch.action)?;
            let q1_target = self.q1_target_net.forward(&next_features, &action_target)?;
            let q2 = self.q2_net.forward(&features, &batch.action)?;
            let q2_target = self.q2_target_net.forward(&next_features, &action_target)?;

            let q_target = q1_target.minimum(&q2_target)?;
            let dc_r = (&batch.reward
                + (self.gamma * q_target.mul(&continuation)?)?)?
                .detach();
            let td_error1 = q1.sub(&dc_r)?;
            let td_error2 = q2.sub(&dc_r)?;
            let q1_loss = td_error1.sqr()?.mul(&is_weights)?.mean_all()?;
            let q2_loss = td_error2.sqr()?.mul(&is_weights)?.mean_all()?;
            let critic_loss = ((q1_loss + q2_loss)? * 0.5)?;
            self.optimizer_critic.backward_step(&critic_loss)?;

            critic_loss_value = critic_loss.to_scalar::<f64>()?;
            td_mean = ((td_error1 + td_error2)? * 0.5)?.detach();
        }

        // actor: ascend Q1 along the policy; discrete actions go through
        // the straight-through Gumbel estimator
        let pi = if self.base.action.is_discrete() {
            let logits = self.actor_net.forward(&features)?;
            let soft = gumbel_softmax(&log_softmax(&logits, 1)?, self.discrete_tau)?;
            straight_through(&soft)?
        } else {
            let mu = self.actor_net.forward(&features)?;
            let noise = self.noise()?.sample()?;
            mu.broadcast_add(&noise)?.clamp(-1.0, 1.0)?
        };
        let q1_actor = self.q1_net.forward(&features, &pi)?;
        let actor_loss = q1_actor.mean_all()?.neg()?;
        self.optimizer_actor.backward_step(&actor_loss)?;

        self.base.global_step += 1;
        Ok((
            actor_loss.to_scalar::<f64>()?,
            critic_loss_value,
            td_mean,
        ))
    }
}

impl Policy for TD3 {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::TD3
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

    fn learn(
        &mut self,
        episode: usize,
        step: usize,
    ) -> Result<()> {
        self.optimizer_actor.set_learning_rate(self.actor_lr.rate(episode));
        self.optimizer_critic.set_learning_rate(self.critic_lr.rate(episode));

        for _ in 0..step {
            if !self.data.is_lg_batch_size(self.batch_size) {
                continue;
            }
            let batch = self.data.sample(self.batch_size, episode)?;
            let (actor_loss, critic_loss, td_error) = self.train(&batch)?;
            if self.use_priority {
                self.data.update_priorities(&batch.indices, &td_error)?;
            }
            update_target_net_weights(
                &Self::target_vars_of(
                    &self.actor_target_net,
                    &self.q1_target_net,
                    &self.q2_target_net,
                ),
                &Self::target_vars_of(&self.actor_net, &self.q1_net, &self.q2_net),
                Some(self.ployak),
            )?;

            let global_step = self.base.global_step;
            self.base.recorder.log_scalar("LOSS/actor_loss", actor_loss, global_step);
            self.base.recorder.log_scalar("LOSS/critic_loss", critic_loss, global_step);
            self.base.recorder.log_scalar(
                "LEARNING_RATE/actor_lr",
                self.actor_lr.rate(episode),
                global_step,
            );
            self.base.recorder.log_scalar(
                "LEARNING_RATE/critic_lr",
                self.critic_lr.rate(episode),
                global_step,
            );
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
        if let Some(path) = self.base.checkpoint_path("actor", episode) {
            self.actor_net.save(&path)?;
        }
        if let Some(path) = self.base.checkpoint_path("q1", episode) {
            self.q1_net.save(&path)?;
        }
        if let Some(path) = self.base.checkpoint_path("q2", episode) {
            self.q2_net.save(&path)?;
        }
        Ok(())
    }
}
