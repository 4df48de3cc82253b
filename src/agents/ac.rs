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
            categorical_entropy,
            categorical_sample,
            critic_q,
            gaussian_entropy,
            one_hot_rows,
            sample_gaussian,
            squashed_gaussian_log_prob,
            BetaAnneal,
            Mlp,
            PolynomialDecay,
            QNetwork,
            ReplayBatch,
            ReplayBuffer,
            Transition,
        },
        configs::AC_Config,
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
    rand::{
        thread_rng,
        Rng,
    },
};

/// Off-policy actor-critic: a stochastic policy against a Q(s, a) critic,
/// trained from replayed transitions with an importance-sampling ratio
/// against the behavior policy's stored log-probabilities.
#[allow(clippy::upper_case_acronyms)]
pub struct AC {
    base: Base,
    gamma: f64,
    epsilon: f64,
    batch_size: usize,
    use_priority: bool,

    actor_net: Mlp,
    critic_net: QNetwork,
    log_std: Option<Var>,
    optimizer_actor: AdamW,
    optimizer_critic: AdamW,
    actor_lr: PolynomialDecay,
    critic_lr: PolynomialDecay,

    data: ReplayBuffer,
}

impl AC {
    pub fn new(
        device: &Device,
        config: &AC_Config,
        obs_dim: usize,
        action: ActionSpec,
    ) -> Result<Self> {
        let hidden = (config.hidden_1_size, config.hidden_2_size);
        let counts = action.counts();

        let (actor_net, log_std) = match &action {
            ActionSpec::Continuous { .. } => {
                let net = actor_continuous(device, obs_dim, hidden, counts)?;
                let log_std = Var::from_tensor(&Tensor::full(-0.5f64, counts, device)?)?;
                (net, Some(log_std))
            }
            ActionSpec::Discrete { .. } => {
                (actor_logits(device, obs_dim, hidden, counts)?, None)
            }
        };
        let critic_net = critic_q(device, obs_dim, counts, hidden)?;

        let actor_lr = PolynomialDecay::new(config.actor_learning_rate, config.max_episode);
        let critic_lr = PolynomialDecay::new(config.critic_learning_rate, config.max_episode);

        let mut actor_vars = actor_net.vars();
        if let Some(log_std) = &log_std {
            actor_vars.push(log_std.clone());
        }
        let optimizer_actor = AdamW::new(
            actor_vars,
            ParamsAdamW {
                lr: actor_lr.rate(0),
                ..Default::default()
            },
        )?;
        let optimizer_critic = AdamW::new(
            critic_net.vars(),
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
            base: Base::new(device, action, config.base_dir.clone(), "ac"),
            gamma: config.gamma,
            epsilon: config.epsilon,
            batch_size: config.batch_size,
            use_priority: config.use_priority,
            actor_net,
            critic_net,
            log_std,
            optimizer_actor,
            optimizer_critic,
            actor_lr,
            critic_lr,
            data,
        })
    }

    fn log_std(&self) -> Result<&Var> {
        match &self.log_std {
            Some(log_std) => Ok(log_std),
            None => candle_core::bail!("gaussian head requested on a discrete policy"),
        }
    }

    pub fn replay_buffer(&self) -> &ReplayBuffer {
        &self.data
    }

    /// Log-probability of a learner-format action under the current policy.
    fn log_prob(
        &self,
        features: &Tensor,
        action: &Tensor,
    ) -> Result<Tensor> {
        if self.base.action.is_discrete() {
            let logits = self.actor_net.forward(features)?;
            let logp_all = log_softmax(&logits, 1)?;
            action.mul(&logp_all)?.sum_keepdim(1)
        } else {
            let mu = self.actor_net.forward(features)?;
            squashed_gaussian_log_prob(action, &mu, self.log_std()?.as_tensor())
        }
    }

    fn train(
        &mut self,
        batch: &ReplayBatch,
    ) -> Result<(f64, f64, f64, Tensor)> {
        let features = batch.obs.features()?;
        let next_features = batch.next_obs.features()?;
        let is_weights = batch.importance_weights()?;

        // critic: TD target bootstrapped with the policy's greedy next action
        let next_action = if self.base.action.is_discrete() {
            let logits = self.actor_net.forward(&next_features)?;
            one_hot_rows(&logits.argmax(1)?, self.base.action.counts())?
        } else {
            self.actor_net.forward(&next_features)?
        };
        let max_q_next = self
            .critic_net
            .forward(&next_features, &next_action)?
            .detach();
        let q = self.critic_net.forward(&features, &batch.action)?;
        let continuation = batch.done.affine(-1.0, 1.0)?;
        let td_error = q.sub(
            &(&batch.reward + (self.gamma * continuation.mul(&max_q_next)?)?)?,
        )?;
        let critic_loss = td_error.sqr()?.mul(&is_weights)?.mean_all()?;
        self.optimizer_critic.backward_step(&critic_loss)?;

        // actor: importance-weighted policy gradient against the detached Q
        let log_prob = self.log_prob(&features, &batch.action)?;
        let entropy = if self.base.action.is_discrete() {
            let logits = self.actor_net.forward(&features)?;
            categorical_entropy(&log_softmax(&logits, 1)?)?
        } else {
            gaussian_entropy(self.log_std()?.as_tensor())?
        };
        let old_log_prob = match &batch.log_prob {
            Some(lp) => lp.clone(),
            None => candle_core::bail!("replayed transition is missing its stored log-probability"),
        };
        let ratio = log_prob.sub(&old_log_prob)?.exp()?.detach();
        let q_value = self
            .critic_net
            .forward(&features, &batch.action)?
            .detach();
        let actor_loss = ratio
            .mul(&log_prob)?
            .mul(&q_value)?
            .mean_all()?
            .neg()?;
        self.optimizer_actor.backward_step(&actor_loss)?;

        self.base.global_step += 1;
        Ok((
            actor_loss.to_scalar::<f64>()?,
            critic_loss.to_scalar::<f64>()?,
            entropy.to_scalar::<f64>()?,
            td_error,
        ))
    }
}

impl Policy for AC {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::AC
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
            let n = features.dim(0)?;
            let counts = self.base.action.counts();
            let flat = if thread_rng().gen::<f64>() < self.epsilon {
                let random = (0..n)
                    .map(|_| thread_rng().gen_range(0..counts) as u32)
                    .collect::<Vec<_>>();
                Tensor::from_vec(random, n, &self.base.device)?
            } else {
                let logits = self.actor_net.forward(&features)?;
                categorical_sample(&logits)?
            };
            self.base.decode_action(&flat)
        } else {
            let mu = self.actor_net.forward(&features)?;
            let pi = sample_gaussian(&mu, self.log_std()?.as_tensor())?;
            pi.tanh()
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
        let old_log_prob = self.log_prob(&obs.features()?, &action)?.detach();

        for i in 0..n {
            self.data.add(Transition {
                obs: obs.row(i)?,
                action: action.narrow(0, i, 1)?,
                log_prob: Some(old_log_prob.narrow(0, i, 1)?),
                reward: reward.narrow(0, i, 1)?,
                next_obs: next_obs.row(i)?,
                done: done.narrow(0, i, 1)?,
            });
        }
        Ok(())
    }

    fn no_op_store(
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
        // warm-up actions were not drawn from this policy; they carry a
        // unit placeholder in place of a behavior log-probability
        let old_log_prob = reward.ones_like()?;

        for i in 0..n {
            self.data.add(Transition {
                obs: obs.row(i)?,
                action: action.narrow(0, i, 1)?,
                log_prob: Some(old_log_prob.narrow(0, i, 1)?),
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
            let (actor_loss, critic_loss, entropy, td_error) = self.train(&batch)?;
            if self.use_priority {
                self.data.update_priorities(&batch.indices, &td_error)?;
            }

            let global_step = self.base.global_step;
            self.base.recorder.log_scalar("LOSS/actor_loss", actor_loss, global_step);
            self.base.recorder.log_scalar("LOSS/critic_loss", critic_loss, global_step);
            self.base.recorder.log_scalar("LOSS/entropy", entropy, global_step);
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
        if let Some(path) = self.base.checkpoint_path("critic", episode) {
            self.critic_net.save(&path)?;
        }
        Ok(())
    }
}
