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
            critic_v,
            gaussian_entropy,
            sample_gaussian,
            squashed_gaussian_log_prob,
            Mlp,
            PolynomialDecay,
            RolloutBatch,
            RolloutBuffer,
            RolloutStep,
        },
        configs::A2C_Config,
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

/// Advantage actor-critic: an on-policy stochastic policy against a
/// state-value critic, entropy-regularized, trained on the discounted
/// returns of the episode that was just collected.
#[allow(clippy::upper_case_acronyms)]
pub struct A2C {
    base: Base,
    gamma: f64,
    beta: f64,
    epoch: usize,
    batch_size: usize,

    actor_net: Mlp,
    critic_net: Mlp,
    log_std: Option<Var>,
    optimizer_actor: AdamW,
    optimizer_critic: AdamW,
    actor_lr: PolynomialDecay,
    critic_lr: PolynomialDecay,

    data: RolloutBuffer,
}

impl A2C {
    pub fn new(
        device: &Device,
        config: &A2C_Config,
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
        let critic_net = critic_v(device, obs_dim, hidden)?;

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

        Ok(Self {
            base: Base::new(device, action, config.base_dir.clone(), "a2c"),
            gamma: config.gamma,
            beta: config.beta,
            epoch: config.epoch,
            batch_size: config.batch_size,
            actor_net,
            critic_net,
            log_std,
            optimizer_actor,
            optimizer_critic,
            actor_lr,
            critic_lr,
            data: RolloutBuffer::new(),
        })
    }

    fn log_std(&self) -> Result<&Var> {
        match &self.log_std {
            Some(log_std) => Ok(log_std),
            None => candle_core::bail!("gaussian head requested on a discrete policy"),
        }
    }

    pub fn rollout_buffer(&self) -> &RolloutBuffer {
        &self.data
    }

    /// Row-wise log-probability and entropy of the current policy for the
    /// stored (learner-format) actions.
    fn log_prob_and_entropy(
        &self,
        features: &Tensor,
        action: &Tensor,
    ) -> Result<(Tensor, Tensor)> {
        if self.base.action.is_discrete() {
            let logits = self.actor_net.forward(features)?;
            let logp_all = log_softmax(&logits, 1)?;
            let log_prob = action.mul(&logp_all)?.sum_keepdim(1)?;
            let entropy = categorical_entropy(&logp_all)?;
            Ok((log_prob, entropy))
        } else {
            let mu = self.actor_net.forward(features)?;
            let log_std = self.log_std()?;
            let log_prob = squashed_gaussian_log_prob(action, &mu, log_std.as_tensor())?;
            let entropy = gaussian_entropy(log_std.as_tensor())?;
            Ok((log_prob, entropy))
        }
    }

    /// One gradient step over a rollout batch: critic towards the
    /// discounted returns, then the entropy-regularized policy gradient on
    /// the detached advantage.
    fn train(
        &mut self,
        batch: &RolloutBatch,
    ) -> Result<(f64, f64, f64)> {
        let features = batch.obs.features()?;

        let v = self.critic_net.forward(&features)?;
        let td_error = batch.discounted_reward.sub(&v)?;
        let critic_loss = td_error.sqr()?.mean_all()?;
        self.optimizer_critic.backward_step(&critic_loss)?;

        let (log_prob, entropy) = self.log_prob_and_entropy(&features, &batch.action)?;
        let advantage = batch
            .discounted_reward
            .sub(&self.critic_net.forward(&features)?)?
            .detach();
        let actor_loss = (log_prob.mul(&advantage)?.mean_all()? + (self.beta * &entropy)?)?
            .neg()?;
        self.optimizer_actor.backward_step(&actor_loss)?;

        Ok((
            actor_loss.to_scalar::<f64>()?,
            critic_loss.to_scalar::<f64>()?,
            entropy.to_scalar::<f64>()?,
        ))
    }
}

impl Policy for A2C {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::A2C
    }

    fn mode(&self) -> PolicyMode {
        PolicyMode::OnPolicy
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
        self.data.add(RolloutStep {
            obs: obs.clone(),
            action: self.base.encode_action(action)?,
            reward,
            next_obs: next_obs.clone(),
            done,
            discounted_reward: None,
        });
        Ok(())
    }

    fn no_op_store(
        &mut self,
        _obs: &ObsBatch,
        _action: &Tensor,
        _reward: &[f64],
        _next_obs: &ObsBatch,
        _done: &[bool],
    ) -> Result<()> {
        // warm-up transitions are useless to an on-policy learner
        Ok(())
    }

    fn learn(
        &mut self,
        episode: usize,
        _step: usize,
    ) -> Result<()> {
        if self.batch_size > self.data.len() {
            candle_core::bail!(
                "batch_size ({}) must not exceed the episode length ({})",
                self.batch_size,
                self.data.len()
            )
        }

        let bootstrap = match self.data.last_next_obs() {
            Some(obs) => self.critic_net.forward(&obs.features()?)?.detach(),
            None => return Ok(()),
        };
        self.data.compute_returns(&bootstrap, self.gamma)?;

        self.optimizer_actor.set_learning_rate(self.actor_lr.rate(episode));
        self.optimizer_critic.set_learning_rate(self.critic_lr.rate(episode));

        let mut losses = (0.0, 0.0, 0.0);
        for _ in 0..self.epoch {
            let mut index = 0;
            while index < self.data.len() {
                let batch = self.data.get_batch(index, self.batch_size)?;
                losses = self.train(&batch)?;
                index += self.batch_size;
            }
        }
        self.base.global_step += 1;

        let (actor_loss, critic_loss, entropy) = losses;
        let step = self.base.global_step;
        self.base.recorder.log_scalar("LOSS/actor_loss", actor_loss, step);
        self.base.recorder.log_scalar("LOSS/critic_loss", critic_loss, step);
        self.base.recorder.log_scalar("LOSS/entropy", entropy, step);
        self.base
            .recorder
            .log_scalar("LEARNING_RATE/actor_lr", self.actor_lr.rate(episode), step);
        self.base
            .recorder
            .log_scalar("LEARNING_RATE/critic_lr", self.critic_lr.rate(episode), step);
        self.base.recorder.flush();

        self.data.clear();
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
