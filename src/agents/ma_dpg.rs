use {
    super::{
        ActionSpec,
        Base,
    },
    crate::{
        components::{
            actor_continuous,
            critic_q,
            Mlp,
            OuNoise,
            PolynomialDecay,
            QNetwork,
        },
        configs::MADPG_Config,
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
};

/// One agent of a multi-agent deterministic policy gradient ensemble.
///
/// The actor sees only this agent's observation; the critic is conditioned
/// on the joint state and joint action of all agents. An external
/// coordinator assembles the joint tensors and calls
/// [`MADPG::learn`] with them — this type holds no replay buffer of its
/// own.
#[allow(clippy::upper_case_acronyms)]
pub struct MADPG {
    base: Base,
    gamma: f64,

    actor_net: Mlp,
    q_net: QNetwork,
    action_noise: OuNoise,
    optimizer_actor: AdamW,
    optimizer_critic: AdamW,
    actor_lr: PolynomialDecay,
    critic_lr: PolynomialDecay,
}

impl MADPG {
    pub fn new(
        device: &Device,
        config: &MADPG_Config,
        obs_dim: usize,
        action: ActionSpec,
    ) -> Result<Self> {
        if action.is_discrete() {
            candle_core::bail!("madpg only supports continuous action spaces")
        }
        let hidden = (config.hidden_1_size, config.hidden_2_size);
        let counts = action.counts();
        let n = config.n_agents;

        let actor_net = actor_continuous(device, obs_dim, hidden, counts)?;
        let q_net = critic_q(device, obs_dim * n, counts * n, hidden)?;
        let action_noise = OuNoise::new(
            0.0,
            config.ou_theta,
            config.ou_sigma,
            config.ou_dt,
            counts,
            device,
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
        let optimizer_critic = AdamW::new(
            q_net.vars(),
            ParamsAdamW {
                lr: critic_lr.rate(0),
                ..Default::default()
            },
        )?;

        Ok(Self {
            base: Base::new(device, action, config.base_dir.clone(), "madpg"),
            gamma: config.gamma,
            actor_net,
            q_net,
            action_noise,
            optimizer_actor,
            optimizer_critic,
            actor_lr,
            critic_lr,
        })
    }

    pub fn global_step(&self) -> u64 {
        self.base.global_step
    }

    /// Noised-and-clipped exploratory action for this agent's own
    /// observation batch.
    pub fn choose_action(
        &mut self,
        s: &Tensor,
    ) -> Result<Tensor> {
        let mu = self.actor_net.forward(s)?;
        let noise = self.action_noise.sample()?;
        mu.broadcast_add(&noise)?.clamp(-1.0, 1.0)
    }

    pub fn choose_inference_action(
        &mut self,
        s: &Tensor,
    ) -> Result<Tensor> {
        self.actor_net.forward(s)
    }

    /// The action the coordinator uses when assembling joint bootstrap
    /// targets. Without target networks this is the exploratory policy
    /// itself.
    pub fn get_target_action(
        &mut self,
        s: &Tensor,
    ) -> Result<Tensor> {
        self.choose_action(s)
    }

    /// One gradient update from coordinator-assembled joint tensors.
    ///
    /// * `actions_previous` / `actions_later` — the other agents' current
    ///   policy actions on either side of this agent's slot, if any;
    /// * `ss` / `ss_next` — joint observations;
    /// * `aa` / `aa_next` — joint stored / target actions;
    /// * `s` — this agent's own observations;
    /// * `r` — this agent's rewards, shaped `(batch, 1)`.
    #[allow(clippy::too_many_arguments)]
    pub fn learn(
        &mut self,
        episode: usize,
        actions_previous: Option<&Tensor>,
        actions_later: Option<&Tensor>,
        ss: &Tensor,
        ss_next: &Tensor,
        aa: &Tensor,
        aa_next: &Tensor,
        s: &Tensor,
        r: &Tensor,
    ) -> Result<()> {
        self.optimizer_actor.set_learning_rate(self.actor_lr.rate(episode));
        self.optimizer_critic.set_learning_rate(self.critic_lr.rate(episode));

        // critic on the joint transition
        let q = self.q_net.forward(ss, aa)?;
        let q_target = self.q_net.forward(ss_next, aa_next)?;
        let dc_r = (r + (self.gamma * q_target)?)?.detach();
        let td_error = q.sub(&dc_r)?;
        let q_loss = (td_error.sqr()?.mean_all()? * 0.5)?;
        self.optimizer_critic.backward_step(&q_loss)?;

        // actor: this agent's action re-inserted into the joint action
        let mu = self.actor_net.forward(s)?;
        let joint = join_actions(actions_previous, &mu, actions_later)?;
        let q_actor = self.q_net.forward(ss, &joint)?;
        let actor_loss = q_actor.mean_all()?.neg()?;
        self.optimizer_actor.backward_step(&actor_loss)?;

        self.base.global_step += 1;

        let global_step = self.base.global_step;
        self.base.recorder.log_scalar(
            "LOSS/actor_loss",
            actor_loss.to_scalar::<f64>()?,
            global_step,
        );
        self.base.recorder.log_scalar(
            "LOSS/critic_loss",
            q_loss.to_scalar::<f64>()?,
            global_step,
        );
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
        Ok(())
    }

    pub fn save_checkpoint(
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

/// Concatenate this agent's action between the other agents' action blocks.
pub(super) fn join_actions(
    previous: Option<&Tensor>,
    own: &Tensor,
    later: Option<&Tensor>,
) -> Result<Tensor> {
    let mut parts: Vec<&Tensor> = Vec::with_capacity(3);
    if let Some(p) = previous {
        parts.push(p);
    }
    parts.push(own);
    if let Some(l) = later {
        parts.push(l);
    }
    Tensor::cat(&parts, 1)
}
