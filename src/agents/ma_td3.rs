use {
    super::{
        ma_dpg::join_actions,
        update_target_net_weights,
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
        configs::MATD3_Config,
    },
    candle_core::{
        Device,
        Result,
        Tensor,
        Var,
    },
    candle_nn::{
        AdamW,
        Optimizer,
        ParamsAdamW,
    },
};

/// One agent of a multi-agent TD3 ensemble: MADPG's joint-critic scheme
/// with twin critics, clipped double-Q targets and Polyak-averaged target
/// copies of the actor and both critics.
#[allow(clippy::upper_case_acronyms)]
pub struct MATD3 {
    base: Base,
    gamma: f64,
    ployak: f64,

    actor_net: Mlp,
    actor_target_net: Mlp,
    q1_net: QNetwork,
    q1_target_net: QNetwork,
    q2_net: QNetwork,
    q2_target_net: QNetwork,
    action_noise: OuNoise,
    optimizer_actor: AdamW,
    optimizer_critic: AdamW,
    actor_lr: PolynomialDecay,
    critic_lr: PolynomialDecay,
}

impl MATD3 {
    pub fn new(
        device: &Device,
        config: &MATD3_Config,
        obs_dim: usize,
        action: ActionSpec,
    ) -> Result<Self> {
        if action.is_discrete() {
            candle_core::bail!("matd3 only supports continuous action spaces")
        }
        let hidden = (config.hidden_1_size, config.hidden_2_size);
        let counts = action.counts();
        let n = config.n_agents;

        let actor_net = actor_continuous(device, obs_dim, hidden, counts)?;
        let actor_target_net = actor_continuous(device, obs_dim, hidden, counts)?;
        let q1_net = critic_q(device, obs_dim * n, counts * n, hidden)?;
        let q1_target_net = critic_q(device, obs_dim * n, counts * n, hidden)?;
        let q2_net = critic_q(device, obs_dim * n, counts * n, hidden)?;
        let q2_target_net = critic_q(device, obs_dim * n, counts * n, hidden)?;

        update_target_net_weights(
            &Self::grouped_vars(&actor_target_net, &q1_target_net, &q2_target_net),
            &Self::grouped_vars(&actor_net, &q1_net, &q2_net),
            None,
        )?;

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
        let mut critic_vars = q1_net.vars();
        critic_vars.extend(q2_net.vars());
        let optimizer_critic = AdamW::new(
            critic_vars,
            ParamsAdamW {
                lr: critic_lr.rate(0),
                ..Default::default()
            },
        )?;

        Ok(Self {
            base: Base::new(device, action, config.base_dir.clone(), "matd3"),
            gamma: config.gamma,
            ployak: config.ployak,
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
        })
    }

    fn grouped_vars(
        actor: &Mlp,
        q1: &QNetwork,
        q2: &QNetwork,
    ) -> Vec<Var> {
        let mut vars = actor.vars();
        vars.extend(q1.vars());
        vars.extend(q2.vars());
        vars
    }

    pub fn global_step(&self) -> u64 {
        self.base.global_step
    }

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

    /// The target actor's noised action, used by the coordinator to build
    /// the joint bootstrap action.
    pub fn get_target_action(
        &mut self,
        s: &Tensor,
    ) -> Result<Tensor> {
        let target_mu = self.actor_target_net.forward(s)?;
        let noise = self.action_noise.sample()?;
        target_mu.broadcast_add(&noise)?.clamp(-1.0, 1.0)
    }

    /// One gradient update from coordinator-assembled joint tensors; see
    /// [`super::MADPG::learn`] for the tensor layout. The twin critics step
    /// twice per actor step, and all target networks are Polyak-updated
    /// afterwards.
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

        let mut critic_loss_value = 0.0;
        for _ in 0..2 {
            let q1 = self.q1_net.forward(ss, aa)?;
            let q1_target = self.q1_target_net.forward(ss_next, aa_next)?;
            let q2 = self.q2_net.forward(ss, aa)?;
            let q2_target = self.q2_target_net.forward(ss_next, aa_next)?;

            let q_target = q1_target.minimum(&q2_target)?;
            let dc_r = (r + (self.gamma * q_target)?)?.detach();
            let q1_loss = q1.sub(&dc_r)?.sqr()?.mean_all()?;
            let q2_loss = q2.sub(&dc_r)?.sqr()?.mean_all()?;
            let critic_loss = ((q1_loss + q2_loss)? * 0.5)?;
            self.optimizer_critic.backward_step(&critic_loss)?;
            critic_loss_value = critic_loss.to_scalar::<f64>()?;
        }

        let mu = self.actor_net.forward(s)?;
        let joint = join_actions(actions_previous, &mu, actions_later)?;
        let q1_actor = self.q1_net.forward(ss, &joint)?;
        let actor_loss = q1_actor.mean_all()?.neg()?;
        self.optimizer_actor.backward_step(&actor_loss)?;

        update_target_net_weights(
            &Self::grouped_vars(
                &self.actor_target_net,
                &self.q1_target_net,
                &self.q2_target_net,
            ),
            &Self::grouped_vars(&self.actor_net, &self.q1_net, &self.q2_net),
            Some(self.ployak),
        )?;

        self.base.global_step += 1;

        let global_step = self.base.global_step;
        self.base.recorder.log_scalar(
            "LOSS/actor_loss",
            actor_loss.to_scalar::<f64>()?,
            global_step,
        );
        self.base
            .recorder
            .log_scalar("LOSS/critic_loss", critic_loss_value, global_step);
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
        if let Some(path) = self.base.checkpoint_path("q1", episode) {
            self.q1_net.save(&path)?;
        }
        if let Some(path) = self.base.checkpoint_path("q2", episode) {
            self.q2_net.save(&path)?;
        }
        Ok(())
    }
}
