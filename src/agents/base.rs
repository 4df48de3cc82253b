use {
    crate::{
        components::Recorder,
        envs::{
            decode_flat_index,
            index_to_one_hot,
        },
    },
    candle_core::{
        Device,
        Result,
        Tensor,
        Var,
    },
    std::path::PathBuf,
};

/// The action-space description every algorithm is constructed with.
#[derive(Clone, Debug)]
pub enum ActionSpec {
    Continuous { dim: usize },
    Discrete { branches: Vec<usize> },
}

impl ActionSpec {
    pub fn is_discrete(&self) -> bool {
        matches!(self, ActionSpec::Discrete { .. })
    }

    /// The width of the action tensor the function approximators see: the
    /// vector dimension for continuous spaces, the joint one-hot width for
    /// discrete ones.
    pub fn counts(&self) -> usize {
        match self {
            ActionSpec::Continuous { dim } => *dim,
            ActionSpec::Discrete { branches } => branches.iter().product(),
        }
    }

    pub fn branches(&self) -> Result<&[usize]> {
        match self {
            ActionSpec::Discrete { branches } => Ok(branches),
            ActionSpec::Continuous { .. } => {
                candle_core::bail!("expected a discrete action space")
            }
        }
    }
}

/// Lifecycle state shared by every algorithm: the monotonic update counter,
/// the compute device, the action-space description, the checkpoint
/// directory and the metrics recorder. Composed into each algorithm rather
/// than inherited.
pub struct Base {
    pub device: Device,
    pub global_step: u64,
    pub action: ActionSpec,
    pub base_dir: Option<PathBuf>,
    pub recorder: Recorder,
}

impl Base {
    pub fn new(
        device: &Device,
        action: ActionSpec,
        base_dir: Option<PathBuf>,
        scope: &str,
    ) -> Self {
        Self {
            device: device.clone(),
            global_step: 0,
            action,
            base_dir,
            recorder: Recorder::new(scope),
        }
    }

    /// Decode flat categorical indices into the per-branch index tensor the
    /// environment consumes.
    pub fn decode_action(
        &self,
        flat: &Tensor,
    ) -> Result<Tensor> {
        decode_flat_index(flat, self.action.branches()?)
    }

    /// Re-encode an environment-format action into the learner format:
    /// per-branch indices become a joint one-hot vector, continuous actions
    /// pass through.
    pub fn encode_action(
        &self,
        action: &Tensor,
    ) -> Result<Tensor> {
        match &self.action {
            ActionSpec::Discrete { branches } => {
                index_to_one_hot(action, branches)?.to_device(&self.device)
            }
            // stored actions are data, not part of any later gradient graph
            ActionSpec::Continuous { .. } => Ok(action.detach()),
        }
    }

    /// Validate and tensorize the scalar parts of a stored step. Rewards
    /// and done flags must arrive with one entry per environment instance;
    /// anything else is a caller bug reported as an error.
    pub fn reward_done_tensors(
        &self,
        reward: &[f64],
        done: &[bool],
        n: usize,
    ) -> Result<(Tensor, Tensor)> {
        if reward.len() != n || done.len() != n {
            candle_core::bail!(
                "store_data expects {n} rewards and done flags, got {} and {}",
                reward.len(),
                done.len()
            )
        }
        let reward = Tensor::from_vec(reward.to_vec(), (n, 1), &self.device)?;
        let done = Tensor::from_vec(
            done.iter().map(|&d| d as u8 as f64).collect::<Vec<_>>(),
            (n, 1),
            &self.device,
        )?;
        Ok((reward, done))
    }

    /// Where to write the checkpoint of network `net` for `episode`, if a
    /// checkpoint directory was configured.
    pub fn checkpoint_path(
        &self,
        net: &str,
        episode: usize,
    ) -> Option<PathBuf> {
        self.base_dir
            .as_ref()
            .map(|dir| dir.join(format!("ep{episode}-{net}.safetensors")))
    }

    /// The end-of-episode summary every algorithm reports.
    pub fn write_summary(
        &self,
        episode: usize,
        total_reward: f64,
        last_done_step: i64,
    ) {
        self.recorder
            .log_scalar("EPISODE/total_reward", total_reward, episode as u64);
        self.recorder
            .log_scalar("EPISODE/last_done_step", last_done_step as f64, episode as u64);
        self.recorder.flush();
    }
}

/// Copy or blend online network parameters into their target copies.
///
/// With `tau = None` the targets are overwritten (hard update). Otherwise
/// the targets keep a `tau` fraction of themselves:
/// `target ← tau·target + (1 − tau)·online` (Polyak averaging), so small
/// `1 − tau` means slowly moving targets.
///
/// Both slices must list parameters in the same order; pairing is
/// positional, matching the sorted parameter lists the network types
/// expose.
pub fn update_target_net_weights(
    target_vars: &[Var],
    online_vars: &[Var],
    tau: Option<f64>,
) -> Result<()> {
    if target_vars.len() != online_vars.len() {
        candle_core::bail!(
            "target/online parameter lists differ in length: {} vs {}",
            target_vars.len(),
            online_vars.len()
        )
    }
    for (target, online) in target_vars.iter().zip(online_vars) {
        match tau {
            None => target.set(online.as_tensor())?,
            Some(tau) => target.set(
                &((tau * target.as_tensor())? + ((1.0 - tau) * online.as_tensor())?)?,
            )?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::components::actor_continuous,
    };

    fn flatten(vars: &[Var]) -> Vec<f64> {
        vars.iter()
            .flat_map(|v| {
                v.as_tensor()
                    .flatten_all()
                    .unwrap()
                    .to_vec1::<f64>()
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn hard_update_copies_online_parameters_exactly() {
        let device = Device::Cpu;
        let online = actor_continuous(&device, 3, (4, 4), 2).unwrap();
        let target = actor_continuous(&device, 3, (4, 4), 2).unwrap();

        update_target_net_weights(&target.vars(), &online.vars(), None).unwrap();
        assert_eq!(flatten(&target.vars()), flatten(&online.vars()));
    }

    #[test]
    fn soft_update_with_tau_zero_equals_a_hard_update() {
        let device = Device::Cpu;
        let online = actor_continuous(&device, 3, (4, 4), 2).unwrap();
        let target = actor_continuous(&device, 3, (4, 4), 2).unwrap();

        update_target_net_weights(&target.vars(), &online.vars(), Some(0.0)).unwrap();
        assert_eq!(flatten(&target.vars()), flatten(&online.vars()));
    }

    #[test]
    fn soft_update_with_tau_one_leaves_the_target_unchanged() {
        let device = Device::Cpu;
        let online = actor_continuous(&device, 3, (4, 4), 2).unwrap();
        let target = actor_continuous(&device, 3, (4, 4), 2).unwrap();
        let before = flatten(&target.vars());

        update_target_net_weights(&target.vars(), &online.vars(), Some(1.0)).unwrap();
        assert_eq!(flatten(&target.vars()), before);
    }

    #[test]
    fn soft_update_interpolates() {
        let device = Device::Cpu;
        let online = actor_continuous(&device, 2, (3, 3), 1).unwrap();
        let target = actor_continuous(&device, 2, (3, 3), 1).unwrap();
        let t0 = flatten(&target.vars());
        let o = flatten(&online.vars());

        update_target_net_weights(&target.vars(), &online.vars(), Some(0.9)).unwrap();
        let t1 = flatten(&target.vars());
        for ((a, b), c) in t0.iter().zip(&o).zip(&t1) {
            assert!((0.9 * a + 0.1 * b - c).abs() < 1e-12);
        }
    }
}
