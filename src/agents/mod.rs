mod a2c;
mod ac;
mod base;
mod ddqn;
mod dpg;
mod ma_dpg;
mod ma_td3;
mod td3;

pub use a2c::A2C;
pub use ac::AC;
pub use base::{
    update_target_net_weights,
    ActionSpec,
    Base,
};
pub use ddqn::DDQN;
pub use dpg::DPG;
pub use ma_dpg::MADPG;
pub use ma_td3::MATD3;
pub use td3::TD3;

use {
    crate::envs::ObsBatch,
    candle_core::{
        Result,
        Tensor,
    },
    strum::Display,
};

/// The closed set of training algorithms this crate ships.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
#[allow(clippy::upper_case_acronyms)]
pub enum AlgorithmKind {
    A2C,
    AC,
    DDQN,
    DPG,
    TD3,
    MADPG,
    MATD3,
}

/// Whether an algorithm consumes the episode it just collected (on-policy)
/// or samples from a persistent replay store (off-policy). The interaction
/// loop uses this to decide when an episode may end early.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum PolicyMode {
    OnPolicy,
    OffPolicy,
}

/// The capability surface shared by every single-agent algorithm, consumed
/// by the interaction loop in [`crate::engines`].
///
/// Actions cross this boundary in the environment's native format:
/// normalized vectors in [-1, 1] for continuous spaces, per-branch index
/// tensors for discrete ones. Each implementation re-encodes actions into
/// its learner format (one-hot) when storing them.
pub trait Policy {
    fn kind(&self) -> AlgorithmKind;
    fn mode(&self) -> PolicyMode;

    /// The number of gradient updates taken so far.
    fn global_step(&self) -> u64;

    /// Exploratory action selection for training-time interaction.
    fn choose_action(
        &mut self,
        obs: &ObsBatch,
    ) -> Result<Tensor>;

    /// Greedy action selection for evaluation and inference.
    fn choose_inference_action(
        &mut self,
        obs: &ObsBatch,
    ) -> Result<Tensor>;

    /// Record one vectorized environment step.
    fn store_data(
        &mut self,
        obs: &ObsBatch,
        action: &Tensor,
        reward: &[f64],
        next_obs: &ObsBatch,
        done: &[bool],
    ) -> Result<()>;

    /// Record a warm-up step collected before training starts. Off-policy
    /// algorithms treat these like regular transitions; on-policy ones
    /// ignore them.
    fn no_op_store(
        &mut self,
        obs: &ObsBatch,
        action: &Tensor,
        reward: &[f64],
        next_obs: &ObsBatch,
        done: &[bool],
    ) -> Result<()> {
        self.store_data(obs, action, reward, next_obs, done)
    }

    /// Run the algorithm's gradient updates for the episode that just
    /// ended. `episode` drives learning-rate and annealing schedules;
    /// `step` is the number of environment steps the episode took.
    fn learn(
        &mut self,
        episode: usize,
        step: usize,
    ) -> Result<()>;

    /// Emit the end-of-episode scalars to the recorder.
    fn writer_summary(
        &mut self,
        episode: usize,
        total_reward: f64,
        last_done_step: i64,
    );

    fn save_checkpoint(
        &self,
        episode: usize,
    ) -> Result<()>;
}
